use std::cell::{Cell, RefCell};

use crate::error::Error;
use crate::nodetype::NodeType;
use crate::parser::XmlParser;

/// A callback invoked by the parser for nodes matching a path.
///
/// The path is relative to the node the parser is on when the callback is
/// added, and consists of resolved segments (`local` or `{uri}local`).
pub trait ParserCallback<'a> {
    /// The resolved path segments.
    fn path(&self) -> &[String];

    /// Whether the callback also matches deeper descendants: a recursive
    /// callback with path `a.b` fires for every `b` anywhere below `a`.
    fn recursive(&self) -> bool {
        false
    }

    /// The node types the callback is invoked for, `None` for all.
    fn node_types(&self) -> Option<&[NodeType]>;

    /// Handle the node the parser is on.
    ///
    /// Handlers may call back into the parser, so a recursive callback
    /// that consumes its element is invoked again for nested matches
    /// while the outer invocation is still running.
    fn handle(&self, parser: &mut XmlParser<'a>) -> Result<(), Error>;
}

type StartHandler<'a> = Box<dyn Fn(&mut XmlParser<'a>) -> Result<(), Error> + 'a>;
type ValueHandler<'a> =
    Box<dyn Fn(&mut XmlParser<'a>, Option<String>) -> Result<(), Error> + 'a>;

const ELEMENT_TYPES: &[NodeType] = &[NodeType::Element];
const VALUE_TYPES: &[NodeType] = &[
    NodeType::Whitespace,
    NodeType::Text,
    NodeType::Element,
    NodeType::EndElement,
    NodeType::CData,
];
const CURRENT_VALUE_TYPES: &[NodeType] = &[
    NodeType::Whitespace,
    NodeType::Text,
    NodeType::EndElement,
    NodeType::CData,
];

/// Invokes a handler with the parser when a matching element starts.
pub struct ElementStartCallback<'a> {
    path: Vec<String>,
    recursive: bool,
    handler: StartHandler<'a>,
}

impl<'a> ElementStartCallback<'a> {
    /// Create a callback for elements at `path`.
    pub fn new<F>(path: Vec<String>, handler: F) -> Self
    where
        F: Fn(&mut XmlParser<'a>) -> Result<(), Error> + 'a,
    {
        ElementStartCallback {
            path,
            recursive: false,
            handler: Box::new(handler),
        }
    }

    /// Create a recursive callback, see [`ParserCallback::recursive`].
    pub fn recursive<F>(path: Vec<String>, handler: F) -> Self
    where
        F: Fn(&mut XmlParser<'a>) -> Result<(), Error> + 'a,
    {
        ElementStartCallback {
            recursive: true,
            ..Self::new(path, handler)
        }
    }
}

impl<'a> ParserCallback<'a> for ElementStartCallback<'a> {
    fn path(&self) -> &[String] {
        &self.path
    }

    fn recursive(&self) -> bool {
        self.recursive
    }

    fn node_types(&self) -> Option<&[NodeType]> {
        Some(ELEMENT_TYPES)
    }

    fn handle(&self, parser: &mut XmlParser<'a>) -> Result<(), Error> {
        (self.handler)(parser)
    }
}

/// Collects the text of a matching element and invokes a handler with it
/// once the element ends.
///
/// Text, whitespace and CDATA directly inside the element are concatenated;
/// an element without any yields `None`.
pub struct ElementValueCallback<'a> {
    path: Vec<String>,
    level: Cell<usize>,
    value: RefCell<Option<String>>,
    handler: ValueHandler<'a>,
}

impl<'a> ElementValueCallback<'a> {
    /// Create a callback for elements at `path`.
    pub fn new<F>(path: Vec<String>, handler: F) -> Self
    where
        F: Fn(&mut XmlParser<'a>, Option<String>) -> Result<(), Error> + 'a,
    {
        ElementValueCallback {
            path,
            level: Cell::new(0),
            value: RefCell::new(None),
            handler: Box::new(handler),
        }
    }
}

impl<'a> ParserCallback<'a> for ElementValueCallback<'a> {
    fn path(&self) -> &[String] {
        &self.path
    }

    fn node_types(&self) -> Option<&[NodeType]> {
        Some(VALUE_TYPES)
    }

    fn handle(&self, parser: &mut XmlParser<'a>) -> Result<(), Error> {
        match parser.el_type()? {
            node_type if node_type.is_text() => {
                append(&self.value, &parser.el_value()?);
            }
            NodeType::Element => {
                if !parser.el_self_closing()? {
                    self.level.set(self.level.get() + 1);
                } else if self.level.get() <= 1 {
                    finish(&self.level, &self.value, &self.handler, parser)?;
                }
            }
            NodeType::EndElement => {
                self.level.set(self.level.get().saturating_sub(1));
                if self.level.get() <= 1 {
                    finish(&self.level, &self.value, &self.handler, parser)?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Collects the text of the element the parser is on when the callback is
/// added. It is registered with an empty path and can only be used once.
pub struct CurrentElementValueCallback<'a> {
    path: Vec<String>,
    level: Cell<usize>,
    value: RefCell<Option<String>>,
    handler: ValueHandler<'a>,
}

impl<'a> CurrentElementValueCallback<'a> {
    /// Create a callback for the current element.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&mut XmlParser<'a>, Option<String>) -> Result<(), Error> + 'a,
    {
        CurrentElementValueCallback {
            path: Vec::new(),
            // the start tag has already been seen
            level: Cell::new(1),
            value: RefCell::new(None),
            handler: Box::new(handler),
        }
    }
}

impl<'a> ParserCallback<'a> for CurrentElementValueCallback<'a> {
    fn path(&self) -> &[String] {
        &self.path
    }

    fn node_types(&self) -> Option<&[NodeType]> {
        Some(CURRENT_VALUE_TYPES)
    }

    fn handle(&self, parser: &mut XmlParser<'a>) -> Result<(), Error> {
        if self.level.get() < 1 {
            return Err(Error::AlreadyConsumed(
                "the current element value callback can only be used once".to_string(),
            ));
        }
        match parser.el_type()? {
            node_type if node_type.is_text() => {
                append(&self.value, &parser.el_value()?);
            }
            NodeType::EndElement => {
                self.level.set(self.level.get() - 1);
                if self.level.get() <= 1 {
                    finish(&self.level, &self.value, &self.handler, parser)?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

fn append(value: &RefCell<Option<String>>, text: &str) {
    value
        .borrow_mut()
        .get_or_insert_with(String::new)
        .push_str(text);
}

fn finish<'a>(
    level: &Cell<usize>,
    value: &RefCell<Option<String>>,
    handler: &ValueHandler<'a>,
    parser: &mut XmlParser<'a>,
) -> Result<(), Error> {
    let value = value.take();
    level.set(0);
    handler(parser, value)
}
