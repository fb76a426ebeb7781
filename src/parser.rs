//! A path-driven callback parser.
//!
//! [`XmlParser`] walks a document node by node. Instead of building a tree
//! it invokes callbacks registered for paths, such as `root.item`, relative
//! to the element the parser is on when the callback is added. Callbacks
//! may register further callbacks for paths below the element they are
//! invoked for; those are removed again once that element has ended.
//!
//! Values are delivered through [`Slot`]s which are filled while the
//! parser runs:
//!
//! ```rust
//! use easyxml::{Slot, XmlParser};
//!
//! let xml = "<root><item><b>15</b></item><item><b>16</b></item></root>";
//! let mut parser = XmlParser::new(xml);
//!
//! let values = Slot::new(Vec::new());
//! let sink = values.clone();
//! parser.each("root.item", move |parser| {
//!     let b = parser.value("b")?;
//!     parser.consume()?;
//!     sink.update(|values| values.push(b.take()));
//!     Ok(())
//! })?;
//! parser.parse()?;
//!
//! assert_eq!(
//!     values.get(),
//!     vec![Some("15".to_string()), Some("16".to_string())]
//! );
//! # Ok::<(), easyxml::Error>(())
//! ```
//!
//! Subtrees without any interested callback are skipped without being
//! dispatched, see [`XmlParser::set_skip_subtrees`].

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ahash::HashMap;
use log::trace;

use crate::callbacks::{
    CurrentElementValueCallback, ElementStartCallback, ElementValueCallback, ParserCallback,
};
use crate::convert::{Convert, Converted, Converters};
use crate::error::Error;
use crate::namespace::XML_NAMESPACE;
use crate::nodetype::NodeType;
use crate::path::{parse_attribute_name, parse_path, segment, PathContext};
use crate::reader::{Node, Reader};
use crate::registry::Registry;
use crate::slot::Slot;

/// A type that can fill itself from the element the parser is on.
///
/// Implementations usually request values relative to the element and
/// then [`consume`](XmlParser::consume) it:
///
/// ```rust
/// use easyxml::{Error, Slot, XmlParser, XmlUnserialize};
///
/// #[derive(Default)]
/// struct Item {
///     name: Option<String>,
/// }
///
/// impl XmlUnserialize for Item {
///     fn xml_unserialize(&mut self, parser: &mut XmlParser<'_>) -> Result<(), Error> {
///         let name = parser.value("name")?;
///         parser.consume()?;
///         self.name = name.take();
///         Ok(())
///     }
/// }
///
/// let mut parser = XmlParser::new("<root><item><name>a</name></item></root>");
/// let item = parser.unserialize("root.item", Item::default())?;
/// parser.parse()?;
/// assert_eq!(item.take().unwrap().name.as_deref(), Some("a"));
/// # Ok::<(), Error>(())
/// ```
pub trait XmlUnserialize {
    /// Fill `self` from the current element.
    fn xml_unserialize(&mut self, parser: &mut XmlParser<'_>) -> Result<(), Error>;
}

type EndCallback<'a> = Box<dyn FnOnce() + 'a>;
type ValueHandler<'a> =
    Box<dyn Fn(&mut XmlParser<'a>, Option<String>) -> Result<(), Error> + 'a>;

/// A streaming parser that dispatches nodes to callbacks registered for
/// paths.
pub struct XmlParser<'a> {
    reader: Reader<'a>,
    registry: Registry<'a>,
    path: Vec<String>,
    // default namespace per open element
    xmlns_stack: Vec<Option<String>>,
    // sequence number of the node the reader is on
    element_id: u64,
    // element ids of the nodes whose callbacks are running
    handled_ids: Vec<u64>,
    root_parsed: bool,
    started: bool,
    end_callbacks: Vec<Vec<EndCallback<'a>>>,
    prefixes: HashMap<String, String>,
    converters: Converters,
    delimiter: char,
    skip_subtrees: bool,
    current_value_element: Option<u64>,
}

impl<'a> XmlParser<'a> {
    /// Create a parser for a document.
    ///
    /// To parse raw bytes in an arbitrary encoding, decode them first with
    /// [`decode`](crate::decode).
    pub fn new(source: &'a str) -> Self {
        let mut prefixes = HashMap::default();
        prefixes.insert("xml".to_string(), XML_NAMESPACE.to_string());
        XmlParser {
            reader: Reader::new(source),
            registry: Registry::new(),
            path: Vec::new(),
            xmlns_stack: Vec::new(),
            element_id: 0,
            handled_ids: vec![0],
            root_parsed: false,
            started: false,
            end_callbacks: Vec::new(),
            prefixes,
            converters: Converters::default(),
            delimiter: '.',
            skip_subtrees: true,
            current_value_element: None,
        }
    }

    /// Set the delimiter between path segments. The default is `.`.
    pub fn set_path_delimiter(&mut self, delimiter: char) {
        self.delimiter = delimiter;
    }

    /// Set the decimal separator the `number` and `int` converters use when
    /// none is given. The default is `.`.
    pub fn set_default_decimal_separator(&mut self, separator: &str) {
        self.converters.set_decimal_separator(separator);
    }

    /// Enable or disable skipping of subtrees no callback is interested
    /// in. Skipping is enabled by default; disabling it never changes what
    /// callbacks see.
    pub fn set_skip_subtrees(&mut self, skip: bool) {
        self.skip_subtrees = skip;
    }

    /// Bind a prefix for use in paths and attribute names.
    ///
    /// The prefix `xml` is bound from the start. Binding a prefix to a
    /// different URI than before is an error.
    pub fn prefix(&mut self, name: &str, uri: &str) -> Result<(), Error> {
        match self.prefixes.get(name) {
            Some(existing) if existing != uri => Err(Error::invalid_input(format!(
                "prefix \"{}\" is already bound to \"{}\"",
                name, existing
            ))),
            _ => {
                self.prefixes.insert(name.to_string(), uri.to_string());
                Ok(())
            }
        }
    }

    /// Register a custom converter usable in pipelines. It takes
    /// precedence over a built-in converter of the same name.
    pub fn set_converter<F>(&mut self, name: &str, converter: F)
    where
        F: Fn(Converted, &[String]) -> Converted + 'static,
    {
        self.converters.set(name, Rc::new(converter));
    }

    /// Convert a value as the `_with` helpers do.
    pub fn convert_value(
        &self,
        value: Option<String>,
        convert: impl Into<Convert>,
    ) -> Result<Converted, Error> {
        self.converters.convert(value.into(), &convert.into())
    }

    /// Parse the whole document, invoking the registered callbacks.
    ///
    /// A parser can only be run once.
    pub fn parse(&mut self) -> Result<(), Error> {
        if self.started {
            return Err(Error::AlreadyStarted);
        }
        self.started = true;
        while self.next()? {
            self.handle()?;
        }
        Ok(())
    }

    /// Process the rest of the current element, dispatching callbacks as
    /// usual, and return after its end tag.
    ///
    /// Afterwards the values requested for the element are available.
    pub fn consume(&mut self) -> Result<(), Error> {
        self.check_cursor()?;
        if self.path.is_empty() {
            return Err(Error::illegal_state(
                "cannot consume when no element is open",
            ));
        }
        let node = self.reader.node();
        if node.node_type != NodeType::Element {
            return Err(Error::illegal_state(format!(
                "cannot consume nodes of type {:?}",
                node.node_type
            )));
        }
        if node.empty {
            return Err(Error::AlreadyConsumed(format!(
                "\"{}\" is self-closing",
                node.name()
            )));
        }
        let start = self.path.len();
        loop {
            if !self.next()? {
                return Err(self.reader.unexpected_end());
            }
            let stop =
                self.path.len() == start && self.reader.node().node_type == NodeType::EndElement;
            self.handle()?;
            if stop {
                return Ok(());
            }
        }
    }

    /// Add a callback, relative to the current element.
    ///
    /// A callback with an empty path is invoked for the nodes inside the
    /// current element. It can only be added on the start of an element
    /// that is not self-closing, and must not ask for element starts.
    pub fn add_callback<C>(&mut self, callback: C) -> Result<(), Error>
    where
        C: ParserCallback<'a> + 'a,
    {
        self.check_cursor()?;
        if callback.path().iter().all(|segment| segment.is_empty()) {
            let node = self.reader.node();
            if node.node_type != NodeType::Element || node.empty {
                return Err(Error::invalid_input(
                    "an empty path requires the parser to be on the start of an element that is not self-closing",
                ));
            }
            if callback
                .node_types()
                .map_or(true, |types| types.contains(&NodeType::Element))
            {
                return Err(Error::invalid_input(
                    "a callback with an empty path cannot handle element starts",
                ));
            }
        }
        self.registry.register(&self.path, Rc::new(callback));
        Ok(())
    }

    /// Invoke `handler` for the root element.
    pub fn root<F>(&mut self, handler: F) -> Result<(), Error>
    where
        F: Fn(&mut XmlParser<'a>) -> Result<(), Error> + 'a,
    {
        self.check_cursor()?;
        if !self.path.is_empty() {
            return Err(Error::illegal_state(
                "root callbacks can only be added before the root element",
            ));
        }
        self.registry
            .register_root(Rc::new(ElementStartCallback::new(Vec::new(), handler)));
        Ok(())
    }

    /// Invoke `handler` for every element matching `path`.
    pub fn each<F>(&mut self, path: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(&mut XmlParser<'a>) -> Result<(), Error> + 'a,
    {
        let path = self.resolve(path)?;
        self.add_callback(ElementStartCallback::new(path, handler))
    }

    /// Invoke `handler` for every element named like the last segment of
    /// `path` anywhere below the element reached by the other segments.
    pub fn each_recursive<F>(&mut self, path: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(&mut XmlParser<'a>) -> Result<(), Error> + 'a,
    {
        let path = self.resolve(path)?;
        self.add_callback(ElementStartCallback::recursive(path, handler))
    }

    /// Invoke `handler` for the first element matching `path`.
    pub fn first<F>(&mut self, path: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(&mut XmlParser<'a>) -> Result<(), Error> + 'a,
    {
        let done = Cell::new(false);
        self.each(path, move |parser| {
            if done.replace(true) {
                return Ok(());
            }
            handler(parser)
        })
    }

    /// Invoke `handler` with the text of every element matching `path`
    /// once the element has ended.
    pub fn each_value<F>(&mut self, path: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(Option<String>) -> Result<(), Error> + 'a,
    {
        let path = self.resolve(path)?;
        self.add_callback(ElementValueCallback::new(path, move |_, value| {
            handler(value)
        }))
    }

    /// The text of the first element matching `path`. An empty path
    /// requests the text of the current element.
    pub fn value(&mut self, path: &str) -> Result<Slot<Option<String>>, Error> {
        let slot: Slot<Option<String>> = Slot::default();
        let out = slot.clone();
        self.first_value(path, Box::new(move |_: &mut XmlParser<'a>, value: Option<String>| {
            out.set(value);
            Ok(())
        }))?;
        Ok(slot)
    }

    /// Like [`value`](Self::value), converting the text.
    pub fn value_with(
        &mut self,
        path: &str,
        convert: impl Into<Convert>,
    ) -> Result<Slot<Converted>, Error> {
        let convert = convert.into();
        let slot: Slot<Converted> = Slot::default();
        let out = slot.clone();
        self.first_value(path, Box::new(move |parser: &mut XmlParser<'a>, value: Option<String>| {
            out.set(parser.convert_value(value, convert.clone())?);
            Ok(())
        }))?;
        Ok(slot)
    }

    fn first_value(
        &mut self,
        path: &str,
        handler: ValueHandler<'a>,
    ) -> Result<(), Error> {
        if path.is_empty() {
            self.check_cursor()?;
            let node = self.reader.node();
            if node.node_type == NodeType::Element && node.empty {
                return handler(self, None);
            }
            if self.current_value_element == Some(self.element_id) {
                return Err(Error::AlreadyConsumed(
                    "the value of the current element has already been requested".to_string(),
                ));
            }
            self.add_callback(CurrentElementValueCallback::new(handler))?;
            self.current_value_element = Some(self.element_id);
            return Ok(());
        }
        let path = self.resolve(path)?;
        let parsed = Cell::new(false);
        self.add_callback(ElementValueCallback::new(path, move |parser, value| {
            if parsed.replace(true) {
                return Ok(());
            }
            handler(parser, value)
        }))
    }

    /// The texts of all elements matching `path`.
    pub fn collect_value(&mut self, path: &str) -> Result<Slot<Vec<Option<String>>>, Error> {
        let slot: Slot<Vec<Option<String>>> = Slot::default();
        let out = slot.clone();
        let path = self.resolve(path)?;
        self.add_callback(ElementValueCallback::new(path, move |_, value| {
            out.update(|values| values.push(value));
            Ok(())
        }))?;
        Ok(slot)
    }

    /// Like [`collect_value`](Self::collect_value), converting the texts.
    pub fn collect_value_with(
        &mut self,
        path: &str,
        convert: impl Into<Convert>,
    ) -> Result<Slot<Vec<Converted>>, Error> {
        let convert = convert.into();
        let slot: Slot<Vec<Converted>> = Slot::default();
        let out = slot.clone();
        let path = self.resolve(path)?;
        self.add_callback(ElementValueCallback::new(path, move |parser, value| {
            let value = parser.convert_value(value, convert.clone())?;
            out.update(|values| values.push(value));
            Ok(())
        }))?;
        Ok(slot)
    }

    /// The value of attribute `name` of the first element matching `path`
    /// that has it.
    pub fn attribute(&mut self, path: &str, name: &str) -> Result<Slot<Option<String>>, Error> {
        let slot: Slot<Option<String>> = Slot::default();
        let out = slot.clone();
        let name = name.to_string();
        let parsed = Cell::new(false);
        self.each(path, move |parser| {
            if parsed.get() {
                return Ok(());
            }
            if let Some(value) = parser.el_attribute(&name)? {
                out.set(Some(value));
                parsed.set(true);
            }
            Ok(())
        })?;
        Ok(slot)
    }

    /// Like [`attribute`](Self::attribute), converting the value.
    pub fn attribute_with(
        &mut self,
        path: &str,
        name: &str,
        convert: impl Into<Convert>,
    ) -> Result<Slot<Converted>, Error> {
        let convert = convert.into();
        let slot: Slot<Converted> = Slot::default();
        let out = slot.clone();
        let name = name.to_string();
        let parsed = Cell::new(false);
        self.each(path, move |parser| {
            if parsed.get() {
                return Ok(());
            }
            if let Some(value) = parser.el_attribute(&name)? {
                out.set(parser.convert_value(Some(value), convert.clone())?);
                parsed.set(true);
            }
            Ok(())
        })?;
        Ok(slot)
    }

    /// The values of attribute `name` of all elements matching `path`,
    /// `None` for elements without it.
    pub fn collect_attribute(
        &mut self,
        path: &str,
        name: &str,
    ) -> Result<Slot<Vec<Option<String>>>, Error> {
        let slot: Slot<Vec<Option<String>>> = Slot::default();
        let out = slot.clone();
        let name = name.to_string();
        self.each(path, move |parser| {
            let value = parser.el_attribute(&name)?;
            out.update(|values| values.push(value));
            Ok(())
        })?;
        Ok(slot)
    }

    /// Like [`collect_attribute`](Self::collect_attribute), converting the
    /// values. Missing attributes are collected as null without conversion.
    pub fn collect_attribute_with(
        &mut self,
        path: &str,
        name: &str,
        convert: impl Into<Convert>,
    ) -> Result<Slot<Vec<Converted>>, Error> {
        let convert = convert.into();
        let slot: Slot<Vec<Converted>> = Slot::default();
        let out = slot.clone();
        let name = name.to_string();
        self.each(path, move |parser| {
            let value = match parser.el_attribute(&name)? {
                Some(value) => parser.convert_value(Some(value), convert.clone())?,
                None => Converted::Null,
            };
            out.update(|values| values.push(value));
            Ok(())
        })?;
        Ok(slot)
    }

    /// Unserialize `target` from the first element matching `path`.
    pub fn unserialize<T>(&mut self, path: &str, target: T) -> Result<Slot<Option<T>>, Error>
    where
        T: XmlUnserialize + 'a,
    {
        let slot = Slot::new(None);
        let out = slot.clone();
        let target = RefCell::new(Some(target));
        self.each(path, move |parser| {
            let target = target.borrow_mut().take();
            if let Some(mut target) = target {
                target.xml_unserialize(parser)?;
                out.set(Some(target));
            }
            Ok(())
        })?;
        Ok(slot)
    }

    /// Unserialize the first element matching `path` with a function.
    pub fn unserialize_with<T, F>(&mut self, path: &str, f: F) -> Result<Slot<Option<T>>, Error>
    where
        T: 'a,
        F: Fn(&mut XmlParser<'a>) -> Result<T, Error> + 'a,
    {
        let slot = Slot::new(None);
        let out = slot.clone();
        let parsed = Cell::new(false);
        self.each(path, move |parser| {
            if parsed.replace(true) {
                return Ok(());
            }
            let value = f(parser)?;
            out.set(Some(value));
            Ok(())
        })?;
        Ok(slot)
    }

    /// Unserialize a clone of `prototype` from every element matching
    /// `path`.
    pub fn unserialize_all<T>(&mut self, path: &str, prototype: T) -> Result<Slot<Vec<T>>, Error>
    where
        T: XmlUnserialize + Clone + 'a,
    {
        let slot = Slot::new(Vec::new());
        let out = slot.clone();
        self.each(path, move |parser| {
            let mut target = prototype.clone();
            target.xml_unserialize(parser)?;
            out.update(|values| values.push(target));
            Ok(())
        })?;
        Ok(slot)
    }

    /// Unserialize every element matching `path` with a function.
    pub fn unserialize_all_with<T, F>(&mut self, path: &str, f: F) -> Result<Slot<Vec<T>>, Error>
    where
        T: 'a,
        F: Fn(&mut XmlParser<'a>) -> Result<T, Error> + 'a,
    {
        let slot = Slot::new(Vec::new());
        let out = slot.clone();
        self.each(path, move |parser| {
            let value = f(parser)?;
            out.update(|values| values.push(value));
            Ok(())
        })?;
        Ok(slot)
    }

    /// The local name of the current element, `#text` and the like for
    /// other nodes.
    pub fn el_name(&self) -> Result<String, Error> {
        let node = self.current()?;
        Ok(match node.node_type {
            NodeType::Element | NodeType::EndElement => node.local.clone(),
            _ => node.name().into_owned(),
        })
    }

    /// The namespace URI of the current element.
    pub fn el_namespace_uri(&self) -> Result<Option<String>, Error> {
        Ok(self.current()?.namespace.clone())
    }

    /// Whether the current element has attributes, not counting namespace
    /// declarations.
    pub fn el_has_attributes(&self) -> Result<bool, Error> {
        Ok(!self.current()?.attributes.is_empty())
    }

    /// Whether the current element has the given attribute.
    pub fn el_has_attribute(&self, name: &str) -> Result<bool, Error> {
        Ok(self.el_attribute(name)?.is_some())
    }

    /// The value of an attribute of the current element.
    ///
    /// The name is `local`, `prefix:local` with a bound prefix, or
    /// `{uri}local`. A plain name never has a namespace.
    pub fn el_attribute(&self, name: &str) -> Result<Option<String>, Error> {
        let node = self.current()?;
        let (namespace, local) = parse_attribute_name(name, &self.path_context())?;
        Ok(node
            .attributes
            .iter()
            .find(|attribute| attribute.local == local && attribute.namespace == namespace)
            .map(|attribute| attribute.value.clone()))
    }

    /// Call `f` with local name, value and namespace of every attribute of
    /// the current element.
    pub fn el_attributes_each<F>(&self, mut f: F) -> Result<(), Error>
    where
        F: FnMut(&str, &str, Option<&str>),
    {
        for attribute in &self.current()?.attributes {
            f(
                &attribute.local,
                &attribute.value,
                attribute.namespace.as_deref(),
            );
        }
        Ok(())
    }

    /// Whether the current element is self-closing.
    pub fn el_self_closing(&self) -> Result<bool, Error> {
        let node = self.current()?;
        Ok(node.node_type == NodeType::Element && node.empty)
    }

    /// Whether the current node is an end tag.
    pub fn el_closing(&self) -> Result<bool, Error> {
        Ok(self.current()?.node_type == NodeType::EndElement)
    }

    /// The type of the current node.
    pub fn el_type(&self) -> Result<NodeType, Error> {
        Ok(self.current()?.node_type)
    }

    /// The text of the current node, empty for elements.
    pub fn el_value(&self) -> Result<String, Error> {
        let node = self.current()?;
        Ok(match node.node_type {
            NodeType::Element | NodeType::EndElement => String::new(),
            _ => node.value.clone(),
        })
    }

    /// Call `f` once the current element has ended, after the callbacks of
    /// its end tag ran.
    pub fn el_end<F>(&mut self, f: F) -> Result<(), Error>
    where
        F: FnOnce() + 'a,
    {
        let node = self.current()?;
        if node.node_type != NodeType::Element {
            return Err(Error::illegal_state(format!(
                "cannot add an end callback for nodes of type {:?}",
                node.node_type
            )));
        }
        match self.end_callbacks.last_mut() {
            Some(callbacks) => {
                callbacks.push(Box::new(f));
                Ok(())
            }
            None => Err(Error::illegal_state("no element is open")),
        }
    }

    fn check_cursor(&self) -> Result<(), Error> {
        if self.handled_ids.last() == Some(&self.element_id) {
            Ok(())
        } else {
            Err(Error::StaleCursor)
        }
    }

    fn current(&self) -> Result<&Node, Error> {
        self.check_cursor()?;
        Ok(self.reader.node())
    }

    fn path_context(&self) -> PathContext<'_> {
        PathContext {
            prefixes: &self.prefixes,
            current_namespace: self.reader.node().namespace.as_deref(),
            default_namespace: self.xmlns_stack.last().and_then(Option::as_deref),
        }
    }

    fn resolve(&self, path: &str) -> Result<Vec<String>, Error> {
        parse_path(path, self.delimiter, &self.path_context())
    }

    fn push_path(&mut self) {
        let node = self.reader.node();
        self.path
            .push(segment(node.namespace.as_deref(), &node.local));
        let default_namespace = if node.prefix.is_empty() {
            node.namespace.clone()
        } else {
            self.xmlns_stack.last().cloned().flatten()
        };
        self.xmlns_stack.push(default_namespace);
        self.end_callbacks.push(Vec::new());
    }

    fn pop_path(&mut self) {
        self.registry.invalidate(self.path.len());
        self.path.pop();
        self.xmlns_stack.pop();
        self.registry.prune(self.path.len());
        if let Some(callbacks) = self.end_callbacks.pop() {
            for callback in callbacks {
                callback();
            }
        }
    }

    fn should_parse(&mut self) -> bool {
        let depth = self.path.len();
        depth <= 1
            || !self.registry.active(depth, &self.path).is_empty()
            || self.registry.has_subtree(depth, &self.path)
    }

    // Advance to the next node that has to be dispatched.
    fn next(&mut self) -> Result<bool, Error> {
        loop {
            let node = self.reader.node();
            if node.node_type == NodeType::EndElement
                || (node.node_type == NodeType::Element && node.empty)
            {
                self.pop_path();
            }
            if self.root_parsed && self.path.is_empty() {
                return Ok(false);
            }
            if !self.reader.read()? {
                return Ok(false);
            }
            if self.reader.node().node_type == NodeType::Element {
                self.push_path();
                self.root_parsed = true;
                if self.skip_subtrees && !self.should_parse() {
                    trace!(
                        "skipping {} at depth {}",
                        self.reader.node().name(),
                        self.path.len()
                    );
                    self.reader.skip_subtree()?;
                    self.pop_path();
                    continue;
                }
            }
            self.element_id += 1;
            return Ok(true);
        }
    }

    // Invoke the callbacks active for the current node.
    fn handle(&mut self) -> Result<(), Error> {
        let node_type = self.reader.node().node_type;
        let depth = self.path.len();
        let active = self.registry.active(depth, &self.path);
        if !active.is_empty() {
            trace!(
                "{} callbacks active for {:?} at depth {}",
                active.len(),
                node_type,
                depth
            );
        }
        self.handled_ids.push(self.element_id);
        let result = active
            .iter()
            .filter(|entry| {
                entry
                    .callback
                    .node_types()
                    .map_or(true, |types| types.contains(&node_type))
            })
            .try_for_each(|entry| {
                self.check_cursor()?;
                entry.callback.handle(self)
            });
        self.handled_ids.pop();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_and_skip() {
        let mut parser = XmlParser::new("<a><x><b>1</b></x><b>2</b></a>");
        let names = Slot::new(Vec::new());
        let sink = names.clone();
        parser
            .each("a.b", move |parser| {
                let name = parser.el_name()?;
                sink.update(|names| names.push(name));
                Ok(())
            })
            .unwrap();
        parser.parse().unwrap();
        assert_eq!(names.get(), vec!["b".to_string()]);
    }

    #[test]
    fn test_parse_twice() {
        let mut parser = XmlParser::new("<a/>");
        parser.parse().unwrap();
        assert!(matches!(parser.parse(), Err(Error::AlreadyStarted)));
    }

    #[test]
    fn test_accessors_after_parse_are_stale() {
        let mut parser = XmlParser::new("<a/>");
        parser.parse().unwrap();
        assert!(matches!(parser.el_name(), Err(Error::StaleCursor)));
    }

    #[test]
    fn test_root_only_at_top() {
        let mut parser = XmlParser::new("<a><b/></a>");
        let err = Slot::new(false);
        let sink = err.clone();
        parser
            .each("a.b", move |parser| {
                let result = parser.root(|_| Ok(()));
                sink.set(matches!(result, Err(Error::IllegalState(_))));
                Ok(())
            })
            .unwrap();
        parser.parse().unwrap();
        assert!(err.get());
    }

    #[test]
    fn test_empty_path_needs_open_element() {
        let mut parser = XmlParser::new("<a/>");
        let result = parser.add_callback(CurrentElementValueCallback::new(|_, _| Ok(())));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_prefix_conflict() {
        let mut parser = XmlParser::new("<a/>");
        parser.prefix("p", "urn:p").unwrap();
        parser.prefix("p", "urn:p").unwrap();
        assert!(matches!(
            parser.prefix("p", "urn:q"),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            parser.prefix("xml", "urn:q"),
            Err(Error::InvalidInput(_))
        ));
    }
}
