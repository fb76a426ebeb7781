// Low-level XML emission. The writer knows nothing about the builder's
// stack discipline or namespace resolution; it renders already resolved
// names into a string buffer, closes start tags lazily and takes care of
// escaping and indentation. The builder drains the buffer on flush.

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8};

use crate::entity::{serialize_attribute, serialize_text};
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    // start tag is still open: `<foo a="b"`
    Name,
    // inside an attribute value: `<foo a="b`
    Attribute,
    // start tag closed, content follows
    Text,
    Comment,
    CData,
}

#[derive(Debug)]
struct Entry {
    name: String,
    state: State,
    // namespace declarations to emit when the start tag closes
    namespaces: Vec<(String, String)>,
}

impl Entry {
    fn new(name: &str, state: State) -> Self {
        Self {
            name: name.to_string(),
            state,
            namespaces: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct XmlWriter {
    buffer: String,
    stack: Vec<Entry>,
    indent: bool,
    indent_string: String,
    do_indent: bool,
    encoding: &'static Encoding,
}

impl XmlWriter {
    pub(crate) fn new() -> Self {
        Self {
            buffer: String::new(),
            stack: Vec::new(),
            indent: false,
            indent_string: "\t".to_string(),
            do_indent: false,
            encoding: UTF_8,
        }
    }

    pub(crate) fn set_indent(&mut self, indent: bool, indent_string: &str) {
        self.indent = indent;
        self.indent_string = indent_string.to_string();
    }

    pub(crate) fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    pub(crate) fn take_buffer(&mut self) -> String {
        std::mem::take(&mut self.buffer)
    }

    fn write_indent(&mut self) {
        let level = self.stack.len().saturating_sub(1);
        for _ in 0..level {
            self.buffer.push_str(&self.indent_string);
        }
    }

    fn write_namespace_declarations(&mut self) {
        if let Some(entry) = self.stack.last_mut() {
            for (prefix, uri) in entry.namespaces.drain(..) {
                self.buffer.push_str(" xmlns");
                if !prefix.is_empty() {
                    self.buffer.push(':');
                    self.buffer.push_str(&prefix);
                }
                self.buffer.push_str("=\"");
                self.buffer.push_str(&serialize_attribute(Cow::Owned(uri)));
                self.buffer.push('"');
            }
        }
    }

    // finish the start tag of the parent before any content is written
    fn close_start_tag(&mut self, newline: bool) -> Result<(), Error> {
        match self.stack.last().map(|entry| entry.state) {
            Some(State::Name) => {
                self.write_namespace_declarations();
                self.buffer.push('>');
                if newline && self.indent {
                    self.buffer.push('\n');
                }
                if let Some(entry) = self.stack.last_mut() {
                    entry.state = State::Text;
                }
                Ok(())
            }
            Some(State::Attribute) => Err(Error::illegal_state(
                "cannot write content while an attribute is open",
            )),
            _ => Ok(()),
        }
    }

    pub(crate) fn start_document(
        &mut self,
        version: &str,
        encoding: Option<&str>,
        standalone: Option<bool>,
    ) -> Result<(), Error> {
        let label = encoding.unwrap_or("UTF-8");
        self.encoding = crate::encoding::output_encoding(label)?;
        self.buffer.push_str("<?xml version=\"");
        self.buffer.push_str(version);
        self.buffer.push_str("\" encoding=\"");
        self.buffer.push_str(label);
        self.buffer.push('"');
        if let Some(standalone) = standalone {
            self.buffer.push_str(" standalone=\"");
            self.buffer.push_str(if standalone { "yes" } else { "no" });
            self.buffer.push('"');
        }
        self.buffer.push_str("?>\n");
        Ok(())
    }

    pub(crate) fn end_document(&mut self) {
        if !self.indent {
            self.buffer.push('\n');
        }
    }

    pub(crate) fn start_element(
        &mut self,
        qname: &str,
        declare: Option<(&str, &str)>,
    ) -> Result<(), Error> {
        self.close_start_tag(true)?;
        let mut entry = Entry::new(qname, State::Name);
        if let Some((prefix, uri)) = declare {
            entry.namespaces.push((prefix.to_string(), uri.to_string()));
        }
        self.stack.push(entry);
        if self.indent {
            self.write_indent();
        }
        self.buffer.push('<');
        self.buffer.push_str(qname);
        Ok(())
    }

    pub(crate) fn end_element(&mut self, force_end_tag: bool) -> Result<(), Error> {
        let state = self
            .stack
            .last()
            .map(|entry| entry.state)
            .ok_or_else(|| Error::illegal_state("no element to end"))?;
        match state {
            State::Name => {
                self.write_namespace_declarations();
                if force_end_tag {
                    self.buffer.push('>');
                    self.do_indent = false;
                    self.write_end_tag();
                } else {
                    self.do_indent = self.indent;
                    self.buffer.push_str("/>");
                }
            }
            State::Text => {
                if self.indent && self.do_indent {
                    self.write_indent();
                }
                self.write_end_tag();
            }
            _ => return Err(Error::illegal_state("no element to end")),
        }
        if self.indent {
            self.buffer.push('\n');
        }
        self.stack.pop();
        Ok(())
    }

    fn write_end_tag(&mut self) {
        self.do_indent = true;
        if let Some(entry) = self.stack.last() {
            self.buffer.push_str("</");
            self.buffer.push_str(&entry.name);
            self.buffer.push('>');
        }
    }

    pub(crate) fn start_attribute(
        &mut self,
        qname: &str,
        declare: Option<(&str, &str)>,
    ) -> Result<(), Error> {
        let entry = match self.stack.last_mut() {
            Some(entry) if entry.state == State::Name => entry,
            _ => {
                return Err(Error::illegal_state(
                    "attributes must be written before element content",
                ))
            }
        };
        if let Some((prefix, uri)) = declare {
            match entry.namespaces.iter().find(|(p, _)| p == prefix) {
                Some((_, existing)) if existing != uri => {
                    return Err(Error::illegal_state(format!(
                        "prefix \"{}\" is already declared for another namespace",
                        prefix
                    )))
                }
                Some(_) => {}
                None => entry
                    .namespaces
                    .push((prefix.to_string(), uri.to_string())),
            }
        }
        entry.state = State::Attribute;
        self.buffer.push(' ');
        self.buffer.push_str(qname);
        self.buffer.push_str("=\"");
        Ok(())
    }

    pub(crate) fn end_attribute(&mut self) -> Result<(), Error> {
        match self.stack.last_mut() {
            Some(entry) if entry.state == State::Attribute => {
                entry.state = State::Name;
                self.buffer.push('"');
                Ok(())
            }
            _ => Err(Error::illegal_state("no attribute started")),
        }
    }

    pub(crate) fn text(&mut self, content: &str) -> Result<(), Error> {
        match self.stack.last().map(|entry| entry.state) {
            Some(State::Name) => {
                self.close_start_tag(false)?;
                self.buffer
                    .push_str(&serialize_text(Cow::Borrowed(content)));
            }
            Some(State::Text) => self
                .buffer
                .push_str(&serialize_text(Cow::Borrowed(content))),
            Some(State::Attribute) => self
                .buffer
                .push_str(&serialize_attribute(Cow::Borrowed(content))),
            Some(State::Comment) | Some(State::CData) => self.buffer.push_str(content),
            None => return Err(Error::illegal_state("cannot write text outside element")),
        }
        self.do_indent = false;
        Ok(())
    }

    pub(crate) fn start_comment(&mut self) -> Result<(), Error> {
        self.close_start_tag(true)?;
        self.stack.push(Entry::new("", State::Comment));
        if self.indent {
            self.write_indent();
        }
        self.buffer.push_str("<!--");
        Ok(())
    }

    pub(crate) fn end_comment(&mut self) -> Result<(), Error> {
        match self.stack.last() {
            Some(entry) if entry.state == State::Comment => {
                self.buffer.push_str("-->");
                if self.indent {
                    self.buffer.push('\n');
                }
                self.stack.pop();
                Ok(())
            }
            _ => Err(Error::illegal_state("no comment started")),
        }
    }

    pub(crate) fn start_cdata(&mut self) -> Result<(), Error> {
        self.close_start_tag(false)?;
        self.stack.push(Entry::new("", State::CData));
        self.buffer.push_str("<![CDATA[");
        Ok(())
    }

    pub(crate) fn end_cdata(&mut self) -> Result<(), Error> {
        match self.stack.last() {
            Some(entry) if entry.state == State::CData => {
                self.buffer.push_str("]]>");
                self.stack.pop();
                Ok(())
            }
            _ => Err(Error::illegal_state("no CDATA section started")),
        }
    }

    pub(crate) fn write_dtd(&mut self, name: &str, public_id: Option<&str>, system_id: &str) {
        self.buffer.push_str("<!DOCTYPE ");
        self.buffer.push_str(name);
        match public_id {
            Some(public_id) => {
                self.buffer.push_str(" PUBLIC \"");
                self.buffer.push_str(public_id);
                self.buffer.push_str("\" \"");
            }
            None => self.buffer.push_str(" SYSTEM \""),
        }
        self.buffer.push_str(system_id);
        self.buffer.push_str("\">");
        if self.indent {
            self.buffer.push('\n');
        }
    }
}

/// Whether `name` is a valid XML name without a colon.
pub(crate) fn is_valid_ncname(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if is_name_start_char(c) => chars.all(is_name_char),
        _ => false,
    }
}

fn is_name_start_char(c: char) -> bool {
    c.is_ascii_alphabetic()
        || c == '_'
        || ((c as u32) >= 0xC0 && !matches!(c, '\u{D7}' | '\u{F7}'))
}

fn is_name_char(c: char) -> bool {
    is_name_start_char(c) || c.is_ascii_digit() || matches!(c, '-' | '.' | '\u{B7}')
}
