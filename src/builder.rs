use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::rc::Rc;

use ahash::HashMap;
use log::{debug, trace};

use crate::data::{
    Data, DataKind, Key, XmlSerializable, ATTRIBUTE_MARKER, CONTENT_KEY, INLINE_TAG_MARKER,
    NAMESPACE_MARKER, TAG_KEY,
};
use crate::encoding::encode;
use crate::error::Error;
use crate::namespace::{NamespaceScopes, ResolvedName};
use crate::serialize;
use crate::writer::{is_valid_ncname, XmlWriter};

/// Handler writing a value of a given [`DataKind`] as element content.
pub type ContentHandler<'a> =
    Rc<dyn Fn(&Data<'_>, &mut XmlBuilder<'_>) -> Result<(), Error> + 'a>;

/// Handler turning a value of a given [`DataKind`] into attribute text.
/// Returning `None` writes an empty attribute.
pub type AttributeHandler<'a> =
    Rc<dyn Fn(&Data<'_>, &mut XmlBuilder<'_>) -> Result<Option<String>, Error> + 'a>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Document,
    Element,
    Attribute,
    Comment,
    CData,
}

enum Target<'a> {
    Memory(Vec<u8>),
    Stream(Box<dyn Write + 'a>),
}

/// Incremental XML writer with namespace resolution.
///
/// The builder keeps a stack of open document, element, attribute, comment
/// and CDATA frames and rejects every call that would produce malformed XML
/// before anything is written. Element and attribute names can be given as
/// plain names, as `prefix:local` with a declared prefix, or as
/// `{uri}local`, in which case a prefix is looked up or generated and
/// declared automatically.
///
/// ```rust
/// use easyxml::XmlBuilder;
///
/// let mut builder = XmlBuilder::new();
/// builder
///     .start_document()?
///     .start_element("{http://example.com}doc")?
///     .write_element("p", "hello")?
///     .end_element()?
///     .end_document()?;
/// assert_eq!(
///     builder.output()?,
///     "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<a:doc xmlns:a=\"http://example.com\"><p>hello</p></a:doc>\n"
/// );
/// # Ok::<(), easyxml::Error>(())
/// ```
pub struct XmlBuilder<'a> {
    writer: XmlWriter,
    target: Target<'a>,
    stack: Vec<Frame>,
    namespaces: NamespaceScopes,
    root_exists: bool,
    document_ended: bool,
    // (prefix, value so far) of an xmlns attribute being written
    namespace_attribute: Option<(String, String)>,
    // last two characters written to the open comment or CDATA section
    tail: String,
    // namespace prefixes declared on the open start tag
    declared: Vec<String>,
    handlers: HashMap<DataKind, ContentHandler<'a>>,
    attribute_handlers: HashMap<DataKind, AttributeHandler<'a>>,
    auto_flush: Option<usize>,
    buffer_size: usize,
}

impl Default for XmlBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> XmlBuilder<'a> {
    fn with_target(target: Target<'a>) -> Self {
        XmlBuilder {
            writer: XmlWriter::new(),
            target,
            stack: Vec::new(),
            namespaces: NamespaceScopes::new(),
            root_exists: false,
            document_ended: false,
            namespace_attribute: None,
            tail: String::new(),
            declared: Vec::new(),
            handlers: HashMap::default(),
            attribute_handlers: HashMap::default(),
            auto_flush: None,
            buffer_size: 0,
        }
    }

    /// Create a builder writing to memory. Retrieve the result with
    /// [`XmlBuilder::output`].
    pub fn new() -> Self {
        Self::with_target(Target::Memory(Vec::new()))
    }

    /// Create a builder writing to the given sink.
    ///
    /// Pass `&mut writer` to keep ownership of the sink; the builder never
    /// closes it.
    pub fn from_writer<W: Write + 'a>(writer: W) -> Self {
        Self::with_target(Target::Stream(Box::new(writer)))
    }

    /// Create a builder writing to a newly created file.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = File::create(path)?;
        Ok(Self::from_writer(BufWriter::new(file)))
    }

    /// Flush automatically whenever more than `buffer_size` bytes were
    /// written since the last flush.
    ///
    /// Not available when writing to memory.
    pub fn auto_flush(&mut self, buffer_size: usize) -> Result<&mut Self, Error> {
        if matches!(self.target, Target::Memory(_)) {
            return Err(Error::illegal_state(
                "automatic flush cannot be used when writing to memory",
            ));
        }
        if buffer_size == 0 {
            return Err(Error::invalid_input("buffer size must be greater than 0"));
        }
        self.auto_flush = Some(buffer_size);
        Ok(self)
    }

    /// Enable or disable indentation.
    pub fn set_indent(&mut self, indent: bool, indent_string: &str) -> &mut Self {
        self.writer.set_indent(indent, indent_string);
        self
    }

    /// Set the handler used when a value of the given kind is written as
    /// element content.
    pub fn set_handler<F>(&mut self, kind: DataKind, handler: F) -> &mut Self
    where
        F: Fn(&Data<'_>, &mut XmlBuilder<'_>) -> Result<(), Error> + 'a,
    {
        self.handlers.insert(kind, Rc::new(handler));
        self
    }

    /// Set the handler used when a value of the given kind is written as
    /// attribute value.
    pub fn set_attribute_handler<F>(&mut self, kind: DataKind, handler: F) -> &mut Self
    where
        F: Fn(&Data<'_>, &mut XmlBuilder<'_>) -> Result<Option<String>, Error> + 'a,
    {
        self.attribute_handlers.insert(kind, Rc::new(handler));
        self
    }

    /// Write pending output to the target. Returns the number of bytes
    /// written.
    pub fn flush(&mut self) -> Result<usize, Error> {
        let pending = self.writer.take_buffer();
        let bytes = encode(&pending, self.writer.encoding());
        match &mut self.target {
            Target::Memory(memory) => memory.extend_from_slice(&bytes),
            Target::Stream(stream) => {
                stream.write_all(&bytes)?;
                stream.flush()?;
            }
        }
        trace!("flushed {} bytes", bytes.len());
        Ok(bytes.len())
    }

    /// Take everything written to memory so far.
    pub fn output_bytes(&mut self) -> Result<Vec<u8>, Error> {
        self.flush()?;
        match &mut self.target {
            Target::Memory(memory) => Ok(std::mem::take(memory)),
            Target::Stream(_) => Err(Error::illegal_state(
                "output is only available when writing to memory",
            )),
        }
    }

    /// Take everything written to memory so far as a string.
    ///
    /// Fails if the document encoding is not UTF-8 compatible; use
    /// [`XmlBuilder::output_bytes`] then.
    pub fn output(&mut self) -> Result<String, Error> {
        String::from_utf8(self.output_bytes()?)
            .map_err(|_| Error::Encoding("output is not valid UTF-8".to_string()))
    }

    fn top(&self) -> Option<Frame> {
        self.stack.last().copied()
    }

    fn perform_auto_flush(&mut self, force: bool) -> Result<(), Error> {
        if let Some(limit) = self.auto_flush {
            if force || self.buffer_size > limit {
                debug!("auto flush after {} bytes", self.buffer_size);
                self.flush()?;
                self.buffer_size = 0;
            }
        }
        Ok(())
    }

    fn account(&mut self, name: &ResolvedName) {
        self.buffer_size += name.prefix.as_ref().map_or(0, |p| p.len())
            + name.local.len()
            + name.declare.as_ref().map_or(0, |uri| uri.len());
    }

    /// Write the XML declaration: version 1.0, UTF-8.
    pub fn start_document(&mut self) -> Result<&mut Self, Error> {
        self.start_document_with("1.0", None, None)
    }

    /// Write the XML declaration.
    ///
    /// The output is encoded in `encoding`; characters it can't represent
    /// are written as character references.
    pub fn start_document_with(
        &mut self,
        version: &str,
        encoding: Option<&str>,
        standalone: Option<bool>,
    ) -> Result<&mut Self, Error> {
        if !self.stack.is_empty() || self.document_ended {
            return Err(Error::illegal_state("document already started"));
        }
        self.writer.start_document(version, encoding, standalone)?;
        self.stack.push(Frame::Document);
        Ok(self)
    }

    /// End the document. Flushes if auto flush is active.
    pub fn end_document(&mut self) -> Result<&mut Self, Error> {
        if self.top() != Some(Frame::Document) || self.stack.len() != 1 {
            return Err(Error::illegal_state(
                "cannot end document, not all nodes are closed",
            ));
        }
        self.writer.end_document();
        self.stack.pop();
        self.document_ended = true;
        self.perform_auto_flush(true)?;
        Ok(self)
    }

    /// Start an element without attributes.
    pub fn start_element(&mut self, name: &str) -> Result<&mut Self, Error> {
        self.start_element_with_options(name, Vec::<(String, Data)>::new(), true)
    }

    /// Start an element with attributes.
    ///
    /// `xmlns` and `xmlns:*` attributes declare namespaces for the new
    /// element; declarations that are already in effect with the same
    /// prefix are dropped.
    pub fn start_element_with_attributes<'d, K, V, I>(
        &mut self,
        name: &str,
        attributes: I,
    ) -> Result<&mut Self, Error>
    where
        K: Into<String>,
        V: Into<Data<'d>>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.start_element_with_options(name, attributes, true)
    }

    /// Start an element with attributes, optionally keeping namespace
    /// declarations that are already in effect.
    pub fn start_element_with_options<'d, K, V, I>(
        &mut self,
        name: &str,
        attributes: I,
        deduplicate_namespaces: bool,
    ) -> Result<&mut Self, Error>
    where
        K: Into<String>,
        V: Into<Data<'d>>,
        I: IntoIterator<Item = (K, V)>,
    {
        match self.top() {
            Some(Frame::Element) => {}
            Some(Frame::Document) if self.root_exists => {
                return Err(Error::illegal_state(
                    "cannot create another element after root node",
                ))
            }
            Some(Frame::Document) => {}
            _ => {
                return Err(Error::illegal_state(
                    "cannot start element outside document or another element",
                ))
            }
        }
        let mut attributes: Vec<(String, Data<'d>)> = attributes
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        let scope = self.extract_namespaces(&mut attributes, deduplicate_namespaces);
        self.namespaces.push(scope);
        let name = match self
            .namespaces
            .resolve_element(name)
            .and_then(validate_name)
        {
            Ok(name) => name,
            Err(err) => {
                self.namespaces.pop();
                return Err(err);
            }
        };
        let declare = match (&name.prefix, &name.declare) {
            (Some(prefix), Some(uri)) => Some((prefix.as_str(), uri.as_str())),
            _ => None,
        };
        if let Err(err) = self.writer.start_element(&name.qualified(), declare) {
            self.namespaces.pop();
            return Err(err);
        }
        self.declared.clear();
        if let Some((prefix, _)) = declare {
            self.declared.push(prefix.to_string());
        }
        self.stack.push(Frame::Element);
        self.root_exists = true;

        self.account(&name);
        self.perform_auto_flush(false)?;

        self.write_attributes(attributes)?;
        Ok(self)
    }

    fn extract_namespaces(
        &self,
        attributes: &mut Vec<(String, Data)>,
        deduplicate: bool,
    ) -> Vec<(String, String)> {
        let mut scope = Vec::new();
        let mut kept = Vec::with_capacity(attributes.len());
        for (name, value) in attributes.drain(..) {
            let prefix = if name == "xmlns" {
                Some("")
            } else {
                name.strip_prefix("xmlns:")
            };
            if let Some(prefix) = prefix {
                let uri = value.to_text().unwrap_or_default();
                if deduplicate && self.namespaces.prefix_by_namespace(&uri, true) == Some(prefix) {
                    // already declared with this prefix
                    continue;
                }
                scope.push((prefix.to_string(), uri));
            }
            kept.push((name, value));
        }
        *attributes = kept;
        scope
    }

    /// End the current element, self-closing it if it has no content.
    pub fn end_element(&mut self) -> Result<&mut Self, Error> {
        self.close_element(false)
    }

    /// End the current element, always writing an end tag.
    pub fn force_end_element(&mut self) -> Result<&mut Self, Error> {
        self.close_element(true)
    }

    fn close_element(&mut self, force_end_tag: bool) -> Result<&mut Self, Error> {
        if self.top() != Some(Frame::Element) {
            return Err(Error::illegal_state("no element started"));
        }
        self.writer.end_element(force_end_tag)?;
        self.stack.pop();
        self.namespaces.pop();
        Ok(self)
    }

    /// Write an element with the given content.
    pub fn write_element<'d>(
        &mut self,
        name: &str,
        content: impl Into<Data<'d>>,
    ) -> Result<&mut Self, Error> {
        self.write_element_with_attributes(name, content, Vec::<(String, Data)>::new())
    }

    /// Write an element with the given content and attributes.
    pub fn write_element_with_attributes<'d, K, V, I>(
        &mut self,
        name: &str,
        content: impl Into<Data<'d>>,
        attributes: I,
    ) -> Result<&mut Self, Error>
    where
        K: Into<String>,
        V: Into<Data<'d>>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.start_element_with_attributes(name, attributes)?;
        self.write(content)?;
        self.end_element()
    }

    /// Start an attribute on the current element.
    pub fn start_attribute(&mut self, name: &str) -> Result<&mut Self, Error> {
        if self.top() != Some(Frame::Element) {
            return Err(Error::illegal_state("cannot start attribute outside element"));
        }
        let name = self
            .namespaces
            .resolve_attribute(name)
            .and_then(validate_name)?;
        let declaring = match name.prefix.as_deref() {
            Some("xmlns") => Some(name.local.as_str()),
            None if name.local == "xmlns" => Some(""),
            _ => None,
        };
        if let Some(prefix) = declaring {
            if self.declared.iter().any(|declared| declared == prefix) {
                return Err(Error::invalid_input(format!(
                    "namespace prefix \"{}\" is already declared on this element",
                    prefix
                )));
            }
        }
        let declare = match (&name.prefix, &name.declare) {
            (Some(prefix), Some(uri)) => Some((prefix.as_str(), uri.as_str())),
            _ => None,
        };
        self.writer.start_attribute(&name.qualified(), declare)?;
        self.stack.push(Frame::Attribute);

        for prefix in declare.map(|(prefix, _)| prefix).into_iter().chain(declaring) {
            self.declared.push(prefix.to_string());
        }
        self.namespace_attribute = declaring.map(|prefix| (prefix.to_string(), String::new()));

        self.account(&name);
        self.perform_auto_flush(false)?;
        Ok(self)
    }

    /// End the current attribute. An `xmlns` attribute binds its value in
    /// the current element's scope now.
    pub fn end_attribute(&mut self) -> Result<&mut Self, Error> {
        if self.top() != Some(Frame::Attribute) {
            return Err(Error::illegal_state("no attribute started"));
        }
        self.writer.end_attribute()?;
        self.stack.pop();
        if let Some((prefix, uri)) = self.namespace_attribute.take() {
            self.namespaces.bind(&prefix, &uri);
        }
        Ok(self)
    }

    /// Write an attribute. A handler registered for the value's kind is
    /// applied first.
    pub fn write_attribute<'d>(
        &mut self,
        name: &str,
        value: impl Into<Data<'d>>,
    ) -> Result<&mut Self, Error> {
        let value = value.into();
        let handler = value
            .kind()
            .and_then(|kind| self.attribute_handlers.get(&kind).cloned());
        let text = match handler {
            Some(handler) => handler(&value, self)?,
            None => match value {
                Data::Map(_) | Data::Deferred(_) | Data::Object(_) => {
                    return Err(Error::invalid_input(format!(
                        "value of attribute \"{}\" must be a scalar",
                        name
                    )))
                }
                scalar => scalar.to_text(),
            },
        };
        self.start_attribute(name)?;
        if let Some(text) = text {
            self.text(&text)?;
        }
        self.end_attribute()
    }

    /// Write attributes in order.
    pub fn write_attributes<'d, K, V, I>(&mut self, attributes: I) -> Result<&mut Self, Error>
    where
        K: Into<String>,
        V: Into<Data<'d>>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (name, value) in attributes {
            let name: String = name.into();
            self.write_attribute(&name, value)?;
        }
        Ok(self)
    }

    /// Start a comment.
    pub fn start_comment(&mut self) -> Result<&mut Self, Error> {
        if !matches!(self.top(), Some(Frame::Element) | Some(Frame::Document)) {
            return Err(Error::illegal_state(
                "cannot start comment outside document or element",
            ));
        }
        self.writer.start_comment()?;
        self.stack.push(Frame::Comment);
        self.tail.clear();
        Ok(self)
    }

    /// End the current comment.
    pub fn end_comment(&mut self) -> Result<&mut Self, Error> {
        if self.top() != Some(Frame::Comment) {
            return Err(Error::illegal_state("no comment started"));
        }
        self.writer.end_comment()?;
        self.stack.pop();
        Ok(self)
    }

    /// Write a comment.
    pub fn write_comment(&mut self, comment: &str) -> Result<&mut Self, Error> {
        if comment.contains("-->") {
            return Err(comment_error());
        }
        self.start_comment()?.text(comment)?.end_comment()
    }

    /// Start a CDATA section.
    pub fn start_cdata(&mut self) -> Result<&mut Self, Error> {
        if self.top() != Some(Frame::Element) {
            return Err(Error::illegal_state("cannot start CDATA outside element"));
        }
        self.writer.start_cdata()?;
        self.stack.push(Frame::CData);
        self.tail.clear();
        Ok(self)
    }

    /// End the current CDATA section.
    pub fn end_cdata(&mut self) -> Result<&mut Self, Error> {
        if self.top() != Some(Frame::CData) {
            return Err(Error::illegal_state("no CDATA started"));
        }
        self.writer.end_cdata()?;
        self.stack.pop();
        Ok(self)
    }

    /// Write a CDATA section.
    pub fn write_cdata(&mut self, content: &str) -> Result<&mut Self, Error> {
        self.start_cdata()?.data(content)?.end_cdata()
    }

    /// Write data to the current CDATA section.
    ///
    /// `]]>` is split over two sections so the content survives unchanged,
    /// also when it spans several calls.
    pub fn data(&mut self, content: &str) -> Result<&mut Self, Error> {
        if self.top() != Some(Frame::CData) {
            return Err(Error::illegal_state(
                "cannot append data outside CDATA block",
            ));
        }
        let mut brackets = self.tail.chars().rev().take_while(|c| *c == ']').count();
        let mut escaped = String::with_capacity(content.len());
        for c in content.chars() {
            if c == '>' && brackets >= 2 {
                escaped.push_str("]]><![CDATA[");
            }
            brackets = if c == ']' { brackets + 1 } else { 0 };
            escaped.push(c);
        }
        self.writer.text(&escaped)?;
        self.remember_tail(content);
        self.buffer_size += escaped.len();
        self.perform_auto_flush(false)?;
        Ok(self)
    }

    /// Write text to the current element, attribute or comment.
    pub fn text(&mut self, content: &str) -> Result<&mut Self, Error> {
        match self.top() {
            Some(Frame::Element) | Some(Frame::Attribute) => {}
            Some(Frame::Comment) => {
                if format!("{}{}", self.tail, content).contains("-->") {
                    return Err(comment_error());
                }
            }
            _ => {
                return Err(Error::illegal_state(
                    "cannot append text outside element or attribute",
                ))
            }
        }
        self.writer.text(content)?;
        if self.top() == Some(Frame::Comment) {
            self.remember_tail(content);
        }
        if let Some((_, value)) = &mut self.namespace_attribute {
            value.push_str(content);
        }
        self.buffer_size += content.len();
        self.perform_auto_flush(false)?;
        Ok(self)
    }

    fn remember_tail(&mut self, content: &str) {
        self.tail.push_str(content);
        let keep = self
            .tail
            .char_indices()
            .rev()
            .nth(1)
            .map_or(0, |(index, _)| index);
        self.tail.drain(..keep);
    }

    /// Write a `<!DOCTYPE name SYSTEM "identifier">` declaration.
    pub fn write_system_dtd(&mut self, name: &str, identifier: &str) -> Result<&mut Self, Error> {
        self.write_dtd(name, None, identifier)
    }

    /// Write a `<!DOCTYPE name PUBLIC "public" "system">` declaration.
    pub fn write_public_dtd(
        &mut self,
        name: &str,
        public_identifier: &str,
        system_identifier: &str,
    ) -> Result<&mut Self, Error> {
        self.write_dtd(name, Some(public_identifier), system_identifier)
    }

    fn write_dtd(
        &mut self,
        name: &str,
        public_identifier: Option<&str>,
        system_identifier: &str,
    ) -> Result<&mut Self, Error> {
        if self.root_exists {
            return Err(Error::illegal_state("cannot create DTD after root node"));
        }
        if self.top() != Some(Frame::Document) {
            return Err(Error::illegal_state("cannot create DTD outside document"));
        }
        if !is_valid_ncname(name) {
            return Err(Error::invalid_input("Invalid DTD Name"));
        }
        self.writer
            .write_dtd(name, public_identifier, system_identifier);
        Ok(self)
    }

    /// Write structured data.
    ///
    /// - scalars are written as text, through the handler registered for
    ///   their kind if there is one; `Null` writes nothing
    /// - a map with a `>` key is one element: `>` holds the name, `@` the
    ///   content, `@name` keys attributes and `:prefix` keys namespace
    ///   declarations
    /// - any other map is a sequence of sibling writes: index keys are
    ///   written as is, `<name` keys write their map value as element
    ///   `name`, other keys write an element with that name
    /// - deferred functions and serializable objects are invoked with the
    ///   builder
    pub fn write<'d>(&mut self, data: impl Into<Data<'d>>) -> Result<&mut Self, Error> {
        match data.into() {
            Data::Null => {}
            Data::Map(entries) => self.write_map(entries)?,
            Data::Deferred(f) => f(self)?,
            Data::Object(object) => object.xml_serialize(self)?,
            scalar => {
                let handler = scalar
                    .kind()
                    .and_then(|kind| self.handlers.get(&kind).cloned());
                match handler {
                    Some(handler) => handler(&scalar, self)?,
                    None => {
                        if let Some(text) = scalar.to_text() {
                            self.text(&text)?;
                        }
                    }
                }
            }
        }
        Ok(self)
    }

    fn write_map<'d>(&mut self, entries: Vec<(Key, Data<'d>)>) -> Result<(), Error> {
        let is_element = entries.iter().any(|(key, value)| {
            matches!(key, Key::Name(name) if name == TAG_KEY) && value.is_truthy()
        });
        if is_element {
            return self.write_element_map(entries);
        }
        for (key, value) in entries {
            match key {
                Key::Index(_) => {
                    self.write(value)?;
                }
                Key::Name(name) => {
                    if let Some(tag) = name.strip_prefix(INLINE_TAG_MARKER) {
                        let mut inner = match value {
                            Data::Map(inner) => inner,
                            _ => {
                                return Err(Error::invalid_input(format!(
                                    "expected map as value of key \"{}\"",
                                    name
                                )))
                            }
                        };
                        inner.retain(|(key, _)| !matches!(key, Key::Name(k) if k == TAG_KEY));
                        inner.push((Key::Name(TAG_KEY.to_string()), Data::Text(tag.to_string())));
                        self.write_element_map(inner)?;
                    } else {
                        self.write_element(&name, value)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn write_element_map<'d>(&mut self, entries: Vec<(Key, Data<'d>)>) -> Result<(), Error> {
        let mut tag = None;
        let mut content = Data::Null;
        let mut attributes = Vec::new();
        for (key, value) in entries {
            let name = match key {
                Key::Name(name) => name,
                Key::Index(index) => {
                    return Err(Error::invalid_input(format!(
                        "expected attribute name prefixed with \"@\" or \":\", got {}",
                        index
                    )))
                }
            };
            if name == TAG_KEY {
                tag = value.to_text();
            } else if name == CONTENT_KEY {
                content = value;
            } else if let Some(attribute) = name.strip_prefix(ATTRIBUTE_MARKER) {
                attributes.push((attribute.to_string(), value));
            } else if let Some(prefix) = name.strip_prefix(NAMESPACE_MARKER) {
                let attribute = if prefix.is_empty() {
                    "xmlns".to_string()
                } else {
                    format!("xmlns:{}", prefix)
                };
                attributes.push((attribute, value));
            } else {
                return Err(Error::invalid_input(format!(
                    "expected attribute name prefixed with \"@\" or \":\", got \"{}\"",
                    name
                )));
            }
        }
        let tag = tag.ok_or_else(|| Error::invalid_input("element tag must be text"))?;
        self.write_element_with_attributes(&tag, content, attributes)?;
        Ok(())
    }

    /// Invoke `callback` with the builder for every item.
    pub fn each<T, F>(
        &mut self,
        items: impl IntoIterator<Item = T>,
        callback: F,
    ) -> Result<&mut Self, Error>
    where
        F: Fn(&mut XmlBuilder<'_>, &T, usize) -> Result<(), Error>,
    {
        self.write(serialize::each(items, callback))
    }

    /// Write the value `callback` returns for every item.
    pub fn map<'d, T, F>(
        &mut self,
        items: impl IntoIterator<Item = T>,
        callback: F,
    ) -> Result<&mut Self, Error>
    where
        T: 'd,
        F: Fn(&T, usize) -> Data<'d> + 'd,
    {
        self.write(serialize::map(items, callback))
    }

    /// Invoke `callback` with the builder if `condition` is true.
    pub fn when<'d, F>(
        &mut self,
        condition: impl Into<crate::data::Lazy<'d, bool>>,
        callback: F,
    ) -> Result<&mut Self, Error>
    where
        F: Fn(&mut XmlBuilder<'_>) -> Result<(), Error> + 'd,
    {
        self.write(serialize::when(condition, callback))
    }

    /// Write `then` if `expression` is truthy, `otherwise` if not.
    pub fn ternary<'d>(
        &mut self,
        expression: impl Into<crate::data::Lazy<'d, Data<'d>>>,
        then: serialize::Branch<'d>,
        otherwise: serialize::Branch<'d>,
    ) -> Result<&mut Self, Error> {
        self.write(serialize::ternary(expression, then, otherwise))
    }

    /// Write a serializable object.
    pub fn serialize<S: XmlSerializable>(&mut self, object: &S) -> Result<&mut Self, Error> {
        object.xml_serialize(self)?;
        Ok(self)
    }
}

impl Drop for XmlBuilder<'_> {
    fn drop(&mut self) {
        if matches!(self.target, Target::Stream(_)) {
            // errors can't be reported here; call flush explicitly to see them
            let _ = self.flush();
        }
    }
}

fn validate_name(name: ResolvedName) -> Result<ResolvedName, Error> {
    let prefix_ok = name.prefix.as_deref().map_or(true, is_valid_ncname);
    if prefix_ok && is_valid_ncname(&name.local) {
        Ok(name)
    } else {
        Err(Error::invalid_input("Invalid Element Name"))
    }
}

fn comment_error() -> Error {
    Error::invalid_input("comment must not contain the sequence \"-->\"")
}
