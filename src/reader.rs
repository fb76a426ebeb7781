// A pull reader on top of xmlparser's tokenizer. The tokenizer produces
// tokens for tag fragments (start, attribute, end); the reader assembles
// them into nodes, resolves namespaces against a stack of xmlns scopes,
// unescapes text and checks that end tags match.

use std::borrow::Cow;

use xmlparser::{ElementEnd, StrSpan, Token, Tokenizer};

use crate::entity::{normalize_attribute, normalize_newlines, parse_entities};
use crate::error::Error;
use crate::namespace::XML_NAMESPACE;
use crate::nodetype::NodeType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Attribute {
    pub(crate) prefix: String,
    pub(crate) local: String,
    pub(crate) namespace: Option<String>,
    pub(crate) value: String,
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) node_type: NodeType,
    pub(crate) prefix: String,
    pub(crate) local: String,
    pub(crate) namespace: Option<String>,
    pub(crate) value: String,
    pub(crate) attributes: Vec<Attribute>,
    // self-closing element
    pub(crate) empty: bool,
}

impl Node {
    fn none() -> Self {
        Self::with_type(NodeType::None)
    }

    fn with_type(node_type: NodeType) -> Self {
        Node {
            node_type,
            prefix: String::new(),
            local: String::new(),
            namespace: None,
            value: String::new(),
            attributes: Vec::new(),
            empty: false,
        }
    }

    /// The qualified name for elements, `#text` and friends otherwise.
    pub(crate) fn name(&self) -> Cow<str> {
        match self.node_type {
            NodeType::Element
            | NodeType::EndElement
            | NodeType::ProcessingInstruction
            | NodeType::DocumentType => {
                if self.prefix.is_empty() {
                    Cow::Borrowed(&self.local)
                } else {
                    Cow::Owned(format!("{}:{}", self.prefix, self.local))
                }
            }
            NodeType::Text | NodeType::Whitespace => Cow::Borrowed("#text"),
            NodeType::CData => Cow::Borrowed("#cdata-section"),
            NodeType::Comment => Cow::Borrowed("#comment"),
            NodeType::None => Cow::Borrowed(""),
        }
    }
}

struct RawAttribute<'a> {
    prefix: &'a str,
    local: &'a str,
    value: &'a str,
}

pub(crate) struct Reader<'a> {
    source: &'a str,
    tokenizer: Tokenizer<'a>,
    // prefix/uri bindings, one scope per open element
    scopes: Vec<Vec<(String, String)>>,
    // qualified names of open elements
    open: Vec<String>,
    node: Node,
    // the scope of the current node is popped on the next read
    pop_pending: bool,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(source: &'a str) -> Self {
        Reader {
            source,
            tokenizer: Tokenizer::from(source),
            scopes: Vec::new(),
            open: Vec::new(),
            node: Node::none(),
            pop_pending: false,
        }
    }

    pub(crate) fn node(&self) -> &Node {
        &self.node
    }

    fn error_at(&self, message: impl Into<String>, offset: usize) -> Error {
        let before = &self.source[..offset.min(self.source.len())];
        let row = before.matches('\n').count() + 1;
        let col = before
            .rfind('\n')
            .map_or(before.chars().count(), |newline| {
                before[newline + 1..].chars().count()
            })
            + 1;
        Error::Reader {
            message: message.into(),
            row: row as u32,
            col: col as u32,
        }
    }

    fn next_token(&mut self) -> Result<Option<Token<'a>>, Error> {
        match self.tokenizer.next() {
            Some(token) => Ok(Some(token?)),
            None => Ok(None),
        }
    }

    pub(crate) fn unexpected_end(&self) -> Error {
        let message = match self.open.last() {
            Some(name) => format!("unexpected end of document, \"{}\" is not closed", name),
            None => "unexpected end of document".to_string(),
        };
        self.error_at(message, self.source.len())
    }

    fn namespace_by_prefix(&self, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(XML_NAMESPACE);
        }
        self.scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.iter().rev())
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    fn element_namespace(&self, prefix: &str) -> Result<Option<String>, Error> {
        match self.namespace_by_prefix(prefix) {
            Some("") => Ok(None),
            Some(uri) => Ok(Some(uri.to_string())),
            None if prefix.is_empty() => Ok(None),
            None => Err(Error::UndeclaredPrefix(prefix.to_string())),
        }
    }

    /// Advance to the next node. Returns `false` at the end of the
    /// document.
    pub(crate) fn read(&mut self) -> Result<bool, Error> {
        if self.pop_pending {
            self.scopes.pop();
            self.pop_pending = false;
        }
        loop {
            let token = match self.next_token()? {
                Some(token) => token,
                None => {
                    if !self.open.is_empty() {
                        return Err(self.unexpected_end());
                    }
                    self.node = Node::none();
                    return Ok(false);
                }
            };
            match token {
                Token::Declaration { .. }
                | Token::EntityDeclaration { .. }
                | Token::DtdEnd { .. } => continue,
                Token::DtdStart { name, .. } | Token::EmptyDtd { name, .. } => {
                    let mut node = Node::with_type(NodeType::DocumentType);
                    node.local = name.as_str().to_string();
                    self.node = node;
                }
                Token::ProcessingInstruction {
                    target, content, ..
                } => {
                    let mut node = Node::with_type(NodeType::ProcessingInstruction);
                    node.local = target.as_str().to_string();
                    node.value = content.map(|c| c.as_str().to_string()).unwrap_or_default();
                    self.node = node;
                }
                Token::Comment { text, .. } => {
                    let mut node = Node::with_type(NodeType::Comment);
                    node.value = text.as_str().to_string();
                    self.node = node;
                }
                Token::Cdata { text, .. } => {
                    let mut node = Node::with_type(NodeType::CData);
                    node.value = normalize_newlines(Cow::Borrowed(text.as_str())).into_owned();
                    self.node = node;
                }
                Token::Text { text } => {
                    let value = normalize_newlines(parse_entities(Cow::Borrowed(text.as_str()))?);
                    let node_type = if value.chars().all(|c| c.is_ascii_whitespace()) {
                        NodeType::Whitespace
                    } else {
                        NodeType::Text
                    };
                    let mut node = Node::with_type(node_type);
                    node.value = value.into_owned();
                    self.node = node;
                }
                Token::ElementStart { prefix, local, .. } => {
                    self.read_element(prefix, local)?;
                }
                Token::ElementEnd {
                    end: ElementEnd::Close(prefix, local),
                    span,
                } => {
                    self.close_element(prefix, local, span)?;
                }
                Token::ElementEnd { span, .. } | Token::Attribute { span, .. } => {
                    return Err(self.error_at("unexpected token", span.start()));
                }
            }
            return Ok(true);
        }
    }

    fn read_element(&mut self, prefix: StrSpan<'a>, local: StrSpan<'a>) -> Result<(), Error> {
        let mut raw = Vec::new();
        let empty = loop {
            match self.next_token()? {
                Some(Token::Attribute {
                    prefix,
                    local,
                    value,
                    ..
                }) => raw.push(RawAttribute {
                    prefix: prefix.as_str(),
                    local: local.as_str(),
                    value: value.as_str(),
                }),
                Some(Token::ElementEnd {
                    end: ElementEnd::Open,
                    ..
                }) => break false,
                Some(Token::ElementEnd {
                    end: ElementEnd::Empty,
                    ..
                }) => break true,
                Some(_) => {
                    return Err(self.error_at("unexpected token in start tag", local.end()))
                }
                None => return Err(self.unexpected_end()),
            }
        };

        let mut scope = Vec::new();
        let mut attributes = Vec::with_capacity(raw.len());
        for attribute in raw {
            let value = parse_entities(normalize_attribute(attribute.value))?.into_owned();
            if attribute.prefix == "xmlns" {
                scope.push((attribute.local.to_string(), value));
            } else if attribute.prefix.is_empty() && attribute.local == "xmlns" {
                scope.push((String::new(), value));
            } else {
                attributes.push(Attribute {
                    prefix: attribute.prefix.to_string(),
                    local: attribute.local.to_string(),
                    namespace: None,
                    value,
                });
            }
        }
        self.scopes.push(scope);

        let namespace = self.element_namespace(prefix.as_str())?;
        for attribute in attributes.iter_mut() {
            if !attribute.prefix.is_empty() {
                attribute.namespace = Some(
                    self.namespace_by_prefix(&attribute.prefix)
                        .ok_or_else(|| Error::UndeclaredPrefix(attribute.prefix.clone()))?
                        .to_string(),
                );
            }
        }

        let node = Node {
            node_type: NodeType::Element,
            prefix: prefix.as_str().to_string(),
            local: local.as_str().to_string(),
            namespace,
            value: String::new(),
            attributes,
            empty,
        };
        if empty {
            self.pop_pending = true;
        } else {
            self.open.push(node.name().into_owned());
        }
        self.node = node;
        Ok(())
    }

    fn close_element(
        &mut self,
        prefix: StrSpan<'a>,
        local: StrSpan<'a>,
        span: StrSpan<'a>,
    ) -> Result<(), Error> {
        let mut node = Node::with_type(NodeType::EndElement);
        node.prefix = prefix.as_str().to_string();
        node.local = local.as_str().to_string();
        let name = node.name().into_owned();
        match self.open.pop() {
            Some(open) if open == name => {}
            Some(open) => {
                return Err(self.error_at(
                    format!("end tag \"{}\" does not match start tag \"{}\"", name, open),
                    span.start(),
                ))
            }
            None => {
                return Err(self.error_at(
                    format!("end tag \"{}\" without start tag", name),
                    span.start(),
                ))
            }
        }
        node.namespace = self.element_namespace(&node.prefix)?;
        self.pop_pending = true;
        self.node = node;
        Ok(())
    }

    /// Skip the content of the current element, including its end tag.
    /// Afterwards the reader is positioned on no node.
    pub(crate) fn skip_subtree(&mut self) -> Result<(), Error> {
        if self.node.node_type != NodeType::Element {
            return Ok(());
        }
        if self.node.empty {
            // its scope is popped on the next read
            self.node = Node::none();
            return Ok(());
        }
        let target = self.open.len() - 1;
        let mut pending: Option<String> = None;
        while self.open.len() > target {
            match self.next_token()? {
                Some(Token::ElementStart { prefix, local, .. }) => {
                    pending = Some(if prefix.as_str().is_empty() {
                        local.as_str().to_string()
                    } else {
                        format!("{}:{}", prefix.as_str(), local.as_str())
                    });
                }
                Some(Token::ElementEnd {
                    end: ElementEnd::Open,
                    ..
                }) => {
                    if let Some(name) = pending.take() {
                        self.open.push(name);
                    }
                }
                Some(Token::ElementEnd {
                    end: ElementEnd::Empty,
                    ..
                }) => {
                    pending = None;
                }
                Some(Token::ElementEnd {
                    end: ElementEnd::Close(prefix, local),
                    span,
                }) => {
                    let name = if prefix.as_str().is_empty() {
                        local.as_str().to_string()
                    } else {
                        format!("{}:{}", prefix.as_str(), local.as_str())
                    };
                    if self.open.pop().as_deref() != Some(name.as_str()) {
                        return Err(self.error_at(
                            format!("end tag \"{}\" does not match start tag", name),
                            span.start(),
                        ));
                    }
                }
                Some(_) => {}
                None => return Err(self.unexpected_end()),
            }
        }
        // scope of the skipped element
        self.scopes.pop();
        self.pop_pending = false;
        self.node = Node::none();
        Ok(())
    }
}
