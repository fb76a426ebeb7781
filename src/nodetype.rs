/// The kind of node the parser cursor is positioned on.
///
/// Callbacks can be restricted to a set of node types, see
/// [`ParserCallback::node_types`](crate::ParserCallback::node_types).
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum NodeType {
    /// Not positioned on a node, e.g. after a subtree was skipped.
    None,
    /// Start of an element; it has a name, attributes and namespace
    /// information. A self-closing element is a single `Element` node.
    Element,
    /// End tag of an element.
    EndElement,
    /// Text.
    Text,
    /// Text consisting of whitespace only.
    Whitespace,
    /// CDATA section.
    CData,
    /// Comment.
    Comment,
    /// Processing instruction
    ProcessingInstruction,
    /// Document type declaration.
    DocumentType,
}

impl NodeType {
    /// Whether this node carries character data.
    pub fn is_text(self) -> bool {
        matches!(self, NodeType::Text | NodeType::Whitespace | NodeType::CData)
    }
}
