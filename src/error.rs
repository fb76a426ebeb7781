use thiserror::Error;

/// Errors raised by the builder, the reader and the parser.
///
/// Every error aborts the operation that raised it. Bytes that the builder
/// already emitted stay emitted; there is no rollback.
#[derive(Debug, Error)]
pub enum Error {
    /// A state-machine guard was violated, e.g. text written outside of an
    /// element or an element started after the root element was closed.
    #[error("illegal state: {0}")]
    IllegalState(String),
    /// A namespace prefix was used without being bound in a visible scope.
    #[error("prefix \"{0}\" is not bound to a namespace")]
    UndeclaredPrefix(String),
    /// The input given to an operation has the wrong shape.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The underlying tokenizer rejected the document.
    #[error("xml: {0}")]
    Parser(#[from] xmlparser::Error),
    /// The document is not well-formed.
    #[error("xml: {message} at {row}:{col}")]
    Reader {
        /// What went wrong.
        message: String,
        /// One-based line.
        row: u32,
        /// One-based column.
        col: u32,
    },
    /// Writing to or flushing the target failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// An entity reference was not terminated by `;`.
    #[error("unclosed entity: {0}")]
    UnclosedEntity(String),
    /// An entity reference is not a predefined or character entity.
    #[error("invalid entity: {0}")]
    InvalidEntity(String),
    /// An encoding label is unknown, or the output could not be
    /// represented as requested.
    #[error("encoding: {0}")]
    Encoding(String),
    /// An accessor was called after the parser moved past the element the
    /// handler was invoked for.
    #[error("the parser cursor moved past the element; it cannot be accessed anymore")]
    StaleCursor,
    /// `parse` was called on a parser that already ran.
    #[error("parsing has already been started")]
    AlreadyStarted,
    /// There is nothing left to consume.
    #[error("already consumed: {0}")]
    AlreadyConsumed(String),
}

impl Error {
    pub(crate) fn illegal_state(message: impl Into<String>) -> Self {
        Error::IllegalState(message.into())
    }

    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Error::InvalidInput(message.into())
    }
}
