//! Streaming XML in both directions.
//!
//! [`XmlBuilder`] writes XML incrementally, either through start/end
//! primitives or declaratively from [`Data`] maps. It resolves `{uri}local`
//! names to prefixes, declaring generated prefixes where needed, and can
//! flush to a stream once a buffer threshold is crossed.
//!
//! [`XmlParser`] reads XML without building a tree. Callbacks are
//! registered for paths relative to the element the parser is on, and
//! values are delivered through [`Slot`]s. Subtrees no callback is
//! interested in are skipped.
//!
//! ```rust
//! use easyxml::{XmlBuilder, XmlParser};
//!
//! let mut builder = XmlBuilder::new();
//! builder
//!     .start_document()?
//!     .start_element("root")?
//!     .write_element("item", "a")?
//!     .write_element("item", "b")?
//!     .end_element()?
//!     .end_document()?;
//! let xml = builder.output()?;
//!
//! let mut parser = XmlParser::new(&xml);
//! let items = parser.collect_value("root.item")?;
//! parser.parse()?;
//! assert_eq!(
//!     items.get(),
//!     vec![Some("a".to_string()), Some("b".to_string())]
//! );
//! # Ok::<(), easyxml::Error>(())
//! ```
#![forbid(unsafe_code)]

mod builder;
mod callbacks;
mod convert;
mod data;
mod encoding;
mod entity;
mod error;
mod namespace;
mod nodetype;
mod parser;
mod path;
mod prefix;
mod reader;
mod registry;
mod serialize;
mod slot;
mod writer;

pub use builder::{AttributeHandler, ContentHandler, XmlBuilder};
pub use callbacks::{
    CurrentElementValueCallback, ElementStartCallback, ElementValueCallback, ParserCallback,
};
pub use convert::{Convert, Converted, ConverterFn};
pub use data::{
    Data, DataKind, DeferredFn, Key, Lazy, XmlSerializable, ATTRIBUTE_MARKER, CONTENT_KEY,
    INLINE_TAG_MARKER, NAMESPACE_MARKER, TAG_KEY,
};
pub use encoding::{decode, read_source};
pub use error::Error;
pub use nodetype::NodeType;
pub use parser::{XmlParser, XmlUnserialize};
pub use serialize::{each, map, ternary, when, Branch, Each, MapEach, Ternary, When};
pub use slot::Slot;
