use std::fmt::Debug;
use std::rc::Rc;

use chrono::{DateTime, FixedOffset};

use crate::builder::XmlBuilder;
use crate::error::Error;

/// Marker key holding the element name in a write map.
pub const TAG_KEY: &str = ">";
/// Marker key holding the element content in a write map.
pub const CONTENT_KEY: &str = "@";
/// Prefix of keys that denote attributes in a write map.
pub const ATTRIBUTE_MARKER: char = '@';
/// Prefix of keys that denote namespace declarations in a write map.
pub const NAMESPACE_MARKER: char = ':';
/// Prefix of keys that carry the tag name of their map value.
pub const INLINE_TAG_MARKER: char = '<';

/// Something that knows how to write itself using a builder.
pub trait XmlSerializable {
    /// Write this value.
    fn xml_serialize(&self, builder: &mut XmlBuilder<'_>) -> Result<(), Error>;
}

/// A deferred write: a function invoked with the active builder.
pub type DeferredFn<'d> = dyn Fn(&mut XmlBuilder<'_>) -> Result<(), Error> + 'd;

/// The key of an entry in a [`Data::Map`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    /// A sequence position.
    Index(usize),
    /// A name: an element name, or a marker key.
    Name(String),
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

/// Stable type tag for values, used to look up content and attribute
/// handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    /// No value.
    Null,
    /// A string.
    Text,
    /// An integer.
    Int,
    /// A floating point number.
    Float,
    /// A boolean.
    Bool,
    /// A date and time.
    Date,
}

/// A value to write.
///
/// Scalars are written as text; [`Data::Map`] describes elements, attributes
/// and siblings declaratively; [`Data::Deferred`] and [`Data::Object`] are
/// invoked with the builder when written.
#[derive(Clone)]
pub enum Data<'d> {
    /// Writes nothing.
    Null,
    /// A string.
    Text(String),
    /// An integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A boolean. `true` is written as `1`, `false` as an empty string.
    Bool(bool),
    /// A date and time, written in RFC 3339 form unless a handler is set.
    Date(DateTime<FixedOffset>),
    /// An ordered map with marker keys or a sequence of sibling writes.
    Map(Vec<(Key, Data<'d>)>),
    /// A function invoked with the builder.
    Deferred(Rc<DeferredFn<'d>>),
    /// An object that serializes itself.
    Object(Rc<dyn XmlSerializable + 'd>),
}

impl<'d> Data<'d> {
    /// Create a map from key/value pairs.
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<Key>,
        V: Into<Data<'d>>,
        I: IntoIterator<Item = (K, V)>,
    {
        Data::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    /// Create a sequence of sibling writes.
    pub fn list<V, I>(items: I) -> Self
    where
        V: Into<Data<'d>>,
        I: IntoIterator<Item = V>,
    {
        Data::Map(
            items
                .into_iter()
                .enumerate()
                .map(|(index, value)| (Key::Index(index), value.into()))
                .collect(),
        )
    }

    /// Wrap a function that is invoked with the builder when written.
    pub fn deferred<F>(f: F) -> Self
    where
        F: Fn(&mut XmlBuilder<'_>) -> Result<(), Error> + 'd,
    {
        Data::Deferred(Rc::new(f))
    }

    /// Wrap a serializable object.
    pub fn object<S: XmlSerializable + 'd>(object: S) -> Self {
        Data::Object(Rc::new(object))
    }

    /// The type tag of a scalar. Maps, deferred functions and objects have
    /// none.
    pub fn kind(&self) -> Option<DataKind> {
        match self {
            Data::Null => Some(DataKind::Null),
            Data::Text(_) => Some(DataKind::Text),
            Data::Int(_) => Some(DataKind::Int),
            Data::Float(_) => Some(DataKind::Float),
            Data::Bool(_) => Some(DataKind::Bool),
            Data::Date(_) => Some(DataKind::Date),
            Data::Map(_) | Data::Deferred(_) | Data::Object(_) => None,
        }
    }

    /// The textual form of a scalar, `None` for `Null` and non-scalars.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Data::Text(text) => Some(text.clone()),
            Data::Int(value) => Some(value.to_string()),
            Data::Float(value) => Some(value.to_string()),
            Data::Bool(true) => Some("1".to_string()),
            Data::Bool(false) => Some(String::new()),
            Data::Date(date) => Some(date.to_rfc3339()),
            Data::Null | Data::Map(_) | Data::Deferred(_) | Data::Object(_) => None,
        }
    }

    /// Truthiness as used by conditional helpers.
    pub fn is_truthy(&self) -> bool {
        match self {
            Data::Null => false,
            Data::Text(text) => !(text.is_empty() || text == "0"),
            Data::Int(value) => *value != 0,
            Data::Float(value) => *value != 0.0,
            Data::Bool(value) => *value,
            Data::Map(entries) => !entries.is_empty(),
            Data::Date(_) | Data::Deferred(_) | Data::Object(_) => true,
        }
    }
}

impl Debug for Data<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Data::Null => write!(f, "Null"),
            Data::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Data::Int(value) => f.debug_tuple("Int").field(value).finish(),
            Data::Float(value) => f.debug_tuple("Float").field(value).finish(),
            Data::Bool(value) => f.debug_tuple("Bool").field(value).finish(),
            Data::Date(date) => f.debug_tuple("Date").field(date).finish(),
            Data::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
            Data::Deferred(_) => write!(f, "Deferred"),
            Data::Object(_) => write!(f, "Object"),
        }
    }
}

impl From<&str> for Data<'_> {
    fn from(text: &str) -> Self {
        Data::Text(text.to_string())
    }
}

impl From<String> for Data<'_> {
    fn from(text: String) -> Self {
        Data::Text(text)
    }
}

impl From<&String> for Data<'_> {
    fn from(text: &String) -> Self {
        Data::Text(text.clone())
    }
}

impl From<i64> for Data<'_> {
    fn from(value: i64) -> Self {
        Data::Int(value)
    }
}

impl From<i32> for Data<'_> {
    fn from(value: i32) -> Self {
        Data::Int(value.into())
    }
}

impl From<u32> for Data<'_> {
    fn from(value: u32) -> Self {
        Data::Int(value.into())
    }
}

impl From<f64> for Data<'_> {
    fn from(value: f64) -> Self {
        Data::Float(value)
    }
}

impl From<bool> for Data<'_> {
    fn from(value: bool) -> Self {
        Data::Bool(value)
    }
}

impl From<DateTime<FixedOffset>> for Data<'_> {
    fn from(date: DateTime<FixedOffset>) -> Self {
        Data::Date(date)
    }
}

impl From<()> for Data<'_> {
    fn from(_: ()) -> Self {
        Data::Null
    }
}

impl<'d, T: Into<Data<'d>>> From<Option<T>> for Data<'d> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Data::Null, Into::into)
    }
}

impl<'d, T: Into<Data<'d>>> From<Vec<T>> for Data<'d> {
    fn from(items: Vec<T>) -> Self {
        Data::list(items)
    }
}

/// A value that is either known now or computed when it is used.
pub enum Lazy<'d, T> {
    /// A value known up front.
    Value(T),
    /// A function computing the value at the point of use.
    Deferred(Box<dyn Fn() -> T + 'd>),
}

impl<'d, T: Clone> Lazy<'d, T> {
    /// Create a deferred value.
    pub fn deferred<F: Fn() -> T + 'd>(f: F) -> Self {
        Lazy::Deferred(Box::new(f))
    }

    /// Resolve the value, invoking the function if deferred.
    pub fn resolve(&self) -> T {
        match self {
            Lazy::Value(value) => value.clone(),
            Lazy::Deferred(f) => f(),
        }
    }
}

impl<'d, T> From<T> for Lazy<'d, T> {
    fn from(value: T) -> Self {
        Lazy::Value(value)
    }
}
