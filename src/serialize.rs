//! Helpers for writing collections and conditional content.
//!
//! Each helper returns a [`Data`] value that does its work when it is
//! written, so helpers compose with declarative maps:
//!
//! ```rust
//! use easyxml::{each, Data, XmlBuilder};
//!
//! let mut builder = XmlBuilder::new();
//! builder.start_document()?;
//! builder.write(Data::map([
//!     (">", Data::from("items")),
//!     ("@", each(vec![1, 2], |builder, item, _| {
//!         builder.write_element("item", *item)?;
//!         Ok(())
//!     })),
//! ]))?;
//! builder.end_document()?;
//! assert!(builder.output()?.contains("<items><item>1</item><item>2</item></items>"));
//! # Ok::<(), easyxml::Error>(())
//! ```

use std::marker::PhantomData;

use crate::builder::XmlBuilder;
use crate::data::{Data, Lazy, XmlSerializable};
use crate::error::Error;

/// Invokes a callback with the builder for every item.
pub struct Each<T, F> {
    items: Vec<T>,
    callback: F,
}

impl<T, F> XmlSerializable for Each<T, F>
where
    F: Fn(&mut XmlBuilder<'_>, &T, usize) -> Result<(), Error>,
{
    fn xml_serialize(&self, builder: &mut XmlBuilder<'_>) -> Result<(), Error> {
        for (index, item) in self.items.iter().enumerate() {
            (self.callback)(builder, item, index)?;
        }
        Ok(())
    }
}

/// Writes the value a callback returns for every item.
pub struct MapEach<'d, T, F> {
    items: Vec<T>,
    callback: F,
    marker: PhantomData<fn() -> Data<'d>>,
}

impl<'d, T, F> XmlSerializable for MapEach<'d, T, F>
where
    F: Fn(&T, usize) -> Data<'d>,
{
    fn xml_serialize(&self, builder: &mut XmlBuilder<'_>) -> Result<(), Error> {
        for (index, item) in self.items.iter().enumerate() {
            builder.write((self.callback)(item, index))?;
        }
        Ok(())
    }
}

/// Invokes a callback with the builder if a condition holds.
pub struct When<'d, F> {
    condition: Lazy<'d, bool>,
    callback: F,
}

impl<F> XmlSerializable for When<'_, F>
where
    F: Fn(&mut XmlBuilder<'_>) -> Result<(), Error>,
{
    fn xml_serialize(&self, builder: &mut XmlBuilder<'_>) -> Result<(), Error> {
        if self.condition.resolve() {
            (self.callback)(builder)?;
        }
        Ok(())
    }
}

/// One outcome of a [`Ternary`].
pub enum Branch<'d> {
    /// Written as is.
    Value(Data<'d>),
    /// Called with the evaluated expression; the result is written.
    Deferred(Box<dyn Fn(&Data<'d>) -> Data<'d> + 'd>),
}

impl<'d> Branch<'d> {
    /// A branch writing the given value.
    pub fn value(value: impl Into<Data<'d>>) -> Self {
        Branch::Value(value.into())
    }

    /// A branch computing its value from the evaluated expression.
    pub fn deferred<F>(f: F) -> Self
    where
        F: Fn(&Data<'d>) -> Data<'d> + 'd,
    {
        Branch::Deferred(Box::new(f))
    }

    fn evaluate(&self, expression: &Data<'d>) -> Data<'d> {
        match self {
            Branch::Value(value) => value.clone(),
            Branch::Deferred(f) => f(expression),
        }
    }
}

/// Writes one of two branches depending on the truthiness of an
/// expression.
pub struct Ternary<'d> {
    expression: Lazy<'d, Data<'d>>,
    then: Branch<'d>,
    otherwise: Branch<'d>,
}

impl XmlSerializable for Ternary<'_> {
    fn xml_serialize(&self, builder: &mut XmlBuilder<'_>) -> Result<(), Error> {
        let expression = self.expression.resolve();
        let branch = if expression.is_truthy() {
            &self.then
        } else {
            &self.otherwise
        };
        builder.write(branch.evaluate(&expression))?;
        Ok(())
    }
}

/// Invoke `callback` with the builder, the item and its index for every
/// item.
pub fn each<'d, T, F>(items: impl IntoIterator<Item = T>, callback: F) -> Data<'d>
where
    T: 'd,
    F: Fn(&mut XmlBuilder<'_>, &T, usize) -> Result<(), Error> + 'd,
{
    Data::object(Each {
        items: items.into_iter().collect(),
        callback,
    })
}

/// Write what `callback` returns for every item and its index.
pub fn map<'d, T, F>(items: impl IntoIterator<Item = T>, callback: F) -> Data<'d>
where
    T: 'd,
    F: Fn(&T, usize) -> Data<'d> + 'd,
{
    Data::object(MapEach {
        items: items.into_iter().collect(),
        callback,
        marker: PhantomData,
    })
}

/// Invoke `callback` with the builder if `condition` is true when written.
pub fn when<'d, F>(condition: impl Into<Lazy<'d, bool>>, callback: F) -> Data<'d>
where
    F: Fn(&mut XmlBuilder<'_>) -> Result<(), Error> + 'd,
{
    Data::object(When {
        condition: condition.into(),
        callback,
    })
}

/// Write `then` if `expression` is truthy when written, `otherwise` if not.
pub fn ternary<'d>(
    expression: impl Into<Lazy<'d, Data<'d>>>,
    then: Branch<'d>,
    otherwise: Branch<'d>,
) -> Data<'d> {
    Data::object(Ternary {
        expression: expression.into(),
        then,
        otherwise,
    })
}
