use std::cell::RefCell;
use std::rc::Rc;

/// A shared cell receiving a value extracted during parsing.
///
/// The value and collection helpers of [`XmlParser`](crate::XmlParser)
/// return a slot that is filled while the parser runs. Read it after
/// [`XmlParser::parse`](crate::XmlParser::parse) or
/// [`XmlParser::consume`](crate::XmlParser::consume) returned.
#[derive(Debug, Default)]
pub struct Slot<T>(Rc<RefCell<T>>);

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Slot(Rc::clone(&self.0))
    }
}

impl<T> Slot<T> {
    /// Create a slot with an initial value.
    pub fn new(value: T) -> Self {
        Slot(Rc::new(RefCell::new(value)))
    }

    /// Replace the value.
    pub fn set(&self, value: T) {
        *self.0.borrow_mut() = value;
    }

    /// Modify the value in place.
    pub fn update<F: FnOnce(&mut T)>(&self, f: F) {
        f(&mut self.0.borrow_mut());
    }
}

impl<T: Clone> Slot<T> {
    /// A copy of the value.
    pub fn get(&self) -> T {
        self.0.borrow().clone()
    }
}

impl<T: Default> Slot<T> {
    /// Take the value out, leaving the default in its place.
    pub fn take(&self) -> T {
        self.0.take()
    }
}
