//! Query result items

use std::fmt;

use crate::element::Element;

/// A single item produced by a path query
#[derive(Debug)]
pub enum ResultItem<'a> {
    /// An element of the queried document
    Element(Element<'a>),
    /// An attribute value, text node or atomic value
    Value(String),
}

impl<'a> ResultItem<'a> {
    pub fn is_element(&self) -> bool {
        matches!(self, ResultItem::Element(_))
    }

    pub fn as_element(&self) -> Option<&Element<'a>> {
        match self {
            ResultItem::Element(element) => Some(element),
            ResultItem::Value(_) => None,
        }
    }

    /// The string value, if this item is one
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ResultItem::Element(_) => None,
            ResultItem::Value(value) => Some(value),
        }
    }

    pub fn into_element(self) -> Option<Element<'a>> {
        match self {
            ResultItem::Element(element) => Some(element),
            ResultItem::Value(_) => None,
        }
    }
}

impl fmt::Display for ResultItem<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultItem::Element(element) => fmt::Display::fmt(element, f),
            ResultItem::Value(value) => f.write_str(value),
        }
    }
}

/// The first item of a result set, or `None` when it is empty
pub fn first_or_none<T>(items: Vec<T>) -> Option<T> {
    items.into_iter().next()
}
