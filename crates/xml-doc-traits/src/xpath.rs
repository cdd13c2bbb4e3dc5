//! XPath engine abstraction trait

use crate::error::Result;
use crate::tree::XmlTree;

/// A single item produced by a path query.
///
/// Element hits stay node handles so callers can keep querying them;
/// everything else (attribute values, text nodes, atomics such as the
/// result of `count()`) is flattened to its string value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathItem<N> {
    /// An element node
    Node(N),
    /// A scalar or textual value
    Value(String),
}

impl<N> PathItem<N> {
    /// The node handle, if this item is one
    pub fn node(&self) -> Option<&N> {
        match self {
            PathItem::Node(node) => Some(node),
            PathItem::Value(_) => None,
        }
    }

    /// The string value, if this item is one
    pub fn value(&self) -> Option<&str> {
        match self {
            PathItem::Node(_) => None,
            PathItem::Value(value) => Some(value),
        }
    }
}

/// Trait for trees that can evaluate XPath expressions.
///
/// Note: implementations are not required to be `Send` or `Sync`; most
/// XPath engines keep `Rc` handles internally. Evaluation is a pure read
/// against the tree.
pub trait PathEngine: XmlTree {
    /// Evaluate an expression with `context` as the context item, returning
    /// items in document order.
    fn path_query(
        &self,
        context: &Self::Node,
        expression: &str,
    ) -> Result<Vec<PathItem<Self::Node>>>;

    /// Evaluate an expression against the document node
    fn path_query_document(&self, expression: &str) -> Result<Vec<PathItem<Self::Node>>> {
        let document = self.document();
        self.path_query(&document, expression)
    }

    /// Get the XPath version supported by this engine
    fn xpath_version(&self) -> &'static str;
}
