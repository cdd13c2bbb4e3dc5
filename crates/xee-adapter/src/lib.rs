//! xee engine adapter for the xml-doc tree abstraction
//!
//! This adapter parses documents into a xot arena owned by xee's document
//! store and evaluates XPath 3.1 against it, implementing the
//! xml-doc-traits interfaces.

pub mod tree;
pub mod xpath;

// Re-export main types
pub use tree::XeeTree;

// Re-export key types for convenience
pub use xot::Node;
