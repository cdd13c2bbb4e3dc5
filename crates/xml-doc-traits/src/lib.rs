//! Core trait abstractions for queryable XML documents.
//!
//! This crate defines the engine-neutral pieces a document layer needs
//! from an XML backend: an immutable tree, path queries over it, and the
//! header metadata captured at parse time.

pub mod declaration;
pub mod error;
pub mod tree;
pub mod xpath;

pub use declaration::XmlDeclaration;
pub use error::{Error, Result};
pub use tree::{DocInfo, NodeType, XmlTree};
pub use xpath::{PathEngine, PathItem};
