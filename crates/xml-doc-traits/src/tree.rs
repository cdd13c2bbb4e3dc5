//! XML tree abstraction trait

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Type of XML node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    /// Document node
    Document,
    /// Element node
    Element,
    /// Attribute node
    Attribute,
    /// Text node
    Text,
    /// Comment node
    Comment,
    /// Processing instruction node
    ProcessingInstruction,
    /// Namespace node
    Namespace,
}

/// Document-level metadata read from the header and the root element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocInfo {
    /// Declared XML version, `"1.0"` when the document has no declaration
    pub xml_version: String,
    /// Declared encoding, verbatim
    pub encoding: Option<String>,
    /// Declared standalone flag
    pub standalone: Option<bool>,
    /// Name of the document element, in Clark notation when namespaced
    pub root_name: String,
}

/// Trait for immutable XML tree implementations.
///
/// Node handles are cheap copies that stay valid for as long as the tree
/// they came from. Names are reported in Clark notation (`{uri}local`)
/// when the node is in a namespace, and as the bare local name otherwise.
pub trait XmlTree {
    /// Type representing a node handle in this tree
    type Node: Copy + Eq + Debug;

    /// The document node
    fn document(&self) -> Self::Node;

    /// Get the document element (root element)
    fn document_element(&self) -> Result<Self::Node>;

    /// Header metadata captured at parse time
    fn doc_info(&self) -> &DocInfo;

    /// Get the parent of a node, if it has one
    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Get all children of a node, attributes and namespace nodes excluded
    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;

    /// Get all attributes of an element node as (name, value) pairs in
    /// document order. Namespace declarations are not attributes.
    fn attributes(&self, node: &Self::Node) -> Vec<(String, String)>;

    /// Get the expanded name of a node (if applicable)
    fn node_name(&self, node: &Self::Node) -> Option<String>;

    /// Get the local name of a node (without namespace)
    fn node_local_name(&self, node: &Self::Node) -> Option<String>;

    /// Get the namespace URI of a node
    fn node_namespace_uri(&self, node: &Self::Node) -> Option<String>;

    /// Get the value of a text, comment, PI or attribute node
    fn node_value(&self, node: &Self::Node) -> Option<String>;

    /// Get the type of a node
    fn node_type(&self, node: &Self::Node) -> NodeType;

    /// Serialize a node to an XML string
    fn serialize(&self, node: &Self::Node) -> Result<String>;

    /// Element children only
    fn element_children(&self, node: &Self::Node) -> Vec<Self::Node> {
        self.children(node)
            .into_iter()
            .filter(|child| self.node_type(child) == NodeType::Element)
            .collect()
    }

    /// Concatenated text of all descendant text nodes
    fn text_content(&self, node: &Self::Node) -> String {
        match self.node_type(node) {
            NodeType::Text => self.node_value(node).unwrap_or_default(),
            NodeType::Document | NodeType::Element => {
                let mut out = String::new();
                for child in self.children(node) {
                    match self.node_type(&child) {
                        NodeType::Text | NodeType::Element => {
                            out.push_str(&self.text_content(&child))
                        }
                        _ => {}
                    }
                }
                out
            }
            _ => self.node_value(node).unwrap_or_default(),
        }
    }

    /// Text before the first non-text child (lxml's `.text`)
    fn leading_text(&self, node: &Self::Node) -> Option<String> {
        let first = self.children(node).into_iter().next()?;
        match self.node_type(&first) {
            NodeType::Text => self.node_value(&first),
            _ => None,
        }
    }

    /// Text directly following a node inside its parent (lxml's `.tail`)
    fn tail_text(&self, node: &Self::Node) -> Option<String> {
        let parent = self.parent(node)?;
        let siblings = self.children(&parent);
        let pos = siblings.iter().position(|sibling| sibling == node)?;
        let next = siblings.get(pos + 1)?;
        match self.node_type(next) {
            NodeType::Text => self.node_value(next),
            _ => None,
        }
    }
}
