//! Elements sliced out of a parsed document

use std::fmt;

use once_cell::unsync::OnceCell;
use serde::Serialize;
use xee_adapter::{Node, XeeTree};
use xml_doc_traits::XmlTree;

use crate::encoding;
use crate::error::Result;
use crate::json::JsonCache;
use crate::traits::XmlParser;

/// Attributes whose values are whitespace-separated token lists
const TOKEN_LIST_ATTRIBUTES: [&str; 2] = ["class", "rel"];

/// An attribute value: a plain string, or the tokens of a `class` or `rel`
/// attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    Single(String),
    Tokens(Vec<String>),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Single(value) => Some(value),
            AttrValue::Tokens(_) => None,
        }
    }

    pub fn tokens(&self) -> Option<&[String]> {
        match self {
            AttrValue::Single(_) => None,
            AttrValue::Tokens(tokens) => Some(tokens),
        }
    }

    /// Whether the value, with tokens joined by spaces, contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.to_string().contains(needle)
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Single(value) => f.write_str(value),
            AttrValue::Tokens(tokens) => f.write_str(&tokens.join(" ")),
        }
    }
}

impl PartialEq<&str> for AttrValue {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

/// Attributes of an element in document order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Attributes(Vec<(String, AttrValue)>);

impl Attributes {
    fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(name, value)| {
                    let value = if TOKEN_LIST_ATTRIBUTES.contains(&name.as_str()) {
                        AttrValue::Tokens(value.split_whitespace().map(str::to_string).collect())
                    } else {
                        AttrValue::Single(value)
                    };
                    (name, value)
                })
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// An element of a parsed document.
///
/// The element borrows the tree it came from, so it cannot outlive its
/// document. Its own text is the serialized element; queries against it
/// run on a separate tree parsed from that text on first use, with the
/// element as root.
pub struct Element<'a> {
    source: &'a XeeTree,
    node: Node,
    encoding: String,
    default_encoding: String,
    xml: OnceCell<String>,
    raw: OnceCell<Vec<u8>>,
    tree: OnceCell<XeeTree>,
    attrs: OnceCell<Attributes>,
    json: JsonCache,
}

impl<'a> Element<'a> {
    pub fn new(source: &'a XeeTree, node: Node, encoding: &str, default_encoding: &str) -> Self {
        Self {
            source,
            node,
            encoding: encoding.to_string(),
            default_encoding: default_encoding.to_string(),
            xml: OnceCell::new(),
            raw: OnceCell::new(),
            tree: OnceCell::new(),
            attrs: OnceCell::new(),
            json: JsonCache::default(),
        }
    }

    /// The node in the source tree
    pub fn node(&self) -> Node {
        self.node
    }

    /// The tree this element was sliced from
    pub fn source(&self) -> &'a XeeTree {
        self.source
    }

    /// Tag in Clark notation when namespaced
    pub fn tag(&self) -> String {
        self.source.node_name(&self.node).unwrap_or_default()
    }

    pub fn local_name(&self) -> String {
        self.source.node_local_name(&self.node).unwrap_or_default()
    }

    /// Attributes, read once
    pub fn attrs(&self) -> &Attributes {
        self.attrs
            .get_or_init(|| Attributes::from_pairs(self.source.attributes(&self.node)))
    }

    /// Change the encoding of [`raw_xml`](XmlParser::raw_xml)
    pub fn set_encoding(&mut self, encoding: &str) {
        self.encoding = encoding.to_string();
        self.raw.take();
    }
}

impl XmlParser for Element<'_> {
    fn raw_xml(&self) -> &[u8] {
        self.raw
            .get_or_init(|| encoding::encode(self.xml(), &self.encoding))
    }

    fn xml(&self) -> &str {
        self.xml.get_or_init(|| match self.source.serialize(&self.node) {
            Ok(xml) => xml.trim().to_string(),
            Err(e) => {
                tracing::warn!("could not serialize {:?}: {}", self.node, e);
                String::new()
            }
        })
    }

    fn encoding(&self) -> &str {
        &self.encoding
    }

    fn default_encoding(&self) -> &str {
        &self.default_encoding
    }

    fn tree(&self) -> Result<&XeeTree> {
        self.tree
            .get_or_try_init(|| Ok(XeeTree::parse(self.xml())?))
    }

    fn json_cache(&self) -> &JsonCache {
        &self.json
    }
}

impl fmt::Display for Element<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Element '{}'", self.tag())?;
        for (name, value) in self.attrs().iter() {
            match value {
                AttrValue::Single(value) => write!(f, " {}='{}'", name, value)?,
                AttrValue::Tokens(tokens) => {
                    let quoted: Vec<String> = tokens.iter().map(|t| format!("'{}'", t)).collect();
                    write!(f, " {}=({})", name, quoted.join(", "))?
                }
            }
        }
        f.write_str(">")
    }
}

impl fmt::Debug for Element<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("tag", &self.tag())
            .field("node", &self.node)
            .field("encoding", &self.encoding)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<page><a class=" nav  main " rel="next" href="/2">Next <b>page</b></a><p/></page>"#;

    fn first_link(tree: &XeeTree) -> Element<'_> {
        let page = tree.document_element().unwrap();
        let a = tree.element_children(&page)[0];
        Element::new(tree, a, "utf-8", "utf-8")
    }

    #[test]
    fn splits_token_list_attributes() {
        let tree = XeeTree::parse(PAGE).unwrap();
        let a = first_link(&tree);
        let attrs = a.attrs();
        assert_eq!(attrs.len(), 3);
        assert_eq!(
            attrs.get("class").and_then(AttrValue::tokens),
            Some(&["nav".to_string(), "main".to_string()][..])
        );
        assert_eq!(attrs.get("rel").and_then(AttrValue::tokens), Some(&["next".to_string()][..]));
        assert_eq!(attrs.get("href"), Some(&AttrValue::Single("/2".to_string())));
        assert!(std::ptr::eq(a.attrs(), attrs));
    }

    #[test]
    fn renders_like_a_tag() {
        let tree = XeeTree::parse(PAGE).unwrap();
        let a = first_link(&tree);
        assert_eq!(
            a.to_string(),
            "<Element 'a' class=('nav', 'main') rel=('next') href='/2'>"
        );
    }

    #[test]
    fn queries_its_own_subtree() {
        let tree = XeeTree::parse(PAGE).unwrap();
        let a = first_link(&tree);
        assert!(a.xml().starts_with("<a "));
        assert_eq!(a.text().unwrap(), "Next page");
        assert_eq!(a.root_tag().unwrap(), "a");
        // an element matches itself through its own subtree
        assert_eq!(a.find("a").unwrap().len(), 1);
        assert_eq!(a.find("b").unwrap()[0].text().unwrap(), "page");
        assert!(a.find_first("p").unwrap().is_none());
    }

    #[test]
    fn reencodes_raw_bytes() {
        let tree = XeeTree::parse("<p>caf\u{e9}</p>").unwrap();
        let root = tree.document_element().unwrap();
        let mut p = Element::new(&tree, root, "utf-8", "utf-8");
        assert_eq!(p.raw_xml(), "<p>caf\u{e9}</p>".as_bytes());
        p.set_encoding("windows-1252");
        assert_eq!(p.raw_xml(), b"<p>caf\xe9</p>");
    }
}
