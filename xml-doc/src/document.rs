//! Top-level documents built from raw bytes

use std::fmt;

use once_cell::unsync::OnceCell;
use xee_adapter::XeeTree;
use xml_doc_traits::XmlTree;

use crate::encoding::{self, DEFAULT_ENCODING};
use crate::error::Result;
use crate::json::JsonCache;
use crate::traits::XmlParser;

/// An XML document held as raw bytes.
///
/// Nothing is decoded or parsed up front. The encoding, the decoded text
/// and the tree are each computed on first use and then kept, so repeated
/// reads return the same value without redoing the work. Setters evict
/// exactly the caches derived from what they change.
pub struct Xml {
    raw: Vec<u8>,
    hint: Option<String>,
    default_encoding: String,
    override_encoding: Option<String>,
    encoding: OnceCell<String>,
    text: OnceCell<String>,
    tree: OnceCell<XeeTree>,
    json: JsonCache,
}

impl Xml {
    /// A document in an encoding to be sniffed, UTF-8 by default
    pub fn new(raw: impl Into<Vec<u8>>) -> Self {
        Self::with_hint(raw, None, DEFAULT_ENCODING)
    }

    /// A document whose encoding falls back to `default_encoding`
    pub fn with_encoding(raw: impl Into<Vec<u8>>, default_encoding: &str) -> Self {
        Self::with_hint(raw, None, default_encoding)
    }

    /// A document with a transport hint, typically a `Content-Type` value
    pub fn with_hint(raw: impl Into<Vec<u8>>, hint: Option<&str>, default_encoding: &str) -> Self {
        Self {
            raw: raw.into(),
            hint: hint.map(str::to_string),
            default_encoding: default_encoding.to_string(),
            override_encoding: None,
            encoding: OnceCell::new(),
            text: OnceCell::new(),
            tree: OnceCell::new(),
            json: JsonCache::default(),
        }
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    /// The encoding set with [`set_encoding`](Xml::set_encoding), if any
    pub fn encoding_override(&self) -> Option<&str> {
        self.override_encoding.as_deref()
    }

    /// Whether the tree has been built
    pub fn is_parsed(&self) -> bool {
        self.tree.get().is_some()
    }

    /// Force an encoding, skipping resolution.
    ///
    /// The decoded text, the tree and the JSON projection are dropped and
    /// rebuilt from the raw bytes on next use.
    pub fn set_encoding(&mut self, encoding: &str) {
        tracing::debug!(encoding, "encoding overridden");
        self.override_encoding = Some(encoding.to_string());
        self.text.take();
        self.tree.take();
        self.json.clear();
    }

    /// Replace the raw bytes, dropping everything derived from them
    pub fn set_raw_xml(&mut self, raw: impl Into<Vec<u8>>) {
        self.raw = raw.into();
        self.encoding.take();
        self.clear_derived();
    }

    /// Replace the content with text, stored as bytes in the current
    /// encoding
    pub fn set_xml(&mut self, xml: impl Into<String>) {
        let xml = xml.into();
        let encoding = self.encoding().to_string();
        self.raw = encoding::encode(&xml, &encoding);
        self.encoding = OnceCell::with_value(encoding);
        self.clear_derived();
        self.text = OnceCell::with_value(xml);
    }

    fn clear_derived(&mut self) {
        self.text.take();
        self.tree.take();
        self.json.clear();
    }
}

impl XmlParser for Xml {
    fn raw_xml(&self) -> &[u8] {
        &self.raw
    }

    fn xml(&self) -> &str {
        self.text
            .get_or_init(|| encoding::decode(&self.raw, self.encoding()))
    }

    fn encoding(&self) -> &str {
        if let Some(encoding) = &self.override_encoding {
            return encoding;
        }
        self.encoding.get_or_init(|| {
            encoding::resolve(&self.raw, self.hint.as_deref(), &self.default_encoding)
        })
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

impl From<&str> for Xml {
    fn from(xml: &str) -> Self {
        Xml::new(xml)
    }
}

impl From<String> for Xml {
    fn from(xml: String) -> Self {
        Xml::new(xml)
    }
}

impl From<Vec<u8>> for Xml {
    fn from(raw: Vec<u8>) -> Self {
        Xml::new(raw)
    }
}

impl From<&[u8]> for Xml {
    fn from(raw: &[u8]) -> Self {
        Xml::new(raw)
    }
}

impl fmt::Debug for Xml {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let root = self
            .tree
            .get()
            .map(|tree| tree.doc_info().root_name.as_str());
        f.debug_struct("Xml")
            .field("len", &self.raw.len())
            .field("encoding", &self.override_encoding.as_deref().or(self.encoding.get().map(String::as_str)))
            .field("root", &root)
            .finish()
    }
}
