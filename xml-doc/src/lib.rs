//! xml-doc: lazily parsed XML documents with XPath, CSS, template and JSON
//! queries
//!
//! A document starts out as raw bytes. Its encoding, decoded text, tree and
//! JSON projection are computed on first use and cached. Every query runs
//! against the same tree, so XPath and CSS hits are interchangeable.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use xml_doc::{Xml, XmlParser};
//!
//! let doc = Xml::from("<rss version=\"2.0\"><channel><link>http://a</link></channel></rss>");
//! let links = doc.links()?;
//! let channel = doc.find_first("rss > channel")?;
//! let json = doc.json_named("parker")?;
//! ```

pub mod config;
pub mod document;
pub mod element;
pub mod encoding;
pub mod error;
pub mod json;
pub mod result;
pub mod search;
pub mod selector;
pub mod session;
pub mod traits;

// Re-export core types
pub use config::{SessionConfig, DEFAULT_USER_AGENT};
pub use document::Xml;
pub use element::{AttrValue, Attributes, Element};
pub use encoding::DEFAULT_ENCODING;
pub use error::{Error, Result};
pub use json::{JsonCache, JsonConvention};
pub use result::ResultItem;
pub use search::{SearchMatch, Template};
pub use selector::{Containing, Selector};
pub use traits::XmlParser;

// Re-export the transport boundary
pub use session::{
    AsyncXmlSession, FileTransport, Headers, Method, RawResponse, Request, Response, Transport,
    XmlSession,
};

pub use xee_adapter::{Node, XeeTree};
