//! Error types for XML tree engines

/// Result type for XML tree operations
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for all XML tree operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// XML parsing failed
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    /// XPath compilation failed
    #[error("XPath compilation error: {0}")]
    XPathCompile(String),

    /// XPath evaluation failed
    #[error("XPath evaluation error: {0}")]
    XPathEval(String),

    /// Type conversion error
    #[error("Type conversion error: {0}")]
    TypeConversion(String),

    /// Node access error
    #[error("Node access error: {0}")]
    NodeAccess(String),

    /// Serializing a node back to text failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a new XML parsing error
    pub fn xml_parse<S: Into<String>>(msg: S) -> Self {
        Error::XmlParse(msg.into())
    }

    /// Create a new XPath compilation error
    pub fn xpath_compile<S: Into<String>>(msg: S) -> Self {
        Error::XPathCompile(msg.into())
    }

    /// Create a new XPath evaluation error
    pub fn xpath_eval<S: Into<String>>(msg: S) -> Self {
        Error::XPathEval(msg.into())
    }

    /// Create a new serialization error
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        Error::Serialization(msg.into())
    }
}
