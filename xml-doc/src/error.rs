//! Error types for xml-doc

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("XML parsing error: {0}")]
    ParseError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("XPath evaluation error: {0}")]
    XPathError(String),

    #[error("CSS selector error: {0}")]
    SelectorError(String),

    #[error("Search template error: {0}")]
    TemplateError(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Engine error: {0}")]
    EngineError(String),
}

impl From<xml_doc_traits::Error> for Error {
    fn from(err: xml_doc_traits::Error) -> Self {
        use xml_doc_traits::Error as Engine;
        match err {
            Engine::XmlParse(msg) => Error::ParseError(msg),
            Engine::XPathCompile(msg) | Engine::XPathEval(msg) => Error::XPathError(msg),
            Engine::Io(e) => Error::IoError(e),
            other => Error::EngineError(other.to_string()),
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::ConfigurationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
