//! Fetching documents
//!
//! A [`Transport`] turns a [`Request`] into raw bytes and headers. The
//! sessions wrap the result in a [`Response`] whose document is only
//! decoded and parsed when first asked for. [`FileTransport`] serves
//! `file://` URLs and plain paths; other transports plug in through the
//! trait.

use std::fmt;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use once_cell::unsync::OnceCell;
use tokio::sync::Semaphore;
use url::Url;

use crate::config::SessionConfig;
use crate::document::Xml;
use crate::encoding;
use crate::error::{Error, Result};
use crate::json::JsonConvention;
use crate::traits::XmlParser;

/// Header names and values, looked up case-insensitively
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Set a header, replacing any value it had
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(&name)) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Head => f.write_str("HEAD"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: Headers,
}

impl Request {
    pub fn new(method: Method, target: &str) -> Result<Self> {
        Ok(Self {
            method,
            url: parse_target(target)?,
            headers: Headers::new(),
        })
    }

    /// A `GET` for a URL or a filesystem path
    pub fn get(target: &str) -> Result<Self> {
        Self::new(Method::Get, target)
    }
}

/// A URL, or a path turned into a `file://` URL
fn parse_target(target: &str) -> Result<Url> {
    if let Ok(url) = Url::parse(target) {
        if url.scheme().len() > 1 {
            return Ok(url);
        }
    }
    let path = Path::new(target);
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    Url::from_file_path(&path)
        .map_err(|_| Error::TransportError(format!("cannot turn {:?} into a URL", target)))
}

/// What a transport hands back: status, headers and the full body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub url: Url,
    pub status: u16,
    pub headers: Headers,
    pub content: Vec<u8>,
}

/// Fetches raw responses. Implementations may block; the async session
/// runs them on the blocking pool.
pub trait Transport: Send + Sync {
    fn fetch(&self, request: &Request) -> Result<RawResponse>;
}

/// Serves `file://` URLs from the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTransport;

impl FileTransport {
    fn content_type(path: &Path) -> Option<&'static str> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "xml" | "xsd" | "xsl" => Some("application/xml"),
            "rss" => Some("application/rss+xml"),
            "atom" => Some("application/atom+xml"),
            "html" | "htm" => Some("text/html"),
            _ => None,
        }
    }
}

impl Transport for FileTransport {
    fn fetch(&self, request: &Request) -> Result<RawResponse> {
        if request.url.scheme() != "file" {
            return Err(Error::TransportError(format!(
                "unsupported scheme {:?} in {}",
                request.url.scheme(),
                request.url
            )));
        }
        let path = request
            .url
            .to_file_path()
            .map_err(|_| Error::TransportError(format!("not a local path: {}", request.url)))?;

        let mut headers = Headers::new();
        let (status, content) = match std::fs::read(&path) {
            Ok(content) => {
                if let Some(content_type) = Self::content_type(&path) {
                    headers.insert("Content-Type", content_type);
                }
                headers.insert("Content-Length", content.len().to_string());
                let content = match request.method {
                    Method::Get => content,
                    Method::Head => Vec::new(),
                };
                (200, content)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => (404, Vec::new()),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => (403, Vec::new()),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(method = %request.method, url = %request.url, status, "fetched");

        Ok(RawResponse {
            url: request.url.clone(),
            status,
            headers,
            content,
        })
    }
}

/// A fetched response with a lazily built document
pub struct Response {
    raw: RawResponse,
    encoding: String,
    json_convention: JsonConvention,
    xml: OnceCell<Xml>,
}

impl Response {
    /// Wrap a raw response. The encoding is the `Content-Type` charset, or
    /// `default_encoding` when there is none.
    pub fn new(raw: RawResponse, default_encoding: &str) -> Self {
        let encoding = raw
            .headers
            .get("Content-Type")
            .and_then(encoding::content_type_charset)
            .unwrap_or(default_encoding)
            .to_string();
        Self {
            raw,
            encoding,
            json_convention: JsonConvention::default(),
            xml: OnceCell::new(),
        }
    }

    /// Use `convention` for [`json`](Response::json)
    pub fn with_json_convention(mut self, convention: JsonConvention) -> Self {
        self.json_convention = convention;
        self
    }

    pub fn json_convention(&self) -> JsonConvention {
        self.json_convention
    }

    pub fn url(&self) -> &Url {
        &self.raw.url
    }

    pub fn status(&self) -> u16 {
        self.raw.status
    }

    /// Whether the status is a success
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.raw.status)
    }

    /// Fail for client and server error statuses
    pub fn error_for_status(&self) -> Result<&Self> {
        if self.raw.status >= 400 {
            return Err(Error::TransportError(format!(
                "{} returned status {}",
                self.raw.url, self.raw.status
            )));
        }
        Ok(self)
    }

    pub fn headers(&self) -> &Headers {
        &self.raw.headers
    }

    pub fn content(&self) -> &[u8] {
        &self.raw.content
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    /// The body as a document, built on first use
    pub fn xml(&self) -> &Xml {
        self.xml.get_or_init(|| {
            Xml::with_hint(
                self.raw.content.clone(),
                self.raw.headers.get("Content-Type"),
                &self.encoding,
            )
        })
    }

    /// JSON projection of the body in the session's convention
    pub fn json(&self) -> Result<String> {
        self.xml().json_as(self.json_convention)
    }

    pub fn into_raw(self) -> RawResponse {
        self.raw
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("url", &self.raw.url.as_str())
            .field("status", &self.raw.status)
            .field("encoding", &self.encoding)
            .finish()
    }
}

/// Wrap a fetched body with the session's encoding and JSON defaults
fn respond(config: &SessionConfig, raw: RawResponse) -> Response {
    Response::new(raw, &config.default_encoding).with_json_convention(config.json_convention)
}

/// Build a request carrying the session headers and user agent
fn prepare(
    config: &SessionConfig,
    headers: &Headers,
    method: Method,
    target: &str,
) -> Result<Request> {
    let mut request = Request::new(method, target)?;
    for (name, value) in headers.iter() {
        request.headers.insert(name, value);
    }
    if config.mock_browser && !request.headers.contains("User-Agent") {
        request.headers.insert("User-Agent", config.user_agent.as_str());
    }
    Ok(request)
}

/// A blocking session
#[derive(Debug)]
pub struct XmlSession<T: Transport = FileTransport> {
    transport: T,
    config: SessionConfig,
    headers: Headers,
}

impl XmlSession<FileTransport> {
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        Self::with_transport(FileTransport, config)
    }
}

impl Default for XmlSession<FileTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> XmlSession<T> {
    pub fn with_transport(transport: T, config: SessionConfig) -> Self {
        Self {
            transport,
            config,
            headers: Headers::new(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Headers sent with every request
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn request(&self, method: Method, target: &str) -> Result<Response> {
        let request = prepare(&self.config, &self.headers, method, target)?;
        let raw = self.transport.fetch(&request)?;
        Ok(respond(&self.config, raw))
    }

    pub fn get(&self, target: &str) -> Result<Response> {
        self.request(Method::Get, target)
    }
}

/// A session whose fetches run on tokio's blocking pool, at most
/// [`SessionConfig::worker_count`] at a time.
pub struct AsyncXmlSession<T: Transport = FileTransport> {
    transport: Arc<T>,
    config: SessionConfig,
    headers: Headers,
    permits: Arc<Semaphore>,
}

impl AsyncXmlSession<FileTransport> {
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        Self::with_transport(FileTransport, config)
    }
}

impl Default for AsyncXmlSession<FileTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport + 'static> AsyncXmlSession<T> {
    pub fn with_transport(transport: T, config: SessionConfig) -> Self {
        let workers = config.worker_count();
        tracing::debug!(workers, "async session pool");
        Self {
            transport: Arc::new(transport),
            config,
            headers: Headers::new(),
            permits: Arc::new(Semaphore::new(workers)),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Permits not currently held by a fetch
    pub fn available_workers(&self) -> usize {
        self.permits.available_permits()
    }

    pub async fn request(&self, method: Method, target: &str) -> Result<Response> {
        let request = prepare(&self.config, &self.headers, method, target)?;
        let raw = fetch_blocking(
            Arc::clone(&self.transport),
            Arc::clone(&self.permits),
            request,
        )
        .await?;
        Ok(respond(&self.config, raw))
    }

    pub async fn get(&self, target: &str) -> Result<Response> {
        self.request(Method::Get, target).await
    }

    /// Fetch every target concurrently, bounded by the pool size. Results
    /// come back in the order of `targets`.
    pub async fn get_all(&self, targets: &[&str]) -> Vec<Result<Response>> {
        let tasks: Vec<_> = targets
            .iter()
            .map(|target| {
                prepare(&self.config, &self.headers, Method::Get, target).map(|request| {
                    tokio::spawn(fetch_blocking(
                        Arc::clone(&self.transport),
                        Arc::clone(&self.permits),
                        request,
                    ))
                })
            })
            .collect();

        let mut responses = Vec::with_capacity(tasks.len());
        for task in tasks {
            let raw = match task {
                Ok(handle) => handle
                    .await
                    .unwrap_or_else(|e| Err(Error::TransportError(format!("fetch task failed: {}", e)))),
                Err(e) => Err(e),
            };
            responses.push(raw.map(|raw| respond(&self.config, raw)));
        }
        responses
    }
}

async fn fetch_blocking<T: Transport + 'static>(
    transport: Arc<T>,
    permits: Arc<Semaphore>,
    request: Request,
) -> Result<RawResponse> {
    let _permit = permits
        .acquire_owned()
        .await
        .map_err(|e| Error::TransportError(e.to_string()))?;
    tokio::task::spawn_blocking(move || transport.fetch(&request))
        .await
        .map_err(|e| Error::TransportError(format!("fetch task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_ignore_case() {
        let mut headers: Headers = [("Content-Type", "text/xml")].into_iter().collect();
        assert_eq!(headers.get("content-type"), Some("text/xml"));
        headers.insert("CONTENT-TYPE", "application/xml");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("Content-Type"), Some("application/xml"));
    }

    #[test]
    fn targets_can_be_paths_or_urls() {
        let request = Request::get("https://example.org/feed.rss").unwrap();
        assert_eq!(request.url.scheme(), "https");
        assert_eq!(request.method, Method::Get);

        let request = Request::get("/tmp/feed.rss").unwrap();
        assert_eq!(request.url.as_str(), "file:///tmp/feed.rss");

        let request = Request::get("feed.rss").unwrap();
        assert_eq!(request.url.scheme(), "file");
        assert!(request.url.path().ends_with("/feed.rss"));
    }

    #[test]
    fn response_encoding_prefers_charset() {
        let raw = RawResponse {
            url: Url::parse("file:///feed.xml").unwrap(),
            status: 200,
            headers: [("Content-Type", "text/xml; charset=ISO-8859-1")].into_iter().collect(),
            content: b"<a>caf\xe9</a>".to_vec(),
        };
        let response = Response::new(raw.clone(), "utf-8");
        assert_eq!(response.encoding(), "windows-1252");
        assert!(response.ok());

        let plain = RawResponse {
            headers: Headers::new(),
            ..raw
        };
        assert_eq!(Response::new(plain, "utf-8").encoding(), "utf-8");
    }

    #[test]
    fn prepare_adds_user_agent() {
        let config = SessionConfig::default();
        let request = prepare(&config, &Headers::new(), Method::Get, "/tmp/a.xml").unwrap();
        assert_eq!(request.headers.get("user-agent"), Some(config.user_agent.as_str()));

        let quiet = SessionConfig {
            mock_browser: false,
            ..SessionConfig::default()
        };
        let request = prepare(&quiet, &Headers::new(), Method::Get, "/tmp/a.xml").unwrap();
        assert!(!request.headers.contains("User-Agent"));
    }
}
