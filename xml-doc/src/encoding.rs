//! Encoding resolution for raw document bytes
//!
//! Resolution order, first hit wins:
//!
//! 1. a byte order mark,
//! 2. the `charset` of a transport hint (a `Content-Type` header value, or a
//!    bare encoding label),
//! 3. the encoding declared inside the document: the XML declaration's
//!    `encoding=`, or an HTML-style `<meta charset>` near the top,
//! 4. the caller's default.
//!
//! Labels are looked up with `encoding_rs`, which also folds the usual
//! mislabelings (`latin1` → `windows-1252`, `ascii` → `windows-1252`, ...).
//! Nothing here fails: unknown labels are skipped and resolution moves on
//! to the next rule.

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use xml_doc_traits::XmlDeclaration;

/// Encoding used when nothing else is known
pub const DEFAULT_ENCODING: &str = "utf-8";

/// How far into the body declared encodings are looked for
const SNIFF_LIMIT: usize = 4096;

static META_CHARSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta\s[^>]*?charset\s*=\s*["']?\s*([A-Za-z0-9_:.+\-]+)"#)
        .expect("meta charset pattern is valid")
});

static CONTENT_TYPE_CHARSET: Lazy<regex::Regex> = Lazy::new(|| {
    regex::Regex::new(r#"(?i)charset\s*=\s*["']?\s*([A-Za-z0-9_:.+\-]+)"#)
        .expect("charset parameter pattern is valid")
});

/// Which rule produced a resolved encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingSource {
    /// A byte order mark
    ByteOrderMark,
    /// The transport hint
    Hint,
    /// An XML declaration or meta tag in the body
    Declared,
    /// The caller's default
    Default,
}

/// Look up an encoding by label, case-insensitively
pub fn lookup(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
}

/// Resolve the encoding of `buffer`, returning its canonical name.
pub fn resolve(buffer: &[u8], hint: Option<&str>, default: &str) -> String {
    sniff(buffer, hint, default).0
}

/// Resolve the encoding of `buffer` and report which rule fired.
pub fn sniff(buffer: &[u8], hint: Option<&str>, default: &str) -> (String, EncodingSource) {
    if let Some((encoding, _)) = Encoding::for_bom(buffer) {
        tracing::trace!(encoding = encoding.name(), "encoding from byte order mark");
        return (encoding.name().to_string(), EncodingSource::ByteOrderMark);
    }

    if let Some(encoding) = hint.and_then(hint_encoding) {
        tracing::trace!(encoding = encoding.name(), "encoding from transport hint");
        return (encoding.name().to_string(), EncodingSource::Hint);
    }

    if let Some(encoding) = declared_encoding(buffer) {
        tracing::trace!(encoding = encoding.name(), "encoding declared in body");
        return (encoding.name().to_string(), EncodingSource::Declared);
    }

    match lookup(default) {
        Some(encoding) => (encoding.name().to_string(), EncodingSource::Default),
        None => {
            tracing::warn!(default, "default encoding is not a known label");
            (default.to_string(), EncodingSource::Default)
        }
    }
}

/// Decode `bytes` with the named encoding, falling back to UTF-8 for
/// unknown labels. Malformed sequences become U+FFFD.
pub fn decode(bytes: &[u8], label: &str) -> String {
    let encoding = lookup(label).unwrap_or_else(|| {
        tracing::warn!(label, "unknown encoding label, decoding as UTF-8");
        UTF_8
    });
    let (text, had_errors) = encoding.decode_with_bom_removal(bytes);
    if had_errors {
        tracing::warn!(encoding = encoding.name(), "replaced malformed byte sequences");
    }
    text.into_owned()
}

/// Encode `text` with the named encoding, falling back to UTF-8 for
/// unknown labels. UTF-16 labels produce UTF-8, as `encoding_rs` only
/// encodes to ASCII-compatible encodings.
pub fn encode(text: &str, label: &str) -> Vec<u8> {
    let encoding = lookup(label).unwrap_or(UTF_8);
    let (bytes, _, _) = encoding.encode(text);
    bytes.into_owned()
}

/// Canonical name of the `charset` parameter of a `Content-Type` value
pub fn content_type_charset(content_type: &str) -> Option<&'static str> {
    let caps = CONTENT_TYPE_CHARSET.captures(content_type)?;
    lookup(&caps[1]).map(Encoding::name)
}

/// Charset named by a transport hint
fn hint_encoding(hint: &str) -> Option<&'static Encoding> {
    match CONTENT_TYPE_CHARSET.captures(hint) {
        Some(caps) => lookup(&caps[1]),
        // a bare label such as "ISO-8859-1", but not a media type
        None if !hint.contains('/') && !hint.contains(';') => lookup(hint),
        None => None,
    }
}

/// Encoding declared in the first bytes of the body
fn declared_encoding(buffer: &[u8]) -> Option<&'static Encoding> {
    let head = &buffer[..buffer.len().min(SNIFF_LIMIT)];
    let label = XmlDeclaration::scan_bytes(head)
        .and_then(|decl| decl.encoding)
        .or_else(|| {
            META_CHARSET
                .captures(head)
                .map(|caps| String::from_utf8_lossy(&caps[1]).into_owned())
        })?;

    let encoding = lookup(&label)?;
    // A declaration readable as ASCII cannot really be UTF-16
    if encoding == UTF_16LE || encoding == UTF_16BE {
        return Some(UTF_8);
    }
    Some(encoding)
}
