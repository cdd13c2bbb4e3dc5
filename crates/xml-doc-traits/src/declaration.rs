//! XML declaration scanning
//!
//! A lightweight look at the `<?xml ... ?>` header without running a full
//! parser. The encoding resolver uses it on raw bytes before any decoding
//! has happened, and tree adapters use it to report the declared version.

use serde::{Deserialize, Serialize};

/// How far into a document the declaration may end.
const SCAN_LIMIT: usize = 1024;

/// Pseudo-attributes of an XML declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XmlDeclaration {
    /// The `version` pseudo-attribute
    pub version: String,
    /// The `encoding` pseudo-attribute, verbatim
    pub encoding: Option<String>,
    /// The `standalone` pseudo-attribute
    pub standalone: Option<bool>,
}

impl XmlDeclaration {
    /// Scan decoded text for a leading XML declaration.
    ///
    /// A leading byte order mark is skipped. Returns `None` when the text
    /// does not start with a declaration or the declaration has no
    /// `version`.
    pub fn scan(text: &str) -> Option<Self> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        if !text.starts_with("<?xml") {
            return None;
        }
        let end = text.find("?>").filter(|&end| end < SCAN_LIMIT)?;
        let decl = &text["<?xml".len()..end];
        // `<?xml-stylesheet` and friends are processing instructions
        if !decl.starts_with(|c: char| c.is_ascii_whitespace()) {
            return None;
        }

        Some(Self {
            version: pseudo_attribute(decl, "version")?,
            encoding: pseudo_attribute(decl, "encoding"),
            standalone: pseudo_attribute(decl, "standalone").map(|v| v == "yes"),
        })
    }

    /// Scan raw bytes for a leading XML declaration.
    ///
    /// The declaration is required to be ASCII, so this works for every
    /// ASCII-compatible encoding without decoding the buffer first.
    pub fn scan_bytes(bytes: &[u8]) -> Option<Self> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        let window = &bytes[..bytes.len().min(SCAN_LIMIT)];
        let end = window.windows(2).position(|w| w == b"?>")?;
        let head = std::str::from_utf8(&window[..end + 2]).ok()?;
        Self::scan(head)
    }
}

/// Extract `name="value"` (or single-quoted) from declaration content.
fn pseudo_attribute(decl: &str, name: &str) -> Option<String> {
    let mut rest = decl;
    loop {
        let pos = rest.find(name)?;
        let preceded_by_space = rest[..pos]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_ascii_whitespace());
        let after = rest[pos + name.len()..].trim_start();
        match after.strip_prefix('=') {
            Some(value) if preceded_by_space => {
                let value = value.trim_start();
                let quote = value.chars().next()?;
                if quote != '"' && quote != '\'' {
                    return None;
                }
                let value = &value[1..];
                let end = value.find(quote)?;
                return Some(value[..end].to_string());
            }
            _ => rest = &rest[pos + name.len()..],
        }
    }
}
