//! Template search
//!
//! A template is literal text with `{}` placeholders. It is compiled once
//! into a case-insensitive regex in which `.` also matches newlines, and
//! every non-overlapping match in the searched text becomes a
//! [`SearchMatch`].
//!
//! Placeholder forms:
//!
//! - `{}` positional field, lazy
//! - `{name}` named field, lazy
//! - `{:d}` / `{name:d}` with a format spec: `d` integer, `f` decimal,
//!   `w` word characters, `W` non-word, `l` letters, `s` whitespace,
//!   `S` non-whitespace, `D` non-digits
//! - `{{` and `}}` for literal braces

use std::ops::{Index, Range};
use std::str::FromStr;

use regex::{Regex, RegexBuilder};

use crate::error::{Error, Result};

/// A compiled search template
#[derive(Debug, Clone)]
pub struct Template {
    source: String,
    regex: Regex,
    /// One entry per capture group, with the field name if it has one
    fields: Vec<Option<String>>,
}

impl Template {
    pub fn compile(template: &str) -> Result<Self> {
        let mut pattern = String::new();
        let mut fields: Vec<Option<String>> = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(template_error(template, "unmatched '}'")),
                '{' => {
                    let mut field = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some('{') | None => {
                                return Err(template_error(template, "unclosed '{'"))
                            }
                            Some(c) => field.push(c),
                        }
                    }
                    pattern.push_str(&regex::escape(&literal));
                    literal.clear();

                    let (name, spec) = match field.split_once(':') {
                        Some((name, spec)) => (name.trim(), spec.trim()),
                        None => (field.trim(), ""),
                    };
                    let group = field_pattern(spec).ok_or_else(|| {
                        template_error(template, &format!("unknown format spec {:?}", spec))
                    })?;

                    let name = (!name.is_empty()).then(|| name.to_string());
                    if let Some(name) = &name {
                        if fields.iter().flatten().any(|existing| existing == name) {
                            return Err(template_error(
                                template,
                                &format!("duplicate field name {:?}", name),
                            ));
                        }
                    }
                    fields.push(name);
                    pattern.push('(');
                    pattern.push_str(group);
                    pattern.push(')');
                }
                c => literal.push(c),
            }
        }
        pattern.push_str(&regex::escape(&literal));

        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .build()
            .map_err(|e| template_error(template, &e.to_string()))?;

        tracing::trace!(template, %pattern, "compiled search template");
        Ok(Self {
            source: template.to_string(),
            regex,
            fields,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Number of fields in the template
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Every non-overlapping match in `text`, in order
    pub fn search_all(&self, text: &str) -> Vec<SearchMatch> {
        self.regex
            .captures_iter(text)
            .map(|caps| self.to_match(&caps))
            .collect()
    }

    /// The first match in `text`
    pub fn search_first(&self, text: &str) -> Option<SearchMatch> {
        self.regex.captures(text).map(|caps| self.to_match(&caps))
    }

    fn to_match(&self, caps: &regex::Captures<'_>) -> SearchMatch {
        let mut fixed = Vec::new();
        let mut named = Vec::new();
        for (i, name) in self.fields.iter().enumerate() {
            let value = caps
                .get(i + 1)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            match name {
                Some(name) => named.push((name.clone(), value)),
                None => fixed.push(value),
            }
        }
        let span = caps.get(0).map(|m| m.range()).unwrap_or_default();
        SearchMatch { fixed, named, span }
    }
}

impl FromStr for Template {
    type Err = Error;

    fn from_str(template: &str) -> Result<Self> {
        Self::compile(template)
    }
}

/// Compile `template` and collect every match in `text`
pub fn search(text: &str, template: &str) -> Result<Vec<SearchMatch>> {
    Ok(Template::compile(template)?.search_all(text))
}

/// One template match: positional fields, named fields and the span of the
/// whole match in the searched text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch {
    fixed: Vec<String>,
    named: Vec<(String, String)>,
    span: Range<usize>,
}

impl SearchMatch {
    /// Positional fields in template order
    pub fn fixed(&self) -> &[String] {
        &self.fixed
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.fixed.get(index).map(String::as_str)
    }

    pub fn named(&self, name: &str) -> Option<&str> {
        self.named
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Named fields in template order
    pub fn named_fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.named.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn span(&self) -> Range<usize> {
        self.span.clone()
    }

    pub fn len(&self) -> usize {
        self.fixed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixed.is_empty()
    }

    /// Parse a positional field as `T`
    pub fn parse<T>(&self, index: usize) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let value = self
            .get(index)
            .ok_or_else(|| Error::TemplateError(format!("no field at index {}", index)))?;
        value
            .trim()
            .parse()
            .map_err(|e| Error::TemplateError(format!("cannot convert {:?}: {}", value, e)))
    }
}

impl Index<usize> for SearchMatch {
    type Output = str;

    fn index(&self, index: usize) -> &str {
        &self.fixed[index]
    }
}

fn field_pattern(spec: &str) -> Option<&'static str> {
    Some(match spec {
        "" => ".+?",
        "d" => r"[-+]?\d+",
        "f" => r"[-+]?\d*\.\d+",
        "w" => r"\w+",
        "W" => r"\W+",
        "l" => r"[[:alpha:]]+",
        "s" => r"\s+",
        "S" => r"\S+",
        "D" => r"\D+",
        _ => return None,
    })
}

fn template_error(template: &str, msg: &str) -> Error {
    Error::TemplateError(format!("{} in {:?}", msg, template))
}
