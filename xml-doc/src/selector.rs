//! CSS selector view
//!
//! Selectors are compiled to XPath and evaluated by the tree engine, so a
//! CSS match and a path match are the same node in the same tree. Matching
//! starts at `descendant-or-self`, which lets an element match itself when
//! queried through its own subtree.

use std::fmt;
use std::str::FromStr;

use cssparser::{ParseError, ParseErrorKind, Parser as CssParser, ParserInput, Token};
use xee_adapter::{Node, XeeTree};
use xml_doc_traits::{PathEngine, PathItem};

use crate::error::{Error, Result};

/// Selector used when none is given
pub const ANY_ELEMENT: &str = "*";

/// A compiled CSS selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    css: String,
    xpath: String,
}

impl Selector {
    /// Compile a selector group
    pub fn parse(css: &str) -> Result<Self> {
        let xpath = css_to_xpath(css)?;
        tracing::trace!(css, %xpath, "compiled selector");
        Ok(Self {
            css: css.to_string(),
            xpath,
        })
    }

    /// The selector source
    pub fn css(&self) -> &str {
        &self.css
    }

    /// The equivalent path expression
    pub fn xpath(&self) -> &str {
        &self.xpath
    }

    /// Element nodes matching this selector under `context`, in document order
    pub fn select(&self, tree: &XeeTree, context: &Node) -> Result<Vec<Node>> {
        let nodes = tree
            .path_query(context, &self.xpath)?
            .into_iter()
            .filter_map(|item| match item {
                PathItem::Node(node) => Some(node),
                PathItem::Value(_) => None,
            })
            .collect();
        Ok(nodes)
    }
}

impl FromStr for Selector {
    type Err = Error;

    fn from_str(css: &str) -> Result<Self> {
        Self::parse(css)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.css)
    }
}

/// Compile a CSS selector group into a path expression
pub fn css_to_xpath(css: &str) -> Result<String> {
    let mut input = ParserInput::new(css);
    let mut parser = CssParser::new(&mut input);
    let selectors = parser
        .parse_entirely(|p| p.parse_comma_separated(selector))
        .map_err(|e| selector_error(css, e))?;
    Ok(selectors.join(" | "))
}

/// Text filter for selector results.
///
/// A hit is kept when its rendered text contains at least one of the
/// needles, ignoring case. An empty filter keeps everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Containing(Vec<String>);

impl Containing {
    /// A filter that keeps everything
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn needles(&self) -> &[String] {
        &self.0
    }

    /// Whether `text` contains any needle, case-insensitively
    pub fn matches(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.0
            .iter()
            .any(|needle| text.contains(&needle.to_lowercase()))
    }

    /// Keep the items whose text matches, then reverse them.
    ///
    /// The reversal only happens on the filtered path; unfiltered results
    /// keep document order. Callers rely on both orders.
    pub fn apply<T, F>(&self, items: Vec<T>, mut text_of: F) -> Result<Vec<T>>
    where
        F: FnMut(&T) -> Result<String>,
    {
        if self.is_empty() {
            return Ok(items);
        }
        let mut kept = Vec::new();
        for item in items {
            if self.matches(&text_of(&item)?) {
                kept.push(item);
            }
        }
        kept.reverse();
        Ok(kept)
    }
}

impl From<&str> for Containing {
    fn from(needle: &str) -> Self {
        Self(vec![needle.to_string()])
    }
}

impl From<String> for Containing {
    fn from(needle: String) -> Self {
        Self(vec![needle])
    }
}

impl From<&[&str]> for Containing {
    fn from(needles: &[&str]) -> Self {
        Self(needles.iter().map(|n| n.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Containing {
    fn from(needles: [&str; N]) -> Self {
        Self(needles.iter().map(|n| n.to_string()).collect())
    }
}

impl From<Vec<String>> for Containing {
    fn from(needles: Vec<String>) -> Self {
        Self(needles)
    }
}

impl From<Option<&str>> for Containing {
    fn from(needle: Option<&str>) -> Self {
        needle.map(Self::from).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
    Adjacent,
    Sibling,
}

/// A single compound selector: a name test plus predicates
struct Compound {
    name: String,
    predicates: Vec<String>,
}

impl Compound {
    fn step(&self, combinator: Option<Combinator>) -> String {
        let predicates: String = self.predicates.iter().map(|p| format!("[{}]", p)).collect();
        match combinator {
            None => format!("descendant-or-self::{}{}", self.name, predicates),
            Some(Combinator::Descendant) => format!("/descendant::{}{}", self.name, predicates),
            Some(Combinator::Child) => format!("/{}{}", self.name, predicates),
            Some(Combinator::Adjacent) => {
                format!("/following-sibling::*[1]/self::{}{}", self.name, predicates)
            }
            Some(Combinator::Sibling) => {
                format!("/following-sibling::{}{}", self.name, predicates)
            }
        }
    }
}

type CssResult<'i, T> = std::result::Result<T, ParseError<'i, String>>;

/// The next token, without consuming it
fn peek<'i>(p: &mut CssParser<'i, '_>) -> Option<Token<'i>> {
    let state = p.state();
    let token = p.next_including_whitespace().ok().cloned();
    p.reset(&state);
    token
}

fn selector<'i>(p: &mut CssParser<'i, '_>) -> CssResult<'i, String> {
    p.skip_whitespace();
    let mut xpath = compound(p)?.step(None);
    loop {
        let mut had_space = false;
        let combinator = loop {
            let state = p.state();
            let token = match p.next_including_whitespace() {
                Ok(token) => token.clone(),
                Err(_) => return Ok(xpath),
            };
            match token {
                Token::WhiteSpace(_) => had_space = true,
                Token::Delim('>') => break Combinator::Child,
                Token::Delim('+') => break Combinator::Adjacent,
                Token::Delim('~') => break Combinator::Sibling,
                _ if had_space => {
                    p.reset(&state);
                    break Combinator::Descendant;
                }
                token => return Err(p.new_unexpected_token_error(token)),
            }
        };
        p.skip_whitespace();
        xpath.push_str(&compound(p)?.step(Some(combinator)));
    }
}

fn compound<'i>(p: &mut CssParser<'i, '_>) -> CssResult<'i, Compound> {
    let name = match peek(p) {
        Some(Token::Ident(name)) => Some(String::from(&*name)),
        Some(Token::Delim('*')) => Some("*".to_string()),
        _ => None,
    };
    if name.is_some() {
        p.next_including_whitespace()?;
    }
    if let Some(Token::Delim('|')) = peek(p) {
        return Err(p.new_custom_error("namespace prefixes are not supported"));
    }

    let mut predicates = Vec::new();
    loop {
        let state = p.state();
        let token = match p.next_including_whitespace() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };
        match token {
            Token::IDHash(id) | Token::Hash(id) => {
                predicates.push(format!("@id = {}", literal(&id)));
            }
            Token::Delim('.') => {
                let class = p.expect_ident_cloned()?;
                predicates.push(token_match("class", &class));
            }
            Token::SquareBracketBlock => {
                predicates.push(p.parse_nested_block(attribute)?);
                if !p.slice_from(state.position()).ends_with(']') {
                    return Err(p.new_custom_error("unclosed attribute selector"));
                }
            }
            Token::Colon => predicates.push(pseudo(p)?),
            _ => {
                p.reset(&state);
                break;
            }
        }
    }

    match name {
        None if predicates.is_empty() => Err(p.new_custom_error("expected a selector")),
        name => Ok(Compound {
            name: name.unwrap_or_else(|| "*".to_string()),
            predicates,
        }),
    }
}

/// The inside of `[...]`
fn attribute<'i>(p: &mut CssParser<'i, '_>) -> CssResult<'i, String> {
    let name = p.expect_ident_cloned()?;
    let attr = format!("@{}", &*name);
    if p.is_exhausted() {
        return Ok(attr);
    }

    let operator = p.next()?.clone();
    if operator == Token::Delim('!') {
        p.expect_delim('=')?;
    }
    let value = p.next()?.clone();
    let value = match value {
        Token::Ident(value) | Token::QuotedString(value) => String::from(&*value),
        Token::Number {
            int_value: Some(n), ..
        } => n.to_string(),
        token => return Err(p.new_unexpected_token_error(token)),
    };
    p.expect_exhausted()?;

    let lit = literal(&value);
    match operator {
        Token::Delim('=') => Ok(format!("{} = {}", attr, lit)),
        Token::IncludeMatch => Ok(token_match(&name, &value)),
        Token::DashMatch => Ok(format!(
            "{} = {} or starts-with({}, {})",
            attr,
            lit,
            attr,
            literal(&format!("{}-", value))
        )),
        Token::PrefixMatch => Ok(format!("starts-with({}, {})", attr, lit)),
        Token::SuffixMatch => Ok(format!("ends-with({}, {})", attr, lit)),
        Token::SubstringMatch => Ok(format!("contains({}, {})", attr, lit)),
        Token::Delim('!') => Ok(format!("not({} = {})", attr, lit)),
        token => Err(p.new_unexpected_token_error(token)),
    }
}

fn pseudo<'i>(p: &mut CssParser<'i, '_>) -> CssResult<'i, String> {
    let start = p.position();
    let token = p.next_including_whitespace()?.clone();
    match token {
        Token::Ident(name) => match name.to_ascii_lowercase().as_str() {
            "first-child" => Ok("not(preceding-sibling::*)".to_string()),
            "last-child" => Ok("not(following-sibling::*)".to_string()),
            "only-child" => {
                Ok("not(preceding-sibling::*) and not(following-sibling::*)".to_string())
            }
            "empty" => Ok("not(*) and not(text())".to_string()),
            "root" => Ok("not(parent::*)".to_string()),
            other => Err(p.new_custom_error(format!("unsupported pseudo-class :{}", other))),
        },
        Token::Function(name) => {
            let name = name.to_ascii_lowercase();
            let predicate = p.parse_nested_block(|p| {
                p.skip_whitespace();
                let predicate = match name.as_str() {
                    "nth-child" => {
                        let (a, b) = cssparser::parse_nth(p)?;
                        nth_child(a, b)
                    }
                    "contains" => {
                        let token = p.next()?.clone();
                        match token {
                            Token::QuotedString(text) | Token::Ident(text) => {
                                format!("contains(string(.), {})", literal(&text))
                            }
                            token => return Err(p.new_unexpected_token_error(token)),
                        }
                    }
                    "not" => {
                        let inner = compound(p)?;
                        let predicates: String =
                            inner.predicates.iter().map(|pred| format!("[{}]", pred)).collect();
                        format!("not(self::{}{})", inner.name, predicates)
                    }
                    other => {
                        let message = format!("unsupported pseudo-class :{}()", other);
                        return Err(p.new_custom_error(message));
                    }
                };
                p.expect_exhausted()?;
                Ok(predicate)
            })?;
            if !p.slice_from(start).ends_with(')') {
                return Err(p.new_custom_error("unclosed pseudo-class argument"));
            }
            Ok(predicate)
        }
        token => Err(p.new_unexpected_token_error(token)),
    }
}

/// Position test for `:nth-child(an+b)`
fn nth_child(a: i32, b: i32) -> String {
    let index = "count(preceding-sibling::*)";
    match a {
        0 if b < 1 => "false()".to_string(),
        0 => format!("{} = {}", index, b - 1),
        a if a > 0 => format!(
            "{} >= {} and ({} - {}) mod {} = 0",
            index,
            b - 1,
            index,
            b - 1,
            a
        ),
        a => format!(
            "{} <= {} and ({} - {}) mod {} = 0",
            index,
            b - 1,
            b - 1,
            index,
            -a
        ),
    }
}

fn selector_error(css: &str, error: ParseError<'_, String>) -> Error {
    let reason = match error.kind {
        ParseErrorKind::Custom(message) => message,
        ParseErrorKind::Basic(kind) => format!("{:?}", kind),
    };
    Error::SelectorError(format!(
        "{} at column {} in {:?}",
        reason, error.location.column, css
    ))
}

/// Whitespace-separated token match on an attribute
fn token_match(attr: &str, token: &str) -> String {
    format!(
        "contains(concat(' ', normalize-space(@{}), ' '), {})",
        attr,
        literal(&format!(" {} ", token))
    )
}

/// An XPath string literal
fn literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
