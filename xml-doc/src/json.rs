//! Tree to JSON projection
//!
//! Each [`JsonConvention`] maps an element tree to JSON differently. All of
//! them skip comments and processing instructions, keep keys in document
//! order and coerce scalar text through [`coerce`].

use std::cell::RefCell;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use xml_doc_traits::XmlTree;

use crate::error::{Error, Result};

/// Supported XML to JSON conventions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonConvention {
    /// `@attr` keys, text under `$`
    #[default]
    BadgerFish,
    /// `attributes` and `children` keys
    Abdera,
    /// Abdera with string attributes and tail text
    Cobra,
    /// Unprefixed attributes, text under `$t`
    GData,
    /// Root and attributes dropped
    Parker,
    /// Unprefixed attributes, text under `content`, text-only leaves collapse.
    ///
    /// Unlike the usual Yahoo mapping, which keeps every value a string,
    /// numbers and booleans are coerced here as in the other conventions.
    Yahoo,
}

impl JsonConvention {
    pub const ALL: [JsonConvention; 6] = [
        JsonConvention::BadgerFish,
        JsonConvention::Abdera,
        JsonConvention::Cobra,
        JsonConvention::GData,
        JsonConvention::Parker,
        JsonConvention::Yahoo,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            JsonConvention::BadgerFish => "badgerfish",
            JsonConvention::Abdera => "abdera",
            JsonConvention::Cobra => "cobra",
            JsonConvention::GData => "gdata",
            JsonConvention::Parker => "parker",
            JsonConvention::Yahoo => "yahoo",
        }
    }

    /// Project the element `node` of `tree`
    pub fn project<T: XmlTree>(&self, tree: &T, node: &T::Node) -> Value {
        let projector = Projector { tree };
        match self {
            JsonConvention::BadgerFish => projector.keyed(node, &BADGERFISH),
            JsonConvention::GData => projector.keyed(node, &GDATA),
            JsonConvention::Yahoo => projector.keyed(node, &YAHOO),
            JsonConvention::Parker => projector.parker(node),
            JsonConvention::Abdera => projector.abdera(node),
            JsonConvention::Cobra => projector.cobra(node),
        }
    }
}

impl fmt::Display for JsonConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for JsonConvention {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        let wanted = name.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|convention| convention.name() == wanted)
            .ok_or_else(|| {
                Error::ConfigurationError(format!(
                    "unknown JSON convention {:?}, expected one of: {}",
                    name,
                    Self::ALL.map(|c| c.name()).join(", ")
                ))
            })
    }
}

/// Single-slot cache for the last projection, keyed by convention
#[derive(Debug, Default)]
pub struct JsonCache {
    slot: RefCell<Option<(JsonConvention, String)>>,
}

impl JsonCache {
    /// Cached output for `convention`, or compute and cache it
    pub fn get_or_try_insert<F>(&self, convention: JsonConvention, compute: F) -> Result<String>
    where
        F: FnOnce() -> Result<String>,
    {
        if let Some((cached, json)) = self.slot.borrow().as_ref() {
            if *cached == convention {
                return Ok(json.clone());
            }
        }
        let json = compute()?;
        tracing::trace!(%convention, len = json.len(), "cached JSON projection");
        *self.slot.borrow_mut() = Some((convention, json.clone()));
        Ok(json)
    }

    /// Convention of the cached projection, if any
    pub fn cached(&self) -> Option<JsonConvention> {
        self.slot.borrow().as_ref().map(|(convention, _)| *convention)
    }

    pub fn clear(&mut self) {
        self.slot.get_mut().take();
    }
}

/// Convert text to the JSON scalar it spells.
///
/// Blank text is `null`, `true`/`false` in any case are booleans, integers
/// and finite floats are numbers. Anything else stays a string.
pub fn coerce(text: &str) -> Value {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    let lowered = trimmed.to_ascii_lowercase();
    match lowered.as_str() {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(int) = lowered.parse::<i64>() {
        return Value::Number(int.into());
    }
    if let Some(number) = lowered.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(number);
    }
    Value::String(text.to_string())
}

/// Layout of the conventions that key values by tag
struct Keyed {
    attr_prefix: &'static str,
    text_key: &'static str,
    simple_text: bool,
}

const BADGERFISH: Keyed = Keyed {
    attr_prefix: "@",
    text_key: "$",
    simple_text: false,
};

const GDATA: Keyed = Keyed {
    attr_prefix: "",
    text_key: "$t",
    simple_text: false,
};

// values are coerced, not kept as strings
const YAHOO: Keyed = Keyed {
    attr_prefix: "",
    text_key: "content",
    simple_text: true,
};

struct Projector<'t, T> {
    tree: &'t T,
}

impl<T: XmlTree> Projector<'_, T> {
    fn tag(&self, node: &T::Node) -> String {
        self.tree.node_name(node).unwrap_or_default()
    }

    /// Leading text, trimmed, if it has anything but whitespace
    fn text(&self, node: &T::Node) -> Option<String> {
        non_blank(self.tree.leading_text(node))
    }

    fn tail(&self, node: &T::Node) -> Option<String> {
        non_blank(self.tree.tail_text(node))
    }

    fn wrap(&self, node: &T::Node, value: Value) -> Value {
        let mut map = Map::new();
        map.insert(self.tag(node), value);
        Value::Object(map)
    }

    /// Children grouped by tag in first-seen order, with repeat counts
    fn tag_counts(&self, children: &[T::Node]) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for child in children {
            let tag = self.tag(child);
            match counts.iter_mut().find(|(t, _)| *t == tag) {
                Some((_, n)) => *n += 1,
                None => counts.push((tag, 1)),
            }
        }
        counts
    }

    fn repeated(counts: &[(String, usize)], tag: &str) -> bool {
        counts.iter().any(|(t, n)| t == tag && *n > 1)
    }

    fn keyed(&self, node: &T::Node, layout: &Keyed) -> Value {
        let attributes = self.tree.attributes(node);
        let children = self.tree.element_children(node);

        let mut map = Map::new();
        for (name, value) in &attributes {
            map.insert(format!("{}{}", layout.attr_prefix, name), coerce(value));
        }

        if let Some(text) = self.text(node) {
            if layout.simple_text && children.is_empty() && attributes.is_empty() {
                return self.wrap(node, coerce(&text));
            }
            map.insert(layout.text_key.to_string(), coerce(&text));
        }

        let counts = self.tag_counts(&children);
        for child in &children {
            let tag = self.tag(child);
            let Value::Object(projected) = self.keyed(child, layout) else {
                continue;
            };
            for (key, value) in projected {
                if Self::repeated(&counts, &tag) {
                    match map.entry(key).or_insert_with(|| Value::Array(Vec::new())) {
                        Value::Array(items) => items.push(value),
                        slot => *slot = Value::Array(vec![slot.take(), value]),
                    }
                } else {
                    map.insert(key, value);
                }
            }
        }

        if layout.simple_text && map.is_empty() {
            return self.wrap(node, Value::String(String::new()));
        }
        self.wrap(node, Value::Object(map))
    }

    fn parker(&self, node: &T::Node) -> Value {
        let children = self.tree.element_children(node);
        if children.is_empty() {
            return self
                .tree
                .leading_text(node)
                .map(|text| coerce(text.trim()))
                .unwrap_or(Value::Null);
        }

        let counts = self.tag_counts(&children);
        let mut map = Map::new();
        for child in &children {
            let tag = self.tag(child);
            let value = self.parker(child);
            if Self::repeated(&counts, &tag) {
                if let Value::Array(items) =
                    map.entry(tag).or_insert_with(|| Value::Array(Vec::new()))
                {
                    items.push(value);
                }
            } else {
                map.insert(tag, value);
            }
        }
        Value::Object(map)
    }

    fn abdera(&self, node: &T::Node) -> Value {
        let attributes = self.tree.attributes(node);
        let children = self.tree.element_children(node);

        let mut map = Map::new();
        if !attributes.is_empty() {
            let attrs: Map<String, Value> = attributes
                .iter()
                .map(|(name, value)| (name.clone(), coerce(value)))
                .collect();
            map.insert("attributes".to_string(), Value::Object(attrs));
        }

        let mut items = Vec::new();
        if let Some(text) = self.text(node) {
            if children.is_empty() && attributes.is_empty() {
                return self.wrap(node, coerce(&text));
            }
            items.push(coerce(&text));
        }
        items.extend(children.iter().map(|child| self.abdera(child)));

        if attributes.is_empty() && items.len() == 1 {
            return self.wrap(node, items.remove(0));
        }
        if !items.is_empty() {
            map.insert("children".to_string(), Value::Array(items));
        }
        self.wrap(node, Value::Object(map))
    }

    fn cobra(&self, node: &T::Node) -> Value {
        let attributes = self.tree.attributes(node);
        let children = self.tree.element_children(node);

        let mut map = Map::new();
        if !attributes.is_empty() {
            let attrs: Map<String, Value> = attributes
                .into_iter()
                .map(|(name, value)| (name, Value::String(value)))
                .collect();
            map.insert("attributes".to_string(), Value::Object(attrs));
        }

        let mut items = Vec::new();
        if let Some(text) = self.text(node) {
            if children.is_empty() && map.is_empty() {
                return self.wrap(node, coerce(&text));
            }
            items.push(coerce(&text));
        }
        for child in &children {
            items.push(self.cobra(child));
            if let Some(tail) = self.tail(child) {
                items.push(coerce(&tail));
            }
        }

        if !items.is_empty() {
            map.insert("children".to_string(), Value::Array(items));
        }
        self.wrap(node, Value::Object(map))
    }
}

fn non_blank(text: Option<String>) -> Option<String> {
    text.map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}
