//! XmlTree implementation for xot

use std::borrow::Cow;
use std::cell::RefCell;
use std::ops::Range;

use xee_xpath::{Documents, Item, Queries, Query};
use xml_doc_traits::{
    declaration::XmlDeclaration,
    error::{Error, Result},
    tree::{DocInfo, NodeType, XmlTree},
};
use xot::{NameId, Node, Xot};

/// An immutable parsed document.
///
/// The xot arena lives inside the xee `Documents` store so XPath results
/// come back as handles into the same tree. Evaluation needs mutable access
/// to the store, hence the `RefCell`; nothing in this type ever changes the
/// tree itself.
pub struct XeeTree {
    pub(crate) documents: RefCell<Documents>,
    document: Node,
    info: DocInfo,
}

impl XeeTree {
    /// Parse a document from text.
    ///
    /// A leading byte order mark and leading whitespace are ignored. A
    /// `<!DOCTYPE>` is skipped without loading any DTD, unless its internal
    /// subset declares entities.
    #[tracing::instrument(skip_all, fields(len = xml.len()))]
    pub fn parse(xml: &str) -> Result<Self> {
        let xml = xml.strip_prefix('\u{feff}').unwrap_or(xml).trim_start();
        let declaration = XmlDeclaration::scan(xml);
        let xml = blank_doctype(xml)?;

        let mut documents = Documents::new();
        let handle = documents.add_string_without_uri(&xml).map_err(|e| {
            tracing::debug!("document rejected by parser: {:?}", e);
            Error::xml_parse(format!("{:?}", e))
        })?;

        let queries = Queries::default();
        let root = queries
            .sequence("/")
            .map_err(|e| Error::xpath_compile(format!("{:?}", e)))?;
        let sequence = root
            .execute(&mut documents, handle)
            .map_err(|e| Error::xpath_eval(format!("{:?}", e)))?;
        let document = sequence
            .iter()
            .find_map(|item| match item {
                Item::Node(node) => Some(node),
                _ => None,
            })
            .ok_or_else(|| Error::NodeAccess("Document has no document node".to_string()))?;

        let root_name = {
            let xot = documents.xot();
            first_element_child(xot, document)
                .and_then(|element| xot.element(element))
                .map(|element| expanded_name(xot, element.name()))
                .ok_or_else(|| Error::NodeAccess("Document has no root element".to_string()))?
        };

        let info = match declaration {
            Some(decl) => DocInfo {
                xml_version: decl.version,
                encoding: decl.encoding,
                standalone: decl.standalone,
                root_name,
            },
            None => DocInfo {
                xml_version: "1.0".to_string(),
                encoding: None,
                standalone: None,
                root_name,
            },
        };

        tracing::trace!(root = %info.root_name, version = %info.xml_version, "parsed document");
        Ok(Self {
            documents: RefCell::new(documents),
            document,
            info,
        })
    }
}

impl std::fmt::Debug for XeeTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XeeTree")
            .field("document", &self.document)
            .field("info", &self.info)
            .finish()
    }
}

/// Replace a prolog `<!DOCTYPE>` with whitespace, which xot cannot parse.
/// Line breaks are kept so parser positions stay meaningful.
fn blank_doctype(xml: &str) -> Result<Cow<'_, str>> {
    let Some(span) = doctype_span(xml) else {
        return Ok(Cow::Borrowed(xml));
    };
    let doctype = &xml[span.clone()];
    if doctype.contains("<!ENTITY") {
        return Err(Error::xml_parse("DOCTYPE declares entities"));
    }
    tracing::debug!(len = doctype.len(), "skipping DOCTYPE");

    let mut out = String::with_capacity(xml.len());
    out.push_str(&xml[..span.start]);
    out.extend(doctype.chars().map(|c| if c == '\n' { '\n' } else { ' ' }));
    out.push_str(&xml[span.end..]);
    Ok(Cow::Owned(out))
}

/// Byte range of the DOCTYPE, looking only past the declaration, comments
/// and processing instructions that may precede it
fn doctype_span(xml: &str) -> Option<Range<usize>> {
    let mut pos = 0;
    loop {
        let rest = &xml[pos..];
        let trimmed = rest.trim_start();
        pos += rest.len() - trimmed.len();
        if trimmed.starts_with("<?") {
            pos += trimmed.find("?>")? + 2;
        } else if trimmed.starts_with("<!--") {
            pos += trimmed.find("-->")? + 3;
        } else if trimmed.starts_with("<!DOCTYPE") {
            return doctype_len(trimmed).map(|len| pos..pos + len);
        } else {
            return None;
        }
    }
}

/// Length of a DOCTYPE, internal subset included
fn doctype_len(doctype: &str) -> Option<usize> {
    let mut quote = None;
    let mut depth = 0usize;
    for (i, c) in doctype.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, '>') if depth == 0 => return Some(i + c.len_utf8()),
            _ => {}
        }
    }
    None
}

/// Expanded name of a name id: `{uri}local`, or `local` outside a namespace
pub(crate) fn expanded_name(xot: &Xot, name: NameId) -> String {
    let (local, uri) = xot.name_ns_str(name);
    if uri.is_empty() {
        local.to_string()
    } else {
        format!("{{{}}}{}", uri, local)
    }
}

pub(crate) fn first_element_child(xot: &Xot, node: Node) -> Option<Node> {
    xot.children(node).find(|child| xot.is_element(*child))
}

impl XmlTree for XeeTree {
    type Node = Node;

    fn document(&self) -> Node {
        self.document
    }

    fn document_element(&self) -> Result<Node> {
        let documents = self.documents.borrow();
        first_element_child(documents.xot(), self.document)
            .ok_or_else(|| Error::NodeAccess("Document has no root element".to_string()))
    }

    fn doc_info(&self) -> &DocInfo {
        &self.info
    }

    fn parent(&self, node: &Node) -> Option<Node> {
        self.documents.borrow().xot().parent(*node)
    }

    fn children(&self, node: &Node) -> Vec<Node> {
        self.documents.borrow().xot().children(*node).collect()
    }

    fn attributes(&self, node: &Node) -> Vec<(String, String)> {
        if self.node_type(node) != NodeType::Element {
            return Vec::new();
        }
        let pairs = self.evaluate(node, "@*", |xot, item| match item {
            Item::Node(attribute) => match xot.value(attribute) {
                xot::Value::Attribute(attr) => Ok(Some((
                    expanded_name(xot, attr.name()),
                    attr.value().to_string(),
                ))),
                _ => Ok(None),
            },
            _ => Ok(None),
        });
        pairs.unwrap_or_else(|e| {
            tracing::warn!("could not read attributes of {:?}: {}", node, e);
            Vec::new()
        })
    }

    fn node_name(&self, node: &Node) -> Option<String> {
        let documents = self.documents.borrow();
        let xot = documents.xot();
        match xot.value(*node) {
            xot::Value::Element(element) => Some(expanded_name(xot, element.name())),
            xot::Value::Attribute(attr) => Some(expanded_name(xot, attr.name())),
            _ => None,
        }
    }

    fn node_local_name(&self, node: &Node) -> Option<String> {
        let documents = self.documents.borrow();
        let xot = documents.xot();
        match xot.value(*node) {
            xot::Value::Element(element) => Some(xot.name_ns_str(element.name()).0.to_string()),
            xot::Value::Attribute(attr) => Some(xot.name_ns_str(attr.name()).0.to_string()),
            _ => None,
        }
    }

    fn node_namespace_uri(&self, node: &Node) -> Option<String> {
        let documents = self.documents.borrow();
        let xot = documents.xot();
        let name = match xot.value(*node) {
            xot::Value::Element(element) => element.name(),
            xot::Value::Attribute(attr) => attr.name(),
            _ => return None,
        };
        let (_, uri) = xot.name_ns_str(name);
        (!uri.is_empty()).then(|| uri.to_string())
    }

    fn node_value(&self, node: &Node) -> Option<String> {
        let documents = self.documents.borrow();
        match documents.xot().value(*node) {
            xot::Value::Text(text) => Some(text.get().to_string()),
            xot::Value::Comment(comment) => Some(comment.get().to_string()),
            xot::Value::Attribute(attr) => Some(attr.value().to_string()),
            _ => None,
        }
    }

    fn node_type(&self, node: &Node) -> NodeType {
        let documents = self.documents.borrow();
        match documents.xot().value(*node) {
            xot::Value::Document => NodeType::Document,
            xot::Value::Element(_) => NodeType::Element,
            xot::Value::Text(_) => NodeType::Text,
            xot::Value::Comment(_) => NodeType::Comment,
            xot::Value::ProcessingInstruction(_) => NodeType::ProcessingInstruction,
            xot::Value::Attribute(_) => NodeType::Attribute,
            xot::Value::Namespace(_) => NodeType::Namespace,
        }
    }

    fn serialize(&self, node: &Node) -> Result<String> {
        self.documents
            .borrow()
            .xot()
            .to_string(*node)
            .map_err(|e| Error::serialization(e.to_string()))
    }
}
