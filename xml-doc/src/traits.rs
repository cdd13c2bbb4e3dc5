//! Query surface shared by documents and elements

use std::collections::BTreeSet;

use xee_adapter::{Node, XeeTree};
use xml_doc_traits::{PathEngine, PathItem, XmlTree};

use crate::element::Element;
use crate::error::Result;
use crate::json::{JsonCache, JsonConvention};
use crate::result::{first_or_none, ResultItem};
use crate::search::{self, SearchMatch, Template};
use crate::selector::{Containing, Selector, ANY_ELEMENT};

/// A lazily parsed XML document or sub-document.
///
/// Implementors supply the cached representations; every query is built on
/// top of them. Tree-dependent queries fail with
/// [`Error::ParseError`](crate::Error::ParseError) when the text is not
/// well-formed, while [`raw_xml`](XmlParser::raw_xml),
/// [`xml`](XmlParser::xml) and [`search`](XmlParser::search) keep working.
///
/// Queries that return nothing give an empty vector, or `None` for the
/// `_first` variants. They never fail for lack of matches.
pub trait XmlParser {
    /// Raw bytes in [`encoding`](XmlParser::encoding)
    fn raw_xml(&self) -> &[u8];

    /// Decoded text
    fn xml(&self) -> &str;

    /// The encoding of [`raw_xml`](XmlParser::raw_xml)
    fn encoding(&self) -> &str;

    /// Encoding used when nothing better is known
    fn default_encoding(&self) -> &str;

    /// The parsed tree, built on first use
    fn tree(&self) -> Result<&XeeTree>;

    fn json_cache(&self) -> &JsonCache;

    /// Rendered text with whitespace runs squashed to single spaces
    fn text(&self) -> Result<String> {
        let tree = self.tree()?;
        Ok(squash(&tree.text_content(&tree.document())))
    }

    /// Evaluate an XPath expression with the root element as context, so
    /// `channel/item` on an RSS document reaches the items.
    ///
    /// Element hits become [`Element`]s; attribute values, text nodes and
    /// atomic results become strings. Document order is kept.
    fn xpath(&self, expression: &str) -> Result<Vec<ResultItem<'_>>> {
        let tree = self.tree()?;
        let root = tree.document_element()?;
        let items = tree
            .path_query(&root, expression)?
            .into_iter()
            .map(|item| match item {
                PathItem::Node(node) => ResultItem::Element(self.element(tree, node)),
                PathItem::Value(value) => ResultItem::Value(value),
            })
            .collect();
        Ok(items)
    }

    fn xpath_first(&self, expression: &str) -> Result<Option<ResultItem<'_>>> {
        Ok(first_or_none(self.xpath(expression)?))
    }

    /// Elements matching a CSS selector, in document order. An empty
    /// selector matches every element.
    fn find(&self, selector: &str) -> Result<Vec<Element<'_>>> {
        self.find_containing(selector, Containing::none())
    }

    fn find_first(&self, selector: &str) -> Result<Option<Element<'_>>> {
        Ok(first_or_none(self.find(selector)?))
    }

    /// Elements matching a CSS selector whose text contains any of the
    /// needles, ignoring case.
    ///
    /// A non-empty filter returns the hits in reverse document order.
    fn find_containing(
        &self,
        selector: &str,
        containing: impl Into<Containing>,
    ) -> Result<Vec<Element<'_>>> {
        let tree = self.tree()?;
        let selector = match selector.trim() {
            "" => ANY_ELEMENT,
            css => css,
        };
        let nodes = Selector::parse(selector)?.select(tree, &tree.document())?;
        let containing: Containing = containing.into();
        let nodes = containing.apply(nodes, |node| Ok(squash(&tree.text_content(node))))?;
        Ok(nodes
            .into_iter()
            .map(|node| self.element(tree, node))
            .collect())
    }

    fn find_containing_first(
        &self,
        selector: &str,
        containing: impl Into<Containing>,
    ) -> Result<Option<Element<'_>>> {
        Ok(first_or_none(self.find_containing(selector, containing)?))
    }

    /// Every match of a search template in the decoded text
    fn search(&self, template: &str) -> Result<Vec<SearchMatch>> {
        search::search(self.xml(), template)
    }

    fn search_first(&self, template: &str) -> Result<Option<SearchMatch>> {
        Ok(Template::compile(template)?.search_first(self.xml()))
    }

    /// Distinct texts of every `link` element, taken verbatim from the text
    /// before its first child element. A `link` with no leading text
    /// contributes an empty string.
    fn links(&self) -> Result<BTreeSet<String>> {
        let tree = self.tree()?;
        let links = tree
            .path_query_document("//link")?
            .iter()
            .filter_map(PathItem::node)
            .map(|node| tree.leading_text(node).unwrap_or_default())
            .collect();
        Ok(links)
    }

    /// Declared XML version, `"1.0"` without a declaration
    fn xml_version(&self) -> Result<String> {
        Ok(self.tree()?.doc_info().xml_version.clone())
    }

    /// Tag of the root element, in Clark notation when namespaced
    fn root_tag(&self) -> Result<String> {
        Ok(self.tree()?.doc_info().root_name.clone())
    }

    /// JSON projection in the default convention
    fn json(&self) -> Result<String> {
        self.json_as(JsonConvention::default())
    }

    /// JSON projection in a convention given by name
    fn json_named(&self, convention: &str) -> Result<String> {
        self.json_as(convention.parse()?)
    }

    /// JSON projection of the root element. Only the most recent
    /// convention is cached.
    fn json_as(&self, convention: JsonConvention) -> Result<String> {
        self.json_cache().get_or_try_insert(convention, || {
            let tree = self.tree()?;
            let root = tree.document_element()?;
            Ok(convention.project(tree, &root).to_string())
        })
    }

    /// Wrap a node of this document's tree
    fn element<'t>(&self, tree: &'t XeeTree, node: Node) -> Element<'t> {
        Element::new(tree, node, self.encoding(), self.default_encoding())
    }
}

/// Collapse whitespace runs to single spaces and trim the ends
pub fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
