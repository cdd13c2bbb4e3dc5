//! PathEngine implementation for xee

use xee_xpath::{Atomic, Item, Queries, Query};
use xml_doc_traits::{
    error::{Error, Result},
    xpath::{PathEngine, PathItem},
};
use xot::{Node, Xot};

use crate::tree::{first_element_child, XeeTree};

impl XeeTree {
    /// Compile `expression`, run it with `context` as the context item and
    /// hand every resulting item to `convert`. Items mapped to `None` are
    /// dropped.
    pub(crate) fn evaluate<T, F>(
        &self,
        context: &Node,
        expression: &str,
        mut convert: F,
    ) -> Result<Vec<T>>
    where
        F: FnMut(&Xot, Item) -> Result<Option<T>>,
    {
        let queries = Queries::default();
        let query = queries
            .sequence(expression)
            .map_err(|e| Error::xpath_compile(format!("{:?}", e)))?;

        let mut documents = self.documents.borrow_mut();
        let sequence = query
            .execute(&mut *documents, &Item::Node(*context))
            .map_err(|e| Error::xpath_eval(format!("{:?}", e)))?;

        let xot = documents.xot();
        let mut out = Vec::new();
        for item in sequence.iter() {
            if let Some(value) = convert(xot, item)? {
                out.push(value);
            }
        }
        Ok(out)
    }
}

impl PathEngine for XeeTree {
    fn path_query(&self, context: &Node, expression: &str) -> Result<Vec<PathItem<Node>>> {
        let items = self.evaluate(context, expression, |xot, item| match item {
            Item::Node(node) => Ok(Some(convert_node(xot, node))),
            Item::Atomic(atomic) => Ok(Some(PathItem::Value(atomic_to_string(&atomic)))),
            _ => Err(Error::TypeConversion(
                "function items have no document representation".to_string(),
            )),
        })?;
        tracing::debug!(expression, hits = items.len(), "path query");
        Ok(items)
    }

    fn xpath_version(&self) -> &'static str {
        "3.1"
    }
}

fn convert_node(xot: &Xot, node: Node) -> PathItem<Node> {
    match xot.value(node) {
        xot::Value::Element(_) => PathItem::Node(node),
        xot::Value::Document => match first_element_child(xot, node) {
            Some(root) => PathItem::Node(root),
            None => PathItem::Value(String::new()),
        },
        xot::Value::Text(text) => PathItem::Value(text.get().to_string()),
        xot::Value::Comment(comment) => PathItem::Value(comment.get().to_string()),
        xot::Value::Attribute(attr) => PathItem::Value(attr.value().to_string()),
        xot::Value::ProcessingInstruction(_) | xot::Value::Namespace(_) => {
            PathItem::Value(xot.to_string(node).unwrap_or_default())
        }
    }
}

fn atomic_to_string(atomic: &Atomic) -> String {
    match atomic {
        Atomic::String(_, s) => s.to_string(),
        Atomic::Untyped(s) => s.to_string(),
        Atomic::Boolean(b) => b.to_string(),
        Atomic::Integer(_, i) => i.to_string(),
        Atomic::Decimal(d) => d.to_string(),
        Atomic::Float(f) => f.to_string(),
        Atomic::Double(d) => d.to_string(),
        other => format!("{:?}", other),
    }
}
