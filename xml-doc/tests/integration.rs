//! Integration tests for xml-doc
//!
//! Exercises the query surface of documents and elements against a
//! syndication feed with 60 items.

use std::collections::BTreeSet;

use serde_json::Value;
use xml_doc::encoding;
use xml_doc::{AttrValue, Error, JsonConvention, ResultItem, Xml, XmlParser};

const NASA: &str = include_str!("fixtures/nasa.rss");

const XML_BASE: &str = "{http://www.w3.org/XML/1998/namespace}base";

fn nasa() -> Xml {
    Xml::new(NASA)
}

fn title_of(item: &xml_doc::Element<'_>) -> String {
    item.find_first("title")
        .unwrap()
        .expect("every item has a title")
        .text()
        .unwrap()
}

// ============== Path queries ==============

#[test_log::test]
fn xpath_finds_every_item() {
    let doc = nasa();
    let items = doc.xpath("//item").unwrap();
    assert_eq!(items.len(), 60);
    assert!(items.iter().all(ResultItem::is_element));
}

#[test]
fn xpath_returns_values_for_non_elements() {
    let doc = nasa();
    let count = doc.xpath_first("count(//item)").unwrap().unwrap();
    assert_eq!(count.as_str(), Some("60"));

    let title = doc.xpath_first("//channel/title/text()").unwrap().unwrap();
    assert_eq!(title.as_str(), Some("NASA Image of the Day"));

    let flags = doc.xpath("//item/guid/@isPermaLink").unwrap();
    assert_eq!(flags.len(), 60);
    assert!(flags.iter().all(|flag| flag.as_str() == Some("false")));
}

#[test]
fn xpath_context_is_the_root_element() {
    let doc = nasa();
    assert_eq!(doc.xpath("channel/item").unwrap().len(), 60);
    assert!(doc.xpath("rss").unwrap().is_empty());

    let root = doc.xpath_first(".").unwrap().unwrap().into_element().unwrap();
    assert_eq!(root.tag(), "rss");

    let item = doc.find_first("item").unwrap().unwrap();
    let title = item.xpath_first("title/text()").unwrap().unwrap();
    assert_eq!(title.as_str(), Some("Spiral Galaxy 1"));
}

#[test]
fn xpath_rejects_bad_expressions() {
    let doc = nasa();
    assert!(matches!(doc.xpath("//item["), Err(Error::XPathError(_))));
}

#[test]
fn root_has_two_attributes() {
    let doc = nasa();
    let rss = doc
        .xpath_first("/rss")
        .unwrap()
        .and_then(ResultItem::into_element)
        .unwrap();
    let attrs = rss.attrs();
    assert_eq!(attrs.len(), 2);
    assert!(attrs.get("version").unwrap().contains("2.0"));
    assert_eq!(
        attrs.get(XML_BASE),
        Some(&AttrValue::Single("http://www.nasa.gov/".to_string()))
    );
}

// ============== Links and metadata ==============

#[test]
fn links_are_distinct_link_texts() {
    let links = nasa().links().unwrap();
    assert_eq!(links.len(), 61);
    assert!(links.contains("http://www.nasa.gov/image-of-the-day/"));
    assert!(links.contains("http://www.nasa.gov/image-article/iotd-60/"));
}

#[test]
fn links_of_a_snippet() {
    let doc = Xml::from("<item><link>http://example.org/a</link></item>");
    let expected: BTreeSet<String> = ["http://example.org/a".to_string()].into();
    assert_eq!(doc.links().unwrap(), expected);
    assert_eq!(doc.raw_xml(), b"<item><link>http://example.org/a</link></item>");
    assert_eq!(doc.xml(), "<item><link>http://example.org/a</link></item>");
}

#[test]
fn links_keep_their_literal_text() {
    let doc = Xml::from("<r><link>\n  http://a/  </link><link>x<b/>y</link><link/></r>");
    let expected: BTreeSet<String> = ["\n  http://a/  ", "x", ""]
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(doc.links().unwrap(), expected);
}

#[test]
fn header_metadata() {
    let doc = nasa();
    assert_eq!(doc.encoding(), "UTF-8");
    assert_eq!(doc.xml_version().unwrap(), "1.0");
    assert_eq!(doc.root_tag().unwrap(), "rss");
    assert!(doc.text().unwrap().starts_with("NASA Image of the Day http://www.nasa.gov/"));
}

// ============== CSS selection ==============

#[test]
fn find_keeps_document_order() {
    let doc = nasa();
    let titles = doc.find("title").unwrap();
    assert_eq!(titles.len(), 61);
    assert_eq!(titles[0].text().unwrap(), "NASA Image of the Day");
    assert_eq!(titles[1].text().unwrap(), "Spiral Galaxy 1");
    assert_eq!(titles[60].text().unwrap(), "Comet Tail 60");
}

#[test]
fn find_supports_combinators_and_attributes() {
    let doc = nasa();
    assert_eq!(doc.find("channel > title").unwrap().len(), 1);
    assert_eq!(doc.find("rss title").unwrap().len(), 61);
    assert_eq!(doc.find("guid[isPermaLink=false]").unwrap().len(), 60);
    assert_eq!(doc.find("enclosure[type^='image/']").unwrap().len(), 60);
    assert_eq!(doc.find("item:nth-child(8) > title").unwrap().len(), 1);
    assert_eq!(doc.find("title + link").unwrap().len(), 61);
    assert_eq!(doc.find("link, guid").unwrap().len(), 121);
}

#[test]
fn empty_selector_matches_every_element() {
    let doc = nasa();
    let all = doc.find("").unwrap();
    let count = doc.xpath_first("count(//*)").unwrap().unwrap();
    assert_eq!(Some(all.len().to_string().as_str()), count.as_str());
    assert_eq!(all[0].tag(), "rss");
}

#[test]
fn find_containing_filters_and_reverses() {
    let doc = nasa();
    let moons = doc.find_containing("item", "MOON").unwrap();
    let titles: Vec<String> = moons.iter().map(title_of).collect();
    assert_eq!(titles, vec!["Moon Ice Giant 45", "Moon Comet Tail 20", "Moon Ice Giant 5"]);

    let first = doc.find_containing_first("item", "moon").unwrap().unwrap();
    assert_eq!(title_of(&first), "Moon Ice Giant 45");
}

#[test]
fn find_containing_reverses_the_unfiltered_subset() {
    let doc = nasa();
    let needles = ["moon", "mars"];

    let mut expected: Vec<String> = doc
        .find("title")
        .unwrap()
        .iter()
        .map(|title| title.text().unwrap())
        .filter(|text| {
            let text = text.to_lowercase();
            needles.iter().any(|needle| text.contains(needle))
        })
        .collect();
    expected.reverse();

    let filtered: Vec<String> = doc
        .find_containing("title", needles)
        .unwrap()
        .iter()
        .map(|title| title.text().unwrap())
        .collect();
    assert_eq!(filtered.len(), 5);
    assert_eq!(filtered, expected);
}

#[test]
fn bad_selectors_are_errors() {
    let doc = nasa();
    assert!(matches!(doc.find("item >"), Err(Error::SelectorError(_))));
    assert!(matches!(doc.find("atom|link"), Err(Error::SelectorError(_))));
}

// ============== Empty results ==============

#[test_log::test]
fn first_on_no_match_is_none() {
    let doc = nasa();
    assert!(doc.xpath_first("//nothing").unwrap().is_none());
    assert!(doc.xpath("//nothing").unwrap().is_empty());
    assert!(doc.find_first("nothing").unwrap().is_none());
    assert!(doc.find_containing_first("item", "pluto").unwrap().is_none());
    assert!(doc.search_first("no such {} here").unwrap().is_none());
    assert!(doc.search("no such {} here").unwrap().is_empty());
}

// ============== Template search ==============

#[test]
fn search_extracts_fields() {
    let doc = nasa();
    let found = doc.search_first("NASA {} of the Day").unwrap().unwrap();
    assert_eq!(&found[0], "Image");

    let guids = doc.search("<guid isPermaLink=\"false\">iotd-{:d}</guid>").unwrap();
    assert_eq!(guids.len(), 60);
    assert_eq!(guids[59].parse::<u32>(0).unwrap(), 60);
}

#[test]
fn malformed_template_is_an_error() {
    assert!(matches!(nasa().search("{unclosed"), Err(Error::TemplateError(_))));
}

// ============== Elements ==============

#[test]
fn elements_query_their_own_subtree() {
    let doc = nasa();
    let item = doc.find_first("item").unwrap().unwrap();
    assert_eq!(item.tag(), "item");
    assert_eq!(item.find("link").unwrap().len(), 1);
    assert_eq!(item.links().unwrap().len(), 1);
    assert_eq!(item.xpath("//title").unwrap().len(), 1);
    assert_eq!(title_of(&item), "Spiral Galaxy 1");
    assert!(item.xml().starts_with("<item"));
    assert!(item.xml().ends_with("</item>"));
}

#[test]
fn element_display() {
    let doc = nasa();
    let enclosure = doc.find_first("enclosure").unwrap().unwrap();
    assert_eq!(
        enclosure.to_string(),
        "<Element 'enclosure' url='http://www.nasa.gov/images/iotd-01.jpg' length='100731' type='image/jpeg'>"
    );
}

#[test]
fn namespaced_elements_use_clark_names() {
    let doc = nasa();
    let atom = doc
        .xpath_first("//*[local-name() = 'link' and namespace-uri() != '']")
        .unwrap()
        .and_then(ResultItem::into_element)
        .unwrap();
    assert_eq!(atom.tag(), "{http://www.w3.org/2005/Atom}link");
    assert_eq!(atom.local_name(), "link");
    assert_eq!(
        atom.attrs().get("rel").and_then(AttrValue::tokens),
        Some(&["self".to_string()][..])
    );
}

// ============== Caching ==============

#[test]
fn cached_representations_are_stable() {
    let doc = nasa();
    assert!(!doc.is_parsed());
    let tree = doc.tree().unwrap();
    assert!(std::ptr::eq(tree, doc.tree().unwrap()));
    assert!(std::ptr::eq(doc.xml(), doc.xml()));
    assert!(std::ptr::eq(doc.encoding(), doc.encoding()));

    let json = doc.json().unwrap();
    assert_eq!(doc.json().unwrap(), json);
    assert_eq!(doc.json_cache().cached(), Some(JsonConvention::BadgerFish));

    let rss = doc.find_first("rss").unwrap().unwrap();
    assert!(std::ptr::eq(rss.attrs(), rss.attrs()));
}

#[test]
fn raw_bytes_round_trip() {
    let doc = nasa();
    assert_eq!(encoding::decode(doc.raw_xml(), doc.encoding()), doc.xml());

    let latin = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><p>caf\xe9</p>".to_vec();
    let doc = Xml::new(latin);
    assert_eq!(doc.encoding(), "windows-1252");
    assert!(doc.xml().ends_with("<p>caf\u{e9}</p>"));
    assert_eq!(encoding::decode(doc.raw_xml(), doc.encoding()), doc.xml());
}

#[test]
fn transport_hint_decides_the_encoding() {
    let doc = Xml::with_hint(
        b"<p>caf\xe9</p>".to_vec(),
        Some("application/xml; charset=ISO-8859-1"),
        "utf-8",
    );
    assert_eq!(doc.encoding(), "windows-1252");
    assert_eq!(doc.text().unwrap(), "caf\u{e9}");
}

#[test]
fn byte_order_mark_beats_a_mislabeled_hint() {
    let doc = Xml::with_hint(
        b"\xEF\xBB\xBF<a>caf\xC3\xA9</a>".to_vec(),
        Some("text/xml; charset=ISO-8859-2"),
        "utf-8",
    );
    assert_eq!(doc.encoding(), "UTF-8");
    assert_eq!(doc.xml(), "<a>caf\u{e9}</a>");
    assert_eq!(doc.text().unwrap(), "caf\u{e9}");
}

#[test]
fn doctype_without_entities_is_skipped() {
    let doc = Xml::from(
        "<?xml version=\"1.0\"?>\n\
         <!DOCTYPE rss PUBLIC \"-//Netscape Communications//DTD RSS 0.91//EN\" \
         \"http://my.netscape.com/publish/formats/rss-0.91.dtd\">\n\
         <rss version=\"0.91\"><channel><link>http://a</link></channel></rss>",
    );
    let expected: BTreeSet<String> = ["http://a".to_string()].into();
    assert_eq!(doc.links().unwrap(), expected);
    assert_eq!(doc.root_tag().unwrap(), "rss");
    assert!(doc.xml().contains("<!DOCTYPE rss"));
}

// ============== Malformed input ==============

#[test]
fn malformed_input_fails_only_tree_queries() {
    let doc = Xml::from("<rss><channel><title>NASA Image of the Day</title></rss>");
    assert!(matches!(doc.tree(), Err(Error::ParseError(_))));
    assert!(matches!(doc.xpath("//item"), Err(Error::ParseError(_))));
    assert!(matches!(doc.find("item"), Err(Error::ParseError(_))));
    assert!(matches!(doc.links(), Err(Error::ParseError(_))));
    assert!(matches!(doc.json(), Err(Error::ParseError(_))));

    assert!(doc.xml().starts_with("<rss>"));
    assert!(!doc.raw_xml().is_empty());
    let found = doc.search_first("NASA {} of").unwrap().unwrap();
    assert_eq!(&found[0], "Image");
}

#[test]
fn doctype_declaring_entities_is_a_parse_error() {
    let doc = Xml::from("<!DOCTYPE r [<!ENTITY who \"world\">]><r>hello &who;</r>");
    assert!(matches!(doc.tree(), Err(Error::ParseError(_))));
}

// ============== JSON ==============

#[test]
fn json_conventions() {
    let doc = nasa();

    let badgerfish: Value = serde_json::from_str(&doc.json().unwrap()).unwrap();
    assert_eq!(badgerfish["rss"]["@version"], Value::from(2.0));
    assert_eq!(badgerfish["rss"]["channel"]["item"].as_array().unwrap().len(), 60);
    assert_eq!(
        badgerfish["rss"]["channel"]["title"]["$"],
        Value::from("NASA Image of the Day")
    );

    let parker: Value = serde_json::from_str(&doc.json_named("Parker").unwrap()).unwrap();
    assert_eq!(parker["channel"]["ttl"], Value::from(60));
    assert_eq!(
        parker["channel"]["item"][0]["guid"],
        Value::from("iotd-01")
    );
    assert_eq!(doc.json_cache().cached(), Some(JsonConvention::Parker));

    let item = doc.find_first("item").unwrap().unwrap();
    let yahoo: Value = serde_json::from_str(&item.json_named("yahoo").unwrap()).unwrap();
    assert_eq!(yahoo["item"]["guid"]["isPermaLink"], Value::from(false));
    assert_eq!(yahoo["item"]["guid"]["content"], Value::from("iotd-01"));
    assert_eq!(yahoo["item"]["enclosure"]["length"], Value::from(100731));
}

#[test]
fn unknown_json_convention_is_a_configuration_error() {
    assert!(matches!(
        nasa().json_named("jsonml"),
        Err(Error::ConfigurationError(_))
    ));
}

#[test]
fn every_convention_produces_json() {
    let doc = Xml::from(r#"<a x="1">text<b>2</b> tail</a>"#);
    for convention in JsonConvention::ALL {
        let json = doc.json_as(convention).unwrap();
        assert!(serde_json::from_str::<Value>(&json).is_ok(), "{convention}: {json}");
    }
}
