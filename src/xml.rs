//! A small owned XML tree for RSS feeds.
//!
//! Feeds are parsed once with `quick_xml::NsReader` into `XmlElement`s that
//! remember both the resolved namespace URI and the qualified name of every
//! element, so lookups can go by `(namespace, local name)` regardless of the
//! prefix a feed happens to bind.

use quick_xml::events::Event;
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;

use crate::error::{Result, ScraperError};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElement {
    /// Resolved namespace URI, if the element is bound to one
    pub namespace: Option<String>,
    /// Name as written, prefix included (e.g. `mec:startDate`)
    pub qualified_name: String,
    pub local_name: String,
    /// Concatenated text and CDATA directly inside this element
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// Depth-first iterator over this element and all of its descendants.
    pub fn descendants(&self) -> Box<dyn Iterator<Item = &XmlElement> + '_> {
        Box::new(
            std::iter::once(self).chain(self.children.iter().flat_map(|child| child.descendants())),
        )
    }
}

fn owned_namespace(resolved: ResolveResult) -> Option<String> {
    match resolved {
        ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
        _ => None,
    }
}

fn open_element(namespace: Option<String>, qualified: &[u8], local: &[u8]) -> XmlElement {
    XmlElement {
        namespace,
        qualified_name: String::from_utf8_lossy(qualified).into_owned(),
        local_name: String::from_utf8_lossy(local).into_owned(),
        ..Default::default()
    }
}

fn attach(stack: &mut Vec<XmlElement>, roots: &mut Vec<XmlElement>, element: XmlElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => roots.push(element),
    }
}

/// Parse a whole document into its single root element.
pub fn parse_document(xml: &str) -> Result<XmlElement> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut roots: Vec<XmlElement> = Vec::new();

    loop {
        let (resolved, event) = reader.read_resolved_event_into(&mut buf)?;
        let namespace = owned_namespace(resolved);

        match event {
            Event::Start(e) => {
                let element = open_element(namespace, e.name().as_ref(), e.local_name().as_ref());
                stack.push(element);
            }
            Event::Empty(e) => {
                let element = open_element(namespace, e.name().as_ref(), e.local_name().as_ref());
                attach(&mut stack, &mut roots, element);
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| ScraperError::Xml("unexpected closing tag".to_string()))?;
                attach(&mut stack, &mut roots, element);
            }
            Event::Text(e) => {
                if let Some(current) = stack.last_mut() {
                    let text = match e.unescape() {
                        Ok(text) => text.into_owned(),
                        Err(_) => String::from_utf8_lossy(&e).into_owned(),
                    };
                    current.text.push_str(&text);
                }
            }
            Event::CData(e) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(ScraperError::Xml(format!(
            "unclosed element <{}> at end of document",
            open.qualified_name
        )));
    }

    match roots.len() {
        0 => Err(ScraperError::Xml("document has no root element".to_string())),
        1 => Ok(roots.remove(0)),
        n => Err(ScraperError::Xml(format!("document has {} root elements", n))),
    }
}

/// Text of the first descendant matching `name`.
///
/// With a namespace, `name` is a local name and must be bound to that
/// namespace URI; without one, `name` is compared to the qualified name as
/// written (so `"title"` never matches `dc:title`).
pub fn lookup(tree: &XmlElement, namespace: Option<&str>, name: &str) -> Option<String> {
    tree.descendants()
        .find(|element| match namespace {
            Some(ns) => element.namespace.as_deref() == Some(ns) && element.local_name == name,
            None => element.qualified_name == name,
        })
        .map(|element| element.text.trim().to_string())
}

/// The `<item>` elements of an RSS document, in document order.
pub fn items(document: &XmlElement) -> Vec<&XmlElement> {
    document
        .descendants()
        .filter(|element| element.qualified_name == "item")
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{CONTENT_NAMESPACE, MEC_NAMESPACE};

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/"
     xmlns:mec="http://webnus.net/rss/mec/" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <title>Feed</title>
    <item>
      <title>Jazz &amp; Blues</title>
      <mec:startDate>2025-09-19</mec:startDate>
      <content:encoded><![CDATA[<p>Hello <img src="a.jpg"/></p>]]></content:encoded>
      <dc:creator>Admin</dc:creator>
      <enclosure url="x.mp3"/>
    </item>
    <item><title>Second</title></item>
  </channel>
</rss>"#;

    #[test]
    fn test_items_and_namespaced_lookup() {
        let doc = parse_document(FEED).unwrap();
        let items = items(&doc);
        assert_eq!(items.len(), 2);

        let first = items[0];
        assert_eq!(lookup(first, None, "title").as_deref(), Some("Jazz & Blues"));
        assert_eq!(lookup(first, Some(MEC_NAMESPACE), "startDate").as_deref(), Some("2025-09-19"));
        assert_eq!(
            lookup(first, Some(CONTENT_NAMESPACE), "encoded").as_deref(),
            Some(r#"<p>Hello <img src="a.jpg"/></p>"#)
        );
        assert_eq!(lookup(first, Some(MEC_NAMESPACE), "endDate"), None);
        assert_eq!(lookup(items[1], None, "creator"), None);
    }

    #[test]
    fn test_namespace_found_under_any_prefix() {
        let xml = r#"<rss xmlns:events="http://webnus.net/rss/mec/"><item><events:location>Hall</events:location></item></rss>"#;
        let doc = parse_document(xml).unwrap();
        assert_eq!(lookup(&doc, Some(MEC_NAMESPACE), "location").as_deref(), Some("Hall"));
        assert_eq!(lookup(&doc, None, "mec:location"), None);
    }

    #[test]
    fn test_malformed_documents_are_errors() {
        assert!(parse_document("<rss><channel><item></channel></rss>").is_err());
        assert!(parse_document("<rss><channel>").is_err());
        assert!(parse_document("").is_err());
    }
}
