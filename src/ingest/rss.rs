//! Turns an RSS/Atom document into loosely-typed feed items.
//!
//! Each `<item>` (or `<entry>`) becomes a JSON object keyed by qualified
//! element name (`gdacs:alertlevel`, `georss:point`, ...). Leaf elements map to
//! their trimmed text; elements with attributes or children map to objects
//! where attributes are `@name` and text is `#text`. Repeated elements turn
//! into arrays.

use anyhow::Context;
use quick_xml::{
    events::{BytesStart, Event},
    Reader,
};
use serde_json::{Map, Value};

pub const TEXT_KEY: &str = "#text";

struct Node {
    name: String,
    attrs: Map<String, Value>,
    children: Map<String, Value>,
    text: String,
}

impl Node {
    fn open(start: &BytesStart<'_>) -> anyhow::Result<Self> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attrs = Map::new();
        for attr in start.attributes() {
            let attr = attr.with_context(|| format!("bad attribute on <{name}>"))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .with_context(|| format!("bad attribute value on <{name}>"))?;
            attrs.insert(format!("@{key}"), Value::String(value.into_owned()));
        }
        Ok(Self {
            name,
            attrs,
            children: Map::new(),
            text: String::new(),
        })
    }

    fn into_value(self) -> (String, Value) {
        let text = self.text.trim().to_string();
        if self.attrs.is_empty() && self.children.is_empty() {
            return (self.name, Value::String(text));
        }
        let mut obj = self.attrs;
        obj.extend(self.children);
        if !text.is_empty() {
            obj.insert(TEXT_KEY.into(), Value::String(text));
        }
        (self.name, Value::Object(obj))
    }
}

fn insert_repeated(map: &mut Map<String, Value>, key: String, value: Value) {
    match map.get_mut(&key) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            map.insert(key, value);
        }
    }
}

fn is_item(name: &str) -> bool {
    name == "item" || name == "entry"
}

/// Parses every item of the feed. Fails only when the document itself is not
/// well-formed XML.
pub fn parse_items(xml: &str) -> anyhow::Result<Vec<Value>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    // Open elements inside the current item; index 0 is the item itself.
    let mut stack: Vec<Node> = Vec::new();

    loop {
        let event = reader
            .read_event()
            .with_context(|| format!("malformed feed at byte {}", reader.buffer_position()))?;
        match event {
            Event::Start(start) => {
                let node = Node::open(&start)?;
                if !stack.is_empty() || is_item(&node.name) {
                    stack.push(node);
                }
            }
            Event::Empty(start) => {
                let node = Node::open(&start)?;
                if let Some(parent) = stack.last_mut() {
                    let (key, value) = node.into_value();
                    insert_repeated(&mut parent.children, key, value);
                }
            }
            Event::Text(text) => {
                if let Some(node) = stack.last_mut() {
                    let raw = text.unescape().context("bad text entity")?;
                    node.text.push_str(&raw);
                }
            }
            Event::CData(data) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::End(_) => {
                if let Some(node) = stack.pop() {
                    match stack.last_mut() {
                        Some(parent) => {
                            let (key, value) = node.into_value();
                            insert_repeated(&mut parent.children, key, value);
                        }
                        None => items.push(Value::Object(node.children)),
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    anyhow::ensure!(stack.is_empty(), "feed ended inside an unclosed item");
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:gdacs="http://www.gdacs.org" xmlns:geo="http://www.w3.org/2003/01/geo/wgs84_pos#" xmlns:georss="http://www.georss.org/georss">
  <channel>
    <title>GDACS RSS information</title>
    <item>
      <title>Green earthquake alert (Magnitude 5.1M, Depth:10km) in Japan</title>
      <description><![CDATA[On 6/1/2024, an earthquake of magnitude 5.1 occurred.]]></description>
      <pubDate>Sat, 01 Jun 2024 10:15:00 GMT</pubDate>
      <gdacs:alertlevel>Green</gdacs:alertlevel>
      <gdacs:eventtype>EQ</gdacs:eventtype>
      <gdacs:severity unit="M" value="5.1">Magnitude 5.1M, Depth:10km</gdacs:severity>
      <gdacs:population unit="Pop" value="0"/>
      <geo:Point><geo:lat>35.682</geo:lat><geo:long>139.767</geo:long></geo:Point>
      <georss:point>35.682 139.767</georss:point>
      <category>a</category>
      <category>b</category>
    </item>
    <item>
      <title>Flood &amp; landslides</title>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_items_with_namespaced_fields() {
        let items = parse_items(SAMPLE).unwrap();
        assert_eq!(items.len(), 2);
        let first = &items[0];
        assert_eq!(first["gdacs:alertlevel"], "Green");
        assert_eq!(first["gdacs:eventtype"], "EQ");
        assert_eq!(first["georss:point"], "35.682 139.767");
        assert_eq!(first["geo:Point"]["geo:lat"], "35.682");
        assert_eq!(first["gdacs:severity"]["@value"], "5.1");
        assert_eq!(first["gdacs:severity"][TEXT_KEY], "Magnitude 5.1M, Depth:10km");
        assert_eq!(first["gdacs:population"]["@value"], "0");
        assert_eq!(
            first["description"],
            "On 6/1/2024, an earthquake of magnitude 5.1 occurred."
        );
    }

    #[test]
    fn repeated_elements_become_arrays() {
        let items = parse_items(SAMPLE).unwrap();
        assert_eq!(items[0]["category"], serde_json::json!(["a", "b"]));
    }

    #[test]
    fn entities_are_unescaped() {
        let items = parse_items(SAMPLE).unwrap();
        assert_eq!(items[1]["title"], "Flood & landslides");
    }

    #[test]
    fn channel_without_items_is_empty() {
        let items = parse_items("<rss><channel><title>x</title></channel></rss>").unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn malformed_document_is_an_error() {
        assert!(parse_items("<rss><channel><item><title>x</channel></rss>").is_err());
    }
}
