//! XLSX shared strings table (`xl/sharedStrings.xml`).
//!
//! Like the style table, the string table only grows during a session: untouched worksheets
//! reference items by index, so existing items keep their position.

use crate::container::decode_xml_bytes;
use crate::error::{Error, Result};
use crate::xml;
use quick_xml::events::Event;
use std::collections::HashMap;

const SST_TEMPLATE: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"></sst>"#
);

/// One `<si>` item.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StringItem {
    /// Concatenated text of the item's runs
    text: String,
    /// The item element as written
    xml: String,
}

/// Shared strings table.
#[derive(Debug, Clone, Default)]
pub struct SharedStrings {
    /// All items in order
    items: Vec<StringItem>,
    /// Plain text -> index, for items without formatting runs
    plain: HashMap<String, u32>,
    source: Option<String>,
    /// Part bytes before decoding, when read from a package
    original: Option<Vec<u8>>,
    /// Namespace prefix of `<sst>`, colon included
    prefix: String,
    loaded_len: usize,
}

impl SharedStrings {
    /// An empty table for a package without a shared strings part.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a shared strings part, keeping its bytes for an unmodified save.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut table = Self::parse(&decode_xml_bytes(bytes)?)?;
        table.original = Some(bytes.to_vec());
        Ok(table)
    }

    /// Parse shared strings from XML content.
    pub fn parse(content: &str) -> Result<Self> {
        let mut table = Self {
            source: Some(content.to_string()),
            ..Self::default()
        };
        let Some(section) = xml::find_section(content, "sst")? else {
            return Err(Error::XmlParse("shared strings part has no <sst>".to_string()));
        };
        table.prefix = xml::prefix_of(&section.element.name).to_string();

        for child in section.children.iter().filter(|c| c.local_name() == "si") {
            let item_xml = child.text(content);
            let (text, rich) = item_text(&content[child.inner.clone()])?;
            let index = table.items.len() as u32;
            if !rich {
                table.plain.entry(text.clone()).or_insert(index);
            }
            table.items.push(StringItem {
                text,
                xml: item_xml.to_string(),
            });
        }

        table.loaded_len = table.items.len();
        Ok(table)
    }

    /// Get a string by index.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.items.get(index).map(|item| item.text.as_str())
    }

    /// Index of a plain item with this text, appending one if none exists.
    pub fn intern(&mut self, text: &str) -> u32 {
        if let Some(&index) = self.plain.get(text) {
            return index;
        }
        let index = self.items.len() as u32;
        let p = &self.prefix;
        let mut item = format!("<{p}si><{p}t");
        if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
            item.push_str(" xml:space=\"preserve\"");
        }
        item.push('>');
        item.push_str(&xml::escape(text));
        item.push_str(&format!("</{p}t></{p}si>"));
        self.items.push(StringItem {
            text: text.to_string(),
            xml: item,
        });
        self.plain.insert(text.to_string(), index);
        index
    }

    /// Get the count of shared strings.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether items were appended since the table was read.
    pub fn is_modified(&self) -> bool {
        self.items.len() != self.loaded_len
    }

    /// Bytes of the shared strings part; the original bytes when nothing was appended.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        if let (false, Some(source)) = (self.is_modified(), &self.source) {
            return Ok(self
                .original
                .clone()
                .unwrap_or_else(|| source.as_bytes().to_vec()));
        }

        let base = self.source.as_deref().unwrap_or(SST_TEMPLATE);
        let section = xml::find_section(base, "sst")?
            .ok_or_else(|| Error::XmlParse("shared strings part has no <sst>".to_string()))?;

        let mut out = format!("<{}", section.element.name);
        let attrs: Vec<(String, String)> = section
            .element
            .attrs
            .iter()
            .filter(|(key, _)| key != "count" && key != "uniqueCount")
            .cloned()
            .collect();
        xml::push_attrs(&mut out, &attrs);
        out.push_str(&format!(" uniqueCount=\"{}\">", self.items.len()));
        for item in &self.items {
            out.push_str(&item.xml);
        }
        out.push_str(&format!("</{}>", section.element.name));

        Ok(xml::splice(base, vec![(section.element.range.clone(), out)]).into_bytes())
    }
}

/// Text of an item's content and whether it has formatting runs.
///
/// Phonetic runs (`rPh`) are reading aids and are not part of the value.
fn item_text(inner: &str) -> Result<(String, bool)> {
    let mut reader = quick_xml::Reader::from_str(inner);
    let mut text = String::new();
    let mut rich = false;
    let mut in_t = false;
    let mut phonetic_depth = 0usize;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"t" if phonetic_depth == 0 => in_t = true,
                b"r" => rich = true,
                b"rPh" => {
                    rich = true;
                    phonetic_depth += 1;
                }
                _ => {}
            },
            Event::Empty(e) => {
                if matches!(e.local_name().as_ref(), b"r" | b"rPh") {
                    rich = true;
                }
            }
            Event::Text(e) if in_t => {
                text.push_str(&e.unescape()?);
            }
            Event::CData(e) if in_t => {
                text.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok((text, rich))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shared_strings() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="5" uniqueCount="3">
    <si><t>Hello</t></si>
    <si><t>World</t></si>
    <si><t>Test</t></si>
</sst>"#;

        let ss = SharedStrings::parse(xml).unwrap();
        assert_eq!(ss.len(), 3);
        assert_eq!(ss.get(0), Some("Hello"));
        assert_eq!(ss.get(1), Some("World"));
        assert_eq!(ss.get(2), Some("Test"));
        assert_eq!(ss.get(3), None);
    }

    #[test]
    fn test_rich_text() {
        // Rich text with runs - note: t element must include any trailing spaces
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
    <si>
        <r><t>Hello</t></r>
        <r><t xml:space="preserve"> World</t></r>
    </si>
    <si><t>漢字</t><rPh sb="0" eb="2"><t>カンジ</t></rPh></si>
</sst>"#;

        let mut ss = SharedStrings::parse(xml).unwrap();
        assert_eq!(ss.len(), 2);
        // Rich text runs are concatenated as-is
        assert_eq!(ss.get(0), Some("Hello World"));
        assert_eq!(ss.get(1), Some("漢字"));

        // Formatted items are never reused for plain text.
        assert_eq!(ss.intern("Hello World"), 2);
    }

    #[test]
    fn test_intern_appends_and_dedups() {
        let xml = r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="2" uniqueCount="2"><si><t>Apple</t></si><si><t>Banana</t></si></sst>"#;
        let mut ss = SharedStrings::parse(xml).unwrap();
        assert_eq!(ss.intern("Banana"), 1);
        assert!(!ss.is_modified());
        assert_eq!(ss.serialize().unwrap(), xml.as_bytes());

        assert_eq!(ss.intern(" Cherry & co "), 2);
        assert_eq!(ss.intern(" Cherry & co "), 2);
        assert!(ss.is_modified());

        let out = String::from_utf8(ss.serialize().unwrap()).unwrap();
        assert!(out.starts_with(r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" uniqueCount="3"><si><t>Apple</t></si>"#));
        assert!(out.contains(r#"<si><t xml:space="preserve"> Cherry &amp; co </t></si>"#));

        let reparsed = SharedStrings::parse(&out).unwrap();
        assert_eq!(reparsed.get(0), Some("Apple"));
        assert_eq!(reparsed.get(2), Some(" Cherry & co "));
    }

    #[test]
    fn test_prefixed_table_keeps_prefix() {
        let xml = r#"<x:sst xmlns:x="http://schemas.openxmlformats.org/spreadsheetml/2006/main" uniqueCount="1"><x:si><x:t>Apple</x:t></x:si></x:sst>"#;
        let mut ss = SharedStrings::parse(xml).unwrap();
        assert_eq!(ss.intern("Pear"), 1);

        let out = String::from_utf8(ss.serialize().unwrap()).unwrap();
        assert!(out.ends_with(r#"<x:si><x:t>Apple</x:t></x:si><x:si><x:t>Pear</x:t></x:si></x:sst>"#));
        assert_eq!(SharedStrings::parse(&out).unwrap().get(1), Some("Pear"));
    }

    #[test]
    fn test_unmodified_keeps_original_bytes() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(br#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><si><t>Apple</t></si></sst>"#);
        let mut ss = SharedStrings::from_bytes(&bytes).unwrap();
        assert_eq!(ss.get(0), Some("Apple"));
        assert_eq!(ss.serialize().unwrap(), bytes);

        ss.intern("Pear");
        assert!(ss.serialize().unwrap().starts_with(b"<sst"));
    }

    #[test]
    fn test_new_table_serializes() {
        let mut ss = SharedStrings::new();
        assert_eq!(ss.intern("x"), 0);
        let out = String::from_utf8(ss.serialize().unwrap()).unwrap();
        assert!(out.ends_with(r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" uniqueCount="1"><si><t>x</t></si></sst>"#));
    }
}
