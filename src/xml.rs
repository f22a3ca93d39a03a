//! Small XML helpers shared by the part parsers.
//!
//! Parts are never round-tripped through an object model. Instead the parsers locate the
//! sections they understand by byte range, and writers splice regenerated sections back into
//! the original text, so everything else in the part survives untouched.

use crate::error::Result;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::borrow::Cow;
use std::ops::Range;

/// An element located in a source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Fragment {
    /// Qualified element name as written
    pub name: String,
    /// Attributes in document order, values unescaped
    pub attrs: Vec<(String, String)>,
    /// Byte range of the whole element, tags included
    pub range: Range<usize>,
    /// Byte range between the start and end tags (empty for `<a/>`)
    pub inner: Range<usize>,
}

impl Fragment {
    /// Look up an attribute value.
    pub fn attr(&self, key: &str) -> Option<&str> {
        attr(&self.attrs, key)
    }

    /// Name without namespace prefix.
    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    /// The verbatim element text.
    pub fn text<'a>(&self, xml: &'a str) -> &'a str {
        &xml[self.range.clone()]
    }
}

/// A located container element and its direct children.
#[derive(Debug, Clone)]
pub(crate) struct Section {
    pub element: Fragment,
    pub children: Vec<Fragment>,
}

/// Find the first element named `name` (local name) and collect its direct children.
pub(crate) fn find_section(xml: &str, name: &str) -> Result<Option<Section>> {
    struct Open {
        name: String,
        attrs: Vec<(String, String)>,
        start: usize,
        inner_start: usize,
    }

    let mut reader = Reader::from_str(xml);
    let mut depth = 0usize;
    let mut section: Option<(usize, Open)> = None;
    let mut child: Option<Open> = None;
    let mut children = Vec::new();

    loop {
        let before = reader.buffer_position() as usize;
        let event = reader.read_event()?;
        let after = reader.buffer_position() as usize;

        let section_depth = section.as_ref().map(|(d, _)| *d);

        match event {
            Event::Start(e) => {
                depth += 1;
                match section_depth {
                    None if e.local_name().as_ref() == name.as_bytes() => {
                        let open = Open {
                            name: qualified_name(&e),
                            attrs: attributes(&e)?,
                            start: before,
                            inner_start: after,
                        };
                        section = Some((depth, open));
                    }
                    Some(d) if depth == d + 1 => {
                        child = Some(Open {
                            name: qualified_name(&e),
                            attrs: attributes(&e)?,
                            start: before,
                            inner_start: after,
                        });
                    }
                    _ => {}
                }
            }
            Event::Empty(e) => match section_depth {
                None if e.local_name().as_ref() == name.as_bytes() => {
                    return Ok(Some(Section {
                        element: Fragment {
                            name: qualified_name(&e),
                            attrs: attributes(&e)?,
                            range: before..after,
                            inner: after..after,
                        },
                        children,
                    }));
                }
                Some(d) if depth == d => {
                    children.push(Fragment {
                        name: qualified_name(&e),
                        attrs: attributes(&e)?,
                        range: before..after,
                        inner: after..after,
                    });
                }
                _ => {}
            },
            Event::End(_) => {
                if let Some((d, open)) = &section {
                    if depth == d + 1 {
                        if let Some(open_child) = child.take() {
                            children.push(Fragment {
                                name: open_child.name,
                                attrs: open_child.attrs,
                                range: open_child.start..after,
                                inner: open_child.inner_start..before,
                            });
                        }
                    } else if depth == *d {
                        return Ok(Some(Section {
                            element: Fragment {
                                name: open.name.clone(),
                                attrs: open.attrs.clone(),
                                range: open.start..after,
                                inner: open.inner_start..before,
                            },
                            children,
                        }));
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(None)
}

/// Collect the attributes of a start tag, unescaping values.
pub(crate) fn attributes(e: &BytesStart<'_>) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        out.push((key, value));
    }
    Ok(out)
}

/// Look up an attribute value by qualified name.
pub(crate) fn attr<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Strip a namespace prefix from a qualified name.
pub(crate) fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

/// Namespace prefix of a qualified name, colon included; empty for unprefixed names.
pub(crate) fn prefix_of(name: &str) -> &str {
    name.rfind(':').map_or("", |at| &name[..=at])
}

/// Put `prefix` on every unprefixed element tag of a fragment.
///
/// Meant for fragments this crate generates, whose text and attribute values are escaped.
pub(crate) fn qualify<'a>(fragment: &'a str, prefix: &str) -> Cow<'a, str> {
    if prefix.is_empty() {
        return Cow::Borrowed(fragment);
    }
    let mut out = String::with_capacity(fragment.len() + 8 * prefix.len());
    let mut rest = fragment;
    while let Some(at) = rest.find('<') {
        out.push_str(&rest[..=at]);
        rest = &rest[at + 1..];
        if let Some(tail) = rest.strip_prefix('/') {
            out.push('/');
            rest = tail;
        }
        let end = rest
            .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
            .unwrap_or(rest.len());
        let name = &rest[..end];
        if name.starts_with(|c: char| c.is_alphabetic() || c == '_') && !name.contains(':') {
            out.push_str(prefix);
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn qualified_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

/// Escape text for element content or attribute values.
pub(crate) fn escape(text: &str) -> Cow<'_, str> {
    quick_xml::escape::escape(text)
}

/// Render ` key="value"` pairs.
pub(crate) fn push_attrs(out: &mut String, attrs: &[(String, String)]) {
    for (key, value) in attrs {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape(value));
        out.push('"');
    }
}

/// Replace byte ranges of `xml`. Ranges must not overlap; empty ranges insert.
pub(crate) fn splice(xml: &str, mut edits: Vec<(Range<usize>, String)>) -> String {
    edits.sort_by_key(|(range, _)| (range.start, range.end));
    let mut out = String::with_capacity(xml.len() + edits.iter().map(|(_, s)| s.len()).sum::<usize>());
    let mut cursor = 0;
    for (range, replacement) in edits {
        out.push_str(&xml[cursor..range.start]);
        out.push_str(&replacement);
        cursor = range.end;
    }
    out.push_str(&xml[cursor..]);
    out
}
