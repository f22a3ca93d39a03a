//! ZIP container layer for OOXML packages.
//!
//! Reads every entry of the archive into a [`PartStore`] at open time and writes a store back
//! to ZIP bytes at save time. Relationship parts (`.rels`) are parsed and regenerated here.

use crate::error::{Error, Result};
use crate::options::{OpenOptions, SaveOptions};
use crate::parts::PartStore;
use crate::xml;
use std::io::{Cursor, Read, Write};
use std::path::Path;

/// Relationship type of the main workbook part.
pub const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
/// Relationship type of a worksheet part.
pub const REL_WORKSHEET: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
/// Relationship type of the shared styles part.
pub const REL_STYLES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
/// Relationship type of the shared strings part.
pub const REL_SHARED_STRINGS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings";

const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// A relationship entry from a .rels file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// Relationship ID (e.g., "rId1")
    pub id: String,
    /// Relationship type URI
    pub rel_type: String,
    /// Target path (relative or absolute)
    pub target: String,
    /// Whether the target is external
    pub external: bool,
}

/// Ordered collection of relationships parsed from a .rels file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relationships {
    items: Vec<Relationship>,
}

impl Relationships {
    /// Create a new empty relationships collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a relationships part.
    pub fn parse(content: &str) -> Result<Self> {
        let mut rels = Relationships::new();
        if content.trim().is_empty() {
            return Ok(rels);
        }

        let Some(section) = xml::find_section(content, "Relationships")? else {
            return Ok(rels);
        };

        for child in section.children {
            if child.local_name() != "Relationship" {
                continue;
            }
            let id = child.attr("Id").unwrap_or_default().to_string();
            if id.is_empty() {
                continue;
            }
            let target = child.attr("Target").unwrap_or_default().to_string();
            if target.is_empty() {
                log::warn!("relationship {id} has no target");
            }
            rels.add(Relationship {
                id,
                rel_type: child.attr("Type").unwrap_or_default().to_string(),
                target,
                external: child
                    .attr("TargetMode")
                    .is_some_and(|mode| mode.eq_ignore_ascii_case("external")),
            });
        }

        Ok(rels)
    }

    /// Get a relationship by ID.
    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.items.iter().find(|rel| rel.id == id)
    }

    /// Get relationships by type, in document order.
    pub fn get_by_type(&self, rel_type: &str) -> Vec<&Relationship> {
        self.items
            .iter()
            .filter(|rel| rel.rel_type == rel_type)
            .collect()
    }

    /// First relationship of a type.
    pub fn first_of_type(&self, rel_type: &str) -> Option<&Relationship> {
        self.items.iter().find(|rel| rel.rel_type == rel_type)
    }

    /// Add a relationship.
    pub fn add(&mut self, rel: Relationship) {
        self.items.push(rel);
    }

    /// Remove a relationship by ID.
    pub fn remove(&mut self, id: &str) -> Option<Relationship> {
        let pos = self.items.iter().position(|rel| rel.id == id)?;
        Some(self.items.remove(pos))
    }

    /// All relationships in document order.
    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.items.iter()
    }

    /// A relationship ID not yet used (`rIdN`).
    pub fn next_id(&self) -> String {
        let max = self
            .items
            .iter()
            .filter_map(|rel| rel.id.strip_prefix("rId"))
            .filter_map(|n| n.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        format!("rId{}", max + 1)
    }

    /// Render the relationships part.
    pub fn to_xml(&self) -> String {
        let mut out = String::from(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        out.push('\n');
        out.push_str(&format!(r#"<Relationships xmlns="{RELATIONSHIPS_NS}">"#));
        for rel in &self.items {
            out.push_str("<Relationship");
            let mut attrs = vec![
                ("Id".to_string(), rel.id.clone()),
                ("Type".to_string(), rel.rel_type.clone()),
                ("Target".to_string(), rel.target.clone()),
            ];
            if rel.external {
                attrs.push(("TargetMode".to_string(), "External".to_string()));
            }
            xml::push_attrs(&mut out, &attrs);
            out.push_str("/>");
        }
        out.push_str("</Relationships>");
        out
    }
}

/// Fix XML encoding declaration from UTF-16 to UTF-8.
///
/// When we decode UTF-16 XML to a Rust String (UTF-8), the XML declaration
/// still says encoding="UTF-16". This causes quick-xml to fail when it tries
/// to re-interpret the already-decoded UTF-8 string as UTF-16.
fn fix_xml_encoding_declaration(content: &str) -> String {
    if content.starts_with("<?xml") {
        if let Some(end_decl) = content.find("?>") {
            let decl = &content[..end_decl + 2];
            let rest = &content[end_decl + 2..];

            let fixed_decl = decl
                .replace("encoding=\"UTF-16\"", "encoding=\"UTF-8\"")
                .replace("encoding='UTF-16'", "encoding='UTF-8'")
                .replace("encoding=\"utf-16\"", "encoding=\"UTF-8\"")
                .replace("encoding='utf-16'", "encoding='UTF-8'");

            return format!("{}{}", fixed_decl, rest);
        }
    }
    content.to_string()
}

/// Decode XML bytes handling different encodings (UTF-8, UTF-16 LE/BE).
///
/// Parts are typically UTF-8, but some producers write UTF-16 with a BOM.
pub fn decode_xml_bytes(bytes: &[u8]) -> Result<String> {
    if bytes.len() >= 3 && bytes[0] == 0xEF && bytes[1] == 0xBB && bytes[2] == 0xBF {
        return String::from_utf8(bytes[3..].to_vec())
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)));
    }

    if bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] == 0xFE {
        let content = decode_utf16(&bytes[2..], u16::from_le_bytes)?;
        return Ok(fix_xml_encoding_declaration(&content));
    }

    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let content = decode_utf16(&bytes[2..], u16::from_be_bytes)?;
        return Ok(fix_xml_encoding_declaration(&content));
    }

    String::from_utf8(bytes.to_vec())
        .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> Result<String> {
    let len = bytes.len() & !1;

    let u16_iter = (0..len)
        .step_by(2)
        .map(|i| unit([bytes[i], bytes[i + 1]]));

    char::decode_utf16(u16_iter)
        .collect::<std::result::Result<String, _>>()
        .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

/// Inflate every file entry of a ZIP archive into a part store.
pub fn read_package(data: &[u8], options: &OpenOptions) -> Result<PartStore> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))?;
    let mut parts = PartStore::new();
    let mut total: u64 = 0;

    for i in 0..archive.len() {
        let file = archive.by_index(i)?;
        if !file.is_file() {
            continue;
        }
        let name = file.name().to_string();
        if file.size() > options.max_part_bytes {
            return Err(Error::PartTooLarge {
                part: name,
                limit: options.max_part_bytes,
            });
        }

        // Declared sizes can lie; cap the actual read as well.
        let mut bytes = Vec::with_capacity(file.size() as usize);
        file.take(options.max_part_bytes + 1)
            .read_to_end(&mut bytes)?;
        if bytes.len() as u64 > options.max_part_bytes {
            return Err(Error::PartTooLarge {
                part: name,
                limit: options.max_part_bytes,
            });
        }

        total += bytes.len() as u64;
        if total > options.max_total_bytes {
            return Err(Error::PartTooLarge {
                part: name,
                limit: options.max_total_bytes,
            });
        }
        parts.put(name, bytes);
    }

    Ok(parts)
}

/// Write a part store as ZIP bytes.
///
/// Entries are written in store order with a fixed timestamp, so the same store always
/// produces the same bytes.
pub fn write_package(parts: &PartStore, options: &SaveOptions) -> Result<Vec<u8>> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let file_options = zip::write::SimpleFileOptions::default()
        .compression_method(options.compression.method())
        .compression_level(options.compression_level)
        .last_modified_time(zip::DateTime::default());

    for (name, bytes) in parts.iter() {
        zip.start_file(name, file_options)?;
        zip.write_all(bytes)?;
    }

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

/// Path of the relationships part for a source part.
pub fn rels_path_for(part_path: &str) -> String {
    if part_path.is_empty() || part_path == "/" {
        return "_rels/.rels".to_string();
    }
    match part_path.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part_path}.rels"),
    }
}

/// Read and parse the relationships of a part; a missing .rels is an empty collection.
pub fn read_relationships(parts: &PartStore, part_path: &str) -> Result<Relationships> {
    match parts.get(&rels_path_for(part_path)) {
        Some(bytes) => Relationships::parse(&decode_xml_bytes(bytes)?),
        None => Ok(Relationships::new()),
    }
}

/// Resolve a relative path from a base path.
pub fn resolve_path(base: &str, relative: &str) -> String {
    if let Some(stripped) = relative.strip_prefix('/') {
        return stripped.to_string();
    }

    let base_path = Path::new(base);
    let base_dir = base_path.parent().unwrap_or(Path::new(""));

    let mut result = base_dir.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            std::path::Component::ParentDir => {
                result.pop();
            }
            std::path::Component::Normal(c) => {
                result.push(c);
            }
            _ => {}
        }
    }

    result.to_string_lossy().replace('\\', "/")
}

/// Express `target` relative to the directory of `base`, for writing relationship targets.
pub fn relative_target(base: &str, target: &str) -> String {
    let base_dir = base.rsplit_once('/').map_or("", |(dir, _)| dir);
    if base_dir.is_empty() {
        return target.to_string();
    }
    match target.strip_prefix(base_dir).and_then(|rest| rest.strip_prefix('/')) {
        Some(rest) => rest.to_string(),
        None => format!("/{target}"),
    }
}
