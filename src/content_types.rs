//! `[Content_Types].xml` handling.

use crate::error::Result;
use crate::xml;

/// Content type of a worksheet part.
pub const CT_WORKSHEET: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";
/// Content type of the styles part.
pub const CT_STYLES: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml";
/// Content type of the shared strings part.
pub const CT_SHARED_STRINGS: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml";
/// Content type of a standard workbook part.
pub const CT_WORKBOOK: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml";

const CONTENT_TYPES_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

/// Parsed `[Content_Types].xml`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentTypes {
    /// Extension -> content type
    defaults: Vec<(String, String)>,
    /// Part name (with leading `/`) -> content type
    overrides: Vec<(String, String)>,
}

impl ContentTypes {
    /// Content types of a freshly created workbook package.
    pub fn new_workbook() -> Self {
        Self {
            defaults: vec![
                (
                    "rels".to_string(),
                    "application/vnd.openxmlformats-package.relationships+xml".to_string(),
                ),
                ("xml".to_string(), "application/xml".to_string()),
            ],
            overrides: vec![("/xl/workbook.xml".to_string(), CT_WORKBOOK.to_string())],
        }
    }

    /// Parse the content types part.
    pub fn parse(content: &str) -> Result<Self> {
        let mut types = Self::default();
        let Some(section) = xml::find_section(content, "Types")? else {
            return Ok(types);
        };
        for child in section.children {
            let content_type = child.attr("ContentType").unwrap_or_default().to_string();
            match child.local_name() {
                "Default" => {
                    if let Some(ext) = child.attr("Extension") {
                        types.defaults.push((ext.to_string(), content_type));
                    }
                }
                "Override" => {
                    if let Some(part) = child.attr("PartName") {
                        types.overrides.push((part.to_string(), content_type));
                    }
                }
                _ => {}
            }
        }
        Ok(types)
    }

    /// Content type override of a part, if any.
    pub fn override_for(&self, part: &str) -> Option<&str> {
        let key = part_key(part);
        self.overrides
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(&key))
            .map(|(_, ct)| ct.as_str())
    }

    /// Add or replace an override. Returns true when the set changed.
    pub fn set_override(&mut self, part: &str, content_type: &str) -> bool {
        let key = part_key(part);
        match self
            .overrides
            .iter_mut()
            .find(|(name, _)| name.eq_ignore_ascii_case(&key))
        {
            Some((_, ct)) if ct == content_type => false,
            Some((_, ct)) => {
                *ct = content_type.to_string();
                true
            }
            None => {
                self.overrides.push((key, content_type.to_string()));
                true
            }
        }
    }

    /// Drop the override of a part. Returns true when one was removed.
    pub fn remove_override(&mut self, part: &str) -> bool {
        let key = part_key(part);
        let before = self.overrides.len();
        self.overrides
            .retain(|(name, _)| !name.eq_ignore_ascii_case(&key));
        before != self.overrides.len()
    }

    /// Render the content types part.
    pub fn to_xml(&self) -> String {
        let mut out = String::from(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        out.push('\n');
        out.push_str(&format!(r#"<Types xmlns="{CONTENT_TYPES_NS}">"#));
        for (ext, ct) in &self.defaults {
            out.push_str("<Default");
            xml::push_attrs(
                &mut out,
                &[
                    ("Extension".to_string(), ext.clone()),
                    ("ContentType".to_string(), ct.clone()),
                ],
            );
            out.push_str("/>");
        }
        for (part, ct) in &self.overrides {
            out.push_str("<Override");
            xml::push_attrs(
                &mut out,
                &[
                    ("PartName".to_string(), part.clone()),
                    ("ContentType".to_string(), ct.clone()),
                ],
            );
            out.push_str("/>");
        }
        out.push_str("</Types>");
        out
    }
}

fn part_key(part: &str) -> String {
    if part.starts_with('/') {
        part.to_string()
    } else {
        format!("/{part}")
    }
}
