//! The workbook part (`xl/workbook.xml`): sheet directory and date system.

use crate::error::{Error, Result};
use crate::model::DateSystem;
use crate::xml;

/// One `<sheet>` element of the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetDecl {
    pub name: String,
    pub sheet_id: u32,
    pub rel_id: String,
    /// Other attributes (`state`, ...) in document order
    pub attrs: Vec<(String, String)>,
}

/// What the workbook part says about its sheets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkbookDirectory {
    pub sheets: Vec<SheetDecl>,
    pub date_system: DateSystem,
}

/// Parse the sheet directory and date system.
pub fn parse_workbook(content: &str) -> Result<WorkbookDirectory> {
    let date_system = match xml::find_section(content, "workbookPr")? {
        Some(pr) if matches!(pr.element.attr("date1904"), Some("1") | Some("true")) => {
            DateSystem::Excel1904
        }
        _ => DateSystem::Excel1900,
    };

    let section = xml::find_section(content, "sheets")?
        .ok_or_else(|| Error::MissingComponent("<sheets> in workbook part".to_string()))?;

    let mut sheets = Vec::new();
    for child in section.children.iter().filter(|c| c.local_name() == "sheet") {
        let mut decl = SheetDecl {
            name: String::new(),
            sheet_id: 0,
            rel_id: String::new(),
            attrs: Vec::new(),
        };
        for (key, value) in &child.attrs {
            match key.as_str() {
                "name" => decl.name = value.clone(),
                "sheetId" => {
                    decl.sheet_id = value.trim().parse().map_err(|_| {
                        Error::XmlParse(format!("sheetId \"{value}\" is not a number"))
                    })?
                }
                // The relationship id is namespaced, usually as r:id.
                _ if key.contains(':') && xml::local_name(key) == "id" => {
                    decl.rel_id = value.clone()
                }
                _ => decl.attrs.push((key.clone(), value.clone())),
            }
        }
        if decl.name.is_empty() || decl.rel_id.is_empty() {
            return Err(Error::XmlParse(format!(
                "<sheet> without name or relationship id: {}",
                child.text(content)
            )));
        }
        sheets.push(decl);
    }

    Ok(WorkbookDirectory {
        sheets,
        date_system,
    })
}

/// Replace the sheet directory, keeping the rest of the workbook part.
///
/// The selected tab is clamped when sheets were removed, since an out-of-range
/// `activeTab` makes the package unreadable for some consumers.
pub fn emit_workbook(content: &str, sheets: &[SheetDecl]) -> Result<String> {
    let section = xml::find_section(content, "sheets")?
        .ok_or_else(|| Error::MissingComponent("<sheets> in workbook part".to_string()))?;
    let name = &section.element.name;
    let prefix = name.strip_suffix("sheets").unwrap_or_default();
    let rel_attr = relationship_attr_name(content, &section.children);

    let mut out = format!("<{name}");
    xml::push_attrs(&mut out, &section.element.attrs);
    out.push('>');
    for sheet in sheets {
        out.push_str(&format!("<{prefix}sheet"));
        let mut attrs = vec![
            ("name".to_string(), sheet.name.clone()),
            ("sheetId".to_string(), sheet.sheet_id.to_string()),
        ];
        attrs.extend(sheet.attrs.iter().cloned());
        attrs.push((rel_attr.clone(), sheet.rel_id.clone()));
        xml::push_attrs(&mut out, &attrs);
        out.push_str("/>");
    }
    out.push_str(&format!("</{name}>"));

    let mut edits = vec![(section.element.range.clone(), out)];

    if let Some(views) = xml::find_section(content, "bookViews")? {
        for view in views.children.iter().filter(|v| v.local_name() == "workbookView") {
            let active = view.attr("activeTab").and_then(|v| v.parse::<usize>().ok());
            let out_of_range = active.is_some_and(|tab| tab >= sheets.len().max(1));
            // Views with children are left alone; they are rare and carry extensions.
            if out_of_range && view.inner.is_empty() && view.range.end == view.inner.end {
                let mut replacement = format!("<{}", view.name);
                let attrs: Vec<(String, String)> = view
                    .attrs
                    .iter()
                    .filter(|(key, _)| key != "activeTab" && key != "firstSheet")
                    .cloned()
                    .collect();
                xml::push_attrs(&mut replacement, &attrs);
                replacement.push_str("/>");
                edits.push((view.range.clone(), replacement));
            }
        }
    }

    Ok(xml::splice(content, edits))
}

// Keep the prefix the document already uses for relationship ids.
fn relationship_attr_name(content: &str, existing: &[xml::Fragment]) -> String {
    existing
        .iter()
        .flat_map(|sheet| sheet.attrs.iter())
        .map(|(key, _)| key)
        .find(|key| key.contains(':') && xml::local_name(key) == "id")
        .cloned()
        .unwrap_or_else(|| {
            let prefix = find_relationships_prefix(content).unwrap_or("r");
            format!("{prefix}:id")
        })
}

fn find_relationships_prefix(content: &str) -> Option<&str> {
    const NS: &str = "=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\"";
    let end = content.find(NS)?;
    let start = content[..end].rfind("xmlns:")? + "xmlns:".len();
    Some(&content[start..end])
}

/// Part text for a workbook created in this session.
pub(crate) const WORKBOOK_TEMPLATE: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
    r#"<workbookPr defaultThemeVersion="124226"/>"#,
    r#"<bookViews><workbookView xWindow="240" yWindow="15" windowWidth="16095" windowHeight="9660"/></bookViews>"#,
    "<sheets/>",
    r#"<calcPr calcId="145621"/>"#,
    "</workbook>"
);

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><workbookPr date1904="1"/><bookViews><workbookView activeTab="2"/></bookViews><sheets><sheet name="T1" sheetId="1" r:id="rId1"/><sheet name="Hidden &amp; Co" sheetId="4" state="hidden" r:id="rId2"/><sheet name="T3" sheetId="3" r:id="rId3"/></sheets><definedNames><definedName name="x">T1!$A$1</definedName></definedNames></workbook>"#;

    #[test]
    fn test_parse_directory() {
        let directory = parse_workbook(WORKBOOK).unwrap();
        assert_eq!(directory.date_system, DateSystem::Excel1904);
        assert_eq!(directory.sheets.len(), 3);
        assert_eq!(directory.sheets[1].name, "Hidden & Co");
        assert_eq!(directory.sheets[1].sheet_id, 4);
        assert_eq!(directory.sheets[1].rel_id, "rId2");
        assert_eq!(
            directory.sheets[1].attrs,
            vec![("state".to_string(), "hidden".to_string())]
        );
    }

    #[test]
    fn test_emit_round_trips_directory() {
        let directory = parse_workbook(WORKBOOK).unwrap();
        let out = emit_workbook(WORKBOOK, &directory.sheets).unwrap();
        assert_eq!(out, WORKBOOK);
    }

    #[test]
    fn test_emit_after_removal_clamps_active_tab() {
        let mut directory = parse_workbook(WORKBOOK).unwrap();
        directory.sheets.remove(2);
        directory.sheets[0].name = "Renamed".to_string();

        let out = emit_workbook(WORKBOOK, &directory.sheets).unwrap();
        assert!(out.contains(r#"<sheet name="Renamed" sheetId="1" r:id="rId1"/>"#));
        assert!(!out.contains("T3"));
        assert!(out.contains("<bookViews><workbookView/></bookViews>"));
        assert!(out.contains("<definedNames>"));
        assert_eq!(parse_workbook(&out).unwrap().sheets, directory.sheets);
    }

    #[test]
    fn test_template_starts_empty() {
        let directory = parse_workbook(WORKBOOK_TEMPLATE).unwrap();
        assert!(directory.sheets.is_empty());
        assert_eq!(directory.date_system, DateSystem::Excel1900);

        let sheets = vec![SheetDecl {
            name: "Sheet1".to_string(),
            sheet_id: 1,
            rel_id: "rId1".to_string(),
            attrs: Vec::new(),
        }];
        let out = emit_workbook(WORKBOOK_TEMPLATE, &sheets).unwrap();
        assert!(out.contains(r#"<sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets>"#));
    }

    #[test]
    fn test_missing_directory() {
        assert!(matches!(
            parse_workbook("<workbook/>"),
            Err(Error::MissingComponent(_))
        ));
    }
}
