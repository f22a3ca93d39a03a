//! Worksheet entries and their lazy load state.

use super::worksheet::{parse_worksheet, ParseContext};
use crate::container::decode_xml_bytes;
use crate::error::{Error, Result};
use crate::model::WorksheetModel;
use crate::parts::PartStore;
use serde::Serialize;

/// What a directory entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetKind {
    Worksheet,
    /// Chart sheets, dialog sheets and anything else; always passed through
    Other,
}

/// Load state of a worksheet.
///
/// Every entry starts `NotLoaded` (or `Loaded` with an empty model when created in this
/// session) and moves to `Loaded` at most once. There is no way back.
#[derive(Debug, Clone)]
pub enum SheetState {
    NotLoaded,
    Loaded(Box<WorksheetModel>),
}

impl SheetState {
    fn loaded_mut(&mut self) -> Option<&mut WorksheetModel> {
        match self {
            SheetState::Loaded(model) => Some(model),
            SheetState::NotLoaded => None,
        }
    }
}

/// One sheet of the workbook directory.
#[derive(Debug, Clone)]
pub struct WorksheetEntry {
    pub(crate) name: String,
    pub(crate) sheet_id: u32,
    pub(crate) rel_id: String,
    pub(crate) part_name: String,
    pub(crate) kind: SheetKind,
    /// Extra `<sheet>` attributes such as `state="hidden"`
    pub(crate) attrs: Vec<(String, String)>,
    pub(crate) state: SheetState,
}

impl WorksheetEntry {
    /// An entry read from the directory; its part is parsed on first access.
    pub(crate) fn declared(
        name: String,
        sheet_id: u32,
        rel_id: String,
        part_name: String,
        kind: SheetKind,
        attrs: Vec<(String, String)>,
    ) -> Self {
        Self {
            name,
            sheet_id,
            rel_id,
            part_name,
            kind,
            attrs,
            state: SheetState::NotLoaded,
        }
    }

    /// An entry created in this session, loaded with an empty model.
    pub(crate) fn created(name: String, sheet_id: u32, rel_id: String, part_name: String) -> Self {
        Self {
            name,
            sheet_id,
            rel_id,
            part_name,
            kind: SheetKind::Worksheet,
            attrs: Vec::new(),
            state: SheetState::Loaded(Box::new(WorksheetModel::new())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sheet_id(&self) -> u32 {
        self.sheet_id
    }

    /// Part holding the sheet, e.g. `xl/worksheets/sheet1.xml`.
    pub fn part_name(&self) -> &str {
        &self.part_name
    }

    pub fn kind(&self) -> SheetKind {
        self.kind
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, SheetState::Loaded(_))
    }

    pub fn state(&self) -> &SheetState {
        &self.state
    }

    /// Check if the sheet is hidden in the workbook's tab bar.
    pub fn is_hidden(&self) -> bool {
        self.attrs
            .iter()
            .any(|(key, value)| key == "state" && value != "visible")
    }

    /// The model, if the sheet has been loaded.
    pub fn model(&self) -> Option<&WorksheetModel> {
        match &self.state {
            SheetState::Loaded(model) => Some(model),
            SheetState::NotLoaded => None,
        }
    }

    /// Parse the sheet on first call; later calls return the same model.
    ///
    /// On failure the entry stays `NotLoaded`, so a later call tries again.
    pub(crate) fn ensure_loaded(
        &mut self,
        parts: &PartStore,
        ctx: &ParseContext<'_>,
    ) -> Result<&mut WorksheetModel> {
        if !self.is_loaded() {
            let model = self.parse_part(parts, ctx)?;
            log::debug!(
                "loaded sheet '{}' from {} ({} cells)",
                self.name,
                self.part_name,
                model.cell_count()
            );
            self.state = SheetState::Loaded(Box::new(model));
        }
        let name = &self.name;
        self.state
            .loaded_mut()
            .ok_or_else(|| Error::SheetNotFound(name.clone()))
    }

    fn parse_part(&self, parts: &PartStore, ctx: &ParseContext<'_>) -> Result<WorksheetModel> {
        let bytes = parts
            .get(&self.part_name)
            .ok_or_else(|| Error::MissingWorksheetPart {
                sheet: self.name.clone(),
                part: self.part_name.clone(),
            })?;
        let malformed = |e: Error| Error::MalformedWorksheet {
            part: self.part_name.clone(),
            reason: e.to_string(),
        };
        let content = decode_xml_bytes(bytes).map_err(malformed)?;
        parse_worksheet(&content, ctx).map_err(malformed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DateSystem;
    use crate::xlsx::{SharedStrings, StyleTable};

    const SHEET: &[u8] = br#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="1"><c r="A1"><v>1</v></c></row></sheetData></worksheet>"#;

    fn entry() -> WorksheetEntry {
        WorksheetEntry::declared(
            "Data".to_string(),
            1,
            "rId1".to_string(),
            "xl/worksheets/sheet1.xml".to_string(),
            SheetKind::Worksheet,
            Vec::new(),
        )
    }

    #[test]
    fn test_loads_once() {
        let strings = SharedStrings::new();
        let styles = StyleTable::new();
        let ctx = ParseContext {
            strings: &strings,
            styles: &styles,
            date_system: DateSystem::Excel1900,
        };
        let mut parts = PartStore::new();
        parts.put("xl/worksheets/sheet1.xml", SHEET.to_vec());

        let mut entry = entry();
        assert!(!entry.is_loaded());
        assert!(entry.model().is_none());

        entry.ensure_loaded(&parts, &ctx).unwrap().set_cell(
            2,
            1,
            crate::model::Cell::new(2.0),
        );
        assert!(entry.is_loaded());

        // A second access must not read the part again.
        parts.put("xl/worksheets/sheet1.xml", b"garbage".to_vec());
        let model = entry.ensure_loaded(&parts, &ctx).unwrap();
        assert_eq!(model.cell_count(), 2);
    }

    #[test]
    fn test_missing_part_stays_not_loaded() {
        let strings = SharedStrings::new();
        let styles = StyleTable::new();
        let ctx = ParseContext {
            strings: &strings,
            styles: &styles,
            date_system: DateSystem::Excel1900,
        };
        let mut parts = PartStore::new();
        let mut entry = entry();

        assert!(matches!(
            entry.ensure_loaded(&parts, &ctx),
            Err(Error::MissingWorksheetPart { .. })
        ));
        assert!(!entry.is_loaded());

        parts.put("xl/worksheets/sheet1.xml", b"<worksheet>".to_vec());
        assert!(matches!(
            entry.ensure_loaded(&parts, &ctx),
            Err(Error::MalformedWorksheet { .. })
        ));
        assert!(!entry.is_loaded());

        parts.put("xl/worksheets/sheet1.xml", SHEET.to_vec());
        assert!(entry.ensure_loaded(&parts, &ctx).is_ok());
    }

    #[test]
    fn test_created_entry_is_loaded() {
        let entry = WorksheetEntry::created(
            "New".to_string(),
            2,
            "rId9".to_string(),
            "xl/worksheets/sheet2.xml".to_string(),
        );
        assert!(entry.is_loaded());
        assert_eq!(entry.model().unwrap().cell_count(), 0);
        assert!(!entry.is_hidden());
    }
}
