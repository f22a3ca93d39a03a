//! The workbook session: open, sheet directory edits, and save.

use super::entry::{SheetKind, SheetState, WorksheetEntry};
use super::shared_strings::SharedStrings;
use super::sheet::Sheet;
use super::styles::StyleTable;
use super::workbook_part::{emit_workbook, parse_workbook, SheetDecl, WORKBOOK_TEMPLATE};
use super::worksheet::{emit_worksheet, ParseContext};
use crate::container::{
    decode_xml_bytes, read_package, read_relationships, rels_path_for, relative_target,
    resolve_path, write_package, Relationship, Relationships, REL_OFFICE_DOCUMENT,
    REL_SHARED_STRINGS, REL_STYLES, REL_WORKSHEET,
};
use crate::content_types::{ContentTypes, CT_SHARED_STRINGS, CT_STYLES, CT_WORKSHEET};
use crate::detect::{check_container_magic, detect_format_from_parts, FormatType};
use crate::error::{Error, Result};
use crate::model::DateSystem;
use crate::options::{OpenOptions, SaveOptions};
use crate::parts::PartStore;
use serde::Serialize;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const ROOT_RELS_PART: &str = "_rels/.rels";
const DEFAULT_WORKBOOK_PART: &str = "xl/workbook.xml";

/// Characters Excel rejects in sheet names.
const RESERVED_NAME_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

/// Longest sheet name, in characters.
pub const MAX_SHEET_NAME_LEN: usize = 31;

/// An open spreadsheet package.
///
/// Opening reads the whole container into memory and parses the workbook directory, the style
/// table and the shared strings. Worksheets are parsed only when first accessed through
/// [`Workbook::sheet`] or [`Workbook::sheet_at`]. Saving copies the parts of sheets that were
/// never accessed byte for byte.
///
/// # Example
///
/// ```no_run
/// use xlpack::Workbook;
///
/// let mut workbook = Workbook::open("report.xlsx")?;
/// workbook.sheet("Summary")?.set_value(1, 1, "Updated")?;
/// workbook.save_as("report-updated.xlsx")?;
/// # Ok::<(), xlpack::Error>(())
/// ```
#[derive(Debug)]
pub struct Workbook {
    parts: PartStore,
    path: Option<PathBuf>,
    format: FormatType,
    workbook_part: String,
    styles_part: Option<String>,
    strings_part: Option<String>,
    date_system: DateSystem,
    styles: StyleTable,
    strings: SharedStrings,
    sheets: Vec<WorksheetEntry>,
    removed: Vec<WorksheetEntry>,
    relationships: Relationships,
    opened_relationships: Relationships,
    opened_directory: Vec<SheetDecl>,
}

/// Overview of a workbook for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct WorkbookSummary {
    pub format: FormatType,
    pub date_system: DateSystem,
    pub part_count: usize,
    pub style_count: usize,
    pub shared_string_count: usize,
    pub sheets: Vec<SheetSummary>,
}

/// One sheet in a [`WorkbookSummary`].
#[derive(Debug, Clone, Serialize)]
pub struct SheetSummary {
    pub name: String,
    pub sheet_id: u32,
    pub part: String,
    pub kind: SheetKind,
    pub hidden: bool,
    pub loaded: bool,
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

impl Workbook {
    /// Create an empty workbook with no sheets.
    pub fn new() -> Self {
        let mut parts = PartStore::new();
        parts.put(
            CONTENT_TYPES_PART,
            ContentTypes::new_workbook().to_xml().into_bytes(),
        );
        let mut root = Relationships::new();
        root.add(Relationship {
            id: "rId1".to_string(),
            rel_type: REL_OFFICE_DOCUMENT.to_string(),
            target: DEFAULT_WORKBOOK_PART.to_string(),
            external: false,
        });
        parts.put(ROOT_RELS_PART, root.to_xml().into_bytes());
        parts.put(DEFAULT_WORKBOOK_PART, WORKBOOK_TEMPLATE.as_bytes().to_vec());

        Self {
            parts,
            path: None,
            format: FormatType::Xlsx,
            workbook_part: DEFAULT_WORKBOOK_PART.to_string(),
            styles_part: None,
            strings_part: None,
            date_system: DateSystem::Excel1900,
            styles: StyleTable::new(),
            strings: SharedStrings::new(),
            sheets: Vec::new(),
            removed: Vec::new(),
            relationships: Relationships::new(),
            opened_relationships: Relationships::new(),
            opened_directory: Vec::new(),
        }
    }

    /// Open a package from a file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, &OpenOptions::default())
    }

    /// Open a package from a file with options.
    pub fn open_with(path: impl AsRef<Path>, options: &OpenOptions) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let mut workbook = Self::from_bytes_with(&data, options)?;
        workbook.path = Some(path.to_path_buf());
        Ok(workbook)
    }

    /// Open a package from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_bytes_with(data, &OpenOptions::default())
    }

    /// Open a package from bytes with options.
    pub fn from_bytes_with(data: &[u8], options: &OpenOptions) -> Result<Self> {
        check_container_magic(data)?;
        let parts = read_package(data, options)?;
        Self::from_parts(parts, options)
    }

    /// Open a package whose parts are already in memory.
    pub fn from_parts(parts: PartStore, options: &OpenOptions) -> Result<Self> {
        let root = read_relationships(&parts, "")?;
        let workbook_part = root
            .first_of_type(REL_OFFICE_DOCUMENT)
            .map(|rel| resolve_path("", &rel.target))
            .unwrap_or_else(|| DEFAULT_WORKBOOK_PART.to_string());
        let workbook_bytes = parts
            .get(&workbook_part)
            .ok_or_else(|| Error::MissingComponent(workbook_part.clone()))?;
        let format = detect_format_from_parts(&parts, &workbook_part)?;

        let relationships = read_relationships(&parts, &workbook_part)?;
        let directory = parse_workbook(&decode_xml_bytes(workbook_bytes)?)?;

        let mut sheets: Vec<WorksheetEntry> = Vec::with_capacity(directory.sheets.len());
        let mut seen = HashSet::new();
        for decl in &directory.sheets {
            if !seen.insert(name_key(&decl.name)) {
                return Err(Error::DuplicateSheetName(decl.name.clone()));
            }
            let rel = relationships
                .get(&decl.rel_id)
                .ok_or_else(|| Error::MissingWorksheetPart {
                    sheet: decl.name.clone(),
                    part: decl.rel_id.clone(),
                })?;
            let part_name = resolve_path(&workbook_part, &rel.target);
            if options.verify_worksheet_parts && !parts.contains(&part_name) {
                return Err(Error::MissingWorksheetPart {
                    sheet: decl.name.clone(),
                    part: part_name,
                });
            }
            let kind = if rel.rel_type == REL_WORKSHEET {
                SheetKind::Worksheet
            } else {
                SheetKind::Other
            };
            sheets.push(WorksheetEntry::declared(
                decl.name.clone(),
                decl.sheet_id,
                decl.rel_id.clone(),
                part_name,
                kind,
                decl.attrs.clone(),
            ));
        }

        let styles_part = relationships
            .first_of_type(REL_STYLES)
            .map(|rel| resolve_path(&workbook_part, &rel.target));
        let styles = match &styles_part {
            Some(part) => {
                let bytes = parts
                    .get(part)
                    .ok_or_else(|| Error::MissingComponent(part.clone()))?;
                StyleTable::from_bytes(bytes)?
            }
            None => StyleTable::new(),
        };

        let strings_part = relationships
            .first_of_type(REL_SHARED_STRINGS)
            .map(|rel| resolve_path(&workbook_part, &rel.target));
        let strings = match strings_part.as_deref().and_then(|part| parts.get(part)) {
            Some(bytes) => SharedStrings::from_bytes(bytes)?,
            None => {
                if let Some(part) = &strings_part {
                    log::warn!("shared strings part {part} is declared but missing");
                }
                SharedStrings::new()
            }
        };

        log::debug!(
            "opened {} package: {} parts, {} sheets, {} styles, {} shared strings",
            format.extension(),
            parts.len(),
            sheets.len(),
            styles.len(),
            strings.len()
        );

        Ok(Self {
            parts,
            path: None,
            format,
            workbook_part,
            styles_part,
            strings_part,
            date_system: directory.date_system,
            styles,
            strings,
            sheets,
            removed: Vec::new(),
            opened_relationships: relationships.clone(),
            relationships,
            opened_directory: directory.sheets,
        })
    }

    /// The file this workbook was opened from.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn format(&self) -> FormatType {
        self.format
    }

    pub fn date_system(&self) -> DateSystem {
        self.date_system
    }

    /// The parts read at open time. Saving never modifies them.
    pub fn parts(&self) -> &PartStore {
        &self.parts
    }

    pub fn styles(&self) -> &StyleTable {
        &self.styles
    }

    pub fn shared_strings(&self) -> &SharedStrings {
        &self.strings
    }

    /// Directory entries in workbook order. Does not load anything.
    pub fn worksheets(&self) -> impl Iterator<Item = &WorksheetEntry> {
        self.sheets.iter()
    }

    /// Directory entry by name, compared case-insensitively. Does not load anything.
    pub fn worksheet(&self, name: &str) -> Option<&WorksheetEntry> {
        self.position(name).map(|index| &self.sheets[index])
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|entry| entry.name()).collect()
    }

    pub fn worksheet_count(&self) -> usize {
        self.sheets.len()
    }

    /// Number of sheets parsed so far in this session.
    pub fn loaded_count(&self) -> usize {
        self.sheets.iter().filter(|entry| entry.is_loaded()).count()
    }

    pub fn contains_worksheet(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn position(&self, name: &str) -> Option<usize> {
        let key = name_key(name);
        self.sheets
            .iter()
            .position(|entry| name_key(entry.name()) == key)
    }

    /// Access a sheet by name, parsing it on first access.
    pub fn sheet(&mut self, name: &str) -> Result<Sheet<'_>> {
        let index = self
            .position(name)
            .ok_or_else(|| Error::SheetNotFound(name.to_string()))?;
        self.sheet_at(index)
    }

    /// Access a sheet by position, parsing it on first access.
    pub fn sheet_at(&mut self, index: usize) -> Result<Sheet<'_>> {
        let Self {
            parts,
            styles,
            strings,
            sheets,
            date_system,
            ..
        } = self;
        let entry = sheets
            .get_mut(index)
            .ok_or_else(|| Error::SheetNotFound(format!("#{index}")))?;
        if entry.kind() != SheetKind::Worksheet {
            return Err(Error::NotAWorksheet(entry.name().to_string()));
        }

        let name = entry.name().to_string();
        let ctx = ParseContext {
            strings: &*strings,
            styles: &*styles,
            date_system: *date_system,
        };
        let model = entry.ensure_loaded(parts, &ctx)?;
        Ok(Sheet::new(name, model, styles, *date_system))
    }

    /// Append a new, empty worksheet and return it.
    ///
    /// The part name, relationship id and sheet id are reserved now; the part itself is
    /// written on save.
    pub fn add_worksheet(&mut self, name: &str) -> Result<Sheet<'_>> {
        validate_sheet_name(name)?;
        if self.contains_worksheet(name) {
            return Err(Error::DuplicateSheetName(name.to_string()));
        }

        let part_name = self.unused_part_name();
        let rel_id = self.relationships.next_id();
        let sheet_id = self
            .sheets
            .iter()
            .chain(self.removed.iter())
            .map(|entry| entry.sheet_id())
            .max()
            .unwrap_or(0)
            + 1;
        self.relationships.add(Relationship {
            id: rel_id.clone(),
            rel_type: REL_WORKSHEET.to_string(),
            target: relative_target(&self.workbook_part, &part_name),
            external: false,
        });
        log::debug!("added sheet '{name}' as {part_name} ({rel_id})");
        self.sheets.push(WorksheetEntry::created(
            name.to_string(),
            sheet_id,
            rel_id,
            part_name,
        ));
        self.sheet_at(self.sheets.len() - 1)
    }

    fn unused_part_name(&self) -> String {
        let dir = self
            .workbook_part
            .rsplit_once('/')
            .map_or(String::new(), |(dir, _)| format!("{dir}/"));
        let mut n = self.sheets.len() + 1;
        loop {
            let candidate = format!("{dir}worksheets/sheet{n}.xml");
            let taken = self.parts.contains(&candidate)
                || self
                    .sheets
                    .iter()
                    .chain(self.removed.iter())
                    .any(|entry| entry.part_name().eq_ignore_ascii_case(&candidate));
            if !taken {
                return candidate;
            }
            n += 1;
        }
    }

    /// Remove a sheet. Its part and relationship are left out of the next save.
    pub fn remove_worksheet(&mut self, name: &str) -> Result<()> {
        let index = self
            .position(name)
            .ok_or_else(|| Error::SheetNotFound(name.to_string()))?;
        let entry = self.sheets.remove(index);
        self.relationships.remove(&entry.rel_id);
        log::debug!("removed sheet '{}' ({})", entry.name(), entry.part_name());
        self.removed.push(entry);
        Ok(())
    }

    /// Rename a sheet. Only the directory changes; the sheet's part passes through.
    pub fn rename_worksheet(&mut self, old: &str, new: &str) -> Result<()> {
        validate_sheet_name(new)?;
        let index = self
            .position(old)
            .ok_or_else(|| Error::SheetNotFound(old.to_string()))?;
        if self.position(new).is_some_and(|other| other != index) {
            return Err(Error::DuplicateSheetName(new.to_string()));
        }
        self.sheets[index].name = new.to_string();
        Ok(())
    }

    /// Summary of the workbook without loading any sheet.
    pub fn summary(&self) -> WorkbookSummary {
        WorkbookSummary {
            format: self.format,
            date_system: self.date_system,
            part_count: self.parts.len(),
            style_count: self.styles.len(),
            shared_string_count: self.strings.len(),
            sheets: self
                .sheets
                .iter()
                .map(|entry| SheetSummary {
                    name: entry.name().to_string(),
                    sheet_id: entry.sheet_id(),
                    part: entry.part_name().to_string(),
                    kind: entry.kind(),
                    hidden: entry.is_hidden(),
                    loaded: entry.is_loaded(),
                })
                .collect(),
        }
    }

    /// Build the part store a save would write.
    ///
    /// The session is not changed, so calling this twice without edits in between gives
    /// identical stores.
    pub fn to_parts(&self) -> Result<PartStore> {
        // Every input part is carried over, which also covers the untouched sheets.
        let mut out = self.parts.clone();
        for entry in &self.removed {
            out.remove(entry.part_name());
            out.remove(&rels_path_for(entry.part_name()));
        }

        let mut strings = self.strings.clone();
        for entry in &self.sheets {
            match entry.state() {
                SheetState::Loaded(model) => {
                    if let Some(index) = model.style_indices().find(|&i| !self.styles.contains(i)) {
                        return Err(Error::InvalidStyleIndex(index));
                    }
                    out.put(entry.part_name(), emit_worksheet(model, &mut strings)?);
                    log::debug!("save: sheet '{}' serialized from its model", entry.name());
                }
                SheetState::NotLoaded => {
                    if !self.parts.contains(entry.part_name()) {
                        return Err(Error::MissingWorksheetPart {
                            sheet: entry.name().to_string(),
                            part: entry.part_name().to_string(),
                        });
                    }
                    log::debug!("save: sheet '{}' passed through", entry.name());
                }
            }
        }

        let mut relationships = self.relationships.clone();
        let mut types = match self.parts.get(CONTENT_TYPES_PART) {
            Some(bytes) => ContentTypes::parse(&decode_xml_bytes(bytes)?)?,
            None => ContentTypes::new_workbook(),
        };
        let mut types_changed = !self.parts.contains(CONTENT_TYPES_PART);
        for entry in &self.removed {
            types_changed |= types.remove_override(entry.part_name());
        }
        for entry in &self.sheets {
            if !self.parts.contains(entry.part_name()) {
                types_changed |= types.set_override(entry.part_name(), CT_WORKSHEET);
            }
        }

        let strings_part = match &self.strings_part {
            Some(part) => Some(part.clone()),
            None if !strings.is_empty() => {
                let part = self.sibling_part("sharedStrings.xml");
                self.link_part(&mut relationships, REL_SHARED_STRINGS, &part);
                types_changed |= types.set_override(&part, CT_SHARED_STRINGS);
                Some(part)
            }
            None => None,
        };
        if let Some(part) = strings_part {
            out.put(part, strings.serialize()?);
        }

        let styles_part = match &self.styles_part {
            Some(part) => part.clone(),
            None => {
                let part = self.sibling_part("styles.xml");
                self.link_part(&mut relationships, REL_STYLES, &part);
                types_changed |= types.set_override(&part, CT_STYLES);
                part
            }
        };
        out.put(styles_part, self.styles.serialize()?);

        let directory: Vec<SheetDecl> = self
            .sheets
            .iter()
            .map(|entry| SheetDecl {
                name: entry.name.clone(),
                sheet_id: entry.sheet_id,
                rel_id: entry.rel_id.clone(),
                attrs: entry.attrs.clone(),
            })
            .collect();
        if directory != self.opened_directory {
            let bytes = self
                .parts
                .get(&self.workbook_part)
                .ok_or_else(|| Error::MissingComponent(self.workbook_part.clone()))?;
            let content = emit_workbook(&decode_xml_bytes(bytes)?, &directory)?;
            out.put(self.workbook_part.as_str(), content.into_bytes());
        }

        if relationships != self.opened_relationships {
            out.put(
                rels_path_for(&self.workbook_part),
                relationships.to_xml().into_bytes(),
            );
        }
        if types_changed {
            out.put(CONTENT_TYPES_PART, types.to_xml().into_bytes());
        }

        Ok(out)
    }

    fn sibling_part(&self, file: &str) -> String {
        match self.workbook_part.rsplit_once('/') {
            Some((dir, _)) => format!("{dir}/{file}"),
            None => file.to_string(),
        }
    }

    fn link_part(&self, relationships: &mut Relationships, rel_type: &str, part: &str) {
        let id = relationships.next_id();
        relationships.add(Relationship {
            id,
            rel_type: rel_type.to_string(),
            target: relative_target(&self.workbook_part, part),
            external: false,
        });
    }

    /// Write the package to ZIP bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.to_bytes_with(&SaveOptions::default())
    }

    /// Write the package to ZIP bytes with options.
    pub fn to_bytes_with(&self, options: &SaveOptions) -> Result<Vec<u8>> {
        let parts = self.to_parts()?;
        write_package(&parts, options)
    }

    /// Save back to the file the workbook was opened from.
    pub fn save(&self) -> Result<()> {
        self.save_with(&SaveOptions::default())
    }

    /// Save back to the file the workbook was opened from, with options.
    pub fn save_with(&self, options: &SaveOptions) -> Result<()> {
        let path = self.path.as_deref().ok_or(Error::NoTargetPath)?;
        self.save_as_with(path, options)
    }

    /// Save to a file.
    ///
    /// The package is built completely in memory, written to a temporary file next to the
    /// target and renamed over it, so a failure never leaves a partial file behind.
    pub fn save_as(&self, path: impl AsRef<Path>) -> Result<()> {
        self.save_as_with(path, &SaveOptions::default())
    }

    /// Save to a file with options.
    pub fn save_as_with(&self, path: impl AsRef<Path>, options: &SaveOptions) -> Result<()> {
        let bytes = self.to_bytes_with(options)?;
        write_atomic(path.as_ref(), &bytes)
    }
}

#[cfg(feature = "async")]
impl Workbook {
    /// Open a package from a file asynchronously.
    pub async fn open_async(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_async_with(path, &OpenOptions::default()).await
    }

    /// Open a package from a file asynchronously with options.
    pub async fn open_async_with(path: impl AsRef<Path>, options: &OpenOptions) -> Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let mut workbook = Self::from_bytes_with(&data, options)?;
        workbook.path = Some(path.to_path_buf());
        Ok(workbook)
    }

    /// Save to a file asynchronously.
    pub async fn save_as_async(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.to_bytes()?;
        let path = path.as_ref().to_path_buf();
        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))?
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path)?;
    log::debug!("wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

/// Key for case-insensitive sheet name comparison.
fn name_key(name: &str) -> String {
    name.nfc().collect::<String>().to_lowercase()
}

/// Check a sheet name against the rules Excel enforces.
pub fn validate_sheet_name(name: &str) -> Result<()> {
    let len = name.chars().count();
    let invalid = len == 0
        || len > MAX_SHEET_NAME_LEN
        || name.contains(RESERVED_NAME_CHARS)
        || name.starts_with('\'')
        || name.ends_with('\'');
    if invalid {
        return Err(Error::InvalidSheetName(name.to_string()));
    }
    Ok(())
}
