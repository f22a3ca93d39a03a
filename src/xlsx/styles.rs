//! The workbook style table (`xl/styles.xml`).
//!
//! The table is append-only for the whole session. Untouched worksheets embed composite
//! indices that must keep meaning the same record after save, so records are never removed,
//! renumbered or edited in place. New formatting always lands in a new or deduplicated record.

use crate::container::decode_xml_bytes;
use crate::error::{Error, Result};
use crate::model::{Border, CellFormat, Fill, Font, NumberFormat, ResolvedFormat, StyleChange};
use crate::xml::{self, Fragment};
use std::borrow::Cow;
use std::collections::HashMap;
use std::hash::Hash;

/// First id available for custom number formats.
const FIRST_CUSTOM_NUM_FMT: u32 = 164;

/// Built-in number formats every consumer knows without a declaration.
const BUILTIN_NUM_FMTS: [(u32, &str); 28] = [
    (0, "General"),
    (1, "0"),
    (2, "0.00"),
    (3, "#,##0"),
    (4, "#,##0.00"),
    (9, "0%"),
    (10, "0.00%"),
    (11, "0.00E+00"),
    (12, "# ?/?"),
    (13, "# ??/??"),
    (14, "mm-dd-yy"),
    (15, "d-mmm-yy"),
    (16, "d-mmm"),
    (17, "mmm-yy"),
    (18, "h:mm AM/PM"),
    (19, "h:mm:ss AM/PM"),
    (20, "h:mm"),
    (21, "h:mm:ss"),
    (22, "m/d/yy h:mm"),
    (37, "#,##0 ;(#,##0)"),
    (38, "#,##0 ;[Red](#,##0)"),
    (39, "#,##0.00;(#,##0.00)"),
    (40, "#,##0.00;[Red](#,##0.00)"),
    (45, "mm:ss"),
    (46, "[h]:mm:ss"),
    (47, "mmss.0"),
    (48, "##0.0E+0"),
    (49, "@"),
];

/// Built-in id applied by `set_date` when a cell has no date format.
pub const DEFAULT_DATE_NUM_FMT: u32 = 22;

/// Sections of a stylesheet in schema order.
const SECTION_ORDER: [&str; 11] = [
    "numFmts",
    "fonts",
    "fills",
    "borders",
    "cellStyleXfs",
    "cellXfs",
    "cellStyles",
    "dxfs",
    "tableStyles",
    "colors",
    "extLst",
];

/// Stylesheet used when a package has no styles part.
const EMPTY_STYLESHEET: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
    r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#,
    r#"<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>"#,
    r#"<dxfs count="0"/><tableStyles count="0" defaultTableStyle="TableStyleMedium2" defaultPivotStyle="PivotStyleLight16"/>"#,
    "</styleSheet>"
);

/// Component records addressed by fragment text.
trait Component: Clone + Eq + Hash {
    const ELEMENT: &'static str;
    fn from_fragment(text: &str) -> Self;
    fn fragment(&self) -> &str;
}

impl Component for Font {
    const ELEMENT: &'static str = "fonts";
    fn from_fragment(text: &str) -> Self {
        Font::from_xml(text)
    }
    fn fragment(&self) -> &str {
        self.xml()
    }
}

impl Component for Fill {
    const ELEMENT: &'static str = "fills";
    fn from_fragment(text: &str) -> Self {
        Fill::from_xml(text)
    }
    fn fragment(&self) -> &str {
        self.xml()
    }
}

impl Component for Border {
    const ELEMENT: &'static str = "borders";
    fn from_fragment(text: &str) -> Self {
        Border::from_xml(text)
    }
    fn fragment(&self) -> &str {
        self.xml()
    }
}

/// Append-only list with a dedup index.
#[derive(Debug, Clone)]
struct Table<T> {
    items: Vec<T>,
    index: HashMap<T, u32>,
}

impl<T: Clone + Eq + Hash> Default for Table<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Clone + Eq + Hash> Table<T> {
    fn push(&mut self, item: T) -> u32 {
        let id = self.items.len() as u32;
        self.index.entry(item.clone()).or_insert(id);
        self.items.push(item);
        id
    }

    fn register(&mut self, item: T) -> u32 {
        match self.index.get(&item) {
            Some(&id) => id,
            None => self.push(item),
        }
    }

    fn get(&self, id: u32) -> Option<&T> {
        self.items.get(id as usize)
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// Record counts at load time; anything beyond them was appended this session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Loaded {
    num_fmts: usize,
    fonts: usize,
    fills: usize,
    borders: usize,
    cell_formats: usize,
}

/// Workbook-wide style records.
#[derive(Debug, Clone)]
pub struct StyleTable {
    number_formats: Vec<NumberFormat>,
    fonts: Table<Font>,
    fills: Table<Fill>,
    borders: Table<Border>,
    cell_formats: Table<CellFormat>,
    source: Option<String>,
    /// Part bytes before decoding, when read from a package
    original: Option<Vec<u8>>,
    /// Namespace prefix of the stylesheet root, colon included
    prefix: String,
    loaded: Loaded,
}

impl Default for StyleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleTable {
    /// The minimal table of a package without a styles part.
    pub fn new() -> Self {
        let mut table = Self {
            number_formats: Vec::new(),
            fonts: Table::default(),
            fills: Table::default(),
            borders: Table::default(),
            cell_formats: Table::default(),
            source: None,
            original: None,
            prefix: String::new(),
            loaded: Loaded::default(),
        };
        table.complete_defaults();
        table
    }

    /// Parse a styles part, keeping its bytes for an unmodified save.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let content =
            decode_xml_bytes(bytes).map_err(|e| Error::MalformedStyles(e.to_string()))?;
        let mut table = Self::load(&content)?;
        table.original = Some(bytes.to_vec());
        Ok(table)
    }

    /// Parse a styles part.
    ///
    /// Every composite record must reference components that exist; a dangling index is a
    /// broken package and fails with [`Error::MalformedStyles`].
    pub fn load(content: &str) -> Result<Self> {
        let malformed = |e: Error| Error::MalformedStyles(e.to_string());
        let mut table = Self {
            number_formats: Vec::new(),
            fonts: Table::default(),
            fills: Table::default(),
            borders: Table::default(),
            cell_formats: Table::default(),
            source: Some(content.to_string()),
            original: None,
            prefix: String::new(),
            loaded: Loaded::default(),
        };

        let root = xml::find_section(content, "styleSheet")
            .map_err(malformed)?
            .ok_or_else(|| Error::MalformedStyles("no <styleSheet> element".to_string()))?;
        // A bare `<styleSheet/>` is replaced by the default stylesheet on save.
        if !(root.element.inner.is_empty() && root.element.range.end == root.element.inner.end) {
            table.prefix = xml::prefix_of(&root.element.name).to_string();
        }

        if let Some(section) = xml::find_section(content, "numFmts").map_err(malformed)? {
            for child in section.children.iter().filter(|c| c.local_name() == "numFmt") {
                let id = parse_id(child, "numFmtId")?
                    .ok_or_else(|| Error::MalformedStyles("numFmt without numFmtId".to_string()))?;
                let code = child.attr("formatCode").unwrap_or_default().to_string();
                table.number_formats.push(NumberFormat { id, code });
            }
        }

        load_components(content, &mut table.fonts)?;
        load_components(content, &mut table.fills)?;
        load_components(content, &mut table.borders)?;

        if let Some(section) = xml::find_section(content, "cellXfs").map_err(malformed)? {
            for child in section.children.iter().filter(|c| c.local_name() == "xf") {
                let format = cell_format_from(child, content)?;
                table.check_references(&format, table.cell_formats.len())?;
                table.cell_formats.push(format);
            }
        }

        table.loaded = table.counts();
        table.complete_defaults();
        log::debug!(
            "styles: {} number formats, {} fonts, {} fills, {} borders, {} cell formats",
            table.number_formats.len(),
            table.fonts.len(),
            table.fills.len(),
            table.borders.len(),
            table.cell_formats.len()
        );
        Ok(table)
    }

    fn counts(&self) -> Loaded {
        Loaded {
            num_fmts: self.number_formats.len(),
            fonts: self.fonts.len(),
            fills: self.fills.len(),
            borders: self.borders.len(),
            cell_formats: self.cell_formats.len(),
        }
    }

    // A stylesheet needs at least one font, the two reserved fills, one border and one
    // composite record for style index 0 to mean anything.
    fn complete_defaults(&mut self) {
        if self.fonts.len() == 0 {
            let font = self.qualified(Font::default());
            self.fonts.push(font);
        }
        if self.fills.len() == 0 {
            let (none, gray) = (self.qualified(Fill::none()), self.qualified(Fill::gray125()));
            self.fills.push(none);
            self.fills.push(gray);
        }
        if self.borders.len() == 0 {
            let border = self.qualified(Border::none());
            self.borders.push(border);
        }
        if self.cell_formats.len() == 0 {
            self.cell_formats.push(CellFormat {
                xf_id: Some(0),
                ..CellFormat::default()
            });
        }
    }

    fn check_references(&self, format: &CellFormat, index: usize) -> Result<()> {
        let dangling = |what: &str, id: u32| {
            Err(Error::MalformedStyles(format!(
                "cell format {index} references missing {what} {id}"
            )))
        };
        if self.fonts.get(format.font_id).is_none() {
            return dangling("font", format.font_id);
        }
        if self.fills.get(format.fill_id).is_none() {
            return dangling("fill", format.fill_id);
        }
        if self.borders.get(format.border_id).is_none() {
            return dangling("border", format.border_id);
        }
        if format.num_fmt_id >= FIRST_CUSTOM_NUM_FMT && self.custom_format(format.num_fmt_id).is_none() {
            return dangling("number format", format.num_fmt_id);
        }
        Ok(())
    }

    /// Whether records were appended since load.
    pub fn is_modified(&self) -> bool {
        self.source.is_none() || self.counts() != self.loaded
    }

    /// Number of composite records.
    pub fn len(&self) -> usize {
        self.cell_formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cell_formats.len() == 0
    }

    /// Check that a composite index exists.
    pub fn contains(&self, index: u32) -> bool {
        self.cell_formats.get(index).is_some()
    }

    pub fn cell_format(&self, index: u32) -> Option<&CellFormat> {
        self.cell_formats.get(index)
    }

    pub fn font(&self, id: u32) -> Option<&Font> {
        self.fonts.get(id)
    }

    pub fn fill(&self, id: u32) -> Option<&Fill> {
        self.fills.get(id)
    }

    pub fn border(&self, id: u32) -> Option<&Border> {
        self.borders.get(id)
    }

    fn custom_format(&self, id: u32) -> Option<&NumberFormat> {
        self.number_formats.iter().find(|f| f.id == id)
    }

    /// Format code of a number format id, built-in or custom.
    pub fn number_format_code(&self, id: u32) -> Option<&str> {
        if let Some(custom) = self.custom_format(id) {
            return Some(&custom.code);
        }
        BUILTIN_NUM_FMTS
            .iter()
            .find(|(builtin, _)| *builtin == id)
            .map(|(_, code)| *code)
    }

    /// Check if a number format id formats dates or times.
    pub fn is_date_format(&self, num_fmt_id: u32) -> bool {
        // Built-in date formats 14-22 and time formats 45-47
        if (14..=22).contains(&num_fmt_id) || (45..=47).contains(&num_fmt_id) {
            return true;
        }
        self.custom_format(num_fmt_id)
            .is_some_and(|format| is_date_format_code(&format.code))
    }

    /// Check if a composite record carries a date format.
    pub fn is_date_style(&self, index: u32) -> bool {
        self.cell_format(index)
            .is_some_and(|format| self.is_date_format(format.num_fmt_id))
    }

    /// A composite record with its components looked up.
    pub fn resolve(&self, index: u32) -> Option<ResolvedFormat> {
        let format = self.cell_format(index)?;
        Some(ResolvedFormat {
            index,
            number_format: NumberFormat {
                id: format.num_fmt_id,
                code: self
                    .number_format_code(format.num_fmt_id)
                    .unwrap_or("General")
                    .to_string(),
            },
            is_date: self.is_date_format(format.num_fmt_id),
            font: self.font(format.font_id).cloned(),
            fill: self.fill(format.fill_id).cloned(),
            border: self.border(format.border_id).cloned(),
        })
    }

    /// Id for a format code: the built-in id, an existing custom id, or a new custom id.
    pub fn register_number_format(&mut self, code: &str) -> u32 {
        if let Some((id, _)) = BUILTIN_NUM_FMTS.iter().find(|(_, builtin)| *builtin == code) {
            return *id;
        }
        if let Some(existing) = self.number_formats.iter().find(|f| f.code == code) {
            return existing.id;
        }
        let id = self
            .number_formats
            .iter()
            .map(|f| f.id + 1)
            .max()
            .unwrap_or(FIRST_CUSTOM_NUM_FMT)
            .max(FIRST_CUSTOM_NUM_FMT);
        self.number_formats.push(NumberFormat {
            id,
            code: code.to_string(),
        });
        id
    }

    pub fn register_font(&mut self, font: Font) -> u32 {
        let font = self.qualified(font);
        self.fonts.register(font)
    }

    pub fn register_fill(&mut self, fill: Fill) -> u32 {
        let fill = self.qualified(fill);
        self.fills.register(fill)
    }

    pub fn register_border(&mut self, border: Border) -> u32 {
        let border = self.qualified(border);
        self.borders.register(border)
    }

    // Records are compared and stored in the stylesheet's own namespace prefix.
    fn qualified<T: Component>(&self, item: T) -> T {
        let text = match xml::qualify(item.fragment(), &self.prefix) {
            Cow::Borrowed(_) => None,
            Cow::Owned(text) => Some(text),
        };
        text.map_or(item, |text| T::from_fragment(&text))
    }

    /// Index of a composite record equal to `format`, appending it if none exists.
    pub fn register(&mut self, format: CellFormat) -> Result<u32> {
        if let Some(&id) = self.cell_formats.index.get(&format) {
            return Ok(id);
        }
        self.check_references(&format, self.cell_formats.len())?;
        Ok(self.cell_formats.push(format))
    }

    /// Copy composite `base`, swap one component and register the result.
    ///
    /// The base record is never changed, so other cells using it keep their formatting.
    pub fn derive(&mut self, base: u32, change: &StyleChange) -> Result<u32> {
        let mut format = self
            .cell_format(base)
            .cloned()
            .ok_or(Error::InvalidStyleIndex(base))?;
        match change {
            StyleChange::NumberFormat(code) => {
                format.num_fmt_id = self.register_number_format(code);
                format.set_attr("applyNumberFormat", "1");
            }
            StyleChange::Font(font) => {
                format.font_id = self.register_font(font.clone());
                format.set_attr("applyFont", "1");
            }
            StyleChange::Fill(fill) => {
                format.fill_id = self.register_fill(fill.clone());
                format.set_attr("applyFill", "1");
            }
            StyleChange::Border(border) => {
                format.border_id = self.register_border(border.clone());
                format.set_attr("applyBorder", "1");
            }
        }
        self.register(format)
    }

    /// Derive a record with a date format from `base`, unless it already has one.
    pub fn with_date_format(&mut self, base: u32) -> Result<u32> {
        if self.is_date_style(base) {
            return Ok(base);
        }
        let code = self
            .number_format_code(DEFAULT_DATE_NUM_FMT)
            .unwrap_or("m/d/yy h:mm")
            .to_string();
        self.derive(base, &StyleChange::NumberFormat(code))
    }

    /// Bytes of the styles part.
    ///
    /// An unmodified table returns the bytes it was loaded from. Otherwise the five managed
    /// sections are regenerated and spliced into the original text; cell styles, differential
    /// formats, table styles, colors and extensions are kept as they were.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        if let (false, Some(source)) = (self.is_modified(), &self.source) {
            return Ok(self
                .original
                .clone()
                .unwrap_or_else(|| source.as_bytes().to_vec()));
        }

        let base = match &self.source {
            Some(source) if !is_self_closing_root(source)? => source.as_str(),
            _ => EMPTY_STYLESHEET,
        };
        let root = xml::find_section(base, "styleSheet")?
            .ok_or_else(|| Error::MalformedStyles("no <styleSheet> element".to_string()))?;

        let mut present: Vec<(usize, std::ops::Range<usize>)> = Vec::new();
        for (order, name) in SECTION_ORDER.iter().enumerate() {
            if let Some(section) = root.children.iter().find(|c| c.local_name() == *name) {
                present.push((order, section.range.clone()));
            }
        }

        let prefix = xml::prefix_of(&root.element.name);
        let mut edits = Vec::new();
        for (order, name) in SECTION_ORDER.iter().enumerate() {
            let Some(text) = self.section_xml(name, prefix) else {
                continue;
            };
            match present.iter().find(|(o, _)| *o == order) {
                Some((_, range)) => edits.push((range.clone(), text)),
                None => {
                    let at = present
                        .iter()
                        .find(|(o, _)| *o > order)
                        .map_or(root.element.inner.end, |(_, range)| range.start);
                    edits.push((at..at, text));
                }
            }
        }

        Ok(xml::splice(base, edits).into_bytes())
    }

    /// A managed section, tagged with the stylesheet's namespace prefix.
    fn section_xml(&self, name: &str, p: &str) -> Option<String> {
        match name {
            "numFmts" if !self.number_formats.is_empty() => {
                let mut out = format!("<{p}numFmts count=\"{}\">", self.number_formats.len());
                for format in &self.number_formats {
                    out.push_str(&format!("<{p}numFmt"));
                    xml::push_attrs(
                        &mut out,
                        &[
                            ("numFmtId".to_string(), format.id.to_string()),
                            ("formatCode".to_string(), format.code.clone()),
                        ],
                    );
                    out.push_str("/>");
                }
                out.push_str(&format!("</{p}numFmts>"));
                Some(out)
            }
            "fonts" => Some(component_section(&self.fonts, p)),
            "fills" => Some(component_section(&self.fills, p)),
            "borders" => Some(component_section(&self.borders, p)),
            "cellXfs" => {
                let mut out = format!("<{p}cellXfs count=\"{}\">", self.cell_formats.len());
                for format in &self.cell_formats.items {
                    out.push_str(&format.to_xml(p));
                }
                out.push_str(&format!("</{p}cellXfs>"));
                Some(out)
            }
            _ => None,
        }
    }
}

fn component_section<T: Component>(table: &Table<T>, p: &str) -> String {
    let mut out = format!("<{p}{} count=\"{}\">", T::ELEMENT, table.len());
    for item in &table.items {
        out.push_str(item.fragment());
    }
    out.push_str(&format!("</{p}{}>", T::ELEMENT));
    out
}

fn load_components<T: Component>(content: &str, table: &mut Table<T>) -> Result<()> {
    let section = xml::find_section(content, T::ELEMENT)
        .map_err(|e| Error::MalformedStyles(e.to_string()))?;
    if let Some(section) = section {
        for child in &section.children {
            table.push(T::from_fragment(child.text(content)));
        }
    }
    Ok(())
}

fn cell_format_from(fragment: &Fragment, content: &str) -> Result<CellFormat> {
    let mut format = CellFormat {
        num_fmt_id: parse_id(fragment, "numFmtId")?.unwrap_or(0),
        font_id: parse_id(fragment, "fontId")?.unwrap_or(0),
        fill_id: parse_id(fragment, "fillId")?.unwrap_or(0),
        border_id: parse_id(fragment, "borderId")?.unwrap_or(0),
        xf_id: parse_id(fragment, "xfId")?,
        attrs: Vec::new(),
        children: content[fragment.inner.clone()].to_string(),
    };
    format.attrs = fragment
        .attrs
        .iter()
        .filter(|(key, _)| {
            !matches!(
                key.as_str(),
                "numFmtId" | "fontId" | "fillId" | "borderId" | "xfId"
            )
        })
        .cloned()
        .collect();
    Ok(format)
}

fn parse_id(fragment: &Fragment, key: &str) -> Result<Option<u32>> {
    match fragment.attr(key) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::MalformedStyles(format!("{key}=\"{value}\" is not an index"))),
        None => Ok(None),
    }
}

fn is_self_closing_root(content: &str) -> Result<bool> {
    Ok(xml::find_section(content, "styleSheet")?
        .is_some_and(|root| root.element.inner.is_empty() && root.element.range.end == root.element.inner.end))
}

/// Check if a format code formats dates or times.
///
/// Any day, month, year, hour, minute or second token in the first section counts, as do
/// elapsed-time brackets such as `[h]`. Other bracket content (`[Red]`, `[$-409]`), quoted
/// literals and escaped characters are skipped.
pub fn is_date_format_code(format_code: &str) -> bool {
    let mut chars = format_code.chars();
    let mut in_quote = false;
    let mut bracket: Option<String> = None;

    while let Some(c) = chars.next() {
        if in_quote {
            in_quote = c != '"';
            continue;
        }
        if let Some(content) = bracket.as_mut() {
            if c == ']' {
                let elapsed = !content.is_empty()
                    && content.chars().all(|c| matches!(c.to_ascii_lowercase(), 'h' | 'm' | 's'));
                if elapsed {
                    return true;
                }
                bracket = None;
            } else {
                content.push(c);
            }
            continue;
        }
        match c {
            // Escape, padding and fill each consume the next character.
            '\\' | '_' | '*' => {
                chars.next();
            }
            '"' => in_quote = true,
            '[' => bracket = Some(String::new()),
            ';' => return false,
            _ if matches!(c.to_ascii_lowercase(), 'd' | 'm' | 'y' | 'h' | 's') => return true,
            _ => {}
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Color, FontSpec, PatternType};
    use pretty_assertions::assert_eq;

    const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><numFmts count="1"><numFmt numFmtId="164" formatCode="yyyy-mm-dd"/></numFmts><fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="164" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"><alignment horizontal="left"/></xf></cellXfs><cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles><dxfs count="0"/></styleSheet>"#;

    #[test]
    fn test_load_records() {
        let table = StyleTable::load(STYLES).unwrap();
        assert_eq!(table.len(), 2);
        assert!(!table.is_modified());
        assert_eq!(table.number_format_code(164), Some("yyyy-mm-dd"));
        assert_eq!(table.number_format_code(49), Some("@"));
        assert!(table.is_date_style(1));
        assert!(!table.is_date_style(0));

        let second = table.cell_format(1).unwrap();
        assert_eq!(second.xf_id, Some(0));
        assert_eq!(second.children, r#"<alignment horizontal="left"/>"#);
        assert_eq!(second.attrs, vec![("applyNumberFormat".to_string(), "1".to_string())]);
    }

    #[test]
    fn test_unmodified_serializes_original_bytes() {
        let table = StyleTable::load(STYLES).unwrap();
        assert_eq!(table.serialize().unwrap(), STYLES.as_bytes());

        let mut bom = vec![0xEF, 0xBB, 0xBF];
        bom.extend_from_slice(STYLES.as_bytes());
        let mut table = StyleTable::from_bytes(&bom).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.serialize().unwrap(), bom);

        table.register_number_format("0.000");
        assert!(table.serialize().unwrap().starts_with(b"<?xml"));
    }

    #[test]
    fn test_register_dedups() {
        let mut table = StyleTable::load(STYLES).unwrap();
        let existing = table.cell_format(1).unwrap().clone();
        assert_eq!(table.register(existing).unwrap(), 1);
        assert!(!table.is_modified());

        let blue = StyleChange::Fill(Fill::solid(Color::rgb(0, 0, 255)));
        let first = table.derive(0, &blue).unwrap();
        let second = table.derive(0, &blue).unwrap();
        assert_eq!(first, 2);
        assert_eq!(first, second);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_derive_leaves_base_untouched() {
        let mut table = StyleTable::load(STYLES).unwrap();
        let before = table.cell_format(1).unwrap().clone();
        let red = table
            .derive(1, &StyleChange::Fill(Fill::solid(Color::rgb(255, 0, 0))))
            .unwrap();
        assert_eq!(table.cell_format(1), Some(&before));

        let derived = table.resolve(red).unwrap();
        assert_eq!(derived.fill.unwrap().pattern_type(), PatternType::Solid);
        assert_eq!(derived.number_format.code, "yyyy-mm-dd");
        assert_eq!(table.cell_format(red).unwrap().children, before.children);
    }

    #[test]
    fn test_number_format_ids() {
        let mut table = StyleTable::load(STYLES).unwrap();
        assert_eq!(table.register_number_format("0.00"), 2);
        assert_eq!(table.register_number_format("@"), 49);
        assert_eq!(table.register_number_format("yyyy-mm-dd"), 164);
        assert_eq!(table.register_number_format("0.000"), 165);
        assert_eq!(table.register_number_format("0.000"), 165);

        let mut fresh = StyleTable::new();
        assert_eq!(fresh.register_number_format("#,##0.000"), 164);
    }

    #[test]
    fn test_modified_splices_sections() {
        let mut table = StyleTable::load(STYLES).unwrap();
        let font = FontSpec {
            bold: true,
            ..FontSpec::default()
        }
        .build();
        let index = table.derive(0, &StyleChange::Font(font)).unwrap();
        table
            .derive(index, &StyleChange::NumberFormat("0.0%".to_string()))
            .unwrap();

        let out = String::from_utf8(table.serialize().unwrap()).unwrap();
        assert!(out.contains(r#"<numFmt numFmtId="165" formatCode="0.0%"/>"#));
        assert!(out.contains(r#"<fonts count="2">"#));
        assert!(out.contains(r#"<cellXfs count="4">"#));
        // Untouched sections stay verbatim.
        assert!(out.contains(r#"<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles><dxfs count="0"/>"#));

        // The written part loads back to the same records.
        let reloaded = StyleTable::load(&out).unwrap();
        assert_eq!(reloaded.len(), 4);
        assert!(reloaded.font(1).unwrap().is_bold());
        assert_eq!(reloaded.cell_format(1), table.cell_format(1));
    }

    #[test]
    fn test_prefixed_stylesheet_keeps_prefix() {
        let prefixed = r#"<x:styleSheet xmlns:x="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><x:fonts count="1"><x:font><x:sz val="11"/><x:name val="Calibri"/></x:font></x:fonts><x:fills count="2"><x:fill><x:patternFill patternType="none"/></x:fill><x:fill><x:patternFill patternType="gray125"/></x:fill></x:fills><x:borders count="1"><x:border/></x:borders><x:cellXfs count="1"><x:xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></x:cellXfs></x:styleSheet>"#;
        let mut table = StyleTable::load(prefixed).unwrap();
        let blue = StyleChange::Fill(Fill::solid(Color::rgb(0, 0, 255)));
        let index = table.derive(0, &blue).unwrap();
        table
            .derive(index, &StyleChange::NumberFormat("0.0".to_string()))
            .unwrap();

        let out = String::from_utf8(table.serialize().unwrap()).unwrap();
        assert!(out.contains(r#"<x:fills count="3"><x:fill><x:patternFill patternType="none"/></x:fill><x:fill><x:patternFill patternType="gray125"/></x:fill><x:fill><x:patternFill patternType="solid"><x:fgColor rgb="FF0000FF"/><x:bgColor indexed="64"/></x:patternFill></x:fill></x:fills>"#));
        assert!(out.contains(r#"<x:numFmts count="1"><x:numFmt numFmtId="164" formatCode="0.0"/></x:numFmts><x:fonts"#));
        assert!(out.contains(r#"<x:cellXfs count="3"><x:xf numFmtId="0""#));
        for tag in ["<fill", "<fills", "<xf ", "<cellXfs", "<numFmt"] {
            assert!(!out.contains(tag), "unprefixed {tag} in {out}");
        }

        // Reloading in a later session dedups against the written records.
        let mut reloaded = StyleTable::load(&out).unwrap();
        assert_eq!(reloaded.len(), 3);
        assert_eq!(reloaded.fill(2).unwrap().pattern_type(), PatternType::Solid);
        assert_eq!(reloaded.derive(0, &blue).unwrap(), index);
        assert!(!reloaded.is_modified());
    }

    #[test]
    fn test_missing_sections_inserted_in_order() {
        let minimal = r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellXfs><dxfs count="0"/></styleSheet>"#;
        // No component tables, so xf 0 dangles.
        assert!(matches!(
            StyleTable::load(minimal),
            Err(Error::MalformedStyles(_))
        ));

        let mut table = StyleTable::new();
        table.register_number_format("0.0");
        let out = String::from_utf8(table.serialize().unwrap()).unwrap();
        let positions: Vec<usize> = ["<numFmts", "<fonts", "<fills", "<borders", "<cellStyleXfs", "<cellXfs", "<cellStyles"]
            .iter()
            .map(|tag| out.find(tag).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_dangling_references_rejected() {
        let broken = STYLES.replace(r#"fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat"#, r#"fontId="7" fillId="0" borderId="0" xfId="0" applyNumberFormat"#);
        assert!(matches!(
            StyleTable::load(&broken),
            Err(Error::MalformedStyles(_))
        ));

        let undeclared = STYLES.replace(r#"numFmtId="164" fontId"#, r#"numFmtId="170" fontId"#);
        assert!(matches!(
            StyleTable::load(&undeclared),
            Err(Error::MalformedStyles(_))
        ));
    }

    #[test]
    fn test_builtin_date_formats() {
        let table = StyleTable::new();
        assert!(table.is_date_format(14));
        assert!(table.is_date_format(22));
        assert!(table.is_date_format(46));
        assert!(!table.is_date_format(0));
        assert!(!table.is_date_format(2));
        assert!(!table.is_date_format(49));
    }

    #[test]
    fn test_custom_date_format_detection() {
        assert!(is_date_format_code("mmmm\\ d\\,\\ yyyy"));
        assert!(is_date_format_code("yyyy-mm-dd"));
        assert!(is_date_format_code("d/m/yy"));
        assert!(is_date_format_code("[$-409]mmmm\\ d\\,\\ yyyy;@"));
        assert!(is_date_format_code("mmmm"));
        assert!(is_date_format_code("hh:mm:ss"));
        assert!(is_date_format_code("[h]:mm"));
        assert!(is_date_format_code("mm:ss.0"));
        assert!(is_date_format_code("h:mm AM/PM"));

        assert!(!is_date_format_code("0.00"));
        assert!(!is_date_format_code("#,##0"));
        assert!(!is_date_format_code("\"$\"#,##0.00"));
        assert!(!is_date_format_code("[Red]0.00"));
        assert!(!is_date_format_code("\"day\" 0"));
        assert!(!is_date_format_code("0.00_);[Red](0.00)"));
        assert!(!is_date_format_code("General"));
        assert!(!is_date_format_code("0\\h"));
    }

    #[test]
    fn test_with_date_format() {
        let mut table = StyleTable::load(STYLES).unwrap();
        assert_eq!(table.with_date_format(1).unwrap(), 1);
        let dated = table.with_date_format(0).unwrap();
        assert_eq!(table.cell_format(dated).unwrap().num_fmt_id, DEFAULT_DATE_NUM_FMT);

        // A custom time format already formats dates and is kept.
        let timed = table
            .derive(0, &StyleChange::NumberFormat("hh:mm:ss".to_string()))
            .unwrap();
        assert!(table.is_date_style(timed));
        assert_eq!(table.with_date_format(timed).unwrap(), timed);
    }
}
