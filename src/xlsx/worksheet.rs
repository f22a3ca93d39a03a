//! Worksheet part parsing and writing.
//!
//! Only `<dimension>`, `<cols>` and `<sheetData>` are modeled. Writing splices regenerated
//! versions of those three sections into the text the model was parsed from, so the rest of
//! the part (views, merges, conditional formats, page setup, relationships to drawings) is
//! written back byte for byte.

use super::shared_strings::SharedStrings;
use super::styles::StyleTable;
use crate::error::{Error, Result};
use crate::model::{
    column_name, Cell, CellRef, CellValue, ColumnFormat, DateSystem, Formula, RowFormat,
    WorksheetModel, MAX_COLUMNS, MAX_ROWS,
};
use crate::xml::{self, Fragment};
use chrono::{NaiveDate, NaiveDateTime};
use quick_xml::events::{BytesStart, Event};
use std::collections::BTreeSet;

/// Part text for a worksheet created in this session.
pub(crate) const WORKSHEET_TEMPLATE: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
    r#"<dimension ref="A1"/><sheetViews><sheetView workbookViewId="0"/></sheetViews>"#,
    r#"<sheetFormatPr defaultRowHeight="15"/><sheetData/>"#,
    r#"<pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/>"#,
    "</worksheet>"
);

/// Workbook-level tables a worksheet is read against.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    pub strings: &'a SharedStrings,
    pub styles: &'a StyleTable,
    pub date_system: DateSystem,
}

/// Parse a worksheet part into a complete model.
///
/// Style indices are checked against the live style table and kept as they are.
pub fn parse_worksheet(content: &str, ctx: &ParseContext<'_>) -> Result<WorksheetModel> {
    let mut model = WorksheetModel::with_source(content.to_string());

    if let Some(cols) = xml::find_section(content, "cols")? {
        for col in cols.children.iter().filter(|c| c.local_name() == "col") {
            parse_column(col, ctx, &mut model)?;
        }
    }

    let sheet_data = xml::find_section(content, "sheetData")?
        .ok_or_else(|| Error::XmlParse("worksheet has no <sheetData>".to_string()))?;

    let mut row_number = 0u32;
    for row in sheet_data.children.iter().filter(|c| c.local_name() == "row") {
        row_number = match row.attr("r") {
            Some(r) => r
                .trim()
                .parse()
                .map_err(|_| Error::InvalidCellReference(format!("row {r}")))?,
            None => row_number + 1,
        };
        if row_number == 0 || row_number > MAX_ROWS {
            return Err(Error::InvalidCellReference(format!("row {row_number}")));
        }
        parse_row_format(row, row_number, ctx, &mut model)?;
        parse_row_cells(&content[row.inner.clone()], row_number, ctx, &mut model)?;
    }

    Ok(model)
}

fn check_style(ctx: &ParseContext<'_>, value: &str) -> Result<u32> {
    let index: u32 = value
        .trim()
        .parse()
        .map_err(|_| Error::XmlParse(format!("style index \"{value}\" is not a number")))?;
    if !ctx.styles.contains(index) {
        return Err(Error::InvalidStyleIndex(index));
    }
    Ok(index)
}

fn parse_column(col: &Fragment, ctx: &ParseContext<'_>, model: &mut WorksheetModel) -> Result<()> {
    let bound = |key: &str| -> Result<u32> {
        col.attr(key)
            .and_then(|v| v.trim().parse().ok())
            .ok_or_else(|| Error::XmlParse(format!("<col> without a valid {key}")))
    };
    let min = bound("min")?;
    let max = bound("max")?.min(MAX_COLUMNS);
    if min == 0 || min > max {
        return Err(Error::XmlParse(format!("<col> range {min}..{max} is invalid")));
    }

    let mut format = ColumnFormat::default();
    for (key, value) in &col.attrs {
        match key.as_str() {
            "min" | "max" => {}
            "style" => format.style = Some(check_style(ctx, value)?),
            "width" => format.width = value.trim().parse().ok(),
            _ => format.attrs.push((key.clone(), value.clone())),
        }
    }
    for index in min..=max {
        model.set_column_format(index, format.clone());
    }
    Ok(())
}

fn parse_row_format(
    row: &Fragment,
    number: u32,
    ctx: &ParseContext<'_>,
    model: &mut WorksheetModel,
) -> Result<()> {
    let custom = matches!(row.attr("customFormat"), Some("1") | Some("true"));
    let mut format = RowFormat::default();
    for (key, value) in &row.attrs {
        match key.as_str() {
            // Spans are a load hint and go stale as soon as cells change.
            "r" | "spans" => {}
            // Both are rewritten from `format.style`; a row style without
            // customFormat is ignored by Excel.
            "customFormat" => {}
            "s" if custom => format.style = Some(check_style(ctx, value)?),
            "s" => {}
            _ => format.attrs.push((key.clone(), value.clone())),
        }
    }
    if format.style.is_some() || !format.attrs.is_empty() {
        model.set_row_format(number, format);
    }
    Ok(())
}

/// Where text events of the current cell go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    None,
    Value,
    Formula,
    Inline,
}

#[derive(Debug, Default)]
struct PendingCell {
    col: u32,
    style: u32,
    cell_type: Option<String>,
    value: Option<String>,
    formula: Option<(Vec<(String, String)>, String)>,
    inline: Option<String>,
}

fn parse_row_cells(
    inner: &str,
    row: u32,
    ctx: &ParseContext<'_>,
    model: &mut WorksheetModel,
) -> Result<()> {
    let mut reader = quick_xml::Reader::from_str(inner);
    let mut pending: Option<PendingCell> = None;
    let mut target = Target::None;
    let mut phonetic_depth = 0usize;
    let mut next_col = 1u32;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"c" => pending = Some(start_cell(&e, row, &mut next_col, ctx)?),
                b"v" => target = Target::Value,
                b"f" => {
                    if let Some(cell) = pending.as_mut() {
                        cell.formula = Some((xml::attributes(&e)?, String::new()));
                    }
                    target = Target::Formula;
                }
                b"is" => {
                    if let Some(cell) = pending.as_mut() {
                        cell.inline = Some(String::new());
                    }
                }
                b"rPh" => phonetic_depth += 1,
                b"t" if phonetic_depth == 0 => target = Target::Inline,
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"c" => {
                    let cell = start_cell(&e, row, &mut next_col, ctx)?;
                    finish_cell(cell, row, ctx, model)?;
                }
                b"f" => {
                    if let Some(cell) = pending.as_mut() {
                        cell.formula = Some((xml::attributes(&e)?, String::new()));
                    }
                }
                _ => {}
            },
            Event::Text(e) => {
                if let Some(cell) = pending.as_mut() {
                    push_text(cell, target, &e.unescape()?);
                }
            }
            Event::CData(e) => {
                if let Some(cell) = pending.as_mut() {
                    push_text(cell, target, &String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"c" => {
                    if let Some(cell) = pending.take() {
                        finish_cell(cell, row, ctx, model)?;
                    }
                    target = Target::None;
                }
                b"v" | b"f" | b"t" => target = Target::None,
                b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(())
}

fn push_text(cell: &mut PendingCell, target: Target, text: &str) {
    let buffer = match target {
        Target::Value => cell.value.get_or_insert_with(String::new),
        Target::Formula => match cell.formula.as_mut() {
            Some((_, expression)) => expression,
            None => return,
        },
        Target::Inline => cell.inline.get_or_insert_with(String::new),
        Target::None => return,
    };
    buffer.push_str(text);
}

fn start_cell(
    e: &BytesStart<'_>,
    row: u32,
    next_col: &mut u32,
    ctx: &ParseContext<'_>,
) -> Result<PendingCell> {
    let mut cell = PendingCell::default();
    let mut col = *next_col;
    for (key, value) in xml::attributes(e)? {
        match key.as_str() {
            "r" => {
                let reference = CellRef::parse(&value)?;
                if reference.row != row {
                    return Err(Error::InvalidCellReference(format!(
                        "{value} inside row {row}"
                    )));
                }
                col = reference.col;
            }
            "s" => cell.style = check_style(ctx, &value)?,
            "t" => cell.cell_type = Some(value),
            _ => {}
        }
    }
    if col == 0 || col > MAX_COLUMNS {
        return Err(Error::InvalidCellReference(format!("R{row}C{col}")));
    }
    cell.col = col;
    *next_col = col + 1;
    Ok(cell)
}

fn finish_cell(
    cell: PendingCell,
    row: u32,
    ctx: &ParseContext<'_>,
    model: &mut WorksheetModel,
) -> Result<()> {
    let raw = cell.value.as_deref();
    let value = match (cell.cell_type.as_deref(), raw) {
        (Some("inlineStr"), _) => CellValue::Text(cell.inline.unwrap_or_default()),
        (_, None) => CellValue::Empty,
        (Some("s"), Some(raw)) => {
            let index: usize = raw
                .trim()
                .parse()
                .map_err(|_| Error::XmlParse(format!("shared string index \"{raw}\"")))?;
            let text = ctx.strings.get(index).ok_or_else(|| {
                Error::XmlParse(format!(
                    "shared string {index} of {}{row} is out of range",
                    column_name(cell.col)
                ))
            })?;
            CellValue::Text(text.to_string())
        }
        (Some("b"), Some(raw)) => CellValue::Boolean(matches!(raw.trim(), "1" | "true")),
        (Some("e"), Some(raw)) => CellValue::Error(raw.to_string()),
        (Some("str"), Some(raw)) => CellValue::Text(raw.to_string()),
        (Some("d"), Some(raw)) => match iso_date(raw).and_then(|d| ctx.date_system.to_serial(d)) {
            Some(serial) => CellValue::Number(serial),
            None => CellValue::Text(raw.to_string()),
        },
        (None | Some("n"), Some(raw)) => CellValue::Number(raw.trim().parse().map_err(|_| {
            Error::XmlParse(format!(
                "{}{row} holds \"{raw}\", not a number",
                column_name(cell.col)
            ))
        })?),
        (Some(other), Some(raw)) => {
            log::warn!("unknown cell type {other:?} at {}{row}", column_name(cell.col));
            CellValue::Text(raw.to_string())
        }
    };

    let value = match cell.formula {
        Some((attrs, expression)) => CellValue::Formula(Formula {
            expression,
            attrs,
            cached: (!value.is_empty()).then(|| Box::new(value)),
        }),
        None => value,
    };

    model.set_cell(row, cell.col, Cell::styled(value, cell.style));
    Ok(())
}

fn iso_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim().trim_end_matches('Z');
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Write a model back to worksheet part bytes.
///
/// Text cells are interned into `strings` and written as shared-string references.
pub fn emit_worksheet(model: &WorksheetModel, strings: &mut SharedStrings) -> Result<Vec<u8>> {
    let base = model.source().unwrap_or(WORKSHEET_TEMPLATE);
    let sheet_data = xml::find_section(base, "sheetData")?
        .ok_or_else(|| Error::XmlParse("worksheet has no <sheetData>".to_string()))?;
    let prefix = sheet_data
        .element
        .name
        .strip_suffix("sheetData")
        .unwrap_or_default()
        .to_string();

    let mut edits = Vec::new();

    if let Some(dimension) = xml::find_section(base, "dimension")? {
        let reference = model
            .dimension()
            .map_or_else(|| "A1".to_string(), |d| d.to_string());
        edits.push((
            dimension.element.range.clone(),
            format!("<{} ref=\"{reference}\"/>", dimension.element.name),
        ));
    }

    let cols = columns_xml(model, &prefix);
    match xml::find_section(base, "cols")? {
        Some(existing) => edits.push((existing.element.range.clone(), cols.unwrap_or_default())),
        None => {
            if let Some(cols) = cols {
                let at = sheet_data.element.range.start;
                edits.push((at..at, cols));
            }
        }
    }

    edits.push((
        sheet_data.element.range.clone(),
        sheet_data_xml(model, strings, &prefix),
    ));

    Ok(xml::splice(base, edits).into_bytes())
}

fn columns_xml(model: &WorksheetModel, p: &str) -> Option<String> {
    let mut runs: Vec<(u32, u32, &ColumnFormat)> = Vec::new();
    for (col, format) in model.columns() {
        match runs.last_mut() {
            Some((_, max, last)) if *max + 1 == col && *last == format => *max = col,
            _ => runs.push((col, col, format)),
        }
    }
    if runs.is_empty() {
        return None;
    }

    let mut out = format!("<{p}cols>");
    for (min, max, format) in runs {
        out.push_str(&format!("<{p}col min=\"{min}\" max=\"{max}\""));
        if let Some(width) = format.width {
            out.push_str(&format!(" width=\"{width}\""));
        }
        if let Some(style) = format.style {
            out.push_str(&format!(" style=\"{style}\""));
        }
        xml::push_attrs(&mut out, &format.attrs);
        out.push_str("/>");
    }
    out.push_str(&format!("</{p}cols>"));
    Some(out)
}

fn sheet_data_xml(model: &WorksheetModel, strings: &mut SharedStrings, p: &str) -> String {
    let rows: BTreeSet<u32> = model
        .rows()
        .map(|(row, _)| row)
        .chain(model.cells().map(|(reference, _)| reference.row))
        .collect();
    if rows.is_empty() {
        return format!("<{p}sheetData/>");
    }

    let mut out = format!("<{p}sheetData>");
    for row in rows {
        out.push_str(&format!("<{p}row r=\"{row}\""));
        if let Some(format) = model.row_format(row) {
            if let Some(style) = format.style {
                out.push_str(&format!(" s=\"{style}\" customFormat=\"1\""));
            }
            xml::push_attrs(&mut out, &format.attrs);
        }

        let mut cells = model.row_cells(row).peekable();
        if cells.peek().is_none() {
            out.push_str("/>");
            continue;
        }
        out.push('>');
        for (reference, cell) in cells {
            push_cell(&mut out, p, reference, cell, strings);
        }
        out.push_str(&format!("</{p}row>"));
    }
    out.push_str(&format!("</{p}sheetData>"));
    out
}

fn push_cell(out: &mut String, p: &str, reference: CellRef, cell: &Cell, strings: &mut SharedStrings) {
    out.push_str(&format!("<{p}c r=\"{reference}\""));
    if cell.style != 0 {
        out.push_str(&format!(" s=\"{}\"", cell.style));
    }

    let (cell_type, formula, value) = match &cell.value {
        CellValue::Empty => (None, None, None),
        CellValue::Formula(formula) => {
            let (cell_type, value) = match formula.cached.as_deref() {
                Some(CellValue::Text(text)) => (Some("str"), Some(text.clone())),
                Some(cached) => scalar(cached, strings),
                None => (None, None),
            };
            (cell_type, Some(formula), value)
        }
        scalar_value => {
            let (cell_type, value) = scalar(scalar_value, strings);
            (cell_type, None, value)
        }
    };

    if let Some(cell_type) = cell_type {
        out.push_str(&format!(" t=\"{cell_type}\""));
    }
    if formula.is_none() && value.is_none() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    if let Some(formula) = formula {
        out.push_str(&format!("<{p}f"));
        xml::push_attrs(out, &formula.attrs);
        if formula.expression.is_empty() {
            out.push_str("/>");
        } else {
            out.push('>');
            out.push_str(&xml::escape(&formula.expression));
            out.push_str(&format!("</{p}f>"));
        }
    }
    if let Some(value) = value {
        out.push_str(&format!("<{p}v>{}</{p}v>", xml::escape(&value)));
    }
    out.push_str(&format!("</{p}c>"));
}

/// Cell type attribute and `<v>` text of a non-formula value.
fn scalar(value: &CellValue, strings: &mut SharedStrings) -> (Option<&'static str>, Option<String>) {
    match value {
        CellValue::Text(text) => (Some("s"), Some(strings.intern(text).to_string())),
        CellValue::Number(n) if n.is_finite() => (None, Some(n.to_string())),
        CellValue::Number(_) => (Some("e"), Some("#NUM!".to_string())),
        CellValue::Boolean(b) => (Some("b"), Some(if *b { "1" } else { "0" }.to_string())),
        CellValue::Error(code) => (Some("e"), Some(code.clone())),
        CellValue::Empty | CellValue::Formula(_) => (None, None),
    }
}
