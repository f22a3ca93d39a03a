//! The editable in-memory model of one worksheet.

use super::cell::{Cell, CellRef, CellValue};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Formatting attached to a whole row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RowFormat {
    /// Style applied to the row (`s` with `customFormat="1"`)
    pub style: Option<u32>,
    /// Other `<row>` attributes (`ht`, `hidden`, ...) in document order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attrs: Vec<(String, String)>,
}

/// Formatting attached to one column.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ColumnFormat {
    pub style: Option<u32>,
    pub width: Option<f64>,
    /// Other `<col>` attributes (`customWidth`, `hidden`, ...) in document order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attrs: Vec<(String, String)>,
}

impl ColumnFormat {
    pub(crate) fn set_attr(&mut self, key: &str, value: &str) {
        match self.attrs.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.to_string(),
            None => self.attrs.push((key.to_string(), value.to_string())),
        }
    }
}

/// Bounding box of the stored cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimension {
    pub first: CellRef,
    pub last: CellRef,
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.first == self.last {
            write!(f, "{}", self.first)
        } else {
            write!(f, "{}:{}", self.first, self.last)
        }
    }
}

/// Sparse cells plus row and column formats of one worksheet.
///
/// The model also keeps the XML text it was parsed from, so everything it does not model
/// (views, merged cells, conditional formats, page setup, drawing references) is written
/// back as it was.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorksheetModel {
    cells: BTreeMap<(u32, u32), Cell>,
    rows: BTreeMap<u32, RowFormat>,
    columns: BTreeMap<u32, ColumnFormat>,
    source: Option<String>,
}

impl WorksheetModel {
    /// An empty worksheet with no source text.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty model that will be written back into `source`.
    pub(crate) fn with_source(source: String) -> Self {
        Self {
            source: Some(source),
            ..Self::default()
        }
    }

    /// The XML text this model was parsed from.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn cell(&self, row: u32, col: u32) -> Option<&Cell> {
        self.cells.get(&(row, col))
    }

    pub fn cell_mut(&mut self, row: u32, col: u32) -> Option<&mut Cell> {
        self.cells.get_mut(&(row, col))
    }

    /// Insert or replace a cell.
    pub fn set_cell(&mut self, row: u32, col: u32, cell: Cell) {
        self.cells.insert((row, col), cell);
    }

    /// Remove a cell, returning it.
    pub fn remove_cell(&mut self, row: u32, col: u32) -> Option<Cell> {
        self.cells.remove(&(row, col))
    }

    /// Cells in row-then-column order.
    pub fn cells(&self) -> impl Iterator<Item = (CellRef, &Cell)> {
        self.cells
            .iter()
            .map(|(&(row, col), cell)| (CellRef { row, col }, cell))
    }

    /// Cells of one row in column order.
    pub fn row_cells(&self, row: u32) -> impl Iterator<Item = (CellRef, &Cell)> {
        self.cells
            .range((row, 0)..=(row, u32::MAX))
            .map(|(&(row, col), cell)| (CellRef { row, col }, cell))
    }

    /// Mutable cells of one column.
    pub(crate) fn column_cells_mut(&mut self, col: u32) -> impl Iterator<Item = &mut Cell> {
        self.cells
            .iter_mut()
            .filter(move |((_, c), _)| *c == col)
            .map(|(_, cell)| cell)
    }

    /// Mutable cells of one row.
    pub(crate) fn row_cells_mut(&mut self, row: u32) -> impl Iterator<Item = &mut Cell> {
        self.cells
            .range_mut((row, 0)..=(row, u32::MAX))
            .map(|(_, cell)| cell)
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// The value at a position, `Empty` when no cell is stored.
    pub fn value(&self, row: u32, col: u32) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        self.cell(row, col).map_or(&EMPTY, |cell| &cell.value)
    }

    pub fn row_format(&self, row: u32) -> Option<&RowFormat> {
        self.rows.get(&row)
    }

    pub fn row_format_mut(&mut self, row: u32) -> &mut RowFormat {
        self.rows.entry(row).or_default()
    }

    pub(crate) fn set_row_format(&mut self, row: u32, format: RowFormat) {
        self.rows.insert(row, format);
    }

    /// Rows with a format, in order.
    pub fn rows(&self) -> impl Iterator<Item = (u32, &RowFormat)> {
        self.rows.iter().map(|(&row, format)| (row, format))
    }

    pub fn column_format(&self, col: u32) -> Option<&ColumnFormat> {
        self.columns.get(&col)
    }

    pub fn column_format_mut(&mut self, col: u32) -> &mut ColumnFormat {
        self.columns.entry(col).or_default()
    }

    pub(crate) fn set_column_format(&mut self, col: u32, format: ColumnFormat) {
        self.columns.insert(col, format);
    }

    /// Columns with a format, in order.
    pub fn columns(&self) -> impl Iterator<Item = (u32, &ColumnFormat)> {
        self.columns.iter().map(|(&col, format)| (col, format))
    }

    /// Style a cell at this position shows: its own, else the row's, else the column's.
    pub fn effective_style(&self, row: u32, col: u32) -> u32 {
        if let Some(cell) = self.cell(row, col) {
            return cell.style;
        }
        self.rows
            .get(&row)
            .and_then(|format| format.style)
            .or_else(|| self.columns.get(&col).and_then(|format| format.style))
            .unwrap_or(0)
    }

    /// Bounding box of cells holding a value; styled blanks do not count.
    /// `None` when no cell holds a value.
    pub fn dimension(&self) -> Option<Dimension> {
        let mut values = self
            .cells
            .iter()
            .filter(|(_, cell)| !cell.value.is_empty())
            .map(|(&(row, col), _)| (row, col));
        let (row, col) = values.next()?;
        let (first, last) = values.fold(
            (CellRef { row, col }, CellRef { row, col }),
            |(lo, hi), (row, col)| {
                (
                    CellRef {
                        row: lo.row.min(row),
                        col: lo.col.min(col),
                    },
                    CellRef {
                        row: hi.row.max(row),
                        col: hi.col.max(col),
                    },
                )
            },
        );
        Some(Dimension { first, last })
    }

    /// Every style index referenced by the model.
    pub fn style_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.cells
            .values()
            .map(|cell| cell.style)
            .chain(self.rows.values().filter_map(|format| format.style))
            .chain(self.columns.values().filter_map(|format| format.style))
    }
}
