//! Handle for reading and editing one loaded worksheet.

use super::styles::StyleTable;
use crate::error::{Error, Result};
use crate::model::{
    Border, Cell, CellRef, CellValue, DateSystem, Dimension, Fill, Font, ResolvedFormat,
    StyleChange, WorksheetModel, MAX_COLUMNS, MAX_ROWS,
};
use chrono::NaiveDateTime;

/// A loaded worksheet together with the workbook style table.
///
/// Returned by [`Workbook::sheet`](super::Workbook::sheet). Rows and columns are 1-based.
/// Style edits never modify an existing composite record: each one registers (or reuses) a
/// record that differs in the changed component only.
#[derive(Debug)]
pub struct Sheet<'a> {
    name: String,
    model: &'a mut WorksheetModel,
    styles: &'a mut StyleTable,
    date_system: DateSystem,
}

impl<'a> Sheet<'a> {
    pub(crate) fn new(
        name: String,
        model: &'a mut WorksheetModel,
        styles: &'a mut StyleTable,
        date_system: DateSystem,
    ) -> Self {
        Self {
            name,
            model,
            styles,
            date_system,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The underlying model.
    pub fn model(&self) -> &WorksheetModel {
        &*self.model
    }

    /// Value of a cell; `Empty` when the cell does not exist.
    pub fn value(&self, row: u32, col: u32) -> &CellValue {
        self.model.value(row, col)
    }

    /// Value of a cell by A1 reference.
    pub fn value_at(&self, reference: &str) -> Result<&CellValue> {
        let cell = CellRef::parse(reference)?;
        Ok(self.model.value(cell.row, cell.col))
    }

    pub fn cells(&self) -> impl Iterator<Item = (CellRef, &Cell)> {
        self.model.cells()
    }

    pub fn cell_count(&self) -> usize {
        self.model.cell_count()
    }

    pub fn dimension(&self) -> Option<Dimension> {
        self.model.dimension()
    }

    /// Set a cell value.
    ///
    /// An existing cell keeps its style. A new cell takes the style it would display with
    /// (row, then column), so typing into a formatted column keeps the column's look.
    pub fn set_value(&mut self, row: u32, col: u32, value: impl Into<CellValue>) -> Result<()> {
        CellRef::new(row, col)?;
        let value = value.into();
        if let Some(cell) = self.model.cell_mut(row, col) {
            cell.value = value;
            return Ok(());
        }
        if value.is_empty() {
            return Ok(());
        }
        let style = self.model.effective_style(row, col);
        self.model.set_cell(row, col, Cell::styled(value, style));
        Ok(())
    }

    /// Set a cell value by A1 reference.
    pub fn set_value_at(&mut self, reference: &str, value: impl Into<CellValue>) -> Result<()> {
        let cell = CellRef::parse(reference)?;
        self.set_value(cell.row, cell.col, value)
    }

    /// Clear a cell's value. A cell with a non-default style stays as a formatted blank.
    pub fn clear(&mut self, row: u32, col: u32) {
        let keep_style = self.model.cell(row, col).is_some_and(|cell| cell.style != 0);
        if keep_style {
            if let Some(cell) = self.model.cell_mut(row, col) {
                cell.value = CellValue::Empty;
            }
        } else {
            self.model.remove_cell(row, col);
        }
    }

    /// The cell as a date, if it holds a number and is formatted as a date.
    pub fn date(&self, row: u32, col: u32) -> Option<NaiveDateTime> {
        let cell = self.model.cell(row, col)?;
        if !self.styles.is_date_style(cell.style) {
            return None;
        }
        self.date_system.from_serial(cell.value.as_number()?)
    }

    /// Store a date as a serial number and make sure the cell has a date format.
    pub fn set_date(&mut self, row: u32, col: u32, value: NaiveDateTime) -> Result<()> {
        CellRef::new(row, col)?;
        let serial = self
            .date_system
            .to_serial(value)
            .filter(|serial| *serial >= 0.0)
            .ok_or_else(|| Error::InvalidDate(value.to_string()))?;
        let style = self
            .styles
            .with_date_format(self.model.effective_style(row, col))?;
        self.model.set_cell(row, col, Cell::styled(serial, style));
        Ok(())
    }

    /// Style index the cell displays with.
    pub fn cell_style_index(&self, row: u32, col: u32) -> u32 {
        self.model.effective_style(row, col)
    }

    /// Resolved formatting of a cell.
    pub fn cell_format(&self, row: u32, col: u32) -> Result<ResolvedFormat> {
        let index = self.model.effective_style(row, col);
        self.styles
            .resolve(index)
            .ok_or(Error::InvalidStyleIndex(index))
    }

    /// Resolved formatting of a column, if the column has a style.
    pub fn column_format(&self, col: u32) -> Option<ResolvedFormat> {
        let index = self.model.column_format(col)?.style?;
        self.styles.resolve(index)
    }

    pub fn column_width(&self, col: u32) -> Option<f64> {
        self.model.column_format(col)?.width
    }

    /// Change one style component of a cell. Returns the new style index.
    pub fn apply_cell_style(&mut self, row: u32, col: u32, change: &StyleChange) -> Result<u32> {
        CellRef::new(row, col)?;
        let base = self.model.effective_style(row, col);
        let style = self.styles.derive(base, change)?;
        match self.model.cell_mut(row, col) {
            Some(cell) => cell.style = style,
            None => self
                .model
                .set_cell(row, col, Cell::styled(CellValue::Empty, style)),
        }
        Ok(style)
    }

    /// Change one style component of a column and of every stored cell in it.
    ///
    /// Each cell is derived from its own style, so components the cell set itself survive.
    pub fn apply_column_style(&mut self, col: u32, change: &StyleChange) -> Result<u32> {
        check_column(col)?;
        let base = self
            .model
            .column_format(col)
            .and_then(|format| format.style)
            .unwrap_or(0);
        let style = self.styles.derive(base, change)?;
        self.model.column_format_mut(col).style = Some(style);

        let styles = &mut *self.styles;
        for cell in self.model.column_cells_mut(col) {
            cell.style = styles.derive(cell.style, change)?;
        }
        Ok(style)
    }

    /// Change one style component of a row and of every stored cell in it.
    pub fn apply_row_style(&mut self, row: u32, change: &StyleChange) -> Result<u32> {
        if row == 0 || row > MAX_ROWS {
            return Err(Error::InvalidCellReference(format!("row {row}")));
        }
        let base = self
            .model
            .row_format(row)
            .and_then(|format| format.style)
            .unwrap_or(0);
        let style = self.styles.derive(base, change)?;
        self.model.row_format_mut(row).style = Some(style);

        let styles = &mut *self.styles;
        for cell in self.model.row_cells_mut(row) {
            cell.style = styles.derive(cell.style, change)?;
        }
        Ok(style)
    }

    pub fn set_number_format(&mut self, row: u32, col: u32, code: &str) -> Result<u32> {
        self.apply_cell_style(row, col, &StyleChange::NumberFormat(code.to_string()))
    }

    pub fn set_fill(&mut self, row: u32, col: u32, fill: Fill) -> Result<u32> {
        self.apply_cell_style(row, col, &StyleChange::Fill(fill))
    }

    pub fn set_font(&mut self, row: u32, col: u32, font: Font) -> Result<u32> {
        self.apply_cell_style(row, col, &StyleChange::Font(font))
    }

    pub fn set_border(&mut self, row: u32, col: u32, border: Border) -> Result<u32> {
        self.apply_cell_style(row, col, &StyleChange::Border(border))
    }

    pub fn set_column_fill(&mut self, col: u32, fill: Fill) -> Result<u32> {
        self.apply_column_style(col, &StyleChange::Fill(fill))
    }

    pub fn set_column_number_format(&mut self, col: u32, code: &str) -> Result<u32> {
        self.apply_column_style(col, &StyleChange::NumberFormat(code.to_string()))
    }

    /// Set a column's width in characters.
    pub fn set_column_width(&mut self, col: u32, width: f64) -> Result<()> {
        check_column(col)?;
        if !(width.is_finite() && (0.0..=255.0).contains(&width)) {
            return Err(Error::InvalidCellReference(format!("column width {width}")));
        }
        let format = self.model.column_format_mut(col);
        format.width = Some(width);
        format.set_attr("customWidth", "1");
        Ok(())
    }
}

fn check_column(col: u32) -> Result<()> {
    if col == 0 || col > MAX_COLUMNS {
        return Err(Error::InvalidCellReference(format!("column {col}")));
    }
    Ok(())
}
