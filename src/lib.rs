//! # xlpack
//!
//! Lazy-loading XLSX package engine that writes untouched worksheets back byte for byte.
//!
//! Opening a workbook reads the package, the sheet directory, the style table and the shared
//! strings. A worksheet is parsed into an editable model only when it is first accessed. On
//! save, sheets that were never accessed are copied verbatim; accessed sheets are serialized
//! from their model. The style table and the shared string table only ever grow, so the
//! indices stored in untouched sheets keep pointing at the same records.
//!
//! ## Quick Start
//!
//! ```no_run
//! use xlpack::Workbook;
//!
//! let mut workbook = xlpack::open("report.xlsx")?;
//! println!("Sheets: {:?}", workbook.sheet_names());
//!
//! // Only this sheet is parsed; the others pass through on save.
//! let mut sheet = workbook.sheet("Summary")?;
//! sheet.set_value_at("A1", "Total")?;
//! sheet.set_number_format(1, 2, "0.00")?;
//!
//! workbook.save_as("report-edited.xlsx")?;
//! # Ok::<(), xlpack::Error>(())
//! ```
//!
//! ## Creating a Workbook
//!
//! ```no_run
//! use xlpack::Workbook;
//! use xlpack::model::{Color, Fill};
//!
//! let mut workbook = Workbook::new();
//! let mut sheet = workbook.add_worksheet("Data")?;
//! sheet.set_column_fill(1, Fill::solid(Color::rgb(255, 0, 0)))?;
//! sheet.set_value(1, 1, 42.0)?;
//! workbook.save_as("new.xlsx")?;
//! # Ok::<(), xlpack::Error>(())
//! ```
//!
//! ## Features
//!
//! - `async`: `Workbook::open_async` and `Workbook::save_as_async` with Tokio

pub mod container;
pub mod content_types;
pub mod detect;
pub mod error;
pub mod model;
pub mod options;
pub mod parts;
pub mod xlsx;

mod xml;

// Re-exports
pub use container::{Relationship, Relationships};
pub use detect::FormatType;
pub use error::{Error, Result};
pub use model::{Cell, CellRef, CellValue, DateSystem, Formula, WorksheetModel};
pub use options::{Compression, OpenOptions, SaveOptions};
pub use parts::PartStore;
pub use xlsx::{Sheet, SheetKind, Workbook, WorkbookSummary, WorksheetEntry};

use std::path::Path;

/// Open a workbook file with default options.
///
/// # Example
///
/// ```no_run
/// let workbook = xlpack::open("data.xlsx")?;
/// println!("{} sheets", workbook.worksheet_count());
/// # Ok::<(), xlpack::Error>(())
/// ```
pub fn open(path: impl AsRef<Path>) -> Result<Workbook> {
    Workbook::open(path)
}

/// Summarize a workbook file without loading any worksheet.
///
/// # Example
///
/// ```no_run
/// let summary = xlpack::inspect("data.xlsx")?;
/// for sheet in &summary.sheets {
///     println!("{} -> {}", sheet.name, sheet.part);
/// }
/// # Ok::<(), xlpack::Error>(())
/// ```
pub fn inspect(path: impl AsRef<Path>) -> Result<WorkbookSummary> {
    Ok(Workbook::open(path)?.summary())
}

/// Rewrite a workbook file without touching any worksheet.
///
/// Every part is copied as it was, except that the style part is normalized when it lacked
/// default records.
pub fn resave(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<()> {
    Workbook::open(input)?.save_as(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_workbook_round_trip() {
        let mut workbook = Workbook::new();
        workbook.add_worksheet("Sheet1").unwrap().set_value(1, 1, 7.0).unwrap();
        let bytes = workbook.to_bytes().unwrap();

        let mut reopened = Workbook::from_bytes(&bytes).unwrap();
        assert_eq!(reopened.format(), FormatType::Xlsx);
        assert_eq!(reopened.sheet_names(), vec!["Sheet1"]);
        assert_eq!(reopened.loaded_count(), 0);
        assert_eq!(
            reopened.sheet("sheet1").unwrap().value(1, 1).as_number(),
            Some(7.0)
        );
    }

    #[test]
    fn test_summary_serializes() {
        let mut workbook = Workbook::new();
        workbook.add_worksheet("Data").unwrap();
        let json = serde_json::to_value(workbook.summary()).unwrap();
        assert_eq!(json["date_system"], "excel1900");
        assert_eq!(json["sheets"][0]["name"], "Data");
        assert_eq!(json["sheets"][0]["kind"], "worksheet");
        assert_eq!(json["sheets"][0]["loaded"], true);
    }

    #[test]
    fn test_open_missing_file() {
        assert!(matches!(open("does-not-exist.xlsx"), Err(Error::Io(_))));
    }
}
