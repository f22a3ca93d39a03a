//! XLSX workbook engine.
//!
//! A [`Workbook`] reads the package directory, the style table and the shared strings at
//! open, and parses each worksheet the first time it is accessed. Saving writes the parts of
//! untouched sheets byte for byte.
//!
//! # Example
//!
//! ```no_run
//! use xlpack::xlsx::Workbook;
//! use xlpack::model::{Color, Fill};
//!
//! let mut workbook = Workbook::open("ledger.xlsx")?;
//! let mut sheet = workbook.sheet("2024")?;
//! sheet.set_column_fill(2, Fill::solid(Color::rgb(0, 0, 255)))?;
//! sheet.set_value_at("B2", 120.5)?;
//! workbook.save()?;
//! # Ok::<(), xlpack::Error>(())
//! ```

mod entry;
mod shared_strings;
mod sheet;
mod styles;
mod workbook;
mod workbook_part;
mod worksheet;

pub use entry::{SheetKind, SheetState, WorksheetEntry};
pub use shared_strings::SharedStrings;
pub use sheet::Sheet;
pub use styles::{is_date_format_code, StyleTable, DEFAULT_DATE_NUM_FMT};
pub use workbook::{validate_sheet_name, SheetSummary, Workbook, WorkbookSummary, MAX_SHEET_NAME_LEN};
pub use workbook_part::{emit_workbook, parse_workbook, SheetDecl, WorkbookDirectory};
pub use worksheet::{emit_worksheet, parse_worksheet, ParseContext};
