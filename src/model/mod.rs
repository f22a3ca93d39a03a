//! In-memory model types for workbook content.
//!
//! These structures are format-level but parser-independent: the `xlsx` module fills them
//! from package parts and writes them back.

mod cell;
mod date;
mod style;
mod worksheet;

pub use cell::*;
pub use date::*;
pub use style::*;
pub use worksheet::*;
