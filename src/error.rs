//! Error types for the xlpack library.

use std::io;
use thiserror::Error;

/// Result type alias for xlpack operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while opening, editing or saving a package.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The input is not a ZIP-based Office package.
    #[error("Unknown file format")]
    UnknownFormat,

    /// The package is an Office document, but not a spreadsheet.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The document is encrypted and cannot be processed.
    #[error("Document is encrypted")]
    Encrypted,

    /// Error reading or writing the ZIP archive.
    #[error("ZIP archive error: {0}")]
    ZipArchive(String),

    /// Error parsing or writing XML content.
    #[error("XML parse error: {0}")]
    XmlParse(String),

    /// A required package part is missing.
    #[error("Missing component: {0}")]
    MissingComponent(String),

    /// A sheet is declared in the workbook but its data part is absent.
    #[error("Worksheet '{sheet}' has no data part at '{part}'")]
    MissingWorksheetPart { sheet: String, part: String },

    /// The shared style part is structurally invalid.
    #[error("Malformed styles: {0}")]
    MalformedStyles(String),

    /// A worksheet part could not be parsed when it was first accessed.
    #[error("Malformed worksheet '{part}': {reason}")]
    MalformedWorksheet { part: String, reason: String },

    /// A sheet with the same name (ignoring case) already exists.
    #[error("Duplicate sheet name: {0}")]
    DuplicateSheetName(String),

    /// The sheet name is empty, too long, or uses reserved characters.
    #[error("Invalid sheet name: {0:?}")]
    InvalidSheetName(String),

    /// No sheet with this name exists in the workbook.
    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    /// A cell reference such as `B7` could not be parsed.
    #[error("Invalid cell reference: {0:?}")]
    InvalidCellReference(String),

    /// The directory entry is a chart or dialog sheet, which has no cell model.
    #[error("'{0}' is not a worksheet")]
    NotAWorksheet(String),

    /// A date falls before the start of the workbook's date system.
    #[error("Date {0} cannot be stored in this workbook")]
    InvalidDate(String),

    /// A style index does not exist in the style table.
    #[error("Style index {0} is out of range")]
    InvalidStyleIndex(u32),

    /// A part inflates beyond the configured limit.
    #[error("Part '{part}' exceeds the {limit} byte limit")]
    PartTooLarge { part: String, limit: u64 },

    /// `save` was called on a workbook that was not opened from a file.
    #[error("No target path; use save_as")]
    NoTargetPath,
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::ZipArchive(err.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::XmlParse(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::XmlParse(err.to_string())
    }
}

impl From<tempfile::PersistError> for Error {
    fn from(err: tempfile::PersistError) -> Self {
        Error::Io(err.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnknownFormat;
        assert_eq!(err.to_string(), "Unknown file format");

        let err = Error::MissingWorksheetPart {
            sheet: "Data".to_string(),
            part: "xl/worksheets/sheet2.xml".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Worksheet 'Data' has no data part at 'xl/worksheets/sheet2.xml'"
        );

        let err = Error::DuplicateSheetName("t1".to_string());
        assert_eq!(err.to_string(), "Duplicate sheet name: t1");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
