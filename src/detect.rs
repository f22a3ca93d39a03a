//! Format detection for spreadsheet packages.

use crate::container::decode_xml_bytes;
use crate::content_types::ContentTypes;
use crate::error::{Error, Result};
use crate::parts::PartStore;
use serde::Serialize;

/// ZIP file magic bytes: PK\x03\x04
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// OLE compound file magic, used by legacy .xls and by encrypted OOXML.
const OLE_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Workbook part content types by format.
const MAIN_CONTENT_TYPES: [(&str, FormatType); 4] = [
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml",
        FormatType::Xlsx,
    ),
    (
        "application/vnd.ms-excel.sheet.macroEnabled.main+xml",
        FormatType::Xlsm,
    ),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.template.main+xml",
        FormatType::Xltx,
    ),
    (
        "application/vnd.ms-excel.template.macroEnabled.main+xml",
        FormatType::Xltm,
    ),
];

/// Detected spreadsheet package flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatType {
    /// Workbook (.xlsx)
    Xlsx,
    /// Macro-enabled workbook (.xlsm)
    Xlsm,
    /// Template (.xltx)
    Xltx,
    /// Macro-enabled template (.xltm)
    Xltm,
}

impl FormatType {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            FormatType::Xlsx => "xlsx",
            FormatType::Xlsm => "xlsm",
            FormatType::Xltx => "xltx",
            FormatType::Xltm => "xltm",
        }
    }

    /// Returns a human-readable name for this format.
    pub fn name(&self) -> &'static str {
        match self {
            FormatType::Xlsx => "Excel Workbook",
            FormatType::Xlsm => "Excel Macro-Enabled Workbook",
            FormatType::Xltx => "Excel Template",
            FormatType::Xltm => "Excel Macro-Enabled Template",
        }
    }
}

impl std::fmt::Display for FormatType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Reject inputs that are not ZIP packages, with a specific error where possible.
pub fn check_container_magic(data: &[u8]) -> Result<()> {
    if data.len() >= 4 && data[..4] == ZIP_MAGIC {
        return Ok(());
    }
    if data.len() >= 8 && data[..8] == OLE_MAGIC {
        // Encrypted OOXML is an OLE file holding an "EncryptedPackage" stream.
        let marker: Vec<u8> = "EncryptedPackage"
            .encode_utf16()
            .flat_map(|unit| unit.to_le_bytes())
            .collect();
        if data.windows(marker.len()).any(|window| window == marker.as_slice()) {
            return Err(Error::Encrypted);
        }
        return Err(Error::UnsupportedFormat(
            "legacy binary workbook (.xls)".to_string(),
        ));
    }
    Err(Error::UnknownFormat)
}

/// Detect the spreadsheet flavor from the workbook part's content type.
pub fn detect_format_from_parts(parts: &PartStore, workbook_part: &str) -> Result<FormatType> {
    let bytes = parts
        .get("[Content_Types].xml")
        .ok_or_else(|| Error::MissingComponent("[Content_Types].xml".to_string()))?;
    let types = ContentTypes::parse(&decode_xml_bytes(bytes)?)?;

    match types.override_for(workbook_part) {
        Some(ct) => MAIN_CONTENT_TYPES
            .iter()
            .find(|(main, _)| *main == ct)
            .map(|(_, format)| *format)
            .ok_or_else(|| Error::UnsupportedFormat(ct.to_string())),
        None => Ok(FormatType::Xlsx),
    }
}
