//! Cell values and cell references.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of rows in a worksheet.
pub const MAX_ROWS: u32 = 1_048_576;

/// Number of columns in a worksheet.
pub const MAX_COLUMNS: u32 = 16_384;

/// A formula with its last calculated result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formula {
    /// Formula text without the leading `=`; empty for shared-formula followers
    pub expression: String,

    /// Attributes of the `<f>` element (`t`, `ref`, `si`, ...)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attrs: Vec<(String, String)>,

    /// Cached result written by the last application that calculated the workbook
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<Box<CellValue>>,
}

impl Formula {
    /// Create a formula with no cached result.
    pub fn new(expression: impl Into<String>) -> Self {
        let expression = expression.into();
        let expression = expression
            .strip_prefix('=')
            .map(str::to_string)
            .unwrap_or(expression);
        Self {
            expression,
            attrs: Vec::new(),
            cached: None,
        }
    }
}

/// The value stored in a cell.
///
/// Dates have no storage type of their own: they are [`CellValue::Number`] serials whose
/// meaning comes from the cell's number format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Boolean(bool),
    /// Error literal such as `#DIV/0!`
    Error(String),
    Formula(Formula),
}

impl CellValue {
    /// Check if the value is empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// The numeric value, looking through a formula's cached result.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Formula(f) => f.cached.as_deref().and_then(CellValue::as_number),
            _ => None,
        }
    }

    /// The text value, looking through a formula's cached result.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            CellValue::Formula(f) => f.cached.as_deref().and_then(CellValue::as_text),
            _ => None,
        }
    }

    /// The boolean value, looking through a formula's cached result.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Boolean(b) => Some(*b),
            CellValue::Formula(f) => f.cached.as_deref().and_then(CellValue::as_bool),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Boolean(true) => f.write_str("TRUE"),
            CellValue::Boolean(false) => f.write_str("FALSE"),
            CellValue::Error(e) => f.write_str(e),
            CellValue::Formula(formula) => write!(f, "={}", formula.expression),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i32> for CellValue {
    fn from(value: i32) -> Self {
        CellValue::Number(f64::from(value))
    }
}

impl From<u32> for CellValue {
    fn from(value: u32) -> Self {
        CellValue::Number(f64::from(value))
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Boolean(value)
    }
}

impl From<Formula> for CellValue {
    fn from(value: Formula) -> Self {
        CellValue::Formula(value)
    }
}

/// A cell: value plus an index into the workbook style table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub value: CellValue,

    /// Index into the composite cell-format records (`cellXfs`)
    #[serde(default, skip_serializing_if = "is_default_style")]
    pub style: u32,
}

fn is_default_style(style: &u32) -> bool {
    *style == 0
}

impl Cell {
    /// Create a cell with the default style.
    pub fn new(value: impl Into<CellValue>) -> Self {
        Self {
            value: value.into(),
            style: 0,
        }
    }

    /// Create a cell with a style index.
    pub fn styled(value: impl Into<CellValue>, style: u32) -> Self {
        Self {
            value: value.into(),
            style,
        }
    }
}

/// A 1-based (row, column) cell position, written as `B7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    /// Create a reference, checking sheet bounds.
    pub fn new(row: u32, col: u32) -> Result<Self> {
        if row == 0 || row > MAX_ROWS || col == 0 || col > MAX_COLUMNS {
            return Err(Error::InvalidCellReference(format!("R{row}C{col}")));
        }
        Ok(Self { row, col })
    }

    /// Parse an A1-style reference; `$` anchors are accepted and ignored.
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = || Error::InvalidCellReference(text.to_string());
        let cleaned: String = text.trim().chars().filter(|c| *c != '$').collect();
        let split = cleaned
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(invalid)?;
        let (letters, digits) = cleaned.split_at(split);
        let col = column_index(letters).ok_or_else(invalid)?;
        let row: u32 = digits.parse().map_err(|_| invalid())?;
        Self::new(row, col).map_err(|_| invalid())
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_name(self.col), self.row)
    }
}

/// Column letters for a 1-based column index (`1` -> `A`, `28` -> `AB`).
pub fn column_name(mut col: u32) -> String {
    let mut letters = Vec::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        letters.push(b'A' + rem as u8);
        col = (col - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// 1-based column index for column letters, case-insensitive.
pub fn column_index(letters: &str) -> Option<u32> {
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    let mut col: u32 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        col = col * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    (col <= MAX_COLUMNS).then_some(col)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_names() {
        assert_eq!(column_name(1), "A");
        assert_eq!(column_name(26), "Z");
        assert_eq!(column_name(27), "AA");
        assert_eq!(column_name(MAX_COLUMNS), "XFD");
        assert_eq!(column_index("xfd"), Some(MAX_COLUMNS));
        assert_eq!(column_index("XFE"), None);
        assert_eq!(column_index("A1"), None);
    }

    #[test]
    fn test_cell_ref_parse() {
        assert_eq!(CellRef::parse("B7").unwrap(), CellRef { row: 7, col: 2 });
        assert_eq!(CellRef::parse("$AA$10").unwrap(), CellRef { row: 10, col: 27 });
        assert_eq!(CellRef::parse("C3").unwrap().to_string(), "C3");
        assert!(CellRef::parse("7B").is_err());
        assert!(CellRef::parse("A0").is_err());
        assert!(CellRef::parse("A1048577").is_err());
        assert!(CellRef::parse("").is_err());
    }

    #[test]
    fn test_value_accessors() {
        let formula = CellValue::Formula(Formula {
            cached: Some(Box::new(CellValue::Number(3.0))),
            ..Formula::new("=SUM(A1:A2)")
        });
        assert_eq!(formula.as_number(), Some(3.0));
        assert_eq!(formula.to_string(), "=SUM(A1:A2)");
        assert_eq!(CellValue::from(true).to_string(), "TRUE");
        assert_eq!(CellValue::from("Apple").as_text(), Some("Apple"));
        assert!(CellValue::default().is_empty());
    }

    #[test]
    fn test_value_json_shape() {
        let json = serde_json::to_string(&CellValue::Number(1.5)).unwrap();
        assert_eq!(json, r#"{"type":"number","value":1.5}"#);
        let json = serde_json::to_string(&Cell::new("x")).unwrap();
        assert_eq!(json, r#"{"value":{"type":"text","value":"x"}}"#);
    }
}
