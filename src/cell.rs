use crate::error::{DigestError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

lazy_static! {
    static ref CELL_REF_REGEX: Regex = Regex::new(r"^\$?([A-Z]+)\$?(\d+)$").unwrap();
}

/// A single cell position, 1-based on both axes.
///
/// Ordering is row-major: all cells of row 1 sort before any cell of row 2.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellCoordinate {
    pub row: u32,
    pub col: u32,
}

impl CellCoordinate {
    /// Builds a coordinate, rejecting row or column 0.
    pub fn new(row: u32, col: u32) -> Result<Self> {
        if row < 1 {
            return Err(DigestError::InvalidArgument(format!(
                "row must be at least 1, got {}",
                row
            )));
        }
        if col < 1 {
            return Err(DigestError::InvalidArgument(format!(
                "column must be at least 1, got {}",
                col
            )));
        }
        Ok(CellCoordinate { row, col })
    }

    /// Column letters of this cell ("A", "AB", ...).
    pub fn column_letters(&self) -> String {
        col_to_letter(self.col)
    }
}

impl fmt::Display for CellCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_reference(self.row as i64, self.col as i64))
    }
}

impl FromStr for CellCoordinate {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self> {
        parse_reference(s)
    }
}

// Infallible for col >= 1; callers guarantee that.
fn col_to_letter(col: u32) -> String {
    let mut col = col;
    let mut result = String::new();
    while col > 0 {
        col -= 1;
        result.push(((col % 26) as u8 + b'A') as char);
        col /= 26;
    }
    result.chars().rev().collect()
}

/// Convert column letters to a 1-based column index
///
/// The letters are read as a bijective base-26 numeral: A=1 ... Z=26, AA=27.
///
/// # Arguments
/// * `letters` - One or more uppercase ASCII letters
///
/// # Returns
/// * `Result<u32>` - The column index, or `InvalidFormat` for anything else
///
/// # Examples
/// ```
/// use sheet_digest::cell::column_to_index;
///
/// assert_eq!(column_to_index("A").unwrap(), 1);
/// assert_eq!(column_to_index("AA").unwrap(), 27);
/// assert!(column_to_index("a").is_err());
/// ```
pub fn column_to_index(letters: &str) -> Result<u32> {
    if letters.is_empty() {
        return Err(DigestError::InvalidFormat(
            "column letters cannot be empty".to_string(),
        ));
    }

    letters.chars().try_fold(0u32, |acc, c| {
        if !c.is_ascii_uppercase() {
            return Err(DigestError::InvalidFormat(format!(
                "invalid column letters '{}'",
                letters
            )));
        }
        let digit = c as u32 - 'A' as u32 + 1;
        acc.checked_mul(26)
            .and_then(|v| v.checked_add(digit))
            .ok_or_else(|| {
                DigestError::InvalidFormat(format!("column '{}' is out of range", letters))
            })
    })
}

/// Convert a 1-based column index to column letters
///
/// # Examples
/// ```
/// use sheet_digest::cell::index_to_column;
///
/// assert_eq!(index_to_column(26).unwrap(), "Z");
/// assert_eq!(index_to_column(703).unwrap(), "AAA");
/// assert!(index_to_column(0).is_err());
/// ```
pub fn index_to_column(index: u32) -> Result<String> {
    if index < 1 {
        return Err(DigestError::InvalidArgument(format!(
            "column index must be at least 1, got {}",
            index
        )));
    }
    Ok(col_to_letter(index))
}

/// Parse the numeric part of a reference.
pub fn row_to_index(text: &str) -> Result<u32> {
    text.parse::<u32>()
        .map_err(|_| DigestError::InvalidFormat(format!("invalid row '{}'", text)))
}

/// Parse an A1-style reference such as `B12` or `$B$12`
///
/// # Returns
/// * `InvalidFormat` if the text does not match `[$]LETTERS[$]DIGITS`
/// * `InvalidArgument` for row 0
///
/// # Examples
/// ```
/// use sheet_digest::cell::parse_reference;
///
/// let c = parse_reference("$AB$42").unwrap();
/// assert_eq!((c.row, c.col), (42, 28));
/// assert!(parse_reference("1A").is_err());
/// ```
pub fn parse_reference(reference: &str) -> Result<CellCoordinate> {
    let captures = CELL_REF_REGEX.captures(reference).ok_or_else(|| {
        DigestError::InvalidFormat(format!("'{}' is not a cell reference", reference))
    })?;

    let col = column_to_index(&captures[1])?;
    let row = row_to_index(&captures[2])?;
    CellCoordinate::new(row, col)
}

/// Format a row/column pair as an A1 reference.
///
/// Both axes clamp to 1, so offsets that run off the top or left edge of the
/// sheet land on row 1 / column A instead of producing an invalid reference.
pub fn format_reference(row: i64, col: i64) -> String {
    let row = row.clamp(1, u32::MAX as i64) as u32;
    let col = col.clamp(1, u32::MAX as i64) as u32;
    format!("{}{}", col_to_letter(col), row)
}
