use crate::cell::{CellCoordinate, parse_reference, row_to_index};
use crate::error::{DigestError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Largest rectangle, in cells, a single specifier may cover.
///
/// Every recorded cell is expanded during summarizing, so a whole-sheet
/// selection would never finish rendering and would stay pending forever.
pub const MAX_RANGE_CELLS: u64 = 250_000;

/// An inclusive rectangle of cells.
///
/// Always normalized so that `start.row <= end.row` and `start.col <= end.col`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellRange {
    pub start: CellCoordinate,
    pub end: CellCoordinate,
}

impl CellRange {
    /// Construct a range from two corners in any order.
    pub fn new(a: CellCoordinate, b: CellCoordinate) -> Self {
        CellRange {
            start: CellCoordinate {
                row: a.row.min(b.row),
                col: a.col.min(b.col),
            },
            end: CellCoordinate {
                row: a.row.max(b.row),
                col: a.col.max(b.col),
            },
        }
    }

    pub fn contains(&self, cell: &CellCoordinate) -> bool {
        cell.row >= self.start.row
            && cell.row <= self.end.row
            && cell.col >= self.start.col
            && cell.col <= self.end.col
    }

    pub fn width(&self) -> u32 {
        self.end.col - self.start.col + 1
    }

    pub fn height(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    /// Number of cells covered.
    pub fn area(&self) -> u64 {
        u64::from(self.width()) * u64::from(self.height())
    }

    /// Iterate every cell, row-major.
    pub fn cells(&self) -> impl Iterator<Item = CellCoordinate> + '_ {
        (self.start.row..=self.end.row).flat_map(move |row| {
            (self.start.col..=self.end.col).map(move |col| CellCoordinate { row, col })
        })
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

/// A validated change specifier as recorded by an edit event.
///
/// `Row` is the permissive fallback for a bare numeric token: it marks the row
/// as changed without naming any column.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RangeSpecifier {
    Cell(CellCoordinate),
    Range(CellRange),
    Row(u32),
}

impl RangeSpecifier {
    /// Parse a raw specifier (`"E4"`, `"$E$4"`, `"A2:C3"` or `"7"`).
    ///
    /// Ranges larger than [`MAX_RANGE_CELLS`] are rejected.
    pub fn parse(spec: &str) -> Result<Self> {
        if let Some((a, b)) = spec.split_once(':') {
            let range = CellRange::new(parse_reference(a)?, parse_reference(b)?);
            if range.area() > MAX_RANGE_CELLS {
                return Err(DigestError::InvalidArgument(format!(
                    "range {} covers {} cells, more than the {} allowed",
                    range,
                    range.area(),
                    MAX_RANGE_CELLS
                )));
            }
            return Ok(RangeSpecifier::Range(range));
        }

        if !spec.is_empty() && spec.chars().all(|c| c.is_ascii_digit()) {
            let row = row_to_index(spec)?;
            if row < 1 {
                return Err(DigestError::InvalidArgument(format!(
                    "row marker must be at least 1, got '{}'",
                    spec
                )));
            }
            return Ok(RangeSpecifier::Row(row));
        }

        parse_reference(spec).map(RangeSpecifier::Cell)
    }
}

impl fmt::Display for RangeSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeSpecifier::Cell(cell) => write!(f, "{}", cell),
            RangeSpecifier::Range(range) => write!(f, "{}", range),
            RangeSpecifier::Row(row) => write!(f, "{}", row),
        }
    }
}

impl FromStr for RangeSpecifier {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self> {
        RangeSpecifier::parse(s)
    }
}

impl TryFrom<String> for RangeSpecifier {
    type Error = DigestError;

    fn try_from(value: String) -> Result<Self> {
        RangeSpecifier::parse(&value)
    }
}

impl From<RangeSpecifier> for String {
    fn from(spec: RangeSpecifier) -> Self {
        spec.to_string()
    }
}

/// Cells and rows covered by one or more specifiers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NormalizedRange {
    pub cells: BTreeSet<CellCoordinate>,
    pub rows: BTreeSet<u32>,
}

impl NormalizedRange {
    /// Union another normalization into this one.
    pub fn merge(&mut self, other: NormalizedRange) {
        self.cells.extend(other.cells);
        self.rows.extend(other.rows);
    }

    /// The cells as A1 strings, deduplicated and sorted lexicographically.
    pub fn references(&self) -> Vec<String> {
        let mut refs: Vec<String> = self.cells.iter().map(|c| c.to_string()).collect();
        refs.sort();
        refs
    }

    /// Largest column touched by any cell, if there is one.
    pub fn rightmost_column(&self) -> Option<u32> {
        self.cells.iter().map(|c| c.col).max()
    }
}

/// Expand a specifier into every cell it covers and every row it spans
///
/// # Examples
/// ```
/// use sheet_digest::range::{RangeSpecifier, normalize_range};
///
/// let spec = RangeSpecifier::parse("A2:C3").unwrap();
/// let normalized = normalize_range(&spec);
/// assert_eq!(normalized.cells.len(), 6);
/// assert_eq!(normalized.rows.iter().copied().collect::<Vec<_>>(), vec![2, 3]);
/// ```
pub fn normalize_range(spec: &RangeSpecifier) -> NormalizedRange {
    let mut normalized = NormalizedRange::default();
    match spec {
        RangeSpecifier::Cell(cell) => {
            normalized.cells.insert(*cell);
            normalized.rows.insert(cell.row);
        }
        RangeSpecifier::Range(range) => {
            normalized.cells.extend(range.cells());
            normalized.rows.extend(range.start.row..=range.end.row);
        }
        RangeSpecifier::Row(row) => {
            normalized.rows.insert(*row);
        }
    }
    normalized
}

/// Parse then normalize a raw specifier.
pub fn normalize_str(spec: &str) -> Result<NormalizedRange> {
    Ok(normalize_range(&RangeSpecifier::parse(spec)?))
}

/// An inclusive run of consecutive rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowSpan {
    pub start: u32,
    pub end: u32,
}

impl RowSpan {
    pub fn new(start: u32, end: u32) -> Self {
        RowSpan { start, end }
    }

    pub fn contains(&self, row: u32) -> bool {
        row >= self.start && row <= self.end
    }

    /// The region from column A to `right_col` covering these rows.
    pub fn region(&self, right_col: u32) -> CellRange {
        CellRange::new(
            CellCoordinate { row: self.start, col: 1 },
            CellCoordinate {
                row: self.end,
                col: right_col.max(1),
            },
        )
    }
}

/// Collapse ascending, distinct row numbers into contiguous spans
///
/// Rows that differ by exactly one share a span.
///
/// # Examples
/// ```
/// use sheet_digest::range::{RowSpan, compress_rows};
///
/// assert_eq!(
///     compress_rows([1, 2, 3, 4, 8]),
///     vec![RowSpan::new(1, 4), RowSpan::new(8, 8)]
/// );
/// ```
pub fn compress_rows<I>(rows: I) -> Vec<RowSpan>
where
    I: IntoIterator<Item = u32>,
{
    let mut spans: Vec<RowSpan> = Vec::new();
    for row in rows {
        match spans.last_mut() {
            Some(current) if current.end.checked_add(1) == Some(row) => current.end = row,
            Some(current) => {
                debug_assert!(row > current.end, "rows must be sorted and distinct");
                spans.push(RowSpan::new(row, row));
            }
            None => spans.push(RowSpan::new(row, row)),
        }
    }
    spans
}
