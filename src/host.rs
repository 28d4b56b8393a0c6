use crate::cell::CellCoordinate;
use crate::error::{DigestError, Result};
use crate::ledger::SheetId;
use crate::range::CellRange;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_COLUMN_WIDTH: u32 = 100;
pub const DEFAULT_ROW_HEIGHT: u32 = 21;

/// Workbook-level facts shown in the digest header.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkbookInfo {
    pub url: String,
    /// IANA zone name, display only.
    pub timezone: String,
    /// Offset applied to the digest timestamp.
    pub utc_offset_seconds: i32,
}

impl Default for WorkbookInfo {
    fn default() -> Self {
        WorkbookInfo {
            url: String::new(),
            timezone: "UTC".to_string(),
            utc_offset_seconds: 0,
        }
    }
}

/// Display attributes of one cell.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellStyle {
    pub font_color: String,
    pub font_family: String,
    pub font_size: u32,
    pub font_weight: String,
    pub background: String,
    pub horizontal_alignment: String,
    pub vertical_alignment: String,
}

impl Default for CellStyle {
    fn default() -> Self {
        CellStyle {
            font_color: "#000000".to_string(),
            font_family: "Arial".to_string(),
            font_size: 10,
            font_weight: "normal".to_string(),
            background: "#ffffff".to_string(),
            horizontal_alignment: "left".to_string(),
            vertical_alignment: "bottom".to_string(),
        }
    }
}

/// Values and formatting of a rectangular region, rows outermost.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegionSnapshot {
    pub values: Vec<Vec<String>>,
    pub styles: Vec<Vec<CellStyle>>,
    pub column_widths: Vec<u32>,
    pub row_heights: Vec<u32>,
}

impl RegionSnapshot {
    /// Fail unless every grid matches the region's dimensions.
    pub fn check_shape(&self, region: &CellRange) -> Result<()> {
        let width = region.width() as usize;
        let height = region.height() as usize;

        let grids_ok = self.values.len() == height
            && self.styles.len() == height
            && self.values.iter().all(|row| row.len() == width)
            && self.styles.iter().all(|row| row.len() == width);
        if !grids_ok || self.column_widths.len() != width || self.row_heights.len() != height {
            return Err(DigestError::Host(format!(
                "snapshot for {} does not match its {}x{} shape",
                region, height, width
            )));
        }
        Ok(())
    }
}

/// The spreadsheet application the digest reads from.
pub trait SheetHost {
    fn sheet_name(&self, sheet: SheetId) -> Result<String>;

    fn workbook(&self) -> WorkbookInfo;

    /// Rightmost column holding data; used when only whole rows are marked.
    fn last_column(&self, sheet: SheetId) -> Result<u32>;

    fn region(&self, sheet: SheetId, region: &CellRange) -> Result<RegionSnapshot>;
}

#[derive(Clone, Debug, Default)]
struct MemorySheet {
    name: String,
    cells: BTreeMap<CellCoordinate, (String, CellStyle)>,
    column_widths: BTreeMap<u32, u32>,
    row_heights: BTreeMap<u32, u32>,
}

/// A host backed by plain maps, for tests and offline rendering.
#[derive(Clone, Debug, Default)]
pub struct MemoryHost {
    workbook: WorkbookInfo,
    sheets: BTreeMap<SheetId, MemorySheet>,
}

impl MemoryHost {
    pub fn new(workbook: WorkbookInfo) -> Self {
        MemoryHost {
            workbook,
            sheets: BTreeMap::new(),
        }
    }

    pub fn add_sheet(&mut self, sheet: SheetId, name: &str) {
        self.sheets.entry(sheet).or_default().name = name.to_string();
    }

    pub fn set_value(&mut self, sheet: SheetId, cell: CellCoordinate, value: &str) {
        let entry = self.sheet_mut(sheet).cells.entry(cell).or_default();
        entry.0 = value.to_string();
    }

    pub fn set_style(&mut self, sheet: SheetId, cell: CellCoordinate, style: CellStyle) {
        let entry = self.sheet_mut(sheet).cells.entry(cell).or_default();
        entry.1 = style;
    }

    pub fn set_column_width(&mut self, sheet: SheetId, col: u32, width: u32) {
        self.sheet_mut(sheet).column_widths.insert(col, width);
    }

    pub fn set_row_height(&mut self, sheet: SheetId, row: u32, height: u32) {
        self.sheet_mut(sheet).row_heights.insert(row, height);
    }

    fn sheet_mut(&mut self, sheet: SheetId) -> &mut MemorySheet {
        self.sheets.entry(sheet).or_insert_with(|| MemorySheet {
            name: format!("Sheet{}", sheet),
            ..MemorySheet::default()
        })
    }

    fn sheet(&self, sheet: SheetId) -> Result<&MemorySheet> {
        self.sheets
            .get(&sheet)
            .ok_or_else(|| DigestError::Host(format!("no sheet with id {}", sheet)))
    }
}

impl SheetHost for MemoryHost {
    fn sheet_name(&self, sheet: SheetId) -> Result<String> {
        Ok(self.sheet(sheet)?.name.clone())
    }

    fn workbook(&self) -> WorkbookInfo {
        self.workbook.clone()
    }

    fn last_column(&self, sheet: SheetId) -> Result<u32> {
        Ok(self.sheet(sheet)?.cells.keys().map(|c| c.col).max().unwrap_or(1))
    }

    fn region(&self, sheet: SheetId, region: &CellRange) -> Result<RegionSnapshot> {
        let data = self.sheet(sheet)?;
        let mut snapshot = RegionSnapshot::default();

        for row in region.start.row..=region.end.row {
            let mut values = Vec::with_capacity(region.width() as usize);
            let mut styles = Vec::with_capacity(region.width() as usize);
            for col in region.start.col..=region.end.col {
                match data.cells.get(&CellCoordinate { row, col }) {
                    Some((value, style)) => {
                        values.push(value.clone());
                        styles.push(style.clone());
                    }
                    None => {
                        values.push(String::new());
                        styles.push(CellStyle::default());
                    }
                }
            }
            snapshot.values.push(values);
            snapshot.styles.push(styles);
            snapshot.row_heights.push(
                data.row_heights
                    .get(&row)
                    .copied()
                    .unwrap_or(DEFAULT_ROW_HEIGHT),
            );
        }

        snapshot.column_widths = (region.start.col..=region.end.col)
            .map(|col| {
                data.column_widths
                    .get(&col)
                    .copied()
                    .unwrap_or(DEFAULT_COLUMN_WIDTH)
            })
            .collect();

        Ok(snapshot)
    }
}

impl<H: SheetHost + ?Sized> SheetHost for &H {
    fn sheet_name(&self, sheet: SheetId) -> Result<String> {
        (**self).sheet_name(sheet)
    }

    fn workbook(&self) -> WorkbookInfo {
        (**self).workbook()
    }

    fn last_column(&self, sheet: SheetId) -> Result<u32> {
        (**self).last_column(sheet)
    }

    fn region(&self, sheet: SheetId, region: &CellRange) -> Result<RegionSnapshot> {
        (**self).region(sheet, region)
    }
}
