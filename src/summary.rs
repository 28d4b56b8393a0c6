use crate::cell::CellCoordinate;
use crate::error::{DigestError, Result};
use crate::host::SheetHost;
use crate::ledger::{PendingChanges, SheetId};
use crate::range::{
    CellRange, NormalizedRange, RangeSpecifier, RowSpan, compress_rows, normalize_range,
};
use crate::render::Renderer;
use std::collections::{BTreeMap, BTreeSet};

/// One contiguous block of changed rows, rendered as a table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedBlock {
    pub sheet_id: SheetId,
    pub sheet_name: String,
    pub rows: RowSpan,
    /// Column A through the sheet's rightmost changed column.
    pub region: CellRange,
    pub highlighted: BTreeSet<CellCoordinate>,
    pub html: String,
}

/// Union every pending specifier per sheet.
pub fn merge_pending(pending: &PendingChanges) -> Result<BTreeMap<SheetId, NormalizedRange>> {
    let mut merged = BTreeMap::new();
    for (sheet, entries) in pending {
        let mut normalized = NormalizedRange::default();
        for entry in entries {
            normalized.merge(normalize_range(&RangeSpecifier::parse(entry)?));
        }
        if !normalized.rows.is_empty() {
            merged.insert(*sheet, normalized);
        }
    }
    Ok(merged)
}

/// Turns pending changes into highlighted table blocks.
pub struct SummaryBuilder<H: SheetHost> {
    host: H,
    renderer: Renderer,
}

impl<H: SheetHost> SummaryBuilder<H> {
    pub fn new(host: H) -> Result<Self> {
        Ok(SummaryBuilder {
            host,
            renderer: Renderer::new()?,
        })
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// Blocks for every sheet, sheets by ascending id and spans by ascending row.
    ///
    /// A sheet the host cannot serve (deleted since the edit, snapshot of the
    /// wrong shape) is logged and left out; the other sheets still render.
    /// Callers can tell which sheets made it from `RenderedBlock::sheet_id`.
    pub fn build(&self, pending: &PendingChanges) -> Result<Vec<RenderedBlock>> {
        let mut blocks = Vec::new();

        for (sheet, changes) in merge_pending(pending)? {
            match self.build_sheet(sheet, &changes) {
                Ok(sheet_blocks) => blocks.extend(sheet_blocks),
                Err(DigestError::Host(reason)) => {
                    log::warn!("skipping sheet {}: {}", sheet, reason);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(blocks)
    }

    /// Blocks for one sheet.
    ///
    /// The right edge of every block on a sheet is the rightmost column changed
    /// anywhere on that sheet, not just within the block.
    pub fn build_sheet(
        &self,
        sheet: SheetId,
        changes: &NormalizedRange,
    ) -> Result<Vec<RenderedBlock>> {
        let right_col = match changes.rightmost_column() {
            Some(col) => col,
            None => self.host.last_column(sheet)?.max(1),
        };
        let sheet_name = self.host.sheet_name(sheet)?;
        let spans = compress_rows(changes.rows.iter().copied());
        log::debug!(
            "sheet {} ('{}'): {} changed cell(s) in {} block(s)",
            sheet,
            sheet_name,
            changes.cells.len(),
            spans.len()
        );

        let mut blocks = Vec::with_capacity(spans.len());
        for span in spans {
            let region = span.region(right_col);
            let highlighted: BTreeSet<CellCoordinate> = changes
                .cells
                .iter()
                .filter(|cell| region.contains(cell))
                .copied()
                .collect();
            let snapshot = self.host.region(sheet, &region)?;
            let html = self
                .renderer
                .render_block(&sheet_name, &region, &snapshot, &highlighted)?;

            blocks.push(RenderedBlock {
                sheet_id: sheet,
                sheet_name: sheet_name.clone(),
                rows: span,
                region,
                highlighted,
                html,
            });
        }
        Ok(blocks)
    }
}
