use crate::cell::{CellCoordinate, index_to_column};
use crate::error::{DigestError, Result};
use crate::host::{CellStyle, RegionSnapshot, WorkbookInfo};
use crate::range::CellRange;
use chrono::{DateTime, FixedOffset, Utc};
use handlebars::Handlebars;
use serde::Serialize;
use std::collections::BTreeSet;

const BLOCK_TEMPLATE: &str = r#"<table style="border-collapse:collapse;table-layout:fixed;font-family:Arial,sans-serif">
<caption style="text-align:left;font-weight:bold;padding:4px 0">{{sheet_name}} &middot; {{region}}</caption>
<colgroup><col style="width:40px">{{#each columns}}<col style="width:{{width}}px">{{/each}}</colgroup>
<tr><th style="background:#f3f3f3;border:1px solid #c0c0c0"></th>{{#each columns}}<th style="background:#f3f3f3;border:1px solid #c0c0c0;font-weight:normal">{{letters}}</th>{{/each}}</tr>
{{#each rows}}<tr style="height:{{height}}px"><th style="background:#f3f3f3;border:1px solid #c0c0c0;font-weight:normal">{{number}}</th>{{#each cells}}<td style="{{style}}">{{value}}</td>{{/each}}</tr>
{{/each}}</table>"#;

const DIGEST_TEMPLATE: &str = r#"<div style="font-family:Arial,sans-serif">
<p>{{change_count}} changed region(s) as of {{timestamp}} ({{timezone}}).</p>
{{#if url}}<p><a href="{{url}}">Open the spreadsheet</a></p>
{{/if}}{{#each blocks}}<div style="margin-bottom:16px">{{{this}}}</div>
{{/each}}</div>"#;

const HIGHLIGHT_CSS: &str = "border:2px solid #e53935;";

#[derive(Serialize)]
struct ColumnContext {
    letters: String,
    width: u32,
}

#[derive(Serialize)]
struct CellContext {
    value: String,
    style: String,
}

#[derive(Serialize)]
struct RowContext {
    number: u32,
    height: u32,
    cells: Vec<CellContext>,
}

#[derive(Serialize)]
struct BlockContext<'a> {
    sheet_name: &'a str,
    region: String,
    columns: Vec<ColumnContext>,
    rows: Vec<RowContext>,
}

#[derive(Serialize)]
struct DigestContext<'a> {
    change_count: usize,
    timestamp: String,
    timezone: &'a str,
    url: &'a str,
    blocks: Vec<&'a str>,
}

/// Handlebars templates for summary tables and the digest body.
pub struct Renderer {
    registry: Handlebars<'static>,
}

impl Renderer {
    pub fn new() -> Result<Self> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_template_string("block", BLOCK_TEMPLATE)?;
        registry.register_template_string("digest", DIGEST_TEMPLATE)?;
        Ok(Renderer { registry })
    }

    /// Render one region as an HTML table with `highlighted` cells outlined.
    pub fn render_block(
        &self,
        sheet_name: &str,
        region: &CellRange,
        snapshot: &RegionSnapshot,
        highlighted: &BTreeSet<CellCoordinate>,
    ) -> Result<String> {
        snapshot.check_shape(region)?;

        let columns = (region.start.col..=region.end.col)
            .zip(&snapshot.column_widths)
            .map(|(col, width)| {
                Ok(ColumnContext {
                    letters: index_to_column(col)?,
                    width: *width,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let rows = (region.start.row..=region.end.row)
            .zip(snapshot.values.iter().zip(&snapshot.styles))
            .zip(&snapshot.row_heights)
            .map(|((row, (values, styles)), height)| RowContext {
                number: row,
                height: *height,
                cells: (region.start.col..=region.end.col)
                    .zip(values.iter().zip(styles))
                    .map(|(col, (value, style))| {
                        let changed = highlighted.contains(&CellCoordinate { row, col });
                        CellContext {
                            value: value.clone(),
                            style: cell_css(style, changed),
                        }
                    })
                    .collect(),
            })
            .collect();

        let context = BlockContext {
            sheet_name,
            region: region.to_string(),
            columns,
            rows,
        };
        Ok(self.registry.render("block", &context)?)
    }

    /// Wrap rendered blocks into the digest body.
    pub fn render_digest(
        &self,
        blocks: &[&str],
        workbook: &WorkbookInfo,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let context = DigestContext {
            change_count: blocks.len(),
            timestamp: local_timestamp(workbook, now)?,
            timezone: &workbook.timezone,
            url: &workbook.url,
            blocks: blocks.to_vec(),
        };
        Ok(self.registry.render("digest", &context)?)
    }
}

/// `now` in the workbook's offset, minute precision.
pub fn local_timestamp(workbook: &WorkbookInfo, now: DateTime<Utc>) -> Result<String> {
    let offset = FixedOffset::east_opt(workbook.utc_offset_seconds).ok_or_else(|| {
        DigestError::Host(format!(
            "utc offset {}s is out of range",
            workbook.utc_offset_seconds
        ))
    })?;
    Ok(now.with_timezone(&offset).format("%Y-%m-%d %H:%M").to_string())
}

fn cell_css(style: &CellStyle, highlighted: bool) -> String {
    let mut css = format!(
        "color:{};font-family:{};font-size:{}pt;font-weight:{};background:{};text-align:{};vertical-align:{};",
        style.font_color,
        style.font_family,
        style.font_size,
        style.font_weight,
        style.background,
        style.horizontal_alignment,
        css_vertical_align(&style.vertical_alignment),
    );
    if highlighted {
        css.push_str(HIGHLIGHT_CSS);
    } else {
        css.push_str("border:1px solid #e0e0e0;");
    }
    css
}

// Hosts report "middle" or "center" for the same thing.
fn css_vertical_align(value: &str) -> &str {
    match value {
        "center" => "middle",
        other => other,
    }
}
