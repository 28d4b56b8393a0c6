use crate::config::DigestConfig;
use crate::error::{DigestError, Result};
use crate::host::{SheetHost, WorkbookInfo};
use crate::ledger::{ChangeLedger, PendingChanges, SheetId};
use crate::mailer::{Notification, Notifier};
use crate::render::{Renderer, local_timestamp};
use crate::store::PropertyStore;
use crate::summary::{RenderedBlock, SummaryBuilder};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Result of one scheduled run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was pending.
    Idle,
    /// A digest with this many blocks was delivered and acknowledged.
    Delivered { blocks: usize },
    /// Changes were pending but no sheet could be summarized; all stay pending.
    Deferred { sheets: usize },
}

/// Edit trigger: record one changed reference for `sheet`.
///
/// Malformed references are rejected before the ledger is read.
pub fn on_edit<S: PropertyStore>(
    ledger: &ChangeLedger<S>,
    sheet: SheetId,
    reference: &str,
) -> Result<bool> {
    ledger.record_str(sheet, reference).inspect_err(|e| {
        log::warn!("rejected change '{}' on sheet {}: {}", reference, sheet, e);
    })
}

/// Schedule trigger: summarize everything pending and deliver it.
///
/// Pending entries are acknowledged only after the notifier succeeds, so a
/// failed delivery is retried on the next run rather than lost. Only sheets
/// that made it into the digest are acknowledged; a sheet the host could not
/// serve stays pending without holding back the others.
pub fn on_schedule<S, H, N>(
    ledger: &ChangeLedger<S>,
    builder: &SummaryBuilder<H>,
    notifier: &N,
    config: &DigestConfig,
    now: DateTime<Utc>,
) -> Result<FlushOutcome>
where
    S: PropertyStore,
    H: SheetHost,
    N: Notifier,
{
    if ledger.key() != config.ledger_key {
        return Err(DigestError::Config(format!(
            "ledger key '{}' does not match configured '{}'",
            ledger.key(),
            config.ledger_key
        )));
    }

    let pending = ledger.flush()?;
    if pending.values().all(BTreeSet::is_empty) {
        log::debug!("no pending changes");
        return Ok(FlushOutcome::Idle);
    }

    let blocks = builder.build(&pending)?;
    let delivered = delivered_changes(&pending, &blocks);
    if blocks.is_empty() {
        let sheets = count_sheets(&pending);
        log::warn!("none of {} pending sheet(s) could be summarized", sheets);
        return Ok(FlushOutcome::Deferred { sheets });
    }

    let workbook = builder.host().workbook();
    let notification = compose_notification(builder.renderer(), &blocks, &workbook, config, now)?;

    if let Err(e) = notifier.deliver(&notification) {
        log::error!("digest delivery failed, keeping pending changes: {}", e);
        return Err(e);
    }

    ledger.acknowledge(&delivered)?;
    log::info!(
        "delivered digest with {} block(s) across {} sheet(s)",
        blocks.len(),
        delivered.len()
    );
    Ok(FlushOutcome::Delivered {
        blocks: blocks.len(),
    })
}

/// Build the single notification for a set of blocks.
pub fn compose_notification(
    renderer: &Renderer,
    blocks: &[RenderedBlock],
    workbook: &WorkbookInfo,
    config: &DigestConfig,
    now: DateTime<Utc>,
) -> Result<Notification> {
    let timestamp = local_timestamp(workbook, now)?;

    let mut sheet_names: Vec<&str> = Vec::new();
    for block in blocks {
        if !sheet_names.contains(&block.sheet_name.as_str()) {
            sheet_names.push(&block.sheet_name);
        }
    }
    let subject = format!(
        "{}: {} ({})",
        config.subject_prefix,
        sheet_names.join(", "),
        timestamp
    );

    let mut text = format!(
        "{} changed region(s) as of {} ({}).\n",
        blocks.len(),
        timestamp,
        workbook.timezone
    );
    for block in blocks {
        let cells: Vec<String> = block.highlighted.iter().map(|c| c.to_string()).collect();
        text.push_str(&format!(
            "\n{} {}: {}",
            block.sheet_name,
            block.region,
            cells.join(", ")
        ));
    }
    if !workbook.url.is_empty() {
        text.push_str(&format!("\n\n{}\n", workbook.url));
    }

    let fragments: Vec<&str> = blocks.iter().map(|b| b.html.as_str()).collect();
    let html = renderer.render_digest(&fragments, workbook, now)?;

    Ok(Notification {
        subject,
        text,
        html,
        recipients: config.recipients.clone(),
    })
}

/// The part of `pending` covered by `blocks`.
fn delivered_changes(pending: &PendingChanges, blocks: &[RenderedBlock]) -> PendingChanges {
    let sheets: BTreeSet<SheetId> = blocks.iter().map(|b| b.sheet_id).collect();
    pending
        .iter()
        .filter(|(sheet, _)| sheets.contains(sheet))
        .map(|(sheet, entries)| (*sheet, entries.clone()))
        .collect()
}

fn count_sheets(pending: &PendingChanges) -> usize {
    pending.values().filter(|entries| !entries.is_empty()).count()
}
