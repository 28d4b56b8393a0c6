/*!
# Sheet Digest

Batches spreadsheet edit notifications into one periodic digest.

## Overview

Every edit records the changed cell or range in a small persisted ledger.
On a schedule the ledger is read, the changes on each sheet are merged into
contiguous row blocks, each block is rendered as an HTML table snippet with
the changed cells outlined, and the whole digest is sent as a single mail.

## Architecture

### Coordinate algebra
- **cell**: A1 references to and from 1-based `(row, col)` coordinates
- **range**: change specifiers, normalization to cells/rows, row compression

### State
- **store**: key-value property store trait, in-memory and JSON file stores
- **ledger**: pending changes per sheet, updated with compare-and-swap

### Output
- **host**: the spreadsheet application (values, styles, sizes)
- **render**: handlebars templates for block tables and the digest body
- **summary**: merges pending changes into rendered blocks
- **mailer**: notification delivery (SMTP behind the `smtp` feature)

### Wiring
- **config**: recipients, subject and SMTP settings
- **digest**: `on_edit` and `on_schedule` trigger entry points

## Flush policy

Pending changes are acknowledged only after delivery succeeds. A failed
delivery leaves them in place for the next run, so a digest may be repeated
but is never silently dropped.
*/

pub mod cell;
pub mod config;
pub mod digest;
pub mod error;
pub mod host;
pub mod ledger;
pub mod mailer;
pub mod range;
pub mod render;
pub mod store;
pub mod summary;

pub use cell::{
    CellCoordinate, column_to_index, format_reference, index_to_column, parse_reference,
    row_to_index,
};
pub use config::{DigestConfig, SmtpConfig};
pub use digest::{FlushOutcome, compose_notification, on_edit, on_schedule};
pub use error::{DigestError, Result};
pub use host::{CellStyle, MemoryHost, RegionSnapshot, SheetHost, WorkbookInfo};
pub use ledger::{ChangeLedger, PendingChanges, SheetId};
pub use mailer::{Notification, Notifier, RecordingNotifier};
pub use range::{
    CellRange, NormalizedRange, RangeSpecifier, RowSpan, compress_rows, normalize_range,
    normalize_str,
};
pub use render::Renderer;
pub use store::{FileStore, MemoryStore, PropertyStore};
pub use summary::{RenderedBlock, SummaryBuilder, merge_pending};

#[cfg(feature = "smtp")]
pub use mailer::Mailer;
