use crate::config::DigestConfig;
use crate::error::{DigestError, Result};
use crate::range::RangeSpecifier;
use crate::store::PropertyStore;
use std::collections::{BTreeMap, BTreeSet};

pub type SheetId = u64;

/// Store key holding the pending-change blob.
pub const DEFAULT_LEDGER_KEY: &str = "pending_changes";

/// Attempts before a contended update gives up.
pub const MAX_CAS_ATTEMPTS: usize = 8;

/// Canonical specifier strings waiting to be summarized, per sheet.
///
/// Serialized as `{"<sheetId>": ["A1:B4", "E4"]}`; each set is sorted and
/// deduplicated.
pub type PendingChanges = BTreeMap<SheetId, BTreeSet<String>>;

/// Accumulates changed ranges between flushes.
///
/// The whole mapping lives under a single store key. Every update is a
/// compare-and-swap against the value that was read, retried on conflict, so
/// two edits landing together cannot silently overwrite each other as long as
/// the store's `compare_and_set` is atomic.
pub struct ChangeLedger<S: PropertyStore> {
    store: S,
    key: String,
}

impl<S: PropertyStore> ChangeLedger<S> {
    pub fn new(store: S) -> Self {
        Self::with_key(store, DEFAULT_LEDGER_KEY)
    }

    pub fn with_key(store: S, key: impl Into<String>) -> Self {
        ChangeLedger {
            store,
            key: key.into(),
        }
    }

    /// A ledger under the configured `ledger_key`.
    pub fn from_config(store: S, config: &DigestConfig) -> Self {
        Self::with_key(store, config.ledger_key.clone())
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Replace the whole mapping with an empty one.
    pub fn reset(&self) -> Result<()> {
        self.store.set(&self.key, &encode(&PendingChanges::new())?)?;
        log::debug!("ledger '{}' reset", self.key);
        Ok(())
    }

    /// Reset only when nothing has been stored under the key yet.
    ///
    /// Returns true if the ledger was created by this call.
    pub fn ensure_initialized(&self) -> Result<bool> {
        let empty = encode(&PendingChanges::new())?;
        let created = self.store.compare_and_set(&self.key, None, &empty)?;
        if created {
            log::info!("ledger '{}' initialized", self.key);
        }
        Ok(created)
    }

    pub fn is_initialized(&self) -> Result<bool> {
        Ok(self.store.get(&self.key)?.is_some())
    }

    /// Validate `raw` and record it for `sheet`.
    pub fn record_str(&self, sheet: SheetId, raw: &str) -> Result<bool> {
        let spec = RangeSpecifier::parse(raw)?;
        self.record(sheet, &spec)
    }

    /// Add `spec` to the sheet's pending set.
    ///
    /// Returns false if an equivalent specifier was already pending.
    pub fn record(&self, sheet: SheetId, spec: &RangeSpecifier) -> Result<bool> {
        let entry = spec.to_string();
        let mut inserted = false;
        self.update(|pending| {
            inserted = pending.entry(sheet).or_default().insert(entry.clone());
            inserted
        })?;
        if inserted {
            log::info!("recorded change {} on sheet {}", entry, sheet);
        } else {
            log::debug!("change {} on sheet {} already pending", entry, sheet);
        }
        Ok(inserted)
    }

    /// Snapshot of everything pending. Does not clear the ledger.
    pub fn flush(&self) -> Result<PendingChanges> {
        let (_, pending) = self.read()?;
        Ok(pending)
    }

    /// Remove exactly the entries in `delivered`.
    ///
    /// Entries recorded after `delivered` was flushed stay pending.
    pub fn acknowledge(&self, delivered: &PendingChanges) -> Result<()> {
        self.update(|pending| {
            let mut changed = false;
            for (sheet, entries) in delivered {
                if let Some(current) = pending.get_mut(sheet) {
                    for entry in entries {
                        changed |= current.remove(entry);
                    }
                    if current.is_empty() {
                        pending.remove(sheet);
                    }
                }
            }
            changed
        })?;
        log::debug!(
            "ledger '{}' acknowledged {} sheet(s)",
            self.key,
            delivered.len()
        );
        Ok(())
    }

    fn read(&self) -> Result<(String, PendingChanges)> {
        let raw = self.store.get(&self.key)?.ok_or_else(|| {
            DigestError::PersistenceFailure(format!("ledger '{}' is not initialized", self.key))
        })?;
        let pending = decode(&raw)?;
        Ok((raw, pending))
    }

    /// Read, mutate and conditionally write back. `mutate` returns whether it
    /// changed anything; unchanged mappings are not written.
    fn update<F>(&self, mut mutate: F) -> Result<()>
    where
        F: FnMut(&mut PendingChanges) -> bool,
    {
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let (raw, mut pending) = self.read()?;
            if !mutate(&mut pending) {
                return Ok(());
            }
            let encoded = encode(&pending)?;
            if self.store.compare_and_set(&self.key, Some(&raw), &encoded)? {
                return Ok(());
            }
            log::warn!(
                "ledger '{}' changed concurrently, retrying ({}/{})",
                self.key,
                attempt,
                MAX_CAS_ATTEMPTS
            );
        }
        Err(DigestError::PersistenceFailure(format!(
            "ledger '{}' update lost {} compare-and-set races",
            self.key, MAX_CAS_ATTEMPTS
        )))
    }
}

fn encode(pending: &PendingChanges) -> Result<String> {
    Ok(serde_json::to_string(pending)?)
}

/// Decode a stored blob, rejecting any entry that is not a valid specifier.
fn decode(raw: &str) -> Result<PendingChanges> {
    let pending: PendingChanges = serde_json::from_str(raw)?;
    for (sheet, entries) in &pending {
        for entry in entries {
            RangeSpecifier::parse(entry).map_err(|e| {
                DigestError::PersistenceFailure(format!(
                    "stored entry '{}' for sheet {} is invalid: {}",
                    entry, sheet, e
                ))
            })?;
        }
    }
    Ok(pending)
}
