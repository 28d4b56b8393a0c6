use sheet_digest::config::DigestConfig;
use sheet_digest::error::{DigestError, Result};
use sheet_digest::ledger::{ChangeLedger, DEFAULT_LEDGER_KEY, MAX_CAS_ATTEMPTS, PendingChanges};
use sheet_digest::store::{FileStore, MemoryStore, PropertyStore};
use std::collections::BTreeSet;
use std::sync::Mutex;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn entries(pending: &PendingChanges, sheet: u64) -> Vec<String> {
    pending
        .get(&sheet)
        .map(|set| set.iter().cloned().collect())
        .unwrap_or_default()
}

fn ready_ledger() -> ChangeLedger<MemoryStore> {
    let ledger = ChangeLedger::new(MemoryStore::new());
    ledger.reset().unwrap();
    ledger
}

/// Simulates another activity writing between our read and our write.
struct ContendedStore {
    inner: MemoryStore,
    conflicts_left: Mutex<usize>,
}

impl ContendedStore {
    fn new(conflicts: usize) -> Self {
        ContendedStore {
            inner: MemoryStore::new(),
            conflicts_left: Mutex::new(conflicts),
        }
    }
}

impl PropertyStore for ContendedStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.inner.set(key, value)
    }

    fn compare_and_set(&self, key: &str, expected: Option<&str>, value: &str) -> Result<bool> {
        let mut left = self.conflicts_left.lock().unwrap();
        if *left > 0 && expected.is_some() {
            *left -= 1;
            // A competing edit on sheet 9 lands first.
            let competing = ChangeLedger::with_key(&self.inner, key);
            competing.record_str(9, &format!("Z{}", *left + 1))?;
            return Ok(false);
        }
        self.inner.compare_and_set(key, expected, value)
    }
}

#[test]
fn test_reset_then_flush_is_empty() {
    let ledger = ready_ledger();
    assert!(ledger.flush().unwrap().is_empty());

    ledger.record_str(0, "A1").unwrap();
    ledger.reset().unwrap();
    assert!(ledger.flush().unwrap().is_empty());
}

#[test]
fn test_record_deduplicates_and_sorts() {
    init_logging();
    let ledger = ready_ledger();

    assert!(ledger.record_str(0, "E4").unwrap());
    assert!(ledger.record_str(0, "A1:B4").unwrap());
    assert!(!ledger.record_str(0, "E4").unwrap());
    // Same cell, different spelling.
    assert!(!ledger.record_str(0, "$E$4").unwrap());
    assert!(!ledger.record_str(0, "B4:A1").unwrap());

    let pending = ledger.flush().unwrap();
    assert_eq!(entries(&pending, 0), vec!["A1:B4", "E4"]);
}

#[test]
fn test_six_record_scenario_is_persisted_per_sheet() {
    let ledger = ready_ledger();
    ledger.record_str(0, "A1:B4").unwrap();
    ledger.record_str(1, "A4:C4").unwrap();
    ledger.record_str(1, "A2:C5").unwrap();
    ledger.record_str(0, "E4").unwrap();
    ledger.record_str(0, "D4").unwrap();
    ledger.record_str(0, "F8").unwrap();

    let pending = ledger.flush().unwrap();
    assert_eq!(entries(&pending, 0), vec!["A1:B4", "D4", "E4", "F8"]);
    assert_eq!(entries(&pending, 1), vec!["A2:C5", "A4:C4"]);

    let raw = ledger.store().get(DEFAULT_LEDGER_KEY).unwrap().unwrap();
    assert_eq!(
        raw,
        r#"{"0":["A1:B4","D4","E4","F8"],"1":["A2:C5","A4:C4"]}"#
    );

    // Flushing does not clear.
    assert_eq!(ledger.flush().unwrap(), pending);
}

#[test]
fn test_invalid_reference_never_reaches_store() {
    let ledger = ready_ledger();
    ledger.record_str(0, "A1").unwrap();
    let before = ledger.store().get(DEFAULT_LEDGER_KEY).unwrap();

    for bad in ["1A", "", "A", "A1:", "a1", "A1:XFD1048576"] {
        let err = ledger.record_str(0, bad).unwrap_err();
        assert!(err.is_input_error(), "{:?} -> {:?}", bad, err);
    }
    assert_eq!(ledger.store().get(DEFAULT_LEDGER_KEY).unwrap(), before);
}

#[test]
fn test_uninitialized_ledger_fails() {
    let ledger = ChangeLedger::new(MemoryStore::new());
    assert!(!ledger.is_initialized().unwrap());
    assert!(matches!(
        ledger.flush().unwrap_err(),
        DigestError::PersistenceFailure(_)
    ));
    assert!(matches!(
        ledger.record_str(0, "A1").unwrap_err(),
        DigestError::PersistenceFailure(_)
    ));

    assert!(ledger.ensure_initialized().unwrap());
    assert!(!ledger.ensure_initialized().unwrap());
    assert!(ledger.record_str(0, "A1").unwrap());
    assert!(!ledger.ensure_initialized().unwrap());
    assert_eq!(entries(&ledger.flush().unwrap(), 0), vec!["A1"]);
}

#[test]
fn test_corrupt_blob_is_reported() {
    let ledger = ready_ledger();
    ledger.store().set(DEFAULT_LEDGER_KEY, "not json").unwrap();
    assert!(matches!(
        ledger.flush().unwrap_err(),
        DigestError::PersistenceFailure(_)
    ));

    ledger
        .store()
        .set(DEFAULT_LEDGER_KEY, r#"{"0":["A1","1A"]}"#)
        .unwrap();
    assert!(matches!(
        ledger.record_str(0, "B2").unwrap_err(),
        DigestError::PersistenceFailure(_)
    ));
    // The bad blob is left exactly as it was.
    assert_eq!(
        ledger.store().get(DEFAULT_LEDGER_KEY).unwrap().unwrap(),
        r#"{"0":["A1","1A"]}"#
    );
}

#[test]
fn test_concurrent_write_is_retried_not_lost() {
    init_logging();
    let ledger = ChangeLedger::new(ContendedStore::new(2));
    ledger.reset().unwrap();

    assert!(ledger.record_str(0, "B2").unwrap());

    let pending = ledger.flush().unwrap();
    assert_eq!(entries(&pending, 0), vec!["B2"]);
    assert_eq!(entries(&pending, 9), vec!["Z1", "Z2"]);
}

#[test]
fn test_endless_contention_gives_up() {
    let ledger = ChangeLedger::new(ContendedStore::new(MAX_CAS_ATTEMPTS + 5));
    ledger.reset().unwrap();

    let err = ledger.record_str(0, "B2").unwrap_err();
    assert!(matches!(err, DigestError::PersistenceFailure(_)));
    assert!(entries(&ledger.flush().unwrap(), 0).is_empty());
}

#[test]
fn test_acknowledge_keeps_later_changes() {
    let ledger = ready_ledger();
    ledger.record_str(0, "A1").unwrap();
    ledger.record_str(1, "B2").unwrap();
    let snapshot = ledger.flush().unwrap();

    ledger.record_str(0, "C3").unwrap();
    ledger.acknowledge(&snapshot).unwrap();

    let pending = ledger.flush().unwrap();
    assert_eq!(entries(&pending, 0), vec!["C3"]);
    assert!(!pending.contains_key(&1));

    // Acknowledging again is harmless.
    ledger.acknowledge(&snapshot).unwrap();
    assert_eq!(ledger.flush().unwrap(), pending);
}

#[test]
fn test_file_store_persists_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("properties.json");

    {
        let ledger = ChangeLedger::new(FileStore::new(&path));
        ledger.reset().unwrap();
        ledger.record_str(3, "D4:E5").unwrap();
        ledger.record_str(3, "A1").unwrap();
    }

    let ledger = ChangeLedger::new(FileStore::new(&path));
    let pending = ledger.flush().unwrap();
    assert_eq!(
        pending.get(&3).cloned().unwrap_or_default(),
        BTreeSet::from(["A1".to_string(), "D4:E5".to_string()])
    );

    let on_disk = std::fs::read_to_string(&path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&on_disk).unwrap();
    assert!(parsed.get(DEFAULT_LEDGER_KEY).is_some());
}

#[test]
fn test_custom_key_isolates_ledgers() {
    let store = MemoryStore::new();
    let first = ChangeLedger::with_key(&store, "first");
    let second = ChangeLedger::with_key(&store, "second");
    first.reset().unwrap();
    second.reset().unwrap();

    first.record_str(0, "A1").unwrap();
    assert!(second.flush().unwrap().is_empty());
    assert_eq!(first.key(), "first");
}

#[test]
fn test_ledger_from_config_uses_configured_key() {
    let store = MemoryStore::new();
    let config = DigestConfig {
        ledger_key: "budget_changes".to_string(),
        ..DigestConfig::default()
    };
    let ledger = ChangeLedger::from_config(&store, &config);
    ledger.reset().unwrap();
    ledger.record_str(3, "B7").unwrap();

    assert_eq!(ledger.key(), "budget_changes");
    assert!(store.get("budget_changes").unwrap().is_some());
    assert!(store.get(DEFAULT_LEDGER_KEY).unwrap().is_none());
}
