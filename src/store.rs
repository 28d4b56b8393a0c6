use crate::error::{DigestError, Result};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;

/// A string key-value property store owned by the host platform.
pub trait PropertyStore {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Write `value` only if the current value equals `expected`.
    ///
    /// Returns `Ok(false)` when another writer got there first. The default
    /// implementation is a plain read-compare-write and is only as atomic as
    /// the store itself; stores that can do better should override it.
    fn compare_and_set(&self, key: &str, expected: Option<&str>, value: &str) -> Result<bool> {
        let current = self.get(key)?;
        if current.as_deref() != expected {
            return Ok(false);
        }
        self.set(key, value)?;
        Ok(true)
    }
}

impl<S: PropertyStore + ?Sized> PropertyStore for &S {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn compare_and_set(&self, key: &str, expected: Option<&str>, value: &str) -> Result<bool> {
        (**self).compare_and_set(key, expected, value)
    }
}

/// In-process store. Compare-and-set is atomic under the internal lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        self.values
            .lock()
            .map_err(|_| DigestError::PersistenceFailure("memory store lock poisoned".to_string()))
    }
}

impl PropertyStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn compare_and_set(&self, key: &str, expected: Option<&str>, value: &str) -> Result<bool> {
        let mut values = self.lock()?;
        if values.get(key).map(String::as_str) != expected {
            return Ok(false);
        }
        values.insert(key.to_string(), value.to_string());
        Ok(true)
    }
}

/// Properties persisted as one JSON object on disk.
///
/// Writes go to a temporary file in the same directory which then replaces
/// the target, so a crash mid-write leaves the previous contents intact.
/// There is no cross-process lock: two processes updating the same file race
/// and the last writer wins.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| {
            DigestError::PersistenceFailure(format!(
                "cannot read property file {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    fn save(&self, values: &BTreeMap<String, String>) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let temp = NamedTempFile::new_in(&dir)?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            serde_json::to_writer_pretty(&mut writer, values)?;
            writer.flush()?;
        }
        temp.persist(&self.path).map_err(|e| {
            DigestError::PersistenceFailure(format!(
                "cannot replace property file {}: {}",
                self.path.display(),
                e.error
            ))
        })?;
        Ok(())
    }
}

impl PropertyStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.load()?;
        values.insert(key.to_string(), value.to_string());
        self.save(&values)
    }
}
