use super::{ResultMap, ResultStore, StoreError};
use crate::optimizer::{OptimizationResult, Target};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// JSON-file backed result store.
///
/// The file holds one object keyed by [`Target::storage_key`], in insertion
/// order. The mapping is read once on open and rewritten as a whole, through a
/// temporary file in the same directory followed by a rename, on every upsert.
pub struct FileResultStore {
    path: PathBuf,
    results: Mutex<ResultMap>,
}

impl FileResultStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let results = read_results(&path)?;
        info!(
            "Opened result store at {:?} with {} entries",
            path,
            results.len()
        );
        Ok(Self {
            path,
            results: Mutex::new(results),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ResultMap> {
        self.results
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ResultStore for FileResultStore {
    fn load(&self) -> Result<ResultMap, StoreError> {
        Ok(self.lock().clone())
    }

    fn upsert(&self, target: &Target, mut result: OptimizationResult) -> Result<(), StoreError> {
        result.target = target.clone();
        if !result.is_finite() {
            return Err(StoreError::NonFinite {
                target: target.clone(),
            });
        }

        // Held across the write so concurrent upserts persist one after another.
        let mut results = self.lock();
        let mut updated = results.clone();
        let replaced = updated.insert(result).is_some();

        write_results(&self.path, &updated)?;
        *results = updated;

        debug!(
            "{} result for target {} in {:?}",
            if replaced { "Replaced" } else { "Added" },
            target,
            self.path
        );
        Ok(())
    }
}

fn read_results(path: &Path) -> Result<ResultMap, StoreError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ResultMap::new()),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    if content.trim().is_empty() {
        return Ok(ResultMap::new());
    }

    let document: JsonMap<String, JsonValue> =
        serde_json::from_str(&content).map_err(|source| StoreError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;

    let mut results = ResultMap::new();
    for (key, value) in document {
        let result: OptimizationResult = serde_json::from_value(value)
            .map_err(|source| StoreError::MalformedEntry { key, source })?;
        results.insert(result);
    }
    Ok(results)
}

fn write_results(path: &Path, results: &ResultMap) -> Result<(), StoreError> {
    let mut document = JsonMap::new();
    for result in results.iter() {
        document.insert(result.target.storage_key(), serde_json::to_value(result)?);
    }
    let bytes = serde_json::to_vec_pretty(&JsonValue::Object(document))?;

    let io_err = |source: std::io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(io_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(io_err)?;
    tmp.write_all(&bytes).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}
