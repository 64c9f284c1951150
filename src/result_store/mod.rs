//! Persisted mapping from target to the last optimization result.

mod file_store;
mod memory_store;
mod render;

pub use file_store::FileResultStore;
pub use memory_store::MemoryResultStore;
pub use render::render_deck_params;

use crate::optimizer::{OptimizationResult, Target};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed result file {path:?}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Malformed entry {key:?} in result file: {source}")]
    MalformedEntry {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Result for target {target} has non-finite parameters")]
    NonFinite { target: Target },

    #[error("Failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Results keyed by target, iterated in insertion order.
///
/// Replacing the result of an existing target keeps its position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultMap {
    entries: Vec<OptimizationResult>,
}

impl ResultMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, target: &Target) -> Option<&OptimizationResult> {
        self.entries.iter().find(|r| &r.target == target)
    }

    pub fn contains(&self, target: &Target) -> bool {
        self.get(target).is_some()
    }

    /// Insert or replace the entry for `result.target`. Returns the replaced result.
    pub fn insert(&mut self, result: OptimizationResult) -> Option<OptimizationResult> {
        match self.entries.iter_mut().find(|r| r.target == result.target) {
            Some(slot) => Some(std::mem::replace(slot, result)),
            None => {
                self.entries.push(result);
                None
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &OptimizationResult> {
        self.entries.iter()
    }

    pub fn targets(&self) -> Vec<Target> {
        self.entries.iter().map(|r| r.target.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Storage for committed optimization results.
///
/// Implementations must make `upsert` indivisible with respect to concurrent
/// callers and must merge: upserting one target never removes another.
pub trait ResultStore: Send + Sync {
    /// Snapshot of every stored result. Empty when nothing was persisted yet.
    fn load(&self) -> Result<ResultMap, StoreError>;

    /// Stored result for a single target.
    fn get(&self, target: &Target) -> Result<Option<OptimizationResult>, StoreError> {
        Ok(self.load()?.get(target).cloned())
    }

    /// Merge `result` in under `target` and persist the whole mapping.
    ///
    /// Results with NaN or infinite parameters are refused with [`StoreError::NonFinite`].
    fn upsert(&self, target: &Target, result: OptimizationResult) -> Result<(), StoreError>;

    /// Caller-facing listing of every stored result.
    fn serialize_all(&self) -> Result<String, StoreError> {
        Ok(render_deck_params(&self.load()?))
    }
}
