use super::{ResultMap, ResultStore, StoreError};
use crate::optimizer::{OptimizationResult, Target};
use std::sync::Mutex;

/// Result store that never touches the disk. Used for dry runs and tests.
#[derive(Default)]
pub struct MemoryResultStore {
    results: Mutex<ResultMap>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResultStore for MemoryResultStore {
    fn load(&self) -> Result<ResultMap, StoreError> {
        Ok(self
            .results
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone())
    }

    fn upsert(&self, target: &Target, mut result: OptimizationResult) -> Result<(), StoreError> {
        result.target = target.clone();
        if !result.is_finite() {
            return Err(StoreError::NonFinite {
                target: target.clone(),
            });
        }
        self.results
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(result);
        Ok(())
    }
}
