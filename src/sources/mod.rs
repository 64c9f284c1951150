//! Where targets and their review history come from.
//!
//! Both lookups are external collaborators of the optimizer: the host
//! application decides how records are extracted, the optimizer only consumes
//! them.

mod json_source;

pub use json_source::{JsonRecordSource, RecordFile};

use crate::optimizer::{HistoricalRecord, Target};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Target {0} not found")]
    TargetNotFound(Target),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed record data: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("{0}")]
    Unavailable(String),
}

/// Resolves a target to its human-readable name.
pub trait TargetDirectory: Send + Sync {
    fn display_name(&self, target: &Target) -> Result<String, SourceError>;
}

/// Supplies the ordered review history of a target. An empty history is valid.
pub trait RecordProvider: Send + Sync {
    fn records(&self, target: &Target) -> Result<Vec<HistoricalRecord>, SourceError>;
}
