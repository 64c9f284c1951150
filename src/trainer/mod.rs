//! The parameter-fitting routine the optimizer delegates to.
//!
//! The numerical work itself lives outside this crate. A [`TrainingRoutine`]
//! receives the review history, reports progress through the
//! [`TrainingContext`], and returns the fitted weights.

mod external;

pub use external::{ExternalTrainer, TrainerMessage};

use crate::optimizer::{HistoricalRecord, TrainingContext};
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use thiserror::Error;

/// Scheduling settings passed through to the training routine unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulingOptions {
    /// Hour at which a new scheduling day starts.
    pub rollover_hour: u8,
    pub timezone: String,
    /// Reviews before this date (YYYY-MM-DD) are ignored.
    pub revlog_start_date: String,
    pub preview: bool,
}

impl Default for SchedulingOptions {
    fn default() -> Self {
        Self {
            rollover_hour: 4,
            timezone: "UTC".to_string(),
            revlog_start_date: "2000-01-01".to_string(),
            preview: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingOptions {
    pub search_optimal_retention: bool,
    pub scheduling: SchedulingOptions,
    #[serde(default)]
    pub overrides: JsonMap<String, JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrainingOutput {
    pub weights: Vec<f64>,
    /// Optimal retention, when a search was performed.
    pub retention: Option<f64>,
    /// Free-form lines the routine printed along the way.
    pub diagnostics: Vec<String>,
}

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("Training was cancelled")]
    Cancelled,

    #[error("Trainer unavailable: {0}")]
    Unavailable(String),

    #[error("Training failed: {0}")]
    Failed(String),

    #[error("Trainer protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait TrainingRoutine: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Verify the routine can run. The error is user-facing installation guidance.
    fn check_available(&self) -> Result<(), String>;

    /// Fit parameters to `records`. Runs on a blocking worker thread.
    fn train(
        &self,
        records: &[HistoricalRecord],
        options: &TrainingOptions,
        ctx: &TrainingContext,
    ) -> Result<TrainingOutput, TrainingError>;
}
