//! FSRS helper library
//!
//! Runs FSRS parameter optimizations one at a time in the background,
//! streams their progress and keeps the last result of every target.

pub mod cli_style;
pub mod config;
pub mod metrics;
pub mod notifications;
pub mod optimizer;
pub mod progress;
pub mod result_store;
pub mod sources;
pub mod trainer;

// Re-export commonly used types for convenience
pub use notifications::{Notification, NotificationSink};
pub use optimizer::{
    JobHandle, JobOutcome, JobRunner, OptimizationRequest, OptimizationResult,
    SingleFlightOrchestrator, Submission, Target,
};
pub use result_store::{FileResultStore, ResultStore};
