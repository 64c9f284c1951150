//! Single-flight orchestration of parameter optimizations.
//!
//! Only one optimization can run at a time across the whole process. The
//! [`SingleFlightOrchestrator`] owns that rule; the [`JobRunner`] does the
//! actual work on a blocking worker thread.

mod context;
mod handle;
mod job;
mod models;
mod orchestrator;
mod prompt;
mod runner;

pub use context::TrainingContext;
pub use handle::{JobHandle, JobOutcome, Submission};
pub use job::{JobError, JobErrorKind};
pub use models::{
    HistoricalRecord, JobState, OptimizationRequest, OptimizationResult, Target, Tunables,
    DEFAULT_EASY_BONUS, DEFAULT_HARD_INTERVAL, DEFAULT_MAXIMUM_INTERVAL,
    DEFAULT_REQUEST_RETENTION,
};
pub use orchestrator::SingleFlightOrchestrator;
pub use prompt::{ConsolePrompter, FixedPrompter, PromptResponse, Prompter};
pub use runner::JobRunner;
