use thiserror::Error;

/// Categories of failure an optimization can end with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobErrorKind {
    /// The target or its metadata does not exist.
    TargetNotFound,
    /// The training routine is not installed or cannot be launched.
    DependencyMissing,
    /// The data provider failed for a reason other than a missing target.
    DataUnavailable,
    /// The training routine returned an error or panicked.
    TrainingFailed,
    /// The user declined the pre-flight prompt, or the job was cancelled cooperatively.
    Cancelled,
    /// The result was produced but could not be persisted.
    StoreFailed,
}

impl JobErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobErrorKind::TargetNotFound => "target_not_found",
            JobErrorKind::DependencyMissing => "dependency_missing",
            JobErrorKind::DataUnavailable => "data_unavailable",
            JobErrorKind::TrainingFailed => "training_failed",
            JobErrorKind::Cancelled => "cancelled",
            JobErrorKind::StoreFailed => "store_failed",
        }
    }
}

impl std::fmt::Display for JobErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobErrorKind::TargetNotFound => write!(f, "Target not found"),
            JobErrorKind::DependencyMissing => write!(f, "Optimizer dependency missing"),
            JobErrorKind::DataUnavailable => write!(f, "Records unavailable"),
            JobErrorKind::TrainingFailed => write!(f, "Training failed"),
            JobErrorKind::Cancelled => write!(f, "Cancelled"),
            JobErrorKind::StoreFailed => write!(f, "Saving result failed"),
        }
    }
}

/// Typed failure crossing back from the worker to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct JobError {
    pub kind: JobErrorKind,
    pub message: String,
}

impl JobError {
    pub fn new(kind: JobErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn target_not_found(message: impl Into<String>) -> Self {
        Self::new(JobErrorKind::TargetNotFound, message)
    }

    pub fn training_failed(message: impl Into<String>) -> Self {
        Self::new(JobErrorKind::TrainingFailed, message)
    }

    pub fn cancelled() -> Self {
        Self::new(JobErrorKind::Cancelled, "Job was cancelled")
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == JobErrorKind::Cancelled
    }
}
