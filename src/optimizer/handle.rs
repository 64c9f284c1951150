use super::job::JobError;
use super::models::{OptimizationResult, Target};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Terminal outcome of an accepted job. Produced exactly once.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Succeeded(OptimizationResult),
    Cancelled,
    Failed(JobError),
}

impl JobOutcome {
    /// Label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            JobOutcome::Succeeded(_) => "success",
            JobOutcome::Cancelled => "cancelled",
            JobOutcome::Failed(_) => "failed",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded(_))
    }
}

/// Handle to an accepted job.
///
/// Resolves after the job slot has been released, so a caller awaiting it can
/// submit the next job straight away.
#[derive(Debug)]
pub struct JobHandle {
    job_id: u64,
    target: Target,
    cancellation_token: CancellationToken,
    outcome_rx: oneshot::Receiver<JobOutcome>,
}

impl JobHandle {
    pub(crate) fn new(
        job_id: u64,
        target: Target,
        cancellation_token: CancellationToken,
        outcome_rx: oneshot::Receiver<JobOutcome>,
    ) -> Self {
        Self {
            job_id,
            target,
            cancellation_token,
            outcome_rx,
        }
    }

    pub fn job_id(&self) -> u64 {
        self.job_id
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Ask the training routine to stop. Routines that don't check for
    /// cancellation run to completion and the job succeeds or fails as usual.
    pub fn cancel(&self) {
        self.cancellation_token.cancel();
    }

    /// Token that cancels this job, usable after the handle is consumed by [`JobHandle::wait`].
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Wait for the terminal outcome.
    pub async fn wait(self) -> JobOutcome {
        match self.outcome_rx.await {
            Ok(outcome) => outcome,
            // Only happens when the runtime drops the job task mid-flight.
            Err(_) => JobOutcome::Failed(JobError::training_failed(
                "job task ended without reporting an outcome",
            )),
        }
    }
}

/// What happened to a submission.
#[derive(Debug)]
pub enum Submission {
    /// The job is running in the background.
    Accepted(JobHandle),
    /// Another job holds the slot. Carries that job's description.
    Rejected { description: String },
    /// The pre-flight prompt was declined. Nothing ran.
    Cancelled,
    /// The training routine cannot run. Nothing ran.
    DependencyMissing { guidance: String },
}

impl Submission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Submission::Accepted(_))
    }

    pub fn into_handle(self) -> Option<JobHandle> {
        match self {
            Submission::Accepted(handle) => Some(handle),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_returns_sent_outcome() {
        let (tx, rx) = oneshot::channel();
        let handle = JobHandle::new(1, Target::Id(5), CancellationToken::new(), rx);
        tx.send(JobOutcome::Cancelled).unwrap();

        assert_eq!(handle.wait().await, JobOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_wait_on_dropped_sender_is_failure() {
        let (tx, rx) = oneshot::channel::<JobOutcome>();
        let handle = JobHandle::new(1, Target::Id(5), CancellationToken::new(), rx);
        drop(tx);

        assert!(matches!(handle.wait().await, JobOutcome::Failed(_)));
    }

    #[test]
    fn test_cancel_triggers_token() {
        let (_tx, rx) = oneshot::channel();
        let token = CancellationToken::new();
        let handle = JobHandle::new(2, Target::Id(5), token.clone(), rx);

        handle.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_submission_accessors() {
        let rejected = Submission::Rejected {
            description: "Optimizing Japanese".into(),
        };
        assert!(!rejected.is_accepted());
        assert!(rejected.into_handle().is_none());
    }
}
