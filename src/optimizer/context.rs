use crate::progress::{NoopReporter, ProgressReporter};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Context handed to a training routine for the duration of one job.
///
/// Carries the progress capability and a cancellation token. Routines should
/// check [`TrainingContext::is_cancelled`] between epochs and stop early with
/// `TrainingError::Cancelled` when it is set.
#[derive(Clone)]
pub struct TrainingContext {
    pub cancellation_token: CancellationToken,
    progress: Arc<dyn ProgressReporter>,
}

impl TrainingContext {
    pub fn new(cancellation_token: CancellationToken, progress: Arc<dyn ProgressReporter>) -> Self {
        Self {
            cancellation_token,
            progress,
        }
    }

    /// Context with no progress consumer and a token nobody else holds.
    pub fn detached() -> Self {
        Self::new(CancellationToken::new(), Arc::new(NoopReporter))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    pub fn report(&self, stage: &str, completed: u64, total: u64) {
        self.progress.report(stage, completed, total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording(Mutex<Vec<(String, u64, u64)>>);

    impl ProgressReporter for Recording {
        fn report(&self, stage: &str, completed: u64, total: u64) {
            self.0
                .lock()
                .unwrap()
                .push((stage.to_string(), completed, total));
        }
    }

    #[test]
    fn test_report_forwards_to_reporter() {
        let recording = Arc::new(Recording::default());
        let ctx = TrainingContext::new(CancellationToken::new(), recording.clone());

        ctx.report("Training", 3, 10);

        assert_eq!(
            *recording.0.lock().unwrap(),
            vec![("Training".to_string(), 3, 10)]
        );
    }

    #[test]
    fn test_cancellation_follows_token() {
        let token = CancellationToken::new();
        let ctx = TrainingContext::new(token.child_token(), Arc::new(NoopReporter));
        assert!(!ctx.is_cancelled());

        token.cancel();
        assert!(ctx.is_cancelled());
    }
}
