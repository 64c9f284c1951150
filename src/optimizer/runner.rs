use super::context::TrainingContext;
use super::job::{JobError, JobErrorKind};
use super::models::{OptimizationRequest, OptimizationResult, Target, Tunables, DEFAULT_REQUEST_RETENTION};
use crate::sources::{RecordProvider, SourceError, TargetDirectory};
use crate::trainer::{SchedulingOptions, TrainingError, TrainingOptions, TrainingRoutine};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Executes one optimization: resolve, fetch, train, assemble.
///
/// Runs synchronously on a blocking worker. It never touches the job slot or
/// the result store; the orchestrator does both from the completion path.
pub struct JobRunner {
    directory: Arc<dyn TargetDirectory>,
    records: Arc<dyn RecordProvider>,
    trainer: Arc<dyn TrainingRoutine>,
    scheduling: SchedulingOptions,
}

impl JobRunner {
    pub fn new(
        directory: Arc<dyn TargetDirectory>,
        records: Arc<dyn RecordProvider>,
        trainer: Arc<dyn TrainingRoutine>,
    ) -> Self {
        Self {
            directory,
            records,
            trainer,
            scheduling: SchedulingOptions::default(),
        }
    }

    pub fn with_scheduling(mut self, scheduling: SchedulingOptions) -> Self {
        self.scheduling = scheduling;
        self
    }

    pub fn trainer(&self) -> &Arc<dyn TrainingRoutine> {
        &self.trainer
    }

    pub fn display_name(&self, target: &Target) -> Result<String, JobError> {
        self.directory
            .display_name(target)
            .map_err(|e| source_error(target, e))
    }

    /// Run the optimization for `request`. A missing retention choice counts as "no search".
    pub fn run(
        &self,
        request: &OptimizationRequest,
        ctx: &TrainingContext,
    ) -> Result<OptimizationResult, JobError> {
        let target = &request.target;
        let search = request.search_optimal_retention.unwrap_or(false);

        if ctx.is_cancelled() {
            return Err(JobError::cancelled());
        }

        let deck_name = self.display_name(target)?;
        let records = self
            .records
            .records(target)
            .map_err(|e| source_error(target, e))?;
        debug!(
            "Fetched {} records for target {} ({})",
            records.len(),
            target,
            deck_name
        );

        let options = TrainingOptions {
            search_optimal_retention: search,
            scheduling: self.scheduling.clone(),
            overrides: request.overrides.clone(),
        };

        let start = Instant::now();
        let output = self
            .trainer
            .train(&records, &options, ctx)
            .map_err(|e| training_error(target, e))?;
        info!(
            "Trainer {} finished for target {} in {:?} ({} weights, {} diagnostic lines)",
            self.trainer.name(),
            target,
            start.elapsed(),
            output.weights.len(),
            output.diagnostics.len()
        );

        let request_retention = match (search, output.retention) {
            (true, Some(retention)) => retention,
            (true, None) => {
                warn!(
                    "Retention search requested for target {} but none was reported, using {}",
                    target, DEFAULT_REQUEST_RETENTION
                );
                DEFAULT_REQUEST_RETENTION
            }
            (false, _) => DEFAULT_REQUEST_RETENTION,
        };

        if !request_retention.is_finite() || output.weights.iter().any(|w| !w.is_finite()) {
            return Err(JobError::training_failed(format!(
                "Target {}: trainer produced non-finite parameters",
                target
            )));
        }

        Ok(OptimizationResult {
            target: target.clone(),
            deck_name,
            weights: output.weights,
            request_retention,
            is_not_optimized: !search,
            tunables: Tunables::from_overrides(&request.overrides),
            computed_at: Some(chrono::Utc::now().to_rfc3339()),
        })
    }
}

fn source_error(target: &Target, err: SourceError) -> JobError {
    match err {
        SourceError::TargetNotFound(_) => {
            JobError::target_not_found(format!("Target {} does not exist", target))
        }
        other => JobError::new(
            JobErrorKind::DataUnavailable,
            format!("Could not read records for target {}: {}", target, other),
        ),
    }
}

fn training_error(target: &Target, err: TrainingError) -> JobError {
    match err {
        TrainingError::Cancelled => JobError::cancelled(),
        TrainingError::Unavailable(msg) => JobError::new(JobErrorKind::DependencyMissing, msg),
        other => JobError::training_failed(format!("Target {}: {}", target, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::HistoricalRecord;
    use serde_json::json;
    use std::sync::Mutex;

    struct OneDeck;

    impl TargetDirectory for OneDeck {
        fn display_name(&self, target: &Target) -> Result<String, SourceError> {
            match target {
                Target::Id(42) => Ok("Japanese".to_string()),
                Target::Id(13) => Err(SourceError::Unavailable("collection locked".into())),
                other => Err(SourceError::TargetNotFound(other.clone())),
            }
        }
    }

    impl RecordProvider for OneDeck {
        fn records(&self, _target: &Target) -> Result<Vec<HistoricalRecord>, SourceError> {
            Ok(Vec::new())
        }
    }

    struct FixedTrainer {
        result: Mutex<Option<Result<crate::trainer::TrainingOutput, TrainingError>>>,
        seen: Mutex<Option<TrainingOptions>>,
    }

    impl FixedTrainer {
        fn returning(result: Result<crate::trainer::TrainingOutput, TrainingError>) -> Arc<Self> {
            Arc::new(Self {
                result: Mutex::new(Some(result)),
                seen: Mutex::new(None),
            })
        }
    }

    impl TrainingRoutine for FixedTrainer {
        fn name(&self) -> &str {
            "fixed"
        }

        fn check_available(&self) -> Result<(), String> {
            Ok(())
        }

        fn train(
            &self,
            _records: &[HistoricalRecord],
            options: &TrainingOptions,
            _ctx: &TrainingContext,
        ) -> Result<crate::trainer::TrainingOutput, TrainingError> {
            *self.seen.lock().unwrap() = Some(options.clone());
            self.result.lock().unwrap().take().unwrap()
        }
    }

    fn output(weights: Vec<f64>, retention: Option<f64>) -> crate::trainer::TrainingOutput {
        crate::trainer::TrainingOutput {
            weights,
            retention,
            diagnostics: vec![],
        }
    }

    fn runner(trainer: Arc<FixedTrainer>) -> JobRunner {
        JobRunner::new(Arc::new(OneDeck), Arc::new(OneDeck), trainer)
    }

    #[test]
    fn test_run_without_search_uses_default_retention() {
        let trainer = FixedTrainer::returning(Ok(output(vec![0.4, 0.6], Some(0.9))));
        let request = OptimizationRequest::new(42).with_retention_search(false);

        let result = runner(trainer.clone())
            .run(&request, &TrainingContext::detached())
            .unwrap();

        assert_eq!(result.deck_name, "Japanese");
        assert_eq!(result.weights, vec![0.4, 0.6]);
        assert_eq!(result.request_retention, DEFAULT_REQUEST_RETENTION);
        assert!(result.is_not_optimized);
        assert!(result.computed_at.is_some());
        assert!(!trainer.seen.lock().unwrap().as_ref().unwrap().search_optimal_retention);
    }

    #[test]
    fn test_run_with_search_uses_reported_retention() {
        let trainer = FixedTrainer::returning(Ok(output(vec![1.0], Some(0.87))));
        let request = OptimizationRequest::new(42).with_retention_search(true);

        let result = runner(trainer)
            .run(&request, &TrainingContext::detached())
            .unwrap();

        assert_eq!(result.request_retention, 0.87);
        assert!(!result.is_not_optimized);
    }

    #[test]
    fn test_run_with_search_but_no_retention_falls_back() {
        let trainer = FixedTrainer::returning(Ok(output(vec![1.0], None)));
        let request = OptimizationRequest::new(42).with_retention_search(true);

        let result = runner(trainer)
            .run(&request, &TrainingContext::detached())
            .unwrap();

        assert_eq!(result.request_retention, DEFAULT_REQUEST_RETENTION);
        assert!(!result.is_not_optimized);
    }

    #[test]
    fn test_non_finite_weights_fail_the_job() {
        for weights in [vec![0.4, f64::NAN], vec![f64::INFINITY]] {
            let trainer = FixedTrainer::returning(Ok(output(weights, None)));
            let request = OptimizationRequest::new(42).with_retention_search(false);

            let err = runner(trainer)
                .run(&request, &TrainingContext::detached())
                .unwrap_err();
            assert_eq!(err.kind, JobErrorKind::TrainingFailed);
        }
    }

    #[test]
    fn test_non_finite_retention_fails_the_job() {
        let trainer = FixedTrainer::returning(Ok(output(vec![1.0], Some(f64::NAN))));
        let request = OptimizationRequest::new(42).with_retention_search(true);

        let err = runner(trainer)
            .run(&request, &TrainingContext::detached())
            .unwrap_err();
        assert_eq!(err.kind, JobErrorKind::TrainingFailed);
    }

    #[test]
    fn test_overrides_reach_trainer_and_tunables() {
        let trainer = FixedTrainer::returning(Ok(output(vec![1.0], None)));
        let request = OptimizationRequest::new(42)
            .with_retention_search(false)
            .with_override("maximumInterval", json!(3650))
            .with_override("lossAversion", json!(2.5));

        let result = runner(trainer.clone())
            .run(&request, &TrainingContext::detached())
            .unwrap();

        assert_eq!(result.tunables.maximum_interval, 3650);
        let seen = trainer.seen.lock().unwrap();
        assert_eq!(
            seen.as_ref().unwrap().overrides.get("lossAversion"),
            Some(&json!(2.5))
        );
    }

    #[test]
    fn test_unknown_target() {
        let trainer = FixedTrainer::returning(Ok(output(vec![], None)));
        let err = runner(trainer)
            .run(&OptimizationRequest::new(7), &TrainingContext::detached())
            .unwrap_err();
        assert_eq!(err.kind, JobErrorKind::TargetNotFound);
    }

    #[test]
    fn test_unreadable_source_is_data_unavailable() {
        let trainer = FixedTrainer::returning(Ok(output(vec![], None)));
        let err = runner(trainer)
            .run(&OptimizationRequest::new(13), &TrainingContext::detached())
            .unwrap_err();
        assert_eq!(err.kind, JobErrorKind::DataUnavailable);
    }

    #[test]
    fn test_training_errors_map_to_kinds() {
        let cases = [
            (TrainingError::Cancelled, JobErrorKind::Cancelled),
            (
                TrainingError::Unavailable("no python".into()),
                JobErrorKind::DependencyMissing,
            ),
            (
                TrainingError::Failed("diverged".into()),
                JobErrorKind::TrainingFailed,
            ),
        ];
        for (err, kind) in cases {
            let trainer = FixedTrainer::returning(Err(err));
            let got = runner(trainer)
                .run(&OptimizationRequest::new(42), &TrainingContext::detached())
                .unwrap_err();
            assert_eq!(got.kind, kind);
        }
    }

    #[test]
    fn test_cancelled_before_start_skips_training() {
        let trainer = FixedTrainer::returning(Ok(output(vec![1.0], None)));
        let ctx = TrainingContext::detached();
        ctx.cancellation_token.cancel();

        let err = runner(trainer.clone())
            .run(&OptimizationRequest::new(42), &ctx)
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(trainer.seen.lock().unwrap().is_none());
    }
}
