use super::context::TrainingContext;
use super::handle::{JobHandle, JobOutcome, Submission};
use super::job::{JobError, JobErrorKind};
use super::models::{JobState, OptimizationRequest, OptimizationResult, Target};
use super::prompt::{PromptResponse, Prompter};
use super::runner::JobRunner;
use crate::metrics;
use crate::notifications::{Notification, NotificationSink};
use crate::progress::ProgressChannel;
use crate::result_store::ResultStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// The process-wide job slot.
#[derive(Debug, Default)]
struct Slot {
    state: JobState,
    job_id: Option<u64>,
    description: String,
}

fn lock_slot(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Exclusive ownership of the slot. Dropping it puts the slot back to Idle,
/// whichever way the job ended.
struct SlotGuard {
    slot: Arc<Mutex<Slot>>,
    job_id: u64,
}

impl SlotGuard {
    /// Check-and-set under one lock. On failure returns the running job's description.
    fn try_acquire(slot: &Arc<Mutex<Slot>>, job_id: u64, description: String) -> Result<Self, String> {
        let mut current = lock_slot(slot);
        if current.state.is_busy() {
            return Err(current.description.clone());
        }
        *current = Slot {
            state: JobState::Confirming,
            job_id: Some(job_id),
            description,
        };
        Ok(Self {
            slot: Arc::clone(slot),
            job_id,
        })
    }

    fn set_state(&self, state: JobState) {
        lock_slot(&self.slot).state = state;
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        *lock_slot(&self.slot) = Slot::default();
        metrics::set_optimization_running(false);
        debug!("Job {} released the optimizer slot", self.job_id);
    }
}

fn describe(slot: &Mutex<Slot>, job_id: u64, description: String) {
    let mut current = lock_slot(slot);
    if current.job_id == Some(job_id) {
        current.description = description;
    }
}

/// Runs at most one optimization at a time, process-wide.
///
/// A submission either takes the slot or is turned away with a busy
/// notification. An accepted job runs on a blocking worker; its completion
/// path commits the result, emits exactly one terminal notification and
/// releases the slot before the [`JobHandle`] resolves.
pub struct SingleFlightOrchestrator {
    slot: Arc<Mutex<Slot>>,
    runner: Arc<JobRunner>,
    store: Arc<dyn ResultStore>,
    notifier: Arc<dyn NotificationSink>,
    prompter: Arc<dyn Prompter>,
    progress: ProgressChannel,
    shutdown_token: CancellationToken,
    next_job_id: AtomicU64,
    runs_started: AtomicU64,
    running_task: Mutex<Option<JoinHandle<()>>>,
}

impl SingleFlightOrchestrator {
    pub fn new(
        runner: JobRunner,
        store: Arc<dyn ResultStore>,
        notifier: Arc<dyn NotificationSink>,
        prompter: Arc<dyn Prompter>,
        progress: ProgressChannel,
    ) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot::default())),
            runner: Arc::new(runner),
            store,
            notifier,
            prompter,
            progress,
            shutdown_token: CancellationToken::new(),
            next_job_id: AtomicU64::new(0),
            runs_started: AtomicU64::new(0),
            running_task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> JobState {
        lock_slot(&self.slot).state
    }

    /// Description of the job holding the slot, if any.
    pub fn current_description(&self) -> Option<String> {
        let slot = lock_slot(&self.slot);
        slot.state.is_busy().then(|| slot.description.clone())
    }

    /// Number of jobs that entered Running since construction.
    pub fn runs_started(&self) -> u64 {
        self.runs_started.load(Ordering::SeqCst)
    }

    pub fn store(&self) -> &Arc<dyn ResultStore> {
        &self.store
    }

    /// Submit an optimization.
    ///
    /// Returns once the job is running in the background, or as soon as it is
    /// known that it won't run. When the request leaves the retention search
    /// open the user is asked first; the slot is held while the prompt is open.
    pub async fn submit(&self, request: OptimizationRequest) -> Submission {
        let target = request.target.clone();

        let runner = Arc::clone(&self.runner);
        let availability = tokio::task::spawn_blocking(move || runner.trainer().check_available())
            .await
            .unwrap_or_else(|e| Err(format!("Dependency check failed: {}", e)));
        if let Err(guidance) = availability {
            warn!("Optimizer dependency missing, not optimizing {}", target);
            self.notifier.notify(Notification::DependencyMissing {
                guidance: guidance.clone(),
            });
            return Submission::DependencyMissing { guidance };
        }

        let job_id = self.next_job_id.fetch_add(1, Ordering::SeqCst) + 1;
        let guard = match SlotGuard::try_acquire(&self.slot, job_id, format!("Optimizing {}", target)) {
            Ok(guard) => guard,
            Err(description) => {
                info!(
                    "Rejecting optimization of {}: '{}' is still running",
                    target, description
                );
                metrics::record_submission_rejected();
                self.notifier.notify(Notification::Busy {
                    description: description.clone(),
                });
                return Submission::Rejected { description };
            }
        };

        let mut request = request;
        if request.search_optimal_retention.is_none() {
            let response = self.prompter.ask_retention_search(&target).await;
            debug!("Retention prompt for {} answered {:?}", target, response);
            match response {
                PromptResponse::Yes => request.search_optimal_retention = Some(true),
                PromptResponse::No => request.search_optimal_retention = Some(false),
                PromptResponse::Cancel => {
                    info!("Optimization of {} cancelled before start", target);
                    self.notifier.notify(Notification::Cancelled { target });
                    drop(guard);
                    return Submission::Cancelled;
                }
            }
        }

        guard.set_state(JobState::Running);
        metrics::set_optimization_running(true);
        self.runs_started.fetch_add(1, Ordering::SeqCst);

        let cancellation_token = self.shutdown_token.child_token();
        let ctx = TrainingContext::new(
            cancellation_token.clone(),
            Arc::new(self.progress.emitter(job_id)),
        );
        let (outcome_tx, outcome_rx) = oneshot::channel();

        info!(
            "Starting optimization job {} for target {} (retention search: {})",
            job_id,
            target,
            request.search_optimal_retention.unwrap_or(false)
        );

        let runner = Arc::clone(&self.runner);
        let store = Arc::clone(&self.store);
        let notifier = Arc::clone(&self.notifier);
        let worker_notifier = Arc::clone(&self.notifier);
        let slot = Arc::clone(&self.slot);
        let job_target = target.clone();

        let task = tokio::spawn(async move {
            let start = Instant::now();
            let joined = tokio::task::spawn_blocking(move || {
                let description = match runner.display_name(&request.target) {
                    Ok(name) => format!("Optimizing {}", name),
                    Err(_) => format!("Optimizing {}", request.target),
                };
                describe(&slot, job_id, description.clone());
                worker_notifier.notify(Notification::Started {
                    job_id,
                    target: request.target.clone(),
                    description,
                });
                runner.run(&request, &ctx)
            })
            .await;

            guard.set_state(JobState::Completing);
            let outcome = complete(job_id, &job_target, joined, store.as_ref(), notifier.as_ref());

            let elapsed = start.elapsed();
            metrics::record_optimization_run(outcome.label(), elapsed);
            info!(
                "Optimization job {} for {} finished in {:?}: {}",
                job_id,
                job_target,
                elapsed,
                outcome.label()
            );

            drop(guard);
            // The caller may have dropped its handle.
            let _ = outcome_tx.send(outcome);
        });

        *self
            .running_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(task);

        Submission::Accepted(JobHandle::new(job_id, target, cancellation_token, outcome_rx))
    }

    /// Cancel the running job, if any, and wait for its completion path to finish.
    pub async fn shutdown(&self) {
        info!("Shutting down optimizer...");
        self.shutdown_token.cancel();

        let task = self
            .running_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!("Optimizer task failed during shutdown: {}", e);
            }
        }
        info!("Optimizer shutdown complete");
    }
}

/// Completion path. Exactly one branch runs and emits exactly one terminal notification.
fn complete(
    job_id: u64,
    target: &Target,
    joined: Result<Result<OptimizationResult, JobError>, JoinError>,
    store: &dyn ResultStore,
    notifier: &dyn NotificationSink,
) -> JobOutcome {
    match joined {
        Ok(Ok(result)) => match store.upsert(target, result.clone()) {
            Ok(()) => {
                info!("Stored parameters for {} ({})", target, result.deck_name);
                let listing = store.serialize_all().unwrap_or_else(|e| {
                    warn!("Could not render stored parameters: {}", e);
                    String::new()
                });
                notifier.notify(Notification::Succeeded {
                    result: result.clone(),
                    listing,
                });
                JobOutcome::Succeeded(result)
            }
            Err(e) => {
                error!(
                    "Job {} produced parameters for {} but saving them failed: {}",
                    job_id, target, e
                );
                let error = JobError::new(JobErrorKind::StoreFailed, e.to_string());
                notifier.notify(Notification::Failed {
                    target: target.clone(),
                    error: error.clone(),
                });
                JobOutcome::Failed(error)
            }
        },
        Ok(Err(e)) if e.is_cancelled() => {
            info!("Job {} for {} was cancelled", job_id, target);
            notifier.notify(Notification::Cancelled {
                target: target.clone(),
            });
            JobOutcome::Cancelled
        }
        Ok(Err(e)) => {
            error!("Job {} for {} failed: {}", job_id, target, e);
            notifier.notify(Notification::Failed {
                target: target.clone(),
                error: e.clone(),
            });
            JobOutcome::Failed(e)
        }
        Err(e) => {
            error!("Job {} for {} panicked: {}", job_id, target, e);
            let error = JobError::training_failed(format!("optimizer panicked: {}", e));
            notifier.notify(Notification::Failed {
                target: target.clone(),
                error: error.clone(),
            });
            JobOutcome::Failed(error)
        }
    }
}
