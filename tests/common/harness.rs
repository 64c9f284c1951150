//! Orchestrator wired to fakes and a results file in a temp directory.

use super::fakes::{RecordingNotifier, ScriptedPrompter, ScriptedTrainer, StaticSource};
use fsrs_helper::optimizer::{
    JobRunner, JobState, OptimizationRequest, PromptResponse, Prompter, SingleFlightOrchestrator,
    Submission,
};
use fsrs_helper::progress::{progress_channel, ProgressSettings, ProgressSubscriber};
use fsrs_helper::result_store::{FileResultStore, ResultMap, ResultStore};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub struct TestHarness {
    pub orchestrator: Arc<SingleFlightOrchestrator>,
    pub store: Arc<FileResultStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub trainer: Arc<ScriptedTrainer>,
    pub progress: ProgressSubscriber,
    _data_dir: TempDir,
}

impl TestHarness {
    /// Harness whose retention prompt always answers yes.
    pub fn new(trainer: ScriptedTrainer) -> Self {
        Self::with_prompter(trainer, Arc::new(ScriptedPrompter::new(PromptResponse::Yes)))
    }

    pub fn with_prompter(trainer: ScriptedTrainer, prompter: Arc<dyn Prompter>) -> Self {
        // No throttling, so every reported step reaches the subscriber.
        let settings = ProgressSettings {
            interval: Duration::ZERO,
            buffer: 1024,
        };
        Self::build(trainer, prompter, settings)
    }

    /// Harness with custom progress throttling and buffering.
    pub fn with_progress_settings(trainer: ScriptedTrainer, settings: ProgressSettings) -> Self {
        Self::build(
            trainer,
            Arc::new(ScriptedPrompter::new(PromptResponse::Yes)),
            settings,
        )
    }

    fn build(
        trainer: ScriptedTrainer,
        prompter: Arc<dyn Prompter>,
        settings: ProgressSettings,
    ) -> Self {
        let data_dir = TempDir::new().expect("Failed to create temp dir");
        let store = Arc::new(
            FileResultStore::open(data_dir.path().join("saved.json"))
                .expect("Failed to open result store"),
        );
        let notifier = Arc::new(RecordingNotifier::default());
        let trainer = Arc::new(trainer);
        let source = Arc::new(StaticSource::with_default_decks());

        let (progress_tx, progress) = progress_channel(&settings);

        let runner = JobRunner::new(source.clone(), source, trainer.clone());
        let orchestrator = Arc::new(SingleFlightOrchestrator::new(
            runner,
            store.clone(),
            notifier.clone(),
            prompter,
            progress_tx,
        ));

        Self {
            orchestrator,
            store,
            notifier,
            trainer,
            progress,
            _data_dir: data_dir,
        }
    }

    pub async fn submit(&self, request: OptimizationRequest) -> Submission {
        self.orchestrator.submit(request).await
    }

    pub fn stored(&self) -> ResultMap {
        self.store.load().expect("Failed to load results")
    }

    /// Poll until the slot reaches `state`. Panics after a few seconds.
    pub async fn wait_for_state(&self, state: JobState) {
        wait_for_state(&self.orchestrator, state).await
    }
}

pub async fn wait_for_state(orchestrator: &SingleFlightOrchestrator, state: JobState) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while orchestrator.state() != state {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
    assert!(
        waited.is_ok(),
        "slot never reached {}, still {}",
        state,
        orchestrator.state()
    );
}
