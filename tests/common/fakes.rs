//! In-memory collaborators for driving the orchestrator in tests.

use super::constants::*;
use async_trait::async_trait;
use fsrs_helper::notifications::{Notification, NotificationSink, NotificationType};
use fsrs_helper::optimizer::{HistoricalRecord, PromptResponse, Prompter, Target, TrainingContext};
use fsrs_helper::sources::{RecordProvider, SourceError, TargetDirectory};
use fsrs_helper::trainer::{TrainingError, TrainingOptions, TrainingOutput, TrainingRoutine};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

// ============================================================================
// Data source
// ============================================================================

pub struct StaticSource {
    decks: HashMap<Target, (String, Vec<HistoricalRecord>)>,
}

pub fn review(record_id: i64) -> HistoricalRecord {
    HistoricalRecord {
        record_id,
        entity_id: 1000 + record_id,
        outcome: 3,
        interval_before: 1,
        interval_after: 4,
        factor: 2500,
        elapsed_ms: 6000,
        event_type: 1,
    }
}

impl StaticSource {
    pub fn with_default_decks() -> Self {
        let mut decks = HashMap::new();
        decks.insert(
            Target::Id(JAPANESE_DECK_ID),
            (JAPANESE_DECK_NAME.to_string(), Vec::new()),
        );
        decks.insert(
            Target::Id(SPANISH_DECK_ID),
            (SPANISH_DECK_NAME.to_string(), vec![review(1)]),
        );
        decks.insert(
            Target::Id(DEFAULT_DECK_ID),
            (
                DEFAULT_DECK_NAME.to_string(),
                (1..=DEFAULT_DECK_RECORDS as i64).map(review).collect(),
            ),
        );
        Self { decks }
    }
}

impl TargetDirectory for StaticSource {
    fn display_name(&self, target: &Target) -> Result<String, SourceError> {
        self.decks
            .get(target)
            .map(|(name, _)| name.clone())
            .ok_or_else(|| SourceError::TargetNotFound(target.clone()))
    }
}

impl RecordProvider for StaticSource {
    fn records(&self, target: &Target) -> Result<Vec<HistoricalRecord>, SourceError> {
        self.decks
            .get(target)
            .map(|(_, records)| records.clone())
            .ok_or_else(|| SourceError::TargetNotFound(target.clone()))
    }
}

// ============================================================================
// Trainer
// ============================================================================

/// Blocks a trainer until the test opens it.
pub struct Gate {
    open: Mutex<bool>,
    cv: Condvar,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            open: Mutex::new(false),
            cv: Condvar::new(),
        })
    }

    pub fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.cv.notify_all();
    }

    /// Wait until opened or cancelled. Returns true when cancelled.
    fn wait(&self, ctx: &TrainingContext) -> bool {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut open = self.open.lock().unwrap();
        loop {
            if *open {
                return false;
            }
            if ctx.is_cancelled() {
                return true;
            }
            assert!(Instant::now() < deadline, "gate was never opened");
            open = self
                .cv
                .wait_timeout(open, Duration::from_millis(5))
                .unwrap()
                .0;
        }
    }
}

#[derive(Clone)]
pub enum TrainerBehavior {
    Succeed {
        weights: Vec<f64>,
        retention: Option<f64>,
    },
    Fail(String),
    Panic,
}

pub struct ScriptedTrainer {
    behavior: TrainerBehavior,
    availability: Result<(), String>,
    gate: Option<Arc<Gate>>,
    honours_cancel: bool,
    progress_steps: u64,
    calls: AtomicUsize,
    last_options: Mutex<Option<TrainingOptions>>,
    last_record_count: Mutex<Option<usize>>,
}

impl ScriptedTrainer {
    fn with_behavior(behavior: TrainerBehavior) -> Self {
        Self {
            behavior,
            availability: Ok(()),
            gate: None,
            honours_cancel: false,
            progress_steps: 0,
            calls: AtomicUsize::new(0),
            last_options: Mutex::new(None),
            last_record_count: Mutex::new(None),
        }
    }

    pub fn succeeding(weights: &[f64], retention: Option<f64>) -> Self {
        Self::with_behavior(TrainerBehavior::Succeed {
            weights: weights.to_vec(),
            retention,
        })
    }

    pub fn failing(message: &str) -> Self {
        Self::with_behavior(TrainerBehavior::Fail(message.to_string()))
    }

    pub fn panicking() -> Self {
        Self::with_behavior(TrainerBehavior::Panic)
    }

    pub fn unavailable(guidance: &str) -> Self {
        let mut trainer = Self::succeeding(&[1.0], None);
        trainer.availability = Err(guidance.to_string());
        trainer
    }

    pub fn gated(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn honouring_cancel(mut self) -> Self {
        self.honours_cancel = true;
        self
    }

    pub fn with_progress(mut self, steps: u64) -> Self {
        self.progress_steps = steps;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_options(&self) -> Option<TrainingOptions> {
        self.last_options.lock().unwrap().clone()
    }

    pub fn last_record_count(&self) -> Option<usize> {
        *self.last_record_count.lock().unwrap()
    }
}

impl TrainingRoutine for ScriptedTrainer {
    fn name(&self) -> &str {
        "scripted"
    }

    fn check_available(&self) -> Result<(), String> {
        self.availability.clone()
    }

    fn train(
        &self,
        records: &[HistoricalRecord],
        options: &TrainingOptions,
        ctx: &TrainingContext,
    ) -> Result<TrainingOutput, TrainingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock().unwrap() = Some(options.clone());
        *self.last_record_count.lock().unwrap() = Some(records.len());

        for step in 1..=self.progress_steps {
            ctx.report("Training", step, self.progress_steps);
        }

        let cancelled = match &self.gate {
            Some(gate) => gate.wait(ctx),
            None => ctx.is_cancelled(),
        };
        if cancelled && self.honours_cancel {
            return Err(TrainingError::Cancelled);
        }

        match &self.behavior {
            TrainerBehavior::Succeed { weights, retention } => Ok(TrainingOutput {
                weights: weights.clone(),
                retention: *retention,
                diagnostics: Vec::new(),
            }),
            TrainerBehavior::Fail(message) => Err(TrainingError::Failed(message.clone())),
            TrainerBehavior::Panic => panic!("scripted trainer panic"),
        }
    }
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn all(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn terminal(&self) -> Vec<Notification> {
        self.all().into_iter().filter(|n| n.is_terminal()).collect()
    }

    pub fn of_type(&self, notification_type: NotificationType) -> Vec<Notification> {
        self.all()
            .into_iter()
            .filter(|n| n.notification_type() == notification_type)
            .collect()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}

// ============================================================================
// Prompts
// ============================================================================

/// Always answers the same, counting how often it was asked.
pub struct ScriptedPrompter {
    response: PromptResponse,
    asked: AtomicUsize,
}

impl ScriptedPrompter {
    pub fn new(response: PromptResponse) -> Self {
        Self {
            response,
            asked: AtomicUsize::new(0),
        }
    }

    pub fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn ask_retention_search(&self, _target: &Target) -> PromptResponse {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.response
    }
}

/// Keeps the prompt open until the test sends an answer.
pub struct HeldPrompter {
    answers: tokio::sync::Mutex<mpsc::UnboundedReceiver<PromptResponse>>,
}

pub fn held_prompter() -> (Arc<HeldPrompter>, mpsc::UnboundedSender<PromptResponse>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        Arc::new(HeldPrompter {
            answers: tokio::sync::Mutex::new(rx),
        }),
        tx,
    )
}

#[async_trait]
impl Prompter for HeldPrompter {
    async fn ask_retention_search(&self, _target: &Target) -> PromptResponse {
        self.answers
            .lock()
            .await
            .recv()
            .await
            .unwrap_or(PromptResponse::Cancel)
    }
}
