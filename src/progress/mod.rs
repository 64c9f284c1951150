//! Progress reporting from the optimization worker to the interactive layer.
//!
//! The worker side holds a [`ProgressEmitter`] (one per job) and reports
//! `(stage, completed, total)` triples at whatever cadence the training routine
//! likes. The emitter rate-limits them and pushes the survivors into a bounded
//! channel. The interactive side owns the [`ProgressSubscriber`] and pumps it
//! from its own loop, so handlers never run on the worker thread.
//!
//! Reporting never blocks the worker. When the channel is full, intermediate
//! updates are dropped and terminal ones are parked in an overflow slot (latest
//! per job) that the subscriber reads once the channel is empty.

use crate::metrics;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{
    self,
    error::{TryRecvError, TrySendError},
};
use tokio::sync::Notify;
use tracing::{debug, trace};

/// One progress event as seen by the interactive layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub job_id: u64,
    pub stage: String,
    pub completed: u64,
    pub total: u64,
}

impl ProgressUpdate {
    /// Percentage complete, or `None` when the total is unknown (zero).
    pub fn percent(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        Some(100.0 * self.completed as f64 / self.total as f64)
    }

    /// The final update of a stage. Never dropped by rate limiting.
    pub fn is_terminal(&self) -> bool {
        self.total > 0 && self.completed >= self.total
    }

    /// Tooltip-style text for the update.
    pub fn to_message(&self) -> String {
        match self.percent() {
            Some(pct) => format!("{}: {:.0}%", self.stage, pct),
            None => self.stage.clone(),
        }
    }
}

/// Capability handed to training routines for reporting progress.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, stage: &str, completed: u64, total: u64);
}

/// Reporter that discards everything.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _stage: &str, _completed: u64, _total: u64) {}
}

/// Rate limiting and buffering for the progress channel.
#[derive(Debug, Clone)]
pub struct ProgressSettings {
    /// Minimum spacing between two forwarded non-terminal updates.
    pub interval: Duration,
    /// Capacity of the channel between worker and interactive loop.
    pub buffer: usize,
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            buffer: 64,
        }
    }
}

/// Terminal updates that didn't fit in the channel.
#[derive(Default)]
struct Overflow {
    terminals: Mutex<VecDeque<ProgressUpdate>>,
    notify: Notify,
}

impl Overflow {
    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<ProgressUpdate>> {
        self.terminals
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Park `update`, replacing an older one of the same job. Returns true when one was replaced.
    fn park(&self, update: ProgressUpdate) -> bool {
        let replaced = {
            let mut terminals = self.lock();
            match terminals.iter_mut().find(|u| u.job_id == update.job_id) {
                Some(older) => {
                    *older = update;
                    true
                }
                None => {
                    terminals.push_back(update);
                    false
                }
            }
        };
        self.notify.notify_one();
        replaced
    }

    fn take(&self) -> Option<ProgressUpdate> {
        self.lock().pop_front()
    }
}

/// Worker-facing end of the progress channel. Hands out one emitter per job.
#[derive(Clone)]
pub struct ProgressChannel {
    tx: mpsc::Sender<ProgressUpdate>,
    overflow: Arc<Overflow>,
    interval: Duration,
}

/// Create a progress channel and its interactive-side subscriber.
pub fn progress_channel(settings: &ProgressSettings) -> (ProgressChannel, ProgressSubscriber) {
    let (tx, rx) = mpsc::channel(settings.buffer.max(1));
    let overflow = Arc::new(Overflow::default());
    (
        ProgressChannel {
            tx,
            overflow: Arc::clone(&overflow),
            interval: settings.interval,
        },
        ProgressSubscriber { rx, overflow },
    )
}

impl ProgressChannel {
    /// Emitter for a single job, with its own rate-limiting window.
    pub fn emitter(&self, job_id: u64) -> ProgressEmitter {
        ProgressEmitter {
            job_id,
            tx: self.tx.clone(),
            overflow: Arc::clone(&self.overflow),
            interval: self.interval,
            last_forwarded: Mutex::new(None),
        }
    }
}

/// Rate-limited sender used from the worker thread. Never blocks.
pub struct ProgressEmitter {
    job_id: u64,
    tx: mpsc::Sender<ProgressUpdate>,
    overflow: Arc<Overflow>,
    interval: Duration,
    last_forwarded: Mutex<Option<Instant>>,
}

impl ProgressEmitter {
    pub fn job_id(&self) -> u64 {
        self.job_id
    }

    /// Decide whether an update arriving now passes the rate limit.
    fn admit(&self, terminal: bool) -> bool {
        let now = Instant::now();
        let mut last = self
            .last_forwarded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !terminal {
            if let Some(prev) = *last {
                if now.duration_since(prev) < self.interval {
                    return false;
                }
            }
        }
        *last = Some(now);
        true
    }
}

impl ProgressReporter for ProgressEmitter {
    fn report(&self, stage: &str, completed: u64, total: u64) {
        let update = ProgressUpdate {
            job_id: self.job_id,
            stage: stage.to_string(),
            completed,
            total,
        };
        let terminal = update.is_terminal();

        if !self.admit(terminal) {
            trace!(
                "Throttled progress update for job {}: {}",
                self.job_id,
                update.to_message()
            );
            return;
        }

        match self.tx.try_send(update) {
            Ok(()) => {}
            Err(TrySendError::Full(update)) if terminal => {
                debug!(
                    "Progress buffer full, parking terminal update for job {}",
                    self.job_id
                );
                if self.overflow.park(update) {
                    metrics::record_progress_dropped();
                }
            }
            Err(TrySendError::Full(update)) => {
                metrics::record_progress_dropped();
                debug!(
                    "Progress buffer full, dropping update for job {}: {}",
                    self.job_id,
                    update.to_message()
                );
            }
            Err(TrySendError::Closed(_)) => {
                trace!("Progress subscriber gone for job {}", self.job_id);
            }
        }
    }
}

/// Interactive-side end of the progress channel.
///
/// Buffered updates come first, parked terminal updates after them.
pub struct ProgressSubscriber {
    rx: mpsc::Receiver<ProgressUpdate>,
    overflow: Arc<Overflow>,
}

impl ProgressSubscriber {
    /// Wait for the next update. `None` once every emitter and the channel are gone.
    pub async fn recv(&mut self) -> Option<ProgressUpdate> {
        loop {
            match self.rx.try_recv() {
                Ok(update) => return Some(update),
                Err(TryRecvError::Disconnected) => return self.overflow.take(),
                Err(TryRecvError::Empty) => {}
            }
            if let Some(update) = self.overflow.take() {
                return Some(update);
            }
            tokio::select! {
                update = self.rx.recv() => {
                    return match update {
                        Some(update) => Some(update),
                        None => self.overflow.take(),
                    };
                }
                _ = self.overflow.notify.notified() => {}
            }
        }
    }

    /// Deliver everything already buffered without waiting. Returns how many were delivered.
    pub fn drain<F>(&mut self, mut handler: F) -> usize
    where
        F: FnMut(ProgressUpdate),
    {
        let mut delivered = 0;
        while let Ok(update) = self.rx.try_recv() {
            handler(update);
            delivered += 1;
        }
        while let Some(update) = self.overflow.take() {
            handler(update);
            delivered += 1;
        }
        delivered
    }

    /// Pump updates into `handler` on the calling task until the channel closes.
    pub async fn subscribe<F>(mut self, mut handler: F)
    where
        F: FnMut(ProgressUpdate),
    {
        while let Some(update) = self.recv().await {
            handler(update);
        }
    }
}
