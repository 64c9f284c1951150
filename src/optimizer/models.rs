use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::fmt;

/// Retention requested when no optimal-retention search was performed.
pub const DEFAULT_REQUEST_RETENTION: f64 = 0.8;
pub const DEFAULT_MAXIMUM_INTERVAL: u32 = 36500;
pub const DEFAULT_EASY_BONUS: f64 = 1.3;
pub const DEFAULT_HARD_INTERVAL: f64 = 1.2;

/// Identifier of the record collection an optimization runs for.
///
/// Supplied by the caller, never generated here. Numeric ids (deck ids) and
/// free-form names are both accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Target {
    Id(i64),
    Name(String),
}

impl Target {
    /// Parse a target from user input. Anything that looks like an integer is an id.
    pub fn parse(s: &str) -> Self {
        match s.trim().parse::<i64>() {
            Ok(id) => Target::Id(id),
            Err(_) => Target::Name(s.trim().to_string()),
        }
    }

    /// Key of this target in the persisted results file.
    ///
    /// Names are prefixed so `Id(42)` and `Name("42")` never share a key.
    pub fn storage_key(&self) -> String {
        match self {
            Target::Id(id) => id.to_string(),
            Target::Name(name) => format!("name:{}", name),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Id(id) => write!(f, "{}", id),
            Target::Name(name) => write!(f, "{}", name),
        }
    }
}

impl From<i64> for Target {
    fn from(id: i64) -> Self {
        Target::Id(id)
    }
}

impl From<&str> for Target {
    fn from(name: &str) -> Self {
        Target::Name(name.to_string())
    }
}

/// One observed review event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    pub record_id: i64,
    pub entity_id: i64,
    /// Review outcome (1 = again .. 4 = easy).
    pub outcome: u8,
    pub interval_before: i64,
    pub interval_after: i64,
    pub factor: i64,
    /// Milliseconds spent on the review.
    pub elapsed_ms: i64,
    /// Event type (learn, review, relearn, filtered, manual).
    pub event_type: u8,
}

/// A single optimization invocation. Not mutated after dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationRequest {
    pub target: Target,
    /// `None` means the user is asked before the job starts.
    pub search_optimal_retention: Option<bool>,
    pub overrides: JsonMap<String, JsonValue>,
}

impl OptimizationRequest {
    pub fn new(target: impl Into<Target>) -> Self {
        Self {
            target: target.into(),
            search_optimal_retention: None,
            overrides: JsonMap::new(),
        }
    }

    pub fn with_retention_search(mut self, search: bool) -> Self {
        self.search_optimal_retention = Some(search);
        self
    }

    pub fn with_override(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.overrides.insert(key.into(), value);
        self
    }
}

/// Scheduler tunables that are not learned by the training routine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tunables {
    pub maximum_interval: u32,
    pub easy_bonus: f64,
    pub hard_interval: f64,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            maximum_interval: DEFAULT_MAXIMUM_INTERVAL,
            easy_bonus: DEFAULT_EASY_BONUS,
            hard_interval: DEFAULT_HARD_INTERVAL,
        }
    }
}

impl Tunables {
    /// Defaults, with any matching numeric entry from `overrides` applied.
    pub fn from_overrides(overrides: &JsonMap<String, JsonValue>) -> Self {
        let mut tunables = Self::default();
        if let Some(v) = overrides.get("maximumInterval").and_then(JsonValue::as_u64) {
            tunables.maximum_interval = u32::try_from(v).unwrap_or(u32::MAX);
        }
        if let Some(v) = overrides.get("easyBonus").and_then(JsonValue::as_f64) {
            tunables.easy_bonus = v;
        }
        if let Some(v) = overrides.get("hardInterval").and_then(JsonValue::as_f64) {
            tunables.hard_interval = v;
        }
        tunables
    }
}

/// Outcome of a successful optimization. Owned by the result store once committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationResult {
    pub target: Target,
    pub deck_name: String,
    #[serde(rename = "w")]
    pub weights: Vec<f64>,
    pub request_retention: f64,
    /// True when no optimal-retention search was requested.
    pub is_not_optimized: bool,
    #[serde(flatten)]
    pub tunables: Tunables,
    /// RFC 3339 timestamp of when the job produced this result.
    #[serde(default)]
    pub computed_at: Option<String>,
}

impl OptimizationResult {
    /// False when any parameter is NaN or infinite. JSON cannot carry those.
    pub fn is_finite(&self) -> bool {
        self.weights.iter().all(|w| w.is_finite())
            && self.request_retention.is_finite()
            && self.tunables.easy_bonus.is_finite()
            && self.tunables.hard_interval.is_finite()
    }
}

/// Lifecycle of the single optimization slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobState {
    #[default]
    Idle,
    /// Slot reserved, waiting on the pre-flight prompt. No computation yet.
    Confirming,
    Running,
    Completing,
}

impl JobState {
    pub fn is_busy(self) -> bool {
        !matches!(self, JobState::Idle)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Idle => write!(f, "idle"),
            JobState::Confirming => write!(f, "confirming"),
            JobState::Running => write!(f, "running"),
            JobState::Completing => write!(f, "completing"),
        }
    }
}
