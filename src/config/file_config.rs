use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub data_dir: Option<String>,
    pub records_dir: Option<String>,

    // Sections
    pub progress: Option<ProgressConfig>,
    pub scheduling: Option<SchedulingConfig>,
    pub trainer: Option<TrainerConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ProgressConfig {
    pub interval_ms: Option<u64>,
    pub buffer: Option<usize>,
}

/// Forwarded to the training routine as-is.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SchedulingConfig {
    pub rollover_hour: Option<u8>,
    pub timezone: Option<String>,
    pub revlog_start_date: Option<String>,
    pub preview: Option<bool>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct TrainerConfig {
    /// Shell-style command line, e.g. "python -m fsrs4anki_optimizer".
    pub command: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
