mod file_config;

pub use file_config::{FileConfig, ProgressConfig, SchedulingConfig, TrainerConfig};

use crate::progress::ProgressSettings;
use crate::trainer::SchedulingOptions;
use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DATA_DIR_NAME: &str = ".fsrs4ankiHelper";
pub const DEFAULT_TRAINER_COMMAND: &str = "python -m fsrs4anki_optimizer";
pub const RESULTS_FILE_NAME: &str = "saved.json";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub data_dir: Option<PathBuf>,
    pub records_dir: Option<PathBuf>,
    pub trainer_command: Option<String>,
    pub progress_interval_ms: Option<u64>,
    pub timezone: Option<String>,
    pub rollover_hour: Option<u8>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub records_dir: PathBuf,
    pub trainer_command: String,
    pub progress: ProgressSettings,
    pub scheduling: SchedulingOptions,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .or_else(|| cli.data_dir.clone())
            .or_else(|| dirs::home_dir().map(|home| home.join(DEFAULT_DATA_DIR_NAME)))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "data_dir must be specified via --data-dir or in config file (no home directory found)"
                )
            })?;

        if data_dir.exists() && !data_dir.is_dir() {
            bail!("data_dir is not a directory: {:?}", data_dir);
        }

        let records_dir = file
            .records_dir
            .map(PathBuf::from)
            .or_else(|| cli.records_dir.clone())
            .unwrap_or_else(|| data_dir.join("records"));

        let trainer_command = file
            .trainer
            .and_then(|t| t.command)
            .or_else(|| cli.trainer_command.clone())
            .unwrap_or_else(|| DEFAULT_TRAINER_COMMAND.to_string());
        match shlex::split(&trainer_command) {
            Some(parts) if !parts.is_empty() => {}
            _ => bail!("Invalid trainer command: {:?}", trainer_command),
        }

        let progress_file = file.progress.unwrap_or_default();
        let defaults = ProgressSettings::default();
        let interval_ms = progress_file
            .interval_ms
            .or(cli.progress_interval_ms)
            .unwrap_or(defaults.interval.as_millis() as u64);
        if interval_ms == 0 {
            bail!("progress.interval_ms must be greater than 0");
        }
        let progress = ProgressSettings {
            interval: Duration::from_millis(interval_ms),
            buffer: progress_file.buffer.unwrap_or(defaults.buffer).max(1),
        };

        let sched_file = file.scheduling.unwrap_or_default();
        let sched_defaults = SchedulingOptions::default();
        let rollover_hour = sched_file
            .rollover_hour
            .or(cli.rollover_hour)
            .unwrap_or(sched_defaults.rollover_hour);
        if rollover_hour >= 24 {
            bail!("scheduling.rollover_hour must be in 0..24, got {}", rollover_hour);
        }
        let revlog_start_date = sched_file
            .revlog_start_date
            .unwrap_or(sched_defaults.revlog_start_date);
        if chrono::NaiveDate::parse_from_str(&revlog_start_date, "%Y-%m-%d").is_err() {
            bail!(
                "scheduling.revlog_start_date must be YYYY-MM-DD, got {:?}",
                revlog_start_date
            );
        }
        let scheduling = SchedulingOptions {
            rollover_hour,
            timezone: sched_file
                .timezone
                .or_else(|| cli.timezone.clone())
                .unwrap_or(sched_defaults.timezone),
            revlog_start_date,
            preview: sched_file.preview.unwrap_or(sched_defaults.preview),
        };

        Ok(Self {
            data_dir,
            records_dir,
            trainer_command,
            progress,
            scheduling,
        })
    }

    pub fn results_path(&self) -> PathBuf {
        self.data_dir.join(RESULTS_FILE_NAME)
    }
}
