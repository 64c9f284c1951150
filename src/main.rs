use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fsrs_helper::cli_style::{self, get_styles};
use fsrs_helper::config::{AppConfig, CliConfig, FileConfig};
use fsrs_helper::metrics;
use fsrs_helper::notifications::{ChannelNotifier, Notification, NotificationSink, TracingNotifier};
use fsrs_helper::optimizer::{
    ConsolePrompter, FixedPrompter, JobOutcome, JobRunner, OptimizationRequest, PromptResponse,
    Prompter, SingleFlightOrchestrator, Submission, Target,
};
use fsrs_helper::progress::{progress_channel, ProgressSubscriber};
use fsrs_helper::result_store::{FileResultStore, ResultStore};
use fsrs_helper::sources::JsonRecordSource;
use fsrs_helper::trainer::ExternalTrainer;
use indicatif::ProgressBar;
use serde_json::Value as JsonValue;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

/// Parse `key=value`. The value is read as JSON when possible, as a string otherwise.
fn parse_override(s: &str) -> Result<(String, JsonValue)> {
    let (key, value) = s
        .split_once('=')
        .with_context(|| format!("Override must look like key=value, got {:?}", s))?;
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("Override key is empty in {:?}", s);
    }
    let value = serde_json::from_str(value.trim())
        .unwrap_or_else(|_| JsonValue::String(value.trim().to_string()));
    Ok((key.to_string(), value))
}

#[derive(Parser, Debug)]
#[command(
    name = "fsrs-helper",
    version = concat!(env!("CARGO_PKG_VERSION"), "-", env!("GIT_HASH")),
    about = "Optimize FSRS scheduler parameters, one deck at a time"
)]
#[command(styles = get_styles())]
struct CliArgs {
    /// Path to a TOML config file. Its values override command line flags.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding saved.json (default: ~/.fsrs4ankiHelper).
    #[clap(long, value_parser = parse_path)]
    pub data_dir: Option<PathBuf>,

    /// Directory with one JSON review export per target (`<id>.json` or `name-<encoded name>.json`).
    #[clap(long, value_parser = parse_path)]
    pub records_dir: Option<PathBuf>,

    /// Command used to launch the optimizer.
    #[clap(long)]
    pub trainer_command: Option<String>,

    /// Minimum spacing of progress updates, in milliseconds.
    #[clap(long)]
    pub progress_interval_ms: Option<u64>,

    /// Timezone forwarded to the optimizer.
    #[clap(long)]
    pub timezone: Option<String>,

    /// Hour at which a new scheduling day starts.
    #[clap(long)]
    pub rollover_hour: Option<u8>,

    /// Log notifications instead of drawing progress and styled messages.
    #[clap(long)]
    pub plain: bool,

    /// Print Prometheus metrics after the command.
    #[clap(long)]
    pub print_metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Optimize the parameters of one target (deck id or name).
    Optimize {
        target: String,

        /// Also search for the optimal retention.
        #[clap(long, conflicts_with = "no_search_retention")]
        search_retention: bool,

        /// Skip the optimal retention search.
        #[clap(long)]
        no_search_retention: bool,

        /// Answer yes to the retention question instead of asking.
        #[clap(short = 'y', long)]
        yes: bool,

        /// Extra option for the optimizer, as key=value. Repeatable.
        #[clap(short = 'o', long = "override", value_parser = parse_override)]
        overrides: Vec<(String, JsonValue)>,
    },

    /// Print every stored result, followed by the deckParams listing.
    List,

    /// Show the stored result of one target.
    Show { target: String },
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            data_dir: self.data_dir.clone(),
            records_dir: self.records_dir.clone(),
            trainer_command: self.trainer_command.clone(),
            progress_interval_ms: self.progress_interval_ms,
            timezone: self.timezone.clone(),
            rollover_hour: self.rollover_hour,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = cli_args
        .config
        .as_deref()
        .map(FileConfig::load)
        .transpose()?;
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    metrics::init_metrics();

    let store = Arc::new(
        FileResultStore::open(config.results_path())
            .with_context(|| format!("Failed to open results in {:?}", config.data_dir))?,
    );

    let success = match &cli_args.command {
        Command::Optimize {
            target,
            search_retention,
            no_search_retention,
            yes,
            overrides,
        } => {
            let mut request = OptimizationRequest::new(Target::parse(target));
            if *search_retention {
                request = request.with_retention_search(true);
            } else if *no_search_retention {
                request = request.with_retention_search(false);
            }
            for (key, value) in overrides {
                request = request.with_override(key.clone(), value.clone());
            }
            optimize(&config, store, request, *yes, cli_args.plain).await?
        }
        Command::List => {
            list(store.as_ref())?;
            true
        }
        Command::Show { target } => show(store.as_ref(), &Target::parse(target))?,
    };

    if cli_args.print_metrics {
        println!("{}", metrics::render_text());
    }

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn optimize(
    config: &AppConfig,
    store: Arc<FileResultStore>,
    request: OptimizationRequest,
    assume_yes: bool,
    plain: bool,
) -> Result<bool> {
    let source = Arc::new(JsonRecordSource::new(&config.records_dir));
    let trainer = Arc::new(ExternalTrainer::from_command_line(&config.trainer_command)?);
    let runner = JobRunner::new(source.clone(), source, trainer)
        .with_scheduling(config.scheduling.clone());

    let prompter: Arc<dyn Prompter> = if assume_yes {
        Arc::new(FixedPrompter(PromptResponse::Yes))
    } else {
        Arc::new(ConsolePrompter)
    };

    let (notifier, notifications): (Arc<dyn NotificationSink>, Option<UnboundedReceiver<Notification>>) =
        if plain {
            (Arc::new(TracingNotifier), None)
        } else {
            let (notifier, rx) = ChannelNotifier::channel();
            (Arc::new(notifier), Some(rx))
        };

    let (progress, subscriber) = progress_channel(&config.progress);
    let orchestrator = SingleFlightOrchestrator::new(runner, store, notifier, prompter, progress);

    info!("Submitting optimization for {}", request.target);
    let submission = orchestrator.submit(request).await;

    let outcome = match submission {
        Submission::Accepted(handle) => {
            wait_with_progress(handle, subscriber, notifications, plain).await
        }
        Submission::Rejected { .. } | Submission::Cancelled | Submission::DependencyMissing { .. } => {
            if let Some(mut rx) = notifications {
                while let Ok(notification) = rx.try_recv() {
                    cli_style::print_notification(&notification);
                }
            }
            return Ok(false);
        }
    };

    orchestrator.shutdown().await;
    Ok(outcome.is_success())
}

/// Pump progress and notifications on this task until the job's outcome arrives.
async fn wait_with_progress(
    handle: fsrs_helper::optimizer::JobHandle,
    mut progress: ProgressSubscriber,
    mut notifications: Option<UnboundedReceiver<Notification>>,
    plain: bool,
) -> JobOutcome {
    let bar = if plain {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(0)
    };
    bar.set_style(cli_style::progress_bar_style());

    let canceller = handle.cancellation_token();
    let wait = handle.wait();
    tokio::pin!(wait);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut cancelling = false;

    let outcome = loop {
        tokio::select! {
            outcome = &mut wait => break outcome,
            Some(update) = progress.recv() => {
                bar.set_length(update.total);
                bar.set_position(update.completed);
                bar.set_message(update.stage);
            }
            Some(notification) = async {
                match notifications.as_mut() {
                    Some(rx) => rx.recv().await,
                    None => std::future::pending().await,
                }
            } => {
                bar.suspend(|| cli_style::print_notification(&notification));
            }
            _ = &mut ctrl_c, if !cancelling => {
                cancelling = true;
                canceller.cancel();
                bar.suspend(|| cli_style::print_warning("Cancelling, waiting for the optimizer to stop..."));
            }
        }
    };

    bar.finish_and_clear();
    progress.drain(|_| {});
    if let Some(rx) = notifications.as_mut() {
        while let Ok(notification) = rx.try_recv() {
            cli_style::print_notification(&notification);
        }
    }
    outcome
}

fn list(store: &dyn ResultStore) -> Result<()> {
    let results = store.load()?;
    cli_style::print_section_header("Stored parameters");
    if results.is_empty() {
        cli_style::print_empty_list("No optimizations have been saved yet");
        cli_style::print_section_footer();
        return Ok(());
    }
    cli_style::results_table(results.iter()).print();
    cli_style::print_section_footer();
    println!("{}", store.serialize_all()?);
    Ok(())
}

fn show(store: &dyn ResultStore, target: &Target) -> Result<bool> {
    match store.get(target)? {
        Some(result) => {
            cli_style::print_result(&result);
            Ok(true)
        }
        None => {
            cli_style::print_warning(&format!("No stored result for {}", target));
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_override() {
        assert_eq!(
            parse_override("maximumInterval=3650").unwrap(),
            ("maximumInterval".to_string(), json!(3650))
        );
        assert_eq!(
            parse_override("timezone=Europe/London").unwrap(),
            ("timezone".to_string(), json!("Europe/London"))
        );
        assert_eq!(
            parse_override("preview = true").unwrap(),
            ("preview".to_string(), json!(true))
        );
        assert!(parse_override("novalue").is_err());
        assert!(parse_override("=3").is_err());
    }

    #[test]
    fn test_cli_parses_optimize() {
        let args = CliArgs::try_parse_from([
            "fsrs-helper",
            "--data-dir",
            "/tmp/fsrs",
            "optimize",
            "42",
            "--no-search-retention",
            "-o",
            "easyBonus=1.5",
        ])
        .unwrap();

        match args.command {
            Command::Optimize {
                target,
                no_search_retention,
                overrides,
                ..
            } => {
                assert_eq!(target, "42");
                assert!(no_search_retention);
                assert_eq!(overrides, vec![("easyBonus".to_string(), json!(1.5))]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(args.data_dir, Some(PathBuf::from("/tmp/fsrs")));
    }

    #[test]
    fn test_cli_rejects_conflicting_retention_flags() {
        assert!(CliArgs::try_parse_from([
            "fsrs-helper",
            "optimize",
            "42",
            "--search-retention",
            "--no-search-retention",
        ])
        .is_err());
    }
}
