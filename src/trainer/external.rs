//! Training routine backed by an external optimizer process.
//!
//! The process receives `{"options": ..., "records": [...]}` on stdin and
//! writes one JSON message per line on stdout:
//!
//! ```text
//! {"type":"progress","stage":"Training","completed":3,"total":5}
//! {"type":"log","message":"loss 0.3123"}
//! {"type":"result","weights":[0.4, 0.6, ...],"retention":0.87}
//! ```
//!
//! Lines that are not JSON are kept as diagnostics. Invoked with `--check`
//! the process must exit 0 when it is able to train.

use super::{TrainingError, TrainingOptions, TrainingOutput, TrainingRoutine};
use crate::optimizer::{HistoricalRecord, TrainingContext};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// How often a quiet trainer is checked for cancellation.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrainerMessage {
    Progress {
        stage: String,
        completed: u64,
        total: u64,
    },
    Log {
        message: String,
    },
    Result {
        weights: Vec<f64>,
        #[serde(default)]
        retention: Option<f64>,
    },
}

impl TrainerMessage {
    pub fn parse_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

#[derive(Serialize)]
struct TrainerInput<'a> {
    options: &'a TrainingOptions,
    records: &'a [HistoricalRecord],
}

pub struct ExternalTrainer {
    program: String,
    args: Vec<String>,
}

impl ExternalTrainer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from a shell-style command line, e.g. `python -m fsrs4anki_optimizer`.
    pub fn from_command_line(command: &str) -> Result<Self, TrainingError> {
        let mut parts = shlex::split(command)
            .ok_or_else(|| TrainingError::Unavailable(format!("Invalid trainer command: {}", command)))?
            .into_iter();
        let program = parts
            .next()
            .ok_or_else(|| TrainingError::Unavailable("Trainer command is empty".to_string()))?;
        Ok(Self::new(program, parts.collect()))
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

impl TrainingRoutine for ExternalTrainer {
    fn name(&self) -> &str {
        &self.program
    }

    fn check_available(&self) -> Result<(), String> {
        let status = self
            .command()
            .arg("--check")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => Err(format!(
                "The optimizer command `{}` is installed but not working (exit status {}). \
                 Reinstall it with `pip install fsrs4anki_optimizer` and try again.",
                self.command_line(),
                status
            )),
            Err(e) => Err(format!(
                "The optimizer command `{}` could not be started ({}). \
                 Install it with `pip install fsrs4anki_optimizer`, or point \
                 trainer.command at a working optimizer.",
                self.command_line(),
                e
            )),
        }
    }

    fn train(
        &self,
        records: &[HistoricalRecord],
        options: &TrainingOptions,
        ctx: &TrainingContext,
    ) -> Result<TrainingOutput, TrainingError> {
        let input = serde_json::to_vec(&TrainerInput { options, records })
            .map_err(|e| TrainingError::Protocol(format!("Could not encode input: {}", e)))?;

        info!(
            "Starting external trainer `{}` with {} records",
            self.command_line(),
            records.len()
        );

        let mut child = self
            .command()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| TrainingError::Unavailable(e.to_string()))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| TrainingError::Protocol("stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TrainingError::Protocol("stdout not captured".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| TrainingError::Protocol("stderr not captured".to_string()))?;

        // From here on every early return kills and reaps the process.
        let child = RunningChild::new(child);

        // Pipes are drained on their own threads so a chatty process can't stall
        // and a silent one can still be cancelled.
        let writer = std::thread::spawn(move || stdin.write_all(&input));
        let stderr_reader = std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        });
        let (line_tx, line_rx) = mpsc::channel();
        std::thread::spawn(move || read_lines(stdout, line_tx));

        let mut output = TrainingOutput::default();
        let mut got_result = false;

        loop {
            if ctx.is_cancelled() {
                warn!("Cancelling external trainer `{}`", self.command_line());
                drop(child);
                return Err(TrainingError::Cancelled);
            }

            let line = match line_rx.recv_timeout(CANCEL_POLL_INTERVAL) {
                Ok(Ok(line)) => line,
                Ok(Err(e)) => return Err(e.into()),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match TrainerMessage::parse_line(trimmed) {
                Ok(TrainerMessage::Progress {
                    stage,
                    completed,
                    total,
                }) => ctx.report(&stage, completed, total),
                Ok(TrainerMessage::Log { message }) => {
                    debug!("trainer: {}", message);
                    output.diagnostics.push(message);
                }
                Ok(TrainerMessage::Result { weights, retention }) => {
                    output.weights = weights;
                    output.retention = retention;
                    got_result = true;
                }
                Err(_) => {
                    debug!("trainer: {}", trimmed);
                    output.diagnostics.push(trimmed.to_string());
                }
            }
        }

        let status = child.wait()?;
        let stderr_text = stderr_reader.join().unwrap_or_default();
        match writer.join() {
            Ok(Ok(())) => {}
            // The process may exit without reading all of stdin; its exit status decides.
            Ok(Err(e)) => debug!("Trainer stdin closed early: {}", e),
            Err(_) => return Err(TrainingError::Protocol("stdin writer panicked".to_string())),
        }

        if ctx.is_cancelled() {
            return Err(TrainingError::Cancelled);
        }

        if !status.success() {
            let detail = stderr_text.trim();
            return Err(TrainingError::Failed(if detail.is_empty() {
                format!("trainer exited with {}", status)
            } else {
                detail.to_string()
            }));
        }

        if !got_result {
            return Err(TrainingError::Protocol(
                "trainer finished without reporting a result".to_string(),
            ));
        }

        Ok(output)
    }
}

/// Child process that is killed and reaped unless waited on explicitly.
struct RunningChild {
    child: Option<Child>,
}

impl RunningChild {
    fn new(child: Child) -> Self {
        Self { child: Some(child) }
    }

    fn wait(mut self) -> std::io::Result<ExitStatus> {
        match self.child.take() {
            Some(mut child) => child.wait(),
            None => Err(std::io::Error::other("trainer process already reaped")),
        }
    }
}

impl Drop for RunningChild {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Forward stdout line by line. Bytes that aren't UTF-8 are replaced, not fatal.
fn read_lines(stdout: ChildStdout, lines: mpsc::Sender<std::io::Result<String>>) {
    let mut reader = BufReader::new(stdout);
    loop {
        let mut buf = Vec::new();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => return,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf).into_owned();
                if lines.send(Ok(line)).is_err() {
                    return;
                }
            }
            Err(e) => {
                let _ = lines.send(Err(e));
                return;
            }
        }
    }
}
