use super::models::Target;
use async_trait::async_trait;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{debug, warn};

/// Answer to the pre-flight "search optimal retention?" question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptResponse {
    Yes,
    No,
    Cancel,
}

impl PromptResponse {
    /// Parse a typed answer. Unrecognized input yields `None` so the caller can ask again.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => Some(PromptResponse::Yes),
            "n" | "no" => Some(PromptResponse::No),
            "c" | "cancel" | "q" | "quit" => Some(PromptResponse::Cancel),
            _ => None,
        }
    }
}

/// Asks the user whether to search for the optimal retention.
///
/// Only consulted when the request leaves the choice open. Awaiting it blocks
/// nothing but the submitting task; the slot stays reserved meanwhile.
#[async_trait]
pub trait Prompter: Send + Sync {
    async fn ask_retention_search(&self, target: &Target) -> PromptResponse;
}

/// Prompter that always gives the same answer. Used with `--yes` and in tests.
pub struct FixedPrompter(pub PromptResponse);

#[async_trait]
impl Prompter for FixedPrompter {
    async fn ask_retention_search(&self, _target: &Target) -> PromptResponse {
        self.0
    }
}

/// Terminal prompter built on rustyline.
pub struct ConsolePrompter;

#[async_trait]
impl Prompter for ConsolePrompter {
    async fn ask_retention_search(&self, target: &Target) -> PromptResponse {
        let question = format!(
            "Find the optimal retention for {}? This takes an extra couple of minutes. [y]es/[n]o/[c]ancel: ",
            target
        );
        match tokio::task::spawn_blocking(move || read_answer(&question)).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Prompt task failed: {}", e);
                PromptResponse::Cancel
            }
        }
    }
}

fn read_answer(question: &str) -> PromptResponse {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            warn!("Could not open terminal for prompt: {}", e);
            return PromptResponse::Cancel;
        }
    };
    loop {
        match editor.readline(question) {
            Ok(line) => match PromptResponse::parse(&line) {
                Some(response) => {
                    debug!("Prompt answered: {:?}", response);
                    return response;
                }
                None => println!("Please answer y, n or c."),
            },
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                return PromptResponse::Cancel
            }
            Err(e) => {
                warn!("Prompt read failed: {}", e);
                return PromptResponse::Cancel;
            }
        }
    }
}
