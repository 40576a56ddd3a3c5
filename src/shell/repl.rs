//! The read-eval-print loop.

use std::future::Future;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use super::history::History;
use super::meta::{MetaCommand, HELP_TEXT, USAGE_HINT};
use crate::config::AppConfig;
use crate::presenter;
use crate::router::classify;
use crate::rpc::{self, RpcError};

const PROMPT: &str = "alliance> ";

const BANNER: &str =
    "Alliance of Genome Resources query shell. Type 'help' for examples, 'exit' to quit.";

/// What the loop should do after one line.
#[derive(Debug, PartialEq, Eq)]
pub enum Step {
    Continue(Option<String>),
    Exit,
}

/// One interactive session. Owns its history.
pub struct Shell {
    config: AppConfig,
    history: History,
    json: bool,
}

impl Shell {
    pub fn new(config: AppConfig, json: bool) -> Self {
        let history = History::new(config.history_capacity);
        Self {
            config,
            history,
            json,
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Handle one input line. `cancel` aborts a pending worker request.
    pub async fn handle_line<F>(&mut self, line: &str, cancel: F) -> Step
    where
        F: Future<Output = ()>,
    {
        let line = line.trim();
        if line.is_empty() {
            return Step::Continue(None);
        }

        if let Some(command) = MetaCommand::parse(line) {
            let output = match command {
                MetaCommand::Help => HELP_TEXT.to_string(),
                MetaCommand::History => self.history.render(),
                MetaCommand::Clear => {
                    self.history.clear();
                    "History cleared.".to_string()
                }
                MetaCommand::Exit => return Step::Exit,
            };
            return Step::Continue(Some(output));
        }

        let intent = classify(line);
        self.history.push(line, intent.kind());
        if !intent.is_recognized() {
            return Step::Continue(Some(USAGE_HINT.to_string()));
        }

        let output = match rpc::run_with_cancel(&intent, &self.config.worker, cancel).await {
            Ok(response) if self.json => presenter::render_json(&response),
            Ok(response) => format!(
                "{}\n{}",
                intent.description,
                presenter::render(&intent, &response)
            ),
            Err(RpcError::Cancelled) => "Request cancelled.".to_string(),
            Err(e) => format!("error: {e}"),
        };
        Step::Continue(Some(output))
    }

    /// Read queries from stdin until `exit`, end of input or Ctrl-C at the
    /// prompt. Ctrl-C while a request is pending cancels only that request.
    pub async fn run(&mut self) -> std::io::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        stdout.write_all(format!("{BANNER}\n").as_bytes()).await?;
        loop {
            stdout.write_all(PROMPT.as_bytes()).await?;
            stdout.flush().await?;

            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = interrupted() => {
                    stdout.write_all(b"\n").await?;
                    break;
                }
            };
            let Some(line) = line else {
                stdout.write_all(b"\n").await?;
                break;
            };

            match self.handle_line(&line, interrupted()).await {
                Step::Exit => break,
                Step::Continue(Some(output)) => {
                    stdout.write_all(format!("{output}\n").as_bytes()).await?;
                }
                Step::Continue(None) => {}
            }
        }

        tracing::debug!(queries = self.history.len(), "shell session ended");
        stdout.flush().await
    }
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
pub async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
