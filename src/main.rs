//! `alliance-query` command-line entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{ArgAction, Parser};

use alliance_query::config::{self, AppConfig};
use alliance_query::presenter;
use alliance_query::router::{classify, Intent};
use alliance_query::rpc::{self, RpcError};
use alliance_query::shell::{self, Shell};

// ─── Exit codes ─────────────────────────────────────────────────────────────

const EXIT_OK: u8 = 0;
const EXIT_WORKER_FAILED: u8 = 1;
const EXIT_UNRECOGNIZED: u8 = 2;
const EXIT_TIMEOUT: u8 = 3;
const EXIT_CONFIG: u8 = 4;
const EXIT_CANCELLED: u8 = 130;

// ─── CLI ────────────────────────────────────────────────────────────────────

/// Ask the Alliance of Genome Resources questions in plain English.
///
/// With a query, classify it, run it once and print the result. Without one,
/// start an interactive shell.
#[derive(Parser, Debug)]
#[command(name = "alliance-query")]
#[command(version, about, long_about = None)]
#[command(after_help = r#"Examples:
  alliance-query find BRCA1 genes in mouse
  alliance-query "diseases related to asthma"
  alliance-query --json info about HGNC:1100
  alliance-query --dry-run blast ATGCGATACGCTTGA
  alliance-query                                  # interactive shell
"#)]
struct Cli {
    /// Query text; words are joined with spaces.
    query: Vec<String>,

    /// Path to a YAML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Worker command, overriding the config file.
    #[arg(long, env = "ALLIANCE_QUERY_WORKER")]
    worker: Option<String>,

    /// Argument for the worker command (repeatable).
    #[arg(long = "worker-arg", allow_hyphen_values = true)]
    worker_args: Vec<String>,

    /// Response timeout in milliseconds, overriding the config file.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Print the raw JSON payload instead of formatted text.
    #[arg(long)]
    json: bool,

    /// Print the classified intent and request without running a worker.
    #[arg(long)]
    dry_run: bool,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// Load the config file and apply command-line overrides.
    fn load_config(&self) -> Result<AppConfig, config::ConfigError> {
        let mut config = config::load_config(self.config.as_deref())?;

        if let Some(command) = &self.worker {
            config.worker.command = command.clone();
            config.worker.args = self.worker_args.clone();
        } else if !self.worker_args.is_empty() {
            config.worker.args = self.worker_args.clone();
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.worker.response_timeout_ms = timeout_ms;
        }

        config.validate()?;
        Ok(config)
    }
}

// ─── Main ───────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    alliance_query::init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(EXIT_WORKER_FAILED)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<u8> {
    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return Ok(EXIT_CONFIG);
        }
    };
    tracing::debug!(worker = %config.worker.command, "configuration loaded");

    if cli.query.is_empty() {
        Shell::new(config, cli.json)
            .run()
            .await
            .context("interactive shell failed")?;
        return Ok(EXIT_OK);
    }

    let text = cli.query.join(" ");
    let intent = classify(&text);
    if !intent.is_recognized() {
        eprintln!("{}", shell::meta::USAGE_HINT);
        return Ok(EXIT_UNRECOGNIZED);
    }

    if cli.dry_run {
        print_dry_run(&intent)?;
        return Ok(EXIT_OK);
    }

    tracing::info!(kind = ?intent.kind(), "{}", intent.description);
    match rpc::run_with_cancel(&intent, &config.worker, shell::interrupted()).await {
        Ok(response) if cli.json => {
            println!("{}", presenter::render_json(&response));
            Ok(EXIT_OK)
        }
        Ok(response) => {
            println!("{}", presenter::render(&intent, &response));
            Ok(EXIT_OK)
        }
        Err(e) => {
            eprintln!("error: {e}");
            Ok(exit_code_for(&e))
        }
    }
}

fn print_dry_run(intent: &Intent) -> anyhow::Result<()> {
    let request = rpc::encode(intent)?;
    println!("{}", serde_json::to_string_pretty(intent)?);
    println!("{}", String::from_utf8_lossy(&request.line).trim_end());
    Ok(())
}

fn exit_code_for(err: &RpcError) -> u8 {
    match err {
        RpcError::Timeout { .. } => EXIT_TIMEOUT,
        RpcError::Cancelled => EXIT_CANCELLED,
        RpcError::Spawn { .. }
        | RpcError::WorkerExited { .. }
        | RpcError::Io { .. }
        | RpcError::Encoding { .. } => EXIT_WORKER_FAILED,
    }
}
