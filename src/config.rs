//! Configuration loading and validation.
//!
//! Reads an optional YAML file and resolves environment variables. Every key
//! has a default, so running without a config file is supported.
//!
//! Lookup order: explicit path (`--config`), `ALLIANCE_QUERY_CONFIG`, then
//! `<config dir>/alliance-query/config.yaml`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use regex::{Captures, Regex};
use serde::Deserialize;
use thiserror::Error;

// ─── Constants ──────────────────────────────────────────────────────────────

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "ALLIANCE_QUERY_CONFIG";

/// Default worker executable.
const DEFAULT_WORKER_COMMAND: &str = "agr-mcp-server";

const DEFAULT_STARTUP_DELAY_MS: u64 = 200;
const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_POST_RESPONSE_GRACE_MS: u64 = 100;
const DEFAULT_HISTORY_CAPACITY: usize = 50;

// ─── Errors ─────────────────────────────────────────────────────────────────

/// Configuration loading or validation error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("invalid config: {reason}")]
    Invalid { reason: String },
}

// ─── Public Types ───────────────────────────────────────────────────────────

/// How to start a worker and how long to wait for it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub cwd: Option<String>,
    /// Grace period before the request is written.
    pub startup_delay_ms: u64,
    /// Deadline for a valid response, measured from spawn.
    pub response_timeout_ms: u64,
    /// Delay between a valid response and termination.
    pub post_response_grace_ms: u64,
    /// Copy the worker's stderr to ours.
    pub forward_stderr: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_WORKER_COMMAND.to_string(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
            startup_delay_ms: DEFAULT_STARTUP_DELAY_MS,
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
            post_response_grace_ms: DEFAULT_POST_RESPONSE_GRACE_MS,
            forward_stderr: true,
        }
    }
}

impl WorkerConfig {
    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn post_response_grace(&self) -> Duration {
        Duration::from_millis(self.post_response_grace_ms)
    }

    fn expand_home_paths(&mut self) {
        self.command = expand_home(&self.command);
        if let Some(cwd) = self.cwd.as_mut() {
            *cwd = expand_home(cwd);
        }
    }

    /// Check the invariants the lifecycle manager relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.command.trim().is_empty() {
            return Err(ConfigError::Invalid {
                reason: "worker.command must not be empty".into(),
            });
        }
        if self.response_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "worker.response_timeout_ms must be positive".into(),
            });
        }
        if self.startup_delay_ms >= self.response_timeout_ms {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "worker.startup_delay_ms ({}) must be shorter than worker.response_timeout_ms ({})",
                    self.startup_delay_ms, self.response_timeout_ms
                ),
            });
        }
        Ok(())
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub worker: WorkerConfig,
    /// Entries kept by the interactive shell.
    pub history_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            worker: WorkerConfig::default(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.worker.validate()?;
        if self.history_capacity == 0 {
            return Err(ConfigError::Invalid {
                reason: "history_capacity must be positive".into(),
            });
        }
        Ok(())
    }
}

// ─── Loading ────────────────────────────────────────────────────────────────

/// Resolve which config file to use, if any.
///
/// An explicit path is returned even if it does not exist, so that loading
/// reports the error instead of silently using defaults.
pub fn find_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let candidate = dirs::config_dir()?.join("alliance-query").join("config.yaml");
    candidate.exists().then_some(candidate)
}

/// Load and validate the configuration.
///
/// Without a config file the defaults are used.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let config = match find_config_path(explicit) {
        Some(path) => load_config_file(&path)?,
        None => AppConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Parse one config file.
///
/// `${VAR}` and `${VAR:-default}` are substituted before parsing; a leading
/// `~` in `worker.command` and `worker.cwd` is expanded after.
pub fn load_config_file(path: &Path) -> Result<AppConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    if raw.trim().is_empty() {
        return Ok(AppConfig::default());
    }

    let interpolated = interpolate_env_vars(&raw);

    let mut config: AppConfig =
        serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
    config.worker.expand_home_paths();
    Ok(config)
}

// ─── Env-var interpolation ──────────────────────────────────────────────────

/// `${NAME}` or `${NAME:-default}`; anything else is left as written.
fn env_reference_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
                .map_err(|e| tracing::error!(error = %e, "env reference pattern failed to compile"))
                .ok()
        })
        .as_ref()
}

/// Substitute environment variables into raw config text.
///
/// An unset variable without a default becomes the empty string.
fn interpolate_env_vars(input: &str) -> String {
    let Some(pattern) = env_reference_pattern() else {
        return input.to_string();
    };
    pattern
        .replace_all(input, |caps: &Captures<'_>| {
            std::env::var(&caps[1]).unwrap_or_else(|_| {
                caps.get(2)
                    .map(|default| default.as_str().to_string())
                    .unwrap_or_default()
            })
        })
        .into_owned()
}

/// `~` or `~/...` resolved against the home directory. `~user` is untouched.
fn expand_home(path: &str) -> String {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => return path.to_string(),
    };
    match dirs::home_dir() {
        Some(home) => format!("{}{rest}", home.display()),
        None => path.to_string(),
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
