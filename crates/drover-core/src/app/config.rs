//! RunnerConfig - runner の設定（起動時に 1 度読み、以降は不変）
//!
//! # 読み込み元
//! - `RunnerConfig::default()`
//! - 環境変数 `DROVER_*`（`from_env`）
//! - JSON ファイル（`from_json_file`）
//!
//! 動的な値（管理画面の設定など）が必要なら、別の RunnerConfig を渡します。

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Rule, RuleParseError, WorkerCommand, parse_rules};

pub const ENV_CHILD_RUNNER: &str = "DROVER_CHILD_RUNNER";
pub const ENV_MAX_TICKS: &str = "DROVER_MAX_TICKS";
pub const ENV_TICK_INTERVAL_SECS: &str = "DROVER_TICK_INTERVAL_SECS";
pub const ENV_DEFAULT_RULES: &str = "DROVER_DEFAULT_RULES";
pub const ENV_ENTRY_POINT: &str = "DROVER_ENTRY_POINT";
pub const ENV_BASE_PATH: &str = "DROVER_BASE_PATH";
pub const ENV_LOG_PATH: &str = "DROVER_LOG_PATH";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidNumber { key: &'static str, value: String },

    #[error("child_runner must not be empty")]
    EmptyChildRunner,

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Rule(#[from] RuleParseError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Task name the worker program runs for each job.
    pub child_runner: String,

    /// Ticks per `run_queue` call. 0 means unbounded.
    pub max_ticks: u64,

    /// Seconds slept between ticks.
    pub tick_interval_secs: u64,

    /// Opaque rule strings (`processes=4`, ...). Blank entries are skipped.
    pub default_rules: Vec<String>,

    /// Runtime the worker command starts with.
    pub entry_point: String,

    /// Application root the worker script lives under.
    pub base_path: PathBuf,

    /// Worker script, relative to `base_path`.
    pub script: String,

    /// Full argv replacing the generated worker command.
    pub worker_command: Option<Vec<String>>,

    /// Log directory for worker output. `DROVER_LOG_PATH` wins when set.
    pub log_path: Option<PathBuf>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            child_runner: "ProcessJobQueueChildTask".to_string(),
            max_ticks: 0,
            tick_interval_secs: 1,
            default_rules: Vec::new(),
            entry_point: "sh".to_string(),
            base_path: PathBuf::from("."),
            script: "bin/run-task".to_string(),
            worker_command: None,
            log_path: None,
        }
    }
}

impl RunnerConfig {
    /// Create configuration from environment variables, defaults for the rest.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(child_runner) = get(ENV_CHILD_RUNNER) {
            config.child_runner = child_runner;
        }
        if let Some(raw) = get(ENV_MAX_TICKS) {
            config.max_ticks = parse_number(ENV_MAX_TICKS, &raw)?;
        }
        if let Some(raw) = get(ENV_TICK_INTERVAL_SECS) {
            config.tick_interval_secs = parse_number(ENV_TICK_INTERVAL_SECS, &raw)?;
        }
        if let Some(raw) = get(ENV_DEFAULT_RULES) {
            config.default_rules = raw.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Some(entry_point) = get(ENV_ENTRY_POINT) {
            config.entry_point = entry_point;
        }
        if let Some(base_path) = get(ENV_BASE_PATH) {
            config.base_path = PathBuf::from(base_path);
        }
        config.log_path = get(ENV_LOG_PATH).map(PathBuf::from);

        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Fail-fast check: bad rule strings surface here, not mid-run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.child_runner.trim().is_empty() {
            return Err(ConfigError::EmptyChildRunner);
        }
        self.rules()?;
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn rules(&self) -> Result<Vec<Rule>, RuleParseError> {
        parse_rules(&self.default_rules)
    }

    /// The override when one is configured, otherwise
    /// `<entry_point> <base_path>/<script> tasks/<child_runner>`.
    pub fn worker_command(&self) -> WorkerCommand {
        self.worker_command
            .as_deref()
            .and_then(WorkerCommand::from_argv)
            .unwrap_or_else(|| {
                WorkerCommand::for_child_runner(
                    &self.entry_point,
                    &self.base_path,
                    &self.script,
                    &self.child_runner,
                )
            })
    }

    /// `DROVER_LOG_PATH` from the process environment, else the configured path.
    pub fn resolve_log_path(&self) -> Option<PathBuf> {
        self.resolve_log_path_with(|key| std::env::var(key).ok())
    }

    /// Same as `resolve_log_path`, reading the environment through `lookup`.
    pub fn resolve_log_path_with<F>(&self, lookup: F) -> Option<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        lookup(ENV_LOG_PATH)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .or_else(|| self.log_path.clone())
    }
}

fn parse_number(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        key,
        value: raw.to_string(),
    })
}
