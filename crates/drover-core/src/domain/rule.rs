//! Rule - worker 起動を制限する admission rule
//!
//! rule は起動時に 1 度だけ文字列から parse され、pool が不変に保持します。
//!
//! # 書式
//! - `processes=4`: 同時 worker 数の上限
//! - `max_load=2.5`: 1 分 load average の上限
//! - `min_free_memory_mb=512`: 空きメモリの下限

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Point-in-time view of the host used to evaluate rules.
///
/// Metrics the probe could not read are `None` and never block a start.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HostSnapshot {
    pub active_workers: usize,
    pub load_average: Option<f64>,
    pub free_memory_mb: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    Processes(usize),
    MaxLoad(f64),
    MinFreeMemoryMb(u64),
}

impl Rule {
    /// Whether one more worker may start on a host in this state.
    pub fn admits(&self, host: &HostSnapshot) -> bool {
        match *self {
            Rule::Processes(limit) => host.active_workers < limit,
            Rule::MaxLoad(ceiling) => host.load_average.is_none_or(|load| load < ceiling),
            Rule::MinFreeMemoryMb(floor) => host.free_memory_mb.is_none_or(|free| free >= floor),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Processes(n) => write!(f, "processes={n}"),
            Rule::MaxLoad(x) => write!(f, "max_load={x}"),
            Rule::MinFreeMemoryMb(n) => write!(f, "min_free_memory_mb={n}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleParseError {
    #[error("rule {0:?} is not of the form key=value")]
    MissingValue(String),

    #[error("unknown rule {0:?}")]
    UnknownRule(String),

    #[error("invalid value {value:?} for rule {key}")]
    InvalidValue { key: String, value: String },
}

impl FromStr for Rule {
    type Err = RuleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, value) = s
            .split_once('=')
            .ok_or_else(|| RuleParseError::MissingValue(s.to_string()))?;
        let key = key.trim();
        let value = value.trim();
        let invalid = || RuleParseError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };

        match key {
            "processes" => match value.parse::<usize>() {
                Ok(n) if n > 0 => Ok(Rule::Processes(n)),
                _ => Err(invalid()),
            },
            "max_load" => match value.parse::<f64>() {
                Ok(x) if x.is_finite() && x > 0.0 => Ok(Rule::MaxLoad(x)),
                _ => Err(invalid()),
            },
            "min_free_memory_mb" => value
                .parse::<u64>()
                .map(Rule::MinFreeMemoryMb)
                .map_err(|_| invalid()),
            other => Err(RuleParseError::UnknownRule(other.to_string())),
        }
    }
}

/// Parse configured rule specs in order, skipping blank entries.
pub fn parse_rules<S: AsRef<str>>(specs: &[S]) -> Result<Vec<Rule>, RuleParseError> {
    specs
        .iter()
        .map(AsRef::as_ref)
        .filter(|spec| !spec.trim().is_empty())
        .map(str::parse)
        .collect()
}
