//! Errors - runner が返すエラー型
//!
//! admission 飽和、maintenance lock、tick 上限、pending job なしはエラーではありません。
//! ここに並ぶのは collaborator（queue service / process pool）の障害だけです。

use thiserror::Error;

use super::ids::JobId;
use super::rule::RuleParseError;
use super::state::JobStatus;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("job {job_id} cannot move to initializing from status={from}")]
    InvalidTransition { job_id: JobId, from: JobStatus },

    /// The stored record moved on since the claim (cancelled, completed, ...).
    #[error("job {job_id} is {stored} in the store, refusing to write {attempted}")]
    StaleWrite {
        job_id: JobId,
        stored: JobStatus,
        attempted: JobStatus,
    },

    #[error("job {0} not found")]
    JobNotFound(JobId),

    #[error("queue store failure: {0}")]
    Store(String),

    #[error("failed to spawn worker for {job_id}: {source}")]
    Spawn {
        job_id: JobId,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Rule(#[from] RuleParseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
