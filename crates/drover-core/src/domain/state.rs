//! State - ジョブの状態
//!
//! runner が書き込む遷移は `New | Waiting -> Initializing` の 1 つだけです。
//! それ以降の遷移（Running, Complete, ...）は worker プロセスが担当します。

use std::fmt;

use serde::{Deserialize, Serialize};

/// JobStatus はジョブ記述子の状態
///
/// # 状態遷移
/// - New / Waiting: pending（claim 可能）
/// - Initializing: runner が claim して pool に渡した
/// - Running: worker が実行中
/// - Paused: worker が一時停止した
/// - Complete / Cancelled / Broken: 終端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    New,
    Waiting,
    Initializing,
    Running,
    Paused,
    Complete,
    Cancelled,
    Broken,
}

impl JobStatus {
    /// Eligible for claiming.
    pub fn is_pending(self) -> bool {
        matches!(self, JobStatus::New | JobStatus::Waiting)
    }

    /// No further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Complete | JobStatus::Cancelled | JobStatus::Broken
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::New => "new",
            JobStatus::Waiting => "waiting",
            JobStatus::Initializing => "initializing",
            JobStatus::Running => "running",
            JobStatus::Paused => "paused",
            JobStatus::Complete => "complete",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Broken => "broken",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
