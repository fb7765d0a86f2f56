//! ProcessPool port - worker サブプロセスの pool
//!
//! # 責務
//! - admission rule と worker 起動コマンドを保持する
//! - `tick()` で終わった worker を回収し、rule が許す分だけ新しい worker を起動する
//! - `tick()` は実行中または起動待ちの task がある間 true を返す
//! - run の終わりに `drain_backlog()` でまだ起動していない task を返す
//!
//! runner は `run_queue` のたびに `PoolFactory` から新しい pool を作ります。

use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::{DispatchTask, Rule, RunnerError, WorkerCommand};

#[async_trait]
pub trait ProcessPool: Send {
    fn set_worker_command(&mut self, command: WorkerCommand);

    /// Override the pool's default log destination.
    fn set_log_path(&mut self, path: PathBuf);

    fn add_rule(&mut self, rule: Rule);

    /// Reap finished workers and start backlogged ones the rules allow.
    ///
    /// Returns `true` while workers are running or tasks are waiting to start.
    async fn tick(&mut self) -> Result<bool, RunnerError>;

    /// Submit a task. It starts on a later `tick()` once the rules admit it.
    async fn enqueue_task(&mut self, task: DispatchTask) -> Result<(), RunnerError>;

    /// Remove and return every submitted task that has not started yet.
    ///
    /// Called once when a run ends; running workers are left alone.
    fn drain_backlog(&mut self) -> Vec<DispatchTask>;
}

/// Builds a fresh, unconfigured pool.
pub trait PoolFactory: Send + Sync {
    fn create_pool(&self) -> Box<dyn ProcessPool>;
}
