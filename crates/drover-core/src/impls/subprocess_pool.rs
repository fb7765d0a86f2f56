//! SubprocessPool - worker をサブプロセスとして起動する ProcessPool
//!
//! # tick の流れ
//! 1. 終了した child を `try_wait` で回収
//! 2. backlog の先頭から、全 rule が許す間だけ起動
//! 3. 実行中か backlog が残っていれば true
//!
//! worker の stdout/stderr は `<log_path>/<job-id>.log` に追記します。

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::{Child, Command};

use crate::domain::{DispatchTask, JobId, Rule, RunnerError, WorkerCommand};
use crate::impls::ProcHostProbe;
use crate::ports::{HostProbe, PoolFactory, ProcessPool};

struct RunningWorker {
    job_id: JobId,
    child: Child,
}

pub struct SubprocessPool {
    command: Option<WorkerCommand>,
    log_path: PathBuf,
    rules: Vec<Rule>,
    probe: Arc<dyn HostProbe>,
    backlog: VecDeque<DispatchTask>,
    running: Vec<RunningWorker>,
}

impl SubprocessPool {
    pub fn new(probe: Arc<dyn HostProbe>) -> Self {
        Self {
            command: None,
            log_path: std::env::temp_dir().join("drover"),
            rules: Vec::new(),
            probe,
            backlog: VecDeque::new(),
            running: Vec::new(),
        }
    }

    pub fn active_workers(&self) -> usize {
        self.running.len()
    }

    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    pub fn log_path(&self) -> &PathBuf {
        &self.log_path
    }

    fn reap(&mut self) {
        let mut still_running = Vec::with_capacity(self.running.len());
        for mut worker in self.running.drain(..) {
            match worker.child.try_wait() {
                Ok(Some(status)) => {
                    tracing::info!(job_id = %worker.job_id, exit_code = ?status.code(), "Worker finished");
                }
                Ok(None) => still_running.push(worker),
                Err(err) => {
                    // 状態が取れない child は追跡をやめる（tokio が裏で回収する）
                    tracing::warn!(job_id = %worker.job_id, error = %err, "Lost track of worker");
                }
            }
        }
        self.running = still_running;
    }

    fn admits_another(&self) -> bool {
        let host = self.probe.snapshot(self.running.len());
        match self.rules.iter().find(|rule| !rule.admits(&host)) {
            Some(rule) => {
                tracing::debug!(%rule, active_workers = host.active_workers, "Rule holds back next worker");
                false
            }
            None => true,
        }
    }

    fn spawn(&self, task: &DispatchTask) -> Result<Child, RunnerError> {
        let job_id = task.job_id();
        let spawn_err = |source| RunnerError::Spawn { job_id, source };

        let command = self.command.as_ref().ok_or_else(|| {
            spawn_err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no worker command configured",
            ))
        })?;

        std::fs::create_dir_all(&self.log_path)?;
        let log_file = self.log_path.join(format!("{job_id}.log"));
        let stdout = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)?;
        let stderr = stdout.try_clone()?;

        let child = Command::new(&command.program)
            .args(&command.args)
            .args(task.worker_args())
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
            .map_err(spawn_err)?;

        tracing::info!(%job_id, pid = ?child.id(), log = %log_file.display(), "Worker started");
        Ok(child)
    }
}

#[async_trait]
impl ProcessPool for SubprocessPool {
    fn set_worker_command(&mut self, command: WorkerCommand) {
        self.command = Some(command);
    }

    fn set_log_path(&mut self, path: PathBuf) {
        self.log_path = path;
    }

    fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    async fn tick(&mut self) -> Result<bool, RunnerError> {
        self.reap();

        while !self.backlog.is_empty() && self.admits_another() {
            let Some(task) = self.backlog.pop_front() else {
                break;
            };
            match self.spawn(&task) {
                Ok(child) => self.running.push(RunningWorker {
                    job_id: task.job_id(),
                    child,
                }),
                Err(err) => {
                    self.backlog.push_front(task);
                    return Err(err);
                }
            }
        }

        Ok(!self.running.is_empty() || !self.backlog.is_empty())
    }

    async fn enqueue_task(&mut self, task: DispatchTask) -> Result<(), RunnerError> {
        tracing::debug!(job_id = %task.job_id(), backlog = self.backlog.len(), "Task queued for worker");
        self.backlog.push_back(task);
        Ok(())
    }

    fn drain_backlog(&mut self) -> Vec<DispatchTask> {
        self.backlog.drain(..).collect()
    }
}

/// Builds `SubprocessPool`s sharing one host probe.
#[derive(Clone)]
pub struct SubprocessPoolFactory {
    probe: Arc<dyn HostProbe>,
}

impl SubprocessPoolFactory {
    pub fn new(probe: Arc<dyn HostProbe>) -> Self {
        Self { probe }
    }
}

impl Default for SubprocessPoolFactory {
    fn default() -> Self {
        Self::new(Arc::new(ProcHostProbe::new()))
    }
}

impl PoolFactory for SubprocessPoolFactory {
    fn create_pool(&self) -> Box<dyn ProcessPool> {
        Box::new(SubprocessPool::new(Arc::clone(&self.probe)))
    }
}
