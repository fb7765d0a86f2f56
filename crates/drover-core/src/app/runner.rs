//! QueueRunner - キューを tick 単位で流す制御ループ
//!
//! # フロー（1 tick）
//! 1. `ProcessPool::tick()` で pool を進める（終わった worker の回収・起動）
//! 2. maintenance lock / tick 上限をチェック（当たれば終了）
//! 3. admission 飽和なら今回の dispatch をスキップ
//! 4. claim 済みの job があれば Initializing にして persist → pool に渡す
//! 5. sleep して次の job を claim
//!
//! どの理由で抜けても、pool の backlog に残った（worker が起動していない）job は
//! 元の pending status に戻して release します。
//!
//! ループは「pool が動いている」か「claim 済みの job がある」間だけ続きます。

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::Instrument;

use crate::app::config::RunnerConfig;
use crate::domain::{DispatchTask, JobDescriptor, JobId, JobStatus, QueueName, RunnerError};
use crate::ports::{
    Clock, IdGenerator, JobQueueService, PoolFactory, ProcessPool, SystemClock, UlidGenerator,
};

/// Why a run ended. Only logged by `run_queue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StopReason {
    /// Admission was saturated before the pool was built.
    AdmissionSaturated,
    MaintenanceLock { ticks: u64 },
    TickBudget { ticks: u64 },
    /// Pool idle and nothing left to claim.
    Drained { ticks: u64 },
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::AdmissionSaturated => f.write_str("admission saturated"),
            StopReason::MaintenanceLock { ticks } => {
                write!(f, "maintenance lock after {ticks} ticks")
            }
            StopReason::TickBudget { ticks } => write!(f, "tick budget spent after {ticks} ticks"),
            StopReason::Drained { ticks } => write!(f, "queue drained after {ticks} ticks"),
        }
    }
}

/// The two independent "keep going" signals of the main loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LoopPredicate {
    pool_active: bool,
    job_claimed: bool,
}

impl LoopPredicate {
    fn should_continue(self) -> bool {
        self.pool_active || self.job_claimed
    }
}

/// A job handed to the pool during this run, with the status it was claimed in.
struct InFlight {
    descriptor: JobDescriptor,
    previous: JobStatus,
}

/// Drains a named queue through a freshly built process pool.
pub struct QueueRunner {
    queue_service: Arc<dyn JobQueueService>,
    pool_factory: Arc<dyn PoolFactory>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    env: fn(&str) -> Option<String>,
    config: RunnerConfig,
}

impl QueueRunner {
    pub fn new(
        queue_service: Arc<dyn JobQueueService>,
        pool_factory: Arc<dyn PoolFactory>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            queue_service,
            pool_factory,
            clock: Arc::new(SystemClock),
            ids: Arc::new(UlidGenerator::new(SystemClock)),
            env: |key| std::env::var(key).ok(),
            config,
        }
    }

    /// Use `clock` for status timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Read run-start environment overrides (`DROVER_LOG_PATH`) through `env`.
    pub fn with_env(mut self, env: fn(&str) -> Option<String>) -> Self {
        self.env = env;
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run the queue until the pool is idle and nothing is claimable, the
    /// maintenance lock is raised, or the tick budget is spent.
    ///
    /// Those stops are successful returns. Collaborator failures are logged
    /// and returned unchanged; nothing is retried here.
    pub async fn run_queue(&self, queue: &QueueName) -> Result<(), RunnerError> {
        let run_id = self.ids.generate_run_id();
        let span = tracing::info_span!("run_queue", run_id = %run_id, queue = %queue);

        async {
            match self.drive(queue).await {
                Ok(reason) => {
                    tracing::info!(%reason, "Queue run finished");
                    Ok(())
                }
                Err(err) => {
                    tracing::error!(error = %err, "Queue run aborted");
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    pub(crate) async fn drive(&self, queue: &QueueName) -> Result<StopReason, RunnerError> {
        // pool を作る前に判定する（どうせ dispatch できないなら作らない）
        if self.queue_service.is_at_max_jobs().await? {
            tracing::info!("Not processing queue as jobs are at max initialisation limit");
            return Ok(StopReason::AdmissionSaturated);
        }

        let mut pool = self.build_pool()?;
        let mut in_flight = HashMap::new();

        let outcome = self.tick_loop(queue, pool.as_mut(), &mut in_flight).await;
        let returned = self.return_unstarted(pool.as_mut(), &mut in_flight).await;

        let reason = outcome?;
        returned?;
        Ok(reason)
    }

    async fn tick_loop(
        &self,
        queue: &QueueName,
        pool: &mut dyn ProcessPool,
        in_flight: &mut HashMap<JobId, InFlight>,
    ) -> Result<StopReason, RunnerError> {
        let service = &self.queue_service;
        let max_ticks = self.config.max_ticks;
        let interval = self.config.tick_interval();
        let mut ticks: u64 = 0;
        let mut claimed = service.next_pending_job(queue).await?;

        loop {
            let predicate = LoopPredicate {
                pool_active: pool.tick().await?,
                job_claimed: claimed.is_some(),
            };
            if !predicate.should_continue() {
                return Ok(StopReason::Drained { ticks });
            }

            if service.is_maintenance_lock_active().await? {
                tracing::info!(ticks, "Skipped queued job descriptor since maintenance lock is active");
                self.release(claimed.take()).await?;
                return Ok(StopReason::MaintenanceLock { ticks });
            }

            if max_ticks > 0 && ticks >= max_ticks {
                tracing::info!("Tick count has hit max ticks {ticks} >= {max_ticks}");
                self.release(claimed.take()).await?;
                return Ok(StopReason::TickBudget { ticks });
            }

            if service.is_at_max_jobs().await? {
                tracing::info!(ticks, "Not processing queue as all jobs are at max limit");
                self.release(claimed.take()).await?;
            } else if let Some(descriptor) = claimed.take() {
                let dispatched = self.dispatch(pool, descriptor).await?;
                in_flight.insert(dispatched.descriptor.id, dispatched);
            } else {
                tracing::info!("Next pending job could NOT be found or lock could NOT be obtained");
            }

            ticks += 1;
            tokio::time::sleep(interval).await;
            claimed = service.next_pending_job(queue).await?;
        }
    }

    fn build_pool(&self) -> Result<Box<dyn ProcessPool>, RunnerError> {
        let rules = self.config.rules()?;
        let command = self.config.worker_command();

        let mut pool = self.pool_factory.create_pool();
        tracing::debug!(command = %command, rules = rules.len(), "Configuring process pool");
        pool.set_worker_command(command);
        if let Some(path) = self.config.resolve_log_path_with(self.env) {
            pool.set_log_path(path);
        }
        for rule in rules {
            pool.add_rule(rule);
        }
        Ok(pool)
    }

    /// pending -> initializing, persist, then hand to the pool.
    async fn dispatch(
        &self,
        pool: &mut dyn ProcessPool,
        mut descriptor: JobDescriptor,
    ) -> Result<InFlight, RunnerError> {
        tracing::info!(job_id = %descriptor.id, "Next pending job is: {}", descriptor.id);
        tracing::debug!(
            job_id = %descriptor.id,
            status = %descriptor.status,
            job_type = %descriptor.job_type,
            title = %descriptor.title,
            "Descriptor status"
        );

        let previous = descriptor.status;
        descriptor.begin_initializing(self.clock.now())?;

        // persist に失敗したら dispatch しない
        if let Err(err) = self.queue_service.persist(&descriptor).await {
            tracing::error!(job_id = %descriptor.id, error = %err, "Failed to persist initializing status");
            self.release_quietly(&descriptor).await;
            return Err(err);
        }

        let task = DispatchTask::new(&descriptor);
        if let Err(err) = pool.enqueue_task(task).await {
            tracing::error!(job_id = %descriptor.id, error = %err, "Pool rejected task, reverting status");
            descriptor.status = previous;
            descriptor.updated_at = self.clock.now();
            if let Err(revert_err) = self.queue_service.persist(&descriptor).await {
                tracing::warn!(job_id = %descriptor.id, error = %revert_err, "Failed to revert status");
            }
            self.release_quietly(&descriptor).await;
            return Err(err);
        }

        Ok(InFlight {
            descriptor,
            previous,
        })
    }

    /// Jobs still in the pool backlog never got a worker: put them back to
    /// their pending status and release the claim.
    async fn return_unstarted(
        &self,
        pool: &mut dyn ProcessPool,
        in_flight: &mut HashMap<JobId, InFlight>,
    ) -> Result<(), RunnerError> {
        let mut first_err = None;
        for task in pool.drain_backlog() {
            let Some(InFlight {
                mut descriptor,
                previous,
            }) = in_flight.remove(&task.job_id())
            else {
                tracing::warn!(job_id = %task.job_id(), "Unstarted task was not dispatched by this run");
                continue;
            };

            tracing::info!(job_id = %descriptor.id, status = %previous, "Returning unstarted job to the queue");
            descriptor.status = previous;
            descriptor.updated_at = self.clock.now();
            if let Err(err) = self.queue_service.persist(&descriptor).await {
                tracing::error!(job_id = %descriptor.id, error = %err, "Failed to return unstarted job");
                first_err.get_or_insert(err);
                continue;
            }
            self.release_quietly(&descriptor).await;
        }
        first_err.map_or(Ok(()), Err)
    }

    async fn release(&self, claimed: Option<JobDescriptor>) -> Result<(), RunnerError> {
        if let Some(descriptor) = claimed {
            tracing::debug!(job_id = %descriptor.id, "Releasing undispatched claim");
            self.queue_service.release(&descriptor).await?;
        }
        Ok(())
    }

    async fn release_quietly(&self, descriptor: &JobDescriptor) {
        if let Err(err) = self.queue_service.release(descriptor).await {
            tracing::warn!(job_id = %descriptor.id, error = %err, "Failed to release claim");
        }
    }
}
