//! JobQueueService port - ジョブ記述子の正本（source of truth）
//!
//! runner はこの trait 越しにだけジョブを読み書きします。
//!
//! # 契約
//! - `next_pending_job` は atomic な claim。同じ pending job を 2 つの caller に返さない
//! - claim された job は `persist`（pending から外れる）か `release` まで予約されたまま
//! - admission 飽和と maintenance lock の判断はここが持つ

use async_trait::async_trait;

use crate::domain::{JobDescriptor, QueueName, RunnerError};

#[async_trait]
pub trait JobQueueService: Send + Sync {
    /// Whether initializing another job right now would exceed the admission limit.
    async fn is_at_max_jobs(&self) -> Result<bool, RunnerError>;

    /// Operator-controlled flag that pauses all job initialization.
    async fn is_maintenance_lock_active(&self) -> Result<bool, RunnerError>;

    /// Claim the next pending job on `queue`, if any.
    async fn next_pending_job(
        &self,
        queue: &QueueName,
    ) -> Result<Option<JobDescriptor>, RunnerError>;

    /// Store the descriptor's current state.
    async fn persist(&self, descriptor: &JobDescriptor) -> Result<(), RunnerError>;

    /// Give back a claim the caller decided not to dispatch.
    ///
    /// Services whose claims are not reservations can keep the default.
    async fn release(&self, _descriptor: &JobDescriptor) -> Result<(), RunnerError> {
        Ok(())
    }
}
