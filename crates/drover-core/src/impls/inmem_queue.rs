//! InMemoryJobQueue - 開発用・テスト用のジョブ保存先
//!
//! # 実装詳細
//! - HashMap<JobId, JobDescriptor> が正本
//! - queue ごとの VecDeque<JobId> で FIFO を保つ（JobId だけを持つ）
//! - claim は予約。persist で pending から外れるか release されるまで他の caller には返さない
//! - tokio::sync::Mutex で排他制御（claim はロックの中で完結する）

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::domain::{JobDescriptor, JobId, JobStatus, QueueName, RunnerError};
use crate::ports::{Clock, IdGenerator, JobQueueService, SystemClock, UlidGenerator};

/// Job counts per status, for observability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub initializing: usize,
    pub running: usize,
    pub paused: usize,
    pub complete: usize,
    pub cancelled: usize,
    pub broken: usize,
}

#[derive(Default)]
struct InMemoryJobQueueState {
    jobs: HashMap<JobId, JobDescriptor>,

    /// FIFO order per queue. May hold ids that are no longer pending;
    /// they are dropped when a claim scans past them.
    order: HashMap<QueueName, VecDeque<JobId>>,

    /// Claimed but not yet persisted out of pending (or released).
    claimed: HashSet<JobId>,

    maintenance_lock: bool,
}

impl InMemoryJobQueueState {
    fn claim_next(&mut self, queue: &QueueName) -> Option<JobDescriptor> {
        let jobs = &self.jobs;
        let claimed = &mut self.claimed;
        let order = self.order.get_mut(queue)?;

        order.retain(|id| jobs.get(id).is_some_and(|job| job.status.is_pending()));
        let id = order.iter().copied().find(|id| !claimed.contains(id))?;
        claimed.insert(id);
        jobs.get(&id).cloned()
    }

    fn count(&self, status: JobStatus) -> usize {
        self.jobs.values().filter(|job| job.status == status).count()
    }

    fn enqueue_if_pending(&mut self, id: JobId) {
        let Some(job) = self.jobs.get(&id) else {
            return;
        };
        if !job.status.is_pending() {
            return;
        }
        let order = self.order.entry(job.queue.clone()).or_default();
        if !order.contains(&id) {
            order.push_back(id);
        }
    }
}

pub struct InMemoryJobQueue {
    state: Arc<Mutex<InMemoryJobQueueState>>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,

    /// Admission limit on concurrently initializing jobs. `None` = unlimited.
    max_init_jobs: Option<usize>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(InMemoryJobQueueState::default())),
            clock: Arc::new(SystemClock),
            ids: Arc::new(UlidGenerator::new(SystemClock)),
            max_init_jobs: None,
        }
    }

    pub fn with_max_init_jobs(mut self, max_init_jobs: usize) -> Self {
        self.max_init_jobs = Some(max_init_jobs);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Add a new pending job to the back of `queue`.
    pub async fn enqueue(
        &self,
        queue: QueueName,
        job_type: impl Into<String>,
        title: impl Into<String>,
    ) -> JobId {
        let id = self.ids.generate_job_id();
        let descriptor = JobDescriptor::new(id, queue, job_type, title, self.clock.now());

        let mut state = self.state.lock().await;
        state.jobs.insert(id, descriptor);
        state.enqueue_if_pending(id);
        id
    }

    pub async fn get(&self, id: JobId) -> Option<JobDescriptor> {
        let state = self.state.lock().await;
        state.jobs.get(&id).cloned()
    }

    /// Status update from the worker side (running, complete, waiting, ...).
    ///
    /// A job moved back to a pending status becomes claimable again.
    pub async fn set_status(&self, id: JobId, status: JobStatus) -> Result<(), RunnerError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let job = state.jobs.get_mut(&id).ok_or(RunnerError::JobNotFound(id))?;
        let was_pending = job.status.is_pending();
        let queue = job.queue.clone();
        job.status = status;
        job.updated_at = now;
        state.claimed.remove(&id);
        if !was_pending {
            // 古い位置を捨てて末尾に並び直す
            if let Some(order) = state.order.get_mut(&queue) {
                order.retain(|queued| *queued != id);
            }
        }
        state.enqueue_if_pending(id);
        Ok(())
    }

    pub async fn set_maintenance_lock(&self, active: bool) {
        self.state.lock().await.maintenance_lock = active;
    }

    pub async fn counts_by_status(&self) -> StatusCounts {
        let state = self.state.lock().await;
        let mut counts = StatusCounts::default();
        for job in state.jobs.values() {
            match job.status {
                JobStatus::New | JobStatus::Waiting => counts.pending += 1,
                JobStatus::Initializing => counts.initializing += 1,
                JobStatus::Running => counts.running += 1,
                JobStatus::Paused => counts.paused += 1,
                JobStatus::Complete => counts.complete += 1,
                JobStatus::Cancelled => counts.cancelled += 1,
                JobStatus::Broken => counts.broken += 1,
            }
        }
        counts
    }
}

impl Default for InMemoryJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobQueueService for InMemoryJobQueue {
    async fn is_at_max_jobs(&self) -> Result<bool, RunnerError> {
        let Some(max) = self.max_init_jobs else {
            return Ok(false);
        };
        let state = self.state.lock().await;
        Ok(state.count(JobStatus::Initializing) >= max)
    }

    async fn is_maintenance_lock_active(&self) -> Result<bool, RunnerError> {
        Ok(self.state.lock().await.maintenance_lock)
    }

    async fn next_pending_job(
        &self,
        queue: &QueueName,
    ) -> Result<Option<JobDescriptor>, RunnerError> {
        let mut state = self.state.lock().await;
        Ok(state.claim_next(queue))
    }

    async fn persist(&self, descriptor: &JobDescriptor) -> Result<(), RunnerError> {
        let mut state = self.state.lock().await;
        let id = descriptor.id;
        let held = state.claimed.contains(&id);
        let stored = state
            .jobs
            .get_mut(&id)
            .ok_or(RunnerError::JobNotFound(id))?;

        // Initializing は claim を持ったまま pending からのみ。
        // pending への書き戻しは Initializing（または pending）からのみ。
        let allowed = match descriptor.status {
            JobStatus::Initializing => held && stored.status.is_pending(),
            status if status.is_pending() => {
                stored.status.is_pending() || stored.status == JobStatus::Initializing
            }
            _ => true,
        };
        if !allowed {
            return Err(RunnerError::StaleWrite {
                job_id: id,
                stored: stored.status,
                attempted: descriptor.status,
            });
        }
        *stored = descriptor.clone();

        if descriptor.status.is_pending() {
            state.enqueue_if_pending(id);
        } else {
            state.claimed.remove(&id);
        }
        Ok(())
    }

    async fn release(&self, descriptor: &JobDescriptor) -> Result<(), RunnerError> {
        self.state.lock().await.claimed.remove(&descriptor.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ulid::Ulid;

    async fn queue_with_jobs(n: usize) -> (InMemoryJobQueue, Vec<JobId>) {
        let queue = InMemoryJobQueue::new();
        let mut ids = Vec::new();
        for i in 0..n {
            ids.push(
                queue
                    .enqueue(QueueName::queued(), "test", format!("job {i}"))
                    .await,
            );
        }
        (queue, ids)
    }

    #[tokio::test]
    async fn claims_in_fifo_order() {
        let (queue, ids) = queue_with_jobs(3).await;

        for expected in ids {
            let claimed = queue
                .next_pending_job(&QueueName::queued())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(claimed.id, expected);
            assert_eq!(claimed.status, JobStatus::New);
        }
        assert!(queue
            .next_pending_job(&QueueName::queued())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn queues_are_independent() {
        let queue = InMemoryJobQueue::new();
        let large = queue.enqueue(QueueName::large(), "test", "big").await;

        assert!(queue
            .next_pending_job(&QueueName::immediate())
            .await
            .unwrap()
            .is_none());
        let claimed = queue.next_pending_job(&QueueName::large()).await.unwrap();
        assert_eq!(claimed.map(|d| d.id), Some(large));
    }

    #[tokio::test]
    async fn concurrent_claims_never_share_a_job() {
        let (queue, ids) = queue_with_jobs(5).await;
        let queue = Arc::new(queue);

        let mut handles = Vec::new();
        for _ in 0..20 {
            let q = Arc::clone(&queue);
            handles.push(tokio::spawn(async move {
                q.next_pending_job(&QueueName::queued()).await.unwrap()
            }));
        }

        let mut claimed = Vec::new();
        for h in handles {
            if let Some(d) = h.await.unwrap() {
                claimed.push(d.id);
            }
        }
        claimed.sort();
        let mut expected = ids.clone();
        expected.sort();
        assert_eq!(claimed, expected);
    }

    #[tokio::test]
    async fn released_claim_is_claimable_again() {
        let (queue, ids) = queue_with_jobs(1).await;
        let first = queue
            .next_pending_job(&QueueName::queued())
            .await
            .unwrap()
            .unwrap();

        queue.release(&first).await.unwrap();

        let again = queue.next_pending_job(&QueueName::queued()).await.unwrap();
        assert_eq!(again.map(|d| d.id), Some(ids[0]));
    }

    #[tokio::test]
    async fn persisted_initializing_job_leaves_the_queue() {
        let (queue, ids) = queue_with_jobs(1).await;
        let mut claimed = queue
            .next_pending_job(&QueueName::queued())
            .await
            .unwrap()
            .unwrap();

        claimed.begin_initializing(Utc::now()).unwrap();
        queue.persist(&claimed).await.unwrap();
        queue.release(&claimed).await.unwrap();

        assert!(queue
            .next_pending_job(&QueueName::queued())
            .await
            .unwrap()
            .is_none());
        assert_eq!(
            queue.get(ids[0]).await.unwrap().status,
            JobStatus::Initializing
        );
        assert_eq!(queue.counts_by_status().await.initializing, 1);
    }

    #[tokio::test]
    async fn cancelled_claim_cannot_be_persisted_as_initializing() {
        let (queue, ids) = queue_with_jobs(1).await;
        let mut claimed = queue
            .next_pending_job(&QueueName::queued())
            .await
            .unwrap()
            .unwrap();

        queue.set_status(ids[0], JobStatus::Cancelled).await.unwrap();
        claimed.begin_initializing(Utc::now()).unwrap();
        let err = queue.persist(&claimed).await.unwrap_err();

        assert!(matches!(
            err,
            RunnerError::StaleWrite {
                stored: JobStatus::Cancelled,
                attempted: JobStatus::Initializing,
                ..
            }
        ));
        assert_eq!(queue.get(ids[0]).await.unwrap().status, JobStatus::Cancelled);
    }

    #[tokio::test]
    async fn released_claim_cannot_be_persisted_as_initializing() {
        let (queue, _) = queue_with_jobs(1).await;
        let mut claimed = queue
            .next_pending_job(&QueueName::queued())
            .await
            .unwrap()
            .unwrap();
        queue.release(&claimed).await.unwrap();

        claimed.begin_initializing(Utc::now()).unwrap();
        let err = queue.persist(&claimed).await.unwrap_err();

        assert!(matches!(err, RunnerError::StaleWrite { stored: JobStatus::New, .. }));
    }

    #[tokio::test]
    async fn reverted_initializing_job_is_claimable_again() {
        let (queue, ids) = queue_with_jobs(2).await;
        let mut first = queue
            .next_pending_job(&QueueName::queued())
            .await
            .unwrap()
            .unwrap();
        first.begin_initializing(Utc::now()).unwrap();
        queue.persist(&first).await.unwrap();
        // 次の claim で first は FIFO から外れる
        let second = queue.next_pending_job(&QueueName::queued()).await.unwrap();
        assert_eq!(second.map(|d| d.id), Some(ids[1]));

        first.status = JobStatus::New;
        queue.persist(&first).await.unwrap();

        let again = queue.next_pending_job(&QueueName::queued()).await.unwrap();
        assert_eq!(again.map(|d| d.id), Some(ids[0]));
    }

    #[tokio::test]
    async fn revert_does_not_resurrect_a_cancelled_job() {
        let (queue, ids) = queue_with_jobs(1).await;
        let mut claimed = queue
            .next_pending_job(&QueueName::queued())
            .await
            .unwrap()
            .unwrap();
        claimed.begin_initializing(Utc::now()).unwrap();
        queue.persist(&claimed).await.unwrap();
        queue.set_status(ids[0], JobStatus::Cancelled).await.unwrap();

        claimed.status = JobStatus::New;
        let err = queue.persist(&claimed).await.unwrap_err();

        assert!(matches!(err, RunnerError::StaleWrite { stored: JobStatus::Cancelled, .. }));
        assert!(queue
            .next_pending_job(&QueueName::queued())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn admission_saturates_on_initializing_jobs() {
        let queue = InMemoryJobQueue::new().with_max_init_jobs(1);
        let id = queue.enqueue(QueueName::queued(), "test", "a").await;
        assert!(!queue.is_at_max_jobs().await.unwrap());

        queue.set_status(id, JobStatus::Initializing).await.unwrap();
        assert!(queue.is_at_max_jobs().await.unwrap());

        queue.set_status(id, JobStatus::Running).await.unwrap();
        assert!(!queue.is_at_max_jobs().await.unwrap());
    }

    #[tokio::test]
    async fn unlimited_admission_is_never_saturated() {
        let (queue, ids) = queue_with_jobs(3).await;
        for id in ids {
            queue.set_status(id, JobStatus::Initializing).await.unwrap();
        }
        assert!(!queue.is_at_max_jobs().await.unwrap());
    }

    #[tokio::test]
    async fn waiting_job_is_requeued_at_the_back() {
        let (queue, ids) = queue_with_jobs(2).await;
        queue.set_status(ids[0], JobStatus::Running).await.unwrap();
        queue.set_status(ids[0], JobStatus::Waiting).await.unwrap();

        let first = queue.next_pending_job(&QueueName::queued()).await.unwrap();
        let second = queue.next_pending_job(&QueueName::queued()).await.unwrap();
        assert_eq!(first.map(|d| d.id), Some(ids[1]));
        assert_eq!(second.map(|d| d.id), Some(ids[0]));
    }

    #[tokio::test]
    async fn maintenance_lock_toggles() {
        let queue = InMemoryJobQueue::new();
        assert!(!queue.is_maintenance_lock_active().await.unwrap());

        queue.set_maintenance_lock(true).await;
        assert!(queue.is_maintenance_lock_active().await.unwrap());
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let queue = InMemoryJobQueue::new();
        let id = JobId::from_ulid(Ulid::new());

        let err = queue.set_status(id, JobStatus::Complete).await.unwrap_err();
        assert!(matches!(err, RunnerError::JobNotFound(missing) if missing == id));
    }
}
