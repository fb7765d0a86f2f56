//! Job descriptor: one unit of queued work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::RunnerError;
use super::ids::JobId;
use super::queue_name::QueueName;
use super::state::JobStatus;

/// A job record as the queue service stores it.
///
/// Design:
/// - The queue service owns the record and its persistence.
/// - The runner reads it and writes exactly one transition (pending -> initializing).
/// - Every later status is written by the worker process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub id: JobId,
    pub queue: QueueName,

    /// What kind of work the worker should run.
    pub job_type: String,

    pub title: String,
    pub status: JobStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobDescriptor {
    pub fn new(
        id: JobId,
        queue: QueueName,
        job_type: impl Into<String>,
        title: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            queue,
            job_type: job_type.into(),
            title: title.into(),
            status: JobStatus::New,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move a pending descriptor to `Initializing`.
    ///
    /// The descriptor is left untouched when it is not pending.
    pub fn begin_initializing(&mut self, now: DateTime<Utc>) -> Result<(), RunnerError> {
        if !self.status.is_pending() {
            return Err(RunnerError::InvalidTransition {
                job_id: self.id,
                from: self.status,
            });
        }
        self.status = JobStatus::Initializing;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;
    use ulid::Ulid;

    fn descriptor(status: JobStatus) -> JobDescriptor {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut d = JobDescriptor::new(
            JobId::from_ulid(Ulid::new()),
            QueueName::queued(),
            "reports.rebuild",
            "Rebuild reports",
            created,
        );
        d.status = status;
        d
    }

    #[rstest]
    #[case::new(JobStatus::New)]
    #[case::waiting(JobStatus::Waiting)]
    fn pending_descriptor_moves_to_initializing(#[case] status: JobStatus) {
        let mut d = descriptor(status);
        let later = Utc.with_ymd_and_hms(2024, 1, 1, 0, 5, 0).unwrap();

        d.begin_initializing(later).unwrap();

        assert_eq!(d.status, JobStatus::Initializing);
        assert_eq!(d.updated_at, later);
        assert!(d.created_at < d.updated_at);
    }

    #[rstest]
    #[case::initializing(JobStatus::Initializing)]
    #[case::running(JobStatus::Running)]
    #[case::complete(JobStatus::Complete)]
    fn non_pending_descriptor_is_rejected(#[case] status: JobStatus) {
        let mut d = descriptor(status);
        let before = d.clone();

        let err = d.begin_initializing(Utc::now()).unwrap_err();

        assert!(matches!(err, RunnerError::InvalidTransition { from, .. } if from == status));
        assert_eq!(d, before);
    }
}
