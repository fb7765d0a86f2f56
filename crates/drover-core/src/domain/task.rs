//! Dispatchable task: what the runner hands to the process pool.

use serde::{Deserialize, Serialize};

use super::ids::JobId;
use super::job::JobDescriptor;
use super::queue_name::QueueName;

/// A claimed, initialized job wrapped for a worker process.
///
/// Created fresh for every dispatch. Once submitted the pool owns it and
/// drops it when the worker exits. It only carries what a worker needs to
/// find its job again; the descriptor itself stays with the queue service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchTask {
    job_id: JobId,
    queue: QueueName,
    job_type: String,
}

impl DispatchTask {
    pub fn new(descriptor: &JobDescriptor) -> Self {
        Self {
            job_id: descriptor.id,
            queue: descriptor.queue.clone(),
            job_type: descriptor.job_type.clone(),
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn queue(&self) -> &QueueName {
        &self.queue
    }

    pub fn job_type(&self) -> &str {
        &self.job_type
    }

    /// Arguments appended to the worker command so the child can locate its job.
    pub fn worker_args(&self) -> Vec<String> {
        vec![
            "--job".to_string(),
            self.job_id.to_string(),
            "--queue".to_string(),
            self.queue.to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ulid::Ulid;

    #[test]
    fn worker_args_identify_job_and_queue() {
        let descriptor = JobDescriptor::new(
            JobId::from_ulid(Ulid::new()),
            QueueName::large(),
            "media.transcode",
            "Transcode upload",
            Utc::now(),
        );
        let task = DispatchTask::new(&descriptor);

        assert_eq!(task.job_id(), descriptor.id);
        assert_eq!(task.job_type(), "media.transcode");
        assert_eq!(
            task.worker_args(),
            vec![
                "--job".to_string(),
                descriptor.id.to_string(),
                "--queue".to_string(),
                "large".to_string(),
            ]
        );
    }
}
