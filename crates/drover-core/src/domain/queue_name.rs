//! Named job queues.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of a job queue.
///
/// Three queues are conventional (`immediate`, `queued`, `large`) but any
/// name works; the queue service decides what a name means.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueName(String);

impl QueueName {
    pub const IMMEDIATE: &'static str = "immediate";
    pub const QUEUED: &'static str = "queued";
    pub const LARGE: &'static str = "large";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn immediate() -> Self {
        Self::new(Self::IMMEDIATE)
    }

    pub fn queued() -> Self {
        Self::new(Self::QUEUED)
    }

    pub fn large() -> Self {
        Self::new(Self::LARGE)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for QueueName {
    fn default() -> Self {
        Self::queued()
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QueueName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
