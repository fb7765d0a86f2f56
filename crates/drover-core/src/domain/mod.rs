//! Domain model (IDs, job descriptors, statuses, rules, errors).

pub mod command;
pub mod errors;
pub mod ids;
pub mod job;
pub mod queue_name;
pub mod rule;
pub mod state;
pub mod task;

pub use self::command::WorkerCommand;
pub use self::errors::RunnerError;
pub use self::ids::{JobId, RunId};
pub use self::job::JobDescriptor;
pub use self::queue_name::QueueName;
pub use self::rule::{HostSnapshot, Rule, RuleParseError, parse_rules};
pub use self::state::JobStatus;
pub use self::task::DispatchTask;
