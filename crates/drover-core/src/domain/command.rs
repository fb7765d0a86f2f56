//! Worker launch command.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// The program (plus fixed arguments) the pool runs for every worker.
///
/// Per-job arguments are appended by the pool at spawn time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// `<entry_point> <base_path>/<script> tasks/<child_runner>`
    pub fn for_child_runner(
        entry_point: &str,
        base_path: &Path,
        script: &str,
        child_runner: &str,
    ) -> Self {
        Self {
            program: entry_point.to_string(),
            args: vec![
                base_path.join(script).display().to_string(),
                format!("tasks/{child_runner}"),
            ],
        }
    }

    /// Build from a full argv (`["php", "cli.php", ...]`). `None` when empty.
    pub fn from_argv<S: AsRef<str>>(argv: &[S]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.as_ref().to_string(),
            args: args.iter().map(|a| a.as_ref().to_string()).collect(),
        })
    }
}

impl fmt::Display for WorkerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn child_runner_command_joins_base_path_and_task() {
        let cmd = WorkerCommand::for_child_runner(
            "php",
            &PathBuf::from("/srv/app"),
            "cli-script.php",
            "ProcessJobQueueChildTask",
        );

        assert_eq!(cmd.program, "php");
        assert_eq!(
            cmd.to_string(),
            "php /srv/app/cli-script.php tasks/ProcessJobQueueChildTask"
        );
    }

    #[test]
    fn from_argv_splits_program_and_args() {
        let cmd = WorkerCommand::from_argv(&["sh", "-c", "exit 0"]).unwrap();
        assert_eq!(cmd.program, "sh");
        assert_eq!(cmd.args, vec!["-c".to_string(), "exit 0".to_string()]);

        let empty: [&str; 0] = [];
        assert!(WorkerCommand::from_argv(&empty).is_none());
    }
}
