use std::fmt;

/// Why a task ended in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The action exited non-zero (or could not be spawned).
    ActionFailed,
    /// The action exited 0 but its condition is still false afterwards.
    PostconditionNotMet,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::ActionFailed => write!(f, "action failed"),
            FailureKind::PostconditionNotMet => write!(f, "condition not met after action"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Task '{description}' failed ({kind}), exit code {exit_code}")]
    Failed {
        description: String,
        exit_code: i32,
        kind: FailureKind,
    },

    #[error("Configuration misuse: {0}")]
    Misuse(String),

    #[error("Invalid record: {0}")]
    RecordParse(String),
}

impl TaskError {
    /// Process exit status for a run halted by this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            TaskError::Failed { exit_code, kind, .. } => match kind {
                FailureKind::ActionFailed if *exit_code != 0 => *exit_code,
                _ => 1,
            },
            TaskError::Misuse(_) | TaskError::RecordParse(_) => 1,
        }
    }
}
