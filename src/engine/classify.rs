//! The task state machine:
//!
//! `Init -> Precheck -> {OkSkip | Executing} -> Executed -> {OkUnchanged | Changed | Failed}`
//!
//! Classification after execution is strict priority: unchanged marker in the
//! output, then exit code 0 with the condition holding (or no condition), else failure.

use anyhow::Result;
use std::time::Duration;
use super::action::Action;
use super::condition;
use super::descriptor::TaskDescriptor;
use super::error::FailureKind;
use super::executor::{self, ExecContext, Execution};
use super::report::{Phase, Reporter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Condition already held; the action never ran.
    OkSkip,
    /// The action ran and its output carried the unchanged marker.
    OkUnchanged,
    Changed,
    Failed,
    /// Left out by short-run mode; counted nowhere.
    Skipped,
}

impl Status {
    pub fn is_ok(&self) -> bool {
        matches!(self, Status::OkSkip | Status::OkUnchanged)
    }

    fn weight(&self) -> u8 {
        match self {
            Status::Skipped => 0,
            Status::OkSkip => 1,
            Status::OkUnchanged => 2,
            Status::Changed => 3,
            Status::Failed => 4,
        }
    }

    /// The more significant of two statuses, used to summarise an action list.
    pub fn combine(self, other: Status) -> Status {
        if other.weight() > self.weight() { other } else { self }
    }
}

/// Exactly one of these per task invocation (or per loop record).
#[derive(Debug, Clone)]
pub struct Outcome {
    pub description: String,
    pub status: Status,
    pub exit_code: i32,
    pub output: String,
    pub failure: Option<FailureKind>,
    /// `None` when the action never ran.
    pub duration: Option<Duration>,
}

impl Outcome {
    fn without_execution(task: &TaskDescriptor, status: Status) -> Self {
        Self {
            description: task.description.clone(),
            status,
            exit_code: 0,
            output: String::new(),
            failure: None,
            duration: None,
        }
    }
}

/// Post-execution classification. The condition is only re-checked when the
/// marker did not match and the action exited 0.
pub fn classify_execution(
    task: &TaskDescriptor,
    execution: &Execution,
    postcheck: impl FnOnce() -> bool,
) -> (Status, Option<FailureKind>) {
    let marker = task.unchanged_marker.as_deref().filter(|m| !m.is_empty());
    if let Some(marker) = marker {
        if execution.output.contains(marker) {
            return (Status::OkUnchanged, None);
        }
    }

    if execution.exit_code != 0 {
        return (Status::Failed, Some(FailureKind::ActionFailed));
    }

    if task.condition.is_some() && !postcheck() {
        return (Status::Failed, Some(FailureKind::PostconditionNotMet));
    }

    (Status::Changed, None)
}

pub struct Classifier<'r> {
    pub ctx: &'r ExecContext,
    pub reporter: &'r mut Reporter,
    pub short_run: bool,
}

impl Classifier<'_> {
    /// Drives one leaf action through the state machine.
    /// `announce` controls the `begin` line; iteration turns it off.
    pub fn run(&mut self, task: &TaskDescriptor, action: &Action, announce: bool) -> Result<Outcome> {
        if self.short_run && task.is_long_running() {
            self.reporter.status(Phase::Skipping, &task.description)?;
            return Ok(Outcome::without_execution(task, Status::Skipped));
        }

        // Precheck
        if let Some(cond) = &task.condition {
            if condition::evaluate(cond, &task.bindings, self.ctx) {
                return Ok(Outcome::without_execution(task, Status::OkSkip));
            }
        }

        // Executing
        if task.show_progress {
            self.reporter.status(Phase::Progress, &task.description)?;
        } else if announce {
            self.reporter.status(Phase::Begin, &task.description)?;
        }

        let live = if task.show_progress { Some(self.reporter.live()) } else { None };
        let execution = executor::execute(action, task.become_user.as_deref(), &task.bindings, live, self.ctx)?;

        // Executed
        let ctx = self.ctx;
        let (status, failure) = classify_execution(task, &execution, || {
            task.condition
                .as_ref()
                .is_some_and(|cond| condition::evaluate(cond, &task.bindings, ctx))
        });

        Ok(Outcome {
            description: task.description.clone(),
            status,
            exit_code: execution.exit_code,
            output: execution.output,
            failure,
            duration: Some(execution.duration),
        })
    }
}
