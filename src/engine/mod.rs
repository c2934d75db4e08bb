pub mod action;
pub mod classify;
pub mod condition;
pub mod descriptor;
pub mod error;
pub mod executor;
pub mod iterate;
pub mod ledger;
pub mod report;
pub mod template;

use anyhow::Result;
use colored::*;
use log::{debug, warn};
use std::path::PathBuf;
use crate::logger::{LogSettings, LogStrategy, write_log};
use self::action::{Action, Predicate};
use self::classify::{Classifier, Outcome, Status};
use self::descriptor::TaskDescriptor;
use self::error::TaskError;
use self::executor::ExecContext;
use self::iterate::{Records, plan};
use self::ledger::RunLedger;
use self::report::{Phase, Reporter};


/// One process-lifetime run: execution settings, the reporter and the ledger.
/// Tasks are declared through `task()` one at a time.
pub struct Run {
    ctx: ExecContext,
    reporter: Reporter,
    ledger: RunLedger,
    short_run: bool,
    log: LogSettings,
}

impl Run {
    pub fn new(ctx: ExecContext, reporter: Reporter) -> Self {
        Self {
            ctx,
            reporter,
            ledger: RunLedger::new(),
            short_run: false,
            log: LogSettings::default(),
        }
    }

    /// Skip tasks presumed long-running (progress or unchanged marker).
    pub fn short_run(mut self, enabled: bool) -> Self {
        self.short_run = enabled;
        self
    }

    pub fn with_logging(mut self, log: LogSettings) -> Self {
        self.log = log;
        self
    }

    pub fn ledger(&self) -> &RunLedger {
        &self.ledger
    }

    /// Opens a fresh task declaration. Nothing carries over from the previous one.
    pub fn task(&mut self, description: impl Into<String>) -> TaskBuilder<'_> {
        TaskBuilder {
            run: self,
            task: TaskDescriptor::new(description),
            consumed: false,
        }
    }

    pub fn summarize(&mut self) -> Result<()> {
        self.reporter.summary(&self.ledger)
    }

    /// Runs an already-built descriptor. Lists fan out into one reported task per child.
    pub fn dispatch(&mut self, task: &TaskDescriptor, action: &Action, announce: bool) -> Result<Status> {
        task.validate()?;

        if let Action::List(children) = action {
            let mut combined = Status::Skipped;
            for child in children {
                let status = self.dispatch(&task.labelled(&child.to_string()), child, announce)?;
                combined = combined.combine(status);
            }
            return Ok(combined);
        }

        let outcome = Classifier {
            ctx: &self.ctx,
            reporter: &mut self.reporter,
            short_run: self.short_run,
        }
        .run(task, action, announce)?;

        self.conclude(&outcome, action)
    }

    fn conclude(&mut self, outcome: &Outcome, action: &Action) -> Result<Status> {
        match outcome.status {
            Status::OkSkip | Status::OkUnchanged => self.reporter.status(Phase::Ok, &outcome.description)?,
            Status::Changed => self.reporter.status(Phase::Changed, &outcome.description)?,
            Status::Failed => self.reporter.failure(outcome)?,
            Status::Skipped => {}
        }

        if let Some(duration) = outcome.duration {
            if self.log.strategy != LogStrategy::None {
                match write_log(
                    &outcome.description,
                    &action.to_string(),
                    &outcome.output,
                    &self.log,
                    duration,
                    outcome.exit_code,
                    outcome.status == Status::Failed,
                    &self.ctx.env,
                ) {
                    Ok(Some(path)) => debug!("Execution log written to {}", path.display()),
                    Ok(None) => {}
                    Err(e) => warn!("{} Could not write execution log: {:#}", "⚠️".yellow(), e),
                }
            }
        }

        self.ledger.record(outcome);

        if let (Status::Failed, Some(kind)) = (outcome.status, outcome.failure) {
            return Err(TaskError::Failed {
                description: outcome.description.clone(),
                exit_code: outcome.exit_code,
                kind,
            }
            .into());
        }
        Ok(outcome.status)
    }
}

/// Sequential configuration of one task. Consumed by `exec`/`exec_each`.
#[must_use = "a task does nothing until an action is supplied with `exec`"]
pub struct TaskBuilder<'r> {
    run: &'r mut Run,
    task: TaskDescriptor,
    consumed: bool,
}

impl TaskBuilder<'_> {
    pub fn cond(mut self, predicate: Predicate) -> Self {
        self.task.condition = Some(predicate);
        self
    }

    /// Shell predicate, e.g. `command -v git`.
    pub fn cond_script(self, text: impl Into<String>) -> Self {
        self.cond(Predicate::Script(text.into()))
    }

    /// Satisfied once `path` exists.
    pub fn exists(self, path: impl Into<PathBuf>) -> Self {
        self.cond(Predicate::PathExists(path.into()))
    }

    pub fn unchanged(mut self, marker: impl Into<String>) -> Self {
        self.task.unchanged_marker = Some(marker.into());
        self
    }

    pub fn become_user(mut self, user: impl Into<String>) -> Self {
        self.task.become_user = Some(user.into());
        self
    }

    pub fn progress(mut self) -> Self {
        self.task.show_progress = true;
        self
    }

    /// Supplies the action and runs the task. A failure is returned as
    /// `TaskError::Failed`; propagating it halts the run.
    pub fn exec(mut self, action: Action) -> Result<Status> {
        self.consumed = true;
        let task = std::mem::take(&mut self.task);
        self.run.dispatch(&task, &action, true)
    }

    /// Replays the task over every record, in order, without `begin` lines.
    /// The first failing record stops the whole iteration.
    pub fn exec_each(mut self, records: &Records, action: Action) -> Result<Vec<Status>> {
        self.consumed = true;
        let task = std::mem::take(&mut self.task);
        task.validate()?;

        let steps = plan(&task, &action, records)?;
        debug!("Iterating '{}' over {} records", task.description, steps.len());

        let mut statuses = Vec::with_capacity(steps.len());
        for step in steps {
            statuses.push(self.run.dispatch(&step.task, &step.action, false)?);
        }
        Ok(statuses)
    }
}

impl Drop for TaskBuilder<'_> {
    fn drop(&mut self) {
        if !self.consumed {
            warn!(
                "{} {}",
                "⚠️".yellow(),
                TaskError::Misuse(format!("task '{}' declared without an action", self.task.description))
            );
        }
    }
}
