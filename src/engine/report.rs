use anyhow::Result;
use colored::*;
use std::io::{self, IsTerminal, Write};
use std::sync::{Arc, Mutex};
use super::classify::Outcome;
use super::error::FailureKind;
use super::ledger::RunLedger;

/// Status shown in front of a task description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Begin,
    Progress,
    Ok,
    Changed,
    Failed,
    Skipping,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Begin => "begin",
            Phase::Progress => "progress",
            Phase::Ok => "ok",
            Phase::Changed => "changed",
            Phase::Failed => "failed",
            Phase::Skipping => "skipping",
        }
    }

    fn paint(&self) -> ColoredString {
        let label = format!("[{}]", self.as_str());
        match self {
            Phase::Begin | Phase::Progress => label.blue(),
            Phase::Ok => label.green(),
            Phase::Changed => label.yellow(),
            Phase::Failed => label.red().bold(),
            Phase::Skipping => label.dimmed(),
        }
    }
}

/// Writes `[status]\tdescription` lines and failure blocks.
pub struct Reporter {
    out: Box<dyn Write + Send>,
    color: bool,
}

impl Reporter {
    pub fn stdout() -> Self {
        Self {
            color: io::stdout().is_terminal(),
            out: Box::new(io::stdout()),
        }
    }

    pub fn to_writer(out: Box<dyn Write + Send>) -> Self {
        Self { out, color: false }
    }

    /// Sink that live progress output is duplicated to.
    pub fn live(&mut self) -> &mut dyn Write {
        &mut self.out
    }

    pub fn status(&mut self, phase: Phase, description: &str) -> Result<()> {
        if self.color {
            writeln!(self.out, "{}\t{}", phase.paint(), description)?;
        } else {
            writeln!(self.out, "[{}]\t{}", phase.as_str(), description)?;
        }
        self.out.flush()?;
        Ok(())
    }

    /// Full captured output (even if it was already streamed), then the stop banner.
    pub fn failure(&mut self, outcome: &Outcome) -> Result<()> {
        self.status(Phase::Failed, &outcome.description)?;
        if !outcome.output.is_empty() {
            self.out.write_all(outcome.output.as_bytes())?;
            if !outcome.output.ends_with('\n') {
                writeln!(self.out)?;
            }
        }
        if outcome.failure == Some(FailureKind::PostconditionNotMet) {
            let note = "command reported success but condition is not met";
            if self.color {
                writeln!(self.out, "{}", note.yellow())?;
            } else {
                writeln!(self.out, "{}", note)?;
            }
        }
        let banner = format!("stopping: task failed (exit {})", outcome.exit_code);
        if self.color {
            writeln!(self.out, "{} {}", "❌".red(), banner.red().bold())?;
        } else {
            writeln!(self.out, "{}", banner)?;
        }
        self.out.flush()?;
        Ok(())
    }

    pub fn summary(&mut self, ledger: &RunLedger) -> Result<()> {
        write!(self.out, "{}", ledger.summarize())?;
        self.out.flush()?;
        Ok(())
    }
}

/// In-memory sink for a `Reporter`, readable while the reporter holds a clone.
#[derive(Clone, Default)]
pub struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    pub fn contents(&self) -> String {
        let buf = self.0.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).write(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::classify::Status;

    fn failed(kind: FailureKind, exit_code: i32, output: &str) -> Outcome {
        Outcome {
            description: "build".into(),
            status: Status::Failed,
            exit_code,
            output: output.into(),
            failure: Some(kind),
            duration: None,
        }
    }

    #[test]
    fn test_status_line_format() {
        let capture = Capture::default();
        let mut reporter = Reporter::to_writer(Box::new(capture.clone()));
        reporter.status(Phase::Changed, "link vimrc").unwrap();
        assert_eq!(capture.contents(), "[changed]\tlink vimrc\n");
    }

    #[test]
    fn test_failure_block() {
        let capture = Capture::default();
        let mut reporter = Reporter::to_writer(Box::new(capture.clone()));
        reporter.failure(&failed(FailureKind::ActionFailed, 2, "boom")).unwrap();
        assert_eq!(capture.contents(), "[failed]\tbuild\nboom\nstopping: task failed (exit 2)\n");
    }

    #[test]
    fn test_failure_block_notes_false_success() {
        let capture = Capture::default();
        let mut reporter = Reporter::to_writer(Box::new(capture.clone()));
        reporter.failure(&failed(FailureKind::PostconditionNotMet, 0, "")).unwrap();
        assert!(capture.contents().contains("command reported success but condition is not met"));
    }
}
