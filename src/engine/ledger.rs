use super::classify::{Outcome, Status};

/// Aggregate counters for the whole run. Only ever grows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunLedger {
    ok: usize,
    changed: usize,
    changed_descriptions: Vec<String>,
}

impl RunLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: &Outcome) {
        match outcome.status {
            Status::OkSkip | Status::OkUnchanged => self.ok += 1,
            Status::Changed => {
                self.changed += 1;
                self.changed_descriptions.push(outcome.description.clone());
            }
            Status::Failed | Status::Skipped => {}
        }
    }

    pub fn ok_count(&self) -> usize {
        self.ok
    }

    pub fn changed_count(&self) -> usize {
        self.changed
    }

    pub fn changed_descriptions(&self) -> &[String] {
        &self.changed_descriptions
    }

    pub fn summarize(&self) -> String {
        let mut out = format!("ok: {}\nchanged: {}\n", self.ok, self.changed);
        for description in &self.changed_descriptions {
            out.push_str(&format!("  - {}\n", description));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(description: &str, status: Status) -> Outcome {
        Outcome {
            description: description.into(),
            status,
            exit_code: 0,
            output: String::new(),
            failure: None,
            duration: None,
        }
    }

    #[test]
    fn test_counts() {
        let mut ledger = RunLedger::new();
        ledger.record(&outcome("a", Status::OkSkip));
        ledger.record(&outcome("b", Status::OkUnchanged));
        ledger.record(&outcome("c", Status::Changed));
        ledger.record(&outcome("d", Status::Skipped));
        ledger.record(&outcome("e", Status::Changed));
        assert_eq!(ledger.ok_count(), 2);
        assert_eq!(ledger.changed_count(), 2);
        assert_eq!(ledger.changed_descriptions(), ["c".to_string(), "e".to_string()]);
    }

    #[test]
    fn test_summarize() {
        let mut ledger = RunLedger::new();
        ledger.record(&outcome("link vimrc", Status::Changed));
        assert_eq!(ledger.summarize(), "ok: 0\nchanged: 1\n  - link vimrc\n");
    }
}
