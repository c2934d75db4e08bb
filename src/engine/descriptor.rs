use super::action::Predicate;
use super::error::TaskError;
use super::template::Bindings;

/// Configuration of the task about to run. Built fresh for every declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDescriptor {
    pub description: String,
    pub condition: Option<Predicate>,
    pub unchanged_marker: Option<String>,
    pub become_user: Option<String>,
    pub show_progress: bool,
    /// Values of the record being replayed; scripts receive them at spawn time.
    pub bindings: Bindings,
}

impl TaskDescriptor {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), TaskError> {
        if self.description.trim().is_empty() {
            return Err(TaskError::Misuse("task declared without a description".to_string()));
        }
        Ok(())
    }

    /// Tasks the short-run mode leaves out.
    pub fn is_long_running(&self) -> bool {
        self.show_progress || self.unchanged_marker.is_some()
    }

    /// Same settings under `"<description>: <suffix>"`.
    pub fn labelled(&self, suffix: &str) -> Self {
        Self {
            description: format!("{}: {}", self.description, suffix),
            ..self.clone()
        }
    }

    /// Copy bound to one record.
    pub fn render(&self, bindings: &Bindings) -> Self {
        Self {
            condition: self.condition.as_ref().map(|c| c.render(bindings)),
            bindings: bindings.clone(),
            ..self.clone()
        }
    }
}
