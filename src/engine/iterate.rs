use super::action::Action;
use super::descriptor::TaskDescriptor;
use super::error::TaskError;
use super::template::{self, Bindings, POSITIONAL, is_name};
use crate::stream;

/// Structured input a task template is replayed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Records {
    /// One value per record, bound to `$1`.
    Positional(Vec<String>),
    /// `key=value` lines, each key bound by name.
    Keyed(Vec<String>),
}

impl Records {
    pub fn positional<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Records::Positional(values.into_iter().map(Into::into).collect())
    }

    pub fn keyed<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Records::Keyed(lines.into_iter().map(Into::into).collect())
    }

    /// Decodes an escaped stream (see `stream::stream`) into positional records.
    pub fn from_stream(text: &str) -> anyhow::Result<Self> {
        Ok(Records::Positional(stream::values(text)?))
    }
}

/// Parses `a=1 b='x y'` (or `[a]=1 [b]=x`) into bindings.
pub fn parse_keyed(line: &str) -> Result<Bindings, TaskError> {
    let words = shell_words::split(line)
        .map_err(|e| TaskError::RecordParse(format!("{}: {}", line, e)))?;

    let mut bindings = Bindings::new();
    for word in words {
        let Some((key, value)) = word.split_once('=') else {
            return Err(TaskError::RecordParse(format!("'{}' is not key=value in: {}", word, line)));
        };
        let key = key
            .strip_prefix('[')
            .and_then(|k| k.strip_suffix(']'))
            .unwrap_or(key);
        if !is_name(key) {
            return Err(TaskError::RecordParse(format!("'{}' is not a valid key in: {}", key, line)));
        }
        bindings.insert(key.to_string(), value.to_string());
    }
    Ok(bindings)
}

/// One record's fully bound task, ready for the classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub task: TaskDescriptor,
    pub action: Action,
}

/// Expands a template over every record. Keyed lines are all parsed up front,
/// so a malformed record stops the run before anything executes.
pub fn plan(task: &TaskDescriptor, action: &Action, records: &Records) -> Result<Vec<Step>, TaskError> {
    match records {
        Records::Keyed(lines) => lines
            .iter()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                let bindings = parse_keyed(line)?;
                Ok(Step {
                    task: task.render(&bindings).labelled(line.trim()),
                    action: action.render(&bindings),
                })
            })
            .collect(),
        Records::Positional(values) => {
            let task_list = !action.references(POSITIONAL);
            Ok(values
                .iter()
                .map(|value| {
                    let bindings = template::positional(value);
                    let action = if task_list {
                        Action::relaxed_script(value.clone())
                    } else {
                        action.render(&bindings)
                    };
                    Step {
                        task: task.render(&bindings).labelled(value),
                        action,
                    }
                })
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::action::Predicate;

    #[test]
    fn test_parse_keyed_forms() {
        let b = parse_keyed("[a]=1 [b]=x").unwrap();
        assert_eq!(b.get("a").unwrap(), "1");
        assert_eq!(b.get("b").unwrap(), "x");

        let b = parse_keyed("src=~/dot/vimrc dst='/home/me/my vimrc' empty=").unwrap();
        assert_eq!(b.get("dst").unwrap(), "/home/me/my vimrc");
        assert_eq!(b.get("empty").unwrap(), "");
    }

    #[test]
    fn test_parse_keyed_rejects_bare_word() {
        assert!(matches!(parse_keyed("a=1 oops"), Err(TaskError::RecordParse(_))));
        assert!(matches!(parse_keyed("=1"), Err(TaskError::RecordParse(_))));
        assert!(matches!(parse_keyed("$(touch${IFS}x)=1"), Err(TaskError::RecordParse(_))));
    }

    #[test]
    fn test_plan_keyed_isolates_records() {
        let mut task = TaskDescriptor::new("pair");
        task.condition = Some(Predicate::Command(vec!["test".into(), "-e".into(), "$a".into()]));
        let action = Action::command(["echo", "$a", "${b}"]);
        let steps = plan(&task, &action, &Records::keyed(["[a]=1 [b]=x", "[a]=2 [b]=y"])).unwrap();

        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].action, Action::command(["echo", "1", "x"]));
        assert_eq!(steps[1].action, Action::command(["echo", "2", "y"]));
        assert_eq!(steps[0].task.description, "pair: [a]=1 [b]=x");
        assert_eq!(
            steps[1].task.condition,
            Some(Predicate::Command(vec!["test".into(), "-e".into(), "2".into()]))
        );
        assert_eq!(steps[1].task.bindings.get("b").map(String::as_str), Some("y"));
        assert!(!steps[1].task.bindings.contains_key("1"));
    }

    #[test]
    fn test_plan_keyed_fails_before_running_anything() {
        let task = TaskDescriptor::new("pair");
        let action = Action::command(["true"]);
        assert!(plan(&task, &action, &Records::keyed(["a=1", "broken"])).is_err());
    }

    #[test]
    fn test_plan_positional_binds_value() {
        let task = TaskDescriptor::new("pkg");
        let action = Action::script("install \"$1\"");
        let steps = plan(&task, &action, &Records::positional(["git", "fd find"])).unwrap();
        assert_eq!(steps[1].action, action);
        assert_eq!(steps[1].task.bindings, template::positional("fd find"));
        assert_eq!(steps[1].task.description, "pkg: fd find");
    }

    #[test]
    fn test_plan_task_list_mode() {
        let task = TaskDescriptor::new("setup");
        let action = Action::command(["true"]);
        let steps = plan(&task, &action, &Records::positional(["mkdir -p a", "touch a/b"])).unwrap();
        assert_eq!(steps[0].action, Action::relaxed_script("mkdir -p a"));
        assert_eq!(steps[1].task.description, "setup: touch a/b");
    }
}
