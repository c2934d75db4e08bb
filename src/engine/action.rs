use anyhow::{Context, Result, bail};
use std::fmt;
use std::path::PathBuf;
use super::template::{self, Bindings};

/// How a script body is handed to the shell. Scoped to one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShellMode {
    /// `set -eu` before the body.
    #[default]
    Strict,
    /// Body runs as written (third-party snippets that trip `-u`).
    Relaxed,
}

/// What a task runs. Every leaf is plain data (argv or script text) so it can be
/// re-invoked in another process when privilege escalation is requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Command(Vec<String>),
    Script { body: String, mode: ShellMode },
    /// Independently reported sub-tasks sharing the parent's settings.
    List(Vec<Action>),
}

impl Action {
    pub fn command<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Action::Command(args.into_iter().map(Into::into).collect())
    }

    /// Splits a command line with shell-words rules; nothing is evaluated by a shell.
    pub fn parse_command(line: &str) -> Result<Self> {
        let args = shell_words::split(line)
            .with_context(|| format!("Failed to parse command line: {}", line))?;
        if args.is_empty() {
            bail!("Empty command line");
        }
        Ok(Action::Command(args))
    }

    pub fn script(body: impl Into<String>) -> Self {
        Action::Script { body: body.into(), mode: ShellMode::Strict }
    }

    pub fn relaxed_script(body: impl Into<String>) -> Self {
        Action::Script { body: body.into(), mode: ShellMode::Relaxed }
    }

    pub fn list(actions: Vec<Action>) -> Self {
        Action::List(actions)
    }

    /// Applies record bindings to argv words (one value, one argument).
    /// Script text is left alone; the shell receives the bindings at spawn time.
    pub fn render(&self, bindings: &Bindings) -> Action {
        match self {
            Action::Command(args) => Action::Command(
                args.iter().map(|a| template::substitute(a, bindings)).collect(),
            ),
            Action::Script { .. } => self.clone(),
            Action::List(children) => {
                Action::List(children.iter().map(|c| c.render(bindings)).collect())
            }
        }
    }

    pub fn references(&self, name: &str) -> bool {
        match self {
            Action::Command(args) => args.iter().any(|a| template::references(a, name)),
            Action::Script { body, .. } => template::references(body, name),
            Action::List(children) => children.iter().any(|c| c.references(name)),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Command(args) => write!(f, "{}", shell_words::join(args)),
            Action::Script { body, .. } => {
                let mut lines = body.lines().filter(|l| !l.trim().is_empty());
                let first = lines.next().unwrap_or_default().trim();
                if lines.next().is_some() {
                    write!(f, "{} ...", first)
                } else {
                    write!(f, "{}", first)
                }
            }
            Action::List(children) => write!(f, "[{} actions]", children.len()),
        }
    }
}

/// Side-effect-free check of whether the task's end state already holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Command(Vec<String>),
    Script(String),
    PathExists(PathBuf),
}

impl Predicate {
    pub fn render(&self, bindings: &Bindings) -> Predicate {
        match self {
            Predicate::Command(args) => Predicate::Command(
                args.iter().map(|a| template::substitute(a, bindings)).collect(),
            ),
            Predicate::Script(_) => self.clone(),
            Predicate::PathExists(path) => {
                let raw = path.to_string_lossy();
                Predicate::PathExists(PathBuf::from(template::substitute(&raw, bindings)))
            }
        }
    }

    pub fn references(&self, name: &str) -> bool {
        match self {
            Predicate::Command(args) => args.iter().any(|a| template::references(a, name)),
            Predicate::Script(text) => template::references(text, name),
            Predicate::PathExists(path) => template::references(&path.to_string_lossy(), name),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Command(args) => write!(f, "{}", shell_words::join(args)),
            Predicate::Script(text) => write!(f, "{}", text.trim()),
            Predicate::PathExists(path) => write!(f, "exists {}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::template::positional;

    #[test]
    fn test_parse_command_keeps_quoted_words() {
        let action = Action::parse_command("git clone 'https://x/y z'").unwrap();
        assert_eq!(action, Action::command(["git", "clone", "https://x/y z"]));
    }

    #[test]
    fn test_parse_empty_command() {
        assert!(Action::parse_command("   ").is_err());
    }

    #[test]
    fn test_render_command_is_raw() {
        let action = Action::command(["touch", "$1"]).render(&positional("a b"));
        assert_eq!(action, Action::command(["touch", "a b"]));
    }

    #[test]
    fn test_render_leaves_script_text() {
        let action = Action::script("touch \"$1\"").render(&positional("a b"));
        assert_eq!(action, Action::script("touch \"$1\""));

        let p = Predicate::Script("test -e \"$1\"".into()).render(&positional("a b"));
        assert_eq!(p, Predicate::Script("test -e \"$1\"".into()));
    }

    #[test]
    fn test_render_list_reaches_commands() {
        let action = Action::list(vec![Action::command(["echo", "${1}"]), Action::relaxed_script("echo $1")])
            .render(&positional("x"));
        assert_eq!(
            action,
            Action::list(vec![Action::command(["echo", "x"]), Action::relaxed_script("echo $1")])
        );
    }

    #[test]
    fn test_predicate_path_render() {
        let p = Predicate::PathExists(PathBuf::from("/tmp/$1")).render(&positional("flag"));
        assert_eq!(p, Predicate::PathExists(PathBuf::from("/tmp/flag")));
    }

    #[test]
    fn test_display() {
        assert_eq!(Action::command(["echo", "a b"]).to_string(), "echo 'a b'");
        assert_eq!(Action::script("set -x\necho hi\n").to_string(), "set -x ...");
    }
}
