use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

/// Default privilege-escalation program; `IDEM_BECOME` overrides it.
pub const DEFAULT_BECOME: &str = "sudo";

/// Shell used when a playbook names none. Strict scripts start with `set -eu`,
/// so this must be POSIX; the login shell (`$SHELL`) may not be.
pub const DEFAULT_SHELL: &str = "sh";

pub fn detect_shell(config_shell: Option<&String>) -> String {
    config_shell
        .cloned()
        .unwrap_or_else(|| DEFAULT_SHELL.to_string())
}

/// Resolves the program used to run actions as another user.
pub fn become_program() -> Result<PathBuf> {
    let name = env::var("IDEM_BECOME").unwrap_or_else(|_| DEFAULT_BECOME.to_string());
    which::which(&name)
        .with_context(|| format!("Privilege escalation program '{}' not found in PATH", name))
}

/// Replaces path-hostile characters so a task label can be used in a file name.
pub fn file_safe(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(48)
        .collect()
}
