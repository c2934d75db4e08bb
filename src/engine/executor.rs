use anyhow::{Context, Result, bail};
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use log::{debug, warn};
use super::action::{Action, ShellMode};
use super::template::{Bindings, POSITIONAL};
use crate::utils::become_program;

/// Exit code reported when an action cannot be started at all.
pub const SPAWN_FAILURE_CODE: i32 = 127;

/// `$0` of scripts that receive a positional value.
const SCRIPT_NAME: &str = "idem";

/// Process settings shared by every condition and action of a run.
#[derive(Debug, Clone)]
pub struct ExecContext {
    pub shell: String,
    pub env: HashMap<String, String>,
    pub cwd: Option<PathBuf>,
}

impl ExecContext {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
            env: HashMap::new(),
            cwd: None,
        }
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Builds a `Command` for a single argv, applying env and working directory.
    pub(crate) fn command(&self, argv: &[String]) -> Result<Command> {
        let Some((program, args)) = argv.split_first() else {
            bail!("Empty argument vector");
        };
        let mut cmd = Command::new(program);
        cmd.args(args).envs(&self.env);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        Ok(cmd)
    }

    /// `<shell> -c <body> [idem <value>]`, with `set -eu` in strict mode.
    ///
    /// The body is never rewritten. A positional value arrives as `$1`; keyed
    /// values are assigned as shell variables ahead of the body. Both survive a
    /// privilege boundary that resets the environment.
    pub(crate) fn shell_argv(&self, body: &str, mode: ShellMode, bindings: &Bindings) -> Vec<String> {
        let mut text = String::new();
        if mode == ShellMode::Strict {
            text.push_str("set -eu\n");
        }
        for (name, value) in bindings.iter().filter(|(name, _)| name.as_str() != POSITIONAL) {
            text.push_str(&format!("{}={}\n", name, shell_words::quote(value)));
        }
        text.push_str(body);

        let mut argv = vec![self.shell.clone(), "-c".to_string(), text];
        if let Some(value) = bindings.get(POSITIONAL) {
            argv.push(SCRIPT_NAME.to_string());
            argv.push(value.clone());
        }
        argv
    }
}

/// Result of running one leaf action.
#[derive(Debug, Clone)]
pub struct Execution {
    pub exit_code: i32,
    /// Interleaved stdout and stderr.
    pub output: String,
    pub duration: Duration,
}

impl Execution {
    fn spawn_failure(message: String, started: Instant) -> Self {
        Self {
            exit_code: SPAWN_FAILURE_CODE,
            output: message,
            duration: started.elapsed(),
        }
    }
}

/// Reduces a leaf action to the argv that actually gets spawned.
/// With a become user the argv is wrapped by the escalation program, so only
/// plain argv/script text crosses the privilege boundary.
fn leaf_argv(
    action: &Action,
    become_user: Option<&str>,
    bindings: &Bindings,
    ctx: &ExecContext,
) -> Result<Vec<String>> {
    let argv = match action {
        Action::Command(args) => args.clone(),
        Action::Script { body, mode } => ctx.shell_argv(body, *mode, bindings),
        Action::List(_) => bail!("Action lists are executed child by child"),
    };

    match become_user {
        None => Ok(argv),
        Some(user) => Ok(escalate(&become_program()?, user, argv)),
    }
}

/// `<program> -u <user> -- <argv...>`
pub fn escalate(program: &Path, user: &str, argv: Vec<String>) -> Vec<String> {
    let mut wrapped = vec![
        program.to_string_lossy().into_owned(),
        "-u".to_string(),
        user.to_string(),
        "--".to_string(),
    ];
    wrapped.extend(argv);
    wrapped
}

/// Runs a leaf action and captures its combined output.
/// With `live` set, every chunk is also written to that sink as it arrives.
/// Once spawned, the child is always waited on; a broken pipe or sink ends up
/// in the captured output instead of escaping unclassified.
pub fn execute(
    action: &Action,
    become_user: Option<&str>,
    bindings: &Bindings,
    mut live: Option<&mut dyn Write>,
    ctx: &ExecContext,
) -> Result<Execution> {
    let started = Instant::now();

    let argv = match leaf_argv(action, become_user, bindings, ctx) {
        Ok(argv) => argv,
        Err(e) if matches!(action, Action::List(_)) => return Err(e),
        Err(e) => return Ok(Execution::spawn_failure(format!("{:#}\n", e), started)),
    };
    debug!("Spawning: {}", shell_words::join(&argv));

    let mut cmd = ctx.command(&argv)?;

    // One pipe for both streams keeps the capture in the order it was written.
    let (mut reader, writer) = os_pipe::pipe().context("Failed to create output pipe")?;
    let writer_err = writer.try_clone().context("Failed to clone output pipe")?;
    cmd.stdin(Stdio::inherit()).stdout(writer).stderr(writer_err);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            return Ok(Execution::spawn_failure(
                format!("Failed to execute '{}': {}\n", argv[0], e),
                started,
            ));
        }
    };
    // The Command still owns the pipe's write ends; release them so reads hit EOF.
    drop(cmd);

    let mut captured = Vec::new();
    let mut buf = [0u8; 8192];
    let mut read_error = None;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                read_error = Some(e);
                break;
            }
        };
        captured.extend_from_slice(&buf[..n]);

        let mirrored = match live.as_deref_mut() {
            Some(sink) => sink.write_all(&buf[..n]).and_then(|_| sink.flush()),
            None => Ok(()),
        };
        if let Err(e) = mirrored {
            warn!("Live output stopped, still capturing: {}", e);
            live = None;
        }
    }

    // Nobody drains the pipe any more; don't let the child block on it.
    if read_error.is_some() {
        let _ = child.kill();
    }
    let status = child.wait().context("Failed to wait for action")?;

    let mut output = String::from_utf8_lossy(&captured).into_owned();
    let mut exit_code = status.code().unwrap_or(1);
    if let Some(e) = read_error {
        output.push_str(&format!("\nFailed to read action output: {}\n", e));
        if exit_code == 0 {
            exit_code = 1;
        }
    }

    Ok(Execution {
        exit_code,
        output,
        duration: started.elapsed(),
    })
}
