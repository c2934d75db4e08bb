use std::process::Stdio;
use log::debug;
use super::action::{Predicate, ShellMode};
use super::executor::ExecContext;
use super::template::Bindings;

/// Evaluates an idempotency predicate against current system state.
/// Script predicates receive `bindings` the same way script actions do.
/// Anything that goes wrong while checking counts as "not satisfied yet".
pub fn evaluate(predicate: &Predicate, bindings: &Bindings, ctx: &ExecContext) -> bool {
    let argv = match predicate {
        Predicate::PathExists(path) => {
            let resolved = match &ctx.cwd {
                Some(dir) if path.is_relative() => dir.join(path),
                _ => path.clone(),
            };
            let exists = resolved.exists();
            debug!("Condition '{}' -> {}", predicate, exists);
            return exists;
        }
        Predicate::Command(args) => args.clone(),
        Predicate::Script(text) => ctx.shell_argv(text, ShellMode::Relaxed, bindings),
    };

    let mut cmd = match ctx.command(&argv) {
        Ok(cmd) => cmd,
        Err(e) => {
            debug!("Condition '{}' could not be built: {}", predicate, e);
            return false;
        }
    };
    cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());

    match cmd.status() {
        Ok(status) => {
            debug!("Condition '{}' -> {}", predicate, status.success());
            status.success()
        }
        Err(e) => {
            debug!("Condition '{}' failed to run: {}", predicate, e);
            false
        }
    }
}
