use anyhow::Result;
use log::info;
use std::path::Path;
use idem::config::{Playbook, base_dir, load_playbook};
use idem::utils::detect_shell;
use idem::{ExecContext, Reporter, Run};

pub fn handle_run(path: &Path, short: bool) -> Result<()> {
    let playbook = load_playbook(path)?;
    let dir = base_dir(path);

    let shell = detect_shell(playbook.settings.shell.as_ref());
    let ctx = ExecContext::new(shell)
        .with_env(playbook.env.clone())
        .with_cwd(&dir);

    let short_run = short || playbook.settings.short_run;
    if short_run {
        info!("Short run: long-running tasks will be skipped");
    }

    let mut run = Run::new(ctx, Reporter::stdout())
        .short_run(short_run)
        .with_logging(playbook.settings.log_settings(&dir));

    run_tasks(&mut run, &playbook, &dir)?;
    run.summarize()
}

/// Declares and executes each task in order. The first failure propagates.
fn run_tasks(run: &mut Run, playbook: &Playbook, dir: &Path) -> Result<()> {
    for task in &playbook.tasks {
        // Resolve everything fallible before the declaration opens.
        let action = task.action()?;
        let records = task.records(dir)?;

        let mut builder = run.task(task.desc.as_str());
        if let Some(predicate) = task.predicate() {
            builder = builder.cond(predicate);
        }
        if let Some(marker) = &task.unchanged {
            builder = builder.unchanged(marker.as_str());
        }
        if let Some(user) = &task.become_user {
            builder = builder.become_user(user.as_str());
        }
        if task.progress {
            builder = builder.progress();
        }

        match records {
            Some(records) => {
                builder.exec_each(&records, action)?;
            }
            None => {
                builder.exec(action)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use idem::config::parse_playbook;
    use idem::engine::report::Capture;
    use idem::TaskError;

    const PLAYBOOK: &str = r#"
[env]
GREETING = "hello"

[[task]]
desc = "marker"
exists = "marker"
script = "echo $GREETING > marker"

[[task]]
desc = "pkgs"
cond = "test -e pkg-$1"
cmd = ["touch", "pkg-$1"]
items = ["git", "curl"]

[[task]]
desc = "broken"
script = "exit 5"

[[task]]
desc = "after"
cmd = "touch after"
"#;

    #[test]
    fn test_run_tasks_until_failure() {
        let dir = tempfile::tempdir().unwrap();
        let playbook = parse_playbook(PLAYBOOK).unwrap();
        let capture = Capture::default();
        let ctx = ExecContext::new("sh")
            .with_env(playbook.env.clone())
            .with_cwd(dir.path());
        let mut run = Run::new(ctx, Reporter::to_writer(Box::new(capture.clone())));

        let err = run_tasks(&mut run, &playbook, dir.path()).unwrap_err();
        assert_eq!(err.downcast_ref::<TaskError>().unwrap().exit_code(), 5);

        assert_eq!(std::fs::read_to_string(dir.path().join("marker")).unwrap(), "hello\n");
        assert!(dir.path().join("pkg-curl").exists());
        assert!(!dir.path().join("after").exists());
        assert_eq!(run.ledger().changed_count(), 3);

        let out = capture.contents();
        assert!(out.contains("[changed]\tpkgs: git\n"));
        assert!(out.contains("[failed]\tbroken\n"));
    }
}
