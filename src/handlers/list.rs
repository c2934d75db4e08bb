use anyhow::Result;
use colored::*;
use std::path::Path;
use idem::config::load_playbook;

pub fn handle_list(path: &Path) -> Result<()> {
    let playbook = load_playbook(path)?;

    if playbook.tasks.is_empty() {
        println!("No tasks defined in {}.", path.display());
        return Ok(());
    }

    println!("{}", "Tasks:".bold().underline());
    for (i, task) in playbook.tasks.iter().enumerate() {
        let mut flags = Vec::new();
        if task.exists.is_some() || task.cond.is_some() {
            flags.push("idempotent".to_string());
        }
        if let Some(user) = &task.become_user {
            flags.push(format!("as {}", user));
        }
        if task.progress || task.unchanged.is_some() {
            flags.push("long".to_string());
        }
        if task.items.is_some() || task.records.is_some() || task.glob.is_some() {
            flags.push("loop".to_string());
        }

        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!("({})", flags.join(", "))
        };
        println!("  {:>3}. {}  {}", i + 1, task.desc.cyan(), flags.dimmed());
    }

    Ok(())
}
