use anyhow::{Context, Result, bail};
use colored::*;
use log::info;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use crate::engine::action::{Action, Predicate, ShellMode};
use crate::engine::iterate::Records;
use crate::logger::{LogSettings, LogStrategy};
use crate::stream;

pub const DEFAULT_PLAYBOOK: &str = "idem.toml";

#[derive(Debug, Deserialize)]
pub struct Playbook {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default, rename = "task")]
    pub tasks: Vec<TaskConfig>,
}

#[derive(Debug, Deserialize, Default)]
pub struct Settings {
    pub shell: Option<String>,
    #[serde(default)]
    pub short_run: bool,
    pub log_strategy: Option<LogStrategy>,
    pub log_dir: Option<PathBuf>,
    pub log_plain: Option<bool>,
}

impl Settings {
    /// Relative log directories are anchored at the playbook's directory.
    pub fn log_settings(&self, base_dir: &Path) -> LogSettings {
        let defaults = LogSettings::default();
        let dir = self.log_dir.clone().unwrap_or(defaults.dir);
        LogSettings {
            strategy: self.log_strategy.unwrap_or_default(),
            dir: if dir.is_relative() { base_dir.join(dir) } else { dir },
            plain: self.log_plain.unwrap_or(defaults.plain),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum CommandSpec {
    /// Split with shell-words rules; never handed to a shell.
    Line(String),
    Args(Vec<String>),
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    pub desc: String,
    pub cond: Option<String>,
    pub exists: Option<String>,
    pub unchanged: Option<String>,
    #[serde(rename = "become")]
    pub become_user: Option<String>,
    #[serde(default)]
    pub progress: bool,
    #[serde(default)]
    pub relaxed: bool,

    // Action: exactly one
    pub cmd: Option<CommandSpec>,
    pub script: Option<String>,
    pub tasks: Option<Vec<String>>,

    // Iteration input: at most one
    pub items: Option<Vec<String>>,
    pub records: Option<Vec<String>>,
    pub glob: Option<String>,
}

impl TaskConfig {
    pub fn validate(&self, index: usize) -> Result<()> {
        let n = index + 1;
        if self.desc.trim().is_empty() {
            bail!("❌ Configuration Error: task #{} has an empty 'desc'.", n);
        }

        let actions = [self.cmd.is_some(), self.script.is_some(), self.tasks.is_some()];
        if actions.iter().filter(|set| **set).count() != 1 {
            bail!("❌ Configuration Error: task '{}' needs exactly one of 'cmd', 'script' or 'tasks'.", self.desc);
        }

        if self.cond.is_some() && self.exists.is_some() {
            bail!("❌ Configuration Error: task '{}' cannot use both 'cond' and 'exists'.", self.desc);
        }

        let inputs = [self.items.is_some(), self.records.is_some(), self.glob.is_some()];
        if inputs.iter().filter(|set| **set).count() > 1 {
            bail!("❌ Configuration Error: task '{}' can use only one of 'items', 'records' or 'glob'.", self.desc);
        }
        Ok(())
    }

    fn mode(&self) -> ShellMode {
        if self.relaxed { ShellMode::Relaxed } else { ShellMode::Strict }
    }

    pub fn action(&self) -> Result<Action> {
        let mode = self.mode();
        if let Some(cmd) = &self.cmd {
            return match cmd {
                CommandSpec::Line(line) => Action::parse_command(line)
                    .with_context(|| format!("Task '{}'", self.desc)),
                CommandSpec::Args(args) if args.is_empty() => bail!("Task '{}': empty 'cmd'", self.desc),
                CommandSpec::Args(args) => Ok(Action::Command(args.clone())),
            };
        }
        if let Some(body) = &self.script {
            return Ok(Action::Script { body: body.clone(), mode });
        }
        if let Some(lines) = &self.tasks {
            let children = lines
                .iter()
                .map(|line| Action::Script { body: line.clone(), mode })
                .collect();
            return Ok(Action::List(children));
        }
        bail!("Task '{}' has no action", self.desc)
    }

    pub fn predicate(&self) -> Option<Predicate> {
        if let Some(path) = &self.exists {
            return Some(Predicate::PathExists(PathBuf::from(path)));
        }
        self.cond.as_ref().map(|text| Predicate::Script(text.clone()))
    }

    /// Iteration input, if any. Relative glob patterns are anchored at `base_dir`.
    pub fn records(&self, base_dir: &Path) -> Result<Option<Records>> {
        if let Some(items) = &self.items {
            return Ok(Some(Records::positional(items.iter().cloned())));
        }
        if let Some(lines) = &self.records {
            return Ok(Some(Records::keyed(lines.iter().cloned())));
        }
        if let Some(pattern) = &self.glob {
            let full = if Path::new(pattern).is_relative() {
                base_dir.join(pattern).to_string_lossy().into_owned()
            } else {
                pattern.clone()
            };
            let text = stream::glob(&full).with_context(|| format!("Task '{}'", self.desc))?;
            return Ok(Some(Records::from_stream(&text)?));
        }
        Ok(None)
    }
}

pub fn parse_playbook(content: &str) -> Result<Playbook> {
    let playbook: Playbook = toml::from_str(content).context("Failed to parse playbook")?;
    for (i, task) in playbook.tasks.iter().enumerate() {
        task.validate(i)?;
    }
    Ok(playbook)
}

pub fn load_playbook(path: &Path) -> Result<Playbook> {
    if !path.exists() {
        bail!("❌ Critical: playbook {:?} not found.", path);
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut playbook = parse_playbook(&content)?;
    info!("Loaded {} tasks from {}", playbook.tasks.len(), path.display());

    // .env (or .env.<IDEM_ENV>) next to the playbook overrides [env]
    let dir = base_dir(path);
    let env_filename = env::var("IDEM_ENV")
        .map(|v| format!(".env.{}", v))
        .unwrap_or_else(|_| ".env".to_string());
    let env_path = dir.join(&env_filename);

    if env_path.exists() {
        eprintln!("{} Loading environment from: {}", "🌿".green(), env_filename.bold());
        for item in dotenvy::from_path_iter(&env_path)? {
            let (key, val) = item?;
            playbook.env.insert(key, val);
        }
    }

    Ok(playbook)
}

/// Directory a playbook's relative paths are resolved against.
pub fn base_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
