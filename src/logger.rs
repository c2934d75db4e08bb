use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use std::collections::HashMap;
use chrono::Local;
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;
use blake3::Hasher;
use crate::utils::file_safe;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogStrategy {
    Always,
    ErrorOnly,
    #[default]
    None,
}

/// Where and when executed actions leave a log file behind.
#[derive(Debug, Clone)]
pub struct LogSettings {
    pub strategy: LogStrategy,
    pub dir: PathBuf,
    pub plain: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            strategy: LogStrategy::None,
            dir: PathBuf::from(".idem").join("logs"),
            plain: true,
        }
    }
}

pub fn strip_ansi(content: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*m").expect("ansi pattern is valid"));
    re.replace_all(content, "").to_string()
}

fn is_sensitive(key: &str) -> bool {
    let k_upper = key.to_uppercase();
    ["KEY", "TOKEN", "PASS", "SECRET"].iter().any(|s| k_upper.contains(s))
}

/// `failed` is the task's classification, not its exit code: a marker match
/// with a non-zero exit is no error, a zero exit with an unmet condition is.
#[allow(clippy::too_many_arguments)]
pub fn write_log(
    label: &str,
    cmd_str: &str,
    content: &str,
    settings: &LogSettings,
    duration: Duration,
    exit_code: i32,
    failed: bool,
    env_vars: &HashMap<String, String>,
) -> Result<Option<PathBuf>> {
    match settings.strategy {
        LogStrategy::None => return Ok(None),
        LogStrategy::ErrorOnly if !failed => return Ok(None),
        _ => {}
    }

    // 1. Path: <dir>/<date>/<exit>/<time>_<label>_<hash>.log
    let now = Local::now();
    let date_str = now.format("%Y-%m-%d").to_string();
    let time_str = now.format("%H%M%S").to_string();

    let mut hasher = Hasher::new();
    hasher.update(label.as_bytes());
    hasher.update(now.to_rfc3339().as_bytes());
    let hash_full = hasher.finalize().to_hex().to_string();
    let short_hash = &hash_full[0..6];

    let filename = format!("{}_{}_{}.log", time_str, file_safe(label), short_hash);
    let log_dir = settings.dir.join(date_str).join(exit_code.to_string());

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;
    let log_path = log_dir.join(filename);

    // 2. Content
    let mut file_content = String::new();

    file_content.push_str("=== IDEM EXECUTION LOG ===\n");
    file_content.push_str(&format!("Task: {}\n", label));
    file_content.push_str(&format!("Command: {}\n", cmd_str));
    file_content.push_str(&format!("Time: {}\n", now.to_rfc3339()));
    file_content.push_str("=== ENVIRONMENT SNAPSHOT ===\n");

    let mut sorted_keys: Vec<_> = env_vars.keys().collect();
    sorted_keys.sort();

    for k in sorted_keys {
        if is_sensitive(k) {
            file_content.push_str(&format!("{} = [REDACTED]\n", k));
        } else {
            file_content.push_str(&format!("{} = {}\n", k, env_vars[k]));
        }
    }
    file_content.push_str("============================\n\n");

    let body = if settings.plain {
        strip_ansi(content)
    } else {
        content.to_string()
    };
    file_content.push_str(&body);
    if !body.ends_with('\n') {
        file_content.push('\n');
    }

    file_content.push_str("\n============================\n");
    file_content.push_str(&format!("Exit Code: {}\n", exit_code));
    file_content.push_str(&format!("Duration: {} ms\n", duration.as_millis()));
    file_content.push_str(&format!("End Time: {}\n", Local::now().to_rfc3339()));
    file_content.push_str("============================\n");

    fs::write(&log_path, file_content).context("Failed to write log file")?;

    Ok(Some(log_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(strategy: LogStrategy, dir: &std::path::Path) -> LogSettings {
        LogSettings {
            strategy,
            dir: dir.to_path_buf(),
            plain: true,
        }
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[32mok\x1b[0m"), "ok");
    }

    #[test]
    fn test_error_only_skips_success() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(LogStrategy::ErrorOnly, dir.path());
        let res = write_log("t", "true", "", &s, Duration::ZERO, 0, false, &HashMap::new()).unwrap();
        assert!(res.is_none());

        // Unchanged marker matched on a non-zero exit.
        let res = write_log("t", "upgrade", "", &s, Duration::ZERO, 100, false, &HashMap::new()).unwrap();
        assert!(res.is_none());
    }

    #[test]
    fn test_error_only_follows_failure_not_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(LogStrategy::ErrorOnly, dir.path());
        let path = write_log("t", "true", "", &s, Duration::ZERO, 0, true, &HashMap::new())
            .unwrap()
            .unwrap();
        assert!(path.parent().unwrap().ends_with("0"));
    }

    #[test]
    fn test_writes_redacted_log() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(LogStrategy::Always, dir.path());
        let mut env = HashMap::new();
        env.insert("API_TOKEN".to_string(), "hunter2".to_string());
        env.insert("REGION".to_string(), "eu".to_string());

        let path = write_log("install: git", "apt-get install git", "\x1b[1mdone\x1b[0m", &s, Duration::from_millis(5), 2, true, &env)
            .unwrap()
            .unwrap();

        assert!(path.starts_with(dir.path()));
        assert!(path.parent().unwrap().ends_with("2"));
        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("API_TOKEN = [REDACTED]"));
        assert!(content.contains("REGION = eu"));
        assert!(content.contains("\ndone\n"));
        assert!(content.contains("Exit Code: 2"));
        assert!(!content.contains("hunter2"));
    }
}
