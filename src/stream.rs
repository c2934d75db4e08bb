//! Newline-delimited value streams and the combinators that build iteration input.
//!
//! On the wire every value is one line, quoted with shell-words rules, so values
//! with spaces or quotes survive a single textual channel.

use anyhow::{Context, Result, bail};
use glob::MatchOptions;
use log::debug;
use crate::engine::action::Predicate;
use crate::engine::condition;
use crate::engine::executor::ExecContext;
use crate::engine::template::{Bindings, Template};

/// Quotes one value for a stream line.
pub fn escape(value: &str) -> Result<String> {
    if value.contains('\n') {
        bail!("Value {:?} contains a newline and cannot be streamed", value);
    }
    Ok(shell_words::quote(value).into_owned())
}

/// Emits values one per line, each escaped. The inverse of `values`.
pub fn stream<I, S>(values: I) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for value in values {
        out.push_str(&escape(value.as_ref())?);
        out.push('\n');
    }
    Ok(out)
}

/// Decodes a stream back into values. Blank lines are ignored.
pub fn values(text: &str) -> Result<Vec<String>> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let mut words = shell_words::split(line)
                .with_context(|| format!("Malformed stream line: {}", line))?;
            if words.len() != 1 {
                bail!("Stream line must hold exactly one value: {}", line);
            }
            Ok(words.remove(0))
        })
        .collect()
}

/// Applies `action` to every value, stopping at the first error.
/// Returns how many values were processed.
pub fn each<I, F>(mut action: F, input: I) -> Result<usize>
where
    I: IntoIterator<Item = String>,
    F: FnMut(&str) -> Result<()>,
{
    let mut count = 0;
    for value in input {
        action(&value).with_context(|| format!("each: failed on '{}'", value))?;
        count += 1;
    }
    Ok(count)
}

/// Lazy transform: the template evaluated with `name` bound to each value.
/// Consumes its input, so it runs once.
pub struct Map<I> {
    name: String,
    template: Template,
    input: I,
}

impl<I: Iterator<Item = String>> Iterator for Map<I> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.input.next().map(|value| self.template.render(&self.name, &value))
    }
}

pub fn map<I>(name: &str, template: impl Into<Template>, input: I) -> Map<I::IntoIter>
where
    I: IntoIterator<Item = String>,
{
    Map {
        name: name.to_string(),
        template: template.into(),
        input: input.into_iter(),
    }
}

/// Lazy, order-preserving filter.
pub struct KeepIf<I, P> {
    predicate: P,
    input: I,
}

impl<I, P> Iterator for KeepIf<I, P>
where
    I: Iterator<Item = String>,
    P: FnMut(&str) -> bool,
{
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.input.by_ref().find(|value| (self.predicate)(value.as_str()))
    }
}

pub fn keep_if<I, P>(predicate: P, input: I) -> KeepIf<I::IntoIter, P>
where
    I: IntoIterator<Item = String>,
    P: FnMut(&str) -> bool,
{
    KeepIf {
        predicate,
        input: input.into_iter(),
    }
}

/// `keep_if` driven by a system predicate with `name` bound to each value.
pub fn keep_if_cond<'a, I>(
    name: &'a str,
    predicate: &'a Predicate,
    ctx: &'a ExecContext,
    input: I,
) -> KeepIf<I::IntoIter, impl FnMut(&str) -> bool + 'a>
where
    I: IntoIterator<Item = String>,
{
    keep_if(
        move |value: &str| {
            let mut bindings = Bindings::new();
            bindings.insert(name.to_string(), value.to_string());
            condition::evaluate(&predicate.render(&bindings), &bindings, ctx)
        },
        input,
    )
}

/// Options handed to each glob call; nothing process-wide is toggled.
fn match_options() -> MatchOptions {
    MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    }
}

/// Sorted matches for `pattern`. No match is an empty list, never the pattern itself.
pub fn glob_matches(pattern: &str) -> Result<Vec<String>> {
    let paths = glob::glob_with(pattern, match_options())
        .with_context(|| format!("Invalid glob pattern: {}", pattern))?;

    let mut matched = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) => matched.push(path.to_string_lossy().into_owned()),
            Err(e) => debug!("glob: skipping unreadable entry: {}", e),
        }
    }
    matched.sort();
    Ok(matched)
}

/// Expands `pattern` into an escaped stream of matches.
pub fn glob(pattern: &str) -> Result<String> {
    stream(glob_matches(pattern)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};

    fn owned(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_stream_escapes_and_decodes() {
        let text = stream(["plain", "with space", "it's"]).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert_eq!(values(&text).unwrap(), owned(&["plain", "with space", "it's"]));
    }

    #[test]
    fn test_stream_rejects_newline() {
        assert!(stream(["a\nb"]).is_err());
    }

    #[test]
    fn test_values_rejects_two_words() {
        assert!(values("a b\n").is_err());
    }

    #[test]
    fn test_map_is_lazy_and_ordered() {
        let mut calls = 0;
        let input = owned(&["a", "b"]).into_iter().inspect(|_| calls += 1);
        let mut mapped = map("f", "$f.bak", input);
        assert_eq!(mapped.next().as_deref(), Some("a.bak"));
        assert_eq!(mapped.next().as_deref(), Some("b.bak"));
        assert_eq!(mapped.next(), None);
        drop(mapped);
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_keep_if_preserves_order() {
        let kept: Vec<String> = keep_if(|v| v.starts_with('k'), owned(&["k1", "x", "k2"])).collect();
        assert_eq!(kept, owned(&["k1", "k2"]));
    }

    #[test]
    fn test_keep_if_cond_checks_system_state() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("present")).unwrap();
        let ctx = ExecContext::new("sh").with_cwd(dir.path());
        let predicate = Predicate::PathExists("$name".into());

        let kept: Vec<String> = keep_if_cond("name", &predicate, &ctx, owned(&["missing", "present"])).collect();
        assert_eq!(kept, owned(&["present"]));
    }

    #[test]
    fn test_each_stops_on_error() {
        let mut seen = Vec::new();
        let res = each(
            |v| {
                seen.push(v.to_string());
                if v == "bad" { bail!("nope") } else { Ok(()) }
            },
            owned(&["ok", "bad", "never"]),
        );
        assert!(res.is_err());
        assert_eq!(seen, owned(&["ok", "bad"]));
    }

    #[test]
    fn test_glob_empty_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = format!("{}/*", dir.path().display());
        assert_eq!(glob(&pattern).unwrap(), "");
        assert!(glob_matches(&pattern).unwrap().is_empty());
    }

    #[test]
    fn test_glob_sorted_and_escaped() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("b file.txt")).unwrap();
        File::create(dir.path().join("a.txt")).unwrap();
        File::create(dir.path().join(".hidden.txt")).unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        File::create(dir.path().join("sub").join("c.txt")).unwrap();

        let pattern = format!("{}/*.txt", dir.path().display());
        let decoded = values(&glob(&pattern).unwrap()).unwrap();
        let names: Vec<String> = decoded
            .iter()
            .map(|p| std::path::Path::new(p).file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, owned(&["a.txt", "b file.txt"]));
    }

    #[test]
    fn test_glob_invalid_pattern() {
        assert!(glob("[").is_err());
    }
}
