use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Name a positional record value is bound to (`$1`).
pub const POSITIONAL: &str = "1";

/// Named values available to a condition/action for one record.
pub type Bindings = BTreeMap<String, String>;

pub fn positional(value: &str) -> Bindings {
    let mut bindings = Bindings::new();
    bindings.insert(POSITIONAL.to_string(), value.to_string());
    bindings
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*|[0-9]+)\}|([A-Za-z_][A-Za-z0-9_]*|[0-9]))")
            .expect("placeholder pattern is valid")
    })
}

fn capture_name<'t>(caps: &Captures<'t>) -> &'t str {
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str())
        .unwrap_or_default()
}

/// True for names a shell accepts as a variable (`[A-Za-z_][A-Za-z0-9_]*`).
pub fn is_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Replaces `$name` / `${name}` with bound values, raw.
/// Only used where no shell reads the result (argv words, paths, `map` lines).
/// Unbound placeholders are left as written.
pub fn substitute(text: &str, bindings: &Bindings) -> String {
    if bindings.is_empty() {
        return text.to_string();
    }
    placeholder_re()
        .replace_all(text, |caps: &Captures| match bindings.get(capture_name(caps)) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// True if `text` references `name` as a placeholder.
pub fn references(text: &str, name: &str) -> bool {
    placeholder_re()
        .captures_iter(text)
        .any(|caps| capture_name(&caps) == name)
}

/// A line of text evaluated once per input value, e.g. `map("f", "$f.bak", ..)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template(String);

impl Template {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn render(&self, name: &str, value: &str) -> String {
        let mut bindings = Bindings::new();
        bindings.insert(name.to_string(), value.to_string());
        substitute(&self.0, &bindings)
    }
}

impl From<&str> for Template {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Template {
    fn from(text: String) -> Self {
        Self(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bind(pairs: &[(&str, &str)]) -> Bindings {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_substitute_both_forms() {
        let b = bind(&[("src", "a.txt"), ("dst", "b.txt")]);
        assert_eq!(substitute("ln -s $src ${dst}", &b), "ln -s a.txt b.txt");
    }

    #[test]
    fn test_unbound_left_alone() {
        let b = positional("git");
        assert_eq!(substitute("echo $HOME $1", &b), "echo $HOME git");
    }

    #[test]
    fn test_is_name() {
        assert!(is_name("dst"));
        assert!(is_name("_tmp2"));
        assert!(!is_name("1"));
        assert!(!is_name("my-key"));
        assert!(!is_name("$(x)"));
        assert!(!is_name(""));
    }

    #[test]
    fn test_references() {
        assert!(references("apt-get install ${1}", POSITIONAL));
        assert!(references("echo $1", POSITIONAL));
        assert!(!references("echo $item", POSITIONAL));
        assert!(!references("make all", POSITIONAL));
    }

    #[test]
    fn test_template_render() {
        let t = Template::from("$f.bak");
        assert_eq!(t.render("f", "notes"), "notes.bak");
    }
}
