//! Environment values passed through the handler chain

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

static VAR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))")
        .expect("valid regex")
});

/// Ordered set of environment variables for one command
///
/// Handlers receive an `Environment` by reference and return a new one;
/// nothing here touches the process environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    vars: IndexMap<String, String>,
}

impl Environment {
    /// Empty environment
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current process environment
    #[must_use]
    pub fn from_process() -> Self {
        std::env::vars().collect()
    }

    /// Value of `name`
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Check if `name` is set
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Set `name`, replacing any previous value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Set `name` only if it is absent
    pub fn set_default(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.vars.entry(name.into()).or_insert_with(|| value.into());
        self
    }

    /// Remove `name`, returning its value
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.vars.shift_remove(name)
    }

    /// Append `value` to the path list in `name`
    pub fn append_path(&mut self, name: &str, value: &str, separator: char) -> &mut Self {
        let next = match self.vars.get(name) {
            Some(current) if !current.is_empty() => format!("{current}{separator}{value}"),
            _ => value.to_string(),
        };
        self.vars.insert(name.to_string(), next);
        self
    }

    /// Prepend `value` to the path list in `name`
    pub fn prepend_path(&mut self, name: &str, value: &str, separator: char) -> &mut Self {
        let next = match self.vars.get(name) {
            Some(current) if !current.is_empty() => format!("{value}{separator}{current}"),
            _ => value.to_string(),
        };
        self.vars.insert(name.to_string(), next);
        self
    }

    /// Expand `$VAR` and `${VAR}`; unknown variables are left as written
    #[must_use]
    pub fn expand(&self, text: &str) -> String {
        if !text.contains('$') {
            return text.to_string();
        }
        VAR_PATTERN
            .replace_all(text, |caps: &Captures<'_>| {
                let name = var_name(caps);
                self.get(name).map_or_else(|| caps[0].to_string(), str::to_string)
            })
            .into_owned()
    }

    /// Expand like [`Environment::expand`], failing on the first unknown variable
    ///
    /// # Errors
    /// The name of the first variable that is not set.
    pub fn try_expand(&self, text: &str) -> Result<String, String> {
        if let Some(missing) = VAR_PATTERN
            .captures_iter(text)
            .map(|caps| var_name(&caps).to_string())
            .find(|name| !self.contains(name))
        {
            return Err(missing);
        }
        Ok(self.expand(text))
    }

    /// Iterate over variables in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of variables
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Check if no variable is set
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

fn var_name<'t>(caps: &Captures<'t>) -> &'t str {
    caps.get(1)
        .or_else(|| caps.get(2))
        .map_or("", |m| m.as_str())
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_both_forms() {
        let env: Environment = [("RMANTREE", "/opt/pixar/rps-20.2"), ("V", "20")].into_iter().collect();
        assert_eq!(env.expand("$RMANTREE/bin"), "/opt/pixar/rps-20.2/bin");
        assert_eq!(env.expand("rms-${V}.2"), "rms-20.2");
        assert_eq!(env.expand("$MISSING/x"), "$MISSING/x");
        assert_eq!(env.expand("no vars"), "no vars");
    }

    #[test]
    fn try_expand_reports_missing() {
        let env: Environment = [("A", "1")].into_iter().collect();
        assert_eq!(env.try_expand("${A}-$B"), Err("B".to_string()));
        assert_eq!(env.try_expand("$A"), Ok("1".to_string()));
    }

    #[test]
    fn path_lists() {
        let mut env = Environment::new();
        env.append_path("PATH", "/a", ':').append_path("PATH", "/b", ':');
        env.prepend_path("PATH", "/z", ':');
        assert_eq!(env.get("PATH"), Some("/z:/a:/b"));
    }

    #[test]
    fn set_default_keeps_existing() {
        let mut env = Environment::new();
        env.set("X", "1").set_default("X", "2").set_default("Y", "3");
        assert_eq!(env.get("X"), Some("1"));
        assert_eq!(env.get("Y"), Some("3"));
        assert_eq!(env.iter().map(|(k, _)| k).collect::<Vec<_>>(), vec!["X", "Y"]);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn text_without_dollar_is_unchanged(text in "[^$]{0,40}") {
                let env: Environment = [("A", "1")].into_iter().collect();
                prop_assert_eq!(env.expand(&text), text);
            }

            #[test]
            fn appended_paths_keep_order(parts in proptest::collection::vec("[a-z/]{1,8}", 1..6)) {
                let mut env = Environment::new();
                for part in &parts {
                    env.append_path("PATH", part, ':');
                }
                let joined = parts.join(":");
                prop_assert_eq!(env.get("PATH"), Some(joined.as_str()));
            }
        }
    }
}
