//! Config-driven handler: each key maps to a fixed set of variables

use crate::environment::Environment;
use crate::error::HandlerError;
use crate::handler::EnvHandler;
use crate::worker::WorkerContext;
use farm_graph::Command;
use indexmap::IndexMap;

/// Sets variables from a lookup table
///
/// Values may reference variables already in the environment, including
/// ones written earlier by the same key.
#[derive(Debug, Clone, Default)]
pub struct StaticHandler {
    name: String,
    table: IndexMap<String, IndexMap<String, String>>,
}

impl StaticHandler {
    /// Empty table named `name`
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: IndexMap::new(),
        }
    }

    /// With variables for `key`
    #[must_use]
    pub fn with_key<I, K, V>(mut self, key: impl Into<String>, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.table
            .insert(key.into(), vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    /// Handler over a prepared table
    #[must_use]
    pub fn from_table(name: impl Into<String>, table: IndexMap<String, IndexMap<String, String>>) -> Self {
        Self {
            name: name.into(),
            table,
        }
    }
}

impl EnvHandler for StaticHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn prefixes(&self) -> Vec<String> {
        self.table.keys().cloned().collect()
    }

    fn update_environment(
        &self,
        _command: &Command,
        env: &Environment,
        keys: &[String],
        _worker: &WorkerContext,
    ) -> Result<Environment, HandlerError> {
        let mut next = env.clone();
        for key in keys {
            // A default handler sees every key; only act on known ones.
            let Some(vars) = self.table.get(key) else {
                if self.table.keys().any(|k| key.starts_with(k.as_str())) {
                    return Err(HandlerError::unresolved(&self.name, key.as_str(), "not in table"));
                }
                continue;
            };
            for (var, value) in vars {
                let expanded = next.expand(value);
                next.set(var.as_str(), expanded);
            }
        }
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::Platform;

    #[test]
    fn sets_and_expands() {
        let handler = StaticHandler::new("projectx")
            .with_key("ProjectX", [("PROJECTX_ROOT", "$DABRENDER/projectx"), ("PROJECTX_BIN", "${PROJECTX_ROOT}/bin")]);
        let base: Environment = [("DABRENDER", "/dabrender")].into_iter().collect();
        let env = handler
            .update_environment(
                &Command::new(["x"]),
                &base,
                &["ProjectX".into()],
                &WorkerContext::new("w", Platform::Linux),
            )
            .unwrap();
        assert_eq!(env.get("PROJECTX_ROOT"), Some("/dabrender/projectx"));
        assert_eq!(env.get("PROJECTX_BIN"), Some("/dabrender/projectx/bin"));
    }

    #[test]
    fn prefix_match_without_entry_is_unresolved() {
        let handler = StaticHandler::new("t").with_key("ProjectX", [("A", "1")]);
        let err = handler
            .update_environment(
                &Command::new(["x"]),
                &Environment::new(),
                &["ProjectXY".into()],
                &WorkerContext::new("w", Platform::Linux),
            )
            .unwrap_err();
        assert!(!err.is_fatal());
    }
}
