//! `rms-<rms version>-maya-<maya version>` keys

use super::{join_path, locate, replace_program};
use crate::environment::Environment;
use crate::error::HandlerError;
use crate::handler::EnvHandler;
use crate::worker::WorkerContext;
use farm_graph::Command;

const NAME: &str = "renderman";
const PREFIX: &str = "rms-";

/// Selects a RenderMan release and its Maya plugin
#[derive(Debug, Clone)]
pub struct RendermanHandler {
    rmantree: Option<String>,
    rmstree: Option<String>,
    required: bool,
}

impl Default for RendermanHandler {
    fn default() -> Self {
        Self {
            rmantree: Some("/opt/pixar/RenderManProServer-{rms}".to_string()),
            rmstree: Some("/opt/pixar/RenderManStudio-{rms}-maya{maya}".to_string()),
            required: false,
        }
    }
}

impl RendermanHandler {
    /// Handler with explicit install-root templates using `{rms}` and `{maya}`
    #[must_use]
    pub fn new(rmantree: impl Into<String>, rmstree: impl Into<String>) -> Self {
        Self {
            rmantree: Some(rmantree.into()),
            rmstree: Some(rmstree.into()),
            required: false,
        }
    }

    /// Abort commands whose install root cannot be located
    #[must_use]
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Split `rms-20.2-maya-2016` into `("20.2", "2016")`
    #[must_use]
    pub fn parse_key(key: &str) -> Option<(&str, &str)> {
        let (rms, maya) = key.strip_prefix(PREFIX)?.split_once("-maya-")?;
        (!rms.is_empty() && !maya.is_empty()).then_some((rms, maya))
    }

    /// The env key naming a RenderMan and Maya version pair
    #[must_use]
    pub fn key_for(rms: &str, maya: &str) -> String {
        format!("{PREFIX}{rms}-maya-{maya}")
    }
}

impl EnvHandler for RendermanHandler {
    fn name(&self) -> &str {
        NAME
    }

    fn prefixes(&self) -> Vec<String> {
        vec![PREFIX.to_string()]
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
            let Some((rms, maya)) = Self::parse_key(key) else {
                return Err(HandlerError::unresolved(NAME, key.as_str(), "expected rms-<ver>-maya-<ver>"));
            };
            let fields = [("rms", rms), ("maya", maya)];
            next.set("RMS_VERSION", rms);
            if let Some(root) = locate(NAME, key, self.rmantree.as_deref(), &fields, &next, self.required)? {
                next.set("RMANTREE", root);
            }
            if let Some(root) = locate(NAME, key, self.rmstree.as_deref(), &fields, &next, self.required)? {
                next.set("RMSTREE", root);
            }
        }
        Ok(next)
    }

    fn remap_arguments(
        &self,
        _command: &Command,
        argv: &[String],
        env: &Environment,
        _worker: &WorkerContext,
    ) -> Result<Vec<String>, HandlerError> {
        match env.get("RMANTREE") {
            Some(root) => Ok(replace_program(argv, &["prman"], |_| join_path(root, &["bin", "prman"]))),
            None => Ok(argv.to_vec()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::Platform;

    #[test]
    fn parses_keys() {
        assert_eq!(RendermanHandler::parse_key("rms-20.2-maya-2016"), Some(("20.2", "2016")));
        assert_eq!(RendermanHandler::parse_key("rms-20.2"), None);
        assert_eq!(RendermanHandler::parse_key("rms--maya-2016"), None);
        assert_eq!(RendermanHandler::key_for("21.0", "2017"), "rms-21.0-maya-2017");
    }

    #[test]
    fn sets_trees_and_remaps_prman() {
        let worker = WorkerContext::new("w", Platform::Linux);
        let handler = RendermanHandler::default();
        let cmd = Command::new(["prman", "a.rib"]);
        let env = handler
            .update_environment(&cmd, &Environment::new(), &["rms-20.2-maya-2016".into()], &worker)
            .unwrap();
        assert_eq!(env.get("RMANTREE"), Some("/opt/pixar/RenderManProServer-20.2"));
        assert_eq!(env.get("RMSTREE"), Some("/opt/pixar/RenderManStudio-20.2-maya2016"));
        assert_eq!(env.get("RMS_VERSION"), Some("20.2"));

        let argv = handler.remap_arguments(&cmd, &cmd.argv, &env, &worker).unwrap();
        assert_eq!(argv, vec!["/opt/pixar/RenderManProServer-20.2/bin/prman", "a.rib"]);
    }

    #[test]
    fn malformed_key_is_unresolved() {
        let worker = WorkerContext::new("w", Platform::Linux);
        let err = RendermanHandler::default()
            .update_environment(&Command::new(["x"]), &Environment::new(), &["rms-nope".into()], &worker)
            .unwrap_err();
        assert!(!err.is_fatal());
    }
}
