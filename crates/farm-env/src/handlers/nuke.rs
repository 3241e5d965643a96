//! `nuke<version>` and `proxynuke<version>` keys

use super::{join_path, replace_program};
use crate::environment::Environment;
use crate::error::HandlerError;
use crate::handler::EnvHandler;
use crate::worker::WorkerContext;
use farm_graph::Command;

const NAME: &str = "nuke";
const PREFIXES: [&str; 2] = ["proxynuke", "nuke"];

/// Selects a Nuke version for compositing and proxy commands
#[derive(Debug, Clone, Default)]
pub struct NukeHandler {
    location: Option<String>,
}

impl NukeHandler {
    /// Handler prefixing the binary with an install root from `template`
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            location: Some(template.into()),
        }
    }

    /// Binary name for a version: `9.0v8` runs `Nuke9.0`
    #[must_use]
    pub fn binary(version: &str) -> String {
        let release = version.split('v').next().unwrap_or(version);
        format!("Nuke{release}")
    }
}

impl EnvHandler for NukeHandler {
    fn name(&self) -> &str {
        NAME
    }

    fn prefixes(&self) -> Vec<String> {
        PREFIXES.iter().map(ToString::to_string).collect()
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
            let version = PREFIXES
                .iter()
                .find_map(|p| key.strip_prefix(*p))
                .filter(|v| !v.is_empty())
                .ok_or_else(|| HandlerError::unresolved(NAME, key.as_str(), "no version in key"))?;
            next.set("TR_ENV_NUKEVER", version);
            if let Some(template) = &self.location {
                let root = next
                    .try_expand(&template.replace("{version}", version))
                    .map_err(|missing| HandlerError::unresolved(NAME, key.as_str(), format!("${missing} is not set")))?;
                next.set("TR_ENV_NUKELOCATION", root);
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
        let Some(version) = env.get("TR_ENV_NUKEVER") else {
            return Ok(argv.to_vec());
        };
        let binary = Self::binary(version);
        Ok(replace_program(argv, &["nuke"], move |_| match env.get("TR_ENV_NUKELOCATION") {
            Some(root) => join_path(root, &[&binary]),
            None => binary,
        }))
    }
}
