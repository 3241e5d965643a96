//! `maya<version>` keys

use super::{join_path, locate, replace_program};
use crate::environment::Environment;
use crate::error::HandlerError;
use crate::handler::EnvHandler;
use crate::worker::{Platform, WorkerContext};
use farm_graph::Command;

const NAME: &str = "maya";
const PROGRAMS: [&str; 3] = ["maya", "Render", "mayabatch"];

/// Selects a Maya version and points its binaries at the install root
#[derive(Debug, Clone, Default)]
pub struct MayaHandler {
    location: Option<String>,
    required: bool,
}

impl MayaHandler {
    /// Handler locating installs from `template`, e.g. `/usr/autodesk/maya{version}`
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            location: Some(template.into()),
            required: false,
        }
    }

    /// Abort commands whose install root cannot be located
    #[must_use]
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }
}

impl EnvHandler for MayaHandler {
    fn name(&self) -> &str {
        NAME
    }

    fn prefixes(&self) -> Vec<String> {
        vec![NAME.to_string()]
    }

    fn update_environment(
        &self,
        _command: &Command,
        env: &Environment,
        keys: &[String],
        worker: &WorkerContext,
    ) -> Result<Environment, HandlerError> {
        let mut next = env.clone();
        // Later keys override earlier ones.
        for key in keys {
            let version = key.strip_prefix(NAME).unwrap_or_default();
            if version.is_empty() {
                return Err(HandlerError::unresolved(NAME, key.as_str(), "no version in key"));
            }
            next.set("TR_ENV_MAYAVER", version);
            let located = locate(NAME, key, self.location.as_deref(), &[("version", version)], &next, self.required)?;
            if let Some(path) = located {
                next.set("TR_ENV_MAYALOCATION", path);
            }
        }

        match worker.platform {
            Platform::MacOs => {
                next.set_default("DYLD_LIBRARY_PATH", "");
            }
            Platform::Linux => {
                next.set_default("LD_LIBRARY_PATH", "");
            }
            Platform::Windows => {}
        }
        next.set_default("MAYA_MODULE_PATH", "");
        Ok(next)
    }

    fn remap_arguments(
        &self,
        _command: &Command,
        argv: &[String],
        env: &Environment,
        _worker: &WorkerContext,
    ) -> Result<Vec<String>, HandlerError> {
        let is_maya = argv.first().is_some_and(|p| PROGRAMS.contains(&p.as_str()));
        match env.get("TR_ENV_MAYALOCATION") {
            Some(root) if is_maya => Ok(replace_program(argv, &PROGRAMS, |p| join_path(root, &["bin", p]))),
            _ => Ok(argv.to_vec()),
        }
    }
}
