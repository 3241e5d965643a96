//! Project context keys: `TYPE=`, `SHOW=`, `PROJECT=`, `PROJ=`, `SCENE=`, `SCENENAME=`

use super::{join_path, replace_program};
use crate::environment::Environment;
use crate::error::HandlerError;
use crate::handler::EnvHandler;
use crate::worker::{Platform, WorkerContext};
use farm_graph::Command;

const NAME: &str = "project";
const VARIABLES: [&str; 6] = ["TYPE", "SHOW", "PROJECT", "PROJ", "SCENE", "SCENENAME"];

/// Copies project context into the environment and routes `render` to prman
#[derive(Debug, Clone, Default)]
pub struct ProjectHandler;

impl ProjectHandler {
    fn stats_name(env: &Environment) -> String {
        let get = |names: &[&str]| {
            names
                .iter()
                .find_map(|n| env.get(n))
                .unwrap_or("none")
                .to_string()
        };
        format!(
            "{}-{}-{}-{}",
            get(&["TYPE"]),
            get(&["SHOW"]),
            get(&["PROJ", "PROJECT"]),
            get(&["SCENE", "SCENENAME"])
        )
    }
}

impl EnvHandler for ProjectHandler {
    fn name(&self) -> &str {
        NAME
    }

    fn prefixes(&self) -> Vec<String> {
        VARIABLES.iter().map(|v| format!("{v}=")).collect()
    }

    fn update_environment(
        &self,
        _command: &Command,
        env: &Environment,
        keys: &[String],
        worker: &WorkerContext,
    ) -> Result<Environment, HandlerError> {
        let mut next = env.clone();
        for key in keys {
            match key.split_once('=') {
                Some((name, value)) if VARIABLES.contains(&name) && !value.is_empty() => {
                    next.set(name, value);
                }
                _ => return Err(HandlerError::unresolved(NAME, key.as_str(), "expected KEY=VALUE")),
            }
        }
        next.set("TRACTOR", "1");

        if worker.platform == Platform::Windows {
            for (target, source) in [("INCLUDE", "VCINCLUDE"), ("LIB", "VCLIB")] {
                if let Some(extra) = next.get(source).map(str::to_string) {
                    next.append_path(target, &extra, ';');
                }
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
        if argv.first().map(String::as_str) != Some("render") {
            return Ok(argv.to_vec());
        }
        let Some(rmantree) = env.get("RMANTREE") else {
            return Err(HandlerError::unresolved(NAME, "render", "RMANTREE is not set"));
        };

        let mut out = replace_program(argv, &["render"], |_| join_path(rmantree, &["bin", "prman"]));
        out.splice(1..1, ["-statsfile".to_string(), Self::stats_name(env)]);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn keys(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn copies_context() {
        let worker = WorkerContext::new("w", Platform::Linux);
        let env = ProjectHandler
            .update_environment(
                &Command::new(["render"]),
                &Environment::new(),
                &keys(&["TYPE=user_work", "SHOW=alice", "PROJ=shot10", "SCENE=a.ma"]),
                &worker,
            )
            .unwrap();
        assert_eq!(env.get("TYPE"), Some("user_work"));
        assert_eq!(env.get("PROJ"), Some("shot10"));
        assert_eq!(env.get("TRACTOR"), Some("1"));
    }

    #[test]
    fn malformed_key_is_unresolved() {
        let worker = WorkerContext::new("w", Platform::Linux);
        let err = ProjectHandler
            .update_environment(&Command::new(["x"]), &Environment::new(), &keys(&["SHOW="]), &worker)
            .unwrap_err();
        assert!(!err.is_fatal());
    }

    #[test]
    fn windows_appends_compiler_paths() {
        let worker = WorkerContext::new("w", Platform::Windows);
        let base: Environment = [("INCLUDE", "C:\\inc"), ("VCINCLUDE", "C:\\vc\\inc"), ("VCLIB", "C:\\vc\\lib")]
            .into_iter()
            .collect();
        let env = ProjectHandler
            .update_environment(&Command::new(["x"]), &base, &keys(&["TYPE=project_work"]), &worker)
            .unwrap();
        assert_eq!(env.get("INCLUDE"), Some("C:\\inc;C:\\vc\\inc"));
        assert_eq!(env.get("LIB"), Some("C:\\vc\\lib"));
    }

    #[test]
    fn render_becomes_prman_with_statsfile() {
        let worker = WorkerContext::new("w", Platform::Linux);
        let env: Environment = [
            ("RMANTREE", "/opt/pixar/RenderManProServer-20.2"),
            ("TYPE", "user_work"),
            ("SHOW", "alice"),
            ("PROJ", "shot10"),
            ("SCENE", "a.ma"),
        ]
        .into_iter()
        .collect();
        let argv = keys(&["render", "-t:4", "frame.rib"]);
        let out = ProjectHandler
            .remap_arguments(&Command::new(argv.clone()), &argv, &env, &worker)
            .unwrap();
        assert_eq!(
            out,
            keys(&[
                "/opt/pixar/RenderManProServer-20.2/bin/prman",
                "-statsfile",
                "user_work-alice-shot10-a.ma",
                "-t:4",
                "frame.rib"
            ])
        );
    }

    #[test]
    fn other_programs_untouched() {
        let worker = WorkerContext::new("w", Platform::Linux);
        let argv = keys(&["nuke", "-x"]);
        let out = ProjectHandler
            .remap_arguments(&Command::new(argv.clone()), &argv, &Environment::new(), &worker)
            .unwrap();
        assert_eq!(out, argv);
    }
}
