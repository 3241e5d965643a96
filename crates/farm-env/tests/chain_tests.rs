use farm_env::handlers::{MayaHandler, NukeHandler, ProjectHandler, RendermanHandler, StaticHandler};
use farm_env::{
    ChainError, EnvHandler, Environment, EnvironmentChain, HandlerError, HandlerRegistry, Platform, WorkerContext,
};
use farm_graph::Command;
use pretty_assertions::assert_eq;

/// Handler `A` writes `ORDER`; handler `B` appends to whatever it finds there
#[derive(Debug)]
struct Step(&'static str);

impl EnvHandler for Step {
    fn name(&self) -> &str {
        self.0
    }

    fn prefixes(&self) -> Vec<String> {
        vec![self.0.to_string()]
    }

    fn update_environment(
        &self,
        _command: &Command,
        env: &Environment,
        _keys: &[String],
        _worker: &WorkerContext,
    ) -> Result<Environment, HandlerError> {
        let mut next = env.clone();
        let seen = env.get("ORDER").unwrap_or_default().to_string();
        next.set("ORDER", format!("{seen}{}", self.0));
        Ok(next)
    }

    fn remap_arguments(
        &self,
        _command: &Command,
        argv: &[String],
        _env: &Environment,
        _worker: &WorkerContext,
    ) -> Result<Vec<String>, HandlerError> {
        let mut out = argv.to_vec();
        out.push(self.0.to_string());
        Ok(out)
    }
}

fn linux() -> WorkerContext {
    WorkerContext::new("render01", Platform::Linux)
}

fn ab_chain() -> EnvironmentChain {
    EnvironmentChain::new(HandlerRegistry::new().with(Step("A")).with(Step("B")))
}

#[test]
fn test_declaration_order_is_application_order() {
    let chain = ab_chain();

    let ab = Command::new(["run"]).with_envkeys(["A", "B"]);
    let prepared = chain.prepare(&ab, &Environment::new(), &linux()).unwrap();
    assert_eq!(prepared.env.get("ORDER"), Some("AB"));
    assert_eq!(prepared.argv, vec!["run", "A", "B"]);

    let ba = Command::new(["run"]).with_envkeys(["B", "A"]);
    let prepared = chain.prepare(&ba, &Environment::new(), &linux()).unwrap();
    assert_eq!(prepared.env.get("ORDER"), Some("BA"));
    assert_eq!(prepared.argv, vec!["run", "B", "A"]);
}

#[test]
fn test_registration_order_does_not_matter() {
    let chain = EnvironmentChain::new(HandlerRegistry::new().with(Step("B")).with(Step("A")));
    let cmd = Command::new(["run"]).with_envkeys(["A", "B"]);
    let prepared = chain.prepare(&cmd, &Environment::new(), &linux()).unwrap();
    assert_eq!(prepared.env.get("ORDER"), Some("AB"));
}

fn farm_registry(required: bool) -> HandlerRegistry {
    HandlerRegistry::new()
        .with(ProjectHandler)
        .with(MayaHandler::new("$AUTODESK/maya{version}").required(required))
        .with(RendermanHandler::default())
        .with(NukeHandler::default())
        .with(StaticHandler::new("projectx").with_key("ProjectX", [("PROJECTX", "1")]))
}

#[test]
fn test_render_command_end_to_end() {
    let chain = EnvironmentChain::new(farm_registry(false));
    let base: Environment = [("AUTODESK", "/usr/autodesk")].into_iter().collect();
    let cmd = Command::new(["render", "-t:4", "shot.0001.rib"]).with_envkeys([
        "rms-20.2-maya-2016",
        "ProjectX",
        "TYPE=user_work",
        "SHOW=alice",
        "PROJ=shot10",
        "SCENE=shot10.ma",
        "maya2016",
    ]);

    let prepared = chain.prepare(&cmd, &base, &linux()).unwrap();
    assert_eq!(prepared.applied, vec!["renderman", "projectx", "project", "maya"]);
    assert!(prepared.unknown_keys.is_empty());
    assert_eq!(prepared.env.get("TR_ENV_MAYALOCATION"), Some("/usr/autodesk/maya2016"));
    assert_eq!(prepared.env.get("PROJECTX"), Some("1"));
    assert_eq!(
        prepared.argv,
        vec![
            "/opt/pixar/RenderManProServer-20.2/bin/prman",
            "-statsfile",
            "user_work-alice-shot10-shot10.ma",
            "-t:4",
            "shot.0001.rib",
        ]
    );
}

#[test]
fn test_optional_handler_failure_is_skipped() {
    let chain = EnvironmentChain::new(farm_registry(false));
    let cmd = Command::new(["Render", "scene.ma"]).with_envkeys(["maya2016", "houdini16"]);
    let prepared = chain.prepare(&cmd, &Environment::new(), &linux()).unwrap();

    // $AUTODESK is unset so the maya handler contributes nothing
    assert!(prepared.applied.is_empty());
    assert!(!prepared.env.contains("TR_ENV_MAYAVER"));
    assert_eq!(prepared.unknown_keys, vec!["houdini16"]);
    assert_eq!(prepared.argv, vec!["Render", "scene.ma"]);
}

#[test]
fn test_required_handler_failure_aborts() {
    let chain = EnvironmentChain::new(farm_registry(true));
    let cmd = Command::new(["Render", "scene.ma"]).with_envkey("maya2016");
    let err = chain.prepare(&cmd, &Environment::new(), &linux()).unwrap_err();
    assert!(matches!(err, ChainError::HandlerFatal { ref handler, phase: "update", .. } if handler == "maya"));
}

#[test]
fn test_job_keys_prepended() {
    let chain = ab_chain();
    let cmd = Command::new(["run"]).with_envkey("B");
    let keys: Vec<String> = ["A".to_string()].into_iter().chain(cmd.envkeys.iter().cloned()).collect();
    let prepared = chain.prepare_with_keys(&cmd, &keys, &Environment::new(), &linux()).unwrap();
    assert_eq!(prepared.env.get("ORDER"), Some("AB"));
}
