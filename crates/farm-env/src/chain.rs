//! Per-command environment preparation
//!
//! For one command the chain:
//! 1. groups the requested keys by handler, in order of each handler's first key
//! 2. runs the default handler, then every matched handler's `update_environment`
//! 3. runs `remap_arguments` once per handler that updated, in the same order
//!
//! Later handlers observe earlier handlers' writes. Unknown keys and
//! unresolved handlers are logged and skipped; a fatal handler error
//! aborts the command.

use crate::environment::Environment;
use crate::error::{ChainError, HandlerError};
use crate::handler::EnvHandler;
use crate::registry::HandlerRegistry;
use crate::worker::WorkerContext;
use farm_graph::Command;
use std::sync::Arc;

/// Argument vector and environment ready for execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedCommand {
    /// Final argument vector
    pub argv: Vec<String>,
    /// Final environment
    pub env: Environment,
    /// Handlers that contributed, in application order
    pub applied: Vec<String>,
    /// Keys no handler claimed
    pub unknown_keys: Vec<String>,
}

/// Handler chain over a registry
#[derive(Debug, Clone, Default)]
pub struct EnvironmentChain {
    registry: HandlerRegistry,
}

impl EnvironmentChain {
    /// Chain over `registry`
    #[inline]
    #[must_use]
    pub fn new(registry: HandlerRegistry) -> Self {
        Self { registry }
    }

    /// The underlying registry
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Prepare `command` using its own env keys
    ///
    /// # Errors
    /// [`ChainError::HandlerFatal`] when a handler aborts.
    pub fn prepare(
        &self,
        command: &Command,
        base: &Environment,
        worker: &WorkerContext,
    ) -> Result<PreparedCommand, ChainError> {
        self.prepare_with_keys(command, &command.envkeys, base, worker)
    }

    /// Prepare `command` for an explicit key list
    ///
    /// Job-level keys are typically prepended to the command's own.
    ///
    /// # Errors
    /// [`ChainError::HandlerFatal`] when a handler aborts.
    pub fn prepare_with_keys(
        &self,
        command: &Command,
        keys: &[String],
        base: &Environment,
        worker: &WorkerContext,
    ) -> Result<PreparedCommand, ChainError> {
        let (groups, unknown_keys) = self.group_keys(keys);
        for key in &unknown_keys {
            tracing::warn!(key = %key, host = %worker.host, "no handler for env key");
        }

        let mut plan: Vec<(&Arc<dyn EnvHandler>, Vec<String>)> = Vec::with_capacity(groups.len() + 1);
        if let Some(default) = self.registry.default_handler() {
            plan.push((default, keys.to_vec()));
        }
        for (index, handler_keys) in groups {
            if let Some(handler) = self.registry.handler(index) {
                plan.push((handler, handler_keys));
            }
        }

        let mut env = base.clone();
        let mut applied: Vec<&Arc<dyn EnvHandler>> = Vec::with_capacity(plan.len());
        for (handler, handler_keys) in &plan {
            match handler.update_environment(command, &env, handler_keys, worker) {
                Ok(next) => {
                    tracing::debug!(handler = handler.name(), keys = ?handler_keys, "environment updated");
                    env = next;
                    applied.push(*handler);
                }
                Err(err) => skip_or_abort(handler.name(), "update", err)?,
            }
        }

        let mut argv = command.argv.clone();
        for handler in &applied {
            match handler.remap_arguments(command, &argv, &env, worker) {
                Ok(next) => argv = next,
                Err(err) => skip_or_abort(handler.name(), "remap", err)?,
            }
        }

        Ok(PreparedCommand {
            argv,
            env,
            applied: applied.iter().map(|h| h.name().to_string()).collect(),
            unknown_keys,
        })
    }

    /// Group keys by handler, ordered by each handler's first key
    fn group_keys(&self, keys: &[String]) -> (Vec<(usize, Vec<String>)>, Vec<String>) {
        let mut groups: Vec<(usize, Vec<String>)> = Vec::new();
        let mut unknown = Vec::new();
        for key in keys {
            match self.registry.resolve(key) {
                Some(index) => match groups.iter_mut().find(|(i, _)| *i == index) {
                    Some((_, group)) => group.push(key.clone()),
                    None => groups.push((index, vec![key.clone()])),
                },
                None => unknown.push(key.clone()),
            }
        }
        (groups, unknown)
    }
}

fn skip_or_abort(handler: &str, phase: &'static str, err: HandlerError) -> Result<(), ChainError> {
    match err {
        HandlerError::Fatal { reason, .. } => {
            tracing::error!(handler, phase, reason = %reason, "handler aborted dispatch");
            Err(ChainError::HandlerFatal {
                handler: handler.to_string(),
                phase,
                reason,
            })
        }
        unresolved @ HandlerError::Unresolved { .. } => {
            tracing::warn!(handler, phase, error = %unresolved, "handler skipped");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Writes `VAR=<value of READ or "unset">-<name>`
    #[derive(Debug)]
    struct Echo {
        name: &'static str,
        write: &'static str,
        read: &'static str,
    }

    impl EnvHandler for Echo {
        fn name(&self) -> &str {
            self.name
        }

        fn prefixes(&self) -> Vec<String> {
            vec![self.name.to_string()]
        }

        fn update_environment(
            &self,
            _command: &Command,
            env: &Environment,
            _keys: &[String],
            _worker: &WorkerContext,
        ) -> Result<Environment, HandlerError> {
            let seen = env.get(self.read).unwrap_or("unset").to_string();
            let mut next = env.clone();
            next.set(self.write, format!("{seen}-{}", self.name));
            Ok(next)
        }
    }

    #[derive(Debug)]
    struct Failing {
        fatal: bool,
    }

    impl EnvHandler for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn prefixes(&self) -> Vec<String> {
            vec!["fail".into()]
        }

        fn update_environment(
            &self,
            _command: &Command,
            _env: &Environment,
            keys: &[String],
            _worker: &WorkerContext,
        ) -> Result<Environment, HandlerError> {
            if self.fatal {
                Err(HandlerError::fatal("failing", "install root missing"))
            } else {
                Err(HandlerError::unresolved("failing", keys.join(","), "not configured"))
            }
        }

        fn remap_arguments(
            &self,
            _command: &Command,
            _argv: &[String],
            _env: &Environment,
            _worker: &WorkerContext,
        ) -> Result<Vec<String>, HandlerError> {
            Ok(vec!["should-not-run".into()])
        }
    }

    fn worker() -> WorkerContext {
        WorkerContext::new("render01", crate::Platform::Linux)
    }

    #[test]
    fn unknown_keys_are_reported_not_fatal() {
        let chain = EnvironmentChain::default();
        let cmd = Command::new(["echo"]).with_envkey("mystery");
        let prepared = chain.prepare(&cmd, &Environment::new(), &worker()).unwrap();
        assert_eq!(prepared.unknown_keys, vec!["mystery"]);
        assert_eq!(prepared.argv, vec!["echo"]);
        assert!(prepared.env.is_empty());
    }

    #[test]
    fn unresolved_handler_is_skipped_entirely() {
        let registry = HandlerRegistry::new()
            .with(Failing { fatal: false })
            .with(Echo { name: "a", write: "A", read: "B" });
        let cmd = Command::new(["echo"]).with_envkeys(["fail1", "a"]);
        let prepared = EnvironmentChain::new(registry)
            .prepare(&cmd, &Environment::new(), &worker())
            .unwrap();

        assert_eq!(prepared.argv, vec!["echo"]);
        assert_eq!(prepared.applied, vec!["a"]);
        assert_eq!(prepared.env.get("A"), Some("unset-a"));
    }

    #[test]
    fn fatal_handler_aborts() {
        let registry = HandlerRegistry::new().with(Failing { fatal: true });
        let cmd = Command::new(["echo"]).with_envkey("fail");
        let err = EnvironmentChain::new(registry)
            .prepare(&cmd, &Environment::new(), &worker())
            .unwrap_err();
        assert_eq!(
            err,
            ChainError::HandlerFatal {
                handler: "failing".into(),
                phase: "update",
                reason: "install root missing".into()
            }
        );
    }

    #[test]
    fn handler_runs_once_for_several_keys() {
        let registry = HandlerRegistry::new().with(Echo { name: "a", write: "A", read: "A" });
        let cmd = Command::new(["echo"]).with_envkeys(["a1", "a2"]);
        let prepared = EnvironmentChain::new(registry)
            .prepare(&cmd, &Environment::new(), &worker())
            .unwrap();
        assert_eq!(prepared.env.get("A"), Some("unset-a"));
        assert_eq!(prepared.applied, vec!["a"]);
    }

    #[test]
    fn default_handler_runs_first() {
        let registry = HandlerRegistry::new()
            .with(Echo { name: "a", write: "A", read: "D" })
            .with_default(Echo { name: "d", write: "D", read: "none" });
        let cmd = Command::new(["echo"]).with_envkey("a");
        let prepared = EnvironmentChain::new(registry)
            .prepare(&cmd, &Environment::new(), &worker())
            .unwrap();
        assert_eq!(prepared.applied, vec!["d", "a"]);
        assert_eq!(prepared.env.get("A"), Some("unset-d-a"));
    }

    #[test]
    fn base_environment_is_not_mutated() {
        let registry = HandlerRegistry::new().with(Echo { name: "a", write: "A", read: "A" });
        let base: Environment = [("A", "base")].into_iter().collect();
        let cmd = Command::new(["echo"]).with_envkey("a");
        let prepared = EnvironmentChain::new(registry).prepare(&cmd, &base, &worker()).unwrap();
        assert_eq!(prepared.env.get("A"), Some("base-a"));
        assert_eq!(base.get("A"), Some("base"));
    }
}
