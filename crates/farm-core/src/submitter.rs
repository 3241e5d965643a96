//! Submission orchestration: identity, build, dispatch

use crate::config::FarmConfig;
use crate::error::FarmError;
use crate::submission::Submission;
use farm_dispatch::{DispatchAction, DispatchClient, DispatchConfig, DispatchEngine, DispatchOutcome, InMemoryEngine, TcpEngine};
use farm_identity::{IdentityRecord, IdentityRegistry};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Engine for `config`, or a local one for dry runs
#[must_use]
pub fn engine(config: &DispatchConfig, dry_run: bool) -> Arc<dyn DispatchEngine> {
    if dry_run {
        Arc::new(InMemoryEngine::new())
    } else {
        Arc::new(TcpEngine::new(&config.host, config.port))
    }
}

/// Runs submissions for one user
#[derive(Debug, Clone)]
pub struct Submitter {
    registry: IdentityRegistry,
    client: DispatchClient,
    check_scene: bool,
}

impl Submitter {
    /// Submitter over an identity registry and a dispatch client
    #[must_use]
    pub fn new(registry: IdentityRegistry, client: DispatchClient) -> Self {
        Self {
            registry,
            client,
            check_scene: true,
        }
    }

    /// Submitter wired from configuration
    #[must_use]
    pub fn from_config(config: &FarmConfig, engine: Arc<dyn DispatchEngine>) -> Self {
        let registry = IdentityRegistry::new(config.directory.build(), Arc::new(config.mount.store()));
        Self::new(registry, DispatchClient::new(engine, config.dispatch.clone()))
    }

    /// Whether to require the scene or script file before spooling
    #[must_use]
    pub fn check_scene(mut self, check: bool) -> Self {
        self.check_scene = check;
        self
    }

    /// Identity to submit as; a directory failure degrades to the placeholder
    ///
    /// # Errors
    /// An account id the registry cannot hold.
    pub fn identify(&self, account_id: &str) -> Result<IdentityRecord, FarmError> {
        let name = self.registry.resolve_or_placeholder(account_id);
        Ok(IdentityRecord::new(account_id, &name)?)
    }

    /// Build `submission` for `account_id` and run `action`
    ///
    /// # Errors
    /// Invalid settings, a missing scene when spooling, or the failing
    /// dispatch step.
    pub async fn submit<S>(
        &self,
        submission: &S,
        account_id: &str,
        action: DispatchAction,
        cancel: Option<CancellationToken>,
    ) -> Result<DispatchOutcome, FarmError>
    where
        S: Submission + ?Sized,
    {
        let user = self.identify(account_id)?;

        if action == DispatchAction::Submit && self.check_scene {
            if let Some(scene) = submission.required_file().filter(|path| !path.is_file()) {
                tracing::error!(scene = %scene.display(), kind = submission.kind(), "scene file missing, not spooling");
                return Err(FarmError::SceneMissing { path: scene });
            }
        }

        let job = submission.build_job(&user)?;
        tracing::info!(
            account_id,
            user = %user.display_name,
            kind = submission.kind(),
            title = %job.title,
            ?action,
            "dispatching job"
        );
        Ok(self.client.run(job, action, cancel).await?)
    }
}
