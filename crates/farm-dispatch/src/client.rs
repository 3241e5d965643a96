//! Dispatch client: build, validate and submit under one deadline

use crate::engine::{DispatchEngine, JobId};
use crate::error::{DispatchError, DispatchStep, EngineError};
use farm_graph::{Job, SerializedGraph};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Engine connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Engine host
    pub host: String,
    /// Engine port
    pub port: u16,
    /// Identity jobs are spooled as when the job names none
    pub owner: String,
    /// Deadline for a whole dispatch run, in seconds
    pub timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            host: "tractor-engine".to_string(),
            port: 80,
            owner: "pixar".to_string(),
            timeout_secs: 60,
        }
    }
}

impl DispatchConfig {
    /// Deadline as a duration
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// A job that finalized, together with its graph
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltJob {
    /// The authored job
    pub job: Job,
    /// Its serialized graph
    pub graph: SerializedGraph,
}

/// How far a dispatch run goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchAction {
    /// Finalize only
    Build,
    /// Finalize and validate
    Validate,
    /// Finalize, validate and spool
    Submit,
}

impl DispatchAction {
    fn includes(self, step: DispatchStep) -> bool {
        match step {
            DispatchStep::Build => true,
            DispatchStep::Validate => matches!(self, Self::Validate | Self::Submit),
            DispatchStep::Submit => self == Self::Submit,
        }
    }
}

/// Result of a dispatch run
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    /// The built job
    pub built: BuiltJob,
    /// Engine accepted the graph
    pub validated: bool,
    /// Id assigned on submit
    pub job_id: Option<JobId>,
}

/// Client driving an engine
#[derive(Debug, Clone)]
pub struct DispatchClient {
    engine: Arc<dyn DispatchEngine>,
    config: DispatchConfig,
}

impl DispatchClient {
    /// Client over `engine`
    #[must_use]
    pub fn new(engine: Arc<dyn DispatchEngine>, config: DispatchConfig) -> Self {
        Self { engine, config }
    }

    /// Connection settings
    #[must_use]
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Finalize `job`, taking ownership of it
    ///
    /// # Errors
    /// [`DispatchError::Build`] when the graph is invalid.
    pub fn build(&self, job: Job) -> Result<BuiltJob, DispatchError> {
        let graph = job.finalize().map_err(|e| {
            tracing::warn!(step = %DispatchStep::Build, error = %e, "job did not finalize");
            DispatchError::Build(e)
        })?;
        tracing::info!(
            title = %job.title,
            tasks = graph.task_count,
            commands = graph.command_count,
            digest = %graph.digest,
            "job built"
        );
        Ok(BuiltJob { job, graph })
    }

    /// Ask the engine to validate a built job
    ///
    /// # Errors
    /// [`DispatchError::StepFailed`] with the engine's reason.
    pub async fn validate(&self, built: &BuiltJob) -> Result<(), DispatchError> {
        self.engine
            .validate(&built.graph)
            .await
            .map_err(|source| step_failed(DispatchStep::Validate, source))
    }

    /// Spool a built job as `owner`
    ///
    /// # Errors
    /// [`DispatchError::StepFailed`] with the engine's reason.
    pub async fn submit(&self, built: &BuiltJob, owner: &str) -> Result<JobId, DispatchError> {
        let id = self
            .engine
            .submit(&built.graph, owner)
            .await
            .map_err(|source| step_failed(DispatchStep::Submit, source))?;
        tracing::info!(job_id = %id, owner, engine = self.engine.name(), "job spooled");
        Ok(id)
    }

    /// Run `action` under the configured deadline
    ///
    /// Each step starts only when the previous one succeeded. The job owner,
    /// if set, is the spooling identity; otherwise the configured owner is.
    ///
    /// # Errors
    /// The first failing step's error, a deadline overrun or cancellation.
    pub async fn run(
        &self,
        job: Job,
        action: DispatchAction,
        cancel: Option<CancellationToken>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let cancel = cancel.unwrap_or_else(CancellationToken::new);
        let deadline = Instant::now() + self.config.timeout();

        if cancel.is_cancelled() {
            return Err(DispatchError::Cancelled {
                step: DispatchStep::Build,
            });
        }
        let built = self.build(job)?;
        let mut outcome = DispatchOutcome {
            built,
            validated: false,
            job_id: None,
        };

        if action.includes(DispatchStep::Validate) {
            let graph = &outcome.built.graph;
            self.guarded(DispatchStep::Validate, deadline, &cancel, self.engine.validate(graph))
                .await?;
            outcome.validated = true;
        }

        if action.includes(DispatchStep::Submit) {
            let owner = outcome
                .built
                .job
                .owner
                .clone()
                .unwrap_or_else(|| self.config.owner.clone());
            let graph = &outcome.built.graph;
            let id = self
                .guarded(DispatchStep::Submit, deadline, &cancel, self.engine.submit(graph, &owner))
                .await?;
            tracing::info!(job_id = %id, owner = %owner, engine = self.engine.name(), "job spooled");
            outcome.job_id = Some(id);
        }

        Ok(outcome)
    }

    async fn guarded<T>(
        &self,
        step: DispatchStep,
        deadline: Instant,
        cancel: &CancellationToken,
        fut: impl Future<Output = Result<T, EngineError>>,
    ) -> Result<T, DispatchError> {
        tracing::debug!(%step, engine = self.engine.name(), "dispatch step starting");
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::warn!(%step, "dispatch cancelled");
                Err(DispatchError::Cancelled { step })
            }
            result = tokio::time::timeout_at(deadline, fut) => match result {
                Err(_) => {
                    tracing::warn!(%step, "dispatch deadline exceeded");
                    Err(DispatchError::DeadlineExceeded { step })
                }
                Ok(Err(source)) => Err(step_failed(step, source)),
                Ok(Ok(value)) => Ok(value),
            },
        }
    }
}

fn step_failed(step: DispatchStep, source: EngineError) -> DispatchError {
    tracing::warn!(%step, error = %source, "dispatch step failed");
    DispatchError::StepFailed { step, source }
}
