//! Engine seam and the in-memory engine

use crate::error::EngineError;
use async_trait::async_trait;
use farm_graph::SerializedGraph;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Opaque job identifier assigned by the engine
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The external dispatch engine
#[async_trait]
pub trait DispatchEngine: Send + Sync + fmt::Debug {
    /// Engine name for logs
    fn name(&self) -> &str;

    /// Check a graph without spooling it
    async fn validate(&self, graph: &SerializedGraph) -> Result<(), EngineError>;

    /// Spool a graph as `owner`
    async fn submit(&self, graph: &SerializedGraph, owner: &str) -> Result<JobId, EngineError>;
}

/// A job accepted by [`InMemoryEngine`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpooledJob {
    /// Assigned id
    pub id: JobId,
    /// Spooling identity
    pub owner: String,
    /// Submitted graph
    pub graph: SerializedGraph,
}

/// Engine that keeps spooled jobs in memory
///
/// Used for dry runs and tests; failures and latency can be injected.
#[derive(Debug, Default)]
pub struct InMemoryEngine {
    jobs: Mutex<Vec<SpooledJob>>,
    validate_failure: Option<String>,
    submit_failure: Option<String>,
    latency: Option<Duration>,
}

impl InMemoryEngine {
    /// Engine accepting everything
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every validation with `reason`
    #[must_use]
    pub fn failing_validate(mut self, reason: impl Into<String>) -> Self {
        self.validate_failure = Some(reason.into());
        self
    }

    /// Reject every submission with `reason`
    #[must_use]
    pub fn failing_submit(mut self, reason: impl Into<String>) -> Self {
        self.submit_failure = Some(reason.into());
        self
    }

    /// Sleep this long in every call
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Jobs spooled so far
    #[must_use]
    pub fn jobs(&self) -> Vec<SpooledJob> {
        self.jobs.lock().clone()
    }

    async fn wait(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl DispatchEngine for InMemoryEngine {
    fn name(&self) -> &str {
        "memory"
    }

    async fn validate(&self, _graph: &SerializedGraph) -> Result<(), EngineError> {
        self.wait().await;
        match &self.validate_failure {
            Some(reason) => Err(EngineError::Rejected(reason.clone())),
            None => Ok(()),
        }
    }

    async fn submit(&self, graph: &SerializedGraph, owner: &str) -> Result<JobId, EngineError> {
        self.wait().await;
        if let Some(reason) = &self.submit_failure {
            return Err(EngineError::Rejected(reason.clone()));
        }
        let id = JobId(uuid::Uuid::new_v4().to_string());
        self.jobs.lock().push(SpooledJob {
            id: id.clone(),
            owner: owner.to_string(),
            graph: graph.clone(),
        });
        Ok(id)
    }
}
