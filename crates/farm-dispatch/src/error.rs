//! Dispatch errors, each tagged with the step that failed

use farm_graph::GraphError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of the dispatch protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DispatchStep {
    /// Finalize the graph locally
    Build,
    /// Ask the engine to check the graph
    Validate,
    /// Spool the graph to the engine
    Submit,
}

impl fmt::Display for DispatchStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Build => "build",
            Self::Validate => "validate",
            Self::Submit => "submit",
        })
    }
}

/// Failures reported by an engine
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Could not reach the engine
    #[error("cannot connect to {addr}: {reason}")]
    Connect {
        /// Engine address
        addr: String,
        /// Connection error
        reason: String,
    },

    /// Transport failed mid-exchange
    #[error("transport error: {0}")]
    Transport(String),

    /// Engine sent something unexpected
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Engine refused the request
    #[error("rejected by engine: {0}")]
    Rejected(String),
}

/// Dispatch client errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The graph did not finalize
    #[error("build failed: {0}")]
    Build(#[source] GraphError),

    /// The engine failed a step
    #[error("{step} failed: {source}")]
    StepFailed {
        /// Failing step
        step: DispatchStep,
        /// Engine error
        #[source]
        source: EngineError,
    },

    /// The shared deadline ran out during a step
    #[error("{step} did not finish before the dispatch deadline")]
    DeadlineExceeded {
        /// Step in progress
        step: DispatchStep,
    },

    /// The caller cancelled during a step
    #[error("{step} was cancelled")]
    Cancelled {
        /// Step in progress
        step: DispatchStep,
    },
}

impl DispatchError {
    /// The step this error belongs to
    #[must_use]
    pub fn step(&self) -> DispatchStep {
        match self {
            Self::Build(_) => DispatchStep::Build,
            Self::StepFailed { step, .. } | Self::DeadlineExceeded { step } | Self::Cancelled { step } => *step,
        }
    }

    /// Check if running the same job again could succeed
    ///
    /// Connection trouble and deadline overruns are worth retrying; an
    /// invalid graph or an engine rejection is not.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DeadlineExceeded { .. }
                | Self::StepFailed {
                    source: EngineError::Connect { .. } | EngineError::Transport(_),
                    ..
                }
        )
    }
}
