//! Top-level error for farm tools

use farm_dispatch::DispatchError;
use farm_env::ChainError;
use farm_graph::GraphError;
use farm_identity::IdentityError;
use std::path::PathBuf;

/// Farm errors
#[derive(Debug, thiserror::Error)]
pub enum FarmError {
    /// Configuration file unreadable
    #[error("cannot read config {path}: {source}")]
    ConfigRead {
        /// Config file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Configuration file malformed
    #[error("invalid config {path}: {source}")]
    ConfigParse {
        /// Config file
        path: PathBuf,
        /// Parse error
        #[source]
        source: toml::de::Error,
    },

    /// Scene path outside any work area
    #[error("scene path {path} is not under user_work or project_work")]
    InvalidScenePath {
        /// Offending path
        path: PathBuf,
    },

    /// Submission settings rejected
    #[error("invalid submission: {0}")]
    InvalidSubmission(String),

    /// Scene file missing at submit time
    #[error("scene file {path} does not exist")]
    SceneMissing {
        /// Expected scene file
        path: PathBuf,
    },

    /// Graph invalid
    #[error("graph invalid: {0}")]
    Graph(#[from] GraphError),

    /// Identity failure
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// Environment chain failure
    #[error(transparent)]
    Environment(#[from] ChainError),

    /// Dispatch failure
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl FarmError {
    /// Whether the error was caused by user input rather than the farm
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidScenePath { .. } | Self::InvalidSubmission(_) | Self::SceneMissing { .. } | Self::Graph(_)
        )
    }
}
