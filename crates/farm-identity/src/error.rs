//! Identity error types

use crate::session::SessionState;
use std::path::PathBuf;

/// Identity registry errors
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// Shared storage is not reachable
    #[error("shared storage {path} is unavailable: {reason}")]
    MountUnavailable {
        /// Mount root that was checked
        path: PathBuf,
        /// Why the check failed
        reason: String,
    },

    /// The directory service could not name the account
    #[error("cannot resolve identity for account {account_id:?}: {reason}")]
    IdentityNotResolved {
        /// Account that was looked up
        account_id: String,
        /// Directory failure
        reason: String,
    },

    /// Account id is empty or contains a separator
    #[error("invalid account id {0:?}")]
    InvalidAccountId(String),

    /// Display name is empty after sanitizing
    #[error("display name {raw:?} for account {account_id:?} is empty once sanitized")]
    InvalidDisplayName {
        /// Account the name belongs to
        account_id: String,
        /// Name as supplied
        raw: String,
    },

    /// Reading or writing the registry failed
    #[error("registry I/O on {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Session stepped outside its transition table
    #[error("illegal identity session transition {from:?} -> {to:?}")]
    IllegalTransition {
        /// Current state
        from: SessionState,
        /// Requested state
        to: SessionState,
    },
}

impl IdentityError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Check if the error must stop the current operation
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }

    /// Check if a caller may degrade to a placeholder and continue
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::IdentityNotResolved { .. })
    }
}
