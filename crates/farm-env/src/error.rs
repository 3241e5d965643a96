//! Handler and chain errors

/// Failure inside a single handler
///
/// [`HandlerError::Unresolved`] is local: the chain logs it and carries on
/// without that handler's contribution. [`HandlerError::Fatal`] aborts the
/// command's dispatch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    /// The handler could not resolve one of its keys
    #[error("{handler}: cannot resolve {key:?}: {reason}")]
    Unresolved {
        /// Handler name
        handler: String,
        /// Key or program being resolved
        key: String,
        /// What was missing
        reason: String,
    },

    /// The handler requires something that is absent
    #[error("{handler}: {reason}")]
    Fatal {
        /// Handler name
        handler: String,
        /// What was missing
        reason: String,
    },
}

impl HandlerError {
    /// Recoverable resolution failure
    pub fn unresolved(handler: &str, key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unresolved {
            handler: handler.to_string(),
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Failure that aborts the command
    pub fn fatal(handler: &str, reason: impl Into<String>) -> Self {
        Self::Fatal {
            handler: handler.to_string(),
            reason: reason.into(),
        }
    }

    /// Check if this error aborts the command
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }
}

/// Chain-level failure: the command must not be dispatched
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// A handler signalled a fatal error
    #[error("handler {handler} aborted dispatch during {phase}: {reason}")]
    HandlerFatal {
        /// Handler name
        handler: String,
        /// `update` or `remap`
        phase: &'static str,
        /// Handler's reason
        reason: String,
    },
}
