//! One invocation of the identity tool
//!
//! `Start -> MountCheck -> {Query | Register} -> Done`, checked against an
//! explicit transition table. A failed mount check is fatal; a query that
//! matches nothing is a normal outcome.

use crate::environment::IdentityEnvironment;
use crate::error::IdentityError;
use crate::record::IdentityRecord;
use crate::registry::{IdentityRegistry, PLACEHOLDER_NAME};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Session states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// Nothing done yet
    Start,
    /// Probing shared storage
    MountCheck,
    /// Looking up an existing identity
    Query,
    /// Resolving and recording the caller
    Register,
    /// Finished
    Done,
}

/// States reachable from `from`
#[must_use]
pub fn allowed_transitions(from: SessionState) -> &'static [SessionState] {
    use SessionState::{Done, MountCheck, Query, Register, Start};
    match from {
        Start => &[MountCheck],
        MountCheck => &[Query, Register],
        Query | Register => &[Done],
        Done => &[],
    }
}

/// Check a single transition
///
/// # Errors
/// [`IdentityError::IllegalTransition`] when `to` is not reachable from `from`.
pub fn validate_transition(from: SessionState, to: SessionState) -> Result<(), IdentityError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(IdentityError::IllegalTransition { from, to })
    }
}

/// What a register run produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Record for the caller
    pub record: IdentityRecord,
    /// Variables for the caller
    pub environment: IdentityEnvironment,
    /// Whether the registry and home area were written
    pub persisted: bool,
}

/// Identity tool session
#[derive(Debug)]
pub struct IdentitySession {
    registry: IdentityRegistry,
    work_root: PathBuf,
    placeholder_fallback: bool,
    state: SessionState,
}

impl IdentitySession {
    /// Session over `registry`, homes created under `work_root`
    #[must_use]
    pub fn new(registry: IdentityRegistry, work_root: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            work_root: work_root.into(),
            placeholder_fallback: false,
            state: SessionState::Start,
        }
    }

    /// On directory failure, continue as the placeholder identity without persisting
    #[must_use]
    pub fn with_placeholder_fallback(mut self, enabled: bool) -> Self {
        self.placeholder_fallback = enabled;
        self
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    fn advance(&mut self, to: SessionState) -> Result<(), IdentityError> {
        validate_transition(self.state, to)?;
        tracing::debug!(from = ?self.state, to = ?to, "identity session transition");
        self.state = to;
        Ok(())
    }

    fn mount_check(&mut self) -> Result<(), IdentityError> {
        self.advance(SessionState::MountCheck)?;
        self.registry.check_mount().map_err(|err| {
            tracing::error!(error = %err, "shared storage unavailable");
            err
        })
    }

    /// Look up an identity by account-id prefix; never writes
    ///
    /// # Errors
    /// Mount unavailable, store I/O, or a reused session.
    pub fn query(&mut self, prefix: &str) -> Result<Option<IdentityRecord>, IdentityError> {
        self.mount_check()?;
        self.advance(SessionState::Query)?;
        let found = self.registry.query(prefix)?;
        self.advance(SessionState::Done)?;
        Ok(found)
    }

    /// Resolve `account_id`, create its home area and record it
    ///
    /// # Errors
    /// Mount unavailable, unresolved identity (unless falling back),
    /// store or home-area I/O, or a reused session.
    pub fn register(&mut self, account_id: &str) -> Result<Registration, IdentityError> {
        self.mount_check()?;
        self.advance(SessionState::Register)?;

        let registration = match self.registry.resolve(account_id) {
            Ok(name) => {
                let record = IdentityRecord::new(account_id, &name)?;
                let environment = IdentityEnvironment::new(&self.work_root, &record);
                environment.ensure_home()?;
                self.registry.register(&record.account_id, &record.display_name)?;
                Registration {
                    record,
                    environment,
                    persisted: true,
                }
            }
            Err(err) if err.is_recoverable() && self.placeholder_fallback => {
                tracing::warn!(account_id, error = %err, "continuing as placeholder identity");
                let record = IdentityRecord::new(account_id, PLACEHOLDER_NAME)?;
                let environment = IdentityEnvironment::new(&self.work_root, &record);
                Registration {
                    record,
                    environment,
                    persisted: false,
                }
            }
            Err(err) => {
                tracing::error!(account_id, error = %err, "identity resolution failed");
                return Err(err);
            }
        };

        self.advance(SessionState::Done)?;
        Ok(registration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::StaticDirectory;
    use crate::store::{MemoryStore, RegistryStore};
    use std::sync::Arc;

    #[test]
    fn transition_table() {
        assert!(validate_transition(SessionState::Start, SessionState::MountCheck).is_ok());
        assert!(validate_transition(SessionState::MountCheck, SessionState::Query).is_ok());
        assert!(validate_transition(SessionState::MountCheck, SessionState::Register).is_ok());
        assert!(validate_transition(SessionState::Start, SessionState::Register).is_err());
        assert!(validate_transition(SessionState::Query, SessionState::Register).is_err());
        assert!(allowed_transitions(SessionState::Done).is_empty());
    }

    #[test]
    fn session_is_single_use() {
        let registry = IdentityRegistry::new(Arc::new(StaticDirectory::new()), Arc::new(MemoryStore::new()));
        let mut session = IdentitySession::new(registry, "/tmp/work");
        assert_eq!(session.query("1").unwrap(), None);
        assert_eq!(session.state(), SessionState::Done);
        assert!(matches!(
            session.query("1"),
            Err(IdentityError::IllegalTransition { from: SessionState::Done, .. })
        ));
    }

    #[test]
    fn mount_failure_stops_in_mount_check() {
        let registry = IdentityRegistry::new(Arc::new(StaticDirectory::new()), Arc::new(MemoryStore::unreachable()));
        let mut session = IdentitySession::new(registry, "/tmp/work");
        let err = session.query("1").unwrap_err();
        assert!(matches!(err, IdentityError::MountUnavailable { .. }));
        assert!(err.is_fatal());
        assert_eq!(session.state(), SessionState::MountCheck);
    }

    #[test]
    fn placeholder_fallback_does_not_persist() {
        let store = Arc::new(MemoryStore::new());
        let registry = IdentityRegistry::new(Arc::new(StaticDirectory::new()), store.clone());
        let mut session = IdentitySession::new(registry, "/nonexistent/work").with_placeholder_fallback(true);
        let registration = session.register("120988").unwrap();
        assert!(!registration.persisted);
        assert_eq!(registration.environment.render_name, PLACEHOLDER_NAME);
        assert!(store.load().unwrap().is_empty());
    }
}
