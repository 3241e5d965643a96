//! The identity registry

use crate::directory::DirectoryService;
use crate::error::IdentityError;
use crate::record::{sanitize, validate_account_id, IdentityRecord};
use crate::store::RegistryStore;
use std::fmt;
use std::sync::Arc;

/// Display name used when the directory cannot resolve an account
pub const PLACEHOLDER_NAME: &str = "unknown";

/// Resolves account ids and persists them in a shared store
///
/// Every call reads the store afresh; nothing is cached between calls.
#[derive(Clone)]
pub struct IdentityRegistry {
    directory: Arc<dyn DirectoryService>,
    store: Arc<dyn RegistryStore>,
}

impl fmt::Debug for IdentityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityRegistry")
            .field("store", &self.store.location())
            .finish_non_exhaustive()
    }
}

impl IdentityRegistry {
    /// Registry over a directory and a store
    pub fn new(directory: Arc<dyn DirectoryService>, store: Arc<dyn RegistryStore>) -> Self {
        Self { directory, store }
    }

    /// The underlying store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<dyn RegistryStore> {
        &self.store
    }

    /// Check the store is reachable
    ///
    /// # Errors
    /// [`IdentityError::MountUnavailable`].
    pub fn check_mount(&self) -> Result<(), IdentityError> {
        self.store.check_mount()
    }

    /// Sanitized display name for `account_id` from the directory
    ///
    /// # Errors
    /// [`IdentityError::IdentityNotResolved`] when the directory fails or
    /// returns a name with nothing left after sanitizing.
    pub fn resolve(&self, account_id: &str) -> Result<String, IdentityError> {
        validate_account_id(account_id)?;
        let raw = self.directory.lookup(account_id)?;
        let name = sanitize(&raw);
        if name.is_empty() {
            return Err(IdentityError::IdentityNotResolved {
                account_id: account_id.to_string(),
                reason: format!("directory name {raw:?} is empty once sanitized"),
            });
        }
        tracing::debug!(account_id, name = %name, "identity resolved");
        Ok(name)
    }

    /// Like [`IdentityRegistry::resolve`], degrading to [`PLACEHOLDER_NAME`]
    #[must_use]
    pub fn resolve_or_placeholder(&self, account_id: &str) -> String {
        self.resolve(account_id).unwrap_or_else(|err| {
            tracing::warn!(account_id, error = %err, "using placeholder identity");
            PLACEHOLDER_NAME.to_string()
        })
    }

    /// Add `account_id -> display_name` to the store
    ///
    /// Reads the current lines, replaces any line for the same account id,
    /// and writes the sorted set back. Registering the same pair twice
    /// leaves one line.
    ///
    /// # Errors
    /// Invalid id or name, or store I/O failure.
    pub fn register(&self, account_id: &str, display_name: &str) -> Result<IdentityRecord, IdentityError> {
        let record = IdentityRecord::new(account_id, display_name)?;
        let line = record.to_line();
        let mut lines = self.store.load()?;
        if lines.contains(&line) {
            tracing::debug!(account_id, "identity already registered");
            return Ok(record);
        }

        let before = lines.len();
        lines.retain(|l| IdentityRecord::parse(l).map_or(true, |r| r.account_id != record.account_id));
        if lines.len() != before {
            tracing::warn!(account_id, name = %record.display_name, "replacing previous name for account");
        }
        lines.insert(line);
        self.store.save(&lines)?;
        tracing::info!(account_id, name = %record.display_name, store = %self.store.location(), "identity registered");
        Ok(record)
    }

    /// First record, in sort order, whose account id starts with `prefix`
    ///
    /// # Errors
    /// Empty prefix, or store I/O failure. No match is `Ok(None)`.
    pub fn query(&self, prefix: &str) -> Result<Option<IdentityRecord>, IdentityError> {
        if prefix.is_empty() {
            return Err(IdentityError::InvalidAccountId(String::new()));
        }
        let lines = self.store.load()?;
        let found = lines
            .iter()
            .filter_map(|line| IdentityRecord::parse(line))
            .find(|record| record.account_id.starts_with(prefix));
        match &found {
            Some(record) => tracing::debug!(prefix, account_id = %record.account_id, "query matched"),
            None => tracing::warn!(prefix, "query matched no identity"),
        }
        Ok(found)
    }

    /// Drop every line for `account_id`
    ///
    /// # Errors
    /// Store I/O failure.
    pub fn remove(&self, account_id: &str) -> Result<bool, IdentityError> {
        let mut lines = self.store.load()?;
        let before = lines.len();
        lines.retain(|line| IdentityRecord::parse(line).map_or(true, |r| r.account_id != account_id));
        if lines.len() == before {
            return Ok(false);
        }
        self.store.save(&lines)?;
        tracing::info!(account_id, "identity removed");
        Ok(true)
    }

    /// Every parseable record, in sort order
    ///
    /// # Errors
    /// Store I/O failure.
    pub fn records(&self) -> Result<Vec<IdentityRecord>, IdentityError> {
        let lines = self.store.load()?;
        Ok(lines
            .iter()
            .filter_map(|line| {
                let parsed = IdentityRecord::parse(line);
                if parsed.is_none() {
                    tracing::warn!(line = %line, "skipping malformed registry line");
                }
                parsed
            })
            .collect())
    }

    /// Crew list for the dispatch engine, one `"id", # name` line per record
    ///
    /// # Errors
    /// Store I/O failure.
    pub fn crew_list(&self) -> Result<String, IdentityError> {
        Ok(self
            .records()?
            .iter()
            .map(|r| format!("{}\n", r.crew_line()))
            .collect())
    }
}
