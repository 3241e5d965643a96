//! Registry records and name sanitizing

use crate::error::IdentityError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between account id and display name in a registry line
pub const SEPARATOR: char = '_';

/// Lower-case `raw` and strip whitespace and ASCII punctuation
#[must_use]
pub fn sanitize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && !c.is_ascii_punctuation())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Check an account id can be stored
///
/// # Errors
/// [`IdentityError::InvalidAccountId`] when empty, or containing whitespace or the separator.
pub fn validate_account_id(account_id: &str) -> Result<(), IdentityError> {
    if account_id.is_empty() || account_id.contains(SEPARATOR) || account_id.chars().any(char::is_whitespace) {
        return Err(IdentityError::InvalidAccountId(account_id.to_string()));
    }
    Ok(())
}

/// One account id to display name mapping
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IdentityRecord {
    /// Opaque account id, unique in the registry
    pub account_id: String,
    /// Sanitized display name
    pub display_name: String,
}

impl IdentityRecord {
    /// Build a record, sanitizing the display name
    ///
    /// # Errors
    /// Invalid account id, or a display name with nothing left after sanitizing.
    pub fn new(account_id: impl Into<String>, display_name: &str) -> Result<Self, IdentityError> {
        let account_id = account_id.into();
        validate_account_id(&account_id)?;
        let clean = sanitize(display_name);
        if clean.is_empty() {
            return Err(IdentityError::InvalidDisplayName {
                account_id,
                raw: display_name.to_string(),
            });
        }
        Ok(Self {
            account_id,
            display_name: clean,
        })
    }

    /// Registry line without the trailing newline
    #[must_use]
    pub fn to_line(&self) -> String {
        format!("{}{SEPARATOR}{}", self.account_id, self.display_name)
    }

    /// Parse a registry line, splitting at the first separator
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let (account_id, display_name) = line.trim_end_matches(['\r', '\n']).split_once(SEPARATOR)?;
        if account_id.is_empty() || display_name.is_empty() {
            return None;
        }
        Some(Self {
            account_id: account_id.to_string(),
            display_name: display_name.to_string(),
        })
    }

    /// Line for the dispatch engine's crew list
    #[must_use]
    pub fn crew_line(&self) -> String {
        format!("\"{}\", # {}", self.account_id, self.display_name)
    }
}

impl fmt::Display for IdentityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.account_id, self.display_name)
    }
}
