//! Variables exported for a resolved identity

use crate::error::IdentityError;
use crate::record::IdentityRecord;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Work-root variable
pub const RENDER_HOME: &str = "RENDERHOME";
/// Display-name variable
pub const RENDER_NAME: &str = "RENDERNAME";
/// Account-id variable
pub const RENDER_NUMBER: &str = "RENDERNUMBER";

/// Identity context for the invoking tool
///
/// Carried explicitly rather than written into the process environment;
/// callers decide whether to export it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityEnvironment {
    /// `<work root>/<display name>`
    pub render_home: PathBuf,
    /// Sanitized display name
    pub render_name: String,
    /// Raw account id
    pub render_number: String,
}

impl IdentityEnvironment {
    /// Context for `record` under `work_root`
    #[must_use]
    pub fn new(work_root: &Path, record: &IdentityRecord) -> Self {
        Self {
            render_home: work_root.join(&record.display_name),
            render_name: record.display_name.clone(),
            render_number: record.account_id.clone(),
        }
    }

    /// The three variables, in a fixed order
    #[must_use]
    pub fn vars(&self) -> [(&'static str, String); 3] {
        [
            (RENDER_HOME, self.render_home.display().to_string()),
            (RENDER_NAME, self.render_name.clone()),
            (RENDER_NUMBER, self.render_number.clone()),
        ]
    }

    /// `export NAME=value` lines for a POSIX shell
    #[must_use]
    pub fn export_lines(&self) -> Vec<String> {
        self.vars()
            .iter()
            .map(|(name, value)| format!("export {name}={}", shell_quote(value)))
            .collect()
    }

    /// Create the home area if missing
    ///
    /// # Errors
    /// [`IdentityError::Io`] when the directory cannot be created.
    pub fn ensure_home(&self) -> Result<bool, IdentityError> {
        if self.render_home.is_dir() {
            tracing::info!(home = %self.render_home.display(), "home area already exists");
            return Ok(false);
        }
        create_home(&self.render_home).map_err(|e| IdentityError::io(&self.render_home, e))?;
        tracing::info!(home = %self.render_home.display(), "home area created");
        Ok(true)
    }
}

#[cfg(unix)]
fn create_home(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o755).create(path)
}

#[cfg(not(unix))]
fn create_home(path: &Path) -> std::io::Result<()> {
    fs::create_dir_all(path)
}

fn shell_quote(value: &str) -> String {
    if value.chars().all(|c| c.is_ascii_alphanumeric() || "/._-".contains(c)) {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vars_and_exports() {
        let record = IdentityRecord::new("120988", "alice").unwrap();
        let env = IdentityEnvironment::new(Path::new("/dabrender/work"), &record);
        assert_eq!(env.render_home, PathBuf::from("/dabrender/work/alice"));
        assert_eq!(
            env.export_lines(),
            vec![
                "export RENDERHOME=/dabrender/work/alice",
                "export RENDERNAME=alice",
                "export RENDERNUMBER=120988",
            ]
        );
    }

    #[test]
    fn quotes_unusual_values() {
        assert_eq!(shell_quote("/a b"), "'/a b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }
}
