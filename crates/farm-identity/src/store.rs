//! Registry storage seam
//!
//! A store holds the registry as a set of lines. [`FlatFileStore`] is the
//! shared file every farm client reads and rewrites without locking: the
//! last writer wins and a concurrent registration can be lost. A stricter
//! backend can be swapped in behind [`RegistryStore`].

use crate::error::IdentityError;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Storage for registry lines
pub trait RegistryStore: Send + Sync + std::fmt::Debug {
    /// Check the storage location is reachable
    ///
    /// # Errors
    /// [`IdentityError::MountUnavailable`] when it is not.
    fn check_mount(&self) -> Result<(), IdentityError>;

    /// Read every line, deduplicated and sorted
    ///
    /// # Errors
    /// [`IdentityError::Io`] on read failure.
    fn load(&self) -> Result<BTreeSet<String>, IdentityError>;

    /// Replace the stored lines
    ///
    /// # Errors
    /// [`IdentityError::Io`] on write failure.
    fn save(&self, lines: &BTreeSet<String>) -> Result<(), IdentityError>;

    /// Human-readable location for diagnostics
    fn location(&self) -> String;
}

/// Registry file on the shared render mount
#[derive(Debug, Clone)]
pub struct FlatFileStore {
    mount: PathBuf,
    path: PathBuf,
    require_mount_point: bool,
}

impl FlatFileStore {
    /// Store at `mount/relative`
    #[must_use]
    pub fn new(mount: impl Into<PathBuf>, relative: impl AsRef<Path>) -> Self {
        let mount = mount.into();
        let path = mount.join(relative);
        Self {
            mount,
            path,
            require_mount_point: false,
        }
    }

    /// Demand that the mount root is a real mount point, not a plain directory
    #[must_use]
    pub fn require_mount_point(mut self, require: bool) -> Self {
        self.require_mount_point = require;
        self
    }

    /// Registry file path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mount root
    #[inline]
    #[must_use]
    pub fn mount(&self) -> &Path {
        &self.mount
    }

    fn unavailable(&self, reason: impl Into<String>) -> IdentityError {
        IdentityError::MountUnavailable {
            path: self.mount.clone(),
            reason: reason.into(),
        }
    }
}

impl RegistryStore for FlatFileStore {
    fn check_mount(&self) -> Result<(), IdentityError> {
        let meta = fs::metadata(&self.mount).map_err(|e| self.unavailable(e.to_string()))?;
        if !meta.is_dir() {
            return Err(self.unavailable("not a directory"));
        }
        if self.require_mount_point && !is_mount_point(&self.mount) {
            return Err(self.unavailable("not a mount point"));
        }
        Ok(())
    }

    fn load(&self) -> Result<BTreeSet<String>, IdentityError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(text
                .lines()
                .map(|l| l.trim_end_matches('\r'))
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "registry file absent, starting empty");
                Ok(BTreeSet::new())
            }
            Err(e) => Err(IdentityError::io(&self.path, e)),
        }
    }

    fn save(&self, lines: &BTreeSet<String>) -> Result<(), IdentityError> {
        let dir = self.path.parent().unwrap_or(&self.mount);
        fs::create_dir_all(dir).map_err(|e| IdentityError::io(dir, e))?;

        let mut body = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
        for line in lines {
            body.push_str(line);
            body.push('\n');
        }

        // Write beside the target so the rename stays on one filesystem.
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| IdentityError::io(dir, e))?;
        tmp.write_all(body.as_bytes())
            .and_then(|()| tmp.flush())
            .map_err(|e| IdentityError::io(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| IdentityError::io(&self.path, e.error))?;

        tracing::debug!(path = %self.path.display(), records = lines.len(), "registry written");
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(unix)]
fn is_mount_point(path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    let Ok(meta) = fs::metadata(path) else {
        return false;
    };
    let Some(parent) = path.parent() else {
        // filesystem root
        return true;
    };
    match fs::metadata(parent) {
        Ok(parent_meta) => parent_meta.dev() != meta.dev() || parent_meta.ino() == meta.ino(),
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn is_mount_point(path: &Path) -> bool {
    path.is_dir()
}

/// Process-local store for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    lines: Mutex<BTreeSet<String>>,
    unreachable: bool,
}

impl MemoryStore {
    /// Empty, reachable store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store preloaded with `lines`
    #[must_use]
    pub fn with_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: Mutex::new(lines.into_iter().map(Into::into).collect()),
            unreachable: false,
        }
    }

    /// Store whose mount check always fails
    #[must_use]
    pub fn unreachable() -> Self {
        Self {
            lines: Mutex::default(),
            unreachable: true,
        }
    }
}

impl RegistryStore for MemoryStore {
    fn check_mount(&self) -> Result<(), IdentityError> {
        if self.unreachable {
            return Err(IdentityError::MountUnavailable {
                path: PathBuf::from("memory"),
                reason: "marked unreachable".to_string(),
            });
        }
        Ok(())
    }

    fn load(&self) -> Result<BTreeSet<String>, IdentityError> {
        Ok(self.lines.lock().clone())
    }

    fn save(&self, lines: &BTreeSet<String>) -> Result<(), IdentityError> {
        self.lines.lock().clone_from(lines);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_round_trip() {
        let store = MemoryStore::with_lines(["2_b", "1_a"]);
        let mut lines = store.load().unwrap();
        assert_eq!(lines.iter().next().map(String::as_str), Some("1_a"));
        lines.insert("3_c".into());
        store.save(&lines).unwrap();
        assert_eq!(store.load().unwrap().len(), 3);
    }

    #[test]
    fn unreachable_memory_store() {
        assert!(matches!(
            MemoryStore::unreachable().check_mount(),
            Err(IdentityError::MountUnavailable { .. })
        ));
    }
}
