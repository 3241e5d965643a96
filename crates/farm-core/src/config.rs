//! Farm configuration
//!
//! Read from TOML. Every field has a default, so an absent file is valid.
//!
//! ```toml
//! [mount]
//! root = "/dabrender"
//! registry_file = "usr/map/user_map"
//! work_dir = "work"
//!
//! [directory]
//! kind = "ldap"
//! host = "ldap.example.edu"
//! base_dn = "ou=people,o=example"
//!
//! [dispatch]
//! host = "tractor-engine"
//! port = 5600
//!
//! [handlers]
//! maya = "/usr/autodesk/maya{version}"
//! maya_required = true
//!
//! [handlers.static_keys.ProjectX]
//! PROJECTX = "1"
//!
//! [log]
//! filter = "info,farm_dispatch=debug"
//! ```

use crate::error::FarmError;
use farm_dispatch::DispatchConfig;
use farm_env::handlers::{MayaHandler, NukeHandler, ProjectHandler, RendermanHandler, StaticHandler};
use farm_env::HandlerRegistry;
use farm_identity::{DirectoryService, FlatFileStore, LdapSearchDirectory, StaticDirectory};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "FARM_CONFIG";

/// Environment variable overriding the mount root
pub const MOUNT_ENV: &str = "DABRENDER";

/// Whole farm configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FarmConfig {
    /// Shared storage
    pub mount: MountConfig,
    /// Account directory
    pub directory: DirectoryConfig,
    /// Engine connection
    pub dispatch: DispatchConfig,
    /// Worker environment handlers
    pub handlers: HandlersConfig,
    /// Logging
    pub log: LogConfig,
}

impl FarmConfig {
    /// Parse TOML text
    ///
    /// # Errors
    /// [`FarmError::ConfigParse`] on malformed input.
    pub fn from_toml(text: &str, origin: &Path) -> Result<Self, FarmError> {
        toml::from_str(text).map_err(|source| FarmError::ConfigParse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Load from `path`, else `$FARM_CONFIG`, else defaults, then apply
    /// environment overrides
    ///
    /// # Errors
    /// A named file that cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, FarmError> {
        Self::load_with(path, |name| std::env::var(name).ok())
    }

    /// [`FarmConfig::load`] with an explicit variable lookup
    ///
    /// # Errors
    /// A named file that cannot be read or parsed.
    pub fn load_with(path: Option<&Path>, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, FarmError> {
        let named = path
            .map(Path::to_path_buf)
            .or_else(|| lookup(CONFIG_ENV).filter(|v| !v.is_empty()).map(PathBuf::from));

        let config = match named {
            Some(path) => {
                let text = std::fs::read_to_string(&path).map_err(|source| FarmError::ConfigRead {
                    path: path.clone(),
                    source,
                })?;
                tracing::debug!(path = %path.display(), "loaded config");
                Self::from_toml(&text, &path)?
            }
            None => Self::default(),
        };
        Ok(config.with_overrides(lookup))
    }

    /// Apply environment overrides
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(root) = lookup(MOUNT_ENV).filter(|v| !v.is_empty()) {
            tracing::debug!(root = %root, "mount root overridden from {MOUNT_ENV}");
            self.mount.root = PathBuf::from(root);
        }
        self
    }
}

/// Shared storage layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountConfig {
    /// Mount root
    pub root: PathBuf,
    /// Registry file, relative to the root
    pub registry_file: PathBuf,
    /// Directory holding user home areas, relative to the root
    pub work_dir: PathBuf,
    /// Refuse a root that is a plain directory
    pub require_mount_point: bool,
}

impl Default for MountConfig {
    fn default() -> Self {
        let root = if cfg!(target_os = "macos") {
            "/Volumes/dabrender"
        } else {
            "/dabrender"
        };
        Self {
            root: PathBuf::from(root),
            registry_file: PathBuf::from("usr/map/user_map"),
            work_dir: PathBuf::from("work"),
            require_mount_point: true,
        }
    }
}

impl MountConfig {
    /// Where home areas are created
    #[must_use]
    pub fn work_root(&self) -> PathBuf {
        self.root.join(&self.work_dir)
    }

    /// Registry store on this mount
    #[must_use]
    pub fn store(&self) -> FlatFileStore {
        FlatFileStore::new(&self.root, &self.registry_file).require_mount_point(self.require_mount_point)
    }
}

/// Which directory backend to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryKind {
    /// `ldapsearch` against a server
    #[default]
    Ldap,
    /// The `entries` table
    Static,
}

/// Account directory settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Backend
    pub kind: DirectoryKind,
    /// Directory host
    pub host: String,
    /// Search base
    pub base_dn: String,
    /// Bind DN template with `{account}`; anonymous when absent
    pub bind_dn: Option<String>,
    /// Attribute holding the name
    pub attribute: String,
    /// Static entries, account id to name
    pub entries: IndexMap<String, String>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            kind: DirectoryKind::Ldap,
            host: "ldap".to_string(),
            base_dn: "ou=people,o=example".to_string(),
            bind_dn: None,
            attribute: "mail".to_string(),
            entries: IndexMap::new(),
        }
    }
}

impl DirectoryConfig {
    /// Directory service for these settings
    #[must_use]
    pub fn build(&self) -> Arc<dyn DirectoryService> {
        match self.kind {
            DirectoryKind::Ldap => {
                let mut ldap = LdapSearchDirectory::new(&self.host, &self.base_dn).with_attribute(&self.attribute);
                if let Some(bind_dn) = &self.bind_dn {
                    ldap = ldap.with_bind_dn(bind_dn);
                }
                Arc::new(ldap)
            }
            DirectoryKind::Static => Arc::new(
                self.entries
                    .iter()
                    .fold(StaticDirectory::new(), |dir, (id, name)| dir.with_entry(id, name)),
            ),
        }
    }
}

/// Environment handler settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlersConfig {
    /// Maya install template with `{version}`
    pub maya: String,
    /// Abort when Maya cannot be located
    pub maya_required: bool,
    /// RenderMan Pro Server template with `{rms}`
    pub rmantree: String,
    /// RenderMan Studio template with `{rms}` and `{maya}`
    pub rmstree: String,
    /// Abort when RenderMan cannot be located
    pub renderman_required: bool,
    /// Nuke install template with `{version}`; binaries on `PATH` when absent
    pub nuke: Option<String>,
    /// Site keys mapped to fixed variables
    pub static_keys: IndexMap<String, IndexMap<String, String>>,
}

impl Default for HandlersConfig {
    fn default() -> Self {
        Self {
            maya: "/usr/autodesk/maya{version}".to_string(),
            maya_required: false,
            rmantree: "/opt/pixar/RenderManProServer-{rms}".to_string(),
            rmstree: "/opt/pixar/RenderManStudio-{rms}-maya{maya}".to_string(),
            renderman_required: false,
            nuke: None,
            static_keys: IndexMap::new(),
        }
    }
}

impl HandlersConfig {
    /// Handler registry in the order keys are usually declared
    #[must_use]
    pub fn registry(&self) -> HandlerRegistry {
        let nuke = self.nuke.as_ref().map_or_else(NukeHandler::default, NukeHandler::new);
        let mut registry = HandlerRegistry::new()
            .with(ProjectHandler)
            .with(MayaHandler::new(&self.maya).required(self.maya_required))
            .with(RendermanHandler::new(&self.rmantree, &self.rmstree).required(self.renderman_required))
            .with(nuke);
        if !self.static_keys.is_empty() {
            registry = registry.with(StaticHandler::from_table("site", self.static_keys.clone()));
        }
        registry
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub filter: String,
    /// Emit JSON lines
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}
