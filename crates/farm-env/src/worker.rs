//! Worker context handed to every handler

use serde::{Deserialize, Serialize};

/// Operating system family of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Linux workers
    Linux,
    /// macOS workers
    MacOs,
    /// Windows workers
    Windows,
}

impl Platform {
    /// Platform this process runs on
    #[must_use]
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Linux
        }
    }

    /// Separator for path-list variables
    #[inline]
    #[must_use]
    pub fn path_separator(self) -> char {
        match self {
            Self::Windows => ';',
            Self::Linux | Self::MacOs => ':',
        }
    }

    /// Directory-map zone name
    #[inline]
    #[must_use]
    pub fn zone(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::MacOs => "osx",
            Self::Windows => "windows",
        }
    }
}

/// The worker a command is about to run on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerContext {
    /// Worker host name
    pub host: String,
    /// Worker platform
    pub platform: Platform,
}

impl WorkerContext {
    /// Worker with an explicit host and platform
    #[must_use]
    pub fn new(host: impl Into<String>, platform: Platform) -> Self {
        Self {
            host: host.into(),
            platform,
        }
    }

    /// This machine
    #[must_use]
    pub fn local() -> Self {
        let host = std::env::var("HOSTNAME")
            .or_else(|_| std::env::var("COMPUTERNAME"))
            .unwrap_or_else(|_| "localhost".to_string());
        Self::new(host, Platform::current())
    }
}
