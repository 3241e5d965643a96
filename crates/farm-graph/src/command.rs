//! Commands: single executable steps inside a task

use crate::iterate::Substitution;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Where a command runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CommandKind {
    /// Dispatched to a worker chosen by service key
    #[default]
    Remote,
    /// Run on the engine host itself
    Local,
}

impl CommandKind {
    /// Keyword used in the serialized graph
    #[inline]
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Remote => "RemoteCmd",
            Self::Local => "Cmd",
        }
    }
}

/// One executable invocation
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Command {
    /// Argument vector, program first
    pub argv: Vec<String>,
    /// Optional id, unique within the job
    pub id: Option<String>,
    /// Service key expression overriding the task's
    pub service: Option<String>,
    /// Environment keys expanded by worker-side handlers
    pub envkeys: Vec<String>,
    /// Worker affinity tags
    pub tags: Vec<String>,
    /// Minimum concurrent slots
    pub atleast: Option<u32>,
    /// Maximum concurrent slots
    pub atmost: Option<u32>,
    /// Exit codes that trigger an automatic retry
    pub retry_codes: BTreeSet<i32>,
    /// Local or remote execution
    pub kind: CommandKind,
}

impl Command {
    /// Create a remote command from an argument vector
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// With command id
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// With service key
    #[must_use]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Append one environment key
    #[must_use]
    pub fn with_envkey(mut self, key: impl Into<String>) -> Self {
        self.envkeys.push(key.into());
        self
    }

    /// Append several environment keys, keeping order
    #[must_use]
    pub fn with_envkeys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.envkeys.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Append tags
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// With slot hints
    #[must_use]
    pub fn with_slots(mut self, atleast: u32, atmost: u32) -> Self {
        self.atleast = Some(atleast);
        self.atmost = Some(atmost);
        self
    }

    /// With retryable exit codes
    #[must_use]
    pub fn with_retry_codes(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.retry_codes.extend(codes);
        self
    }

    /// Run on the engine host instead of a worker
    #[must_use]
    pub fn local(mut self) -> Self {
        self.kind = CommandKind::Local;
        self
    }

    /// The program name, if any
    #[inline]
    #[must_use]
    pub fn program(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }

    /// Whether `code` is configured as retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self, code: i32) -> bool {
        self.retry_codes.contains(&code)
    }

    pub(crate) fn substituted(&self, subs: &Substitution) -> Self {
        Self {
            argv: self.argv.iter().map(|a| subs.apply(a)).collect(),
            id: self.id.as_deref().map(|id| subs.apply(id)),
            service: self.service.clone(),
            envkeys: self.envkeys.iter().map(|k| subs.apply(k)).collect(),
            tags: self.tags.clone(),
            atleast: self.atleast,
            atmost: self.atmost,
            retry_codes: self.retry_codes.clone(),
            kind: self.kind,
        }
    }
}
