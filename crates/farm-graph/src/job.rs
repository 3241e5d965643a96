//! Job: the root of a submission

use crate::command::Command;
use crate::error::GraphError;
use crate::finalize::{finalize, SerializedGraph};
use crate::task::Node;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Per-platform path remapping applied by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirMap {
    /// Path as written in the job
    pub src: String,
    /// Path on workers in `zone`
    pub dst: String,
    /// Zone name, e.g. `linux`, `osx`, `windows`, `UNC`, `NFS`
    pub zone: String,
}

/// Top-level unit of submitted work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Job title, never empty once finalized
    pub title: String,
    /// Scheduling priority, finite and non-negative
    pub priority: f64,
    /// Default service key expression
    pub service: Option<String>,
    /// Owning identity
    pub owner: Option<String>,
    /// Environment keys applied to every command
    pub envkeys: Vec<String>,
    /// Scheduling tier, e.g. `batch` or `admin`
    pub tier: Option<String>,
    /// Free-form key/value metadata, insertion ordered
    pub metadata: IndexMap<String, String>,
    /// Submit in the paused state
    pub paused: bool,
    /// Free-form comment
    pub comment: Option<String>,
    /// Project groups the job counts against
    pub projects: Vec<String>,
    /// Job tags
    pub tags: Vec<String>,
    /// Directory maps
    pub dirmaps: Vec<DirMap>,
    /// Top-level nodes
    pub children: Vec<Node>,
    /// Commands run when the job finishes, whatever the outcome
    pub cleanup: Vec<Command>,
}

impl Job {
    /// Create a job with a title and priority
    #[must_use]
    pub fn new(title: impl Into<String>, priority: f64) -> Self {
        Self {
            title: title.into(),
            priority,
            service: None,
            owner: None,
            envkeys: Vec::new(),
            tier: None,
            metadata: IndexMap::new(),
            paused: false,
            comment: None,
            projects: Vec::new(),
            tags: Vec::new(),
            dirmaps: Vec::new(),
            children: Vec::new(),
            cleanup: Vec::new(),
        }
    }

    /// With default service key
    #[must_use]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// With owner
    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// With tier
    #[must_use]
    pub fn with_tier(mut self, tier: impl Into<String>) -> Self {
        self.tier = Some(tier.into());
        self
    }

    /// Append environment keys, keeping order
    #[must_use]
    pub fn with_envkeys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.envkeys.extend(keys.into_iter().map(Into::into));
        self
    }

    /// With a metadata entry
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// With comment
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// With a project group
    #[must_use]
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.projects.push(project.into());
        self
    }

    /// With a tag
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Submit paused
    #[must_use]
    pub fn paused(mut self) -> Self {
        self.paused = true;
        self
    }

    /// With a child node
    #[must_use]
    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Append a child node
    pub fn add_child(&mut self, child: impl Into<Node>) -> &mut Self {
        self.children.push(child.into());
        self
    }

    /// Append a job-level cleanup command
    pub fn add_cleanup(&mut self, command: Command) -> &mut Self {
        self.cleanup.push(command);
        self
    }

    /// Append a directory map
    pub fn new_dir_map(
        &mut self,
        src: impl Into<String>,
        dst: impl Into<String>,
        zone: impl Into<String>,
    ) -> &mut Self {
        self.dirmaps.push(DirMap {
            src: src.into(),
            dst: dst.into(),
            zone: zone.into(),
        });
        self
    }

    /// Validate the graph and serialize it
    ///
    /// The job itself is left untouched, whatever the outcome.
    ///
    /// # Errors
    /// Any [`GraphError`] describing the first structural problem found.
    pub fn finalize(&self) -> Result<SerializedGraph, GraphError> {
        finalize(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;

    #[test]
    fn builder_chain() {
        let mut job = Job::new("Renderman: alice scene 1-12", 10.0)
            .with_service("PixarRender")
            .with_tier("batch")
            .with_envkeys(["rms-20.2-maya-2016", "ProjectX"])
            .with_metadata("user", "120988")
            .with_metadata("username", "alice")
            .with_project("yr3")
            .with_tag("theWholeFarm")
            .with_child(Task::new("Render Job"));
        job.new_dir_map("/dabrender", "Z:", "windows");

        assert_eq!(job.envkeys, vec!["rms-20.2-maya-2016", "ProjectX"]);
        assert_eq!(job.metadata.keys().collect::<Vec<_>>(), vec!["user", "username"]);
        assert_eq!(job.dirmaps[0].zone, "windows");
        assert_eq!(job.children.len(), 1);
        assert!(!job.paused);
    }
}
