//! Shell command submissions
//!
//! ```text
//! Job
//! └── Parent (serial)
//!     └── Command: bash -c <command>
//! ```

use super::{Header, Submission, FARM_TAG, SERVICE_SHELL};
use crate::error::FarmError;
use chrono::{DateTime, Utc};
use farm_graph::{Command, Job, Task};
use farm_identity::IdentityRecord;
use serde::{Deserialize, Serialize};

/// One shell command run on a farm worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSubmission {
    /// Command line handed to `bash -c`
    pub command: String,
    /// Project group charged for the job
    pub project_group: String,
    /// Route to the testing tier
    pub testing: bool,
    /// Submission time
    pub submitted: DateTime<Utc>,
}

impl CommandSubmission {
    /// Submission running `command`
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            project_group: "yr1".to_string(),
            testing: false,
            submitted: Utc::now(),
        }
    }

    /// Project group
    #[must_use]
    pub fn with_project_group(mut self, group: impl Into<String>) -> Self {
        self.project_group = group.into();
        self
    }

    /// Route to the testing tier
    #[must_use]
    pub fn testing(mut self, testing: bool) -> Self {
        self.testing = testing;
        self
    }

    /// Submission time
    #[must_use]
    pub fn with_submitted(mut self, submitted: DateTime<Utc>) -> Self {
        self.submitted = submitted;
        self
    }

    /// Assemble the job for `user`
    ///
    /// # Errors
    /// [`FarmError::InvalidSubmission`] for a blank command.
    pub fn build_job(&self, user: &IdentityRecord) -> Result<Job, FarmError> {
        if self.command.trim().is_empty() {
            return Err(FarmError::InvalidSubmission("command is empty".to_string()));
        }
        let header = Header {
            user,
            project_group: &self.project_group,
            testing: self.testing,
            submitted: self.submitted,
        };
        let mut job = Job::new(format!("Bash Job: {}", user.display_name), 10.0);
        if !self.testing {
            job = job.with_service(SERVICE_SHELL);
        }
        let mut job = header.apply(job);

        let run = Command::new(["bash".to_string(), "-c".to_string(), self.command.clone()])
            .with_service(SERVICE_SHELL)
            .with_tags([FARM_TAG]);
        job.add_child(Task::new("Parent").serial().with_child(Task::new("Command").with_command(run)));
        Ok(job)
    }
}

impl Submission for CommandSubmission {
    fn kind(&self) -> &'static str {
        "command"
    }

    fn build_job(&self, user: &IdentityRecord) -> Result<Job, FarmError> {
        CommandSubmission::build_job(self, user)
    }
}
