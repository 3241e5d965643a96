//! Farm submissions
//!
//! Each submission kind turns typed settings into a [`Job`]:
//! - [`RenderSubmission`]: RenderMan for Maya, RIB generation plus per-frame renders
//! - [`NukeSubmission`]: a Nuke script rendered in frame chunks
//! - [`CommandSubmission`]: one shell command
//!
//! All of them carry the same header: user metadata, project group, the
//! farm tag, a tier and the shared directory maps.

mod command;
mod nuke;
mod render;

pub use command::CommandSubmission;
pub use nuke::NukeSubmission;
pub use render::{RenderSubmission, Resolution};

use crate::error::FarmError;
use chrono::{DateTime, Utc};
use farm_graph::Job;
use farm_identity::IdentityRecord;
use std::path::{Path, PathBuf};

pub(crate) const SERVICE_NUKE: &str = "NukeRender";
pub(crate) const SERVICE_SHELL: &str = "ShellServices";
pub(crate) const SERVICE_TESTING: &str = "Testing";
pub(crate) const FARM_TAG: &str = "theWholeFarm";

/// A job recipe the [`Submitter`](crate::Submitter) can build and spool
pub trait Submission: Send + Sync {
    /// Short kind name for logs
    fn kind(&self) -> &'static str;

    /// Assemble the job for `user`
    ///
    /// # Errors
    /// [`FarmError::InvalidSubmission`] naming the first bad setting.
    fn build_job(&self, user: &IdentityRecord) -> Result<Job, FarmError>;

    /// File that must exist before the job is spooled
    fn required_file(&self) -> Option<PathBuf> {
        None
    }
}

/// Header settings shared by every submission kind
#[derive(Debug, Clone, Copy)]
pub(crate) struct Header<'a> {
    pub(crate) user: &'a IdentityRecord,
    pub(crate) project_group: &'a str,
    pub(crate) testing: bool,
    pub(crate) submitted: DateTime<Utc>,
}

impl Header<'_> {
    /// Add metadata, tier and directory maps to `job`
    pub(crate) fn apply(&self, job: Job) -> Job {
        let job = job
            .with_metadata("usernumber", &self.user.account_id)
            .with_metadata("username", &self.user.display_name)
            .with_metadata("submitted", self.submitted.to_rfc3339())
            .with_comment(format!("LocalUser is {} {}", self.user.account_id, self.user.display_name))
            .with_project(self.project_group)
            .with_tag(FARM_TAG);

        let mut job = if self.testing {
            job.with_tier("admin").with_service(SERVICE_TESTING)
        } else {
            job.with_tier("batch")
        };
        job.new_dir_map("/dabrender", "/dabrender", "linux")
            .new_dir_map("/dabrender", "/Volumes/dabrender", "osx")
            .new_dir_map("/dabrender", "Z:", "windows")
            .new_dir_map("/Volumes/dabrender", "Z:", "windows");
        job
    }
}

/// Wrap a path for engine-side directory mapping
pub(crate) fn dirmap(path: &Path) -> String {
    format!("%D({})", path.display())
}

/// File name of `path`, or the whole path when it has none
pub(crate) fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map_or_else(|| path.to_string(), |n| n.to_string_lossy().into_owned())
}
