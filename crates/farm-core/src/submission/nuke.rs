//! Nuke script renders split into frame chunks
//!
//! ```text
//! Job
//! └── Nuke Rendering (parallel)
//!     └── Nuke Batch Render first-last: one task per frame chunk
//! ```

use super::{dirmap, file_name, Header, Submission, FARM_TAG, SERVICE_NUKE};
use crate::error::FarmError;
use crate::project::ProjectContext;
use chrono::{DateTime, Utc};
use farm_graph::{Command, Iterate, Job, Task};
use farm_identity::IdentityRecord;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings for one Nuke render submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NukeSubmission {
    /// Where the script sits
    pub context: ProjectContext,
    /// First frame
    pub start: i64,
    /// Last frame, inclusive
    pub end: i64,
    /// Render every `by`th frame inside each chunk
    pub by: i64,
    /// Upper bound on render tasks
    pub chunks: usize,
    /// Render threads per task
    pub threads: u32,
    /// Cache limit in megabytes, `None` keeps Nuke's default
    pub cache_memory: Option<u32>,
    /// Nuke version, e.g. `9.0v7`
    pub nuke_version: String,
    /// Extra Nuke arguments, whitespace separated
    pub options: String,
    /// Project group charged for the job
    pub project_group: String,
    /// Route to the testing tier
    pub testing: bool,
    /// Submission time
    pub submitted: DateTime<Utc>,
}

impl NukeSubmission {
    /// Submission for `script` over `start..=end`, rendered as one chunk
    ///
    /// # Errors
    /// [`FarmError::InvalidScenePath`] when the script is outside a work area.
    pub fn new(script: &Path, start: i64, end: i64) -> Result<Self, FarmError> {
        Ok(Self {
            context: ProjectContext::from_scene_path(script)?,
            start,
            end,
            by: 1,
            chunks: 1,
            threads: 4,
            cache_memory: Some(4000),
            nuke_version: "9.0v7".to_string(),
            options: String::new(),
            project_group: "yr1".to_string(),
            testing: false,
            submitted: Utc::now(),
        })
    }

    /// Render every `by`th frame
    #[must_use]
    pub fn with_by(mut self, by: i64) -> Self {
        self.by = by;
        self
    }

    /// Split the range into at most `chunks` render tasks
    #[must_use]
    pub fn with_chunks(mut self, chunks: usize) -> Self {
        self.chunks = chunks;
        self
    }

    /// Render threads
    #[must_use]
    pub fn with_threads(mut self, threads: u32) -> Self {
        self.threads = threads;
        self
    }

    /// Nuke version
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.nuke_version = version.into();
        self
    }

    /// Extra Nuke arguments
    #[must_use]
    pub fn with_options(mut self, options: impl Into<String>) -> Self {
        self.options = options.into();
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

    /// Script file
    #[must_use]
    pub fn script_path(&self) -> PathBuf {
        self.context.scene_path()
    }

    /// Nuke env key for the chosen version
    #[must_use]
    pub fn nuke_key(&self) -> String {
        format!("nuke{}", self.nuke_version)
    }

    /// Check settings that the graph cannot check itself
    ///
    /// # Errors
    /// [`FarmError::InvalidSubmission`] naming the first bad setting.
    pub fn validate(&self) -> Result<(), FarmError> {
        let bad = |msg: String| Err(FarmError::InvalidSubmission(msg));
        if self.start > self.end {
            return bad(format!("start frame {} is after end frame {}", self.start, self.end));
        }
        if self.by <= 0 {
            return bad(format!("frame step must be positive, got {}", self.by));
        }
        if self.chunks == 0 {
            return bad("at least one render chunk is needed".to_string());
        }
        if self.threads == 0 {
            return bad("at least one render thread is needed".to_string());
        }
        if self.nuke_version.trim().is_empty() {
            return bad("nuke version is empty".to_string());
        }
        Ok(())
    }

    /// Assemble the job for `user`
    ///
    /// # Errors
    /// [`FarmError::InvalidSubmission`] from [`NukeSubmission::validate`].
    pub fn build_job(&self, user: &IdentityRecord) -> Result<Job, FarmError> {
        self.validate()?;
        let header = Header {
            user,
            project_group: &self.project_group,
            testing: self.testing,
            submitted: self.submitted,
        };
        let mut job = header.apply(
            Job::new(
                format!("Nuke Render Job: {} {}", user.display_name, file_name(&self.context.scene)),
                100.0,
            )
            .with_envkeys([self.nuke_key()])
            .with_envkeys(self.context.env_keys()),
        );

        // Step 1 asks for one frame per chunk; the chunker widens it to fit.
        let chunks = Iterate::new("chunk", self.start, self.end, 1, self.chunk_template())
            .with_max_chunks(self.chunks);
        job.add_child(Task::new("Nuke Rendering").with_service(SERVICE_NUKE).with_child(chunks));

        tracing::debug!(
            script = %self.context.scene,
            start = self.start,
            end = self.end,
            chunks = self.chunks,
            "nuke job assembled"
        );
        Ok(job)
    }

    fn chunk_template(&self) -> Task {
        let frames = if self.by > 1 {
            format!("${{chunk}}-${{chunk_last}}x{}", self.by)
        } else {
            "${chunk}-${chunk_last}".to_string()
        };

        let mut argv = vec!["nuke".to_string(), "-m".to_string(), self.threads.to_string()];
        if let Some(memory) = self.cache_memory {
            argv.extend(["-c".to_string(), format!("{memory}M")]);
        }
        argv.extend(self.options.split_whitespace().map(str::to_string));
        argv.extend(["-F".to_string(), frames, "-x".to_string(), dirmap(&self.script_path())]);

        Task::new("Nuke Batch Render ${chunk}-${chunk_last}")
            .with_service(SERVICE_NUKE)
            .with_command(
                Command::new(argv)
                    .with_service(SERVICE_NUKE)
                    .with_tags(["nuke", FARM_TAG])
                    .with_envkey(self.nuke_key())
                    .with_slots(self.threads, self.threads),
            )
    }
}

impl Submission for NukeSubmission {
    fn kind(&self) -> &'static str {
        "nuke"
    }

    fn build_job(&self, user: &IdentityRecord) -> Result<Job, FarmError> {
        NukeSubmission::build_job(self, user)
    }

    fn required_file(&self) -> Option<PathBuf> {
        Some(self.script_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_names_the_problem() {
        let script = Path::new("/dabrender/user_work/alice/comp/scripts/comp_v02.nk");
        let err = NukeSubmission::new(script, 1, 10).unwrap().with_chunks(0).validate().unwrap_err();
        assert!(err.to_string().contains("at least one render chunk"));
        assert!(NukeSubmission::new(script, 1, 10).unwrap().with_by(0).validate().is_err());
    }

    #[test]
    fn frame_step_in_range_token() {
        let script = Path::new("/dabrender/user_work/alice/comp/scripts/comp_v02.nk");
        let sub = NukeSubmission::new(script, 1, 10).unwrap().with_by(2);
        let argv = &sub.chunk_template().commands[0].argv;
        assert!(argv.windows(2).any(|w| w == ["-F", "${chunk}-${chunk_last}x2"]));
        assert_eq!(argv[0], "nuke");
    }
}
