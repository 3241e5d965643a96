//! RenderMan for Maya render submissions
//!
//! A [`RenderSubmission`] turns a scene and a frame range into a job:
//!
//! ```text
//! Job
//! └── Render Job (serial)
//!     ├── Preflight (serial): RIB preflight, render preflight
//!     ├── All Frames (serial)
//!     │   ├── RIB GEN: one task per frame chunk
//!     │   └── RENDER Frames: one task per frame, in parallel
//!     └── Proxy Generation (optional)
//! ```
//!
//! Paths handed to commands are wrapped as `%D(path)` so the engine applies
//! the job's directory maps on each worker.

use super::{dirmap, file_name, Header, Submission, FARM_TAG, SERVICE_NUKE};
use crate::error::FarmError;
use crate::project::ProjectContext;
use chrono::{DateTime, Utc};
use farm_env::handlers::RendermanHandler;
use farm_graph::{Command, Iterate, Job, Task};
use farm_identity::IdentityRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const SERVICE_RENDER: &str = "PixarRender";
const SERVICE_RIBGEN: &str = "RfMRibGen";
const PREFLIGHT_THREADS: u32 = 4;
const RIBGEN_THREADS: u32 = 1;

/// Output resolution override
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    /// 1280x720
    #[default]
    #[serde(rename = "720p")]
    Hd720,
    /// 1920x1080
    #[serde(rename = "1080p")]
    Hd1080,
    /// 960x540
    #[serde(rename = "540p")]
    Half,
    /// 192x108 for quick checks
    #[serde(rename = "108p")]
    Thumbnail,
    /// Whatever the scene says
    #[serde(rename = "fromfile")]
    FromFile,
}

impl Resolution {
    /// Pixel size, `None` for [`Resolution::FromFile`]
    #[must_use]
    pub fn size(self) -> Option<(u32, u32)> {
        match self {
            Self::Hd720 => Some((1280, 720)),
            Self::Hd1080 => Some((1920, 1080)),
            Self::Half => Some((960, 540)),
            Self::Thumbnail => Some((192, 108)),
            Self::FromFile => None,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Hd720 => "720p",
            Self::Hd1080 => "1080p",
            Self::Half => "540p",
            Self::Thumbnail => "108p",
            Self::FromFile => "fromfile",
        })
    }
}

impl FromStr for Resolution {
    type Err = FarmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "720p" => Ok(Self::Hd720),
            "1080p" => Ok(Self::Hd1080),
            "540p" => Ok(Self::Half),
            "108p" => Ok(Self::Thumbnail),
            "fromfile" => Ok(Self::FromFile),
            other => Err(FarmError::InvalidSubmission(format!("unknown resolution {other:?}"))),
        }
    }
}

/// Settings for one render submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderSubmission {
    /// Where the scene sits
    pub context: ProjectContext,
    /// First frame
    pub start: i64,
    /// Last frame, inclusive
    pub end: i64,
    /// Render every `by`th frame
    pub by: i64,
    /// Frames per RIB generation task
    pub ribgen_size: i64,
    /// Upper bound on RIB generation tasks
    pub ribgen_chunks: usize,
    /// Render threads per frame
    pub threads: u32,
    /// Memory limit per render, `None` keeps the scene's
    pub thread_memory: Option<u32>,
    /// Max samples, `None` keeps the scene's
    pub max_samples: Option<u32>,
    /// Maya version
    pub maya_version: String,
    /// RenderMan version
    pub renderman_version: String,
    /// Nuke version used for proxies
    pub nuke_version: String,
    /// Output resolution
    pub resolution: Resolution,
    /// Image extension
    pub out_format: String,
    /// Extra renderer arguments, whitespace separated
    pub options: String,
    /// Project group charged for the job
    pub project_group: String,
    /// Route to the testing tier
    pub testing: bool,
    /// Add a proxy movie task
    pub make_proxy: bool,
    /// Keep generated RIB after the job
    pub keep_rib: bool,
    /// Site env keys added to the job
    pub extra_envkeys: Vec<String>,
    /// Submission time
    pub submitted: DateTime<Utc>,
}

impl RenderSubmission {
    /// Submission for `scene` over `start..=end`
    ///
    /// # Errors
    /// [`FarmError::InvalidScenePath`] when the scene is outside a work area.
    pub fn new(scene: &Path, start: i64, end: i64) -> Result<Self, FarmError> {
        Ok(Self {
            context: ProjectContext::from_scene_path(scene)?,
            start,
            end,
            by: 1,
            ribgen_size: 1,
            ribgen_chunks: 1,
            threads: 4,
            thread_memory: Some(4000),
            max_samples: Some(64),
            maya_version: "2016".to_string(),
            renderman_version: "20.2".to_string(),
            nuke_version: "9.0v7".to_string(),
            resolution: Resolution::default(),
            out_format: "exr".to_string(),
            options: String::new(),
            project_group: "yr1".to_string(),
            testing: false,
            make_proxy: false,
            keep_rib: false,
            extra_envkeys: Vec::new(),
            submitted: Utc::now(),
        })
    }

    /// Render every `by`th frame
    #[must_use]
    pub fn with_by(mut self, by: i64) -> Self {
        self.by = by;
        self
    }

    /// Frames per RIB generation task
    #[must_use]
    pub fn with_ribgen_size(mut self, size: i64) -> Self {
        self.ribgen_size = size;
        self
    }

    /// Cap RIB generation tasks
    #[must_use]
    pub fn with_ribgen_chunks(mut self, chunks: usize) -> Self {
        self.ribgen_chunks = chunks;
        self
    }

    /// Render threads
    #[must_use]
    pub fn with_threads(mut self, threads: u32) -> Self {
        self.threads = threads;
        self
    }

    /// Maya and RenderMan versions
    #[must_use]
    pub fn with_versions(mut self, maya: impl Into<String>, renderman: impl Into<String>) -> Self {
        self.maya_version = maya.into();
        self.renderman_version = renderman.into();
        self
    }

    /// Output resolution
    #[must_use]
    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// Extra renderer arguments
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

    /// Add a proxy movie task
    #[must_use]
    pub fn with_proxy(mut self, make_proxy: bool) -> Self {
        self.make_proxy = make_proxy;
        self
    }

    /// Site env key
    #[must_use]
    pub fn with_envkey(mut self, key: impl Into<String>) -> Self {
        self.extra_envkeys.push(key.into());
        self
    }

    /// Submission time
    #[must_use]
    pub fn with_submitted(mut self, submitted: DateTime<Utc>) -> Self {
        self.submitted = submitted;
        self
    }

    /// Scene file
    #[must_use]
    pub fn scene_path(&self) -> PathBuf {
        self.context.scene_path()
    }

    /// RenderMan env key for the chosen versions
    #[must_use]
    pub fn renderman_key(&self) -> String {
        RendermanHandler::key_for(&self.renderman_version, &self.maya_version)
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
        if self.ribgen_size <= 0 {
            return bad(format!("RIB chunk size must be positive, got {}", self.ribgen_size));
        }
        if self.ribgen_chunks == 0 {
            return bad("at least one RIB generation chunk is needed".to_string());
        }
        if self.threads == 0 {
            return bad("at least one render thread is needed".to_string());
        }
        if self.out_format.is_empty() {
            return bad("output format is empty".to_string());
        }
        Ok(())
    }

    /// Assemble the job for `user`
    ///
    /// # Errors
    /// [`FarmError::InvalidSubmission`] from [`RenderSubmission::validate`].
    pub fn build_job(&self, user: &IdentityRecord) -> Result<Job, FarmError> {
        self.validate()?;
        let ctx = &self.context;

        let header = Header {
            user,
            project_group: &self.project_group,
            testing: self.testing,
            submitted: self.submitted,
        };
        let mut job = header.apply(
            Job::new(
                format!(
                    "Renderman: {} {} {}-{}",
                    user.display_name,
                    file_name(&ctx.scene),
                    self.start,
                    self.end
                ),
                10.0,
            )
            .with_envkeys([self.renderman_key()])
            .with_envkeys(self.extra_envkeys.iter().cloned())
            .with_envkeys(ctx.env_keys()),
        );

        let render_job = Task::new("Render Job")
            .serial()
            .with_child(self.preflight())
            .with_child(self.all_frames());
        let render_job = if self.make_proxy {
            render_job.with_child(self.proxy())
        } else {
            render_job
        };
        job.add_child(render_job);

        if !self.keep_rib {
            let rib = ctx.renderman_path().join("rib");
            job.add_cleanup(
                Command::new(["rm".to_string(), "-rf".to_string(), dirmap(&rib)])
                    .with_service(SERVICE_RENDER)
                    .with_tags([FARM_TAG]),
            );
        }

        tracing::debug!(
            scene = %ctx.scene,
            start = self.start,
            end = self.end,
            testing = self.testing,
            "render job assembled"
        );
        Ok(job)
    }

    fn ribgen_command(&self, start: &str, end: &str, phase: u8) -> Command {
        Command::new([
            "maya".to_string(),
            "-batch".to_string(),
            "-proj".to_string(),
            dirmap(&self.context.project_path()),
            "-command".to_string(),
            format!("renderManBatchGenRibForLayer 0 {start} {end} {phase}"),
            "-file".to_string(),
            dirmap(&self.scene_path()),
        ])
        .with_service(SERVICE_RIBGEN)
        .with_tags(["maya", "rms", FARM_TAG])
        .with_slots(RIBGEN_THREADS, RIBGEN_THREADS)
    }

    fn preflight(&self) -> Task {
        let (start, end) = (self.start.to_string(), self.end.to_string());
        let render = Command::new([
            "prman".to_string(),
            format!("-t:{PREFLIGHT_THREADS}"),
            "-Progress".to_string(),
            "-recover".to_string(),
            "%r".to_string(),
            "-checkpoint".to_string(),
            "5m".to_string(),
            "-cwd".to_string(),
            dirmap(&self.context.project_path()),
            format!("renderman/{}/rib/job/job.rib", self.context.scene_name),
        ])
        .with_service(SERVICE_RENDER)
        .with_tags(["prman", FARM_TAG])
        .with_slots(PREFLIGHT_THREADS, PREFLIGHT_THREADS);

        Task::new("Preflight")
            .serial()
            .with_child(Task::new("Generate RIB Preflight").with_command(self.ribgen_command(&start, &end, 1)))
            .with_child(Task::new("Render Preflight").with_command(render))
    }

    fn all_frames(&self) -> Task {
        let ribgen = Iterate::new(
            "chunk",
            self.start,
            self.end,
            self.ribgen_size,
            Task::new("RIB GEN chunk ${chunk_index} frames ${chunk}-${chunk_last}")
                .with_command(self.ribgen_command("${chunk}", "${chunk_last}", 2)),
        )
        .with_max_chunks(self.ribgen_chunks);

        let render = Iterate::new("frame", self.start, self.end, self.by, self.frame_template());

        Task::new(format!("All Frames {}-{}", self.start, self.end))
            .serial()
            .with_child(Task::new(format!("RIB GEN {}-{}", self.start, self.end)).with_child(ribgen))
            .with_child(Task::new(format!("RENDER Frames {}-{}", self.start, self.end)).with_child(render))
    }

    fn frame_template(&self) -> Task {
        let ctx = &self.context;
        let base = ctx.renderman_path();
        let frame_file = format!("{}.${{frame:4}}.{}", ctx.scene_name, self.out_format);
        let image = base.join("images").join(&frame_file);
        let rib_dir = base.join("rib").join("${frame:4}");
        let rib = rib_dir.join("${frame:4}.rib");
        let stats = rib_dir.join("${frame:4}.xml");

        let mut argv = vec!["prman".to_string(), "-cwd".to_string(), dirmap(&ctx.project_path())];
        if let Some((x, y)) = self.resolution.size() {
            argv.extend(["-res".to_string(), x.to_string(), y.to_string()]);
        }
        if let Some(samples) = self.max_samples {
            argv.extend(["-maxsamples".to_string(), samples.to_string()]);
        }
        if let Some(memory) = self.thread_memory {
            argv.extend(["-memorylimit".to_string(), memory.to_string()]);
        }
        argv.extend([
            format!("-t:{}", self.threads),
            "-Progress".to_string(),
            "-recover".to_string(),
            "%r".to_string(),
            "-checkpoint".to_string(),
            "5m".to_string(),
            "-statslevel".to_string(),
            "2".to_string(),
        ]);
        argv.extend(self.options.split_whitespace().map(str::to_string));
        argv.push(dirmap(&rib));

        Task::new("RENDER Frame ${frame}")
            .with_preview(format!("sho {}", dirmap(&image)))
            .with_metadata(format!("statsfile={} imgfile={}", dirmap(&stats), dirmap(&image)))
            .with_command(
                Command::new(argv)
                    .with_service(SERVICE_RENDER)
                    .with_tags(["prman", FARM_TAG])
                    .with_slots(self.threads, self.threads),
            )
    }

    fn proxy(&self) -> Task {
        let images = self.context.renderman_path().join("images");
        Task::new("Proxy Generation").with_service(SERVICE_NUKE).with_command(
            Command::new(["proxy_run.py".to_string(), "-s".to_string(), dirmap(&images)])
                .with_service(SERVICE_NUKE)
                .with_tags(["nuke", FARM_TAG])
                .with_envkey(format!("proxynuke{}", self.nuke_version)),
        )
    }
}

impl Submission for RenderSubmission {
    fn kind(&self) -> &'static str {
        "render"
    }

    fn build_job(&self, user: &IdentityRecord) -> Result<Job, FarmError> {
        RenderSubmission::build_job(self, user)
    }

    fn required_file(&self) -> Option<PathBuf> {
        Some(self.scene_path())
    }
}
