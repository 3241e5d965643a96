//! Farm Core - ties the farm crates into submission tools
//!
//! - [`FarmConfig`]: TOML configuration with environment overrides
//! - [`logging::init`]: tracing subscriber setup
//! - [`ProjectContext`]: scene location within the shared tree
//! - [`RenderSubmission`], [`NukeSubmission`], [`CommandSubmission`]: job
//!   recipes behind the [`Submission`] trait
//! - [`Submitter`]: resolves the user, builds and dispatches

pub mod config;
pub mod error;
pub mod logging;
pub mod project;
pub mod submission;
pub mod submitter;

pub use config::{DirectoryConfig, DirectoryKind, FarmConfig, HandlersConfig, LogConfig, MountConfig};
pub use error::FarmError;
pub use project::ProjectContext;
pub use submission::{CommandSubmission, NukeSubmission, RenderSubmission, Resolution, Submission};
pub use submitter::{engine, Submitter};
