//! Farm Graph - job authoring for the render farm
//!
//! Builds the tree a submission hands to the dispatch engine:
//! - [`Job`] at the root, owning metadata and top-level nodes
//! - [`Task`] nodes, run serially or in parallel, holding [`Command`]s
//! - [`Instance`] references that turn the tree into a DAG
//! - [`Iterate`] templates expanded over [`chunk`]ed frame ranges
//!
//! Nothing here performs I/O.
//!
//! # Example
//!
//! ```rust
//! use farm_graph::{Command, Iterate, Job, Task};
//!
//! let frames = Task::new("Frames ${f}-${f_last}")
//!     .with_command(Command::new(["prman", "-frames", "${f}", "${f_last}"]));
//!
//! let job = Job::new("Render shot 10", 10.0)
//!     .with_service("PixarRender")
//!     .with_child(Task::new("Render").with_child(Iterate::new("f", 1, 20, 5, frames)));
//!
//! let graph = job.finalize().unwrap();
//! assert_eq!(graph.task_count, 5);
//! ```

pub mod chunk;
pub mod command;
pub mod error;
pub mod iterate;
pub mod job;
pub mod task;

mod finalize;
mod serialize;

pub use chunk::{chunk, FrameChunk};
pub use command::{Command, CommandKind};
pub use error::{ChunkError, GraphError};
pub use finalize::SerializedGraph;
pub use iterate::Iterate;
pub use job::{DirMap, Job};
pub use task::{Instance, Node, Task};
