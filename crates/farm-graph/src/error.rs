//! Error types for job graph authoring
//!
//! Two families:
//! - [`ChunkError`]: bad input to the frame chunker
//! - [`GraphError`]: structural problems found while finalizing a job

/// Frame chunking input errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    /// Chunk size was zero or negative
    #[error("chunk size must be positive, got {0}")]
    NonPositiveStep(i64),

    /// Range start lies after range end
    #[error("frame range start {start} is after end {end}")]
    InvertedRange {
        /// First frame requested
        start: i64,
        /// Last frame requested
        end: i64,
    },

    /// Caller asked for at most zero chunks
    #[error("max chunks must be at least 1")]
    ZeroMaxChunks,
}

/// Graph finalization errors
///
/// Every variant means the graph is invalid and nothing was produced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// Job title is empty
    #[error("job title must not be empty")]
    EmptyJobTitle,

    /// Priority is negative, NaN or infinite
    #[error("job priority must be a finite non-negative number, got {0}")]
    InvalidPriority(String),

    /// A task has an empty title
    #[error("task under {parent:?} has an empty title")]
    EmptyTaskTitle {
        /// Title of the enclosing task, or the job
        parent: String,
    },

    /// An instance names a task that does not exist
    #[error("instance {target:?} does not match any task")]
    DanglingInstance {
        /// Referenced title or id
        target: String,
    },

    /// An instance names more than one task
    #[error("instance {target:?} is ambiguous: {matches} tasks match")]
    AmbiguousInstance {
        /// Referenced title or id
        target: String,
        /// Number of tasks carrying that title
        matches: usize,
    },

    /// A task is reachable from itself once instances are resolved
    #[error("task {title:?} is its own ancestor")]
    CycleDetected {
        /// Title of a task on the cycle
        title: String,
    },

    /// Two tasks share an id
    #[error("duplicate task id {0:?}")]
    DuplicateTaskId(String),

    /// Two commands share an id
    #[error("duplicate command id {0:?}")]
    DuplicateCommandId(String),

    /// A command has no argument vector
    #[error("command in task {task:?} has an empty argument vector")]
    EmptyCommand {
        /// Owning task title
        task: String,
    },

    /// Resource hints are inverted
    #[error("command in task {task:?} requests atleast {atleast} > atmost {atmost}")]
    InvalidSlots {
        /// Owning task title
        task: String,
        /// Minimum slots
        atleast: u32,
        /// Maximum slots
        atmost: u32,
    },

    /// Iterate loop step is zero
    #[error("iterate over {var:?} has a zero step")]
    ZeroStep {
        /// Loop variable name
        var: String,
    },

    /// Iterate range does not match the sign of its step
    #[error("iterate over {var:?} cannot reach {to} from {from} by {by}")]
    UnreachableRange {
        /// Loop variable name
        var: String,
        /// Start value
        from: i64,
        /// End value
        to: i64,
        /// Step
        by: i64,
    },

    /// Chunking failed while expanding an iterate
    #[error("chunking failed: {0}")]
    Chunk(#[from] ChunkError),
}

impl GraphError {
    /// Check if the error comes from a dangling or ambiguous reference
    #[inline]
    #[must_use]
    pub fn is_reference_error(&self) -> bool {
        matches!(
            self,
            Self::DanglingInstance { .. } | Self::AmbiguousInstance { .. }
        )
    }
}
