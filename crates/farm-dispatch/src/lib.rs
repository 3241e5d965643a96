//! Farm Dispatch - hands finalized job graphs to the farm engine
//!
//! [`DispatchClient`] runs build, validate and submit in order under one
//! deadline. Engines sit behind [`DispatchEngine`]: [`TcpEngine`] speaks a
//! line protocol, [`InMemoryEngine`] keeps jobs locally.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use farm_dispatch::{DispatchAction, DispatchClient, DispatchConfig, InMemoryEngine};
//! use farm_graph::{Command, Job, Task};
//!
//! # tokio_test_block(async {
//! let engine = Arc::new(InMemoryEngine::new());
//! let client = DispatchClient::new(engine.clone(), DispatchConfig::default());
//!
//! let job = Job::new("Preview", 10.0)
//!     .with_child(Task::new("Frame 1").with_command(Command::new(["prman", "f1.rib"])));
//! let outcome = client.run(job, DispatchAction::Submit, None).await.unwrap();
//!
//! assert!(outcome.job_id.is_some());
//! assert_eq!(engine.jobs().len(), 1);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

pub mod client;
pub mod engine;
pub mod error;
pub mod tcp;

pub use client::{BuiltJob, DispatchAction, DispatchClient, DispatchConfig, DispatchOutcome};
pub use engine::{DispatchEngine, InMemoryEngine, JobId, SpooledJob};
pub use error::{DispatchError, DispatchStep, EngineError};
pub use tcp::TcpEngine;
