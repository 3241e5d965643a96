//! Farm Env - worker-side environment handler chain
//!
//! Commands carry env keys such as `maya2016`, `rms-20.2-maya-2016` or
//! `SHOW=alice`. Right before a command runs, the [`EnvironmentChain`]
//! resolves each key to a handler through the [`HandlerRegistry`] and lets
//! the handlers rewrite the command's [`Environment`] and argument vector.
//!
//! ```rust
//! use farm_env::handlers::{ProjectHandler, RendermanHandler};
//! use farm_env::{Environment, EnvironmentChain, HandlerRegistry, Platform, WorkerContext};
//! use farm_graph::Command;
//!
//! let registry = HandlerRegistry::new()
//!     .with(RendermanHandler::default())
//!     .with(ProjectHandler);
//! let chain = EnvironmentChain::new(registry);
//!
//! let cmd = Command::new(["render", "frame.rib"])
//!     .with_envkeys(["rms-20.2-maya-2016", "SHOW=alice"]);
//! let worker = WorkerContext::new("render01", Platform::Linux);
//! let prepared = chain.prepare(&cmd, &Environment::new(), &worker).unwrap();
//!
//! assert_eq!(prepared.argv[0], "/opt/pixar/RenderManProServer-20.2/bin/prman");
//! ```

pub mod chain;
pub mod environment;
pub mod error;
pub mod handler;
pub mod handlers;
pub mod registry;
pub mod worker;

pub use chain::{EnvironmentChain, PreparedCommand};
pub use environment::Environment;
pub use error::{ChainError, HandlerError};
pub use handler::EnvHandler;
pub use registry::HandlerRegistry;
pub use worker::{Platform, WorkerContext};
