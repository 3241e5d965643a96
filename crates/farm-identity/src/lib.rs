//! Farm Identity - account id to farm identity registry
//!
//! Farm users log in with opaque numeric account ids. The registry asks a
//! [`DirectoryService`] for a human name, sanitizes it, and records the
//! pair as an `accountId_displayName` line in a shared [`RegistryStore`].
//!
//! The default [`FlatFileStore`] is read-merge-write without locking:
//! concurrent registrations race and the last writer wins.
//!
//! # Example
//!
//! ```rust
//! use farm_identity::{IdentityRegistry, MemoryStore, StaticDirectory};
//! use std::sync::Arc;
//!
//! let directory = StaticDirectory::new().with_entry("120988", "Alice.Smith");
//! let registry = IdentityRegistry::new(Arc::new(directory), Arc::new(MemoryStore::new()));
//!
//! let name = registry.resolve("120988").unwrap();
//! registry.register("120988", &name).unwrap();
//! assert_eq!(registry.query("1209").unwrap().unwrap().display_name, "alicesmith");
//! ```

pub mod directory;
pub mod environment;
pub mod error;
pub mod record;
pub mod registry;
pub mod session;
pub mod store;

pub use directory::{DirectoryService, LdapSearchDirectory, StaticDirectory};
pub use environment::{IdentityEnvironment, RENDER_HOME, RENDER_NAME, RENDER_NUMBER};
pub use error::IdentityError;
pub use record::{sanitize, IdentityRecord};
pub use registry::{IdentityRegistry, PLACEHOLDER_NAME};
pub use session::{IdentitySession, Registration, SessionState};
pub use store::{FlatFileStore, MemoryStore, RegistryStore};
