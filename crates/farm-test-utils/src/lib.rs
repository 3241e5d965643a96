//! Testing utilities for the farm workspace
//!
//! Shared fixtures: sample jobs, scene trees on disk and identity registries.

#![allow(missing_docs)]
#![allow(clippy::missing_panics_doc)]

use farm_graph::{Command, Iterate, Job, Task};
use farm_identity::{FlatFileStore, IdentityRegistry, MemoryStore, StaticDirectory};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub const ALICE_ID: &str = "120988";
pub const ALICE_RAW_NAME: &str = "Alice.Smith";
pub const ALICE_NAME: &str = "alicesmith";
pub const BOB_ID: &str = "120777";
pub const BOB_RAW_NAME: &str = "bob jones";

/// Job rendering frames 1-20 in chunks of 5
pub fn sample_job() -> Job {
    let frames = Task::new("Frames ${f}-${f_last}").with_command(Command::new(["prman", "-frames", "${f}", "${f_last}"]));
    Job::new("Render shot 10", 10.0)
        .with_service("PixarRender")
        .with_child(Task::new("Render").with_child(Iterate::new("f", 1, 20, 5, frames).with_max_chunks(100)))
}

/// Directory knowing Alice and Bob
pub fn directory() -> StaticDirectory {
    StaticDirectory::new()
        .with_entry(ALICE_ID, ALICE_RAW_NAME)
        .with_entry(BOB_ID, BOB_RAW_NAME)
}

/// Registry over [`directory`] and an empty in-memory store
pub fn memory_registry() -> (IdentityRegistry, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (IdentityRegistry::new(Arc::new(directory()), store.clone()), store)
}

/// Registry over [`directory`] and a registry file under `mount`
pub fn file_registry(mount: &Path) -> IdentityRegistry {
    let store = FlatFileStore::new(mount, "usr/map/user_map").require_mount_point(false);
    IdentityRegistry::new(Arc::new(directory()), Arc::new(store))
}

/// A temporary mount holding one scene file
pub struct SceneTree {
    pub mount: TempDir,
    pub scene: PathBuf,
}

impl SceneTree {
    /// `<mount>/user_work/alicesmith/shot10/scenes/shot10.ma`
    pub fn new() -> Self {
        let mount = tempfile::tempdir().unwrap();
        let scenes = mount.path().join("user_work").join(ALICE_NAME).join("shot10").join("scenes");
        std::fs::create_dir_all(&scenes).unwrap();
        let scene = scenes.join("shot10.ma");
        std::fs::write(&scene, "//Maya ASCII scene\n").unwrap();
        Self { mount, scene }
    }

    pub fn root(&self) -> &Path {
        self.mount.path()
    }
}

impl Default for SceneTree {
    fn default() -> Self {
        Self::new()
    }
}
