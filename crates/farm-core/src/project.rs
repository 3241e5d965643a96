//! Project context derived from a scene path
//!
//! Scenes live at `<root>/<TYPE>/<SHOW>/<PROJECT>/<SCENE>` where `TYPE` is
//! `user_work` or `project_work`. Workers rebuild paths from these parts,
//! so they travel with the job as `KEY=VALUE` env keys.

use crate::error::FarmError;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Work area markers
pub const WORK_TYPES: [&str; 2] = ["user_work", "project_work"];

/// Where a scene sits in the shared tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectContext {
    /// Mount root above the work area
    pub root: PathBuf,
    /// `user_work` or `project_work`
    pub work_type: String,
    /// Show, the owner directory inside the work area
    pub show: String,
    /// Maya project directory name
    pub project: String,
    /// Scene path relative to the project
    pub scene: String,
    /// Scene file name without extension
    pub scene_name: String,
}

impl ProjectContext {
    /// Split a scene path around its work area marker
    ///
    /// # Errors
    /// [`FarmError::InvalidScenePath`] when no marker is found or the path
    /// stops before a scene file.
    pub fn from_scene_path(path: &Path) -> Result<Self, FarmError> {
        let invalid = || FarmError::InvalidScenePath {
            path: path.to_path_buf(),
        };

        let parts: Vec<Component<'_>> = path.components().collect();
        let marker = parts
            .iter()
            .position(|c| matches!(c, Component::Normal(name) if name.to_str().is_some_and(|n| WORK_TYPES.contains(&n))))
            .ok_or_else(invalid)?;

        let names: Vec<String> = parts[marker..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if names.len() < 4 {
            return Err(invalid());
        }

        let scene = names[3..].join("/");
        let scene_name = Path::new(&names[names.len() - 1])
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(invalid)?;

        Ok(Self {
            root: parts[..marker].iter().collect(),
            work_type: names[0].clone(),
            show: names[1].clone(),
            project: names[2].clone(),
            scene,
            scene_name,
        })
    }

    /// Project directory
    #[must_use]
    pub fn project_path(&self) -> PathBuf {
        self.root.join(&self.work_type).join(&self.show).join(&self.project)
    }

    /// Full scene file path
    #[must_use]
    pub fn scene_path(&self) -> PathBuf {
        self.project_path().join(&self.scene)
    }

    /// Per-scene RenderMan output directory
    #[must_use]
    pub fn renderman_path(&self) -> PathBuf {
        self.project_path().join("renderman").join(&self.scene_name)
    }

    /// Env keys carrying this context to workers
    #[must_use]
    pub fn env_keys(&self) -> Vec<String> {
        vec![
            format!("TYPE={}", self.work_type),
            format!("SHOW={}", self.show),
            format!("PROJECT={}", self.project),
            format!("SCENE={}", self.scene),
            format!("SCENENAME={}", self.scene_name),
        ]
    }
}
