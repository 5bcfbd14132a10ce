//! Store configuration.
//!
//! # Responsibility
//! - Resolve the root directory and every derived store path.
//! - Carry rendering and open-failure settings into the facade.
//!
//! # Invariants
//! - Derived paths are computed from `root_dir`, never stored separately.

use crate::blob::naming::CONFIG_DIRECTORY_NAME;
use crate::blob::render::RenderOptions;
use crate::db::OpenFailurePolicy;
use directories::ProjectDirs;
use std::path::PathBuf;

/// Environment variable overriding the root directory.
pub const ROOT_ENV_VAR: &str = "REMEMBER_HOME";

const MEMORIES_DIR_NAME: &str = "Memories";
const LEGACY_IMAGES_DIR_NAME: &str = "Images";
const DATABASE_DIR_NAME: &str = "db";
const DATABASE_FILE_NAME: &str = "database.sqlite";

#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// Documents-like root holding `Memories/` and any legacy layout.
    pub root_dir: PathBuf,
    pub thumbnail_side: u32,
    pub display_scale: f64,
    pub jpeg_quality: u8,
    pub open_failure_policy: OpenFailurePolicy,
}

impl StoreConfig {
    /// Configuration rooted at `root_dir` with default settings.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        let render = RenderOptions::default();
        Self {
            root_dir: root_dir.into(),
            thumbnail_side: render.thumbnail_side,
            display_scale: render.display_scale,
            jpeg_quality: render.jpeg_quality,
            open_failure_policy: OpenFailurePolicy::for_build(),
        }
    }

    /// Resolves the root from `REMEMBER_HOME`, then the platform data dir.
    ///
    /// Returns `None` when neither is available.
    pub fn from_env() -> Option<Self> {
        if let Ok(raw) = std::env::var(ROOT_ENV_VAR) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return Some(Self::new(trimmed));
            }
        }
        ProjectDirs::from("com", "remember", "remember")
            .map(|dirs| Self::new(dirs.data_dir()))
    }

    pub fn with_display_scale(mut self, display_scale: f64) -> Self {
        self.display_scale = display_scale;
        self
    }

    pub fn with_open_failure_policy(mut self, policy: OpenFailurePolicy) -> Self {
        self.open_failure_policy = policy;
        self
    }

    /// Blob root: `<root>/Memories`.
    pub fn memories_dir(&self) -> PathBuf {
        self.root_dir.join(MEMORIES_DIR_NAME)
    }

    /// Reserved `<root>/Memories/.config`.
    pub fn config_dir(&self) -> PathBuf {
        self.memories_dir().join(CONFIG_DIRECTORY_NAME)
    }

    pub fn database_path(&self) -> PathBuf {
        self.config_dir()
            .join(DATABASE_DIR_NAME)
            .join(DATABASE_FILE_NAME)
    }

    /// Pre-directory database location, `<root>/database.sqlite`.
    pub fn legacy_database_path(&self) -> PathBuf {
        self.root_dir.join(DATABASE_FILE_NAME)
    }

    /// Flat image folder of the legacy layout, `<root>/Images`.
    pub fn legacy_images_dir(&self) -> PathBuf {
        self.root_dir.join(LEGACY_IMAGES_DIR_NAME)
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            thumbnail_side: self.thumbnail_side,
            display_scale: self.display_scale,
            jpeg_quality: self.jpeg_quality,
        }
    }
}
