//! Filesystem primitives for memory artifacts.
//!
//! # Responsibility
//! - Resolve per-memory directory and artifact paths under the blob root.
//! - Provide create/write/read/move/remove/list primitives.
//!
//! # Invariants
//! - Every primitive is independently fallible and reports the failing path.
//! - No internal locking: callers serialize operations per memory.

use crate::blob::naming::{
    directory_name, ARTIFACT_FILE_NAMES, CONFIG_DIRECTORY_NAME, ORIGINAL_FILE_NAME,
    PREVIEW_FILE_NAME, SIDECAR_FILE_NAME, THUMBNAIL_FILE_NAME,
};
use crate::model::memory::Memory;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub type FsResult<T> = Result<T, FileSystemError>;

/// Blob-store failure with the operation and path involved.
#[derive(Debug)]
pub enum FileSystemError {
    /// `write_file` without overwrite hit an existing file.
    AlreadyExists(PathBuf),
    Io {
        op: &'static str,
        path: PathBuf,
        source: io::Error,
    },
}

impl FileSystemError {
    fn io(op: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Returns whether the underlying cause is a missing path.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

impl Display for FileSystemError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyExists(path) => write!(f, "file already exists: {}", path.display()),
            Self::Io { op, path, source } => {
                write!(f, "{op} failed for {}: {source}", path.display())
            }
        }
    }
}

impl Error for FileSystemError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::AlreadyExists(_) => None,
            Self::Io { source, .. } => Some(source),
        }
    }
}

/// Paths of the four artifacts inside one memory directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub directory: PathBuf,
    pub original: PathBuf,
    pub preview: PathBuf,
    pub thumbnail: PathBuf,
    pub sidecar: PathBuf,
}

impl ArtifactPaths {
    pub fn in_directory(directory: impl Into<PathBuf>) -> Self {
        let directory = directory.into();
        Self {
            original: directory.join(ORIGINAL_FILE_NAME),
            preview: directory.join(PREVIEW_FILE_NAME),
            thumbnail: directory.join(THUMBNAIL_FILE_NAME),
            sidecar: directory.join(SIDECAR_FILE_NAME),
            directory,
        }
    }
}

/// Per-memory directory store rooted at `<root>/Memories`.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reserved configuration directory under the root.
    pub fn config_dir(&self) -> PathBuf {
        self.root.join(CONFIG_DIRECTORY_NAME)
    }

    /// Computed directory of a memory.
    pub fn directory_for(&self, memory: &Memory) -> PathBuf {
        self.root.join(directory_name(memory))
    }

    /// Computed artifact paths of a memory.
    pub fn artifacts_for(&self, memory: &Memory) -> ArtifactPaths {
        ArtifactPaths::in_directory(self.directory_for(memory))
    }

    /// Returns whether `directory` holds every expected artifact. Extra
    /// entries are ignored.
    pub fn is_complete(&self, directory: &Path) -> bool {
        ARTIFACT_FILE_NAMES
            .iter()
            .all(|name| directory.join(name).is_file())
    }

    /// Creates `path` and missing parents. Succeeds if it already exists.
    pub fn create_directory(&self, path: &Path) -> FsResult<()> {
        fs::create_dir_all(path).map_err(|err| FileSystemError::io("create_directory", path, err))
    }

    /// Writes `data` to `path`, creating the parent directory.
    pub fn write_file(&self, data: &[u8], path: &Path, overwrite: bool) -> FsResult<()> {
        if !overwrite && path.exists() {
            return Err(FileSystemError::AlreadyExists(path.to_path_buf()));
        }
        if let Some(parent) = path.parent() {
            self.create_directory(parent)?;
        }
        fs::write(path, data).map_err(|err| FileSystemError::io("write_file", path, err))
    }

    pub fn read_file(&self, path: &Path) -> FsResult<Vec<u8>> {
        fs::read(path).map_err(|err| FileSystemError::io("read_file", path, err))
    }

    /// Moves a file or directory, creating missing parents of `to`.
    pub fn move_entry(&self, from: &Path, to: &Path) -> FsResult<()> {
        if let Some(parent) = to.parent() {
            self.create_directory(parent)?;
        }
        fs::rename(from, to).map_err(|err| FileSystemError::io("move_entry", from, err))
    }

    /// Removes a file or a whole directory tree.
    pub fn remove_entry(&self, path: &Path) -> FsResult<()> {
        let metadata =
            fs::symlink_metadata(path).map_err(|err| FileSystemError::io("remove_entry", path, err))?;
        let result = if metadata.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };
        result.map_err(|err| FileSystemError::io("remove_entry", path, err))
    }

    pub fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    /// Lists direct children of `path`, sorted by path.
    pub fn list_directory(&self, path: &Path) -> FsResult<Vec<PathBuf>> {
        let entries =
            fs::read_dir(path).map_err(|err| FileSystemError::io("list_directory", path, err))?;
        let mut children = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| FileSystemError::io("list_directory", path, err))?;
            children.push(entry.path());
        }
        children.sort();
        Ok(children)
    }
}
