//! Durable store persisting entries as files on disk
//!
//! Each key is stored as one file in an XDG-compliant cache directory. File
//! names are the SHA-256 digest of the key, so every name has the same short
//! length whatever the key contains. The key itself is kept inside the file
//! next to the value, which is how `list_keys` recovers it.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::durable::{DurableStore, StoreError};

/// Extension of files written by the store
const FILE_EXTENSION: &str = "json";

/// On-disk layout of one stored key
#[derive(Debug, Serialize, Deserialize)]
struct StoredFile {
    key: String,
    data: String,
}

/// Stores each durable key as `<sha256(key)>.json` in a directory
///
/// Uses `~/.cache/sprintcache/` on Linux. Files in the directory that were not
/// written by the store are ignored by `list_keys`.
#[derive(Debug, Clone)]
pub struct FileStore {
    /// Directory where cache files are stored
    dir: PathBuf,
}

impl FileStore {
    /// Creates a FileStore using the XDG-compliant cache directory
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "sprintcache")?;
        let dir = project_dirs.cache_dir().to_path_buf();
        Some(Self { dir })
    }

    /// Creates a FileStore over a specific directory
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the store's files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the path of the file holding `key`
    fn path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir
            .join(format!("{}.{}", hex::encode(digest), FILE_EXTENSION))
    }

    /// Parses a store file, or `None` if it was not written by the store
    fn load(path: &Path) -> Result<Option<StoredFile>, StoreError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&content) {
            Ok(file) => Ok(Some(file)),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "ignoring unreadable store file");
                Ok(None)
            }
        }
    }
}

impl DurableStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        let file = Self::load(&self.path(key))?;
        Ok(file.filter(|f| f.key == key).map(|f| f.data))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let file = StoredFile {
            key: key.to_string(),
            data: value.to_string(),
        };
        let content = serde_json::to_string(&file).map_err(std::io::Error::from)?;
        fs::create_dir_all(&self.dir)?;
        fs::write(self.path(key), content)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().map_or(true, |ext| ext != FILE_EXTENSION) {
                continue;
            }
            if let Some(file) = Self::load(&path)? {
                keys.push(file.key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}
