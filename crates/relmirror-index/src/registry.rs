//! In-memory index with atomic JSON persistence.
//!
//! # Design
//! - One mutex guards the whole tree; every read and write goes through it.
//! - `BTreeMap` keeps key order stable so persisted documents diff cleanly.
//! - Persisting writes a sibling temp file, syncs it, then renames it over the
//!   destination. A crash mid-write leaves the previous document intact.

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{IndexError, IndexResult};

/// Nested mapping `project -> version -> filename -> url`.
pub type IndexTree = BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>>;

/// A single mirrored asset and the public URL it is served from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorRecord {
    /// Project (repository) name.
    pub project: String,
    /// Release tag.
    pub version: String,
    /// Asset filename.
    pub filename: String,
    /// Public download URL in object storage.
    pub url: String,
}

impl MirrorRecord {
    /// Build a record from its parts.
    #[must_use]
    pub fn new(
        project: impl Into<String>,
        version: impl Into<String>,
        filename: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            version: version.into(),
            filename: filename.into(),
            url: url.into(),
        }
    }
}

/// Effect of recording an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordChange {
    /// The key was not present before.
    Inserted,
    /// The key was present with the same URL.
    Unchanged,
    /// The key was present with a different URL, which was replaced.
    Replaced {
        /// URL stored before the update.
        previous: String,
    },
}

/// Registry of mirrored assets.
#[derive(Debug, Default)]
pub struct Index {
    entries: Mutex<IndexTree>,
}

impl Index {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing tree.
    #[must_use]
    pub const fn from_tree(tree: IndexTree) -> Self {
        Self {
            entries: Mutex::new(tree),
        }
    }

    /// Load the index persisted at `path`.
    ///
    /// A missing file, an empty file, or a JSON `null` document all yield an
    /// empty index so the first run can bootstrap.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Corrupt`] when the document is not a JSON object
    /// of the expected shape and [`IndexError::Unreadable`] when it exists but
    /// cannot be read.
    pub fn load(path: &Path) -> IndexResult<Self> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "index document missing; starting empty");
                return Ok(Self::new());
            }
            Err(source) => {
                return Err(IndexError::Unreadable {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::from_slice(&bytes).map_err(|source| IndexError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
    }

    fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::new());
        }
        let tree: Option<IndexTree> = serde_json::from_slice(bytes)?;
        Ok(Self::from_tree(tree.unwrap_or_default()))
    }

    /// Exact, case-sensitive lookup across all three levels.
    #[must_use]
    pub fn contains(&self, project: &str, version: &str, filename: &str) -> bool {
        self.get(project, version, filename).is_some()
    }

    /// URL recorded for the key, if any.
    #[must_use]
    pub fn get(&self, project: &str, version: &str, filename: &str) -> Option<String> {
        self.lock()
            .get(project)
            .and_then(|versions| versions.get(version))
            .and_then(|files| files.get(filename))
            .cloned()
    }

    /// Insert or overwrite the leaf entry, creating intermediate levels.
    pub fn record(&self, record: MirrorRecord) -> RecordChange {
        let MirrorRecord {
            project,
            version,
            filename,
            url,
        } = record;
        let mut entries = self.lock();
        let files = entries
            .entry(project.clone())
            .or_default()
            .entry(version.clone())
            .or_default();
        match files.insert(filename.clone(), url.clone()) {
            None => RecordChange::Inserted,
            Some(previous) if previous == url => RecordChange::Unchanged,
            Some(previous) => {
                warn!(
                    project = %project,
                    version = %version,
                    filename = %filename,
                    previous = %previous,
                    url = %url,
                    "replacing recorded url"
                );
                RecordChange::Replaced { previous }
            }
        }
    }

    /// Number of recorded assets across all projects and versions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock()
            .values()
            .flat_map(BTreeMap::values)
            .map(BTreeMap::len)
            .sum()
    }

    /// Returns `true` when no asset is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the full tree.
    #[must_use]
    pub fn snapshot(&self) -> IndexTree {
        self.lock().clone()
    }

    /// Serialise the index and atomically replace the document at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Serialize`] if encoding fails and
    /// [`IndexError::Io`] if the temporary file cannot be written or renamed.
    pub fn persist(&self, path: &Path) -> IndexResult<()> {
        let mut payload = {
            let entries = self.lock();
            serde_json::to_vec_pretty(&*entries)
                .map_err(|source| IndexError::Serialize { source })?
        };
        payload.push(b'\n');

        let parent = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|source| IndexError::io("create_dir", parent, source))?;

        let mut scratch = tempfile::Builder::new()
            .prefix(".relmirror-index-")
            .suffix(".tmp")
            .tempfile_in(parent)
            .map_err(|source| IndexError::io("create_temp", parent, source))?;
        scratch
            .write_all(&payload)
            .map_err(|source| IndexError::io("write_temp", scratch.path(), source))?;
        scratch
            .as_file()
            .sync_all()
            .map_err(|source| IndexError::io("sync_temp", scratch.path(), source))?;
        set_document_permissions(scratch.as_file(), scratch.path())?;

        scratch
            .persist(path)
            .map_err(|err| IndexError::io("rename", path, err.error))?;
        debug!(path = %path.display(), bytes = payload.len(), "index persisted");
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, IndexTree> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(unix)]
fn set_document_permissions(file: &fs::File, path: &Path) -> IndexResult<()> {
    use std::os::unix::fs::PermissionsExt;

    file.set_permissions(fs::Permissions::from_mode(0o644))
        .map_err(|source| IndexError::io("set_permissions", path, source))
}

#[cfg(not(unix))]
fn set_document_permissions(_file: &fs::File, _path: &Path) -> IndexResult<()> {
    Ok(())
}
