//! Reading position persistence
//!
//! A bookmark pairs a token offset with an opaque scroll position supplied by
//! the front end. It is overwritten on demand and never deleted by the reader.

use crate::{ReaderError, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Persisted resumable position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    /// Offset of the next token to speak
    #[serde(rename = "tok")]
    pub token_offset: usize,

    /// Front-end scroll position at the time of saving
    #[serde(default)]
    pub scroll: f64,
}

impl Bookmark {
    pub fn new(token_offset: usize, scroll: f64) -> Self {
        Self {
            token_offset,
            scroll,
        }
    }
}

/// Storage for the single current bookmark
pub trait BookmarkStore: Send {
    /// Overwrite the stored bookmark
    fn save(&mut self, bookmark: &Bookmark) -> Result<()>;

    /// Read the stored bookmark, None if nothing was saved yet
    fn load(&self) -> Result<Option<Bookmark>>;
}

/// Bookmark kept as a small JSON file
pub struct JsonBookmarkStore {
    path: PathBuf,
}

impl JsonBookmarkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location: ~/.dfreader/bookmark.json
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".dfreader").join("bookmark.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BookmarkStore for JsonBookmarkStore {
    fn save(&mut self, bookmark: &Bookmark) -> Result<()> {
        debug!("Saving bookmark {:?} to {:?}", bookmark, self.path);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string(bookmark)?;
        fs::write(&self.path, json).map_err(|e| {
            ReaderError::Bookmark(format!("Failed to write {}: {}", self.path.display(), e))
        })
    }

    fn load(&self) -> Result<Option<Bookmark>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let raw = fs::read_to_string(&self.path)?;
        match serde_json::from_str::<Option<Bookmark>>(&raw) {
            Ok(bookmark) => Ok(bookmark),
            Err(e) => {
                // A damaged file is treated as "no bookmark", the next save replaces it
                warn!("Ignoring unreadable bookmark {:?}: {}", self.path, e);
                Ok(None)
            }
        }
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    bookmark: Option<Bookmark>,
    writes: usize,
}

/// In-memory bookmark store
///
/// Clones share the same slot, so a caller can keep a handle for inspection
/// after giving one to the sequencer.
#[derive(Debug, Clone, Default)]
pub struct MemoryBookmarkStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryBookmarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Currently stored bookmark
    pub fn current(&self) -> Option<Bookmark> {
        self.lock().bookmark
    }

    /// Number of successful saves
    pub fn writes(&self) -> usize {
        self.lock().writes
    }
}

impl BookmarkStore for MemoryBookmarkStore {
    fn save(&mut self, bookmark: &Bookmark) -> Result<()> {
        let mut inner = self.lock();
        inner.bookmark = Some(*bookmark);
        inner.writes += 1;
        Ok(())
    }

    fn load(&self) -> Result<Option<Bookmark>> {
        Ok(self.lock().bookmark)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_json_store_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = JsonBookmarkStore::new(dir.path().join("bookmark.json"));
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_json_store_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("bookmark.json");
        let mut store = JsonBookmarkStore::new(&path);

        store.save(&Bookmark::new(120, 0.25)).unwrap();
        assert!(path.exists());
        assert_eq!(store.load().unwrap(), Some(Bookmark::new(120, 0.25)));

        store.save(&Bookmark::new(160, 0.5)).unwrap();
        assert_eq!(store.load().unwrap(), Some(Bookmark::new(160, 0.5)));
    }

    #[test]
    fn test_json_store_file_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bookmark.json");
        let mut store = JsonBookmarkStore::new(&path);
        store.save(&Bookmark::new(7, 12.0)).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["tok"], 7);
        assert_eq!(value["scroll"], 12.0);
    }

    #[test]
    fn test_json_store_tolerates_garbage_and_null() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bookmark.json");
        let store = JsonBookmarkStore::new(&path);

        fs::write(&path, "{not json").unwrap();
        assert_eq!(store.load().unwrap(), None);

        fs::write(&path, "null").unwrap();
        assert_eq!(store.load().unwrap(), None);

        // Scroll missing from older files defaults to zero
        fs::write(&path, r#"{"tok": 42}"#).unwrap();
        assert_eq!(store.load().unwrap(), Some(Bookmark::new(42, 0.0)));
    }

    #[test]
    fn test_memory_store_shares_state() {
        let store = MemoryBookmarkStore::new();
        let mut handle = store.clone();

        assert_eq!(store.current(), None);
        handle.save(&Bookmark::new(3, 1.0)).unwrap();
        handle.save(&Bookmark::new(5, 2.0)).unwrap();

        assert_eq!(store.current(), Some(Bookmark::new(5, 2.0)));
        assert_eq!(store.writes(), 2);
    }
}
