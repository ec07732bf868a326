//! State persistence with file locking.
//!
//! Every document the system keeps on disk (the progression cache, the task
//! catalog, the schedule grid, the pending handoff) goes through
//! [`load_document`] and [`save_document`]: shared lock for reads,
//! temp file + fsync + rename for writes. A missing or corrupted document
//! reads back as its default.
//!
//! Progression snapshots additionally sit behind the [`StatsStore`] port so
//! the tracker can run against memory in tests.
//!
//! Per-file locks only cover a single read or write. A whole
//! load → mutate → save cycle runs under a [`SessionLock`] on the data
//! directory.

use crate::{Error, ProgressionState, Result};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cell::RefCell;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Load a JSON document with shared locking
///
/// Returns `None` if the file doesn't exist, can't be read, or doesn't parse.
/// Unreadable files are logged as warnings.
pub fn load_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        tracing::debug!("No document at {:?}", path);
        return Ok(None);
    }

    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!("Unable to open {:?}: {}. Using defaults.", path, e);
            return Ok(None);
        }
    };

    // Acquire shared lock for reading
    if let Err(e) = file.lock_shared() {
        tracing::warn!("Unable to lock {:?}: {}. Using defaults.", path, e);
        return Ok(None);
    }

    let mut contents = String::new();
    let mut reader = std::io::BufReader::new(&file);
    if let Err(e) = reader.read_to_string(&mut contents) {
        let _ = file.unlock();
        tracing::warn!("Failed to read {:?}: {}. Using defaults.", path, e);
        return Ok(None);
    }

    file.unlock()?;

    match serde_json::from_str::<T>(&contents) {
        Ok(value) => {
            tracing::debug!("Loaded document from {:?}", path);
            Ok(Some(value))
        }
        Err(e) => {
            tracing::warn!("Failed to parse {:?}: {}. Using defaults.", path, e);
            Ok(None)
        }
    }
}

/// Save a JSON document with exclusive locking
///
/// Atomically writes by:
/// 1. Writing to a temp file in the same directory
/// 2. Syncing to disk
/// 3. Renaming over the original
pub fn save_document<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::State(format!("{:?} has no parent directory", path)))?;
    std::fs::create_dir_all(parent)?;

    let temp = NamedTempFile::new_in(parent)?;
    temp.as_file().lock_exclusive()?;

    {
        let mut writer = std::io::BufWriter::new(temp.as_file());
        let contents = serde_json::to_string(value)?;
        writer.write_all(contents.as_bytes())?;
        writer.flush()?;
    }

    temp.as_file().sync_all()?;
    temp.as_file().unlock()?;

    temp.persist(path).map_err(|e| Error::Io(e.error))?;

    tracing::debug!("Saved document to {:?}", path);
    Ok(())
}

/// Advisory lock over a data directory, held for one command
///
/// Exclusive sessions are serialized against each other and against shared
/// ones. The lock is released when the value is dropped.
#[derive(Debug)]
pub struct SessionLock {
    file: File,
}

impl SessionLock {
    /// File name of the lock inside the data directory
    pub const FILE_NAME: &'static str = ".session.lock";

    /// Block until no other session holds the directory
    pub fn exclusive(data_dir: &Path) -> Result<Self> {
        let file = Self::open(data_dir)?;
        file.lock_exclusive()?;
        tracing::debug!("Holding exclusive session lock in {:?}", data_dir);
        Ok(Self { file })
    }

    /// Block until no exclusive session holds the directory
    pub fn shared(data_dir: &Path) -> Result<Self> {
        let file = Self::open(data_dir)?;
        file.lock_shared()?;
        tracing::debug!("Holding shared session lock in {:?}", data_dir);
        Ok(Self { file })
    }

    fn open(data_dir: &Path) -> Result<File> {
        std::fs::create_dir_all(data_dir)?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(data_dir.join(Self::FILE_NAME))?;
        Ok(file)
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Persistence port for progression snapshots
pub trait StatsStore {
    /// Last saved snapshot, or `None` if nothing usable is stored
    fn load(&self) -> Result<Option<ProgressionState>>;

    fn save(&self, state: &ProgressionState) -> Result<()>;
}

/// Local cache file holding the latest snapshot
#[derive(Clone, Debug)]
pub struct FileStatsStore {
    path: PathBuf,
}

impl FileStatsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StatsStore for FileStatsStore {
    fn load(&self) -> Result<Option<ProgressionState>> {
        load_document(&self.path)
    }

    fn save(&self, state: &ProgressionState) -> Result<()> {
        save_document(&self.path, state)
    }
}

/// In-memory store, mainly for tests
#[derive(Debug, Default)]
pub struct MemoryStatsStore {
    state: RefCell<Option<ProgressionState>>,
    saves: RefCell<usize>,
}

impl MemoryStatsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `save` calls so far
    pub fn save_count(&self) -> usize {
        *self.saves.borrow()
    }
}

impl StatsStore for MemoryStatsStore {
    fn load(&self) -> Result<Option<ProgressionState>> {
        Ok(self.state.borrow().clone())
    }

    fn save(&self, state: &ProgressionState) -> Result<()> {
        *self.state.borrow_mut() = Some(state.clone());
        *self.saves.borrow_mut() += 1;
        Ok(())
    }
}
