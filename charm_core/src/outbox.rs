//! Sync outbox for pushing state to the remote API.
//!
//! Every progression change is appended to a JSONL (JSON Lines) file with
//! file locking. The caller drains the outbox whenever the network suits it;
//! the engines never wait on the network.

use crate::{Result, StatsSnapshot};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// What needs to be sent
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum SyncPayload {
    /// Full progression snapshot for `POST /stats`
    Stats(StatsSnapshot),
}

/// A pending sync event
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SyncEvent {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub payload: SyncPayload,
}

impl SyncEvent {
    pub fn new(payload: SyncPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            payload,
        }
    }
}

/// Sink trait for queueing sync events
pub trait SyncSink {
    fn append(&mut self, event: &SyncEvent) -> Result<()>;
}

/// JSONL-based outbox with file locking
#[derive(Clone, Debug)]
pub struct JsonlOutbox {
    path: PathBuf,
}

impl JsonlOutbox {
    /// Create a new outbox for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensure the parent directory exists
    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Read pending events without removing them
    pub fn pending(&self) -> Result<Vec<SyncEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        file.lock_shared()?;
        let events = parse_events(BufReader::new(&file))?;
        file.unlock()?;

        Ok(events)
    }

    /// Remove and return every pending event
    ///
    /// The read and the truncate happen under one exclusive lock, so an
    /// event appended concurrently is either returned here or left for the
    /// next drain, never lost.
    pub fn take_all(&self) -> Result<Vec<SyncEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        file.lock_exclusive()?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        let events = parse_events(BufReader::new(contents.as_bytes()))?;

        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.sync_all()?;
        file.unlock()?;

        tracing::debug!("Took {} events from outbox", events.len());
        Ok(events)
    }
}

impl SyncSink for JsonlOutbox {
    fn append(&mut self, event: &SyncEvent) -> Result<()> {
        self.ensure_parent_dir()?;

        // Open file for appending
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        // Acquire exclusive lock
        file.lock_exclusive()?;

        // Write event as JSON line
        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(event)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        file.unlock()?;

        tracing::debug!("Queued sync event {}", event.id);
        Ok(())
    }
}

fn parse_events<R: BufRead>(reader: R) -> Result<Vec<SyncEvent>> {
    let mut events = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<SyncEvent>(&line) {
            Ok(event) => events.push(event),
            Err(e) => {
                tracing::warn!("Failed to parse outbox line {}: {}", line_num + 1, e);
            }
        }
    }

    Ok(events)
}

/// Newest stats snapshot among `events`
///
/// Snapshots carry the whole state, so older ones are superseded and never
/// need to be sent.
pub fn latest_snapshot(events: &[SyncEvent]) -> Option<&StatsSnapshot> {
    events
        .iter()
        .max_by_key(|e| e.created_at)
        .map(|e| match &e.payload {
            SyncPayload::Stats(snapshot) => snapshot,
        })
}
