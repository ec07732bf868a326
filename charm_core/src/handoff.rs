//! Pending task handoff from the calendar to the breakdown flow.
//!
//! Picking "break this down" on a task writes a small record; the next
//! breakdown run consumes it. Records older than the TTL are discarded.

use crate::store::{load_document, save_document};
use crate::{Result, TaskRef};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PendingHandoff {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl PendingHandoff {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            created_at,
        }
    }

    pub fn from_task(task: &TaskRef, created_at: DateTime<Utc>) -> Self {
        Self::new(task.title.clone(), task.description.clone(), created_at)
    }

    /// Text sent to the breakdown service
    pub fn assignment_text(&self) -> String {
        if self.description.is_empty() {
            self.title.clone()
        } else {
            format!("{}: {}", self.title, self.description)
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.created_at > ttl
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        save_document(path, self)
    }

    /// Consume the stored handoff
    ///
    /// The record is removed whether or not it is still fresh; only a fresh
    /// record is returned.
    pub fn take(path: &Path, now: DateTime<Utc>, ttl: Duration) -> Result<Option<Self>> {
        let pending: Option<Self> = load_document(path)?;
        if path.exists() {
            std::fs::remove_file(path)?;
        }

        Ok(match pending {
            Some(handoff) if handoff.is_expired(now, ttl) => {
                tracing::info!("Discarding stale handoff for '{}'", handoff.title);
                None
            }
            other => other,
        })
    }
}
