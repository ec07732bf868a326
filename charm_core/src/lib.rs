#![forbid(unsafe_code)]

//! Core domain model and business logic for ChronoCharm.
//!
//! This crate provides:
//! - Progression engine (experience, levels, attributes, streaks, badges)
//! - Weekly schedule grid with span placement and collision checks
//! - Task catalog and the calendar-to-breakdown handoff
//! - Persistence (state cache, sync outbox)
//! - HTTP client for the ChronoCharm API

pub mod types;
pub mod error;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod store;
pub mod outbox;
pub mod progression;
pub mod tracker;
pub mod schedule;
pub mod planner;
pub mod handoff;
pub mod api;

// Re-export commonly used types
pub use error::{Error, Result, ScheduleError};
pub use types::*;
pub use catalog::{default_tasks, TaskCatalog};
pub use config::{BlockPolicy, Config};
pub use store::{FileStatsStore, MemoryStatsStore, SessionLock, StatsStore};
pub use outbox::{JsonlOutbox, SyncEvent, SyncPayload, SyncSink};
pub use progression::{add_experience, complete_for_day, ProgressionEvent, Transition};
pub use tracker::ProgressTracker;
pub use schedule::{Assignment, OrganizeReport, ScheduleGrid, SkipReason, Slot, SlotState};
pub use planner::plan_sequential;
pub use handoff::PendingHandoff;
pub use api::ApiClient;
