//! Core domain types for ChronoCharm.
//!
//! This module defines the fundamental types used throughout the system:
//! - Tasks (the unit that gets wagered on and scheduled)
//! - Attributes and the RPG progression state
//! - The wire snapshot exchanged with the stats API

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// Task Types
// ============================================================================

/// Identifier of a task in the catalog and on the grid
pub type TaskId = String;

/// A wagerable micro-task
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskRef {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub duration_minutes: u32,
    /// Points risked when starting the task
    pub stake: u32,
    /// Points awarded on success
    pub bounty: u32,
    #[serde(default)]
    pub completed: bool,
}

impl TaskRef {
    /// Number of consecutive hourly slots this task occupies (never less than one)
    pub fn hours_needed(&self) -> usize {
        (self.duration_minutes as usize).div_ceil(60).max(1)
    }

    /// Human-readable duration, e.g. "45 min", "1 hour", "1.5 hours"
    pub fn estimated_time(&self) -> String {
        let minutes = self.duration_minutes;
        if minutes < 60 {
            return format!("{} min", minutes);
        }
        if minutes % 60 == 0 {
            let hours = minutes / 60;
            return format!("{} hour{}", hours, if hours == 1 { "" } else { "s" });
        }
        format!("{:.1} hours", minutes as f64 / 60.0)
    }
}

// ============================================================================
// Attribute Types
// ============================================================================

/// Upper bound for every attribute
pub const ATTRIBUTE_MAX: u8 = 100;

/// Starting value for every attribute
pub const ATTRIBUTE_DEFAULT: u8 = 10;

/// One of the three RPG traits
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Endurance,
    Focus,
    Magic,
}

impl Attribute {
    pub const ALL: [Attribute; 3] = [Attribute::Endurance, Attribute::Focus, Attribute::Magic];
}

/// The three trait counters, each held within `0..=ATTRIBUTE_MAX`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Attributes {
    endurance: u8,
    focus: u8,
    magic: u8,
}

impl Attributes {
    /// Build attributes, clamping each value into range
    pub fn new(endurance: i64, focus: i64, magic: i64) -> Self {
        Self {
            endurance: clamp_attribute(endurance),
            focus: clamp_attribute(focus),
            magic: clamp_attribute(magic),
        }
    }

    pub fn endurance(&self) -> u8 {
        self.endurance
    }

    pub fn focus(&self) -> u8 {
        self.focus
    }

    pub fn magic(&self) -> u8 {
        self.magic
    }

    pub fn get(&self, attribute: Attribute) -> u8 {
        match attribute {
            Attribute::Endurance => self.endurance,
            Attribute::Focus => self.focus,
            Attribute::Magic => self.magic,
        }
    }

    /// Add (or with a negative delta, subtract) points, clamped to `[0, 100]`
    pub fn adjust(&mut self, attribute: Attribute, delta: i64) {
        let slot = match attribute {
            Attribute::Endurance => &mut self.endurance,
            Attribute::Focus => &mut self.focus,
            Attribute::Magic => &mut self.magic,
        };
        *slot = clamp_attribute(*slot as i64 + delta);
    }
}

impl Default for Attributes {
    fn default() -> Self {
        Self {
            endurance: ATTRIBUTE_DEFAULT,
            focus: ATTRIBUTE_DEFAULT,
            magic: ATTRIBUTE_DEFAULT,
        }
    }
}

fn clamp_attribute(value: i64) -> u8 {
    value.clamp(0, ATTRIBUTE_MAX as i64) as u8
}

// ============================================================================
// Progression State
// ============================================================================

/// Streak lengths that unlock a badge, with the badge name
pub const STREAK_BADGES: [(u32, &str); 3] = [
    (7, "7-Day Streak"),
    (30, "30-Day Streak"),
    (100, "100-Day Streak"),
];

/// Titles by level; levels past the end keep the last title
pub const LEVEL_TITLES: [&str; 10] = [
    "First Year",
    "Second Year",
    "Third Year",
    "Fourth Year",
    "Fifth Year",
    "Prefect",
    "Head Student",
    "Auror",
    "Wizard Extraordinaire",
    "Master of Tasks",
];

/// A user's RPG stats.
///
/// Level, experience needed for the next level, and title are derived from
/// `experience_points` on demand and never stored, see
/// [`crate::progression`] for the formulas.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(from = "StatsSnapshot", into = "StatsSnapshot")]
pub struct ProgressionState {
    pub experience_points: u64,
    pub attributes: Attributes,
    pub badges: BTreeSet<String>,
    pub current_streak: u32,
    pub last_completed_date: Option<NaiveDate>,
}

/// Snapshot of [`ProgressionState`] as exchanged with the stats API and the
/// local cache.
///
/// The derived fields are written out for consumers but ignored on read.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    #[serde(default = "default_attribute")]
    pub endurance: i64,
    #[serde(default = "default_attribute")]
    pub focus: i64,
    #[serde(default = "default_attribute")]
    pub magic: i64,
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default)]
    pub xp: u64,
    #[serde(default)]
    pub xp_to_next_level: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub badges: Vec<String>,
    // The remote store does not keep streak fields. They travel together:
    // no currentStreak means the sender knows nothing about streaks.
    #[serde(default)]
    pub current_streak: Option<u32>,
    #[serde(default)]
    pub last_completed_date: Option<NaiveDate>,
}

impl StatsSnapshot {
    /// True when the snapshot carries streak fields
    pub fn has_streak(&self) -> bool {
        self.current_streak.is_some()
    }
}

fn default_attribute() -> i64 {
    ATTRIBUTE_DEFAULT as i64
}

fn default_level() -> u32 {
    1
}

impl From<StatsSnapshot> for ProgressionState {
    fn from(snapshot: StatsSnapshot) -> Self {
        Self {
            experience_points: snapshot.xp,
            attributes: Attributes::new(snapshot.endurance, snapshot.focus, snapshot.magic),
            badges: snapshot.badges.into_iter().collect(),
            current_streak: snapshot.current_streak.unwrap_or(0),
            last_completed_date: snapshot.last_completed_date,
        }
    }
}

impl From<ProgressionState> for StatsSnapshot {
    fn from(state: ProgressionState) -> Self {
        let level = state.level();
        Self {
            endurance: state.attributes.endurance() as i64,
            focus: state.attributes.focus() as i64,
            magic: state.attributes.magic() as i64,
            level,
            xp: state.experience_points,
            xp_to_next_level: state.experience_to_next_level(),
            title: state.title().to_string(),
            badges: state.badges.into_iter().collect(),
            current_streak: Some(state.current_streak),
            last_completed_date: state.last_completed_date,
        }
    }
}
