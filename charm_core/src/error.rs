//! Error types for the charm_core library.

use std::fmt;
use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for charm_core operations
#[derive(thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote API answered with a non-success status
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Task catalog error
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Rejected grid mutation
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    /// State management error
    #[error("State error: {0}")]
    State(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

// The CLI returns this from `main`, which reports errors with `{:?}`
impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Rejections produced by [`crate::schedule::ScheduleGrid`] mutations.
///
/// Messages name the exact conflict so they can be shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("slot {hour:02}:00 on day {day} is already occupied")]
    SlotOccupied { day: usize, hour: usize },

    #[error(
        "task needs {hours_needed} consecutive free hours starting at \
         {start_hour:02}:00 on day {day}; not enough space"
    )]
    InsufficientSpace {
        day: usize,
        start_hour: usize,
        hours_needed: usize,
    },

    #[error("no slot at day {day}, hour {hour} (days are 0-6, hours 0-23)")]
    OutOfRange { day: usize, hour: usize },
}
