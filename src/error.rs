//! Error types for level loading, demo I/O and settings

use thiserror::Error;

/// Failure to bring a level into play
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("level '{0}' has no ball spawn")]
    NoBall(String),

    #[error("level '{name}' is invalid: {reason}")]
    InvalidLevel { name: String, reason: String },

    #[error("player slot {slot} failed to load: {source}")]
    Slot {
        slot: usize,
        #[source]
        source: Box<LoadError>,
    },
}

/// Failure while writing or reading a recorded command stream
#[derive(Debug, Error)]
pub enum DemoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Failure to read or write the settings file
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings format: {0}")]
    Json(#[from] serde_json::Error),
}
