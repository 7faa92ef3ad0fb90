//! Error types for the feed controller, its capabilities and settings.

use thiserror::Error;

/// Failure reported by one of the backend capabilities.
///
/// None of these are fatal to the feed; callers log them and degrade to
/// "no visible change" or a placeholder image.
#[derive(Error, Debug)]
pub enum CapabilityError {
    /// Transport-level failure talking to the hosted service.
    #[error("Network error: {0}")]
    Network(String),

    /// The referenced object or record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A reference or URL could not be parsed.
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// The service refused the request.
    #[error("Rejected: {0}")]
    Rejected(String),

    /// HTTP client error from a direct image fetch.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Errors returned by [`crate::controller::MessageFeedController`] calls.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum FeedError {
    #[error("Feed is already subscribed")]
    AlreadySubscribed,

    /// The backend thread has exited and no longer accepts actions.
    #[error("Backend is gone")]
    BackendGone,
}

/// Errors produced while loading or saving [`crate::config::Settings`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to determine a platform config directory.
    #[error("Could not determine configuration directory")]
    NoConfigDir,
}

/// Convenience alias for capability results.
pub type CapabilityResult<T> = std::result::Result<T, CapabilityError>;
