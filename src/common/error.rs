//! Error types for the application.

use thiserror::Error;

/// Startup settings errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    #[error("Settings validation failed: {message}")]
    ValidationError { message: String },
}

/// Channel mapping persistence errors.
///
/// These never leave the store; they are logged and turned into a
/// fallback value or a `false` return.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to access '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed channel mapping in '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize channel mapping: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors from calls into the chat platform.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Channel not found: {channel_id}")]
    ChannelNotFound { channel_id: u64 },

    #[error("Channel {channel_id} is not a guild channel")]
    NotGuildChannel { channel_id: u64 },

    #[cfg(test)]
    #[error("Request rejected: {message}")]
    Rejected { message: String },

    #[error("Serenity error: {0}")]
    Serenity(#[from] serenity::Error),
}

/// Result type alias for platform operations.
pub type PlatformResult<T> = std::result::Result<T, PlatformError>;
