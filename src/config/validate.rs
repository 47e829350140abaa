//! Settings validation.
//!
//! Validates settings and provides helpful error messages.

use crate::common::error::ConfigError;
use crate::config::types::Settings;

/// Upper bound for the deletion lookup history.
const MAX_HISTORY_SIZE: usize = 100_000;

/// Validate settings and return detailed errors.
pub fn validate_settings(settings: &Settings) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if settings.discord_token.trim().is_empty() {
        errors.push("DISCORD_TOKEN is required".to_string());
    }
    if settings.discord_token == "YOUR_DISCORD_TOKEN_HERE" {
        errors.push("DISCORD_TOKEN has not been configured (still using placeholder)".to_string());
    }
    if settings.discord_token.chars().any(char::is_whitespace) {
        errors.push("DISCORD_TOKEN must not contain whitespace".to_string());
    }

    if settings.config_path.trim().is_empty() {
        errors.push("config path must not be empty".to_string());
    }

    if settings.history_size > MAX_HISTORY_SIZE {
        errors.push(format!(
            "history size must be at most {} (got {})",
            MAX_HISTORY_SIZE, settings.history_size
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            message: errors.join("\n"),
        })
    }
}
