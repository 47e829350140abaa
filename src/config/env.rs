//! Environment variable settings.
//!
//! Settings are read from the process environment (a `.env` file is loaded
//! first by `main`):
//! - `DISCORD_TOKEN` - Discord bot token
//! - `MIRRORBOT_DISCORD_TOKEN` - overrides `DISCORD_TOKEN` when set
//! - `MIRRORBOT_CONFIG` - channel mapping file (default `config.json`)
//! - `MIRRORBOT_HISTORY_SIZE` - remembered messages for deletion notices

use std::env;

use crate::common::error::ConfigError;
use crate::config::types::Settings;

/// Environment variable prefix for all settings overrides.
const ENV_PREFIX: &str = "MIRRORBOT";

/// Unprefixed token variable, kept for `.env` files written for other bots.
const TOKEN_VAR: &str = "DISCORD_TOKEN";

/// Apply environment variable overrides to settings.
pub fn apply_env_overrides(settings: Settings) -> Result<Settings, ConfigError> {
    apply_overrides_from(settings, |name| env::var(name).ok())
}

/// Apply overrides using an arbitrary variable lookup.
fn apply_overrides_from<F>(mut settings: Settings, lookup: F) -> Result<Settings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(token) = lookup(TOKEN_VAR) {
        settings.discord_token = token;
    }
    if let Some(token) = lookup(&format!("{}_DISCORD_TOKEN", ENV_PREFIX)) {
        settings.discord_token = token;
    }

    if let Some(path) = lookup(&format!("{}_CONFIG", ENV_PREFIX)) {
        if !path.trim().is_empty() {
            settings.config_path = path;
        }
    }

    let history_var = format!("{}_HISTORY_SIZE", ENV_PREFIX);
    if let Some(size) = lookup(&history_var) {
        settings.history_size = size.trim().parse().map_err(|_| ConfigError::InvalidValue {
            field: history_var.clone(),
            message: format!("expected a non-negative integer, got '{}'", size),
        })?;
    }

    Ok(settings)
}

/// Load settings from defaults plus the environment.
pub fn load_settings() -> Result<Settings, ConfigError> {
    apply_env_overrides(Settings::default())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::config::types::{DEFAULT_CONFIG_PATH, DEFAULT_HISTORY_SIZE};

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_env_prefix() {
        assert_eq!(ENV_PREFIX, "MIRRORBOT");
    }

    #[test]
    fn test_no_vars_keeps_defaults() {
        let settings = apply_overrides_from(Settings::default(), lookup_from(&[])).unwrap();
        assert!(settings.discord_token.is_empty());
        assert_eq!(settings.config_path, DEFAULT_CONFIG_PATH);
        assert_eq!(settings.history_size, DEFAULT_HISTORY_SIZE);
    }

    #[test]
    fn test_prefixed_token_wins() {
        let lookup = lookup_from(&[
            ("DISCORD_TOKEN", "plain"),
            ("MIRRORBOT_DISCORD_TOKEN", "prefixed"),
        ]);
        let settings = apply_overrides_from(Settings::default(), lookup).unwrap();
        assert_eq!(settings.discord_token, "prefixed");
    }

    #[test]
    fn test_config_path_and_history() {
        let lookup = lookup_from(&[
            ("DISCORD_TOKEN", "abc"),
            ("MIRRORBOT_CONFIG", "/var/lib/mirrorbot/mapping.json"),
            ("MIRRORBOT_HISTORY_SIZE", "25"),
        ]);
        let settings = apply_overrides_from(Settings::default(), lookup).unwrap();
        assert_eq!(settings.config_path, "/var/lib/mirrorbot/mapping.json");
        assert_eq!(settings.history_size, 25);
    }

    #[test]
    fn test_blank_config_path_ignored() {
        let lookup = lookup_from(&[("MIRRORBOT_CONFIG", "  ")]);
        let settings = apply_overrides_from(Settings::default(), lookup).unwrap();
        assert_eq!(settings.config_path, DEFAULT_CONFIG_PATH);
    }

    #[test]
    fn test_invalid_history_size_fails() {
        let lookup = lookup_from(&[("MIRRORBOT_HISTORY_SIZE", "lots")]);
        let result = apply_overrides_from(Settings::default(), lookup);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("MIRRORBOT_HISTORY_SIZE"));
    }
}
