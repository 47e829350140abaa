//! Channel mapping persistence (JSON file).
//!
//! The store never surfaces failures to its callers: reads fall back to an
//! empty mapping and writes report success as a `bool`.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::common::error::StoreError;
use crate::config::types::{PersistedConfig, RelayConfig};

/// File-backed store for the relay channel mapping.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the mapping, returning an empty one if the file is missing or
    /// malformed.
    pub fn load(&self) -> RelayConfig {
        match self.read() {
            Ok(Some(config)) => config,
            Ok(None) => {
                info!("No channel mapping at {}, starting empty", self.path.display());
                RelayConfig::default()
            }
            Err(e) => {
                error!("Error loading channel mapping: {}", e);
                RelayConfig::default()
            }
        }
    }

    /// Persist the mapping. Returns `false` if it could not be written.
    pub fn save(&self, config: &RelayConfig) -> bool {
        match self.write(config) {
            Ok(()) => {
                info!(
                    sources = config.source_channels.len(),
                    destination = ?config.destination_channel.map(|id| id.get()),
                    "Channel mapping saved"
                );
                true
            }
            Err(e) => {
                error!("Error saving channel mapping: {}", e);
                false
            }
        }
    }

    fn read(&self) -> Result<Option<RelayConfig>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let data = fs::read_to_string(&self.path).map_err(|source| self.io_error(source))?;
        let persisted: PersistedConfig =
            serde_json::from_str(&data).map_err(|source| StoreError::Parse {
                path: self.path.display().to_string(),
                source,
            })?;

        Ok(Some(RelayConfig::from_persisted(persisted)))
    }

    /// Write to a sibling temp file, then rename it over the target.
    fn write(&self, config: &RelayConfig) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
            }
        }

        let data = serde_json::to_string_pretty(&config.to_persisted())?;
        let tmp = self.path.with_extension("json.tmp");

        fs::write(&tmp, data).map_err(|source| self.io_error(source))?;
        if let Err(source) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(self.io_error(source));
        }
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serenity::model::id::ChannelId;

    fn make_config(sources: &[u64], destination: Option<u64>) -> RelayConfig {
        RelayConfig {
            source_channels: sources.iter().copied().map(ChannelId::new).collect(),
            destination_channel: destination.map(ChannelId::new),
        }
    }

    #[test]
    fn test_load_missing_returns_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(tmp.path().join("missing.json"));
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_load_malformed_returns_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let store = ConfigStore::new(&path);
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_load_wrong_shape_returns_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, r#"{ "sourceChannels": "123" }"#).unwrap();

        let store = ConfigStore::new(&path);
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_load_tolerates_missing_fields() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, r#"{ "sourceChannels": ["5", "6"] }"#).unwrap();

        let config = ConfigStore::new(&path).load();
        assert_eq!(config, make_config(&[5, 6], None));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(tmp.path().join("config.json"));

        for config in [
            make_config(&[], None),
            make_config(&[3, 1, 2], Some(9)),
            make_config(&[1], Some(1)),
        ] {
            assert!(store.save(&config));
            assert_eq!(store.load(), config);
        }
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(tmp.path().join("nested/dir/config.json"));

        assert!(store.save(&make_config(&[4], None)));
        assert_eq!(store.load(), make_config(&[4], None));
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(tmp.path().join("config.json"));

        assert!(store.save(&make_config(&[4], Some(5))));
        assert!(!tmp.path().join("config.json.tmp").exists());
    }

    #[test]
    fn test_save_failure_returns_false() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, "file in the way").unwrap();

        let store = ConfigStore::new(blocker.join("config.json"));
        assert!(!store.save(&make_config(&[1], None)));
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_saved_file_is_deterministic() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        let store = ConfigStore::new(&path);

        assert!(store.save(&make_config(&[30, 10, 20], Some(40))));
        let first = fs::read(&path).unwrap();
        assert!(store.save(&make_config(&[20, 30, 10], Some(40))));
        let second = fs::read(&path).unwrap();

        assert_eq!(first, second);
    }
}
