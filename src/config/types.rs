//! Configuration type definitions.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serenity::model::id::ChannelId;

/// Default location of the persisted channel mapping.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Default number of monitored messages remembered for deletion notices.
pub const DEFAULT_HISTORY_SIZE: usize = 1000;

/// Process settings supplied out-of-band (environment / `.env`).
#[derive(Debug, Clone)]
pub struct Settings {
    pub discord_token: String,
    /// Path of the JSON channel mapping file.
    pub config_path: String,
    /// Capacity of the deleted-message lookup history (0 disables it).
    pub history_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            config_path: DEFAULT_CONFIG_PATH.to_string(),
            history_size: DEFAULT_HISTORY_SIZE,
        }
    }
}

/// The relay channel mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayConfig {
    /// Channels whose traffic is mirrored.
    pub source_channels: BTreeSet<ChannelId>,
    /// Channel receiving the mirrored traffic.
    pub destination_channel: Option<ChannelId>,
}

impl RelayConfig {
    /// Deep copy used as a restorable backup before a mutating flow.
    pub fn snapshot(&self) -> Self {
        Self {
            source_channels: self.source_channels.iter().copied().collect(),
            destination_channel: self.destination_channel,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.source_channels.is_empty() && self.destination_channel.is_none()
    }

    pub fn is_monitored(&self, channel_id: ChannelId) -> bool {
        self.source_channels.contains(&channel_id)
    }

    /// On-disk representation.
    pub fn to_persisted(&self) -> PersistedConfig {
        PersistedConfig {
            source_channels: self.source_channels.iter().map(|id| id.to_string()).collect(),
            destination_channel: self.destination_channel.map(|id| id.to_string()),
        }
    }

    /// Build from the on-disk representation, dropping unusable IDs.
    pub fn from_persisted(persisted: PersistedConfig) -> Self {
        let mut source_channels = BTreeSet::new();
        for raw in &persisted.source_channels {
            match parse_channel_id(raw) {
                Some(id) => {
                    source_channels.insert(id);
                }
                None => tracing::warn!("Ignoring invalid source channel ID '{}'", raw),
            }
        }

        let destination_channel = persisted.destination_channel.as_deref().and_then(|raw| {
            let parsed = parse_channel_id(raw);
            if parsed.is_none() {
                tracing::warn!("Ignoring invalid destination channel ID '{}'", raw);
            }
            parsed
        });

        Self {
            source_channels,
            destination_channel,
        }
    }
}

/// JSON shape of the channel mapping file.
///
/// IDs are kept as strings so the file stays readable and round-trips
/// 64-bit snowflakes without precision loss in other tooling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedConfig {
    #[serde(default)]
    pub source_channels: Vec<String>,
    #[serde(default)]
    pub destination_channel: Option<String>,
}

/// Parse a channel snowflake; zero and non-numeric values are rejected.
pub fn parse_channel_id(raw: &str) -> Option<ChannelId> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .map(ChannelId::new)
}
