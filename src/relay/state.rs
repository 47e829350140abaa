//! Relay state management.
//!
//! `RelayState` owns the committed channel mapping for the whole process.
//! Readers take copies; writers go through `commit` (persist, then replace)
//! or `restore` (replace with a backup, then re-persist), so a half-applied
//! mapping is never visible or written.

use std::sync::Arc;

use serenity::model::id::ChannelId;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::config::store::ConfigStore;
use crate::config::types::RelayConfig;

/// Shared handle to the committed channel mapping.
#[derive(Clone)]
pub struct RelayState {
    store: Arc<ConfigStore>,
    committed: Arc<RwLock<RelayConfig>>,
}

impl RelayState {
    /// Load the committed mapping from the store.
    pub fn load(store: ConfigStore) -> Self {
        let config = store.load();
        info!(
            "Loaded channel mapping from {}: {} monitored channel(s), destination {:?}",
            store.path().display(),
            config.source_channels.len(),
            config.destination_channel.map(|id| id.get())
        );
        Self {
            store: Arc::new(store),
            committed: Arc::new(RwLock::new(config)),
        }
    }

    /// Copy of the committed mapping.
    pub async fn snapshot(&self) -> RelayConfig {
        self.committed.read().await.snapshot()
    }

    pub async fn is_monitored(&self, channel_id: ChannelId) -> bool {
        self.committed.read().await.is_monitored(channel_id)
    }

    pub async fn destination(&self) -> Option<ChannelId> {
        self.committed.read().await.destination_channel
    }

    /// Persist `next` and make it the committed mapping.
    ///
    /// Returns `false` (leaving the committed mapping untouched) if it
    /// could not be persisted.
    pub async fn commit(&self, next: RelayConfig) -> bool {
        let mut committed = self.committed.write().await;
        if !self.store.save(&next) {
            warn!("Commit rejected: channel mapping could not be persisted");
            return false;
        }
        *committed = next;
        true
    }

    /// Roll back to `backup` and re-persist it.
    pub async fn restore(&self, backup: &RelayConfig) {
        let mut committed = self.committed.write().await;
        *committed = backup.snapshot();
        if self.store.save(backup) {
            info!("Previous channel mapping restored");
        } else {
            error!("Previous channel mapping restored in memory but could not be persisted");
        }
    }
}
