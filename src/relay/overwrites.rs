//! Permission overwrite preservation around a relay send.

use serenity::model::id::ChannelId;
use tracing::{debug, error};

use crate::common::error::PlatformResult;
use crate::discord::platform::{ChatPlatform, OverwriteEntry};

/// Overwrites captured before a send, restored afterwards.
///
/// Callers must call [`OverwriteGuard::restore`] on every path once the
/// guard exists, whatever the send returned.
#[must_use = "captured overwrites must be restored"]
#[derive(Debug)]
pub struct OverwriteGuard {
    channel_id: ChannelId,
    saved: Vec<OverwriteEntry>,
}

impl OverwriteGuard {
    pub async fn capture(
        platform: &dyn ChatPlatform,
        channel_id: ChannelId,
    ) -> PlatformResult<Self> {
        let saved = platform.permission_overwrites(channel_id).await?;
        debug!("Captured {} overwrite(s) on channel {}", saved.len(), channel_id);
        Ok(Self { channel_id, saved })
    }

    #[cfg(test)]
    pub fn saved(&self) -> &[OverwriteEntry] {
        &self.saved
    }

    /// Put the captured overwrites back. Failures are logged only.
    pub async fn restore(self, platform: &dyn ChatPlatform) {
        if let Err(e) = platform
            .restore_permission_overwrites(self.channel_id, &self.saved)
            .await
        {
            error!(
                "Failed to restore permission overwrites on channel {}: {}",
                self.channel_id, e
            );
        }
    }
}
