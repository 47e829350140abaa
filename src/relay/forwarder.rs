//! Mirrors monitored channel traffic into the destination channel.
//!
//! Created messages are relayed as-is (text only) and remembered so that a
//! later deletion can be reported with its author and content.

use parking_lot::Mutex;
use serenity::model::id::ChannelId;
use tracing::{debug, error, info, warn};

use crate::common::{DeletedMessage, IncomingMessage, MessageRecord};
use crate::discord::platform::{ChatPlatform, OutgoingMessage};
use crate::relay::history::MessageHistory;
use crate::relay::overwrites::OverwriteGuard;
use crate::relay::state::RelayState;

/// Why an event was not relayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    FromBot,
    NotMonitored,
    NoDestination,
    DestinationUnavailable,
    MissingPermission,
    OverwritesUnavailable,
}

/// Result of handling one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Sent,
    Skipped(SkipReason),
    Failed,
}

/// Format a created-message relay.
pub fn format_created(record: &MessageRecord) -> String {
    format!(
        "**Channel:** {}\n**User:** {}\n**Message:** {}",
        record.source_channel, record.username, record.content
    )
}

/// Format a deleted-message relay.
pub fn format_deleted(record: &MessageRecord) -> String {
    format!(
        "🗑️ **Message Deleted**\n**Channel:** {}\n**User:** {}\n**Deleted Message:** {}",
        record.source_channel, record.username, record.content
    )
}

/// Relays monitored traffic to the destination channel.
pub struct Forwarder {
    state: RelayState,
    history: Mutex<MessageHistory>,
}

impl Forwarder {
    pub fn new(state: RelayState, history_size: usize) -> Self {
        Self {
            state,
            history: Mutex::new(MessageHistory::new(history_size)),
        }
    }

    /// Handle a message-created event.
    pub async fn on_message_created(
        &self,
        platform: &dyn ChatPlatform,
        message: &IncomingMessage,
    ) -> RelayOutcome {
        if message.author.bot {
            return RelayOutcome::Skipped(SkipReason::FromBot);
        }
        if !self.state.is_monitored(message.channel_id).await {
            return RelayOutcome::Skipped(SkipReason::NotMonitored);
        }

        let record =
            MessageRecord::from_incoming(message, source_channel_name(platform, message.channel_id));
        self.history.lock().remember(message.id, record.clone());

        info!(
            user = %record.username,
            user_id = %record.user_id,
            channel = %record.source_channel,
            timestamp = %record.timestamp,
            "New message received: {}",
            record.content
        );

        self.relay(platform, format_created(&record)).await
    }

    /// Handle a message-deleted event.
    pub async fn on_message_deleted(
        &self,
        platform: &dyn ChatPlatform,
        deleted: &DeletedMessage,
    ) -> RelayOutcome {
        if !self.state.is_monitored(deleted.channel_id).await {
            return RelayOutcome::Skipped(SkipReason::NotMonitored);
        }

        let remembered = self.history.lock().take(deleted.id);
        let record = match remembered {
            Some(record) if record.from_bot => {
                return RelayOutcome::Skipped(SkipReason::FromBot);
            }
            Some(record) => record.or_unknown(),
            None => MessageRecord::unknown(source_channel_name(platform, deleted.channel_id)),
        };

        info!(
            user = %record.username,
            user_id = %record.user_id,
            channel = %record.source_channel,
            "Message deleted: {}",
            record.content
        );

        self.relay(platform, format_deleted(&record)).await
    }

    async fn relay(&self, platform: &dyn ChatPlatform, content: String) -> RelayOutcome {
        let Some(destination) = self.state.destination().await else {
            debug!("No destination channel configured, not relaying");
            return RelayOutcome::Skipped(SkipReason::NoDestination);
        };

        let Some(channel) = platform.channel(destination) else {
            warn!("Destination channel not found: {}", destination);
            return RelayOutcome::Skipped(SkipReason::DestinationUnavailable);
        };

        if !platform.can_send(destination).await {
            warn!("Missing permission to send messages in #{}", channel.name);
            return RelayOutcome::Skipped(SkipReason::MissingPermission);
        }

        let guard = match OverwriteGuard::capture(platform, destination).await {
            Ok(guard) => guard,
            Err(e) => {
                error!("Could not capture overwrites of #{}: {}", channel.name, e);
                return RelayOutcome::Skipped(SkipReason::OverwritesUnavailable);
            }
        };

        let sent = platform
            .send_message(destination, OutgoingMessage::relay(content))
            .await;
        guard.restore(platform).await;

        match sent {
            Ok(()) => {
                info!("Message forwarded to #{}", channel.name);
                RelayOutcome::Sent
            }
            Err(e) => {
                error!("Failed to forward message to #{}: {}", channel.name, e);
                RelayOutcome::Failed
            }
        }
    }
}

/// Display name of a source channel, falling back to its ID.
fn source_channel_name(platform: &dyn ChatPlatform, channel_id: ChannelId) -> String {
    platform
        .channel(channel_id)
        .map(|channel| channel.name)
        .unwrap_or_else(|| channel_id.to_string())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serenity::all::{GuildId, MessageId, Permissions, RoleId, UserId};

    use super::*;
    use crate::common::Author;
    use crate::common::messages::{UNKNOWN_CONTENT, UNKNOWN_USER};
    use crate::config::store::ConfigStore;
    use crate::config::types::RelayConfig;
    use crate::discord::platform::mock::MockPlatform;
    use crate::discord::platform::{OverwriteEntry, OverwriteTarget};

    const SOURCE: u64 = 100;
    const OTHER: u64 = 101;
    const DEST: u64 = 200;

    fn make_platform() -> MockPlatform {
        MockPlatform::new()
            .with_text_channel(SOURCE, "general")
            .with_text_channel(OTHER, "random")
            .with_text_channel(DEST, "mirror")
            .with_overwrites(
                DEST,
                vec![OverwriteEntry {
                    target: OverwriteTarget::Role(RoleId::new(1)),
                    allow: Permissions::VIEW_CHANNEL,
                    deny: Permissions::SEND_MESSAGES,
                }],
            )
    }

    async fn make_forwarder(tmp: &tempfile::TempDir, destination: Option<u64>) -> Forwarder {
        let state = RelayState::load(ConfigStore::new(tmp.path().join("config.json")));
        let config = RelayConfig {
            source_channels: [ChannelId::new(SOURCE)].into_iter().collect(),
            destination_channel: destination.map(ChannelId::new),
        };
        assert!(state.commit(config).await);
        Forwarder::new(state, 16)
    }

    fn make_message(id: u64, channel: u64, content: &str) -> IncomingMessage {
        IncomingMessage {
            id: MessageId::new(id),
            channel_id: ChannelId::new(channel),
            guild_id: Some(GuildId::new(1)),
            author: Author {
                id: UserId::new(42),
                name: "alice".to_string(),
                bot: false,
            },
            content: content.to_string(),
            timestamp: Utc::now(),
        }
    }

    fn make_deleted(id: u64, channel: u64) -> DeletedMessage {
        DeletedMessage {
            id: MessageId::new(id),
            channel_id: ChannelId::new(channel),
        }
    }

    #[tokio::test]
    async fn test_created_message_relayed_once_without_mentions() {
        let tmp = tempfile::tempdir().unwrap();
        let forwarder = make_forwarder(&tmp, Some(DEST)).await;
        let platform = make_platform();
        let before = platform.overwrites(DEST);

        let outcome = forwarder
            .on_message_created(&platform, &make_message(1, SOURCE, "hello @everyone"))
            .await;

        assert_eq!(outcome, RelayOutcome::Sent);
        let sent = platform.sent_to(DEST);
        assert_eq!(sent.len(), 1);
        assert!(sent[0].suppress_mentions);
        assert_eq!(
            sent[0].content,
            "**Channel:** general\n**User:** alice\n**Message:** hello @everyone"
        );
        assert_eq!(platform.overwrites(DEST), before);
    }

    #[tokio::test]
    async fn test_overwrites_restored_after_drift() {
        let tmp = tempfile::tempdir().unwrap();
        let forwarder = make_forwarder(&tmp, Some(DEST)).await;
        let platform = make_platform();
        let before = platform.overwrites(DEST);
        platform.drift_overwrites_on_send(OverwriteEntry {
            target: OverwriteTarget::Member(UserId::new(7)),
            allow: Permissions::MANAGE_MESSAGES,
            deny: Permissions::empty(),
        });

        forwarder
            .on_message_created(&platform, &make_message(1, SOURCE, "hi"))
            .await;

        assert_eq!(platform.overwrites(DEST), before);
    }

    #[tokio::test]
    async fn test_overwrites_restored_when_send_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let forwarder = make_forwarder(&tmp, Some(DEST)).await;
        let platform = make_platform();
        let before = platform.overwrites(DEST);
        platform.drift_overwrites_on_send(OverwriteEntry {
            target: OverwriteTarget::Member(UserId::new(7)),
            allow: Permissions::MANAGE_MESSAGES,
            deny: Permissions::empty(),
        });
        platform.fail_sends();

        let outcome = forwarder
            .on_message_created(&platform, &make_message(1, SOURCE, "hi"))
            .await;

        assert_eq!(outcome, RelayOutcome::Failed);
        assert_eq!(platform.overwrites(DEST), before);
    }

    #[tokio::test]
    async fn test_missing_send_permission_skips_without_sending() {
        let tmp = tempfile::tempdir().unwrap();
        let forwarder = make_forwarder(&tmp, Some(DEST)).await;
        let platform = make_platform();
        platform.deny_send(DEST);
        let config_before = forwarder.state.snapshot().await;

        let outcome = forwarder
            .on_message_created(&platform, &make_message(1, SOURCE, "hi"))
            .await;

        assert_eq!(outcome, RelayOutcome::Skipped(SkipReason::MissingPermission));
        assert!(platform.sent().is_empty());
        assert_eq!(forwarder.state.snapshot().await, config_before);
    }

    #[tokio::test]
    async fn test_unreadable_overwrites_skip_relay() {
        let tmp = tempfile::tempdir().unwrap();
        let forwarder = make_forwarder(&tmp, Some(DEST)).await;
        let platform = make_platform();
        platform.fail_overwrites();

        let outcome = forwarder
            .on_message_created(&platform, &make_message(1, SOURCE, "hi"))
            .await;

        assert_eq!(
            outcome,
            RelayOutcome::Skipped(SkipReason::OverwritesUnavailable)
        );
        assert!(platform.sent().is_empty());
    }

    #[tokio::test]
    async fn test_unmonitored_channel_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let forwarder = make_forwarder(&tmp, Some(DEST)).await;
        let platform = make_platform();

        let outcome = forwarder
            .on_message_created(&platform, &make_message(1, OTHER, "hi"))
            .await;

        assert_eq!(outcome, RelayOutcome::Skipped(SkipReason::NotMonitored));
        assert!(platform.sent().is_empty());
    }

    #[tokio::test]
    async fn test_bot_author_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let forwarder = make_forwarder(&tmp, Some(DEST)).await;
        let platform = make_platform();
        let mut message = make_message(1, SOURCE, "beep");
        message.author.bot = true;

        let outcome = forwarder.on_message_created(&platform, &message).await;

        assert_eq!(outcome, RelayOutcome::Skipped(SkipReason::FromBot));
        assert!(platform.sent().is_empty());
    }

    #[tokio::test]
    async fn test_no_destination_configured() {
        let tmp = tempfile::tempdir().unwrap();
        let forwarder = make_forwarder(&tmp, None).await;
        let platform = make_platform();

        let outcome = forwarder
            .on_message_created(&platform, &make_message(1, SOURCE, "hi"))
            .await;

        assert_eq!(outcome, RelayOutcome::Skipped(SkipReason::NoDestination));
        assert!(platform.sent().is_empty());
    }

    #[tokio::test]
    async fn test_deleted_destination_skipped_and_config_kept() {
        let tmp = tempfile::tempdir().unwrap();
        let forwarder = make_forwarder(&tmp, Some(999)).await;
        let platform = make_platform();

        let outcome = forwarder
            .on_message_created(&platform, &make_message(1, SOURCE, "hi"))
            .await;

        assert_eq!(
            outcome,
            RelayOutcome::Skipped(SkipReason::DestinationUnavailable)
        );
        assert!(forwarder.state.is_monitored(ChannelId::new(SOURCE)).await);
        assert_eq!(forwarder.state.destination().await, Some(ChannelId::new(999)));
    }

    #[tokio::test]
    async fn test_deleted_message_uses_history() {
        let tmp = tempfile::tempdir().unwrap();
        let forwarder = make_forwarder(&tmp, Some(DEST)).await;
        let platform = make_platform();

        forwarder
            .on_message_created(&platform, &make_message(5, SOURCE, "oops"))
            .await;
        let outcome = forwarder
            .on_message_deleted(&platform, &make_deleted(5, SOURCE))
            .await;

        assert_eq!(outcome, RelayOutcome::Sent);
        let sent = platform.sent_to(DEST);
        assert_eq!(sent.len(), 2);
        assert!(sent[1].suppress_mentions);
        assert_eq!(
            sent[1].content,
            "🗑️ **Message Deleted**\n**Channel:** general\n**User:** alice\n**Deleted Message:** oops"
        );
    }

    #[tokio::test]
    async fn test_deleted_unknown_message_uses_placeholders() {
        let tmp = tempfile::tempdir().unwrap();
        let forwarder = make_forwarder(&tmp, Some(DEST)).await;
        let platform = make_platform();

        let outcome = forwarder
            .on_message_deleted(&platform, &make_deleted(77, SOURCE))
            .await;

        assert_eq!(outcome, RelayOutcome::Sent);
        let sent = platform.sent_to(DEST);
        assert!(sent[0].content.contains(UNKNOWN_USER));
        assert!(sent[0].content.contains(UNKNOWN_CONTENT));
        assert!(sent[0].content.contains("**Channel:** general"));
    }

    #[tokio::test]
    async fn test_deleted_in_unmonitored_channel_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let forwarder = make_forwarder(&tmp, Some(DEST)).await;
        let platform = make_platform();

        let outcome = forwarder
            .on_message_deleted(&platform, &make_deleted(1, OTHER))
            .await;

        assert_eq!(outcome, RelayOutcome::Skipped(SkipReason::NotMonitored));
        assert!(platform.sent().is_empty());
    }

    #[tokio::test]
    async fn test_deleted_without_permission_sends_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let forwarder = make_forwarder(&tmp, Some(DEST)).await;
        let platform = make_platform();
        platform.deny_send(DEST);

        let outcome = forwarder
            .on_message_deleted(&platform, &make_deleted(1, SOURCE))
            .await;

        assert_eq!(outcome, RelayOutcome::Skipped(SkipReason::MissingPermission));
        assert!(platform.sent().is_empty());
    }
}
