//! Canonical message types shared by the relay and the setup wizard.
//!
//! Gateway payloads are converted into these at the Discord boundary so the
//! core never touches serenity models directly.

use chrono::{DateTime, Utc};
use serenity::model::id::{ChannelId, GuildId, MessageId, UserId};

/// Placeholder used when a deleted message's author is unknown.
pub const UNKNOWN_USER: &str = "Unknown User";
/// Placeholder used when a deleted message's author ID is unknown.
pub const UNKNOWN_ID: &str = "Unknown ID";
/// Placeholder used when a deleted message's content is unknown.
pub const UNKNOWN_CONTENT: &str = "Unknown Content";

/// Author of an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: UserId,
    pub name: String,
    /// Set for bot and webhook accounts.
    pub bot: bool,
}

/// A message-created event.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    /// `None` for direct messages.
    pub guild_id: Option<GuildId>,
    pub author: Author,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// A message-deleted event. The gateway only carries identifiers.
#[derive(Debug, Clone, Copy)]
pub struct DeletedMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
}

/// What gets relayed (and logged) for a monitored message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub username: String,
    pub user_id: String,
    pub content: String,
    pub source_channel: String,
    pub timestamp: DateTime<Utc>,
    pub from_bot: bool,
}

impl MessageRecord {
    /// Build a record for a freshly created message.
    pub fn from_incoming(message: &IncomingMessage, source_channel: String) -> Self {
        Self {
            username: message.author.name.clone(),
            user_id: message.author.id.to_string(),
            content: message.content.clone(),
            source_channel,
            timestamp: message.timestamp,
            from_bot: message.author.bot,
        }
    }

    /// Record for a deletion whose original message was never seen.
    pub fn unknown(source_channel: String) -> Self {
        Self {
            username: UNKNOWN_USER.to_string(),
            user_id: UNKNOWN_ID.to_string(),
            content: UNKNOWN_CONTENT.to_string(),
            source_channel,
            timestamp: Utc::now(),
            from_bot: false,
        }
    }

    /// Fill blank fields with the unknown placeholders.
    ///
    /// Attachment-only messages have empty content, which the platform
    /// would otherwise render as nothing at all.
    pub fn or_unknown(mut self) -> Self {
        if self.username.is_empty() {
            self.username = UNKNOWN_USER.to_string();
        }
        if self.user_id.is_empty() {
            self.user_id = UNKNOWN_ID.to_string();
        }
        if self.content.is_empty() {
            self.content = UNKNOWN_CONTENT.to_string();
        }
        self
    }
}
