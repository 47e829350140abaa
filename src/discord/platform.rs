//! Chat platform abstraction.
//!
//! The relay and setup flows only need a handful of channel lookups,
//! permission checks and sends. `ChatPlatform` captures exactly that, with
//! `SerenityPlatform` as the production implementation backed by the
//! gateway cache and the HTTP client.

use std::sync::Arc;

use serenity::all::{
    Cache, ChannelId, ChannelType, CreateAllowedMentions, CreateMessage, GuildChannel, GuildId,
    Http, PermissionOverwrite, PermissionOverwriteType, Permissions, RoleId, UserId,
};
use serenity::async_trait;
use tracing::{debug, warn};

use crate::common::error::{PlatformError, PlatformResult};

/// Minimal view of a guild channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: ChannelId,
    pub name: String,
    /// Plain guild text channel (not voice, category, thread, ...).
    pub is_text: bool,
}

/// Who a permission overwrite applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverwriteTarget {
    Member(UserId),
    Role(RoleId),
}

/// One permission overwrite on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverwriteEntry {
    pub target: OverwriteTarget,
    pub allow: Permissions,
    pub deny: Permissions,
}

impl OverwriteEntry {
    fn from_serenity(overwrite: &PermissionOverwrite) -> Option<Self> {
        let target = match overwrite.kind {
            PermissionOverwriteType::Member(user_id) => OverwriteTarget::Member(user_id),
            PermissionOverwriteType::Role(role_id) => OverwriteTarget::Role(role_id),
            _ => return None,
        };
        Some(Self {
            target,
            allow: overwrite.allow,
            deny: overwrite.deny,
        })
    }

    fn to_serenity(self) -> PermissionOverwrite {
        PermissionOverwrite {
            allow: self.allow,
            deny: self.deny,
            kind: self.target.to_serenity(),
        }
    }
}

impl OverwriteTarget {
    fn to_serenity(self) -> PermissionOverwriteType {
        match self {
            Self::Member(user_id) => PermissionOverwriteType::Member(user_id),
            Self::Role(role_id) => PermissionOverwriteType::Role(role_id),
        }
    }
}

/// An outgoing text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub content: String,
    /// Disable all mention parsing so relayed text cannot ping anyone.
    pub suppress_mentions: bool,
}

impl OutgoingMessage {
    /// Bot notice (setup prompts, confirmations).
    pub fn notice(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            suppress_mentions: false,
        }
    }

    /// Relayed user content.
    pub fn relay(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            suppress_mentions: true,
        }
    }
}

/// Operations the core needs from the chat service.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Look up a channel by ID.
    fn channel(&self, channel_id: ChannelId) -> Option<ChannelInfo>;

    /// All text channels of a guild, in display order.
    fn text_channels(&self, guild_id: GuildId) -> Vec<ChannelInfo>;

    /// Whether `user_id` holds administrator capability in the channel.
    async fn is_administrator(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        user_id: UserId,
    ) -> bool;

    /// Whether the bot itself may send messages to the channel.
    async fn can_send(&self, channel_id: ChannelId) -> bool;

    async fn send_message(&self, channel_id: ChannelId, message: OutgoingMessage)
        -> PlatformResult<()>;

    /// Current permission overwrites of a channel.
    async fn permission_overwrites(&self, channel_id: ChannelId)
        -> PlatformResult<Vec<OverwriteEntry>>;

    /// Make the channel's overwrites equal to `saved`.
    async fn restore_permission_overwrites(
        &self,
        channel_id: ChannelId,
        saved: &[OverwriteEntry],
    ) -> PlatformResult<()>;
}

/// Shared handle to a platform implementation.
pub type SharedPlatform = Arc<dyn ChatPlatform>;

/// Changes that turn `current` into `saved`: targets whose overwrite must
/// be deleted, and entries that must be (re)created.
///
/// An entry whose target exists in both lists but with different allow or
/// deny bits is only re-created; creating an overwrite replaces it.
pub fn plan_overwrite_restore(
    current: &[OverwriteEntry],
    saved: &[OverwriteEntry],
) -> (Vec<OverwriteTarget>, Vec<OverwriteEntry>) {
    let to_delete = current
        .iter()
        .filter(|entry| !saved.iter().any(|s| s.target == entry.target))
        .map(|entry| entry.target)
        .collect();
    let to_create = saved
        .iter()
        .filter(|entry| !current.contains(entry))
        .copied()
        .collect();
    (to_delete, to_create)
}

/// Production platform backed by serenity's cache and HTTP client.
#[derive(Clone)]
pub struct SerenityPlatform {
    http: Arc<Http>,
    cache: Arc<Cache>,
}

impl SerenityPlatform {
    pub fn new(http: Arc<Http>, cache: Arc<Cache>) -> Self {
        Self { http, cache }
    }

    pub fn from_context(context: &serenity::client::Context) -> Self {
        Self::new(context.http.clone(), context.cache.clone())
    }

    /// Find a channel among the cached guilds. The channel is cloned out so
    /// no cache guard outlives the call.
    fn locate(&self, channel_id: ChannelId) -> Option<(GuildId, GuildChannel)> {
        self.cache.guilds().into_iter().find_map(|guild_id| {
            let guild = self.cache.guild(guild_id)?;
            let found = guild
                .channels
                .get(&channel_id)
                .map(|channel| (guild_id, channel.clone()));
            found
        })
    }

    /// Permissions of a member in a channel.
    ///
    /// Without the privileged members intent only some members are cached,
    /// so a cache miss falls back to fetching the member over HTTP.
    async fn member_permissions(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        user_id: UserId,
    ) -> Option<Permissions> {
        let channel = {
            let guild = self.cache.guild(guild_id)?;
            let channel = guild.channels.get(&channel_id)?;
            if let Some(member) = guild.members.get(&user_id) {
                return Some(guild.user_permissions_in(channel, member));
            }
            channel.clone()
        };

        let member = match self.http.get_member(guild_id, user_id).await {
            Ok(member) => member,
            Err(e) => {
                warn!(
                    "Could not fetch member {} of guild {}: {}",
                    user_id, guild_id, e
                );
                return None;
            }
        };

        let guild = self.cache.guild(guild_id)?;
        let permissions = guild.user_permissions_in(&channel, &member);
        Some(permissions)
    }
}

fn channel_info(channel: &GuildChannel) -> ChannelInfo {
    ChannelInfo {
        id: channel.id,
        name: channel.name.clone(),
        is_text: channel.kind == ChannelType::Text,
    }
}

#[async_trait]
impl ChatPlatform for SerenityPlatform {
    fn channel(&self, channel_id: ChannelId) -> Option<ChannelInfo> {
        self.locate(channel_id).map(|(_, channel)| channel_info(&channel))
    }

    fn text_channels(&self, guild_id: GuildId) -> Vec<ChannelInfo> {
        let mut channels: Vec<GuildChannel> = match self.cache.guild(guild_id) {
            Some(guild) => guild
                .channels
                .values()
                .filter(|channel| channel.kind == ChannelType::Text)
                .cloned()
                .collect(),
            None => {
                warn!("Guild {} is not cached", guild_id);
                return Vec::new();
            }
        };
        channels.sort_by_key(|channel| (channel.position, channel.id));
        channels.iter().map(channel_info).collect()
    }

    async fn is_administrator(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        user_id: UserId,
    ) -> bool {
        self.member_permissions(guild_id, channel_id, user_id)
            .await
            .map(|permissions| permissions.administrator())
            .unwrap_or(false)
    }

    async fn can_send(&self, channel_id: ChannelId) -> bool {
        let Some((guild_id, _)) = self.locate(channel_id) else {
            return false;
        };
        let bot_id = self.cache.current_user().id;
        self.member_permissions(guild_id, channel_id, bot_id)
            .await
            .map(|permissions| permissions.send_messages())
            .unwrap_or(false)
    }

    async fn send_message(
        &self,
        channel_id: ChannelId,
        message: OutgoingMessage,
    ) -> PlatformResult<()> {
        let mut builder = CreateMessage::new().content(message.content);
        if message.suppress_mentions {
            builder = builder.allowed_mentions(CreateAllowedMentions::new());
        }
        channel_id.send_message(&self.http, builder).await?;
        Ok(())
    }

    async fn permission_overwrites(
        &self,
        channel_id: ChannelId,
    ) -> PlatformResult<Vec<OverwriteEntry>> {
        if self.locate(channel_id).is_none() {
            return Err(PlatformError::ChannelNotFound {
                channel_id: channel_id.get(),
            });
        }

        // Fetched fresh; the cached copy may lag behind recent edits.
        let channel = self
            .http
            .get_channel(channel_id)
            .await?
            .guild()
            .ok_or(PlatformError::NotGuildChannel {
                channel_id: channel_id.get(),
            })?;

        Ok(channel
            .permission_overwrites
            .iter()
            .filter_map(OverwriteEntry::from_serenity)
            .collect())
    }

    async fn restore_permission_overwrites(
        &self,
        channel_id: ChannelId,
        saved: &[OverwriteEntry],
    ) -> PlatformResult<()> {
        let current = self.permission_overwrites(channel_id).await?;
        let (to_delete, to_create) = plan_overwrite_restore(&current, saved);

        for target in to_delete {
            debug!("Removing overwrite {:?} from channel {}", target, channel_id);
            channel_id
                .delete_permission(&self.http, target.to_serenity())
                .await?;
        }

        for entry in to_create {
            debug!("Restoring overwrite {:?} on channel {}", entry.target, channel_id);
            channel_id
                .create_permission(&self.http, entry.to_serenity())
                .await?;
        }

        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn role(id: u64, allow: Permissions, deny: Permissions) -> OverwriteEntry {
        OverwriteEntry {
            target: OverwriteTarget::Role(RoleId::new(id)),
            allow,
            deny,
        }
    }

    fn member(id: u64, allow: Permissions) -> OverwriteEntry {
        OverwriteEntry {
            target: OverwriteTarget::Member(UserId::new(id)),
            allow,
            deny: Permissions::empty(),
        }
    }

    #[test]
    fn test_restore_plan_unchanged() {
        let saved = vec![role(1, Permissions::VIEW_CHANNEL, Permissions::SEND_MESSAGES)];
        let (to_delete, to_create) = plan_overwrite_restore(&saved, &saved);
        assert!(to_delete.is_empty());
        assert!(to_create.is_empty());
    }

    #[test]
    fn test_restore_plan_removes_added_entry() {
        let saved = vec![role(1, Permissions::VIEW_CHANNEL, Permissions::empty())];
        let mut current = saved.clone();
        current.push(member(7, Permissions::SEND_MESSAGES));

        let (to_delete, to_create) = plan_overwrite_restore(&current, &saved);

        assert_eq!(to_delete, vec![OverwriteTarget::Member(UserId::new(7))]);
        assert!(to_create.is_empty());
    }

    #[test]
    fn test_restore_plan_recreates_removed_entry() {
        let saved = vec![
            role(1, Permissions::VIEW_CHANNEL, Permissions::empty()),
            member(7, Permissions::SEND_MESSAGES),
        ];
        let current = vec![saved[0]];

        let (to_delete, to_create) = plan_overwrite_restore(&current, &saved);

        assert!(to_delete.is_empty());
        assert_eq!(to_create, vec![saved[1]]);
    }

    #[test]
    fn test_restore_plan_resets_changed_bits() {
        let saved = vec![role(1, Permissions::VIEW_CHANNEL, Permissions::SEND_MESSAGES)];
        let current = vec![role(1, Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES, Permissions::empty())];

        let (to_delete, to_create) = plan_overwrite_restore(&current, &saved);

        assert!(to_delete.is_empty());
        assert_eq!(to_create, saved);
    }
}
