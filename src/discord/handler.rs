//! Discord message event handling.
//!
//! Converts gateway payloads into the canonical message types and routes
//! them: pending setup sessions first, then the `!setup` command, then the
//! relay.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::model::guild::Guild;
use serenity::model::id::{ChannelId, MessageId};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::common::{Author, DeletedMessage, IncomingMessage};
use crate::discord::commands::is_setup_command;
use crate::discord::platform::{OutgoingMessage, SharedPlatform};
use crate::relay::{Forwarder, RelayOutcome, RelayState, SkipReason};
use crate::setup::{SetupRequest, SetupWizard, WizardOutcome};

const NO_MEMBER_INFO: &str = "Could not retrieve member information.";

/// What happened to one message-created event.
#[derive(Debug)]
pub struct Dispatched {
    /// The message answered a pending setup step.
    pub answered_setup: bool,
    /// A wizard run was started for this message.
    pub setup: Option<JoinHandle<WizardOutcome>>,
    pub relay: RelayOutcome,
}

/// Routes Discord events to the setup wizard and the forwarder.
pub struct RelayHandler {
    state: RelayState,
    forwarder: Forwarder,
    wizard: Arc<SetupWizard>,
}

impl RelayHandler {
    pub fn new(state: RelayState, history_size: usize) -> Self {
        Self {
            forwarder: Forwarder::new(state.clone(), history_size),
            wizard: Arc::new(SetupWizard::new(state.clone())),
            state,
        }
    }

    pub async fn handle_ready(&self, ready: &Ready) {
        info!("Logged in as {}", ready.user.tag());

        let config = self.state.snapshot().await;
        let monitored: Vec<String> = config
            .source_channels
            .iter()
            .map(|id| id.to_string())
            .collect();
        info!("Monitoring channels: {:?}", monitored);
        match config.destination_channel {
            Some(destination) => info!("Destination channel: {}", destination),
            None => info!("Destination channel: not configured (run !setup)"),
        }
    }

    pub fn handle_guild_create(&self, guild: &Guild) {
        info!(
            "Received guild data for '{}' ({} channels)",
            guild.name,
            guild.channels.len()
        );
    }

    pub async fn handle_message(&self, platform: SharedPlatform, message: &Message) {
        let dispatched = self.dispatch(platform, incoming_from(message)).await;
        debug!(
            answered_setup = dispatched.answered_setup,
            started_setup = dispatched.setup.is_some(),
            relay = ?dispatched.relay,
            "Message {} handled",
            message.id
        );
    }

    pub async fn handle_message_delete(
        &self,
        platform: SharedPlatform,
        channel_id: ChannelId,
        message_id: MessageId,
    ) {
        let deleted = DeletedMessage {
            id: message_id,
            channel_id,
        };
        let outcome = self
            .forwarder
            .on_message_deleted(platform.as_ref(), &deleted)
            .await;
        debug!(?outcome, "Deletion of {} handled", message_id);
    }

    /// Route one message-created event.
    ///
    /// A setup command typed in a monitored channel is still relayed.
    pub async fn dispatch(&self, platform: SharedPlatform, message: IncomingMessage) -> Dispatched {
        if message.author.bot {
            return Dispatched {
                answered_setup: false,
                setup: None,
                relay: RelayOutcome::Skipped(SkipReason::FromBot),
            };
        }

        let answered_setup = self
            .wizard
            .sessions()
            .offer((message.channel_id, message.author.id), &message.content);
        if answered_setup {
            debug!(
                "Message from {} answered a pending setup step",
                message.author.name
            );
        }

        // An answer is never also a new command.
        let setup = if !answered_setup && is_setup_command(&message.content) {
            self.start_setup(platform.clone(), &message).await
        } else {
            None
        };

        let relay = self
            .forwarder
            .on_message_created(platform.as_ref(), &message)
            .await;

        Dispatched {
            answered_setup,
            setup,
            relay,
        }
    }

    async fn start_setup(
        &self,
        platform: SharedPlatform,
        message: &IncomingMessage,
    ) -> Option<JoinHandle<WizardOutcome>> {
        let Some(guild_id) = message.guild_id else {
            if let Err(e) = platform
                .send_message(message.channel_id, OutgoingMessage::notice(NO_MEMBER_INFO))
                .await
            {
                error!("Failed to reply to !setup outside a guild: {}", e);
            }
            return None;
        };

        info!(
            "!setup requested by {} in channel {}",
            message.author.name, message.channel_id
        );

        let request = SetupRequest {
            guild_id,
            channel_id: message.channel_id,
            user_id: message.author.id,
        };
        let wizard = Arc::clone(&self.wizard);
        Some(tokio::spawn(async move {
            wizard.run(platform.as_ref(), request).await
        }))
    }
}

/// Convert a gateway message into the canonical form.
pub fn incoming_from(message: &Message) -> IncomingMessage {
    let timestamp = DateTime::<Utc>::from_timestamp(message.timestamp.unix_timestamp(), 0)
        .unwrap_or_else(Utc::now);

    IncomingMessage {
        id: message.id,
        channel_id: message.channel_id,
        guild_id: message.guild_id,
        author: Author {
            id: message.author.id,
            name: message.author.name.clone(),
            bot: message.author.bot || message.webhook_id.is_some(),
        },
        content: message.content.clone(),
        timestamp,
    }
}
