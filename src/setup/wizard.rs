//! Interactive `!setup` flow.
//!
//! Two sequential questions, each answered by the initiator's next message
//! in the same channel within [`STEP_TIMEOUT`]:
//! 1. which channels to monitor (channel mentions, text channels only)
//! 2. which channel receives the mirrored messages
//!
//! The committed mapping is only replaced by a successful final commit.
//! Every other ending (no mentions, missing permission, timeout, failed
//! save) restores and re-persists the mapping captured when the run
//! started.

use std::time::Duration;

use serenity::model::id::{ChannelId, GuildId, UserId};
use tracing::{error, info};

use crate::config::types::RelayConfig;
use crate::discord::mentions::MentionParser;
use crate::discord::platform::{ChannelInfo, ChatPlatform, OutgoingMessage};
use crate::relay::state::RelayState;
use crate::setup::session::{SessionHandle, SessionRegistry, WizardStep};

/// Answer window for each step.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(30);

const DENIED: &str = "You need administrator permissions to run this command.";
const ALREADY_RUNNING: &str = "A setup is already in progress in this channel.";
const STARTING: &str = "Starting new setup...";
const PROMPT_SOURCES: &str = "🔧 **Setup Step 1/2:**\nPlease mention all the channels you want to monitor (mention them in a single message, separated by spaces)\n*Setup will timeout in 30 seconds*";
const PROMPT_DESTINATION: &str = "🔧 **Setup Step 2/2:**\nPlease mention the channel where you want the messages to be sent\n*Setup will timeout in 30 seconds*";
const NO_SOURCES: &str =
    "No channels were mentioned. Setup cancelled. Previous configuration restored.";
const NO_DESTINATION: &str =
    "No destination channel mentioned. Setup cancelled. Previous configuration restored.";
const TIMED_OUT: &str = "Setup timed out. Previous configuration restored.";
const SAVE_FAILED: &str = "❌ Error saving configuration. Previous settings restored.";

/// Who asked for setup, and where.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupRequest {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub user_id: UserId,
}

/// Why a run was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    NoSourceChannels,
    NoDestination,
    DestinationNotWritable,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardOutcome {
    Completed {
        monitored: usize,
        destination: ChannelId,
    },
    /// The final commit could not be persisted; the backup was restored.
    SaveFailed,
    Cancelled(CancelReason),
    /// The window for the given step elapsed without an answer.
    TimedOut(WizardStep),
    Denied,
    AlreadyRunning,
}

/// One run's fixed context.
struct WizardSession<'a> {
    request: SetupRequest,
    handle: SessionHandle,
    backup: RelayConfig,
    platform: &'a dyn ChatPlatform,
}

/// Drives `!setup` runs against the shared relay state.
pub struct SetupWizard {
    state: RelayState,
    sessions: SessionRegistry,
    mentions: MentionParser,
    step_timeout: Duration,
}

impl SetupWizard {
    pub fn new(state: RelayState) -> Self {
        Self {
            state,
            sessions: SessionRegistry::new(),
            mentions: MentionParser::new(),
            step_timeout: STEP_TIMEOUT,
        }
    }

    /// Pending sessions, for routing replies.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Run the whole flow for one `!setup` command.
    pub async fn run(&self, platform: &dyn ChatPlatform, request: SetupRequest) -> WizardOutcome {
        let is_admin = platform
            .is_administrator(request.guild_id, request.channel_id, request.user_id)
            .await;
        if !is_admin {
            info!("!setup denied for user {} (not an administrator)", request.user_id);
            say(platform, request.channel_id, DENIED).await;
            return WizardOutcome::Denied;
        }

        let Some(handle) = self.sessions.open((request.channel_id, request.user_id)) else {
            say(platform, request.channel_id, ALREADY_RUNNING).await;
            return WizardOutcome::AlreadyRunning;
        };

        let backup = self.state.snapshot().await;
        info!(
            "Setup started by user {} in channel {}; configuration backed up",
            request.user_id, request.channel_id
        );

        let session = WizardSession {
            request,
            handle,
            backup,
            platform,
        };
        let outcome = self.drive(&session).await;
        info!(?outcome, "Setup finished for user {}", request.user_id);
        outcome
    }

    async fn drive(&self, session: &WizardSession<'_>) -> WizardOutcome {
        let platform = session.platform;
        let channel = session.request.channel_id;

        if !session.backup.is_empty() {
            say(platform, channel, &describe_config(platform, &session.backup)).await;
            say(platform, channel, STARTING).await;
        }
        let available = platform.text_channels(session.request.guild_id);
        say(platform, channel, &describe_available(&available)).await;

        // Step 1: channels to monitor.
        let collector = session.handle.arm(WizardStep::AwaitingSources);
        say(platform, channel, PROMPT_SOURCES).await;
        let Some(reply) = collector.wait(self.step_timeout).await else {
            return self.time_out(session, WizardStep::AwaitingSources).await;
        };

        let sources: Vec<ChannelInfo> = self
            .mentions
            .channel_mentions(&reply)
            .into_iter()
            .filter_map(|id| platform.channel(id))
            .filter(|info| info.is_text)
            .collect();
        if sources.is_empty() {
            return self
                .cancel(session, CancelReason::NoSourceChannels, NO_SOURCES)
                .await;
        }

        // Merged into whatever is committed now; earlier sources stay.
        let mut working = self.state.snapshot().await;
        working
            .source_channels
            .extend(sources.iter().map(|info| info.id));
        say(platform, channel, &describe_selected(&sources)).await;

        // Step 2: destination.
        let collector = session.handle.arm(WizardStep::AwaitingDestination);
        say(platform, channel, PROMPT_DESTINATION).await;
        let Some(reply) = collector.wait(self.step_timeout).await else {
            return self.time_out(session, WizardStep::AwaitingDestination).await;
        };

        // First mention that resolves to a known channel.
        let destination = self
            .mentions
            .channel_mentions(&reply)
            .into_iter()
            .find_map(|id| platform.channel(id));
        let Some(destination) = destination else {
            return self
                .cancel(session, CancelReason::NoDestination, NO_DESTINATION)
                .await;
        };

        if !platform.can_send(destination.id).await {
            let notice = format!(
                "I don't have permission to send messages in #{}. Setup cancelled. Previous configuration restored.",
                destination.name
            );
            return self
                .cancel(session, CancelReason::DestinationNotWritable, &notice)
                .await;
        }

        working.destination_channel = Some(destination.id);
        let monitored = working.source_channels.len();

        if !self.state.commit(working).await {
            error!("Setup could not save the channel mapping; restoring backup");
            self.state.restore(&session.backup).await;
            session.handle.set_step(WizardStep::Completed);
            say(platform, channel, SAVE_FAILED).await;
            return WizardOutcome::SaveFailed;
        }

        session.handle.set_step(WizardStep::Completed);
        let summary = format!(
            "✅ **Setup Complete!**\n• Monitoring {} channels\n• Sending messages to: #{}\n• Configuration has been saved",
            monitored, destination.name
        );
        say(platform, channel, &summary).await;

        WizardOutcome::Completed {
            monitored,
            destination: destination.id,
        }
    }

    async fn cancel(
        &self,
        session: &WizardSession<'_>,
        reason: CancelReason,
        notice: &str,
    ) -> WizardOutcome {
        self.state.restore(&session.backup).await;
        session.handle.set_step(WizardStep::Cancelled);
        say(session.platform, session.request.channel_id, notice).await;
        WizardOutcome::Cancelled(reason)
    }

    async fn time_out(&self, session: &WizardSession<'_>, step: WizardStep) -> WizardOutcome {
        self.state.restore(&session.backup).await;
        session.handle.set_step(WizardStep::TimedOut);
        say(session.platform, session.request.channel_id, TIMED_OUT).await;
        WizardOutcome::TimedOut(step)
    }
}

/// Send a notice, logging failures.
async fn say(platform: &dyn ChatPlatform, channel_id: ChannelId, text: &str) {
    if let Err(e) = platform
        .send_message(channel_id, OutgoingMessage::notice(text))
        .await
    {
        error!("Failed to send setup message to channel {}: {}", channel_id, e);
    }
}

/// "Current Setup" summary. Channels that no longer resolve are left out.
fn describe_config(platform: &dyn ChatPlatform, config: &RelayConfig) -> String {
    let mut text = String::from("Current Setup:\n");
    if !config.source_channels.is_empty() {
        text.push_str("Monitored channels:\n");
        for id in &config.source_channels {
            if let Some(info) = platform.channel(*id) {
                text.push_str(&format!("- #{}\n", info.name));
            }
        }
    }
    if let Some(info) = config
        .destination_channel
        .and_then(|id| platform.channel(id))
    {
        text.push_str(&format!("\nDestination channel: #{}", info.name));
    }
    text
}

fn describe_available(channels: &[ChannelInfo]) -> String {
    let mut text = String::from("📋 **Available Text Channels:**\n");
    for info in channels {
        text.push_str(&format!("• #{} ({})\n", info.name, info.id));
    }
    text
}

fn describe_selected(channels: &[ChannelInfo]) -> String {
    let mut text = String::from("Selected channels to monitor:\n");
    for info in channels {
        text.push_str(&format!("#{}\n", info.name));
    }
    text
}
