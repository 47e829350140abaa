//! Discord bot commands (!setup).
//!
//! Handles command recognition for messages typed in guild channels.

/// Commands the bot reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    /// Start the interactive channel setup (!setup).
    Setup,
}

/// Parse a message into a command.
///
/// Matching ignores surrounding whitespace and case. Anything after the
/// command word is not accepted, `!setup` takes no arguments.
pub fn parse_command(content: &str) -> Option<BotCommand> {
    let content = content.trim();
    if content.len() > 100 || !content.starts_with('!') {
        return None;
    }

    match content[1..].to_lowercase().as_str() {
        "setup" => Some(BotCommand::Setup),
        _ => None,
    }
}

pub fn is_setup_command(content: &str) -> bool {
    parse_command(content) == Some(BotCommand::Setup)
}
