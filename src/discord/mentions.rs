//! Channel mention extraction.
//!
//! Setup replies name channels with Discord's `<#id>` mention syntax.

use fancy_regex::Regex;
use serenity::model::id::ChannelId;
use tracing::warn;

use crate::config::types::parse_channel_id;

/// Parser for channel mentions in message content.
#[derive(Debug, Clone)]
pub struct MentionParser {
    /// Pattern for Discord channel mentions (<#123>).
    channel_pattern: Regex,
}

impl Default for MentionParser {
    fn default() -> Self {
        Self::new()
    }
}

impl MentionParser {
    pub fn new() -> Self {
        Self {
            channel_pattern: Regex::new(r"<#(\d+)>").expect("valid channel mention pattern"),
        }
    }

    /// Channel IDs mentioned in `content`, in order of appearance, without
    /// duplicates.
    pub fn channel_mentions(&self, content: &str) -> Vec<ChannelId> {
        let mut mentioned = Vec::new();

        for caps in self.channel_pattern.captures_iter(content) {
            let caps = match caps {
                Ok(caps) => caps,
                Err(e) => {
                    warn!("Channel mention scan aborted: {}", e);
                    break;
                }
            };
            if let Some(id) = caps.get(1).and_then(|m| parse_channel_id(m.as_str())) {
                if !mentioned.contains(&id) {
                    mentioned.push(id);
                }
            }
        }

        mentioned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_mentions() {
        let parser = MentionParser::new();
        assert!(parser.channel_mentions("just text #general").is_empty());
        assert!(parser.channel_mentions("").is_empty());
    }

    #[test]
    fn test_multiple_mentions_in_order() {
        let parser = MentionParser::new();
        let ids = parser.channel_mentions("<#300> and <#100>  <#200>");
        assert_eq!(
            ids,
            vec![ChannelId::new(300), ChannelId::new(100), ChannelId::new(200)]
        );
    }

    #[test]
    fn test_duplicates_removed() {
        let parser = MentionParser::new();
        let ids = parser.channel_mentions("<#5><#5> <#6>");
        assert_eq!(ids, vec![ChannelId::new(5), ChannelId::new(6)]);
    }

    #[test]
    fn test_user_and_role_mentions_ignored() {
        let parser = MentionParser::new();
        assert!(parser.channel_mentions("<@123> <@&456> <@!789>").is_empty());
    }

    #[test]
    fn test_zero_id_ignored() {
        let parser = MentionParser::new();
        assert_eq!(parser.channel_mentions("<#0> <#9>"), vec![ChannelId::new(9)]);
    }
}
