use std::fmt;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serenity::all::{ChannelId, GuildId, Message, MessageId, UserId};

use crate::utils::{channel_id, message_id};

lazy_static! {
    static ref STARRED_MESSAGE: Regex = Regex::new(r"\*\*(?P<stars>[0-9]+)\*\* <#(?P<channel>[0-9]+)> ID: (?P<id>[0-9]+)").unwrap();
}

const IMAGE_TYPES: [&str; 3] = ["jpg", "png", "gif"];

/// The fields carried by the text of a board entry, `**<stars>** <#<channel>> ID: <id>`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BoardEntry {
    pub stars: i64,
    pub channel_id: ChannelId,
    pub id: MessageId,
}

impl BoardEntry {
    pub fn parse(text: &str) -> Option<Self> {
        let found = STARRED_MESSAGE.captures(text)?;
        Some(BoardEntry {
            stars: found["stars"].parse().ok()?,
            channel_id: channel_id(found["channel"].parse().ok()?)?,
            id: message_id(found["id"].parse().ok()?)?,
        })
    }

    pub fn render(&self) -> String {
        format!("**{}** <#{}> ID: {}", self.stars, self.channel_id, self.id)
    }
}

/// What the starboard needs out of a message posted in the board channel.
#[derive(Clone, Debug)]
pub struct BoardMessage {
    pub id: MessageId,
    pub author_id: UserId,
    /// Board entry text, carries the [`BoardEntry`] fields.
    pub text: String,
    /// The curated content, the embed description when the entry has one.
    pub content: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Message> for BoardMessage {
    fn from(message: &Message) -> Self {
        let embed = message.embeds.first();
        let content = embed.and_then(|embed| embed.description.clone()).unwrap_or_else(|| message.content.clone());
        let image_url = embed
            .and_then(|embed| embed.image.as_ref())
            .and_then(|image| if image.url.is_empty() { image.proxy_url.clone() } else { Some(image.url.clone()) })
            .or_else(|| message.attachments.first().map(|attachment| attachment.url.clone()));

        BoardMessage {
            id: message.id,
            author_id: message.author.id,
            text: message.content.clone(),
            content,
            image_url,
            created_at: DateTime::from_timestamp(message.timestamp.unix_timestamp(), 0).unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct StarredMessagePayload {
    pub message_id: MessageId,
    pub author_id: UserId,
    pub content: String,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub stars: i64,
    pub channel_id: ChannelId,
    pub star_id: MessageId,
}

impl fmt::Debug for StarredMessagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StarredMessagePayload")
            .field("message_id", &self.message_id)
            .field("stars", &self.stars)
            .field("channel_id", &self.channel_id)
            .field("star_id", &self.star_id)
            .finish()
    }
}

impl StarredMessagePayload {
    pub fn resolve(message: &BoardMessage, entry: &BoardEntry) -> Self {
        StarredMessagePayload {
            message_id: entry.id,
            author_id: message.author_id,
            content: message.content.clone(),
            image_url: message.image_url.clone(),
            created_at: message.created_at,
            stars: entry.stars,
            channel_id: entry.channel_id,
            star_id: message.id,
        }
    }

    pub fn has_id(&self, id: MessageId) -> bool {
        self.message_id == id || self.star_id == id
    }

    pub fn has_image(&self) -> bool {
        match &self.image_url {
            Some(url) => {
                let lowered = url.to_lowercase();
                IMAGE_TYPES.iter().any(|extension| lowered.ends_with(extension))
            }
            None => false,
        }
    }

    pub fn jump_url(&self, guild_id: GuildId) -> String {
        format!("https://discord.com/channels/{}/{}/{}", guild_id, self.channel_id, self.message_id)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn board_message(id: u64, text: &str) -> BoardMessage {
        BoardMessage {
            id: MessageId::new(id),
            author_id: UserId::new(99),
            text: text.to_string(),
            content: format!("content of {id}"),
            image_url: None,
            created_at: DateTime::from_timestamp(1_600_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn parses_board_entry_text() {
        let entry = BoardEntry::parse("⭐ **12** <#381986593986052107> ID: 761425977401933845").unwrap();

        assert_eq!(entry.stars, 12);
        assert_eq!(entry.channel_id, ChannelId::new(381986593986052107));
        assert_eq!(entry.id, MessageId::new(761425977401933845));
        assert_eq!(BoardEntry::parse(&entry.render()), Some(entry));
    }

    #[test]
    fn rejects_mismatched_and_zero_ids() {
        assert_eq!(BoardEntry::parse("**12** in #general ID: 5"), None);
        assert_eq!(BoardEntry::parse("**12** <#0> ID: 5"), None);
        assert_eq!(BoardEntry::parse("**12** <#1> ID: 0"), None);
    }

    #[test]
    fn resolve_takes_identity_from_the_entry_and_the_board_message() {
        let message = board_message(500, "**3** <#10> ID: 20");
        let entry = BoardEntry::parse(&message.text).unwrap();
        let payload = StarredMessagePayload::resolve(&message, &entry);

        assert_eq!(payload.message_id, MessageId::new(20));
        assert_eq!(payload.star_id, MessageId::new(500));
        assert_eq!(payload.channel_id, ChannelId::new(10));
        assert_eq!(payload.stars, 3);
        assert!(payload.has_id(MessageId::new(20)) && payload.has_id(MessageId::new(500)));
        assert_eq!(payload.jump_url(GuildId::new(1)), "https://discord.com/channels/1/10/20");
    }

    #[test]
    fn only_known_extensions_are_images() {
        let message = board_message(500, "**3** <#10> ID: 20");
        let entry = BoardEntry::parse(&message.text).unwrap();
        let mut payload = StarredMessagePayload::resolve(&message, &entry);
        assert!(!payload.has_image());

        payload.image_url = Some("https://cdn.discordapp.com/a/B.PNG".to_string());
        assert!(payload.has_image());

        payload.image_url = Some("https://cdn.discordapp.com/a/b.mp4".to_string());
        assert!(!payload.has_image());
    }
}
