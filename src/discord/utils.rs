use chrono::{DateTime, Utc};
use serenity::all::{Context, CreateActionRow, CreateButton, CreateEmbed, CreateEmbedAuthor, GuildId, Timestamp, UserId};

use crate::starboard::{BoardEntry, StarredMessagePayload};

pub const EMBED_COLOUR: u32 = 0xFFAC33;

pub struct EmbedAuthor {
    pub name: String,
    pub icon_url: String,
}

pub async fn resolve_author(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<EmbedAuthor> {
    match guild_id.member(ctx, user_id).await {
        Ok(member) => Some(EmbedAuthor { name: member.display_name().to_string(), icon_url: member.face() }),
        Err(_) => match user_id.to_user(ctx).await {
            Ok(user) => Some(EmbedAuthor { name: user.name.clone(), icon_url: user.face() }),
            Err(e) => {
                tracing::warn!("Could not resolve starred message author {}: {}", user_id, e);
                None
            }
        },
    }
}

/// The board entry line shown above a starred message.
pub fn entry_line(payload: &StarredMessagePayload) -> String {
    format!("⭐ {}", BoardEntry { stars: payload.stars, channel_id: payload.channel_id, id: payload.message_id }.render())
}

pub fn starboard_embed(payload: &StarredMessagePayload, guild_id: GuildId, author: Option<&EmbedAuthor>) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .colour(EMBED_COLOUR)
        .description(payload.content.clone())
        .field("Original", format!("[Jump!]({})", payload.jump_url(guild_id)), false);

    if let Some(author) = author {
        embed = embed.author(CreateEmbedAuthor::new(author.name.clone()).icon_url(author.icon_url.clone()));
    }
    if payload.has_image() {
        if let Some(url) = &payload.image_url {
            embed = embed.image(url.clone());
        }
    }
    if let Some(timestamp) = to_timestamp(payload.created_at) {
        embed = embed.timestamp(timestamp);
    }

    embed
}

fn to_timestamp(created_at: DateTime<Utc>) -> Option<Timestamp> {
    Timestamp::from_unix_timestamp(created_at.timestamp()).ok()
}

pub fn page_buttons(prefix: &str, disabled: bool) -> Vec<CreateActionRow> {
    vec![CreateActionRow::Buttons(vec![
        CreateButton::new(format!("{prefix}prev")).emoji('◀').disabled(disabled),
        CreateButton::new(format!("{prefix}next")).emoji('▶').disabled(disabled),
    ])]
}
