use chrono::{DateTime, FixedOffset, Utc};
use serenity::all::{ChannelId, GuildId, MessageId, RoleId, UserId};

/// Snowflakes are never zero, serenity panics on them.
pub fn message_id(raw: u64) -> Option<MessageId> {
    (raw != 0).then(|| MessageId::new(raw))
}

pub fn channel_id(raw: u64) -> Option<ChannelId> {
    (raw != 0).then(|| ChannelId::new(raw))
}

pub fn user_id(raw: u64) -> Option<UserId> {
    (raw != 0).then(|| UserId::new(raw))
}

pub fn guild_id(raw: u64) -> Option<GuildId> {
    (raw != 0).then(|| GuildId::new(raw))
}

pub fn role_id(raw: u64) -> Option<RoleId> {
    (raw != 0).then(|| RoleId::new(raw))
}

pub fn now_in_my_timezone(utc_offset_hours: i32) -> Option<DateTime<FixedOffset>> {
    let offset = FixedOffset::east_opt(utc_offset_hours.checked_mul(3600)?)?;
    Some(Utc::now().with_timezone(&offset))
}

/// "genshin impact" -> "Genshin Impact"
pub fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Uppercases the first character only, the way error replies are shown.
pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
