use std::collections::HashMap;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use serenity::all::{Context, GuildId, Mentionable, Message, ReactionType};
use serenity::async_trait;
use tokio::sync::RwLock;

use crate::config::BotConfig;
use crate::discord::commands::{Context as CommandContext, Error};
use crate::discord::errors::handle_forbidden;
use crate::discord::traits::{Cog, CogEvent, EventKind};
use crate::utils::guild_id;

lazy_static! {
    static ref EMOTE: Regex = Regex::new(r";(?P<escaped>\\)?(?P<name>[a-zA-Z0-9_]+)").unwrap();
}

pub const MESSAGE_LIMIT: usize = 2000;
const TOO_LONG: &str = "❌";
const BONK_EMOTE: &str = "angery";
const NEWSPAPER: &str = "🗞️";

/// Rewrites `;name` into the emote and collects `;\name` into a code span.
/// `None` when no known emote was mentioned.
pub fn expand(content: &str, emotes: &HashMap<String, String>) -> Option<String> {
    let mut generated = String::new();
    let mut wrapping = String::new();

    for found in EMOTE.captures_iter(content) {
        let Some(emote) = emotes.get(&found["name"]) else {
            continue;
        };

        if found.name("escaped").is_some() {
            wrapping.push_str(emote);
            wrapping.push(' ');
        } else if !wrapping.is_empty() {
            generated.push_str(&format!("`{}` {} ", wrapping, emote));
            wrapping.clear();
        } else {
            generated.push_str(emote);
        }
    }

    if !wrapping.is_empty() {
        generated.push_str(&format!("`{}`", wrapping));
    }

    (!generated.is_empty()).then_some(generated)
}

/// Emote names to their markup, filled once on ready.
pub struct EmoteCog {
    config: Arc<BotConfig>,
    emotes: RwLock<Option<HashMap<String, String>>>,
}

impl EmoteCog {
    pub fn new(config: Arc<BotConfig>) -> Self {
        EmoteCog { config, emotes: RwLock::new(None) }
    }

    async fn cache_emotes(&self, ctx: &Context, guilds: impl Iterator<Item = GuildId>) {
        let home = guild_id(self.config.home_guild_id);
        let mut emotes = HashMap::new();

        // home guild first so its names win
        for guild in home.into_iter().chain(guilds.filter(|guild| Some(*guild) != home)) {
            match guild.emojis(&ctx.http).await {
                Ok(found) => {
                    for emoji in found {
                        emotes.entry(emoji.name.clone()).or_insert_with(|| emoji.to_string());
                    }
                }
                Err(e) => tracing::warn!("Could not fetch emotes of {}: {}", guild, e),
            }
        }

        tracing::info!("Cached {} emotes", emotes.len());
        *self.emotes.write().await = Some(emotes);
    }

    pub async fn get(&self, name: &str) -> Option<String> {
        self.emotes.read().await.as_ref().and_then(|emotes| emotes.get(name).cloned())
    }

    async fn expand_message(&self, ctx: &Context, message: &Message) -> anyhow::Result<()> {
        if message.author.bot || message.content.starts_with(&self.config.prefix) {
            return Ok(());
        }

        let generated = {
            let emotes = self.emotes.read().await;
            let Some(emotes) = emotes.as_ref() else {
                return Ok(());
            };
            expand(&message.content, emotes)
        };
        let Some(generated) = generated else {
            return Ok(());
        };

        if generated.chars().count() > MESSAGE_LIMIT {
            handle_forbidden(message.react(ctx, ReactionType::Unicode(TOO_LONG.to_string())).await, "react")?;
        } else {
            handle_forbidden(message.channel_id.say(&ctx.http, generated).await, "send emotes")?;
        }
        Ok(())
    }
}

#[async_trait]
impl Cog for EmoteCog {
    fn name(&self) -> &'static str {
        "emotes"
    }

    fn events(&self) -> &'static [EventKind] {
        &[EventKind::Ready, EventKind::Message]
    }

    async fn handle(&self, ctx: &Context, event: &CogEvent<'_>) -> anyhow::Result<()> {
        match event {
            CogEvent::Ready(ready) => {
                self.cache_emotes(ctx, ready.guilds.iter().map(|guild| guild.id)).await;
                Ok(())
            }
            CogEvent::Message(message) => self.expand_message(ctx, message).await,
            _ => Ok(()),
        }
    }
}

/// React to a message with the bonk emotes.
#[poise::command(prefix_command, slash_command, owners_only, track_edits)]
pub async fn bonk(ctx: CommandContext<'_>, #[description = "Message to bonk"] message: Message) -> Result<(), Error> {
    let mut reactions = Vec::new();
    match ctx.data().emotes.get(BONK_EMOTE).await {
        Some(emote) => reactions.push(emote),
        None => tracing::warn!("No \"{}\" emote cached", BONK_EMOTE),
    }
    reactions.push(NEWSPAPER.to_string());

    for reaction in &reactions {
        let reaction = ReactionType::try_from(reaction.as_str())?;
        message.react(ctx, reaction).await?;
    }

    ctx.say(format!("{} {}", message.author.mention(), reactions.concat())).await?;
    Ok(())
}
