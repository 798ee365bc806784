use std::cmp::Reverse;
use std::sync::Arc;

use futures::StreamExt;
use serenity::all::{ChannelId, Context, GuildChannel, Message, MessageId, MessageUpdateEvent, User, UserId};
use serenity::async_trait;

use crate::config::BotConfig;
use crate::discord::commands::{Context as CommandContext, Error};
use crate::discord::errors::BotError;
use crate::discord::traits::{Cog, CogEvent, EventKind};
use crate::discord::utils::{entry_line, resolve_author, starboard_embed};
use crate::discord::view::{paginate, send_deletable, Page};
use crate::starboard::{BoardEntry, BoardMessage, Filter, Starboard, StarboardError};
use crate::utils::channel_id;

pub const NOT_FOUND: &str = "❓ This message could not be found.";

/// Feeds board channel traffic into the [`Starboard`].
pub struct StarboardCog {
    config: Arc<BotConfig>,
    starboard: Arc<Starboard>,
}

impl StarboardCog {
    pub fn new(config: Arc<BotConfig>, starboard: Arc<Starboard>) -> Self {
        StarboardCog { config, starboard }
    }

    fn board(&self) -> Option<ChannelId> {
        channel_id(self.config.starboard.channel_id)
    }

    async fn warm_up(&self, ctx: &Context) -> anyhow::Result<()> {
        let Some(board) = self.board() else {
            tracing::warn!("No starboard channel configured");
            return Ok(());
        };

        let history = board.messages_iter(&ctx.http).map(|message| message.map(|message| BoardMessage::from(&message)));
        if let Err(e) = self.starboard.initialize(history).await {
            tracing::error!("Starboard warm-up failed, shutting down: {}", e);
            ctx.shard.shutdown_clean();
            return Err(e.into());
        }
        Ok(())
    }

    async fn on_message(&self, message: &Message) -> anyhow::Result<()> {
        if Some(message.channel_id) != self.board() {
            return Ok(());
        }

        match self.starboard.add(&BoardMessage::from(message)).await {
            Ok(true) => tracing::debug!("Starred message added from board entry {}", message.id),
            Ok(false) => {}
            Err(StarboardError::Malformed(id)) => tracing::warn!("Ignoring board message {} without an entry line", id),
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    async fn on_message_update(&self, ctx: &Context, event: &MessageUpdateEvent) -> anyhow::Result<()> {
        if Some(event.channel_id) != self.board() {
            return Ok(());
        }

        let message = BoardMessage::from(&event.channel_id.message(ctx, event.id).await?);
        let Some(entry) = BoardEntry::parse(&message.text) else {
            return Ok(());
        };

        match self.starboard.update(&message.content, entry.stars, entry.id).await {
            Ok(_) => Ok(()),
            Err(StarboardError::NotFound(_)) => {
                self.starboard.add(&message).await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn on_message_delete(&self, channel_id: ChannelId, message_id: MessageId) -> anyhow::Result<()> {
        if Some(channel_id) != self.board() {
            return Ok(());
        }

        if self.starboard.delete(message_id).await? {
            tracing::debug!("Board entry {} deleted", message_id);
        }
        Ok(())
    }
}

#[async_trait]
impl Cog for StarboardCog {
    fn name(&self) -> &'static str {
        "starboard"
    }

    fn events(&self) -> &'static [EventKind] {
        &[EventKind::Ready, EventKind::Message, EventKind::MessageUpdate, EventKind::MessageDelete]
    }

    async fn handle(&self, ctx: &Context, event: &CogEvent<'_>) -> anyhow::Result<()> {
        match event {
            CogEvent::Ready(_) => self.warm_up(ctx).await,
            CogEvent::Message(message) => self.on_message(message).await,
            CogEvent::MessageUpdate(event) => self.on_message_update(ctx, event).await,
            CogEvent::MessageDelete { channel_id, message_id } => self.on_message_delete(*channel_id, *message_id).await,
            CogEvent::MemberJoin(_) => Ok(()),
        }
    }
}

/// At least one filter is required, `id` matches either the source message or its board entry.
pub fn build_filters(id: Option<MessageId>, message: Option<MessageId>, stars: Option<i64>, channel: Option<ChannelId>, author: Option<UserId>) -> Result<Vec<Filter>, BotError> {
    let filters: Vec<Filter> = [id.map(Filter::Id), message.map(Filter::MessageId), stars.map(Filter::Stars), channel.map(Filter::ChannelId), author.map(Filter::AuthorId)].into_iter().flatten().collect();

    if filters.is_empty() {
        return Err(BotError::MissingArguments("id, message, stars, channel, author"));
    }
    Ok(filters)
}

/// Look up starred messages.
#[poise::command(prefix_command, slash_command, guild_only, track_edits)]
pub async fn starboard(
    ctx: CommandContext<'_>,
    #[description = "Source message or board entry id"] id: Option<MessageId>,
    #[description = "Source message id"] message: Option<MessageId>,
    #[description = "Exact star count"] stars: Option<i64>,
    #[description = "Channel the message was posted in"] channel: Option<GuildChannel>,
    #[description = "Who wrote the message"] author: Option<User>,
    #[description = "Only show the first match"]
    #[flag]
    one: bool,
) -> Result<(), Error> {
    let filters = build_filters(id, message, stars, channel.map(|channel| channel.id), author.map(|author| author.id))?;
    let guild_id = ctx.guild_id().ok_or(BotError::NotInGuild)?;
    let starboard = &ctx.data().starboard;
    if !starboard.is_ready() {
        ctx.defer().await?;
    }

    let mut found: Vec<_> = if one { starboard.get(&filters).await?.into_iter().collect() } else { starboard.query(&filters).await?.collect() };
    found.sort_by_key(|payload| Reverse(payload.created_at));

    let mut pages = Vec::with_capacity(found.len());
    for payload in &found {
        let author = resolve_author(ctx.serenity_context(), guild_id, payload.author_id).await;
        pages.push(Page { content: entry_line(payload), embed: starboard_embed(payload, guild_id, author.as_ref()) });
    }

    match pages.len() {
        0 => {
            ctx.say(NOT_FOUND).await?;
        }
        1 => {
            if let Some(page) = pages.pop() {
                send_deletable(ctx, page).await?;
            }
        }
        _ => paginate(ctx, pages).await?,
    }
    Ok(())
}
