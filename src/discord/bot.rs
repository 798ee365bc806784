use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serenity::all::{ActivityData, ChannelId, GuildId, Member, MessageId, MessageUpdateEvent, RatelimitInfo, Ready};
use serenity::async_trait;
use serenity::model::channel::Message;
use serenity::prelude::*;

use crate::cogs::emotes::EmoteCog;
use crate::cogs::roles::RolesCog;
use crate::cogs::starboard::StarboardCog;
use crate::config::BotConfig;
use crate::database::database::Database;
use crate::discord::commands::{self, Data};
use crate::discord::errors::on_error;
use crate::discord::traits::{Cog, CogEvent, EventRegistry};
use crate::starboard::Starboard;
use crate::utils::{channel_id, guild_id, user_id};
use crate::worksheets::scheduler::{ChannelSink, WorksheetScheduler};

const EDIT_TRACKING_WINDOW: Duration = Duration::from_secs(3600);

fn presence(prefix: &str) -> ActivityData {
    ActivityData::listening(format!("{prefix}help and pings"))
}

pub struct Handler {
    registry: EventRegistry,
}

impl Handler {
    async fn dispatch(&self, ctx: &Context, event: CogEvent<'_>) {
        let kind = event.kind();
        let event = &event;
        let results = join_all(self.registry.handlers(kind).iter().map(|cog| async move { (cog.name(), cog.handle(ctx, event).await) })).await;

        for (name, result) in results {
            if let Err(e) = result {
                tracing::error!("[{}] failed to handle {:?}: {:?}", name, kind, e);
            }
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        tracing::info!("Connected as {} to {} guilds", ready.user.name, ready.guilds.len());
        self.dispatch(&ctx, CogEvent::Ready(&ready)).await;
    }

    async fn message(&self, ctx: Context, msg: Message) {
        self.dispatch(&ctx, CogEvent::Message(&msg)).await;
    }

    async fn message_update(&self, ctx: Context, _old_if_available: Option<Message>, _new: Option<Message>, event: MessageUpdateEvent) {
        self.dispatch(&ctx, CogEvent::MessageUpdate(&event)).await;
    }

    async fn message_delete(&self, ctx: Context, channel_id: ChannelId, deleted_message_id: MessageId, _guild_id: Option<GuildId>) {
        self.dispatch(&ctx, CogEvent::MessageDelete { channel_id, message_id: deleted_message_id }).await;
    }

    async fn guild_member_addition(&self, ctx: Context, new_member: Member) {
        self.dispatch(&ctx, CogEvent::MemberJoin(&new_member)).await;
    }

    async fn ratelimit(&self, data: RatelimitInfo) {
        tracing::warn!("Rate limited on {}: retry in {:?}", data.path, data.timeout);
    }
}

pub struct DiscordBot {
    client: Client,
    starboard: Arc<Starboard>,
    scheduler: Option<WorksheetScheduler>,
}

impl DiscordBot {
    pub async fn new(config: BotConfig, database: Database) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let starboard = Arc::new(Starboard::new(database));
        let emotes = Arc::new(EmoteCog::new(Arc::clone(&config)));

        let cogs: Vec<Arc<dyn Cog>> = vec![
            Arc::new(RolesCog::new(Arc::clone(&config))),
            Arc::clone(&emotes) as Arc<dyn Cog>,
            Arc::new(StarboardCog::new(Arc::clone(&config), Arc::clone(&starboard))),
        ];
        let registry = EventRegistry::new(&cogs);

        let intents = GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MEMBERS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT
            | GatewayIntents::GUILD_MESSAGE_REACTIONS
            | GatewayIntents::GUILD_EMOJIS_AND_STICKERS;

        let options = poise::FrameworkOptions {
            commands: commands::all(),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(config.prefix.clone()),
                edit_tracker: Some(Arc::new(poise::EditTracker::for_timespan(EDIT_TRACKING_WINDOW))),
                ..Default::default()
            },
            owners: config.owners.iter().filter_map(|id| user_id(*id)).collect(),
            on_error: |error| Box::pin(on_error(error)),
            pre_command: |ctx| {
                Box::pin(async move {
                    tracing::info!("{} invoked {}", ctx.author().name, ctx.command().qualified_name);
                })
            },
            ..Default::default()
        };

        let data = Data { config: Arc::clone(&config), starboard: Arc::clone(&starboard), emotes };
        let home_guild_id = guild_id(config.home_guild_id);
        let framework = poise::Framework::builder()
            .options(options)
            .setup(move |ctx, _ready, framework| {
                Box::pin(async move {
                    match home_guild_id {
                        Some(home_guild_id) => poise::builtins::register_in_guild(ctx, &framework.options().commands, home_guild_id).await?,
                        None => poise::builtins::register_globally(ctx, &framework.options().commands).await?,
                    }
                    Ok(data)
                })
            })
            .build();

        let client = Client::builder(&config.token, intents)
            .activity(presence(&config.prefix))
            .event_handler(Handler { registry })
            .framework(framework)
            .await?;

        let scheduler = channel_id(config.worksheets.channel_id).map(|channel_id| {
            let sink = ChannelSink { http: Arc::clone(&client.http), channel_id };
            WorksheetScheduler::spawn(sink, config.worksheets.clone())
        });
        if scheduler.is_none() {
            tracing::warn!("No worksheet channel configured, daily worksheets are off");
        }

        Ok(DiscordBot { client, starboard, scheduler })
    }

    /// Runs until the gateway closes. Ctrl-C stops the scheduler, then the starboard, then the shards.
    pub async fn run_bot(mut self) -> anyhow::Result<()> {
        let shard_manager = Arc::clone(&self.client.shard_manager);
        let starboard = Arc::clone(&self.starboard);
        let scheduler = self.scheduler.take();

        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Could not listen for ctrl-c: {}", e);
                return;
            }
            tracing::info!("Shutting down...");

            if let Some(scheduler) = scheduler {
                scheduler.shutdown().await;
            }
            if let Err(e) = starboard.close().await {
                tracing::error!("Failed to close the starboard: {}", e);
            }
            shard_manager.shutdown_all().await;
        });

        tracing::info!("Running discord bot");
        self.client.start().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serenity::all::ActivityType;

    use super::*;

    #[test]
    fn presence_points_at_help() {
        let activity = presence(">>>");
        assert_eq!(activity.name, ">>>help and pings");
        assert_eq!(activity.kind, ActivityType::Listening);
    }
}
