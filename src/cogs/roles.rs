use std::sync::Arc;

use futures::StreamExt;
use serenity::all::{Context, GuildId, Member, RoleId};
use serenity::async_trait;

use crate::config::BotConfig;
use crate::discord::commands::{Context as CommandContext, Error};
use crate::discord::errors::{is_forbidden, BotError};
use crate::discord::state::Trigger;
use crate::discord::traits::{Cog, CogEvent, EventKind};
use crate::utils::{guild_id, role_id, title_case};

/// Community role upkeep and self-assigned feature roles.
pub struct RolesCog {
    config: Arc<BotConfig>,
}

impl RolesCog {
    pub fn new(config: Arc<BotConfig>) -> Self {
        RolesCog { config }
    }

    fn community(&self) -> Option<(GuildId, RoleId)> {
        Some((guild_id(self.config.home_guild_id)?, role_id(self.config.roles.community)?))
    }

    async fn assign_community_role(&self, ctx: &Context) -> anyhow::Result<()> {
        let Some((home, community)) = self.community() else {
            tracing::warn!("No home guild or community role configured");
            return Ok(());
        };

        let mut assigned = 0;
        let mut total = 0;
        let mut members = home.members_iter(ctx).boxed();
        while let Some(member) = members.next().await {
            let member = match member {
                Ok(member) => member,
                Err(e) => {
                    tracing::warn!("Stopped listing members of {}: {}", home, e);
                    break;
                }
            };
            if member.roles.contains(&community) {
                continue;
            }

            total += 1;
            match member.add_role(&ctx.http, community).await {
                Ok(_) => assigned += 1,
                Err(e) if is_forbidden(&e) => tracing::warn!("Not allowed to give {} the community role", member.user.name),
                Err(e) => tracing::warn!("Failed to give {} the community role: {}", member.user.name, e),
            }
        }

        if assigned != 0 && total != 0 {
            tracing::info!("Assigned community role to {}/{} members", assigned, total);
        }
        Ok(())
    }

    async fn welcome(&self, ctx: &Context, member: &Member) -> anyhow::Result<()> {
        let Some((home, community)) = self.community() else {
            return Ok(());
        };
        if member.guild_id != home {
            return Ok(());
        }

        member.add_role(&ctx.http, community).await?;
        Ok(())
    }
}

#[async_trait]
impl Cog for RolesCog {
    fn name(&self) -> &'static str {
        "roles"
    }

    fn events(&self) -> &'static [EventKind] {
        &[EventKind::Ready, EventKind::MemberJoin]
    }

    async fn handle(&self, ctx: &Context, event: &CogEvent<'_>) -> anyhow::Result<()> {
        match event {
            CogEvent::Ready(_) => self.assign_community_role(ctx).await,
            CogEvent::MemberJoin(member) => self.welcome(ctx, member).await,
            _ => Ok(()),
        }
    }
}

/// Feature names are matched lowercase, aliases included.
pub fn find_feature(config: &BotConfig, feature: &str) -> Option<RoleId> {
    config.roles.features.get(&feature.trim().to_lowercase()).and_then(|id| role_id(*id))
}

pub fn opted_message(trigger: Trigger, feature: &str) -> String {
    format!("Opted {}: **{}**", trigger, title_case(&feature.trim().to_lowercase()))
}

/// Join or leave a feature role.
#[poise::command(prefix_command, slash_command, guild_only, track_edits)]
pub async fn opt(ctx: CommandContext<'_>, #[description = "in or out"] trigger: Trigger, #[description = "Feature name"] #[rest] feature: String) -> Result<(), Error> {
    let Some(role) = find_feature(&ctx.data().config, &feature) else {
        return Err(BotError::UnknownFeature(feature.trim().to_lowercase()).into());
    };
    let member = ctx.author_member().await.ok_or(BotError::NotInGuild)?;

    let has_role = member.roles.contains(&role);
    match trigger {
        Trigger::In if !has_role => member.add_role(ctx.http(), role).await?,
        Trigger::Out if has_role => member.remove_role(ctx.http(), role).await?,
        _ => {}
    }

    ctx.say(opted_message(trigger, &feature)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    fn config() -> BotConfig {
        parse_config(
            "
home_guild_id: 1
starboard:
  channel_id: 2
roles:
  community: 761425977401933845
  features:
    genshin: 763866942074912779
    genshin impact: 763866942074912779
    minecraft: 782302123164565556
worksheets:
  channel_id: 3
  mention_user_id: 4
",
        )
        .unwrap()
    }

    #[test]
    fn features_match_names_and_aliases_in_any_case() {
        let config = config();

        assert_eq!(find_feature(&config, "Genshin Impact"), Some(RoleId::new(763866942074912779)));
        assert_eq!(find_feature(&config, "GENSHIN"), Some(RoleId::new(763866942074912779)));
        assert_eq!(find_feature(&config, "terraria"), None);
    }

    #[test]
    fn replies_name_the_feature_in_title_case() {
        assert_eq!(opted_message(Trigger::In, "genshin impact"), "Opted in: **Genshin Impact**");
        assert_eq!(opted_message(Trigger::Out, "MINECRAFT"), "Opted out: **Minecraft**");
    }

    #[test]
    fn unknown_features_are_quoted() {
        let error = BotError::UnknownFeature("terraria".to_string());
        assert_eq!(crate::utils::capitalize(&error.to_string()), "No feature called \"terraria\"");
    }
}
