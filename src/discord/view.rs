use std::time::Duration;

use poise::CreateReply;
use serenity::all::{ComponentInteractionCollector, CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage, ReactionType};

use crate::discord::commands::{Context, Error};
use crate::discord::errors::handle_forbidden;
use crate::discord::utils::page_buttons;

pub const VIEW_TIMEOUT: Duration = Duration::from_secs(60);
pub const TRASH: &str = "🗑️";

pub struct Page {
    pub content: String,
    pub embed: CreateEmbed,
}

fn is_trash(emoji: &ReactionType) -> bool {
    match emoji {
        ReactionType::Unicode(emoji) => emoji.trim_end_matches('\u{fe0f}') == TRASH.trim_end_matches('\u{fe0f}'),
        _ => false,
    }
}

/// Sends a single page and lets the author delete it with a reaction until the view times out.
pub async fn send_deletable(ctx: Context<'_>, page: Page) -> Result<(), Error> {
    let reply = ctx.send(CreateReply::default().content(page.content).embed(page.embed)).await?;
    let message = reply.message().await?.into_owned();

    message.react(ctx, ReactionType::Unicode(TRASH.to_string())).await?;

    let author_id = ctx.author().id;
    let reaction = message.await_reaction(ctx).author_id(author_id).filter(|reaction| is_trash(&reaction.emoji)).timeout(VIEW_TIMEOUT).await;

    match reaction {
        Some(_) => message.delete(ctx).await?,
        None => {
            handle_forbidden(message.delete_reactions(ctx).await, "clear reactions")?;
        }
    }
    Ok(())
}

/// Shows one page at a time with previous/next buttons, disabled once nobody pressed anything for a while.
pub async fn paginate(ctx: Context<'_>, pages: Vec<Page>) -> Result<(), Error> {
    let Some(first) = pages.first() else {
        return Ok(());
    };

    let prefix = ctx.id().to_string();
    let prev_button_id = format!("{prefix}prev");
    let next_button_id = format!("{prefix}next");
    let footer = |index: usize| format!("{}/{}", index + 1, pages.len());

    let reply = ctx
        .send(CreateReply::default().content(format!("{}\n{}", first.content, footer(0))).embed(first.embed.clone()).components(page_buttons(&prefix, false)))
        .await?;

    let mut current_page = 0;
    loop {
        let filter_prefix = prefix.clone();
        let press = ComponentInteractionCollector::new(ctx).filter(move |press| press.data.custom_id.starts_with(&filter_prefix)).timeout(VIEW_TIMEOUT).await;
        let Some(press) = press else {
            break;
        };

        if press.data.custom_id == next_button_id {
            current_page = (current_page + 1) % pages.len();
        } else if press.data.custom_id == prev_button_id {
            current_page = current_page.checked_sub(1).unwrap_or(pages.len() - 1);
        } else {
            continue;
        }

        let page = &pages[current_page];
        let update = CreateInteractionResponseMessage::new().content(format!("{}\n{}", page.content, footer(current_page))).embed(page.embed.clone());
        press.create_response(ctx.serenity_context(), CreateInteractionResponse::UpdateMessage(update)).await?;
    }

    let page = &pages[current_page];
    let expired = CreateReply::default().content(format!("{}\n{}", page.content, footer(current_page))).embed(page.embed.clone()).components(page_buttons(&prefix, true));
    reply.edit(ctx, expired).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trash_matches_with_or_without_the_variation_selector() {
        assert!(is_trash(&ReactionType::Unicode("🗑️".to_string())));
        assert!(is_trash(&ReactionType::Unicode("🗑".to_string())));
        assert!(!is_trash(&ReactionType::Unicode("⭐".to_string())));
    }
}
