use std::sync::Arc;

use crate::cogs::emotes::EmoteCog;
use crate::cogs::{emotes, fun, roles, starboard, worksheets};
use crate::config::BotConfig;
use crate::starboard::Starboard;

/// Shared with every command invocation.
pub struct Data {
    pub config: Arc<BotConfig>,
    pub starboard: Arc<Starboard>,
    pub emotes: Arc<EmoteCog>,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

/// Show every command, or the details of one.
#[poise::command(prefix_command, slash_command, track_edits)]
pub async fn help(
    ctx: Context<'_>,
    #[description = "Command to show help about"]
    #[autocomplete = "poise::builtins::autocomplete_command"]
    command: Option<String>,
) -> Result<(), Error> {
    let config = poise::builtins::HelpConfiguration { extra_text_at_bottom: "Pass a command name for more about it.", ..Default::default() };
    poise::builtins::help(ctx, command.as_deref(), config).await?;
    Ok(())
}

pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![help(), roles::opt(), emotes::bonk(), fun::memory(), starboard::starboard(), worksheets::worksheets()]
}
