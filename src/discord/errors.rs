use serenity::http::HttpError;
use thiserror::Error;

use crate::discord::commands::{Data, Error};
use crate::utils::capitalize;

/// Failures a command reports back to whoever invoked it.
#[derive(Error, Debug)]
pub enum BotError {
    #[error("missing at least 1 required argument: {0}")]
    MissingArguments(&'static str),
    #[error("{value} is {comparative} than {bound}")]
    OutOfRange { value: i64, comparative: &'static str, bound: i64 },
    #[error("this command only works in a server")]
    NotInGuild,
    #[error("no feature called \"{0}\"")]
    UnknownFeature(String),
}

/// A 403 from discord, the bot lacks the permission for what it tried.
pub fn is_forbidden(error: &serenity::Error) -> bool {
    match error {
        serenity::Error::Http(HttpError::UnsuccessfulRequest(response)) => response.status_code.as_u16() == 403,
        _ => false,
    }
}

/// Swallows permission failures with a warning, anything else is passed on.
pub fn handle_forbidden<T>(result: Result<T, serenity::Error>, action: &str) -> Result<Option<T>, serenity::Error> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if is_forbidden(&e) => {
            tracing::warn!("Missing permissions to {}", action);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

pub async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => {
            tracing::error!("Failed to start the framework: {:?}", error);
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            tracing::warn!("Command {} failed: {}", ctx.command().qualified_name, error);
            if let Err(e) = ctx.say(capitalize(&error.to_string())).await {
                tracing::error!("Failed to report command error: {}", e);
            }
        }
        poise::FrameworkError::ArgumentParse { error, input, ctx, .. } => {
            let response = match input {
                Some(input) => format!("{} (from \"{}\")", capitalize(&error.to_string()), input),
                None => capitalize(&error.to_string()),
            };
            if let Err(e) = ctx.say(response).await {
                tracing::error!("Failed to report argument error: {}", e);
            }
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                tracing::error!("Error while handling error: {}", e);
            }
        }
    }
}
