pub(crate) mod cache;
pub(crate) mod payload;
pub(crate) mod service;

use serenity::all::MessageId;
use thiserror::Error;

use crate::database::database::DatabaseError;

pub use cache::Filter;
pub use payload::{BoardEntry, BoardMessage, StarredMessagePayload};
pub use service::Starboard;

pub type StarboardResult<T> = Result<T, StarboardError>;

#[derive(Error, Debug)]
pub enum StarboardError {
    #[error("no starred message with id {0}")]
    NotFound(MessageId),
    #[error("message {0} is not a board entry")]
    Malformed(MessageId),
    #[error("the starboard is closed")]
    Closed,
    #[error(transparent)]
    Storage(#[from] DatabaseError),
    #[error("failed to read board history: {0}")]
    History(anyhow::Error),
}
