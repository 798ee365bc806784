pub(crate) mod bot;
pub(crate) mod commands;
pub(crate) mod errors;
pub(crate) mod state;
pub(crate) mod traits;
pub(crate) mod utils;
pub(crate) mod view;
