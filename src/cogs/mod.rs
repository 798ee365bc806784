pub(crate) mod emotes;
pub(crate) mod fun;
pub(crate) mod roles;
pub(crate) mod starboard;
pub(crate) mod worksheets;
