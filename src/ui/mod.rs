//! Discord presentation helpers.

pub mod buttons;
pub mod embeds;
