//! API endpoint handlers for the moodtunes server.

pub mod media;
pub mod music;
pub mod playlists;
