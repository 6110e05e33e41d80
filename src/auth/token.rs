//! Cached access token models.

pub mod record;
pub mod secret;
