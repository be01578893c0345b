//! Chat platform connectors.

pub mod discord;
pub mod mock;

pub use discord::{CommunityConfig, DiscordConfig, DiscordConnector};
pub use mock::MockCommunityConnector;
