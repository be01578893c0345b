//! Group directory connectors.

pub mod google;
pub mod mock;

pub use google::{GoogleGroupsConfig, GoogleGroupsConnector};
pub use mock::MockGroupDirectory;
