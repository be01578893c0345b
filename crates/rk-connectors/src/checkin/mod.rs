//! Check-in roster mirror connectors.

pub mod checkmein;
pub mod mock;

pub use checkmein::{render_bulk_add_csv, CheckMeInConfig, CheckMeInConnector};
pub use mock::MockRosterMirror;
