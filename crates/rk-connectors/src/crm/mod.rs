//! Membership source connectors.

pub mod mock;
pub mod salesforce;

pub use mock::MockMembershipSource;
pub use salesforce::{SalesforceConfig, SalesforceConnector, SalesforceFieldMap};
