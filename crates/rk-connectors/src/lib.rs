//! # rk-connectors
//!
//! Connectors for the systems Roster Keeper reconciles: the CRM that owns
//! membership records, the mailing-list group directory, chat communities,
//! the check-in roster mirror and the mail service that distributes reports.
//!
//! The reconciliation engine depends only on the traits in [`traits`]; every
//! vendor module ships a mock implementation for tests.

pub mod chat;
pub mod checkin;
pub mod crm;
pub mod groups;
pub mod http;
pub mod mail;
pub mod secure_string;
pub mod testing;
pub mod traits;

pub use secure_string::SecureString;

pub use traits::{
    AuthConfig,
    // Chat
    CommunityConnector,
    CommunityMember,
    Connector,
    ConnectorCategory,
    ConnectorConfig,
    ConnectorError,
    ConnectorHealth,
    ConnectorResult,
    // Group directory
    GroupDirectoryConnector,
    GroupMember,
    // Source of truth
    MembershipRecord,
    MembershipSource,
    // Mail
    ReportMailer,
    // Check-in
    RosterMirror,
};

pub use chat::{CommunityConfig, DiscordConfig, DiscordConnector, MockCommunityConnector};
pub use checkin::{CheckMeInConfig, CheckMeInConnector, MockRosterMirror};
pub use crm::{MockMembershipSource, SalesforceConfig, SalesforceConnector};
pub use groups::{GoogleGroupsConfig, GoogleGroupsConnector, MockGroupDirectory};
pub use mail::{MockReportMailer, SendGridConfig, SendGridConnector};
