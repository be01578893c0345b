//! Report mail connectors.

pub mod mock;
pub mod sendgrid;

pub use mock::{MockReportMailer, SentReport};
pub use sendgrid::{SendGridConfig, SendGridConnector};
