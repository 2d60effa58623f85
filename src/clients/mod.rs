//! Clients for the external services: CRM, document store and messaging

pub mod crm;
pub mod drive;
pub mod http;
pub mod messaging;
pub mod mock;

pub use crm::{CrmClient, CrmCredentials, PipedriveClient};
pub use drive::{DocumentStore, DriveClient, DriveFile};
pub use messaging::{Channel, MessagingClient, SlackClient};
pub use mock::{MockCrm, MockDrive, MockMessaging};
