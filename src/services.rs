//! Collaborators shared by the transition engine and the stage handlers

use crate::clients::{
    CrmClient, DocumentStore, DriveClient, MessagingClient, MockCrm, MockDrive, MockMessaging,
    PipedriveClient, SlackClient,
};
use crate::config::FlowConfig;
use crate::credentials::SecretStore;
use crate::error::FlowResult;
use crate::notify::Publisher;
use crate::store::{ChannelRegistry, DealLedger, FolderRegistry, MemoryStore, TemplateCatalog};
use std::sync::Arc;

/// Every external dependency, injected at construction
///
/// `messaging` uses the workspace API token (channel management, user lookup);
/// `bot_messaging` uses the bot token so posted messages come from the bot user.
#[derive(Clone)]
pub struct Services {
    pub config: Arc<FlowConfig>,
    pub secrets: Arc<dyn SecretStore>,
    pub publisher: Arc<dyn Publisher>,
    pub crm: Arc<dyn CrmClient>,
    pub documents: Arc<dyn DocumentStore>,
    pub messaging: Arc<dyn MessagingClient>,
    pub bot_messaging: Arc<dyn MessagingClient>,
    pub ledger: Arc<dyn DealLedger>,
    pub folders: Arc<dyn FolderRegistry>,
    pub channels: Arc<dyn ChannelRegistry>,
    pub templates: Arc<dyn TemplateCatalog>,
}

impl Services {
    /// Live clients, with tokens resolved from the secret store
    pub async fn connect<S>(
        config: FlowConfig,
        secrets: Arc<dyn SecretStore>,
        publisher: Arc<dyn Publisher>,
        store: Arc<S>,
    ) -> FlowResult<Self>
    where
        S: DealLedger + FolderRegistry + ChannelRegistry + TemplateCatalog + 'static,
    {
        let timeout = config.request_timeout();

        let crm = PipedriveClient::with_endpoints(
            config.pipedrive_api_base.clone(),
            config.pipedrive_company_base.clone(),
            timeout,
        )?;
        let drive_token = secrets.secret(&config.gdrive_token_secret).await?;
        let documents =
            DriveClient::with_endpoint(config.gdrive_api_base.clone(), drive_token, timeout)?;
        let slack_token = secrets.secret(&config.slack_token_secret).await?;
        let messaging =
            SlackClient::with_endpoint(config.slack_api_base.clone(), slack_token, timeout)?;
        let bot_token = secrets.secret(&config.slack_bot_token_secret).await?;
        let bot_messaging =
            SlackClient::with_endpoint(config.slack_api_base.clone(), bot_token, timeout)?;

        Ok(Self {
            config: Arc::new(config),
            secrets,
            publisher,
            crm: Arc::new(crm),
            documents: Arc::new(documents),
            messaging: Arc::new(messaging),
            bot_messaging: Arc::new(bot_messaging),
            ledger: store.clone(),
            folders: store.clone(),
            channels: store.clone(),
            templates: store,
        })
    }

    /// In-memory fakes for every external service
    pub fn fakes(
        config: FlowConfig,
        secrets: Arc<dyn SecretStore>,
        publisher: Arc<dyn Publisher>,
        fakes: &Fakes,
    ) -> Self {
        Self {
            config: Arc::new(config),
            secrets,
            publisher,
            crm: fakes.crm.clone(),
            documents: fakes.drive.clone(),
            messaging: fakes.messaging.clone(),
            bot_messaging: fakes.messaging.clone(),
            ledger: fakes.store.clone(),
            folders: fakes.store.clone(),
            channels: fakes.store.clone(),
            templates: fakes.store.clone(),
        }
    }
}

/// Handles on the fakes behind [`Services::fakes`], for inspection
#[derive(Debug, Clone, Default)]
pub struct Fakes {
    pub crm: Arc<MockCrm>,
    pub drive: Arc<MockDrive>,
    pub messaging: Arc<MockMessaging>,
    pub store: Arc<MemoryStore>,
}
