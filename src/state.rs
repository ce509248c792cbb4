use crate::config::GatewayConfig;
use crate::engine::EngineClient;
use crate::store::CredentialStore;
use std::sync::Arc;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub config: GatewayConfig,
    pub store: CredentialStore,
    pub engine: EngineClient,
}

impl AppState {
    pub fn new(config: GatewayConfig, store: CredentialStore, engine: EngineClient) -> SharedState {
        Arc::new(Self {
            config,
            store,
            engine,
        })
    }

    /// Build state from config: open the users file and the engine client.
    pub async fn from_config(config: GatewayConfig) -> anyhow::Result<SharedState> {
        let store = CredentialStore::open(&config.users_file).await;
        let engine = EngineClient::new(&config.engine_url)?;
        Ok(Self::new(config, store, engine))
    }
}
