use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::db::Store;
use crate::security::AccountKeyCipher;
use crate::services::{
    AuthService, PreferenceService, RpcService, SeaOrmAuthService, SeaOrmPreferenceService,
    SeaOrmRpcService,
};

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub cipher: Arc<AccountKeyCipher>,

    pub auth_service: Arc<dyn AuthService>,

    pub preference_service: Arc<dyn PreferenceService>,

    pub rpc_service: Arc<dyn RpcService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        Self::with_store(config, store).await
    }

    /// Wires the services around an already opened store.
    pub async fn with_store(config: Config, store: Store) -> anyhow::Result<Self> {
        let cipher = Arc::new(AccountKeyCipher::from_config(&config.security));

        // Derive the account-key cipher before the first request.
        let warm = cipher.clone();
        tokio::task::spawn_blocking(move || warm.warm_up())
            .await
            .map_err(|e| anyhow::anyhow!("Key derivation task panicked: {e}"))?;

        let min_password_length =
            usize::try_from(config.account_manager.min_password_length).unwrap_or(usize::MAX);

        let auth_service = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            config.security.clone(),
            min_password_length,
        )) as Arc<dyn AuthService>;

        let preference_service =
            Arc::new(SeaOrmPreferenceService::new(store.clone())) as Arc<dyn PreferenceService>;

        let rpc_service = Arc::new(SeaOrmRpcService::new(
            store.clone(),
            cipher.clone(),
            auth_service.clone(),
            config.account_manager.clone(),
        )) as Arc<dyn RpcService>;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            store,
            cipher,
            auth_service,
            preference_service,
            rpc_service,
        })
    }
}
