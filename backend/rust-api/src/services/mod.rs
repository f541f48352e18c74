use anyhow::Context;
use std::sync::Arc;

use crate::config::{Config, StoreKind};
use crate::middlewares::auth::JwtService;

pub mod auth_service;
pub mod google_verifier;
pub mod quiz_service;
pub mod user_store;

use google_verifier::{GoogleVerifier, TokenInfoVerifier};
use user_store::{InMemoryUserStore, MongoUserStore, UserStore};

pub struct AppState {
    pub config: Config,
    pub users: Arc<dyn UserStore>,
    /// `None` when no Google client id is configured.
    pub google: Option<Arc<dyn GoogleVerifier>>,
    pub jwt: JwtService,
}

impl AppState {
    pub fn new(
        config: Config,
        users: Arc<dyn UserStore>,
        google: Option<Arc<dyn GoogleVerifier>>,
    ) -> Self {
        let jwt = JwtService::new(&config.jwt_secret, config.token_ttl_days);
        Self {
            config,
            users,
            google,
            jwt,
        }
    }

    /// Connect the configured store and Google verifier.
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        let users: Arc<dyn UserStore> = match config.store {
            StoreKind::Mongo => {
                let client = mongodb::Client::with_uri_str(&config.mongo_uri)
                    .await
                    .context("Failed to connect to MongoDB")?;
                let store = MongoUserStore::new(client.database(&config.mongo_database));
                store.ensure_indexes().await?;
                tracing::info!(database = %config.mongo_database, "MongoDB connected");
                Arc::new(store)
            }
            StoreKind::Memory => {
                tracing::warn!("Using in-memory user store; accounts are lost on restart");
                Arc::new(InMemoryUserStore::new())
            }
        };

        let google = match &config.google_client_id {
            Some(client_id) => {
                Some(Arc::new(TokenInfoVerifier::new(client_id.clone())) as Arc<dyn GoogleVerifier>)
            }
            None => {
                tracing::info!("GOOGLE_CLIENT_ID not set; Google sign-in disabled");
                None
            }
        };

        Ok(Self::new(config, users, google))
    }
}
