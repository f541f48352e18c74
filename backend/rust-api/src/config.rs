use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::client::DEFAULT_SERVER_BASE;
use crate::quiz::controller::DEFAULT_QUESTION_COUNT;
use crate::quiz::trivia::DEFAULT_TRIVIA_BASE;

const DEV_JWT_SECRET: &str = "dev-secret-only-for-local-testing";

/// Where user accounts are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Mongo,
    Memory,
}

impl FromStr for StoreKind {
    type Err = config::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StoreKind::Mongo),
            "memory" => Ok(StoreKind::Memory),
            other => Err(config::ConfigError::Message(format!(
                "unknown store kind '{}' (expected mongo or memory)",
                other
            ))),
        }
    }
}

/// Backend settings.
#[derive(Debug, Clone)]
pub struct Config {
    pub app_env: String,
    pub port: u16,
    pub store: StoreKind,
    pub mongo_uri: String,
    pub mongo_database: String,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    pub bcrypt_cost: u32,
    pub google_client_id: Option<String>,
    pub cors_origins: Vec<String>,
    pub static_dir: Option<PathBuf>,
    /// `user:password` guarding `/metrics`.
    pub metrics_auth: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/*.toml, then APP__SECTION__KEY overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", app_env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let port = settings
            .get_int("server.port")
            .ok()
            .or_else(|| env::var("PORT").ok().and_then(|p| p.parse().ok()))
            .unwrap_or(3000);
        let port = u16::try_from(port)
            .map_err(|_| config::ConfigError::Message(format!("invalid port {}", port)))?;

        let store = match settings.get_string("database.store") {
            Ok(kind) => kind.parse()?,
            Err(_) => StoreKind::Mongo,
        };

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGODB_URI"))
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());

        let mongo_database = settings
            .get_string("database.mongo_database")
            .unwrap_or_else(|_| "quizthon".to_string());

        let jwt_secret = match settings
            .get_string("auth.jwt_secret")
            .or_else(|_| env::var("JWT_SECRET"))
        {
            Ok(secret) => secret,
            Err(_) if app_env == "prod" => {
                return Err(config::ConfigError::Message(
                    "JWT_SECRET must be set in production".to_string(),
                ))
            }
            Err(_) => {
                eprintln!("WARNING: Using default JWT_SECRET (dev mode only!)");
                DEV_JWT_SECRET.to_string()
            }
        };

        let token_ttl_days = settings.get_int("auth.token_ttl_days").unwrap_or(7);
        let bcrypt_cost = settings
            .get_int("auth.bcrypt_cost")
            .ok()
            .and_then(|c| u32::try_from(c).ok())
            .unwrap_or(bcrypt::DEFAULT_COST);

        let google_client_id = settings
            .get_string("auth.google_client_id")
            .or_else(|_| env::var("GOOGLE_CLIENT_ID"))
            .ok()
            .filter(|id| !id.trim().is_empty());

        let cors_origins = settings
            .get_string("server.cors_origins")
            .map(|origins| split_list(&origins))
            .unwrap_or_default();

        let static_dir = settings
            .get_string("server.static_dir")
            .ok()
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);

        let metrics_auth = settings
            .get_string("metrics.auth")
            .or_else(|_| env::var("METRICS_AUTH"))
            .unwrap_or_else(|_| "admin:changeme".to_string());

        Ok(Config {
            app_env,
            port,
            store,
            mongo_uri,
            mongo_database,
            jwt_secret,
            token_ttl_days,
            bcrypt_cost,
            google_client_id,
            cors_origins,
            static_dir,
            metrics_auth,
        })
    }

    pub fn is_production(&self) -> bool {
        self.app_env == "prod"
    }

    /// In-memory settings for tests and local runs without a database.
    pub fn for_tests() -> Self {
        Config {
            app_env: "test".to_string(),
            port: 0,
            store: StoreKind::Memory,
            mongo_uri: String::new(),
            mongo_database: "quizthon_test".to_string(),
            jwt_secret: "test-secret".to_string(),
            token_ttl_days: 7,
            bcrypt_cost: 4,
            google_client_id: Some("test-client-id.apps.googleusercontent.com".to_string()),
            cors_origins: Vec::new(),
            static_dir: None,
            metrics_auth: "admin:changeme".to_string(),
        }
    }
}

/// Settings for the terminal client.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub server_base: String,
    pub trivia_base: String,
    pub auth_enabled: bool,
    pub token_path: PathBuf,
    pub question_count: usize,
}

impl ClientConfig {
    /// Defaults overridden by `QUIZ__*` variables, e.g. `QUIZ__AUTH_ENABLED=false`.
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        config::Config::builder()
            .set_default("server_base", DEFAULT_SERVER_BASE)?
            .set_default("trivia_base", DEFAULT_TRIVIA_BASE)?
            .set_default("auth_enabled", true)?
            .set_default("token_path", ".quizthon/auth_token")?
            .set_default("question_count", DEFAULT_QUESTION_COUNT as u64)?
            .add_source(
                config::Environment::with_prefix("QUIZ")
                    .prefix_separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
