use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";
const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// Identity asserted by a verified Google ID token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleIdentity {
    pub google_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[derive(Debug, Error)]
pub enum GoogleAuthError {
    #[error("token rejected: {0}")]
    Rejected(String),

    #[error("token verification unavailable: {0}")]
    Unavailable(#[from] reqwest::Error),
}

/// Checks Google ID tokens.
#[async_trait]
pub trait GoogleVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> Result<GoogleIdentity, GoogleAuthError>;
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    sub: String,
    aud: String,
    iss: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

/// Verifies tokens through Google's `tokeninfo` endpoint, which checks the
/// signature and expiry; audience and issuer are checked here.
pub struct TokenInfoVerifier {
    http: reqwest::Client,
    client_id: String,
    endpoint: String,
}

impl TokenInfoVerifier {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self::with_endpoint(client_id, TOKENINFO_URL)
    }

    pub fn with_endpoint(client_id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id: client_id.into(),
            endpoint: endpoint.into(),
        }
    }

    fn check(&self, info: TokenInfo) -> Result<GoogleIdentity, GoogleAuthError> {
        if info.aud != self.client_id {
            return Err(GoogleAuthError::Rejected("audience mismatch".to_string()));
        }
        if !GOOGLE_ISSUERS.contains(&info.iss.as_str()) {
            return Err(GoogleAuthError::Rejected(format!(
                "unexpected issuer {}",
                info.iss
            )));
        }

        Ok(GoogleIdentity {
            google_id: info.sub,
            email: info.email,
            name: info.name,
            picture: info.picture,
        })
    }
}

#[async_trait]
impl GoogleVerifier for TokenInfoVerifier {
    async fn verify(&self, id_token: &str) -> Result<GoogleIdentity, GoogleAuthError> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("id_token", id_token)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GoogleAuthError::Rejected(format!(
                "tokeninfo returned {}",
                response.status()
            )));
        }

        let info: TokenInfo = response.json().await?;
        self.check(info)
    }
}
