use reqwest::StatusCode;
use thiserror::Error;

use super::validation::FormErrors;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Rejected locally; nothing was sent.
    #[error("{0}")]
    Validation(FormErrors),

    #[error("{0}")]
    InvalidCredentials(String),

    #[error("{0}")]
    DuplicateAccount(String),

    /// The stored token was refused; the session has been cleared.
    #[error("Your session has expired. Please log in again.")]
    SessionExpired,

    #[error("Network error. Please check your internet connection and try again.")]
    Network(#[from] reqwest::Error),

    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    /// A success status whose body could not be decoded.
    #[error("Unexpected response from server. Please try again.")]
    MalformedResponse {
        status: StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Not logged in")]
    NotAuthenticated,

    #[error("failed to access token file: {0}")]
    TokenStore(#[from] std::io::Error),
}

impl ClientError {
    /// Whether the caller should send the user back to the login screen.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            ClientError::SessionExpired | ClientError::NotAuthenticated
        )
    }
}

impl From<FormErrors> for ClientError {
    fn from(errors: FormErrors) -> Self {
        ClientError::Validation(errors)
    }
}
