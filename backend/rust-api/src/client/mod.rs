//! Client for the auth and history API, plus the local checks run before any request.

pub mod api;
pub mod error;
pub mod token_store;
pub mod validation;

pub use api::{ApiClient, DEFAULT_SERVER_BASE};
pub use error::ClientError;
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use validation::{FieldError, FormErrors, LoginForm, SignupForm};
