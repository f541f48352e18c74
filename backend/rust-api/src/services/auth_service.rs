use anyhow::Context;
use bcrypt::{hash, verify};
use std::sync::Arc;
use validator::Validate;

use super::google_verifier::{GoogleAuthError, GoogleVerifier};
use super::user_store::{StoreError, UserStore};
use super::AppState;
use crate::error::ApiError;
use crate::metrics;
use crate::middlewares::auth::JwtService;
use crate::models::user::{
    normalize_email, AuthProvider, AuthResponse, LoginRequest, NewUser, SignupRequest, User,
    UserProfile,
};

const MIN_PASSWORD_LEN: usize = 6;

pub struct AuthService<'a> {
    users: Arc<dyn UserStore>,
    google: Option<Arc<dyn GoogleVerifier>>,
    jwt: &'a JwtService,
    bcrypt_cost: u32,
}

impl<'a> AuthService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self {
            users: Arc::clone(&state.users),
            google: state.google.clone(),
            jwt: &state.jwt,
            bcrypt_cost: state.config.bcrypt_cost,
        }
    }

    /// Create a password account and sign it in.
    pub async fn signup(&self, req: SignupRequest) -> Result<AuthResponse, ApiError> {
        if req.has_missing_fields() {
            return Err(ApiError::validation("Please fill in all fields"));
        }
        if req.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ApiError::validation(
                "Password must be at least 6 characters long",
            ));
        }
        let req = SignupRequest {
            name: req.name.trim().to_string(),
            email: normalize_email(&req.email),
            password: req.password,
        };
        req.validate()?;

        if self.users.find_by_email(&req.email).await?.is_some() {
            metrics::record_auth_attempt("signup", "duplicate");
            return Err(ApiError::DuplicateAccount);
        }

        let password_hash = self.hash_password(req.password).await?;
        let user = self
            .users
            .insert(NewUser {
                name: req.name,
                email: req.email,
                password_hash: Some(password_hash),
                auth_provider: AuthProvider::Email,
                google_id: None,
                avatar: None,
            })
            .await?;

        metrics::record_auth_attempt("signup", "success");
        metrics::record_user_registered(AuthProvider::Email.as_str());
        tracing::info!(user_id = %user.id, "Account created");

        self.respond("Account created successfully!", user)
    }

    pub async fn login(&self, req: LoginRequest) -> Result<AuthResponse, ApiError> {
        if req.has_missing_fields() {
            return Err(ApiError::validation("Please fill in all fields"));
        }

        let email = normalize_email(&req.email);
        let Some(user) = self.users.find_by_email(&email).await? else {
            metrics::record_auth_attempt("password", "unknown_email");
            return Err(ApiError::InvalidCredentials);
        };

        // Google-only accounts have no password to check.
        let Some(stored_hash) = user.password_hash.clone() else {
            metrics::record_auth_attempt("password", "no_password");
            return Err(ApiError::InvalidCredentials);
        };

        if !self.verify_password(req.password, stored_hash).await? {
            tracing::warn!(user_id = %user.id, "Failed login attempt: invalid password");
            metrics::record_auth_attempt("password", "invalid_password");
            return Err(ApiError::InvalidCredentials);
        }

        metrics::record_auth_attempt("password", "success");
        tracing::info!(user_id = %user.id, "Successful login");

        self.respond("Login successful!", user)
    }

    /// Sign in with a Google ID token, linking or creating the account.
    pub async fn google_login(&self, credential: &str) -> Result<AuthResponse, ApiError> {
        if credential.trim().is_empty() {
            return Err(ApiError::validation("Google credential is required"));
        }
        let verifier = self.google.as_ref().ok_or(ApiError::GoogleNotConfigured)?;

        let identity = verifier.verify(credential.trim()).await.map_err(|e| {
            metrics::record_auth_attempt("google", "rejected");
            match e {
                GoogleAuthError::Rejected(reason) => {
                    tracing::warn!("Google token rejected: {}", reason);
                    ApiError::InvalidGoogleToken
                }
                GoogleAuthError::Unavailable(e) => {
                    ApiError::Internal(anyhow::Error::new(e).context("Google token verification failed"))
                }
            }
        })?;

        let (Some(email), Some(name)) = (identity.email.as_deref(), identity.name.as_deref())
        else {
            return Err(ApiError::validation("Incomplete Google profile information"));
        };
        let email = normalize_email(email);

        let existing = self
            .users
            .find_by_email_or_google_id(&email, &identity.google_id)
            .await?;

        let user = match existing {
            Some(user) if user.google_id.is_none() => {
                tracing::info!(user_id = %user.id, "Linking Google account");
                self.users
                    .link_google(&user.id, &identity.google_id, identity.picture.clone())
                    .await?
            }
            Some(user) => user,
            None => {
                let user = self
                    .users
                    .insert(NewUser {
                        name: name.to_string(),
                        email,
                        password_hash: None,
                        auth_provider: AuthProvider::Google,
                        google_id: Some(identity.google_id.clone()),
                        avatar: identity.picture.clone(),
                    })
                    .await?;
                metrics::record_user_registered(AuthProvider::Google.as_str());
                user
            }
        };

        metrics::record_auth_attempt("google", "success");
        self.respond("Google authentication successful!", user)
    }

    pub async fn profile(&self, user_id: &str) -> Result<UserProfile, ApiError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(StoreError::NotFound)?;
        Ok(UserProfile::from(user))
    }

    fn respond(&self, message: &str, user: User) -> Result<AuthResponse, ApiError> {
        let token = self
            .jwt
            .issue(&user.id, &user.email)
            .context("Failed to issue token")?;
        Ok(AuthResponse {
            message: message.to_string(),
            token,
            user: UserProfile::from(user),
        })
    }

    async fn hash_password(&self, password: String) -> Result<String, ApiError> {
        let cost = self.bcrypt_cost;
        let hashed = tokio::task::spawn_blocking(move || hash(password, cost))
            .await
            .context("Password hashing task failed")?
            .context("Failed to hash password")?;
        Ok(hashed)
    }

    async fn verify_password(&self, password: String, stored: String) -> Result<bool, ApiError> {
        let valid = tokio::task::spawn_blocking(move || verify(password, &stored))
            .await
            .context("Password verification task failed")?
            .context("Failed to verify password")?;
        Ok(valid)
    }
}
