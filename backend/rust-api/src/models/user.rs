use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::quiz::QuizResult;

/// How an account authenticates.
///
/// Serialized as `email` (password login) or `google` (OAuth sign-in), the
/// values the history API has always exchanged.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    #[default]
    Email,
    Google,
}

impl AuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthProvider::Email => "email",
            AuthProvider::Google => "google",
        }
    }
}

/// Stored user record, independent of the backing store.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    /// `None` for accounts created through Google sign-in.
    pub password_hash: Option<String>,
    pub auth_provider: AuthProvider,
    pub google_id: Option<String>,
    pub avatar: Option<String>,
    /// Most recent result first.
    pub quiz_history: Vec<QuizResult>,
    pub created_at: DateTime<Utc>,
}

/// User fields known before the store assigns an id.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub auth_provider: AuthProvider,
    pub google_id: Option<String>,
    pub avatar: Option<String>,
}

/// User profile returned to client (without sensitive data)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub auth_provider: AuthProvider,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub quiz_history: Vec<QuizResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        UserProfile {
            id: user.id,
            name: user.name,
            email: user.email,
            auth_provider: user.auth_provider,
            avatar: user.avatar,
            quiz_history: user.quiz_history,
            created_at: Some(user.created_at),
        }
    }
}

/// Emails are stored trimmed and lowercased so lookups are case-insensitive.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Request to create a password account
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SignupRequest {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[serde(default)]
    #[validate(length(min = 6, message = "Password must be at least 6 characters long"))]
    pub password: String,
}

impl SignupRequest {
    pub fn has_missing_fields(&self) -> bool {
        self.name.trim().is_empty() || self.email.trim().is_empty() || self.password.is_empty()
    }
}

/// Request to login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub password: String,
}

impl LoginRequest {
    pub fn has_missing_fields(&self) -> bool {
        self.email.trim().is_empty() || self.password.is_empty()
    }
}

/// Google Identity Services credential (an ID token)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleAuthRequest {
    #[serde(default)]
    pub credential: String,
}

/// Response after successful signup, login or Google sign-in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub message: String,
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub user: UserProfile,
}
