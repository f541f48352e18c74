use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::{self, doc, oid::ObjectId};
use mongodb::options::{IndexOptions, ReturnDocument};
use mongodb::{Collection, Database, IndexModel};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::metrics::track_store_operation;
use crate::models::user::{AuthProvider, NewUser, User};
use crate::models::QuizResult;

const USERS_COLLECTION: &str = "users";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a user with this email already exists")]
    Conflict,

    #[error("user not found")]
    NotFound,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Account persistence used by the auth and history handlers.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError>;

    /// `email` must already be normalized.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_email_or_google_id(
        &self,
        email: &str,
        google_id: &str,
    ) -> Result<Option<User>, StoreError>;

    /// Fails with [`StoreError::Conflict`] when the email is taken.
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;

    /// Switch an account to Google sign-in.
    async fn link_google(
        &self,
        id: &str,
        google_id: &str,
        avatar: Option<String>,
    ) -> Result<User, StoreError>;

    /// Put `result` at the front of the user's history.
    async fn prepend_result(&self, id: &str, result: &QuizResult) -> Result<(), StoreError>;
}

mod bson_datetime_as_chrono {
    use chrono::{DateTime, Utc};
    use mongodb::bson;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        bson::DateTime::from_millis(date.timestamp_millis()).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bson_dt = bson::DateTime::deserialize(deserializer)?;
        DateTime::from_timestamp_millis(bson_dt.timestamp_millis())
            .ok_or_else(|| D::Error::custom("datetime out of range"))
    }
}

/// Shape of a document in the `users` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    name: String,
    email: String,
    #[serde(rename = "password", default, skip_serializing_if = "Option::is_none")]
    password_hash: Option<String>,
    #[serde(default)]
    auth_provider: AuthProvider,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    google_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    avatar: Option<String>,
    #[serde(default)]
    quiz_history: Vec<QuizResult>,
    #[serde(with = "bson_datetime_as_chrono")]
    created_at: DateTime<Utc>,
}

impl UserDocument {
    fn into_user(self) -> Result<User, StoreError> {
        let id = self
            .id
            .ok_or_else(|| anyhow::anyhow!("user document without _id"))?;
        Ok(User {
            id: id.to_hex(),
            name: self.name,
            email: self.email,
            password_hash: self.password_hash,
            auth_provider: self.auth_provider,
            google_id: self.google_id,
            avatar: self.avatar,
            quiz_history: self.quiz_history,
            created_at: self.created_at,
        })
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        *err.kind,
        mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(ref we))
            if we.code == 11000
    )
}

/// Users kept in MongoDB.
pub struct MongoUserStore {
    db: Database,
    users: Collection<UserDocument>,
}

impl MongoUserStore {
    pub fn new(db: Database) -> Self {
        let users = db.collection::<UserDocument>(USERS_COLLECTION);
        Self { db, users }
    }

    pub async fn ensure_indexes(&self) -> anyhow::Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.users
            .create_index(index)
            .await
            .context("Failed to create unique email index")?;
        Ok(())
    }

    async fn find_one(&self, filter: bson::Document) -> Result<Option<User>, StoreError> {
        let found = self
            .users
            .find_one(filter)
            .await
            .context("Failed to query users")?;
        found.map(UserDocument::into_user).transpose()
    }
}

#[async_trait]
impl UserStore for MongoUserStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.db
            .run_command(doc! { "ping": 1 })
            .await
            .context("MongoDB ping failed")?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        let Ok(oid) = ObjectId::parse_str(id) else {
            return Ok(None);
        };
        track_store_operation("find_by_id", self.find_one(doc! { "_id": oid })).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        track_store_operation("find_by_email", self.find_one(doc! { "email": email })).await
    }

    async fn find_by_email_or_google_id(
        &self,
        email: &str,
        google_id: &str,
    ) -> Result<Option<User>, StoreError> {
        let filter = doc! { "$or": [ { "email": email }, { "googleId": google_id } ] };
        track_store_operation("find_by_email_or_google_id", self.find_one(filter)).await
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let document = UserDocument {
            id: None,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            auth_provider: user.auth_provider,
            google_id: user.google_id,
            avatar: user.avatar,
            quiz_history: Vec::new(),
            created_at: Utc::now(),
        };

        let inserted = track_store_operation("insert", async {
            match self.users.insert_one(&document).await {
                Ok(result) => Ok(result),
                Err(e) if is_duplicate_key(&e) => Err(StoreError::Conflict),
                Err(e) => Err(StoreError::Backend(
                    anyhow::Error::new(e).context("Failed to insert user"),
                )),
            }
        })
        .await?;

        let id = inserted
            .inserted_id
            .as_object_id()
            .ok_or_else(|| anyhow::anyhow!("Failed to get inserted user ID"))?;

        UserDocument {
            id: Some(id),
            ..document
        }
        .into_user()
    }

    async fn link_google(
        &self,
        id: &str,
        google_id: &str,
        avatar: Option<String>,
    ) -> Result<User, StoreError> {
        let oid = ObjectId::parse_str(id).map_err(|_| StoreError::NotFound)?;
        let update = doc! {
            "$set": {
                "googleId": google_id,
                "authProvider": AuthProvider::Google.as_str(),
                "avatar": avatar,
            }
        };

        let updated = track_store_operation("link_google", async {
            self.users
                .find_one_and_update(doc! { "_id": oid }, update)
                .return_document(ReturnDocument::After)
                .await
                .context("Failed to link Google account")
        })
        .await?;

        updated.ok_or(StoreError::NotFound)?.into_user()
    }

    async fn prepend_result(&self, id: &str, result: &QuizResult) -> Result<(), StoreError> {
        let oid = ObjectId::parse_str(id).map_err(|_| StoreError::NotFound)?;
        let entry = bson::to_bson(result).context("Failed to encode quiz result")?;
        let update = doc! {
            "$push": { "quizHistory": { "$each": [entry], "$position": 0 } }
        };

        let outcome = track_store_operation("prepend_result", async {
            self.users
                .update_one(doc! { "_id": oid }, update)
                .await
                .context("Failed to save quiz result")
        })
        .await?;

        if outcome.matched_count == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

/// Users kept in process memory; contents are lost on restart.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: Mutex<HashMap<String, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn users(&self) -> std::sync::MutexGuard<'_, HashMap<String, User>> {
        self.users
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users().get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users().values().find(|u| u.email == email).cloned())
    }

    async fn find_by_email_or_google_id(
        &self,
        email: &str,
        google_id: &str,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .users()
            .values()
            .find(|u| u.email == email || u.google_id.as_deref() == Some(google_id))
            .cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users();
        if users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict);
        }

        let stored = User {
            id: Uuid::new_v4().simple().to_string(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            auth_provider: user.auth_provider,
            google_id: user.google_id,
            avatar: user.avatar,
            quiz_history: Vec::new(),
            created_at: Utc::now(),
        };
        users.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn link_google(
        &self,
        id: &str,
        google_id: &str,
        avatar: Option<String>,
    ) -> Result<User, StoreError> {
        let mut users = self.users();
        let user = users.get_mut(id).ok_or(StoreError::NotFound)?;
        user.google_id = Some(google_id.to_string());
        user.auth_provider = AuthProvider::Google;
        user.avatar = avatar;
        Ok(user.clone())
    }

    async fn prepend_result(&self, id: &str, result: &QuizResult) -> Result<(), StoreError> {
        let mut users = self.users();
        let user = users.get_mut(id).ok_or(StoreError::NotFound)?;
        user.quiz_history.insert(0, result.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Difficulty, SaveResultRequest};

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Ada".to_string(),
            email: email.to_string(),
            password_hash: Some("hash".to_string()),
            auth_provider: AuthProvider::Email,
            google_id: None,
            avatar: None,
        }
    }

    fn result(score: u32) -> QuizResult {
        QuizResult::from_request(
            SaveResultRequest {
                category: "History".to_string(),
                difficulty: Difficulty::Hard,
                score,
                total_questions: 10,
                percentage: score * 10,
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn memory_store_rejects_duplicate_email() {
        let store = InMemoryUserStore::new();
        store.insert(new_user("ada@example.com")).await.unwrap();
        let err = store.insert(new_user("ada@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
    }

    #[tokio::test]
    async fn memory_store_prepends_results() {
        let store = InMemoryUserStore::new();
        let user = store.insert(new_user("ada@example.com")).await.unwrap();

        store.prepend_result(&user.id, &result(3)).await.unwrap();
        store.prepend_result(&user.id, &result(8)).await.unwrap();

        let stored = store.find_by_id(&user.id).await.unwrap().unwrap();
        let scores: Vec<u32> = stored.quiz_history.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![8, 3]);
    }

    #[tokio::test]
    async fn memory_store_links_google_identity() {
        let store = InMemoryUserStore::new();
        let user = store.insert(new_user("ada@example.com")).await.unwrap();

        let linked = store
            .link_google(&user.id, "google-123", Some("https://img".to_string()))
            .await
            .unwrap();
        assert_eq!(linked.auth_provider, AuthProvider::Google);

        let found = store
            .find_by_email_or_google_id("other@example.com", "google-123")
            .await
            .unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let store = InMemoryUserStore::new();
        let err = store.prepend_result("missing", &result(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[test]
    fn user_document_uses_camel_case_fields() {
        let document = UserDocument {
            id: Some(ObjectId::new()),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: None,
            auth_provider: AuthProvider::Google,
            google_id: Some("g-1".to_string()),
            avatar: None,
            quiz_history: vec![],
            created_at: Utc::now(),
        };
        let encoded = bson::to_document(&document).unwrap();
        assert!(encoded.contains_key("_id"));
        assert!(encoded.contains_key("googleId"));
        assert!(encoded.get_datetime("createdAt").is_ok());
        assert!(!encoded.contains_key("password"));
    }
}
