//! In-memory backends.
//!
//! Used by the test suites and for running the connector without a database.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;

use checkout_pos_core::{ApiKeyId, UserId};

use super::{ApiKeyStore, OptionStore, RepositoryError, UserDirectory};
use crate::models::User;

#[derive(Default)]
pub struct MemoryOptionStore {
    values: Mutex<HashMap<String, JsonValue>>,
}

impl MemoryOptionStore {
    /// Keys currently set, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.values.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl OptionStore for MemoryOptionStore {
    async fn get(&self, key: &str) -> Result<Option<JsonValue>, RepositoryError> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &JsonValue) -> Result<(), RepositoryError> {
        self.values
            .lock()
            .await
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, RepositoryError> {
        Ok(self.values.lock().await.remove(key).is_some())
    }
}

#[derive(Default)]
pub struct MemoryUserDirectory {
    users: Mutex<BTreeMap<UserId, User>>,
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.lock().await.get(&id).cloned())
    }

    async fn upsert(&self, user: &User) -> Result<(), RepositoryError> {
        let mut users = self.users.lock().await;
        if users
            .values()
            .any(|existing| existing.id != user.id && existing.email == user.email)
        {
            return Err(RepositoryError::Conflict("email already exists".to_owned()));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn delete(&self, id: UserId) -> Result<bool, RepositoryError> {
        Ok(self.users.lock().await.remove(&id).is_some())
    }

    async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        Ok(self.users.lock().await.values().cloned().collect())
    }
}

#[derive(Default)]
pub struct MemoryApiKeyStore {
    keys: Mutex<BTreeSet<ApiKeyId>>,
}

impl MemoryApiKeyStore {
    /// Register a key so it can be revoked.
    pub async fn insert(&self, id: ApiKeyId) {
        self.keys.lock().await.insert(id);
    }

    /// Whether a key is still present.
    pub async fn contains(&self, id: ApiKeyId) -> bool {
        self.keys.lock().await.contains(&id)
    }
}

#[async_trait]
impl ApiKeyStore for MemoryApiKeyStore {
    async fn revoke(&self, id: ApiKeyId) -> Result<bool, RepositoryError> {
        Ok(self.keys.lock().await.remove(&id))
    }
}
