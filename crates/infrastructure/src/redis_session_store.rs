//! Redis-backed session store.

use std::collections::HashMap;

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::debug;
use uuid::Uuid;

use gateward_application::{SessionRecord, SessionStore};
use gateward_core::{AppError, AppResult};

/// Redis implementation of the session store port.
///
/// Sessions are stored as JSON strings under `<prefix>:<token>` keys and
/// expire through the key TTL.
#[derive(Clone)]
pub struct RedisSessionStore {
    client: redis::Client,
    key_prefix: String,
    ttl_seconds: u64,
}

impl RedisSessionStore {
    /// Creates a session store with a configured Redis client, key prefix,
    /// and session lifetime.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>, ttl_seconds: u64) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
            ttl_seconds,
        }
    }

    fn key_for(&self, access_token: &str) -> String {
        format!("{}:{access_token}", self.key_prefix)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, access_token: &str) -> AppResult<Option<SessionRecord>> {
        let key = self.key_for(access_token);
        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))?;

        let encoded: Option<String> = connection
            .get(key)
            .await
            .map_err(|error| AppError::Internal(format!("failed to read session: {error}")))?;

        encoded
            .as_deref()
            .map(|encoded| {
                serde_json::from_str(encoded).map_err(|error| {
                    AppError::Internal(format!("failed to decode session: {error}"))
                })
            })
            .transpose()
    }

    async fn start(
        &self,
        subject: &str,
        bag: HashMap<String, String>,
    ) -> AppResult<SessionRecord> {
        let record = SessionRecord {
            access_token: Uuid::new_v4().to_string(),
            subject: subject.to_owned(),
            bag,
        };
        let encoded = serde_json::to_string(&record)
            .map_err(|error| AppError::Internal(format!("failed to encode session: {error}")))?;

        let key = self.key_for(&record.access_token);
        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))?;

        connection
            .set_ex::<_, _, ()>(key, encoded, self.ttl_seconds)
            .await
            .map_err(|error| AppError::Internal(format!("failed to write session: {error}")))?;

        debug!(subject = record.subject.as_str(), "session started");

        Ok(record)
    }

    async fn abandon(&self, access_token: &str) -> AppResult<bool> {
        let key = self.key_for(access_token);
        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))?;

        let removed: i64 = connection
            .del(key)
            .await
            .map_err(|error| AppError::Internal(format!("failed to drop session: {error}")))?;

        debug!(removed = removed > 0, "session abandoned");

        Ok(removed > 0)
    }
}
