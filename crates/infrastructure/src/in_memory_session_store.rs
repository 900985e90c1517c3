//! In-memory session store for tests and single-process deployments.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use gateward_application::{SessionRecord, SessionStore};
use gateward_core::AppResult;

/// Session store keeping all records in process memory.
///
/// Records never expire on their own; the store is meant for tests and
/// development setups where losing sessions on restart is acceptable.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl InMemorySessionStore {
    /// Creates an empty in-memory session store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, access_token: &str) -> AppResult<Option<SessionRecord>> {
        Ok(self.sessions.read().await.get(access_token).cloned())
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

        self.sessions
            .write()
            .await
            .insert(record.access_token.clone(), record.clone());

        Ok(record)
    }

    async fn abandon(&self, access_token: &str) -> AppResult<bool> {
        Ok(self.sessions.write().await.remove(access_token).is_some())
    }
}
