//! In-process session table.
//!
//! A single owned `DashMap` keyed by session id. Reads hand out clones so
//! no caller ever holds a reference into the table.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use fixwise_types::error::RepositoryError;
use fixwise_types::session::{Session, SessionId};

use super::store::SessionStore;

#[derive(Debug, Default)]
pub struct ArenaSessionStore {
    sessions: DashMap<SessionId, Session>,
}

impl ArenaSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl SessionStore for ArenaSessionStore {
    async fn load(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        Ok(self.sessions.get(id).map(|entry| entry.value().clone()))
    }

    async fn save(&self, session: &Session) -> Result<(), RepositoryError> {
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, RepositoryError> {
        Ok(self.sessions.remove(id).is_some())
    }

    async fn purge_idle(&self, before: DateTime<Utc>) -> Result<Vec<SessionId>, RepositoryError> {
        let mut purged = Vec::new();
        self.sessions.retain(|id, session| {
            if session.last_activity_at < before {
                purged.push(id.clone());
                false
            } else {
                true
            }
        });
        Ok(purged)
    }
}
