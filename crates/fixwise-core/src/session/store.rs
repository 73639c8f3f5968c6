//! SessionStore trait definition.
//!
//! Key-value persistence for `Session` records keyed by session id.
//! Follows the same RPITIT pattern as the capability traits.

use chrono::{DateTime, Utc};

use fixwise_types::error::RepositoryError;
use fixwise_types::session::{Session, SessionId};

/// Storage boundary for session records.
///
/// Only the session manager talks to a store. Implementations: the
/// in-process [`ArenaSessionStore`](super::arena::ArenaSessionStore) and
/// `SqliteSessionStore` in fixwise-infra.
pub trait SessionStore: Send + Sync {
    /// Load a session, or `None` if the id is unknown.
    fn load(
        &self,
        id: &SessionId,
    ) -> impl std::future::Future<Output = Result<Option<Session>, RepositoryError>> + Send;

    /// Insert or replace a session record.
    fn save(
        &self,
        session: &Session,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Remove a session. Returns whether anything was removed.
    fn delete(
        &self,
        id: &SessionId,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Remove every session idle since before `before`, returning their ids.
    fn purge_idle(
        &self,
        before: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<Vec<SessionId>, RepositoryError>> + Send;
}
