//! Progress persistence
//!
//! Stores user aggregates keyed by user id with optimistic revisions.
//! Currently in-memory; swap in a database-backed impl behind the trait.

use crate::error::GamificationError;
use crate::models::UserStats;
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Trait for aggregate persistence
#[async_trait::async_trait]
pub trait ProgressStore: Send + Sync {
    async fn load(&self, user_id: Uuid) -> Result<Option<UserStats>>;

    /// Stored aggregate, or a zeroed one at revision 0 (not persisted)
    async fn load_or_create(&self, user_id: Uuid, first_level: u32) -> Result<UserStats>;

    /// Write `stats` if the stored revision still equals `expected_revision`
    ///
    /// An absent record counts as revision 0. A mismatch is a `Conflict`.
    async fn save(&self, stats: UserStats, expected_revision: u64) -> Result<()>;

    async fn list(&self) -> Result<Vec<UserStats>>;
}

/// In-memory store for development and tests
pub struct InMemoryProgressStore {
    users: Arc<RwLock<HashMap<Uuid, UserStats>>>,
}

impl InMemoryProgressStore {
    pub fn new() -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryProgressStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ProgressStore for InMemoryProgressStore {
    async fn load(&self, user_id: Uuid) -> Result<Option<UserStats>> {
        let users = self.users.read().await;
        Ok(users.get(&user_id).cloned())
    }

    async fn load_or_create(&self, user_id: Uuid, first_level: u32) -> Result<UserStats> {
        Ok(self
            .load(user_id)
            .await?
            .unwrap_or_else(|| UserStats::new(user_id, first_level)))
    }

    async fn save(&self, stats: UserStats, expected_revision: u64) -> Result<()> {
        let mut users = self.users.write().await;

        let stored_revision = users.get(&stats.user_id).map(|s| s.revision).unwrap_or(0);
        if stored_revision != expected_revision {
            return Err(GamificationError::Conflict(format!(
                "stale write for user {}: expected revision {}, stored {}",
                stats.user_id, expected_revision, stored_revision
            )));
        }

        debug!(
            user_id = ?stats.user_id,
            revision = stats.revision,
            "Saving user progress"
        );
        users.insert(stats.user_id, stats);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<UserStats>> {
        let users = self.users.read().await;
        Ok(users.values().cloned().collect())
    }
}
