//! Action ledger
//!
//! Records processed request ids per user so a retried request replays the
//! stored update instead of awarding XP twice. Each stored update carries a
//! SHA-256 digest for integrity checks. Only the most recent completed
//! requests are kept; older ones are evicted first-in first-out.

use crate::service::GamificationUpdate;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletedAction {
    pub user_id: Uuid,
    pub request_id: String,
    pub update: GamificationUpdate,
    pub digest: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
enum LedgerEntry {
    InFlight,
    Completed(Box<CompletedAction>),
}

/// Outcome of reserving a request id
#[derive(Debug, Clone, PartialEq)]
pub enum Reservation {
    /// First sighting; the caller owns the request now
    Reserved,
    /// Another caller holds it and has not finished
    InFlight,
    /// Already processed; replay this
    Completed(Box<CompletedAction>),
}

/// Completed requests kept for replay
pub const LEDGER_RETENTION: usize = 10_000;

type LedgerKey = (Uuid, String);

#[derive(Debug, Default)]
struct LedgerState {
    entries: HashMap<LedgerKey, LedgerEntry>,
    /// Completed keys, oldest first
    completed: VecDeque<LedgerKey>,
}

/// At-most-once ledger keyed by (user, request id)
pub struct ActionLedger {
    state: Arc<RwLock<LedgerState>>,
    retention: usize,
}

impl ActionLedger {
    pub fn new() -> Self {
        Self::with_retention(LEDGER_RETENTION)
    }

    /// Ledger that keeps at most `retention` completed requests
    pub fn with_retention(retention: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(LedgerState::default())),
            retention: retention.max(1),
        }
    }

    pub async fn reserve(&self, user_id: Uuid, request_id: &str) -> Result<Reservation> {
        let mut state = self.state.write().await;
        let entries = &mut state.entries;
        let key = (user_id, request_id.to_string());

        let reservation = match entries.get(&key) {
            None => {
                entries.insert(key, LedgerEntry::InFlight);
                Reservation::Reserved
            }
            Some(LedgerEntry::InFlight) => Reservation::InFlight,
            Some(LedgerEntry::Completed(action)) => Reservation::Completed(action.clone()),
        };

        debug!(user_id = ?user_id, request_id, ?reservation, "Request reserved");
        Ok(reservation)
    }

    /// Store the update for a reserved request and return its digest
    pub async fn complete(
        &self,
        user_id: Uuid,
        request_id: &str,
        update: GamificationUpdate,
    ) -> Result<String> {
        let digest = compute_update_digest(&update)?;
        let action = CompletedAction {
            user_id,
            request_id: request_id.to_string(),
            update,
            digest: digest.clone(),
            recorded_at: Utc::now(),
        };

        let key = (user_id, request_id.to_string());
        let mut state = self.state.write().await;
        let previous = state
            .entries
            .insert(key.clone(), LedgerEntry::Completed(Box::new(action)));
        if !matches!(previous, Some(LedgerEntry::Completed(_))) {
            state.completed.push_back(key);
        }

        while state.completed.len() > self.retention {
            if let Some(oldest) = state.completed.pop_front() {
                state.entries.remove(&oldest);
                debug!(user_id = ?oldest.0, request_id = %oldest.1, "Evicted ledger entry");
            }
        }
        Ok(digest)
    }

    /// Drop an in-flight reservation so the request can be retried
    pub async fn release(&self, user_id: Uuid, request_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let key = (user_id, request_id.to_string());
        if matches!(state.entries.get(&key), Some(LedgerEntry::InFlight)) {
            state.entries.remove(&key);
        }
        Ok(())
    }

    pub async fn lookup(&self, user_id: Uuid, request_id: &str) -> Result<Option<CompletedAction>> {
        let state = self.state.read().await;
        Ok(match state.entries.get(&(user_id, request_id.to_string())) {
            Some(LedgerEntry::Completed(action)) => Some((**action).clone()),
            _ => None,
        })
    }

    /// Recompute the digest of a stored update and compare
    pub async fn verify_integrity(&self, user_id: Uuid, request_id: &str) -> Result<bool> {
        let Some(action) = self.lookup(user_id, request_id).await? else {
            return Ok(false);
        };

        let ok = compute_update_digest(&action.update)? == action.digest;
        if !ok {
            warn!(user_id = ?user_id, request_id, "Ledger digest mismatch");
        }
        Ok(ok)
    }
}

impl Default for ActionLedger {
    fn default() -> Self {
        Self::new()
    }
}

/// SHA-256 of the update's JSON, streamed into the hasher
pub fn compute_update_digest(update: &GamificationUpdate) -> Result<String> {
    let mut hasher = Sha256::new();
    serde_json::to_writer(&mut HashWriter(&mut hasher), update)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
