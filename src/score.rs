//! High score service.
//!
//! A single non-negative integer kept under one key. Writes follow a
//! "maximum wins" policy and store failures read as a score of zero, so the
//! game keeps working offline. A submission whose read of the current score
//! failed is never written, so the stored score cannot go down.
//!
//! The read and the conditional write are separate store round trips with no
//! lock between them: two concurrent submissions may both see the same
//! current score and the later SET wins even if it carries the smaller value.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{ScoreInputError, StoreError};
use crate::metrics;
use crate::store::{ConnectionManager, KvStore};

/// Reads and raises the global high score.
pub struct HighScoreService {
    connections: Arc<ConnectionManager>,
    key: String,
}

impl HighScoreService {
    /// Create a service storing the score under `key`.
    pub fn new(connections: Arc<ConnectionManager>, key: impl Into<String>) -> Self {
        Self {
            connections,
            key: key.into(),
        }
    }

    /// Key the score is stored under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current high score; 0 when absent, unparsable or the store is unavailable.
    pub async fn get_high_score(&self) -> u64 {
        match self.connections.acquire().await {
            Some(store) => self.read(store.as_ref()).await.unwrap_or_else(|e| {
                warn!(key = %self.key, error = %e, "Failed to read high score");
                0
            }),
            None => 0,
        }
    }

    /// Offer `candidate` as the new high score and return the effective score.
    ///
    /// A candidate that beats the stored score is returned even when it could
    /// not be written.
    pub async fn set_high_score(&self, candidate: u64) -> u64 {
        let Some(store) = self.connections.acquire().await else {
            warn!(score = candidate, "Score store unavailable, high score not persisted");
            metrics::inc_score_writes_dropped();
            return candidate;
        };

        let current = match self.read(store.as_ref()).await {
            Ok(current) => current,
            Err(e) => {
                warn!(
                    score = candidate,
                    error = %e,
                    "Failed to read high score, submission not persisted"
                );
                metrics::inc_score_writes_dropped();
                return candidate;
            }
        };

        if candidate <= current {
            debug!(candidate, current, "Score does not beat high score");
            return current;
        }

        match store.set(&self.key, &candidate.to_string()).await {
            Ok(()) => {
                info!(score = candidate, previous = current, "New high score stored");
                metrics::inc_score_writes();
            }
            Err(e) => {
                warn!(score = candidate, error = %e, "Failed to store high score");
                metrics::inc_score_writes_dropped();
            }
        }

        candidate
    }

    /// Stored score; absent or unparsable values count as 0.
    async fn read(&self, store: &dyn KvStore) -> Result<u64, StoreError> {
        metrics::inc_score_reads();

        Ok(match store.get(&self.key).await? {
            None => 0,
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!(key = %self.key, value = %raw, "Stored high score is not a number");
                0
            }),
        })
    }
}

/// Parse a submitted score body.
pub fn parse_score(body: &str) -> Result<u64, ScoreInputError> {
    let trimmed = body.trim();
    trimmed.parse().map_err(|_| ScoreInputError {
        input: trimmed.to_string(),
    })
}
