use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, warn};

use super::clock::Clock;
use super::domain::{AuctionRecord, ClaimToken};
use super::repository::{ClaimRequest, Completion, RecordStore, RepositoryError};
use super::scoring_config::ConfigId;

/// Hands each worker a disjoint slice of unprocessed records under a lease.
///
/// A record claimed by a worker that never completes it becomes claimable again
/// once `lease` has elapsed. Completions are conditional on the claim token, so
/// a worker that lost its lease cannot overwrite the new owner's result.
pub struct BatchClaimCoordinator<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    lease: Duration,
}

impl<S> BatchClaimCoordinator<S>
where
    S: RecordStore + 'static,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, lease: Duration) -> Self {
        Self {
            store,
            clock,
            lease,
        }
    }

    #[cfg(test)]
    pub(crate) fn lease(&self) -> Duration {
        self.lease
    }

    /// Atomically reserves up to `batch_size` records. Empty means the pool is drained.
    pub fn claim(
        &self,
        batch_size: usize,
        config_id: &ConfigId,
    ) -> Result<Vec<AuctionRecord>, RepositoryError> {
        let request = ClaimRequest {
            limit: batch_size,
            config_id: config_id.clone(),
            now: self.clock.now(),
            lease: self.lease,
        };
        let claimed = self.store.claim_unprocessed(&request)?;
        debug!(
            config_id = %config_id,
            requested = batch_size,
            claimed = claimed.len(),
            "claimed batch"
        );
        Ok(claimed)
    }

    pub fn complete(
        &self,
        record: &AuctionRecord,
        completion: Completion,
    ) -> Result<(), RepositoryError> {
        let token = claim_token(record)?;
        self.store
            .complete(record.id, token, completion, self.clock.now())
    }

    /// Gives back claims a worker will not finish. Records whose lease was already
    /// taken over are skipped; the count returned is what was actually released.
    pub fn release_all(&self, records: &[AuctionRecord]) -> Result<usize, RepositoryError> {
        let mut released = 0;
        for record in records {
            let token = match claim_token(record) {
                Ok(token) => token,
                Err(_) => continue,
            };
            match self.store.release(record.id, token) {
                Ok(()) => released += 1,
                Err(RepositoryError::LeaseLost(_)) | Err(RepositoryError::NotFound) => {
                    warn!(record_id = %record.id, "claim already gone, nothing to release");
                }
                Err(other) => return Err(other),
            }
        }
        Ok(released)
    }
}

fn claim_token(record: &AuctionRecord) -> Result<ClaimToken, RepositoryError> {
    record
        .claim
        .as_ref()
        .map(|claim| claim.token)
        .ok_or(RepositoryError::LeaseLost(record.id))
}

#[cfg(test)]
pub(crate) fn claimed_ids(records: &[AuctionRecord]) -> Vec<super::domain::RecordId> {
    records.iter().map(|record| record.id).collect()
}
