//! In-process implementations of the storage traits.
//!
//! A single mutex guards the whole table, so each trait method is one atomic
//! step. Ranking and classification page through `scored_page`, which takes the
//! lock once per page rather than for the whole pass.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::domain::{AuctionRecord, Claim, ClaimToken, FilterStatus, RecordId};
use super::repository::{
    ClaimRequest, Completion, ConfigRepository, ListingQuery, RecordStore, RepositoryError,
    ResetScope, ScoredEntry, StoreStats,
};
use super::scoring_config::{ConfigId, ScoringConfig};

#[derive(Debug, Default)]
struct TableState {
    records: BTreeMap<RecordId, AuctionRecord>,
    next_token: u64,
    ranking_generation: u64,
}

impl TableState {
    fn owned_record(
        &mut self,
        id: RecordId,
        token: ClaimToken,
    ) -> Result<&mut AuctionRecord, RepositoryError> {
        let record = self
            .records
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        let owns = !record.processed
            && record
                .claim
                .as_ref()
                .map(|claim| claim.token == token)
                .unwrap_or(false);
        if owns {
            Ok(record)
        } else {
            Err(RepositoryError::LeaseLost(id))
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    state: Mutex<TableState>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<AuctionRecord>) -> Result<Self, RepositoryError> {
        let store = Self::new();
        store.insert(records)?;
        Ok(store)
    }

    /// Full copy of the table in id order.
    pub fn snapshot(&self) -> Vec<AuctionRecord> {
        let guard = self.state.lock().expect("record store mutex poisoned");
        guard.records.values().cloned().collect()
    }
}

impl RecordStore for MemoryRecordStore {
    fn insert(&self, records: Vec<AuctionRecord>) -> Result<usize, RepositoryError> {
        let mut guard = self.state.lock().expect("record store mutex poisoned");
        if records
            .iter()
            .any(|record| guard.records.contains_key(&record.id))
        {
            return Err(RepositoryError::Conflict);
        }
        let count = records.len();
        for record in records {
            guard.records.insert(record.id, record);
        }
        Ok(count)
    }

    fn fetch(&self, id: RecordId) -> Result<Option<AuctionRecord>, RepositoryError> {
        let guard = self.state.lock().expect("record store mutex poisoned");
        Ok(guard.records.get(&id).cloned())
    }

    fn claim_unprocessed(
        &self,
        request: &ClaimRequest,
    ) -> Result<Vec<AuctionRecord>, RepositoryError> {
        if request.limit == 0 {
            return Ok(Vec::new());
        }

        let mut guard = self.state.lock().expect("record store mutex poisoned");
        let eligible: Vec<RecordId> = guard
            .records
            .values()
            .filter(|record| {
                !record.processed
                    && record
                        .claim
                        .as_ref()
                        .map_or(true, |claim| !claim.is_live(request.now))
            })
            .map(|record| record.id)
            .take(request.limit)
            .collect();

        let mut claimed = Vec::with_capacity(eligible.len());
        for id in eligible {
            guard.next_token += 1;
            let token = ClaimToken(guard.next_token);
            if let Some(record) = guard.records.get_mut(&id) {
                if let Some(expired) = &record.claim {
                    debug!(
                        record_id = %id,
                        previous_token = expired.token.0,
                        "reclaiming record with expired lease"
                    );
                }
                record.claim = Some(Claim {
                    token,
                    config_id: request.config_id.clone(),
                    claimed_at: request.now,
                    lease_expires_at: request.now + request.lease,
                });
                record.updated_at = request.now;
                claimed.push(record.clone());
            }
        }

        Ok(claimed)
    }

    fn complete(
        &self,
        id: RecordId,
        token: ClaimToken,
        completion: Completion,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.state.lock().expect("record store mutex poisoned");
        let record = guard.owned_record(id, token)?;

        match completion {
            Completion::Rejected { reason } => {
                record.filter_status = FilterStatus::Rejected(reason);
                record.age_score = None;
                record.lfs_score = None;
                record.sv_score = None;
                record.score = None;
            }
            Completion::Scored {
                age_score,
                lfs_score,
                sv_score,
                score,
            } => {
                record.filter_status = FilterStatus::Passed;
                record.age_score = Some(age_score);
                record.lfs_score = Some(lfs_score);
                record.sv_score = Some(sv_score);
                record.score = Some(score);
            }
        }
        record.ranking = None;
        record.preferred = false;
        record.processed = true;
        record.claim = None;
        record.updated_at = now;
        Ok(())
    }

    fn release(&self, id: RecordId, token: ClaimToken) -> Result<(), RepositoryError> {
        let mut guard = self.state.lock().expect("record store mutex poisoned");
        let record = guard.owned_record(id, token)?;
        record.claim = None;
        Ok(())
    }

    fn scored_page(
        &self,
        after: Option<RecordId>,
        limit: usize,
    ) -> Result<Vec<ScoredEntry>, RepositoryError> {
        let guard = self.state.lock().expect("record store mutex poisoned");
        let lower = match after {
            Some(id) => std::ops::Bound::Excluded(id),
            None => std::ops::Bound::Unbounded,
        };
        Ok(guard
            .records
            .range((lower, std::ops::Bound::Unbounded))
            .filter_map(|(_, record)| {
                record.score.map(|score| ScoredEntry {
                    id: record.id,
                    domain: record.domain.clone(),
                    score,
                    ranking: record.ranking,
                })
            })
            .take(limit)
            .collect())
    }

    fn ranking_generation(&self) -> Result<u64, RepositoryError> {
        let guard = self.state.lock().expect("record store mutex poisoned");
        Ok(guard.ranking_generation)
    }

    fn swap_ranking(
        &self,
        expected_generation: u64,
        ranks: &HashMap<RecordId, u32>,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let mut guard = self.state.lock().expect("record store mutex poisoned");
        if guard.ranking_generation != expected_generation {
            return Err(RepositoryError::StaleGeneration {
                expected: expected_generation,
                actual: guard.ranking_generation,
            });
        }

        // Records reset since the pages were read drop out; close the gaps they leave.
        let mut kept: Vec<(u32, RecordId)> = guard
            .records
            .values()
            .filter(|record| record.score.is_some())
            .filter_map(|record| ranks.get(&record.id).map(|rank| (*rank, record.id)))
            .collect();
        kept.sort_unstable();
        let dense: HashMap<RecordId, u32> = kept
            .into_iter()
            .enumerate()
            .map(|(index, (_, id))| (id, u32::try_from(index + 1).unwrap_or(u32::MAX)))
            .collect();

        for record in guard.records.values_mut() {
            let ranking = dense.get(&record.id).copied();
            if record.ranking != ranking {
                record.ranking = ranking;
                record.updated_at = now;
            }
        }
        guard.ranking_generation += 1;
        Ok(guard.ranking_generation)
    }

    fn apply_preferred(
        &self,
        expected_generation: u64,
        flags: &HashMap<RecordId, bool>,
        now: DateTime<Utc>,
    ) -> Result<usize, RepositoryError> {
        let mut guard = self.state.lock().expect("record store mutex poisoned");
        if guard.ranking_generation != expected_generation {
            return Err(RepositoryError::StaleGeneration {
                expected: expected_generation,
                actual: guard.ranking_generation,
            });
        }

        let mut preferred = 0;
        for record in guard.records.values_mut() {
            let flag = record.score.is_some() && flags.get(&record.id).copied().unwrap_or(false);
            if record.preferred != flag {
                record.preferred = flag;
                record.updated_at = now;
            }
            if flag {
                preferred += 1;
            }
        }
        Ok(preferred)
    }

    fn reset_scores(
        &self,
        scope: &ResetScope,
        now: DateTime<Utc>,
    ) -> Result<usize, RepositoryError> {
        let mut guard = self.state.lock().expect("record store mutex poisoned");
        let mut reset = 0;
        match scope {
            ResetScope::All => {
                for record in guard.records.values_mut() {
                    record.reset_scoring(now);
                    reset += 1;
                }
            }
            ResetScope::Records(ids) => {
                for id in ids {
                    if let Some(record) = guard.records.get_mut(id) {
                        record.reset_scoring(now);
                        reset += 1;
                    }
                }
            }
        }
        Ok(reset)
    }

    fn stats(&self) -> Result<StoreStats, RepositoryError> {
        let guard = self.state.lock().expect("record store mutex poisoned");
        let mut stats = StoreStats {
            total: guard.records.len(),
            ranking_generation: guard.ranking_generation,
            ..StoreStats::default()
        };
        for record in guard.records.values() {
            if record.processed {
                stats.processed += 1;
            } else {
                stats.unprocessed += 1;
                if record.claim.is_some() {
                    stats.claimed += 1;
                }
            }
            if record.score.is_some() {
                stats.scored += 1;
            }
            if record.filter_status.is_rejected() {
                stats.rejected += 1;
            }
            if record.preferred {
                stats.preferred += 1;
            }
        }
        Ok(stats)
    }

    fn listing(&self, query: &ListingQuery) -> Result<Vec<AuctionRecord>, RepositoryError> {
        let guard = self.state.lock().expect("record store mutex poisoned");
        let mut rows: Vec<&AuctionRecord> = guard
            .records
            .values()
            .filter(|record| record.score.is_some())
            .filter(|record| !query.preferred_only || record.preferred)
            .collect();
        rows.sort_by(|left, right| listing_order(left, right));
        Ok(rows
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect())
    }
}

/// Ranked rows first by rank; rows scored after the last ranking pass follow by score.
fn listing_order(left: &AuctionRecord, right: &AuctionRecord) -> Ordering {
    match (left.ranking, right.ranking) {
        (Some(l), Some(r)) => l.cmp(&r),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => right
            .score
            .unwrap_or(0.0)
            .total_cmp(&left.score.unwrap_or(0.0))
            .then_with(|| left.domain.cmp(&right.domain)),
    }
}

#[derive(Debug, Default)]
pub struct MemoryConfigRepository {
    configs: Mutex<BTreeMap<ConfigId, ScoringConfig>>,
}

impl MemoryConfigRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the repository; a config marked active deactivates the others.
    pub fn with_configs(configs: Vec<ScoringConfig>) -> Result<Self, RepositoryError> {
        let repository = Self::new();
        for config in configs {
            repository.upsert(config)?;
        }
        Ok(repository)
    }
}

impl ConfigRepository for MemoryConfigRepository {
    fn fetch(&self, id: &ConfigId) -> Result<Option<ScoringConfig>, RepositoryError> {
        let guard = self.configs.lock().expect("config mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn active(&self) -> Result<Option<ScoringConfig>, RepositoryError> {
        let guard = self.configs.lock().expect("config mutex poisoned");
        Ok(guard.values().find(|config| config.active).cloned())
    }

    fn upsert(&self, config: ScoringConfig) -> Result<ScoringConfig, RepositoryError> {
        let mut guard = self.configs.lock().expect("config mutex poisoned");
        if config.active {
            for other in guard.values_mut() {
                other.active = false;
            }
        }
        guard.insert(config.id.clone(), config.clone());
        Ok(config)
    }

    fn activate(&self, id: &ConfigId) -> Result<ScoringConfig, RepositoryError> {
        let mut guard = self.configs.lock().expect("config mutex poisoned");
        if !guard.contains_key(id) {
            return Err(RepositoryError::NotFound);
        }
        for (key, config) in guard.iter_mut() {
            config.active = key == id;
        }
        guard.get(id).cloned().ok_or(RepositoryError::NotFound)
    }
}
