use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{AuctionRecord, ClaimToken, RecordId};
use super::scoring_config::{ConfigId, ScoringConfig};

/// Terminal write for a claimed record.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Rejected {
        reason: String,
    },
    Scored {
        age_score: f64,
        lfs_score: f64,
        sv_score: f64,
        score: f64,
    },
}

/// Parameters for one atomic select-and-mark over unprocessed records.
#[derive(Debug, Clone)]
pub struct ClaimRequest {
    pub limit: usize,
    pub config_id: ConfigId,
    pub now: DateTime<Utc>,
    pub lease: Duration,
}

/// Minimal projection of a scored record used by ranking and classification.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntry {
    pub id: RecordId,
    pub domain: String,
    pub score: f64,
    pub ranking: Option<u32>,
}

/// Progress counters for monitoring.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total: usize,
    pub processed: usize,
    pub unprocessed: usize,
    pub scored: usize,
    pub claimed: usize,
    pub rejected: usize,
    pub preferred: usize,
    pub ranking_generation: u64,
}

/// Read-only ranked listing for report surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListingQuery {
    #[serde(default)]
    pub preferred_only: bool,
    #[serde(default = "ListingQuery::default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

impl ListingQuery {
    fn default_limit() -> usize {
        50
    }
}

impl Default for ListingQuery {
    fn default() -> Self {
        Self {
            preferred_only: false,
            limit: Self::default_limit(),
            offset: 0,
        }
    }
}

/// Which records an operator reset returns to the unprocessed pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "ids", rename_all = "snake_case")]
pub enum ResetScope {
    All,
    Records(Vec<RecordId>),
}

/// Durable auction table. Every method is a single atomic step against the store;
/// the claim and completion calls are conditional updates, never read-then-write.
pub trait RecordStore: Send + Sync {
    /// Ingestion hook; rejects ids that already exist.
    fn insert(&self, records: Vec<AuctionRecord>) -> Result<usize, RepositoryError>;

    fn fetch(&self, id: RecordId) -> Result<Option<AuctionRecord>, RepositoryError>;

    /// Selects up to `limit` unprocessed records whose claim is absent or whose
    /// lease has expired, and marks them claimed in the same step.
    fn claim_unprocessed(
        &self,
        request: &ClaimRequest,
    ) -> Result<Vec<AuctionRecord>, RepositoryError>;

    /// Writes the terminal state of a record, provided `token` still owns it.
    fn complete(
        &self,
        id: RecordId,
        token: ClaimToken,
        completion: Completion,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    /// Drops a live claim so the record is immediately reclaimable.
    fn release(&self, id: RecordId, token: ClaimToken) -> Result<(), RepositoryError>;

    /// Scored records with ids strictly greater than `after`, in id order.
    fn scored_page(
        &self,
        after: Option<RecordId>,
        limit: usize,
    ) -> Result<Vec<ScoredEntry>, RepositoryError>;

    fn ranking_generation(&self) -> Result<u64, RepositoryError>;

    /// Replaces the whole ranking column in one step if the generation is still
    /// `expected_generation`. Scored records absent from `ranks` end up unranked,
    /// and the ranks kept are renumbered to stay dense over what is still scored.
    fn swap_ranking(
        &self,
        expected_generation: u64,
        ranks: &HashMap<RecordId, u32>,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError>;

    /// Sets `preferred` on every record: the flag from `flags` for scored
    /// records, `false` for everything else. Rejected with `StaleGeneration`
    /// when the ranking the flags were computed from has since been replaced.
    fn apply_preferred(
        &self,
        expected_generation: u64,
        flags: &HashMap<RecordId, bool>,
        now: DateTime<Utc>,
    ) -> Result<usize, RepositoryError>;

    fn reset_scores(&self, scope: &ResetScope, now: DateTime<Utc>)
        -> Result<usize, RepositoryError>;

    fn stats(&self) -> Result<StoreStats, RepositoryError>;

    fn listing(&self, query: &ListingQuery) -> Result<Vec<AuctionRecord>, RepositoryError>;
}

/// Storage for `ScoringConfig` rows.
pub trait ConfigRepository: Send + Sync {
    fn fetch(&self, id: &ConfigId) -> Result<Option<ScoringConfig>, RepositoryError>;

    fn active(&self) -> Result<Option<ScoringConfig>, RepositoryError>;

    fn upsert(&self, config: ScoringConfig) -> Result<ScoringConfig, RepositoryError>;

    /// Marks `id` active and every other config inactive.
    fn activate(&self, id: &ConfigId) -> Result<ScoringConfig, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("claim on record {0} is no longer held")]
    LeaseLost(RecordId),
    #[error("ranking generation moved from {expected} to {actual}")]
    StaleGeneration { expected: u64, actual: u64 },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
