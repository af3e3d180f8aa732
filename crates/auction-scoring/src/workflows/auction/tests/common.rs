use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::auction::clock::{Clock, ManualClock};
use crate::workflows::auction::domain::{
    AuctionListing, AuctionRecord, ClaimToken, FilterStatus, RecordId,
};
use crate::workflows::auction::features::{
    FeatureScore, FeatureScorer, FeatureScorers, ScorerError,
};
use crate::workflows::auction::ranking::RankingOptions;
use crate::workflows::auction::repository::{
    ClaimRequest, Completion, ListingQuery, RecordStore, RepositoryError, ResetScope, ScoredEntry,
    StoreStats,
};
use crate::workflows::auction::scoring_config::{
    ConfigId, FilterParams, ScoreWeights, ScoringConfig, ThresholdPolicy,
};
use crate::workflows::auction::service::{ScoringService, ServiceSettings};
use crate::workflows::auction::store::{MemoryConfigRepository, MemoryRecordStore};

pub(super) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn listing(id: u64, domain: &str) -> AuctionListing {
    AuctionListing {
        id: RecordId(id),
        domain: domain.to_string(),
        registered_on: NaiveDate::from_ymd_opt(2012, 4, 18),
        current_bid: Some(250.0),
        expires_at: start() + Duration::days(3),
        marketplace: "namejet".to_string(),
    }
}

pub(super) fn record(id: u64, domain: &str) -> AuctionRecord {
    AuctionRecord::from_listing(listing(id, domain), start())
}

/// Record already through a batch with `score` as its total.
pub(super) fn scored_record(id: u64, domain: &str, score: f64) -> AuctionRecord {
    let mut record = record(id, domain);
    record.filter_status = FilterStatus::Passed;
    record.age_score = Some(0.0);
    record.lfs_score = Some(score);
    record.sv_score = Some(0.0);
    record.score = Some(score);
    record.processed = true;
    record
}

pub(super) fn records(domains: &[&str]) -> Vec<AuctionRecord> {
    domains
        .iter()
        .enumerate()
        .map(|(index, domain)| record(index as u64 + 1, domain))
        .collect()
}

/// Only the lexical sub-score counts, so a record's total equals its table value.
pub(super) fn lexical_only_weights() -> ScoreWeights {
    ScoreWeights {
        age: 0.0,
        lfs: 1.0,
        sv: 0.0,
    }
}

pub(super) fn scoring_config(id: &str, active: bool) -> ScoringConfig {
    ScoringConfig {
        id: ConfigId(id.to_string()),
        name: format!("{id} config"),
        weights: lexical_only_weights(),
        filter: FilterParams::default(),
        thresholds: ThresholdPolicy::default(),
        active,
    }
}

pub(super) fn settings() -> ServiceSettings {
    ServiceSettings {
        batch_size: 2,
        lease: Duration::minutes(5),
        ranking: RankingOptions {
            chunk_size: 2,
            timeout: None,
        },
    }
}

/// Scorer returning fixed values per domain; domains missing from the table
/// degrade to zero with a warning.
pub(super) struct TableScorer {
    name: &'static str,
    values: HashMap<String, f64>,
}

impl TableScorer {
    pub(super) fn new(name: &'static str, values: &[(&str, f64)]) -> Self {
        Self {
            name,
            values: values
                .iter()
                .map(|(domain, value)| (domain.to_string(), *value))
                .collect(),
        }
    }
}

impl FeatureScorer for TableScorer {
    fn name(&self) -> &'static str {
        self.name
    }

    fn score(&self, domain: &str) -> Result<FeatureScore, ScorerError> {
        Ok(self
            .values
            .get(domain)
            .map(|value| FeatureScore::new(*value))
            .unwrap_or_else(|| FeatureScore::degraded(format!("no entry for '{domain}'"))))
    }
}

/// Fails for every domain whose label starts with `poison`.
pub(super) struct PoisonScorer;

impl FeatureScorer for PoisonScorer {
    fn name(&self) -> &'static str {
        "semantic_value"
    }

    fn score(&self, domain: &str) -> Result<FeatureScore, ScorerError> {
        if domain.starts_with("poison") {
            Err(ScorerError::Unavailable {
                scorer: self.name(),
                detail: "keyword service timed out".to_string(),
            })
        } else {
            Ok(FeatureScore::new(10.0))
        }
    }
}

pub(super) fn table_scorers(values: &[(&str, f64)]) -> FeatureScorers {
    FeatureScorers::new(
        Arc::new(TableScorer::new("lexical_frequency", values)),
        Arc::new(TableScorer::new("semantic_value", values)),
    )
}

pub(super) struct Harness<S: RecordStore + 'static = MemoryRecordStore> {
    pub(super) service: ScoringService<S, MemoryConfigRepository>,
    pub(super) store: Arc<S>,
    pub(super) configs: Arc<MemoryConfigRepository>,
    pub(super) clock: Arc<ManualClock>,
}

pub(super) fn harness(values: &[(&str, f64)]) -> Harness {
    let domains: Vec<&str> = values.iter().map(|(domain, _)| *domain).collect();
    let store = Arc::new(MemoryRecordStore::with_records(records(&domains)).expect("seed store"));
    harness_with(store, table_scorers(values))
}

pub(super) fn harness_with<S: RecordStore + 'static>(
    store: Arc<S>,
    scorers: FeatureScorers,
) -> Harness<S> {
    let configs = Arc::new(
        MemoryConfigRepository::with_configs(vec![scoring_config("baseline", true)])
            .expect("seed configs"),
    );
    let clock = Arc::new(ManualClock::new(start()));
    let service = ScoringService::new(
        store.clone(),
        configs.clone(),
        scorers,
        clock.clone() as Arc<dyn Clock>,
        settings(),
    );
    Harness {
        service,
        store,
        configs,
        clock,
    }
}

/// Store that cannot be reached at all.
pub(super) struct UnavailableStore;

fn offline<T>() -> Result<T, RepositoryError> {
    Err(RepositoryError::Unavailable("connection refused".to_string()))
}

impl RecordStore for UnavailableStore {
    fn insert(&self, _records: Vec<AuctionRecord>) -> Result<usize, RepositoryError> {
        offline()
    }

    fn fetch(&self, _id: RecordId) -> Result<Option<AuctionRecord>, RepositoryError> {
        offline()
    }

    fn claim_unprocessed(
        &self,
        _request: &ClaimRequest,
    ) -> Result<Vec<AuctionRecord>, RepositoryError> {
        offline()
    }

    fn complete(
        &self,
        _id: RecordId,
        _token: ClaimToken,
        _completion: Completion,
        _now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        offline()
    }

    fn release(&self, _id: RecordId, _token: ClaimToken) -> Result<(), RepositoryError> {
        offline()
    }

    fn scored_page(
        &self,
        _after: Option<RecordId>,
        _limit: usize,
    ) -> Result<Vec<ScoredEntry>, RepositoryError> {
        offline()
    }

    fn ranking_generation(&self) -> Result<u64, RepositoryError> {
        offline()
    }

    fn swap_ranking(
        &self,
        _expected_generation: u64,
        _ranks: &HashMap<RecordId, u32>,
        _now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        offline()
    }

    fn apply_preferred(
        &self,
        _expected_generation: u64,
        _flags: &HashMap<RecordId, bool>,
        _now: DateTime<Utc>,
    ) -> Result<usize, RepositoryError> {
        offline()
    }

    fn reset_scores(
        &self,
        _scope: &ResetScope,
        _now: DateTime<Utc>,
    ) -> Result<usize, RepositoryError> {
        offline()
    }

    fn stats(&self) -> Result<StoreStats, RepositoryError> {
        offline()
    }

    fn listing(&self, _query: &ListingQuery) -> Result<Vec<AuctionRecord>, RepositoryError> {
        offline()
    }
}

/// Memory store whose writes start failing once `fail_writes` is set. Reads
/// and claims keep working so a batch can get as far as its first completion.
#[derive(Default)]
pub(super) struct FlakyStore {
    pub(super) inner: MemoryRecordStore,
    pub(super) fail_writes: AtomicBool,
}

impl FlakyStore {
    fn guard(&self) -> Result<(), RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            offline()
        } else {
            Ok(())
        }
    }
}

impl RecordStore for FlakyStore {
    fn insert(&self, records: Vec<AuctionRecord>) -> Result<usize, RepositoryError> {
        self.inner.insert(records)
    }

    fn fetch(&self, id: RecordId) -> Result<Option<AuctionRecord>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn claim_unprocessed(
        &self,
        request: &ClaimRequest,
    ) -> Result<Vec<AuctionRecord>, RepositoryError> {
        self.inner.claim_unprocessed(request)
    }

    fn complete(
        &self,
        id: RecordId,
        token: ClaimToken,
        completion: Completion,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.guard()?;
        self.inner.complete(id, token, completion, now)
    }

    fn release(&self, id: RecordId, token: ClaimToken) -> Result<(), RepositoryError> {
        self.guard()?;
        self.inner.release(id, token)
    }

    fn scored_page(
        &self,
        after: Option<RecordId>,
        limit: usize,
    ) -> Result<Vec<ScoredEntry>, RepositoryError> {
        self.inner.scored_page(after, limit)
    }

    fn ranking_generation(&self) -> Result<u64, RepositoryError> {
        self.inner.ranking_generation()
    }

    fn swap_ranking(
        &self,
        expected_generation: u64,
        ranks: &HashMap<RecordId, u32>,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        self.guard()?;
        self.inner.swap_ranking(expected_generation, ranks, now)
    }

    fn apply_preferred(
        &self,
        expected_generation: u64,
        flags: &HashMap<RecordId, bool>,
        now: DateTime<Utc>,
    ) -> Result<usize, RepositoryError> {
        self.guard()?;
        self.inner.apply_preferred(expected_generation, flags, now)
    }

    fn reset_scores(&self, scope: &ResetScope, now: DateTime<Utc>) -> Result<usize, RepositoryError> {
        self.guard()?;
        self.inner.reset_scores(scope, now)
    }

    fn stats(&self) -> Result<StoreStats, RepositoryError> {
        self.inner.stats()
    }

    fn listing(&self, query: &ListingQuery) -> Result<Vec<AuctionRecord>, RepositoryError> {
        self.inner.listing(query)
    }
}

type StoreHook = Box<dyn FnOnce(&MemoryRecordStore) + Send>;

/// Memory store that runs a one-shot hook on the shared table just before a
/// ranking swap or a preferred-flag write lands, so another writer can be
/// slotted in between a pass's reads and its write.
pub(super) struct InterleavedStore {
    pub(super) inner: Arc<MemoryRecordStore>,
    before_swap: Mutex<Option<StoreHook>>,
    before_apply: Mutex<Option<StoreHook>>,
}

impl InterleavedStore {
    pub(super) fn new(inner: Arc<MemoryRecordStore>) -> Self {
        Self {
            inner,
            before_swap: Mutex::new(None),
            before_apply: Mutex::new(None),
        }
    }

    pub(super) fn before_swap(self, hook: impl FnOnce(&MemoryRecordStore) + Send + 'static) -> Self {
        *self.before_swap.lock().expect("hook slot") = Some(Box::new(hook));
        self
    }

    pub(super) fn before_apply(
        self,
        hook: impl FnOnce(&MemoryRecordStore) + Send + 'static,
    ) -> Self {
        *self.before_apply.lock().expect("hook slot") = Some(Box::new(hook));
        self
    }

    fn fire(&self, slot: &Mutex<Option<StoreHook>>) {
        let hook = slot.lock().expect("hook slot").take();
        if let Some(hook) = hook {
            hook(&self.inner);
        }
    }
}

impl RecordStore for InterleavedStore {
    fn insert(&self, records: Vec<AuctionRecord>) -> Result<usize, RepositoryError> {
        self.inner.insert(records)
    }

    fn fetch(&self, id: RecordId) -> Result<Option<AuctionRecord>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn claim_unprocessed(
        &self,
        request: &ClaimRequest,
    ) -> Result<Vec<AuctionRecord>, RepositoryError> {
        self.inner.claim_unprocessed(request)
    }

    fn complete(
        &self,
        id: RecordId,
        token: ClaimToken,
        completion: Completion,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.inner.complete(id, token, completion, now)
    }

    fn release(&self, id: RecordId, token: ClaimToken) -> Result<(), RepositoryError> {
        self.inner.release(id, token)
    }

    fn scored_page(
        &self,
        after: Option<RecordId>,
        limit: usize,
    ) -> Result<Vec<ScoredEntry>, RepositoryError> {
        self.inner.scored_page(after, limit)
    }

    fn ranking_generation(&self) -> Result<u64, RepositoryError> {
        self.inner.ranking_generation()
    }

    fn swap_ranking(
        &self,
        expected_generation: u64,
        ranks: &HashMap<RecordId, u32>,
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        self.fire(&self.before_swap);
        self.inner.swap_ranking(expected_generation, ranks, now)
    }

    fn apply_preferred(
        &self,
        expected_generation: u64,
        flags: &HashMap<RecordId, bool>,
        now: DateTime<Utc>,
    ) -> Result<usize, RepositoryError> {
        self.fire(&self.before_apply);
        self.inner.apply_preferred(expected_generation, flags, now)
    }

    fn reset_scores(&self, scope: &ResetScope, now: DateTime<Utc>) -> Result<usize, RepositoryError> {
        self.inner.reset_scores(scope, now)
    }

    fn stats(&self) -> Result<StoreStats, RepositoryError> {
        self.inner.stats()
    }

    fn listing(&self, query: &ListingQuery) -> Result<Vec<AuctionRecord>, RepositoryError> {
        self.inner.listing(query)
    }
}

pub(super) fn stored(store: &MemoryRecordStore, id: u64) -> AuctionRecord {
    store
        .fetch(RecordId(id))
        .expect("fetch succeeds")
        .expect("record exists")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
