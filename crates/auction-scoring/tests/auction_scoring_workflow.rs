//! End-to-end scenarios for the auction scoring pipeline driven through the
//! public service facade, plus property checks on claim disjointness and dense
//! ranking under arbitrary interleavings.

mod common {
    use std::sync::Arc;

    use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

    use auction_scoring::workflows::auction::{
        AuctionListing, AuctionRecord, Clock, ConfigId, FeatureScorers, FilterParams,
        ManualClock, MemoryConfigRepository, MemoryRecordStore, RankingOptions, RecordId,
        ReferenceData, ScoreWeights, ScoringConfig, ScoringService, ServiceSettings,
        ThresholdPolicy,
    };

    pub fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    pub fn record(id: u64, domain: &str) -> AuctionRecord {
        AuctionRecord::from_listing(
            AuctionListing {
                id: RecordId(id),
                domain: domain.to_string(),
                registered_on: NaiveDate::from_ymd_opt(2014, 6, 2),
                current_bid: Some(90.0),
                expires_at: start() + Duration::days(2),
                marketplace: "dropcatch".to_string(),
            },
            start(),
        )
    }

    /// Letter-only labels so every generated record passes the default filter.
    pub fn label(index: usize) -> String {
        let mut value = index;
        let mut label = String::from("lot");
        loop {
            label.push((b'a' + (value % 26) as u8) as char);
            value /= 26;
            if value == 0 {
                break;
            }
        }
        format!("{label}.com")
    }

    pub fn config() -> ScoringConfig {
        ScoringConfig {
            id: ConfigId("default".to_string()),
            name: "Default weights".to_string(),
            weights: ScoreWeights::default(),
            filter: FilterParams::default(),
            thresholds: ThresholdPolicy::default(),
            active: true,
        }
    }

    pub fn service(
        records: Vec<AuctionRecord>,
        clock: Arc<dyn Clock>,
        batch_size: usize,
    ) -> (
        ScoringService<MemoryRecordStore, MemoryConfigRepository>,
        Arc<MemoryRecordStore>,
    ) {
        let store = Arc::new(MemoryRecordStore::with_records(records).expect("seed store"));
        let configs =
            Arc::new(MemoryConfigRepository::with_configs(vec![config()]).expect("seed configs"));
        let service = ScoringService::new(
            store.clone(),
            configs,
            FeatureScorers::from_reference(Arc::new(ReferenceData::builtin())),
            clock,
            ServiceSettings {
                batch_size,
                lease: Duration::minutes(5),
                ranking: RankingOptions {
                    chunk_size: 7,
                    timeout: None,
                },
            },
        );
        (service, store)
    }

    pub fn manual_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(start()))
    }
}

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Duration;
use proptest::prelude::*;

use auction_scoring::workflows::auction::{
    dense_rank, AuctionRecord, BatchClaimCoordinator, BatchRequest, Clock, Completion, ConfigId,
    ConfigSelector, ListingQuery, ManualClock, MemoryRecordStore, RecordId, RecordStore,
    RepositoryError, ScoredEntry, SystemClock,
};
use common::*;

#[test]
fn builtin_reference_data_scores_and_ranks_a_mixed_catalog() {
    let records = vec![
        record(1, "cloudshop.com"),
        record(2, "smartbank.io"),
        record(3, "qzxvkp.net"),
        record(4, "cheap-deals.org"),
        record(5, "bad.xyz"),
    ];
    let (service, store) = service(records, manual_clock(), 2);

    let drain = service
        .process_until_exhausted(BatchRequest::default())
        .expect("drain succeeds");
    assert_eq!(drain.claimed, 5);
    assert_eq!(drain.rejected, 1);
    assert_eq!(drain.scored, 4);
    assert!(drain.warnings > 0, "unknown label should report data gaps");

    let pass = service
        .rank_and_classify(&ConfigSelector::Active)
        .expect("ranking succeeds");
    assert_eq!(pass.ranking.ranked, 4);
    assert_eq!(pass.classification.preferred, 4);

    let snapshot = store.snapshot();
    for record in snapshot.iter().filter(|record| record.score.is_some()) {
        let score = record.score.unwrap_or_default();
        assert!((0.0..=100.0).contains(&score), "{} out of range", record.domain);
    }

    let listing = service
        .listing(&ListingQuery::default())
        .expect("listing succeeds");
    let ranks: Vec<Option<u32>> = listing.iter().map(|row| row.ranking).collect();
    assert_eq!(ranks, vec![Some(1), Some(2), Some(3), Some(4)]);
    assert_eq!(listing.last().map(|row| row.domain.as_str()), Some("qzxvkp.net"));
    assert!(listing.iter().all(|row| row.domain != "bad.xyz"));
}

#[test]
fn concurrent_workers_process_every_record_exactly_once() {
    let records: Vec<AuctionRecord> = (0..240)
        .map(|index| record(index as u64 + 1, &label(index)))
        .collect();
    let total = records.len();
    let (service, store) = service(records, Arc::new(SystemClock) as Arc<dyn Clock>, 9);

    let per_worker: Vec<(usize, usize)> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..6)
            .map(|_| {
                scope.spawn(|| {
                    let mut claimed = 0;
                    let mut settled = 0;
                    loop {
                        let report = service
                            .run_batch(BatchRequest::default())
                            .expect("batch runs");
                        if report.is_exhausted() {
                            break;
                        }
                        assert_eq!(report.lost, 0);
                        claimed += report.claimed;
                        settled += report.scored + report.rejected + report.scoring_errors;
                    }
                    (claimed, settled)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("worker thread"))
            .collect()
    });

    let claimed: usize = per_worker.iter().map(|(claimed, _)| claimed).sum();
    let settled: usize = per_worker.iter().map(|(_, settled)| settled).sum();
    assert_eq!(claimed, total);
    assert_eq!(settled, total);

    let stats = store.stats().expect("stats");
    assert_eq!(stats.processed, total);
    assert_eq!(stats.claimed, 0);
}

#[test]
fn crashed_worker_claims_are_recovered_after_lease_expiry() {
    let clock = manual_clock();
    let records = vec![record(1, "cloudshop.com"), record(2, "smartbank.io")];
    let (service, store) = service(records, clock.clone() as Arc<dyn Clock>, 5);

    let crashed = BatchClaimCoordinator::new(
        store.clone(),
        clock.clone() as Arc<dyn Clock>,
        Duration::minutes(5),
    );
    let abandoned = crashed
        .claim(5, &ConfigId("default".to_string()))
        .expect("claim succeeds");
    assert_eq!(abandoned.len(), 2);

    assert!(service
        .run_batch(BatchRequest::default())
        .expect("batch runs")
        .is_exhausted());

    clock.advance(Duration::minutes(5));
    let recovered = service
        .run_batch(BatchRequest::default())
        .expect("batch runs");
    assert_eq!(recovered.scored, 2);

    assert!(matches!(
        crashed.complete(
            &abandoned[0],
            Completion::Rejected {
                reason: "late".to_string()
            }
        ),
        Err(RepositoryError::LeaseLost(RecordId(1)))
    ));
    assert_eq!(store.stats().expect("stats").scored, 2);
}

#[derive(Debug, Clone)]
enum Op {
    Claim { worker: usize, size: usize },
    Complete { worker: usize },
    Advance { minutes: i64 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..3usize, 1..4usize).prop_map(|(worker, size)| Op::Claim { worker, size }),
        (0..3usize).prop_map(|worker| Op::Complete { worker }),
        (1..8i64).prop_map(|minutes| Op::Advance { minutes }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, failure_persistence: None, .. ProptestConfig::default() })]

    #[test]
    fn prop_live_claims_never_overlap(
        pool in 1usize..12,
        ops in proptest::collection::vec(op_strategy(), 1..60),
    ) {
        let clock = Arc::new(ManualClock::new(start()));
        let records: Vec<AuctionRecord> = (0..pool)
            .map(|index| record(index as u64 + 1, &label(index)))
            .collect();
        let store = Arc::new(MemoryRecordStore::with_records(records).expect("seed store"));
        let coordinator = BatchClaimCoordinator::new(
            store.clone(),
            clock.clone() as Arc<dyn Clock>,
            Duration::minutes(5),
        );
        let config = ConfigId("default".to_string());
        let mut held: Vec<Vec<AuctionRecord>> = vec![Vec::new(); 3];
        let mut completed: BTreeMap<RecordId, usize> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Claim { worker, size } => {
                    let batch = coordinator.claim(size, &config).expect("claim succeeds");
                    prop_assert!(batch.len() <= size);
                    let now = clock.now();
                    for claimed in &batch {
                        prop_assert!(!completed.contains_key(&claimed.id));
                        for (other, holdings) in held.iter().enumerate() {
                            for previous in holdings.iter().filter(|r| r.id == claimed.id) {
                                let lease = previous.claim.as_ref().expect("held records carry a claim");
                                prop_assert!(
                                    !lease.is_live(now),
                                    "record {} handed to worker {} while worker {} still held a live lease",
                                    claimed.id, worker, other
                                );
                            }
                        }
                    }
                    held[worker].extend(batch);
                }
                Op::Complete { worker } => {
                    if held[worker].is_empty() {
                        continue;
                    }
                    let target = held[worker].remove(0);
                    match coordinator.complete(&target, Completion::Scored {
                        age_score: 50.0,
                        lfs_score: 50.0,
                        sv_score: 50.0,
                        score: 50.0,
                    }) {
                        Ok(()) => {
                            prop_assert!(completed.insert(target.id, worker).is_none());
                        }
                        Err(RepositoryError::LeaseLost(id)) => prop_assert_eq!(id, target.id),
                        Err(other) => prop_assert!(false, "unexpected error {other:?}"),
                    }
                }
                Op::Advance { minutes } => clock.advance(Duration::minutes(minutes)),
            }
        }

        let stats = store.stats().expect("stats");
        prop_assert_eq!(stats.processed, completed.len());
        prop_assert_eq!(stats.processed + stats.unprocessed, pool);
    }

    #[test]
    fn prop_dense_rank_is_a_permutation(
        scores in proptest::collection::vec(0u8..20, 0..80),
    ) {
        let entries: Vec<ScoredEntry> = scores
            .iter()
            .enumerate()
            .map(|(index, score)| ScoredEntry {
                id: RecordId(index as u64),
                domain: label(index % 5),
                score: f64::from(*score) * 5.0,
                ranking: None,
            })
            .collect();
        let ranks: HashMap<RecordId, u32> = dense_rank(entries.clone());

        let assigned: BTreeSet<u32> = ranks.values().copied().collect();
        let expected: BTreeSet<u32> = (1..=entries.len() as u32).collect();
        prop_assert_eq!(assigned, expected);

        for left in &entries {
            for right in &entries {
                if left.score > right.score {
                    prop_assert!(ranks[&left.id] < ranks[&right.id]);
                }
            }
        }
    }
}
