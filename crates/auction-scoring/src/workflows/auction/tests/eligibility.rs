use super::common::*;
use chrono::NaiveDate;

use crate::workflows::auction::domain::FilterStatus;
use crate::workflows::auction::eligibility::{EligibilityFilter, EligibilityVerdict};
use crate::workflows::auction::scoring_config::{FilterParams, HyphenPolicy};

fn today() -> NaiveDate {
    start().date_naive()
}

fn verdict(params: &FilterParams, domain: &str) -> EligibilityVerdict {
    EligibilityFilter::new(params).evaluate(&record(1, domain), today())
}

fn rejection(params: &FilterParams, domain: &str) -> String {
    match verdict(params, domain) {
        EligibilityVerdict::Rejected { reason } => reason,
        EligibilityVerdict::Passed { .. } => panic!("{domain} unexpectedly passed"),
    }
}

#[test]
fn partition_splits_kept_and_removed_records() {
    let params = FilterParams::default();
    let batch = vec![
        record(1, "cloudshop.com"),
        record(2, "cloudshop.xyz"),
        record(3, "best-deals24.net"),
        record(4, "a1b2c3.io"),
    ];

    let result = EligibilityFilter::new(&params).partition(batch, today());

    let kept: Vec<u64> = result.kept.iter().map(|(record, _)| record.id.0).collect();
    let removed: Vec<u64> = result
        .removed
        .iter()
        .map(|(record, _)| record.id.0)
        .collect();
    assert_eq!(kept, vec![1, 3]);
    assert_eq!(removed, vec![2, 4]);
}

#[test]
fn passing_records_carry_their_age_score() {
    let params = FilterParams::default();
    let mut young = record(1, "fresh.com");
    young.registered_on = NaiveDate::from_ymd_opt(2023, 1, 1);

    assert_eq!(
        EligibilityFilter::new(&params).evaluate(&young, today()),
        EligibilityVerdict::Passed { age_score: 20.0 }
    );
    assert_eq!(
        verdict(&params, "vintage.com"),
        EligibilityVerdict::Passed { age_score: 100.0 }
    );
}

#[test]
fn rejection_reasons_name_the_failed_rule() {
    let params = FilterParams::default();

    assert!(rejection(&params, "cloudshop.xyz").contains("tld 'xyz'"));
    assert!(rejection(&params, "averyveryverylongdomainlabel.com").contains("length"));
    assert!(rejection(&params, "abc123.com").contains("digit count 3"));
    assert!(rejection(&params, "-leading.com").contains("leading or trailing hyphen"));
    assert!(rejection(&params, "two-hyphen-name.com").contains("2 hyphens"));
    assert!(rejection(&params, "shop_now.com").contains("invalid character '_'"));
}

#[test]
fn hyphen_policy_is_configurable() {
    let mut params = FilterParams::default();

    params.hyphen_policy = HyphenPolicy::Forbid;
    assert!(rejection(&params, "best-deals.com").contains("not allowed"));

    params.hyphen_policy = HyphenPolicy::Allow;
    assert!(matches!(
        verdict(&params, "the-best-deals.com"),
        EligibilityVerdict::Passed { .. }
    ));
}

#[test]
fn multi_part_tld_must_be_listed_as_a_whole() {
    let mut params = FilterParams::default();
    assert!(rejection(&params, "cloudshop.co.uk").contains("co.uk"));

    params.allowed_tlds.insert("co.uk".to_string());
    assert!(matches!(
        verdict(&params, "cloudshop.co.uk"),
        EligibilityVerdict::Passed { .. }
    ));
}

#[test]
fn rejected_sibling_does_not_block_scoring_in_the_same_batch() {
    let harness = harness(&[("cloudshop.com", 64.0), ("cloudshop.xyz", 88.0)]);

    let report = harness
        .service
        .run_batch(Default::default())
        .expect("batch runs");

    assert_eq!(report.claimed, 2);
    assert_eq!(report.scored, 1);
    assert_eq!(report.rejected, 1);

    let kept = stored(&harness.store, 1);
    assert_eq!(kept.filter_status, FilterStatus::Passed);
    assert_eq!(kept.score, Some(64.0));
    assert!(kept.processed);

    let rejected = stored(&harness.store, 2);
    assert!(rejected.processed);
    assert!(rejected.score.is_none());
    assert!(rejected
        .filter_status
        .reason()
        .map_or(false, |reason| reason.contains("xyz")));
}
