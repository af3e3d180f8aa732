//! Set-based eligibility rules and the registration-age sub-score.
//!
//! Everything here is pure: no store access, no clock reads. The caller passes
//! the evaluation date so batches are reproducible.

use chrono::{Datelike, NaiveDate};

use super::domain::AuctionRecord;
use super::scoring_config::{FilterParams, HyphenPolicy};

/// Age tiers in whole years, highest first.
const AGE_TIERS: [(u32, f64); 3] = [(10, 100.0), (5, 50.0), (0, 20.0)];
const UNKNOWN_AGE_SCORE: f64 = 0.0;

#[derive(Debug, Clone, PartialEq)]
pub enum EligibilityVerdict {
    Passed { age_score: f64 },
    Rejected { reason: String },
}

pub struct FilterResult {
    pub kept: Vec<(AuctionRecord, f64)>,
    pub removed: Vec<(AuctionRecord, String)>,
}

pub struct EligibilityFilter<'a> {
    params: &'a FilterParams,
}

impl<'a> EligibilityFilter<'a> {
    pub fn new(params: &'a FilterParams) -> Self {
        Self { params }
    }

    /// Splits a claimed batch into records that continue to scoring (with their
    /// age score) and records that leave the pipeline with a reason.
    pub fn partition(&self, records: Vec<AuctionRecord>, today: NaiveDate) -> FilterResult {
        let mut kept = Vec::with_capacity(records.len());
        let mut removed = Vec::new();

        for record in records {
            match self.evaluate(&record, today) {
                EligibilityVerdict::Passed { age_score } => kept.push((record, age_score)),
                EligibilityVerdict::Rejected { reason } => removed.push((record, reason)),
            }
        }

        FilterResult { kept, removed }
    }

    pub fn evaluate(&self, record: &AuctionRecord, today: NaiveDate) -> EligibilityVerdict {
        match self.rejection_reason(record) {
            Some(reason) => EligibilityVerdict::Rejected { reason },
            None => EligibilityVerdict::Passed {
                age_score: age_score(record.registered_on, today),
            },
        }
    }

    fn rejection_reason(&self, record: &AuctionRecord) -> Option<String> {
        let label = record.label();
        if label.is_empty() {
            return Some("empty domain label".to_string());
        }

        if let Some(invalid) = label
            .chars()
            .find(|ch| !(ch.is_ascii_lowercase() || ch.is_ascii_digit() || *ch == '-'))
        {
            return Some(format!("invalid character '{invalid}' in domain"));
        }

        if !self.params.allowed_tlds.contains(&record.tld) {
            return Some(format!("tld '{}' is not in the allowed set", record.tld));
        }

        let length = label.chars().count();
        if length > self.params.max_length {
            return Some(format!(
                "domain length {length} exceeds maximum {}",
                self.params.max_length
            ));
        }

        let digits = label.chars().filter(char::is_ascii_digit).count();
        if digits > self.params.max_digits {
            return Some(format!(
                "digit count {digits} exceeds maximum {}",
                self.params.max_digits
            ));
        }

        let hyphens = label.matches('-').count();
        if hyphens > 0 && (label.starts_with('-') || label.ends_with('-')) {
            return Some("leading or trailing hyphen".to_string());
        }
        match self.params.hyphen_policy {
            HyphenPolicy::Forbid if hyphens > 0 => Some("hyphens are not allowed".to_string()),
            HyphenPolicy::AllowSingle if hyphens > 1 => {
                Some(format!("{hyphens} hyphens exceed the single hyphen allowance"))
            }
            _ => None,
        }
    }
}

/// Tiered score from registration date; total over every input.
pub fn age_score(registered_on: Option<NaiveDate>, today: NaiveDate) -> f64 {
    let Some(years) = registered_on.and_then(|date| full_years_between(date, today)) else {
        return UNKNOWN_AGE_SCORE;
    };

    AGE_TIERS
        .iter()
        .find(|(min_years, _)| years >= *min_years)
        .map(|(_, score)| *score)
        .unwrap_or(UNKNOWN_AGE_SCORE)
}

/// Completed years between two dates; `None` when `from` lies in the future.
fn full_years_between(from: NaiveDate, to: NaiveDate) -> Option<u32> {
    if from > to {
        return None;
    }
    let mut years = to.year() - from.year();
    if (to.month(), to.day()) < (from.month(), from.day()) {
        years -= 1;
    }
    u32::try_from(years).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn age_tiers_follow_full_years() {
        let today = date(2026, 10, 19);
        assert_eq!(age_score(Some(date(2016, 10, 19)), today), 100.0);
        assert_eq!(age_score(Some(date(2016, 10, 20)), today), 50.0);
        assert_eq!(age_score(Some(date(2021, 10, 19)), today), 50.0);
        assert_eq!(age_score(Some(date(2021, 10, 20)), today), 20.0);
        assert_eq!(age_score(Some(today), today), 20.0);
        assert_eq!(age_score(None, today), 0.0);
    }

    #[test]
    fn future_registration_is_treated_as_unknown() {
        assert_eq!(age_score(Some(date(2030, 1, 1)), date(2026, 1, 1)), 0.0);
    }
}
