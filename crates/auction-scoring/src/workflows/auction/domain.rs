use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::scoring_config::ConfigId;

/// Stable identifier assigned to a listing at ingestion time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of the eligibility filter for a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum FilterStatus {
    Unevaluated,
    Passed,
    Rejected(String),
}

impl FilterStatus {
    pub fn label(&self) -> &'static str {
        match self {
            FilterStatus::Unevaluated => "unevaluated",
            FilterStatus::Passed => "passed",
            FilterStatus::Rejected(_) => "rejected",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            FilterStatus::Rejected(reason) => Some(reason.as_str()),
            _ => None,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, FilterStatus::Rejected(_))
    }
}

/// Opaque token proving which claim a completion belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimToken(pub u64);

/// Transient reservation of an unprocessed record by one worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub token: ClaimToken,
    pub config_id: ConfigId,
    pub claimed_at: DateTime<Utc>,
    pub lease_expires_at: DateTime<Utc>,
}

impl Claim {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.lease_expires_at > now
    }
}

/// Listing as delivered by ingestion, before any scoring state exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionListing {
    pub id: RecordId,
    pub domain: String,
    #[serde(default)]
    pub registered_on: Option<NaiveDate>,
    #[serde(default)]
    pub current_bid: Option<f64>,
    pub expires_at: DateTime<Utc>,
    pub marketplace: String,
}

/// Durable auction row mutated in place by filter, scorers, ranking, and classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionRecord {
    pub id: RecordId,
    pub domain: String,
    pub tld: String,
    pub registered_on: Option<NaiveDate>,
    pub current_bid: Option<f64>,
    pub expires_at: DateTime<Utc>,
    pub marketplace: String,
    pub filter_status: FilterStatus,
    pub age_score: Option<f64>,
    pub lfs_score: Option<f64>,
    pub sv_score: Option<f64>,
    pub score: Option<f64>,
    pub ranking: Option<u32>,
    pub preferred: bool,
    pub processed: bool,
    pub claim: Option<Claim>,
    pub updated_at: DateTime<Utc>,
}

impl AuctionRecord {
    pub fn from_listing(listing: AuctionListing, now: DateTime<Utc>) -> Self {
        let domain = listing.domain.trim().to_ascii_lowercase();
        let tld = derive_tld(&domain);
        Self {
            id: listing.id,
            domain,
            tld,
            registered_on: listing.registered_on,
            current_bid: listing.current_bid,
            expires_at: listing.expires_at,
            marketplace: listing.marketplace,
            filter_status: FilterStatus::Unevaluated,
            age_score: None,
            lfs_score: None,
            sv_score: None,
            score: None,
            ranking: None,
            preferred: false,
            processed: false,
            claim: None,
            updated_at: now,
        }
    }

    /// Second-level label, i.e. the part of the domain the scorers look at.
    pub fn label(&self) -> &str {
        domain_label(&self.domain)
    }

    /// Clears every derived field so the record is picked up again by the next batch.
    pub fn reset_scoring(&mut self, now: DateTime<Utc>) {
        self.filter_status = FilterStatus::Unevaluated;
        self.age_score = None;
        self.lfs_score = None;
        self.sv_score = None;
        self.score = None;
        self.ranking = None;
        self.preferred = false;
        self.processed = false;
        self.claim = None;
        self.updated_at = now;
    }

    pub fn view(&self) -> RecordView {
        RecordView {
            id: self.id,
            domain: self.domain.clone(),
            tld: self.tld.clone(),
            marketplace: self.marketplace.clone(),
            current_bid: self.current_bid,
            expires_at: self.expires_at,
            filter_status: self.filter_status.label(),
            filter_reason: self.filter_status.reason().map(str::to_string),
            age_score: self.age_score,
            lfs_score: self.lfs_score,
            sv_score: self.sv_score,
            score: self.score,
            ranking: self.ranking,
            preferred: self.preferred,
            processed: self.processed,
            updated_at: self.updated_at,
        }
    }
}

/// Everything after the first dot, so `example.co.uk` carries `co.uk`.
pub fn derive_tld(domain: &str) -> String {
    domain
        .split_once('.')
        .map(|(_, tld)| tld.trim_matches('.').to_ascii_lowercase())
        .unwrap_or_default()
}

pub fn domain_label(domain: &str) -> &str {
    domain.split_once('.').map(|(label, _)| label).unwrap_or(domain)
}

/// Read-only projection consumed by listing and report surfaces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordView {
    pub id: RecordId,
    pub domain: String,
    pub tld: String,
    pub marketplace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_bid: Option<f64>,
    pub expires_at: DateTime<Utc>,
    pub filter_status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_reason: Option<String>,
    pub age_score: Option<f64>,
    pub lfs_score: Option<f64>,
    pub sv_score: Option<f64>,
    pub score: Option<f64>,
    pub ranking: Option<u32>,
    pub preferred: bool,
    pub processed: bool,
    pub updated_at: DateTime<Utc>,
}
