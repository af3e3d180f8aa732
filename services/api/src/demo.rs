use crate::infra::{build_service, default_scoring_config, load_listings, ApiService};
use auction_scoring::config::{AppConfig, EngineConfig};
use auction_scoring::error::AppError;
use auction_scoring::telemetry;
use auction_scoring::workflows::auction::{
    AuctionListing, AuctionRecord, BatchRequest, ConfigSelector, DrainReport, ListingQuery,
    RankingPassReport, RecordId, RecordView, SystemClock,
};
use chrono::{Duration, NaiveDate, Utc};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct ProcessArgs {
    /// JSON array of listings to score
    #[arg(long)]
    pub(crate) listings: PathBuf,
    /// Records per claim (defaults to SCORING_BATCH_SIZE)
    #[arg(long)]
    pub(crate) batch_size: Option<usize>,
    /// Scoring config to run under (defaults to the active one)
    #[arg(long)]
    pub(crate) config_id: Option<String>,
    /// Number of ranked rows to print
    #[arg(long, default_value_t = 20)]
    pub(crate) top: usize,
    /// Print the run summary as JSON instead of a table
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Records per claim for the demo run
    #[arg(long)]
    pub(crate) batch_size: Option<usize>,
    /// Score a record must reach to be flagged preferred
    #[arg(long)]
    pub(crate) preferred_score: Option<f64>,
}

#[derive(Debug, Serialize)]
struct RunSummary {
    drain: DrainReport,
    ranking: RankingPassReport,
    listing: Vec<RecordView>,
}

pub(crate) fn run_process(args: ProcessArgs) -> Result<(), AppError> {
    let ProcessArgs {
        listings,
        batch_size,
        config_id,
        top,
        json,
    } = args;

    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let records = load_listings(&listings)?;
    let service = build_service(&config.engine, records, Arc::new(SystemClock))?;
    let selector = ConfigSelector::from(config_id);
    let summary = run_pipeline(&service, batch_size, &selector, top)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        render_summary(&summary);
    }
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        batch_size,
        preferred_score,
    } = args;

    let service = build_service(
        &EngineConfig::default(),
        sample_catalog(),
        Arc::new(SystemClock),
    )?;

    if let Some(threshold) = preferred_score {
        let mut config = default_scoring_config();
        config.thresholds.score_threshold = Some(threshold);
        service.save_config(config)?;
    }

    println!("Auction scoring demo");
    let summary = run_pipeline(
        &service,
        Some(batch_size.unwrap_or(4)),
        &ConfigSelector::Active,
        10,
    )?;
    render_summary(&summary);

    let stats = service.stats()?;
    println!(
        "\nStore: {} total, {} processed, {} scored, {} rejected, {} preferred",
        stats.total, stats.processed, stats.scored, stats.rejected, stats.preferred
    );

    let rejected: Vec<RecordView> = (1..=stats.total as u64)
        .filter_map(|id| service.record(RecordId(id)).ok())
        .map(|record| record.view())
        .filter(|view| view.filter_reason.is_some())
        .collect();
    if !rejected.is_empty() {
        println!("\nRejected listings");
        for view in rejected {
            println!(
                "- {}: {}",
                view.domain,
                view.filter_reason.unwrap_or_default()
            );
        }
    }
    Ok(())
}

fn run_pipeline(
    service: &ApiService,
    batch_size: Option<usize>,
    selector: &ConfigSelector,
    top: usize,
) -> Result<RunSummary, AppError> {
    let drain = service.process_until_exhausted(BatchRequest {
        batch_size,
        config: selector.clone(),
    })?;
    let ranking = service.rank_and_classify(selector)?;
    let listing = service.listing(&ListingQuery {
        limit: top,
        ..ListingQuery::default()
    })?;

    Ok(RunSummary {
        drain,
        ranking,
        listing,
    })
}

fn render_summary(summary: &RunSummary) {
    let drain = &summary.drain;
    println!(
        "Config '{}': {} batch(es), {} claimed, {} scored, {} rejected, {} scoring error(s), {} data-gap warning(s)",
        drain.config_id,
        drain.batches,
        drain.claimed,
        drain.scored,
        drain.rejected,
        drain.scoring_errors,
        drain.warnings
    );
    println!(
        "Ranking generation {}: {} record(s) ranked in {} chunk(s), {} preferred",
        summary.ranking.ranking.generation,
        summary.ranking.ranking.ranked,
        summary.ranking.ranking.chunks,
        summary.ranking.classification.preferred
    );

    if summary.listing.is_empty() {
        println!("\nRanked listing: none");
        return;
    }

    println!("\nRanked listing");
    println!(
        "{:>4}  {:<24} {:>6} {:>6} {:>6} {:>6}  {}",
        "rank", "domain", "score", "age", "lfs", "sv", "preferred"
    );
    for row in &summary.listing {
        println!(
            "{:>4}  {:<24} {:>6.1} {:>6.1} {:>6.1} {:>6.1}  {}",
            row.ranking.map(|rank| rank.to_string()).unwrap_or_else(|| "-".to_string()),
            row.domain,
            row.score.unwrap_or_default(),
            row.age_score.unwrap_or_default(),
            row.lfs_score.unwrap_or_default(),
            row.sv_score.unwrap_or_default(),
            if row.preferred { "yes" } else { "no" }
        );
    }
}

fn sample_catalog() -> Vec<AuctionRecord> {
    let now = Utc::now();
    let catalog: [(&str, Option<(i32, u32, u32)>, f64, &str); 12] = [
        ("cloudshop.com", Some((2009, 5, 14)), 1250.0, "godaddy"),
        ("smartbank.io", Some((2018, 2, 1)), 880.0, "namejet"),
        ("healthcare-pro.net", Some((2013, 9, 30)), 410.0, "dropcatch"),
        ("bestdeals.org", Some((2021, 7, 4)), 95.0, "godaddy"),
        ("datacloud.co", None, 300.0, "namejet"),
        ("fitnessapp.com", Some((2016, 1, 20)), 520.0, "dropcatch"),
        ("qzxvkp.net", Some((2020, 3, 3)), 12.0, "godaddy"),
        ("moneytech.com", Some((2011, 11, 11)), 2100.0, "namejet"),
        ("cheap-loans-now.com", Some((2015, 6, 6)), 40.0, "godaddy"),
        ("travel24.io", Some((2019, 8, 8)), 150.0, "dropcatch"),
        ("shop123.com", Some((2010, 4, 1)), 75.0, "godaddy"),
        ("greenenergy.xyz", Some((2012, 12, 12)), 600.0, "namejet"),
    ];

    catalog
        .iter()
        .enumerate()
        .map(|(index, (domain, registered, bid, marketplace))| {
            AuctionRecord::from_listing(
                AuctionListing {
                    id: RecordId(index as u64 + 1),
                    domain: domain.to_string(),
                    registered_on: registered
                        .and_then(|(year, month, day)| NaiveDate::from_ymd_opt(year, month, day)),
                    current_bid: Some(*bid),
                    expires_at: now + Duration::hours(6 * (index as i64 + 1)),
                    marketplace: marketplace.to_string(),
                },
                now,
            )
        })
        .collect()
}
