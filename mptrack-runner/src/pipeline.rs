//! The calc pipeline: allocation sheet + market data → attribution rows and
//! index series.
//!
//! Steps:
//! 1. Parse the allocation schedule.
//! 2. Pull members, prices, caps and the benchmark index from the warehouse
//!    (optionally refreshing the snapshot), or load them from the snapshot.
//! 3. Simulate the rebalanced model and the buy-and-hold baseline.
//! 4. Attribute and build the rebased index series.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use thiserror::Error;

use mptrack_core::allocation::RebalanceSchedule;
use mptrack_core::attribution::{attribute, index_series, AttributionInputs, AttributionRow, SeriesPoint};
use mptrack_core::domain::{Aggregation, Panel};
use mptrack_core::engine::{simulate, RebalancePolicy};
use mptrack_core::EngineError;

use crate::config::TrackerConfig;
use crate::snapshot::{MarketSnapshot, SnapshotCache, SnapshotError};
use crate::warehouse::{
    fetch_benchmark_members, fetch_index, fetch_market_caps, fetch_prices, Warehouse,
    WarehouseError,
};
use crate::workbook::{read_allocation, WorkbookError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Workbook(#[from] WorkbookError),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("cannot hash market data: {0}")]
    Hash(#[from] serde_json::Error),

    #[error("the warehouse returned no prices for {tickers} tickers since {start}")]
    NoMarketData { tickers: usize, start: NaiveDate },
}

/// Where market data comes from.
pub enum MarketSource<'a> {
    /// Live warehouse. With `refresh_cache` the pull is also written to the
    /// snapshot directory.
    Warehouse {
        warehouse: &'a mut dyn Warehouse,
        refresh_cache: bool,
    },
    /// The snapshot directory only (`--offline`).
    Snapshot,
}

impl MarketSource<'_> {
    fn label(&self) -> &'static str {
        match self {
            MarketSource::Warehouse { .. } => "warehouse",
            MarketSource::Snapshot => "snapshot",
        }
    }
}

/// Run metadata written next to the artifacts as `manifest.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub generated_at: NaiveDateTime,
    pub source: String,
    pub allocation: PathBuf,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub rebalance_dates: Vec<NaiveDate>,
    pub portfolio_tickers: usize,
    pub benchmark_members: usize,
    pub attribution_rows: usize,
    pub series_rows: usize,
    pub data_hash: String,
    pub warnings: Vec<String>,
}

/// Everything a calc run produces.
#[derive(Debug, Clone)]
pub struct CalcOutput {
    pub rebalance_dates: Vec<NaiveDate>,
    pub rows: Vec<AttributionRow>,
    pub series: Vec<SeriesPoint>,
    pub warnings: Vec<String>,
    pub manifest: RunManifest,
}

/// Pull everything the calc needs from the warehouse, all from `start`.
pub fn pull_market_data<W: Warehouse + ?Sized>(
    warehouse: &mut W,
    schedule: &RebalanceSchedule,
    config: &TrackerConfig,
) -> Result<MarketSnapshot, PipelineError> {
    let start = schedule.start_date();
    let chunk = config.warehouse.ticker_chunk_size;

    let members = fetch_benchmark_members(warehouse)?;
    let universe = universe(schedule, &members);
    let prices = fetch_prices(warehouse, &universe, start, chunk)?;
    if prices.is_empty() {
        return Err(PipelineError::NoMarketData {
            tickers: universe.len(),
            start,
        });
    }
    let caps = fetch_market_caps(warehouse, &members, start, chunk)?;
    let index = fetch_index(warehouse, &config.warehouse.benchmark_code, start)?;

    Ok(MarketSnapshot {
        start,
        members,
        tickers: universe,
        prices,
        caps,
        index,
    })
}

/// Schedule tickers ∪ benchmark members, sorted.
pub fn universe(schedule: &RebalanceSchedule, members: &[String]) -> Vec<String> {
    schedule
        .tickers()
        .iter()
        .chain(members)
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Run the full calculation.
pub fn run_calc(config: &TrackerConfig, source: MarketSource<'_>) -> Result<CalcOutput, PipelineError> {
    let schedule = read_allocation(&config.inputs.allocation)?;
    let start = schedule.start_date();
    let cache = SnapshotCache::new(&config.cache.dir);
    let source_label = source.label();

    let market = match source {
        MarketSource::Warehouse {
            warehouse,
            refresh_cache,
        } => {
            let market = pull_market_data(warehouse, &schedule, config)?;
            if refresh_cache {
                cache.write(&market)?;
            }
            market
        }
        MarketSource::Snapshot => cache.load(start, schedule.tickers())?,
    };

    calculate(config, &schedule, &market, source_label)
}

/// Engine half of the pipeline, over already-acquired market data.
pub fn calculate(
    config: &TrackerConfig,
    schedule: &RebalanceSchedule,
    market: &MarketSnapshot,
    source: &str,
) -> Result<CalcOutput, PipelineError> {
    let start = schedule.start_date();
    let universe = universe(schedule, &market.members);

    let prices = Panel::from_observations(&market.prices, Aggregation::Mean)
        .forward_fill()
        .since(start);
    let caps = Panel::from_observations(&market.caps, Aggregation::Last)
        .forward_fill()
        .since(start);
    tracing::info!(
        days = prices.len(),
        tickers = prices.tickers().len(),
        "pivoted price history"
    );

    let model = simulate(schedule, &prices, RebalancePolicy::Scheduled)?;
    let baseline = simulate(schedule, &prices, RebalancePolicy::BuyAndHold)?;

    let mut warnings: Vec<String> = Vec::new();
    for w in model.warnings.iter().chain(&baseline.warnings) {
        if !warnings.contains(w) {
            tracing::warn!("{w}");
            warnings.push(w.clone());
        }
    }

    let rows = attribute(&AttributionInputs {
        model: &model,
        baseline: &baseline,
        prices: &prices,
        caps: &caps,
        benchmark: &market.index,
        universe: &universe,
    });
    let series = index_series(&model, &baseline, &market.index);
    tracing::info!(rows = rows.len(), days = series.len(), "computed attribution");

    let manifest = RunManifest {
        generated_at: chrono::Local::now().naive_local(),
        source: source.to_string(),
        allocation: config.inputs.allocation.clone(),
        start_date: start,
        end_date: series.last().map(|p| p.date),
        rebalance_dates: schedule.dates(),
        portfolio_tickers: schedule.tickers().len(),
        benchmark_members: market.members.len(),
        attribution_rows: rows.len(),
        series_rows: series.len(),
        data_hash: market.data_hash()?,
        warnings: warnings.clone(),
    };

    Ok(CalcOutput {
        rebalance_dates: schedule.dates(),
        rows,
        series,
        warnings,
        manifest,
    })
}
