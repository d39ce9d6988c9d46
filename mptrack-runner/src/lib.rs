//! mptrack runner: everything that touches the outside world.
//!
//! This crate builds on `mptrack-core` to provide:
//! - Run settings (TOML) and warehouse secrets (env / `.env`)
//! - `tracing` subscriber setup
//! - Read-only SQL Server access, typed queries and the ad-hoc query guard
//! - Parquet snapshot of the market data for offline runs
//! - Allocation and analyst workbook readers
//! - The calc pipeline, CSV/Parquet artifacts and Markdown reports

pub mod config;
pub mod export;
pub mod logging;
pub mod pipeline;
pub mod report;
pub mod snapshot;
pub mod warehouse;
pub mod workbook;

pub use config::{ConfigError, Credentials, ServerAddress, TrackerConfig};
pub use export::{
    read_attribution_csv, read_manifest, read_series_csv, write_artifacts, ArtifactPaths,
};
pub use pipeline::{calculate, run_calc, CalcOutput, MarketSource, PipelineError, RunManifest};
pub use report::{render_markdown, PeriodReport};
pub use snapshot::{MarketSnapshot, SnapshotCache, SnapshotError, SnapshotMeta};
pub use warehouse::{Cell, MssqlWarehouse, SqlParam, Table, Warehouse, WarehouseError};
pub use workbook::{read_allocation, read_analyst_mapping, WorkbookError};
