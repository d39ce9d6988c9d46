//! mptrack CLI: calc, report, ad-hoc query, schema and cache commands.
//!
//! Commands:
//! - `calc`: run the attribution pipeline and write the CSV artifacts
//! - `report`: period summary from the saved artifacts
//! - `query`: read-only ad-hoc SELECT against the warehouse
//! - `schema check`: verify the live warehouse against the table contract
//! - `schema lint`: self-consistency of a Markdown schema reference
//! - `cache status`: metadata of the offline snapshot

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use mptrack_core::attribution::AttributionRow;
use mptrack_core::catalog::{lint_schema_doc, verify, WarehouseContract};
use mptrack_core::summary::{to_bps, to_percent, TickerSummary};
use mptrack_runner::config::DEFAULT_ENV_FILE;
use mptrack_runner::report::DEFAULT_TOP;
use mptrack_runner::warehouse::{ensure_read_only, fetch_columns, render_csv, render_text};
use mptrack_runner::{
    read_analyst_mapping, read_attribution_csv, read_series_csv, render_markdown, run_calc,
    write_artifacts, Cell, Credentials, MarketSource, MssqlWarehouse, PeriodReport,
    SnapshotCache, Table, TrackerConfig, Warehouse,
};

#[derive(Parser)]
#[command(
    name = "mptrack",
    about = "Model-portfolio tracking against VNINDEX over the market-data warehouse"
)]
struct Cli {
    /// Settings file. Defaults to ./mptrack.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Env file with SQL_SERVER, SQL_DATABASE, SQL_USERNAME, SQL_PASSWORD.
    #[arg(long, global = true, default_value = DEFAULT_ENV_FILE)]
    env_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute daily attribution and write the CSV artifacts.
    Calc {
        /// Use the snapshot cache instead of the warehouse.
        #[arg(long, default_value_t = false, conflicts_with = "refresh_cache")]
        offline: bool,

        /// Write the warehouse pull to the snapshot cache.
        #[arg(long, default_value_t = false)]
        refresh_cache: bool,

        /// Allocation sheet (overrides the settings file).
        #[arg(long)]
        allocation: Option<PathBuf>,

        /// Output directory (overrides the settings file).
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Summarise a period from the saved artifacts.
    Report {
        /// First date (YYYY-MM-DD). Defaults to the first row.
        #[arg(long)]
        from: Option<String>,

        /// Last date (YYYY-MM-DD). Defaults to the last row.
        #[arg(long)]
        to: Option<String>,

        /// Rows in the top/bottom contributor tables.
        #[arg(long, default_value_t = DEFAULT_TOP)]
        top: usize,

        /// Also write the report as Markdown.
        #[arg(long)]
        markdown: Option<PathBuf>,

        /// Directory holding the artifacts (overrides the settings file).
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Run a read-only SELECT and print or save the result.
    Query {
        /// SQL text.
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        sql: Option<String>,

        /// File holding the SQL text.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Save the full result as CSV instead of printing it.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Rows to print.
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Warehouse schema commands.
    Schema {
        #[command(subcommand)]
        action: SchemaAction,
    },
    /// Snapshot cache commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum SchemaAction {
    /// Check that every table and column the tracker reads exists.
    Check,
    /// Check that every table in a schema document's summary has a section.
    Lint {
        /// Markdown schema reference.
        doc: PathBuf,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show the snapshot's date range, row counts and hash.
    Status,
}

fn main() -> ExitCode {
    mptrack_runner::logging::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = TrackerConfig::load(cli.config.as_deref())?;
    tracing::debug!(?config, "loaded settings");
    match cli.command {
        Commands::Calc {
            offline,
            refresh_cache,
            allocation,
            output_dir,
        } => {
            if let Some(path) = allocation {
                config.inputs.allocation = path;
            }
            if let Some(dir) = output_dir {
                config.output.dir = dir;
            }
            run_calc_cmd(&config, &cli.env_file, offline, refresh_cache)
        }
        Commands::Report {
            from,
            to,
            top,
            markdown,
            output_dir,
        } => {
            if let Some(dir) = output_dir {
                config.output.dir = dir;
            }
            let from = from.as_deref().map(parse_date).transpose()?;
            let to = to.as_deref().map(parse_date).transpose()?;
            run_report_cmd(&config, from, to, top, markdown.as_deref())
        }
        Commands::Query {
            sql,
            file,
            csv,
            limit,
        } => {
            let text = match (sql, file) {
                (Some(sql), _) => sql,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?,
                (None, None) => bail!("one of --sql or --file is required"),
            };
            run_query_cmd(&config, &cli.env_file, &text, csv.as_deref(), limit)
        }
        Commands::Schema { action } => match action {
            SchemaAction::Check => run_schema_check(&config, &cli.env_file),
            SchemaAction::Lint { doc } => run_schema_lint(&doc),
        },
        Commands::Cache { action } => match action {
            CacheAction::Status => run_cache_status(&config),
        },
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid date '{s}', expected YYYY-MM-DD"))
}

fn connect(config: &TrackerConfig, env_file: &Path) -> Result<MssqlWarehouse> {
    let credentials = Credentials::from_env(env_file)?;
    Ok(MssqlWarehouse::connect(&credentials, &config.warehouse)?)
}

// ── calc ─────────────────────────────────────────────────────────────

fn run_calc_cmd(
    config: &TrackerConfig,
    env_file: &Path,
    offline: bool,
    refresh_cache: bool,
) -> Result<()> {
    let output = if offline {
        run_calc(config, MarketSource::Snapshot)?
    } else {
        let mut warehouse = connect(config, env_file)?;
        let result = run_calc(
            config,
            MarketSource::Warehouse {
                warehouse: &mut warehouse,
                refresh_cache,
            },
        );
        let closed = warehouse.close();
        after_close(result, closed)?
    };

    let paths = write_artifacts(&config.output, &output)?;

    println!(
        "Calc complete: {} rebalances, {} days, {} attribution rows ({})",
        output.rebalance_dates.len(),
        output.series.len(),
        output.rows.len(),
        output.manifest.source
    );
    println!("{}", head_tail(&output.rows, 5));
    for w in &output.warnings {
        println!("WARNING: {w}");
    }
    println!("Attribution: {}", paths.attribution.display());
    println!("Series:      {}", paths.series.display());
    println!("Manifest:    {}", paths.manifest.display());
    Ok(())
}

fn attribution_table(rows: &[&AttributionRow]) -> Table {
    let mut table = Table::new(
        [
            "TRADE_DATE",
            "Ticker",
            "AvgPortfolioWeightYTD",
            "AvgBenchmarkWeightYTD",
            "Attribution",
            "AttributionVsOriginal",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect(),
    );
    let opt = |v: Option<f64>| v.map_or(Cell::Null, Cell::Float);
    table.rows = rows
        .iter()
        .map(|r| {
            vec![
                Cell::Date(r.date),
                Cell::Text(r.ticker.clone()),
                Cell::Float(r.avg_portfolio_weight),
                Cell::Float(r.avg_benchmark_weight),
                Cell::Float(r.attribution),
                opt(r.attribution_vs_original),
            ]
        })
        .collect();
    table
}

/// First and last `n` rows as an aligned table.
fn head_tail(rows: &[AttributionRow], n: usize) -> String {
    if rows.len() <= 2 * n {
        let all: Vec<&AttributionRow> = rows.iter().collect();
        return render_text(&attribution_table(&all), all.len());
    }
    let head: Vec<&AttributionRow> = rows[..n].iter().collect();
    let tail: Vec<&AttributionRow> = rows[rows.len() - n..].iter().collect();
    format!(
        "{}...\n{}",
        render_text(&attribution_table(&head), n),
        render_text(&attribution_table(&tail), n)
    )
}

// ── report ───────────────────────────────────────────────────────────

fn summary_table(entries: &[TickerSummary]) -> Table {
    let mut table = Table::new(
        ["Ticker", "AvgWeight%", "ActiveWeight%", "TickerReturn%", "Attribution(bps)", "VsOriginal(bps)"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    );
    table.rows = entries
        .iter()
        .map(|t| {
            vec![
                Cell::Text(t.ticker.clone()),
                Cell::Float(to_percent(t.avg_portfolio_weight)),
                Cell::Float(to_percent(t.active_weight)),
                Cell::Float(to_percent(t.ticker_return)),
                Cell::Float(to_bps(t.attribution)),
                Cell::Float(to_bps(t.attribution_vs_original)),
            ]
        })
        .collect();
    table
}

fn run_report_cmd(
    config: &TrackerConfig,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    top: usize,
    markdown: Option<&Path>,
) -> Result<()> {
    let attribution_path = config.output.attribution_path();
    let series_path = config.output.series_path();
    if !attribution_path.exists() {
        bail!(
            "{} not found; run `mptrack calc` first",
            attribution_path.display()
        );
    }
    let rows = read_attribution_csv(&attribution_path)?;
    let series = if series_path.exists() {
        read_series_csv(&series_path)?
    } else {
        Vec::new()
    };
    let analysts = read_analyst_mapping(&config.inputs.analysts)?;

    let report = PeriodReport::build(&rows, &series, &analysts, from, to, top)?;

    println!("Period {} to {}", report.from, report.to);
    if let Some(h) = &report.headlines {
        for (label, value) in [
            ("Model portfolio", h.model),
            ("Original portfolio", h.original),
            ("VNINDEX", h.benchmark),
        ] {
            match value {
                Some(v) => println!(
                    "  {label:<20} {:>8.2}  YTD {:>7.2}%",
                    v.last,
                    to_percent(v.ytd)
                ),
                None => println!("  {label:<20}      n/a"),
            }
        }
    }
    println!(
        "  Attribution vs VNINDEX {:.2} bps, vs original {:.2} bps",
        to_bps(report.total_attribution()),
        to_bps(report.total_attribution_vs_original())
    );
    println!("\nTop contributors\n{}", render_text(&summary_table(&report.top), top));
    println!(
        "Bottom contributors\n{}",
        render_text(&summary_table(&report.bottom), top)
    );
    println!("Analysts");
    for a in &report.analysts {
        println!(
            "  {:<24} {:>3} tickers  {:>9.2} bps  {:>9.2} bps vs original",
            a.analyst,
            a.tickers,
            to_bps(a.attribution),
            to_bps(a.attribution_vs_original)
        );
    }

    if let Some(path) = markdown {
        std::fs::write(path, render_markdown(&report))
            .with_context(|| format!("writing {}", path.display()))?;
        println!("\nReport written to {}", path.display());
    }
    Ok(())
}

/// The work's own error wins over a failed close.
fn after_close<T, E, C>(
    result: std::result::Result<T, E>,
    closed: std::result::Result<(), C>,
) -> Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
    C: std::error::Error + Send + Sync + 'static,
{
    let value = result?;
    closed.context("closing the warehouse connection")?;
    Ok(value)
}

// ── query ────────────────────────────────────────────────────────────

fn run_query_cmd(
    config: &TrackerConfig,
    env_file: &Path,
    sql: &str,
    csv: Option<&Path>,
    limit: usize,
) -> Result<()> {
    let sql = ensure_read_only(sql)?;
    let mut warehouse = connect(config, env_file)?;
    let result = warehouse.query(&sql, &[]);
    let closed = warehouse.close();
    let table = after_close(result, closed)?;

    match csv {
        Some(path) => {
            std::fs::write(path, render_csv(&table)?)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("{} rows written to {}", table.len(), path.display());
        }
        None => print!("{}", render_text(&table, limit)),
    }
    Ok(())
}

// ── schema ───────────────────────────────────────────────────────────

fn run_schema_check(config: &TrackerConfig, env_file: &Path) -> Result<()> {
    let contract = WarehouseContract::default();
    let mut warehouse = connect(config, env_file)?;
    let live = fetch_columns(&mut warehouse, &contract.tables);
    let closed = warehouse.close();
    let issues = verify(&contract, &after_close(live, closed)?);

    if issues.is_empty() {
        println!("Warehouse matches the contract ({} tables).", contract.tables.len());
        return Ok(());
    }
    for issue in &issues {
        println!("  {issue}");
    }
    bail!("{} schema issue(s)", issues.len())
}

fn run_schema_lint(doc: &Path) -> Result<()> {
    let text =
        std::fs::read_to_string(doc).with_context(|| format!("reading {}", doc.display()))?;
    let issues = lint_schema_doc(&text);
    if issues.is_empty() {
        println!("{}: consistent", doc.display());
        return Ok(());
    }
    for issue in &issues {
        println!("  {issue}");
    }
    bail!("{}: {} issue(s)", doc.display(), issues.len())
}

// ── cache ────────────────────────────────────────────────────────────

fn run_cache_status(config: &TrackerConfig) -> Result<()> {
    let cache = SnapshotCache::new(&config.cache.dir);
    match cache.status()? {
        None => println!(
            "No snapshot in {}. Run `mptrack calc --refresh-cache` to create one.",
            cache.dir().display()
        ),
        Some(meta) => {
            println!("Snapshot: {}", cache.dir().display());
            println!(
                "  Range:     {} to {}",
                meta.start_date,
                meta.end_date.map_or_else(|| "?".to_string(), |d| d.to_string())
            );
            println!("  Members:   {}", meta.members);
            println!(
                "  Rows:      {} prices, {} caps, {} index",
                meta.price_rows, meta.cap_rows, meta.index_rows
            );
            println!("  Hash:      {}", meta.data_hash);
            println!("  Cached at: {}", meta.cached_at);
        }
    }
    Ok(())
}
