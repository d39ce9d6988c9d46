//! Calc artifacts: attribution CSV, series CSV (+ Parquet copy), manifest.
//!
//! Non-finite numbers and absent baseline fields are written as empty cells
//! and read back as NaN / `None`.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use mptrack_core::attribution::{AttributionRow, SeriesPoint};

use crate::config::OutputConfig;
use crate::pipeline::{CalcOutput, RunManifest};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub const ATTRIBUTION_COLUMNS: [&str; 14] = [
    "TRADE_DATE",
    "Ticker",
    "AvgPortfolioWeightYTD",
    "AvgBenchmarkWeightYTD",
    "ActiveWeightYTD",
    "TickerReturn",
    "ActiveReturn",
    "Attribution",
    "AvgBaselineWeightYTD",
    "ActiveWeightVsOriginal",
    "ActiveReturnVsOriginal",
    "AttributionVsOriginal",
    "BenchmarkReturn",
    "BaselineReturn",
];

/// Older files may lack the baseline columns; everything else is required.
const REQUIRED_ATTRIBUTION_COLUMNS: usize = 8;

pub const SERIES_COLUMNS: [&str; 4] = [
    "TRADE_DATE",
    "ModelPortfolioIndex",
    "OriginalPortfolioIndex",
    "VNINDEX",
];

/// Paths written by [`write_artifacts`].
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPaths {
    pub attribution: PathBuf,
    pub series: PathBuf,
    pub series_parquet: PathBuf,
    pub manifest: PathBuf,
}

impl ArtifactPaths {
    pub fn for_output(output: &OutputConfig) -> Self {
        let series = output.series_path();
        Self {
            attribution: output.attribution_path(),
            series_parquet: series.with_extension("parquet"),
            series,
            manifest: output.manifest_path(),
        }
    }
}

fn number(v: f64) -> String {
    if v.is_finite() {
        v.to_string()
    } else {
        String::new()
    }
}

fn optional(v: Option<f64>) -> String {
    v.map(number).unwrap_or_default()
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    Ok(())
}

/// Write all artifacts of a calc run.
pub fn write_artifacts(output: &OutputConfig, calc: &CalcOutput) -> Result<ArtifactPaths> {
    let paths = ArtifactPaths::for_output(output);
    write_attribution_csv(&paths.attribution, &calc.rows)?;
    write_series_csv(&paths.series, &calc.series)?;
    write_series_parquet(&paths.series_parquet, &calc.series)?;
    write_manifest(&paths.manifest, &calc.manifest)?;
    tracing::info!(dir = %output.dir.display(), "wrote artifacts");
    Ok(paths)
}

pub fn write_attribution_csv(path: &Path, rows: &[AttributionRow]) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(ATTRIBUTION_COLUMNS)?;
    for r in rows {
        writer.write_record([
            r.date.format(DATE_FORMAT).to_string(),
            r.ticker.clone(),
            number(r.avg_portfolio_weight),
            number(r.avg_benchmark_weight),
            number(r.active_weight),
            number(r.ticker_return),
            number(r.active_return),
            number(r.attribution),
            optional(r.avg_baseline_weight),
            optional(r.active_weight_vs_original),
            optional(r.active_return_vs_original),
            optional(r.attribution_vs_original),
            number(r.benchmark_return),
            optional(r.baseline_return),
        ])?;
    }
    writer
        .flush()
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub fn write_series_csv(path: &Path, series: &[SeriesPoint]) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(SERIES_COLUMNS)?;
    for p in series {
        writer.write_record([
            p.date.format(DATE_FORMAT).to_string(),
            number(p.model),
            optional(p.original),
            optional(p.benchmark),
        ])?;
    }
    writer
        .flush()
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub fn write_series_parquet(path: &Path, series: &[SeriesPoint]) -> Result<()> {
    ensure_parent(path)?;
    let epoch = NaiveDate::default();
    let dates: Vec<i32> = series
        .iter()
        .map(|p| (p.date - epoch).num_days() as i32)
        .collect();
    let model: Vec<f64> = series.iter().map(|p| p.model).collect();
    let original: Vec<Option<f64>> = series.iter().map(|p| p.original).collect();
    let benchmark: Vec<Option<f64>> = series.iter().map(|p| p.benchmark).collect();

    let mut df = DataFrame::new(vec![
        Column::new(SERIES_COLUMNS[0].into(), dates).cast(&DataType::Date)?,
        Column::new(SERIES_COLUMNS[1].into(), model),
        Column::new(SERIES_COLUMNS[2].into(), original),
        Column::new(SERIES_COLUMNS[3].into(), benchmark),
    ])?;
    let file = fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    ParquetWriter::new(file)
        .finish(&mut df)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub fn write_manifest(path: &Path, manifest: &RunManifest) -> Result<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(manifest)?;
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}

pub fn read_manifest(path: &Path) -> Result<RunManifest> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

// ── Readers ──────────────────────────────────────────────────────────

struct Header {
    index: HashMap<String, usize>,
}

impl Header {
    fn new(record: &csv::StringRecord) -> Self {
        Self {
            index: record
                .iter()
                .enumerate()
                .map(|(i, name)| (name.trim().to_string(), i))
                .collect(),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }
}

fn field<'r>(record: &'r csv::StringRecord, col: Option<usize>) -> &'r str {
    col.and_then(|i| record.get(i)).unwrap_or("").trim()
}

fn parse_number(raw: &str, line: usize, column: &str) -> Result<f64> {
    match raw.to_ascii_lowercase().as_str() {
        "" | "nan" => Ok(f64::NAN),
        _ => raw
            .parse::<f64>()
            .with_context(|| format!("line {line}: bad number '{raw}' in {column}")),
    }
}

fn parse_optional(raw: &str, line: usize, column: &str) -> Result<Option<f64>> {
    let v = parse_number(raw, line, column)?;
    Ok(v.is_finite().then_some(v))
}

fn parse_date(raw: &str, line: usize) -> Result<NaiveDate> {
    let date_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, DATE_FORMAT)
        .with_context(|| format!("line {line}: bad date '{raw}'"))
}

fn open_with_header(path: &Path) -> Result<(csv::Reader<fs::File>, Header)> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("opening {}", path.display()))?;
    let header = Header::new(
        reader
            .headers()
            .with_context(|| format!("reading header of {}", path.display()))?,
    );
    Ok((reader, header))
}

pub fn read_attribution_csv(path: &Path) -> Result<Vec<AttributionRow>> {
    let (mut reader, header) = open_with_header(path)?;
    let cols: Vec<Option<usize>> = ATTRIBUTION_COLUMNS
        .iter()
        .map(|name| header.position(name))
        .collect();
    let missing: Vec<&str> = ATTRIBUTION_COLUMNS[..REQUIRED_ATTRIBUTION_COLUMNS]
        .iter()
        .zip(&cols)
        .filter(|(_, c)| c.is_none())
        .map(|(name, _)| *name)
        .collect();
    if !missing.is_empty() {
        bail!("{}: missing columns {}", path.display(), missing.join(", "));
    }

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let line = i + 2;
        let record = record.with_context(|| format!("{}: line {line}", path.display()))?;
        let get = |k: usize| field(&record, cols[k]);
        let num = |k: usize| parse_number(get(k), line, ATTRIBUTION_COLUMNS[k]);
        let opt = |k: usize| parse_optional(get(k), line, ATTRIBUTION_COLUMNS[k]);
        rows.push(AttributionRow {
            date: parse_date(get(0), line)?,
            ticker: get(1).to_string(),
            avg_portfolio_weight: num(2)?,
            avg_benchmark_weight: num(3)?,
            active_weight: num(4)?,
            ticker_return: num(5)?,
            active_return: num(6)?,
            attribution: num(7)?,
            avg_baseline_weight: opt(8)?,
            active_weight_vs_original: opt(9)?,
            active_return_vs_original: opt(10)?,
            attribution_vs_original: opt(11)?,
            benchmark_return: num(12)?,
            baseline_return: opt(13)?,
        });
    }
    Ok(rows)
}

pub fn read_series_csv(path: &Path) -> Result<Vec<SeriesPoint>> {
    let (mut reader, header) = open_with_header(path)?;
    let mut cols = Vec::with_capacity(SERIES_COLUMNS.len());
    for name in SERIES_COLUMNS {
        match header.position(name) {
            Some(i) => cols.push(i),
            None => bail!("{}: missing column {name}", path.display()),
        }
    }

    let mut points = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let line = i + 2;
        let record = record.with_context(|| format!("{}: line {line}", path.display()))?;
        let get = |k: usize| field(&record, Some(cols[k]));
        points.push(SeriesPoint {
            date: parse_date(get(0), line)?,
            model: parse_number(get(1), line, SERIES_COLUMNS[1])?,
            original: parse_optional(get(2), line, SERIES_COLUMNS[2])?,
            benchmark: parse_optional(get(3), line, SERIES_COLUMNS[3])?,
        });
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    fn row(date: &str, ticker: &str, attribution: f64, baseline: Option<f64>) -> AttributionRow {
        AttributionRow {
            date: d(date),
            ticker: ticker.into(),
            avg_portfolio_weight: 0.1,
            avg_benchmark_weight: 0.05,
            active_weight: 0.05,
            ticker_return: 0.02,
            active_return: 0.01,
            attribution,
            avg_baseline_weight: baseline,
            active_weight_vs_original: baseline.map(|b| 0.1 - b),
            active_return_vs_original: baseline.map(|_| 0.015),
            attribution_vs_original: baseline.map(|b| (0.1 - b) * 0.015),
            benchmark_return: 0.01,
            baseline_return: baseline.map(|_| 0.005),
        }
    }

    #[test]
    fn attribution_csv_header_and_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/attr.csv");
        let rows = vec![
            row("2025-01-03", "FPT", 0.0005, Some(0.08)),
            row("2025-01-03", "VCB", -0.0002, None),
        ];
        write_attribution_csv(&path, &rows).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), ATTRIBUTION_COLUMNS.join(","));
        assert!(lines.nth(1).unwrap().contains(",,,,0.01,"));

        assert_eq!(read_attribution_csv(&path).unwrap(), rows);
    }

    #[test]
    fn attribution_reader_tolerates_missing_baseline_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attr.csv");
        fs::write(
            &path,
            "TRADE_DATE,Ticker,AvgPortfolioWeightYTD,AvgBenchmarkWeightYTD,ActiveWeightYTD,\
             TickerReturn,ActiveReturn,Attribution\n2025-01-03,FPT,0.1,0.05,0.05,0.02,0.01,0.0005\n",
        )
        .unwrap();
        let rows = read_attribution_csv(&path).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].attribution_vs_original, None);
        assert!(rows[0].benchmark_return.is_nan());
    }

    #[test]
    fn series_reader_rejects_missing_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("series.csv");
        fs::write(&path, "TRADE_DATE,ModelPortfolioIndex,VNINDEX\n2025-01-02,100,100\n").unwrap();
        let err = read_series_csv(&path).unwrap_err();
        assert!(err.to_string().contains("OriginalPortfolioIndex"));
    }

    #[test]
    fn series_round_trip_and_parquet() {
        let dir = tempfile::tempdir().unwrap();
        let series = vec![
            SeriesPoint {
                date: d("2025-01-02"),
                model: 100.0,
                original: Some(100.0),
                benchmark: Some(100.0),
            },
            SeriesPoint {
                date: d("2025-01-03"),
                model: 101.25,
                original: None,
                benchmark: Some(99.5),
            },
        ];
        let csv_path = dir.path().join("series.csv");
        write_series_csv(&csv_path, &series).unwrap();
        assert_eq!(read_series_csv(&csv_path).unwrap(), series);

        let pq = dir.path().join("series.parquet");
        write_series_parquet(&pq, &series).unwrap();
        let df = ParquetReader::new(fs::File::open(&pq).unwrap()).finish().unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.get_column_names().len(), 4);
    }
}
