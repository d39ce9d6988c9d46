//! Offline snapshot of the market data a calc run pulls from the warehouse.
//!
//! Layout: `{dir}/prices.parquet`, `caps.parquet`, `index.parquet`,
//! `members.json` and the `meta.json` sidecar (start date, row counts,
//! BLAKE3 data hash, cache time).
//!
//! Every file is written to `.tmp` and renamed into place, `meta.json` last.
//! `load` recomputes the data hash and compares it with `meta.json`, so
//! files left over from an interrupted refresh are reported, not used. It
//! also refuses a snapshot that never fetched a ticker the caller needs.

use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use mptrack_core::domain::{Observation, Series};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("no snapshot in {0}; run `mptrack calc --refresh-cache` with warehouse access first")]
    Missing(PathBuf),

    #[error("snapshot starts on {cached}, after the requested start {requested}")]
    StartsTooLate {
        cached: NaiveDate,
        requested: NaiveDate,
    },

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path}: {message}")]
    Parquet { path: PathBuf, message: String },

    #[error(
        "snapshot has no data for {}; run `mptrack calc --refresh-cache` with warehouse access",
        .0.join(", ")
    )]
    MissingTickers(Vec<String>),

    #[error("snapshot files do not match meta.json (hash {found}, expected {expected}); refresh it")]
    HashMismatch { expected: String, found: String },

    #[error("snapshot metadata: {0}")]
    Json(#[from] serde_json::Error),
}

/// Market data for one calc run, in long form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub start: NaiveDate,
    pub members: Vec<String>,
    /// Tickers whose prices were requested, sorted. Members are included.
    pub tickers: Vec<String>,
    pub prices: Vec<Observation>,
    pub caps: Vec<Observation>,
    pub index: Series,
}

impl MarketSnapshot {
    /// BLAKE3 over the serialised contents; identifies the dataset a run used.
    pub fn data_hash(&self) -> Result<String, serde_json::Error> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&serde_json::to_vec(&self.members)?);
        hasher.update(&serde_json::to_vec(&self.tickers)?);
        hasher.update(&serde_json::to_vec(&self.prices)?);
        hasher.update(&serde_json::to_vec(&self.caps)?);
        hasher.update(&serde_json::to_vec(&self.index)?);
        Ok(hasher.finalize().to_hex().to_string())
    }
}

/// Metadata sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub members: usize,
    /// Price universe of the pull. Older snapshots without it cover nothing.
    #[serde(default)]
    pub tickers: Vec<String>,
    pub price_rows: usize,
    pub cap_rows: usize,
    pub index_rows: usize,
    pub data_hash: String,
    pub cached_at: NaiveDateTime,
}

pub struct SnapshotCache {
    dir: PathBuf,
}

impl SnapshotCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Write the snapshot and return its metadata.
    pub fn write(&self, snapshot: &MarketSnapshot) -> Result<SnapshotMeta, SnapshotError> {
        fs::create_dir_all(&self.dir).map_err(|source| SnapshotError::Io {
            path: self.dir.clone(),
            source,
        })?;

        write_parquet(&observations_frame(&snapshot.prices), &self.path("prices.parquet"))?;
        write_parquet(&observations_frame(&snapshot.caps), &self.path("caps.parquet"))?;
        write_parquet(&series_frame(&snapshot.index), &self.path("index.parquet"))?;
        write_atomic(
            &self.path("members.json"),
            serde_json::to_string_pretty(&snapshot.members)?.as_bytes(),
        )?;

        let meta = SnapshotMeta {
            start_date: snapshot.start,
            end_date: snapshot.prices.iter().map(|o| o.date).max(),
            members: snapshot.members.len(),
            tickers: snapshot.tickers.clone(),
            price_rows: snapshot.prices.len(),
            cap_rows: snapshot.caps.len(),
            index_rows: snapshot.index.len(),
            data_hash: snapshot.data_hash()?,
            cached_at: chrono::Local::now().naive_local(),
        };
        write_atomic(
            &self.path("meta.json"),
            serde_json::to_string_pretty(&meta)?.as_bytes(),
        )?;
        tracing::info!(dir = %self.dir.display(), rows = meta.price_rows, "wrote market snapshot");
        Ok(meta)
    }

    /// Metadata of the current snapshot, if any.
    pub fn status(&self) -> Result<Option<SnapshotMeta>, SnapshotError> {
        let path = self.path("meta.json");
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path).map_err(|source| SnapshotError::Io { path, source })?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    /// Load data on or after `start`. The snapshot must start no later, must
    /// have fetched every ticker in `required` plus its own members, and its
    /// files must still hash to the value in `meta.json`.
    pub fn load(
        &self,
        start: NaiveDate,
        required: &[String],
    ) -> Result<MarketSnapshot, SnapshotError> {
        let meta = self
            .status()?
            .ok_or_else(|| SnapshotError::Missing(self.dir.clone()))?;
        if meta.start_date > start {
            return Err(SnapshotError::StartsTooLate {
                cached: meta.start_date,
                requested: start,
            });
        }

        let members_path = self.path("members.json");
        let members_text = fs::read_to_string(&members_path).map_err(|source| {
            SnapshotError::Io {
                path: members_path,
                source,
            }
        })?;
        let members: Vec<String> = serde_json::from_str(&members_text)?;

        let fetched: BTreeSet<&str> = meta.tickers.iter().map(String::as_str).collect();
        let missing: Vec<String> = required
            .iter()
            .chain(&members)
            .filter(|t| !fetched.contains(t.as_str()))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if !missing.is_empty() {
            return Err(SnapshotError::MissingTickers(missing));
        }

        let full = MarketSnapshot {
            start: meta.start_date,
            members,
            tickers: meta.tickers.clone(),
            prices: read_observations(&self.path("prices.parquet"))?,
            caps: read_observations(&self.path("caps.parquet"))?,
            index: read_series(&self.path("index.parquet"))?,
        };
        let found = full.data_hash()?;
        if found != meta.data_hash {
            return Err(SnapshotError::HashMismatch {
                expected: meta.data_hash,
                found,
            });
        }

        let keep = |obs: Vec<Observation>| -> Vec<Observation> {
            obs.into_iter().filter(|o| o.date >= start).collect()
        };
        let prices = keep(full.prices);
        let caps = keep(full.caps);
        let index = Series::from_points(
            full.index
                .dates
                .into_iter()
                .zip(full.index.values)
                .filter(|(d, _)| *d >= start)
                .collect(),
        );

        tracing::info!(
            dir = %self.dir.display(),
            cached_at = %meta.cached_at,
            prices = prices.len(),
            "loaded market snapshot"
        );
        Ok(MarketSnapshot {
            start,
            members: full.members,
            tickers: full.tickers,
            prices,
            caps,
            index,
        })
    }
}

// ── File helpers ────────────────────────────────────────────────────

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), SnapshotError> {
    let tmp = tmp_path(path);
    fs::write(&tmp, bytes).map_err(|source| SnapshotError::Io {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).map_err(|source| {
        let _ = fs::remove_file(&tmp);
        SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        }
    })
}

fn epoch() -> NaiveDate {
    NaiveDate::default()
}

fn days_since_epoch(d: NaiveDate) -> i32 {
    (d - epoch()).num_days() as i32
}

fn observations_frame(obs: &[Observation]) -> PolarsResult<DataFrame> {
    let tickers: Vec<&str> = obs.iter().map(|o| o.ticker.as_str()).collect();
    let dates: Vec<i32> = obs.iter().map(|o| days_since_epoch(o.date)).collect();
    let values: Vec<f64> = obs.iter().map(|o| o.value).collect();
    DataFrame::new(vec![
        Column::new("ticker".into(), tickers),
        Column::new("date".into(), dates).cast(&DataType::Date)?,
        Column::new("value".into(), values),
    ])
}

fn series_frame(series: &Series) -> PolarsResult<DataFrame> {
    let dates: Vec<i32> = series.dates.iter().map(|d| days_since_epoch(*d)).collect();
    DataFrame::new(vec![
        Column::new("date".into(), dates).cast(&DataType::Date)?,
        Column::new("value".into(), series.values.clone()),
    ])
}

fn parquet_error(path: &Path) -> impl Fn(PolarsError) -> SnapshotError + '_ {
    move |e| SnapshotError::Parquet {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

fn write_parquet(frame: &PolarsResult<DataFrame>, path: &Path) -> Result<(), SnapshotError> {
    let mut df = match frame {
        Ok(df) => df.clone(),
        Err(e) => {
            return Err(SnapshotError::Parquet {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
        }
    };
    let tmp = tmp_path(path);
    let file = fs::File::create(&tmp).map_err(|source| SnapshotError::Io {
        path: tmp.clone(),
        source,
    })?;
    ParquetWriter::new(file)
        .finish(&mut df)
        .map_err(parquet_error(path))?;
    fs::rename(&tmp, path).map_err(|source| {
        let _ = fs::remove_file(&tmp);
        SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        }
    })
}

fn read_frame(path: &Path) -> Result<DataFrame, SnapshotError> {
    let file = fs::File::open(path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    ParquetReader::new(file).finish().map_err(parquet_error(path))
}

fn read_observations(path: &Path) -> Result<Vec<Observation>, SnapshotError> {
    let df = read_frame(path)?;
    let err = parquet_error(path);
    let tickers = df.column("ticker").map_err(&err)?.str().map_err(&err)?;
    let dates = df.column("date").map_err(&err)?.date().map_err(&err)?;
    let values = df.column("value").map_err(&err)?.f64().map_err(&err)?;

    let mut out = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let (Some(ticker), Some(days), Some(value)) = (tickers.get(i), dates.get(i), values.get(i))
        else {
            continue;
        };
        out.push(Observation::new(
            epoch() + chrono::Duration::days(days as i64),
            ticker,
            value,
        ));
    }
    Ok(out)
}

fn read_series(path: &Path) -> Result<Series, SnapshotError> {
    let df = read_frame(path)?;
    let err = parquet_error(path);
    let dates = df.column("date").map_err(&err)?.date().map_err(&err)?;
    let values = df.column("value").map_err(&err)?.f64().map_err(&err)?;
    let points = (0..df.height())
        .filter_map(|i| {
            Some((
                epoch() + chrono::Duration::days(dates.get(i)? as i64),
                values.get(i)?,
            ))
        })
        .collect();
    Ok(Series::from_points(points))
}
