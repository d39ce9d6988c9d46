//! Application state: single-owner, main-thread only.
//!
//! The dashboard reads the artifacts written by `mptrack calc` once at
//! start-up and again on `r`. Everything shown is derived from the loaded
//! rows through a [`PeriodReport`] over the selected date range.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;

use mptrack_core::attribution::{AttributionRow, SeriesPoint};
use mptrack_runner::report::DEFAULT_TOP;
use mptrack_runner::{
    read_analyst_mapping, read_attribution_csv, read_manifest, read_series_csv, PeriodReport,
    TrackerConfig,
};

/// Which panel is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    Overview,
    Attribution,
    Analysts,
    Help,
}

impl Panel {
    pub const COUNT: usize = 4;

    pub fn index(self) -> usize {
        match self {
            Panel::Overview => 0,
            Panel::Attribution => 1,
            Panel::Analysts => 2,
            Panel::Help => 3,
        }
    }

    pub fn from_index(i: usize) -> Option<Self> {
        match i {
            0 => Some(Panel::Overview),
            1 => Some(Panel::Attribution),
            2 => Some(Panel::Analysts),
            3 => Some(Panel::Help),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Panel::Overview => "Overview",
            Panel::Attribution => "Attribution",
            Panel::Analysts => "Analysts",
            Panel::Help => "Help",
        }
    }

    pub fn next(self) -> Panel {
        Panel::from_index((self.index() + 1) % Self::COUNT).unwrap_or(Panel::Overview)
    }

    pub fn prev(self) -> Panel {
        Panel::from_index((self.index() + Self::COUNT - 1) % Self::COUNT)
            .unwrap_or(Panel::Overview)
    }
}

/// Status message severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warning,
    Error,
}

/// Where the artifacts live.
#[derive(Debug, Clone)]
pub struct ArtifactSources {
    pub attribution: PathBuf,
    pub series: PathBuf,
    pub manifest: PathBuf,
    pub analysts: PathBuf,
}

impl ArtifactSources {
    pub fn from_config(config: &TrackerConfig) -> Self {
        Self {
            attribution: config.output.attribution_path(),
            series: config.output.series_path(),
            manifest: config.output.manifest_path(),
            analysts: config.inputs.analysts.clone(),
        }
    }
}

/// Everything read from disk.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub rows: Vec<AttributionRow>,
    pub series: Vec<SeriesPoint>,
    pub analysts: HashMap<String, String>,
    pub rebalance_dates: Vec<NaiveDate>,
    /// Distinct attribution dates, ascending.
    pub dates: Vec<NaiveDate>,
}

impl Dataset {
    pub fn load(sources: &ArtifactSources) -> Result<Self> {
        let rows = read_attribution_csv(&sources.attribution)?;
        let series = read_series_csv(&sources.series)?;
        let analysts = read_analyst_mapping(&sources.analysts)?;
        // The manifest is optional; without it the chart has no rebalance markers.
        let rebalance_dates = read_manifest(&sources.manifest)
            .map(|m| m.rebalance_dates)
            .unwrap_or_default();
        Ok(Self::new(rows, series, analysts, rebalance_dates))
    }

    pub fn new(
        rows: Vec<AttributionRow>,
        series: Vec<SeriesPoint>,
        analysts: HashMap<String, String>,
        rebalance_dates: Vec<NaiveDate>,
    ) -> Self {
        let dates: Vec<NaiveDate> = rows
            .iter()
            .map(|r| r.date)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        Self {
            rows,
            series,
            analysts,
            rebalance_dates,
            dates,
        }
    }
}

pub struct App {
    pub running: bool,
    pub active_panel: Panel,
    pub sources: ArtifactSources,
    pub data: Option<Dataset>,
    /// Why `data` is empty, with a hint for the operator.
    pub load_error: Option<String>,
    /// Selected range as indices into `Dataset::dates`.
    pub from_idx: usize,
    pub to_idx: usize,
    pub report: Option<PeriodReport>,
    /// Scroll offset of the all-tickers table.
    pub scroll: usize,
    pub status_message: Option<(String, StatusLevel)>,
}

impl App {
    pub fn new(sources: ArtifactSources) -> Self {
        let mut app = Self {
            running: true,
            active_panel: Panel::Overview,
            sources,
            data: None,
            load_error: None,
            from_idx: 0,
            to_idx: 0,
            report: None,
            scroll: 0,
            status_message: None,
        };
        app.reload();
        app
    }

    /// Re-read the artifacts and reset the range to the full period.
    pub fn reload(&mut self) {
        if !self.sources.attribution.exists() {
            self.data = None;
            self.report = None;
            self.load_error = Some(format!(
                "{} not found. Run `mptrack calc` to produce it, then press r.",
                self.sources.attribution.display()
            ));
            self.set_warning("no artifacts");
            return;
        }
        match Dataset::load(&self.sources) {
            Ok(data) => {
                let n = data.rows.len();
                self.set_data(data);
                self.set_status(format!("loaded {n} attribution rows"));
            }
            Err(err) => {
                self.data = None;
                self.report = None;
                self.load_error = Some(format!("{err:#}"));
                self.set_error("failed to load artifacts");
            }
        }
    }

    pub fn set_data(&mut self, data: Dataset) {
        self.from_idx = 0;
        self.to_idx = data.dates.len().saturating_sub(1);
        self.scroll = 0;
        self.load_error = None;
        self.data = Some(data);
        self.recompute();
    }

    pub fn selected_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let data = self.data.as_ref()?;
        Some((*data.dates.get(self.from_idx)?, *data.dates.get(self.to_idx)?))
    }

    fn recompute(&mut self) {
        let Some(data) = &self.data else {
            self.report = None;
            return;
        };
        let range = self.selected_range();
        match PeriodReport::build(
            &data.rows,
            &data.series,
            &data.analysts,
            range.map(|r| r.0),
            range.map(|r| r.1),
            DEFAULT_TOP,
        ) {
            Ok(report) => self.report = Some(report),
            Err(err) => {
                self.report = None;
                self.set_error(err.to_string());
            }
        }
    }

    /// Move the start date by `delta` trading days, never past the end date.
    pub fn shift_start(&mut self, delta: isize) {
        let Some(data) = &self.data else { return };
        if data.dates.is_empty() {
            return;
        }
        let moved = self.from_idx.saturating_add_signed(delta).min(self.to_idx);
        if moved != self.from_idx {
            self.from_idx = moved;
            self.recompute();
        }
    }

    /// Move the end date by `delta` trading days, never before the start date.
    pub fn shift_end(&mut self, delta: isize) {
        let Some(data) = &self.data else { return };
        let last = data.dates.len().saturating_sub(1);
        let moved = self
            .to_idx
            .saturating_add_signed(delta)
            .clamp(self.from_idx, last);
        if moved != self.to_idx {
            self.to_idx = moved;
            self.recompute();
        }
    }

    pub fn scroll_down(&mut self) {
        let len = self.report.as_ref().map_or(0, |r| r.tickers.len());
        if self.scroll + 1 < len {
            self.scroll += 1;
        }
    }

    pub fn scroll_up(&mut self) {
        self.scroll = self.scroll.saturating_sub(1);
    }

    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some((msg.into(), StatusLevel::Info));
    }

    pub fn set_warning(&mut self, msg: impl Into<String>) {
        self.status_message = Some((msg.into(), StatusLevel::Warning));
    }

    pub fn set_error(&mut self, msg: impl Into<String>) {
        self.status_message = Some((msg.into(), StatusLevel::Error));
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn row(date: &str, ticker: &str, attribution: f64) -> AttributionRow {
        AttributionRow {
            date: d(date),
            ticker: ticker.into(),
            avg_portfolio_weight: 0.2,
            avg_benchmark_weight: 0.1,
            active_weight: 0.1,
            ticker_return: 0.01,
            active_return: 0.01,
            attribution,
            avg_baseline_weight: Some(0.2),
            active_weight_vs_original: Some(0.0),
            active_return_vs_original: Some(0.0),
            attribution_vs_original: Some(0.0),
            benchmark_return: 0.0,
            baseline_return: Some(0.0),
        }
    }

    pub(crate) fn sample_dataset() -> Dataset {
        let rows = vec![
            row("2025-01-03", "FPT", 0.001),
            row("2025-01-03", "VCB", -0.002),
            row("2025-01-06", "FPT", 0.003),
            row("2025-01-07", "HPG", 0.0005),
        ];
        let series = ["2025-01-02", "2025-01-03", "2025-01-06", "2025-01-07"]
            .iter()
            .zip([100.0, 101.0, 102.5, 103.0])
            .map(|(day, v)| SeriesPoint {
                date: d(day),
                model: v,
                original: Some(v - 0.5),
                benchmark: Some(100.0),
            })
            .collect();
        let analysts = HashMap::from([("FPT".to_string(), "Lan".to_string())]);
        Dataset::new(rows, series, analysts, vec![d("2025-01-02"), d("2025-01-06")])
    }

    pub(crate) fn sample_app() -> App {
        let dir = std::env::temp_dir().join("mptrack-tui-missing");
        let mut app = App::new(ArtifactSources {
            attribution: dir.join("a.csv"),
            series: dir.join("s.csv"),
            manifest: dir.join("m.json"),
            analysts: dir.join("x.xlsx"),
        });
        app.set_data(sample_dataset());
        app
    }

    #[test]
    fn panel_cycle() {
        assert_eq!(Panel::Overview.next(), Panel::Attribution);
        assert_eq!(Panel::Help.next(), Panel::Overview);
        assert_eq!(Panel::Overview.prev(), Panel::Help);
    }

    #[test]
    fn missing_artifacts_give_a_hint() {
        let dir = tempfile::tempdir().unwrap();
        let app = App::new(ArtifactSources {
            attribution: dir.path().join("a.csv"),
            series: dir.path().join("s.csv"),
            manifest: dir.path().join("m.json"),
            analysts: dir.path().join("x.xlsx"),
        });
        assert!(app.data.is_none());
        assert!(app.load_error.unwrap().contains("mptrack calc"));
    }

    #[test]
    fn full_range_by_default() {
        let app = sample_app();
        assert_eq!(app.selected_range(), Some((d("2025-01-03"), d("2025-01-07"))));
        let report = app.report.unwrap();
        assert_eq!(report.tickers.len(), 3);
        assert_eq!(report.top[0].ticker, "FPT");
    }

    #[test]
    fn range_edges_never_cross() {
        let mut app = sample_app();
        app.shift_start(5);
        assert_eq!(app.from_idx, app.to_idx);
        app.shift_end(-1);
        assert_eq!(app.to_idx, app.from_idx);
        app.shift_start(-10);
        assert_eq!(app.from_idx, 0);
        app.shift_end(10);
        assert_eq!(app.to_idx, 2);
    }

    #[test]
    fn narrowing_the_range_updates_the_report() {
        let mut app = sample_app();
        app.shift_start(1);
        let report = app.report.as_ref().unwrap();
        assert_eq!(report.from, d("2025-01-06"));
        assert!(report.tickers.iter().all(|t| t.ticker != "VCB"));
    }

    #[test]
    fn loads_written_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = TrackerConfig::default();
        config.output.dir = dir.path().to_path_buf();
        config.inputs.analysts = dir.path().join("analysts.csv");
        let data = sample_dataset();
        mptrack_runner::export::write_attribution_csv(&config.output.attribution_path(), &data.rows)
            .unwrap();
        mptrack_runner::export::write_series_csv(&config.output.series_path(), &data.series)
            .unwrap();

        let app = App::new(ArtifactSources::from_config(&config));
        let loaded = app.data.as_ref().unwrap();
        assert_eq!(loaded.rows, data.rows);
        assert!(loaded.rebalance_dates.is_empty());
        assert!(app.report.is_some());
    }
}
