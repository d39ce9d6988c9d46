//! Spreadsheet inputs: the allocation sheet and the analyst mapping.
//!
//! `.csv` files go through the `csv` crate; `.xlsx`, `.xlsm` and `.xls`
//! through `calamine` (first worksheet only). Both land in the core [`Grid`].

use calamine::{open_workbook_auto, Data, Reader};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use mptrack_core::allocation::dates::from_excel_serial;
use mptrack_core::allocation::{Grid, GridCell, RebalanceSchedule};
use mptrack_core::domain::normalize_ticker;
use mptrack_core::summary::NO_ASSIGNMENT;
use mptrack_core::EngineError;

#[derive(Debug, Error)]
pub enum WorkbookError {
    #[error("{path}: file not found")]
    NotFound { path: PathBuf },

    #[error("{path}: unsupported file type (expected .xlsx, .xls or .csv)")]
    UnsupportedFormat { path: PathBuf },

    #[error("{path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("{path}: workbook has no worksheets")]
    NoSheet { path: PathBuf },

    #[error("{path}: missing column '{column}'")]
    MissingColumn { path: PathBuf, column: String },

    #[error("{path}: {source}")]
    Allocation {
        path: PathBuf,
        source: EngineError,
    },
}

fn read_error(path: &Path, e: impl std::fmt::Display) -> WorkbookError {
    WorkbookError::Read {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

/// Read the first sheet (or the CSV) as a header row plus data rows.
pub fn read_grid(path: &Path) -> Result<Grid, WorkbookError> {
    if !path.exists() {
        return Err(WorkbookError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let grid = match ext.as_str() {
        "csv" => read_csv_grid(path)?,
        "xlsx" | "xlsm" | "xls" | "xlsb" => read_excel_grid(path)?,
        _ => {
            return Err(WorkbookError::UnsupportedFormat {
                path: path.to_path_buf(),
            })
        }
    };
    tracing::debug!(path = %path.display(), rows = grid.rows.len(), "read sheet");
    Ok(grid)
}

fn read_csv_grid(path: &Path) -> Result<Grid, WorkbookError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| read_error(path, e))?;

    let mut records = reader.records();
    let header = match records.next() {
        Some(record) => csv_row(&record.map_err(|e| read_error(path, e))?),
        None => Vec::new(),
    };
    let mut rows = Vec::new();
    for record in records {
        rows.push(csv_row(&record.map_err(|e| read_error(path, e))?));
    }
    Ok(Grid::new(header, rows))
}

fn csv_row(record: &csv::StringRecord) -> Vec<GridCell> {
    record
        .iter()
        .map(|field| {
            let field = field.trim();
            if field.is_empty() {
                GridCell::Empty
            } else {
                GridCell::Text(field.to_string())
            }
        })
        .collect()
}

fn read_excel_grid(path: &Path) -> Result<Grid, WorkbookError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| read_error(path, e))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| WorkbookError::NoSheet {
            path: path.to_path_buf(),
        })?
        .map_err(|e| read_error(path, e))?;

    let mut rows = range.rows().map(|row| row.iter().map(excel_cell).collect::<Vec<_>>());
    let header = rows.next().unwrap_or_default();
    Ok(Grid::new(header, rows.collect()))
}

fn excel_cell(data: &Data) -> GridCell {
    match data {
        Data::Empty | Data::Error(_) => GridCell::Empty,
        Data::Int(i) => GridCell::Number(*i as f64),
        Data::Float(f) => GridCell::Number(*f),
        Data::Bool(b) => GridCell::Text(b.to_string()),
        Data::String(s) if s.trim().is_empty() => GridCell::Empty,
        Data::String(s) => GridCell::Text(s.trim().to_string()),
        Data::DateTime(dt) => {
            from_excel_serial(dt.as_f64()).map_or(GridCell::Empty, GridCell::Date)
        }
        Data::DateTimeIso(s) => chrono::NaiveDate::parse_from_str(s.get(..10).unwrap_or(s), "%Y-%m-%d")
            .map_or_else(|_| GridCell::Text(s.clone()), GridCell::Date),
        Data::DurationIso(s) => GridCell::Text(s.clone()),
    }
}

/// Parse the allocation sheet into a rebalance schedule.
pub fn read_allocation(path: &Path) -> Result<RebalanceSchedule, WorkbookError> {
    let grid = read_grid(path)?;
    let schedule = RebalanceSchedule::from_grid(&grid).map_err(|source| {
        WorkbookError::Allocation {
            path: path.to_path_buf(),
            source,
        }
    })?;
    tracing::info!(
        path = %path.display(),
        rebalances = schedule.len(),
        tickers = schedule.tickers().len(),
        "loaded allocation schedule"
    );
    Ok(schedule)
}

/// Ticker → analyst. A missing file yields an empty mapping; blank analyst
/// cells read as [`NO_ASSIGNMENT`].
pub fn read_analyst_mapping(path: &Path) -> Result<HashMap<String, String>, WorkbookError> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "no analyst mapping");
        return Ok(HashMap::new());
    }
    let grid = read_grid(path)?;
    let missing = |column: &str| WorkbookError::MissingColumn {
        path: path.to_path_buf(),
        column: column.to_string(),
    };
    let ticker_col = grid.column_index("Ticker").ok_or_else(|| missing("Ticker"))?;
    let analyst_col = grid
        .column_index("Analyst in charge")
        .or_else(|| grid.column_index("Analyst"))
        .ok_or_else(|| missing("Analyst in charge"))?;

    let mut mapping = HashMap::new();
    for row in 0..grid.rows.len() {
        let ticker = normalize_ticker(&grid.cell(row, ticker_col).as_text());
        if ticker.is_empty() {
            continue;
        }
        let analyst = grid.cell(row, analyst_col).as_text();
        let analyst = match analyst.trim() {
            "" => NO_ASSIGNMENT.to_string(),
            name => name.to_string(),
        };
        mapping.insert(ticker, analyst);
    }
    Ok(mapping)
}
