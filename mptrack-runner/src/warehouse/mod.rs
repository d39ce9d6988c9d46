//! Read-only access to the external SQL Server warehouse.
//!
//! The calc pipeline talks to a [`Warehouse`]: one blocking `query` call
//! returning a fully materialised [`Table`]. [`MssqlWarehouse`] implements it
//! over a single TDS connection; tests use an in-memory fake.

pub mod adhoc;
pub mod mssql;
pub mod queries;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use thiserror::Error;

pub use adhoc::{ensure_read_only, render_csv, render_text, AdhocError};
pub use mssql::MssqlWarehouse;
pub use queries::{
    fetch_benchmark_members, fetch_columns, fetch_index, fetch_market_caps, fetch_prices,
};

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("cannot connect to {server}: {message}")]
    Connect { server: String, message: String },

    #[error("query failed: {0}")]
    Query(String),

    #[error("cannot start the client runtime: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("result set has no column '{0}'")]
    MissingColumn(String),

    #[error("column '{column}' row {row}: {message}")]
    BadValue {
        column: String,
        row: usize,
        message: String,
    },

    #[error("connection is closed")]
    Closed,
}

/// One result cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Numeric view; text is parsed, everything else is `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) => Some(*f),
            Cell::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::Date(d) => Some(*d),
            Cell::DateTime(dt) => Some(dt.date()),
            Cell::Text(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Display form used by table and CSV rendering. Null is empty.
    pub fn render(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Int(i) => i.to_string(),
            Cell::Float(f) => f.to_string(),
            Cell::Text(s) => s.clone(),
            Cell::Bool(b) => b.to_string(),
            Cell::Date(d) => d.to_string(),
            Cell::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// A materialised result set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column position, matched case-insensitively.
    pub fn column_index(&self, name: &str) -> Result<usize, WarehouseError> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .ok_or_else(|| WarehouseError::MissingColumn(name.to_string()))
    }
}

/// Bound statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Date(NaiveDate),
    Int(i64),
}

/// A read-only SQL endpoint.
pub trait Warehouse {
    /// Run one statement with positional `@P1..@Pn` parameters.
    fn query(&mut self, sql: &str, params: &[SqlParam]) -> Result<Table, WarehouseError>;
}

impl<W: Warehouse + ?Sized> Warehouse for &mut W {
    fn query(&mut self, sql: &str, params: &[SqlParam]) -> Result<Table, WarehouseError> {
        (**self).query(sql, params)
    }
}

/// `@P{offset+1}, ..., @P{offset+n}`
pub fn placeholders(offset: usize, n: usize) -> String {
    (offset + 1..=offset + n)
        .map(|i| format!("@P{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}
