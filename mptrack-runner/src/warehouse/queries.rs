//! Typed warehouse queries used by the calc pipeline and `schema check`.
//!
//! Numeric and date columns are read through `TRY_CAST` so one malformed
//! row becomes NULL (and is skipped) instead of failing the statement.
//! Ticker lists are bound as parameters in chunks because SQL Server caps a
//! statement at 2100 parameters.

use chrono::NaiveDate;
use std::collections::BTreeSet;

use mptrack_core::catalog::{LiveColumn, TableContract};
use mptrack_core::domain::{normalize_ticker, Observation, Series};

use super::{placeholders, SqlParam, Table, Warehouse, WarehouseError};

const MEMBERS_SQL: &str = "SELECT DISTINCT Ticker FROM dbo.Sector_Map WHERE VNI = 'Y'";

/// Current benchmark members, upper-cased, sorted and deduplicated.
pub fn fetch_benchmark_members<W: Warehouse + ?Sized>(
    warehouse: &mut W,
) -> Result<Vec<String>, WarehouseError> {
    let table = warehouse.query(MEMBERS_SQL, &[])?;
    let col = table.column_index("Ticker")?;
    let members: BTreeSet<String> = table
        .rows
        .iter()
        .filter_map(|row| row[col].as_text())
        .map(normalize_ticker)
        .filter(|t| !t.is_empty())
        .collect();
    tracing::info!(members = members.len(), "fetched benchmark members");
    Ok(members.into_iter().collect())
}

fn market_data_sql(value_column: &str, n_tickers: usize) -> String {
    format!(
        "SELECT TICKER, TRY_CAST(TRADE_DATE AS date) AS TRADE_DATE, \
         TRY_CAST({value_column} AS float) AS {value_column} \
         FROM dbo.Market_Data \
         WHERE TICKER IN ({}) AND TRY_CAST(TRADE_DATE AS date) >= @P1",
        placeholders(1, n_tickers)
    )
}

fn observations(table: &Table, value_column: &str) -> Result<Vec<Observation>, WarehouseError> {
    let ticker_col = table.column_index("TICKER")?;
    let date_col = table.column_index("TRADE_DATE")?;
    let value_col = table.column_index(value_column)?;

    let mut out = Vec::with_capacity(table.len());
    let mut skipped = 0usize;
    for row in &table.rows {
        let ticker = row[ticker_col].as_text().map(normalize_ticker);
        let date = row[date_col].as_date();
        let value = row[value_col].as_f64().filter(|v| v.is_finite());
        match (ticker, date, value) {
            (Some(t), Some(d), Some(v)) if !t.is_empty() => out.push(Observation::new(d, t, v)),
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::debug!(column = value_column, skipped, "dropped rows with null fields");
    }
    Ok(out)
}

fn fetch_market_data<W: Warehouse + ?Sized>(
    warehouse: &mut W,
    value_column: &str,
    tickers: &[String],
    start: NaiveDate,
    chunk_size: usize,
) -> Result<Vec<Observation>, WarehouseError> {
    let mut out = Vec::new();
    let chunk_size = chunk_size.max(1);
    for (i, chunk) in tickers.chunks(chunk_size).enumerate() {
        let sql = market_data_sql(value_column, chunk.len());
        let mut params = Vec::with_capacity(chunk.len() + 1);
        params.push(SqlParam::Date(start));
        params.extend(chunk.iter().map(|t| SqlParam::Text(t.clone())));

        let table = warehouse.query(&sql, &params)?;
        tracing::debug!(
            column = value_column,
            chunk = i + 1,
            tickers = chunk.len(),
            rows = table.len(),
            "market data chunk"
        );
        out.extend(observations(&table, value_column)?);
    }
    tracing::info!(column = value_column, rows = out.len(), "fetched market data");
    Ok(out)
}

/// Closing prices (`PX_LAST`) on or after `start`.
pub fn fetch_prices<W: Warehouse + ?Sized>(
    warehouse: &mut W,
    tickers: &[String],
    start: NaiveDate,
    chunk_size: usize,
) -> Result<Vec<Observation>, WarehouseError> {
    fetch_market_data(warehouse, "PX_LAST", tickers, start, chunk_size)
}

/// Market capitalisation (`MKT_CAP`) on or after `start`; null caps dropped.
pub fn fetch_market_caps<W: Warehouse + ?Sized>(
    warehouse: &mut W,
    tickers: &[String],
    start: NaiveDate,
    chunk_size: usize,
) -> Result<Vec<Observation>, WarehouseError> {
    fetch_market_data(warehouse, "MKT_CAP", tickers, start, chunk_size)
}

const INDEX_SQL: &str = "SELECT TRY_CAST(TRADINGDATE AS date) AS TRADINGDATE, \
     TRY_CAST(INDEXVALUE AS float) AS INDEXVALUE \
     FROM dbo.MarketIndex \
     WHERE COMGROUPCODE = @P1 AND TRY_CAST(TRADINGDATE AS date) >= @P2 \
     ORDER BY TRADINGDATE ASC";

/// Daily levels of index `code` on or after `start`.
pub fn fetch_index<W: Warehouse + ?Sized>(
    warehouse: &mut W,
    code: &str,
    start: NaiveDate,
) -> Result<Series, WarehouseError> {
    let table = warehouse.query(
        INDEX_SQL,
        &[SqlParam::Text(code.to_string()), SqlParam::Date(start)],
    )?;
    let date_col = table.column_index("TRADINGDATE")?;
    let value_col = table.column_index("INDEXVALUE")?;
    let points: Vec<(NaiveDate, f64)> = table
        .rows
        .iter()
        .filter_map(|row| Some((row[date_col].as_date()?, row[value_col].as_f64()?)))
        .collect();
    tracing::info!(code, points = points.len(), "fetched index levels");
    Ok(Series::from_points(points))
}

/// Columns of the given tables from `INFORMATION_SCHEMA.COLUMNS`.
pub fn fetch_columns<W: Warehouse + ?Sized>(
    warehouse: &mut W,
    tables: &[TableContract],
) -> Result<Vec<LiveColumn>, WarehouseError> {
    if tables.is_empty() {
        return Ok(Vec::new());
    }
    let names: BTreeSet<&str> = tables.iter().map(|t| t.name.as_str()).collect();
    let sql = format!(
        "SELECT TABLE_SCHEMA, TABLE_NAME, COLUMN_NAME, DATA_TYPE \
         FROM INFORMATION_SCHEMA.COLUMNS \
         WHERE TABLE_NAME IN ({}) \
         ORDER BY TABLE_SCHEMA, TABLE_NAME, ORDINAL_POSITION",
        placeholders(0, names.len())
    );
    let params: Vec<SqlParam> = names.iter().map(|n| SqlParam::Text(n.to_string())).collect();
    let table = warehouse.query(&sql, &params)?;

    let schema_col = table.column_index("TABLE_SCHEMA")?;
    let table_col = table.column_index("TABLE_NAME")?;
    let column_col = table.column_index("COLUMN_NAME")?;
    let type_col = table.column_index("DATA_TYPE")?;
    Ok(table
        .rows
        .iter()
        .map(|row| LiveColumn {
            schema: row[schema_col].render(),
            table: row[table_col].render(),
            column: row[column_col].render(),
            data_type: row[type_col].render(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_data_sql_binds_start_first() {
        let sql = market_data_sql("PX_LAST", 3);
        assert!(sql.contains("TICKER IN (@P2, @P3, @P4)"));
        assert!(sql.contains(">= @P1"));
        assert!(sql.contains("TRY_CAST(PX_LAST AS float)"));
    }
}
