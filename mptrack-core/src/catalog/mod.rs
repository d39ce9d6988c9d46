//! Warehouse schema catalog.
//!
//! The warehouse is an external, fixed contract: nothing here creates or
//! migrates it. The catalog lists the tables and columns the tracker reads so
//! a live database can be checked before a run, and lints the Markdown schema
//! reference kept alongside the runbook.

pub mod doc_lint;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub use doc_lint::{lint_schema_doc, DocIssue};

/// A table the tracker depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableContract {
    pub schema: String,
    pub name: String,
    pub columns: Vec<String>,
}

impl TableContract {
    fn new(schema: &str, name: &str, columns: &[&str]) -> Self {
        Self {
            schema: schema.to_string(),
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// `schema.name`
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

/// The set of tables and columns read by the calc pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseContract {
    pub tables: Vec<TableContract>,
}

impl Default for WarehouseContract {
    fn default() -> Self {
        Self {
            tables: vec![
                TableContract::new(
                    "dbo",
                    "Market_Data",
                    &["TICKER", "TRADE_DATE", "PX_LAST", "MKT_CAP"],
                ),
                TableContract::new(
                    "dbo",
                    "MarketIndex",
                    &["COMGROUPCODE", "TRADINGDATE", "INDEXVALUE"],
                ),
                TableContract::new("dbo", "Sector_Map", &["Ticker", "VNI"]),
            ],
        }
    }
}

/// One column as reported by `INFORMATION_SCHEMA.COLUMNS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveColumn {
    pub schema: String,
    pub table: String,
    pub column: String,
    pub data_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractIssue {
    MissingTable(String),
    MissingColumn { table: String, column: String },
}

impl std::fmt::Display for ContractIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContractIssue::MissingTable(t) => write!(f, "table {t} not found"),
            ContractIssue::MissingColumn { table, column } => {
                write!(f, "column {table}.{column} not found")
            }
        }
    }
}

/// Compare the contract against live columns. Names match case-insensitively,
/// as SQL Server's default collation does.
pub fn verify(contract: &WarehouseContract, live: &[LiveColumn]) -> Vec<ContractIssue> {
    let mut present: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for col in live {
        present
            .entry(format!("{}.{}", col.schema, col.table).to_lowercase())
            .or_default()
            .insert(col.column.to_lowercase());
    }

    let mut issues = Vec::new();
    for table in &contract.tables {
        let Some(columns) = present.get(&table.qualified().to_lowercase()) else {
            issues.push(ContractIssue::MissingTable(table.qualified()));
            continue;
        };
        for column in &table.columns {
            if !columns.contains(&column.to_lowercase()) {
                issues.push(ContractIssue::MissingColumn {
                    table: table.qualified(),
                    column: column.clone(),
                });
            }
        }
    }
    issues
}
