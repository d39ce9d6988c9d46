//! Engine error type shared by allocation parsing, simulation and summaries.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("allocation sheet must contain a '{0}' column")]
    MissingColumn(String),

    #[error("cannot read a rebalance date from column label '{0}'")]
    BadDateLabel(String),

    #[error("allocation sheet has no rebalance columns")]
    NoRebalances,

    #[error("rebalance date {0} appears in more than one column")]
    DuplicateRebalance(NaiveDate),

    #[error("rebalance on {0} has zero total weight")]
    EmptyRebalance(NaiveDate),

    #[error("no overlapping tickers between the allocation and the price history")]
    NoOverlap,

    #[error("no price rows on or after {0}")]
    NoPrices(NaiveDate),

    #[error("price history has no row on the initial rebalance date {0}")]
    MissingStartPrice(NaiveDate),

    #[error("`from` date {from} must be earlier than or equal to `to` date {to}")]
    InvalidRange { from: NaiveDate, to: NaiveDate },

    #[error("no attribution rows between {from} and {to}")]
    EmptyRange { from: NaiveDate, to: NaiveDate },
}
