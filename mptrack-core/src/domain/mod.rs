//! Domain types: tickers, long-format observations, date × ticker panels, dated series.

pub mod panel;
pub mod series;
pub mod ticker;

pub use panel::{Aggregation, Observation, Panel};
pub use series::Series;
pub use ticker::{is_listed_ticker, normalize_ticker, CASH};

/// Ticker type alias
pub type Ticker = String;
