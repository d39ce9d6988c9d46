//! mptrack core: tickers, price panels, allocation schedules, portfolio
//! simulation and attribution.
//!
//! This crate holds the pure engine. It never touches the network or the
//! filesystem:
//! - Domain types (observations, date × ticker panels, dated series)
//! - Wide allocation sheets parsed into a normalised rebalance schedule
//! - Rebalanced and buy-and-hold simulations starting at 100
//! - Daily active-weight attribution against the benchmark and the original portfolio
//! - Period summaries (per-ticker totals, contributors, analyst leaderboard)
//! - The warehouse schema catalog and its Markdown lint

pub mod allocation;
pub mod attribution;
pub mod catalog;
pub mod domain;
pub mod engine;
pub mod error;
pub mod returns;
pub mod summary;

pub use error::EngineError;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: engine outputs can move to the dashboard's loader thread.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Panel>();
        require_sync::<domain::Panel>();
        require_send::<domain::Series>();
        require_sync::<domain::Series>();
        require_send::<allocation::RebalanceSchedule>();
        require_sync::<allocation::RebalanceSchedule>();

        // Engine outputs
        require_send::<engine::Simulation>();
        require_sync::<engine::Simulation>();
        require_send::<attribution::AttributionRow>();
        require_sync::<attribution::AttributionRow>();
        require_send::<attribution::SeriesPoint>();
        require_sync::<attribution::SeriesPoint>();
        require_send::<summary::TickerSummary>();
        require_sync::<summary::TickerSummary>();

        require_send::<EngineError>();
        require_sync::<EngineError>();
    }
}
