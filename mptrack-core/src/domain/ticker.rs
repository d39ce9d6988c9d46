//! Ticker helpers.

/// Pseudo-ticker holding the uninvested part of an allocation.
pub const CASH: &str = "CASH";

/// Upper-case and trim a ticker as it arrives from the warehouse or a sheet.
pub fn normalize_ticker(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// True for exchange-listed tickers: exactly three upper-case ASCII letters.
///
/// Sheet rows such as "Cash", "Total" or notes never match, so this doubles
/// as the row filter for allocation sheets.
pub fn is_listed_ticker(raw: &str) -> bool {
    let s = raw.trim();
    s.len() == 3 && s.bytes().all(|b| b.is_ascii_uppercase())
}
