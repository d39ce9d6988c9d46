//! Holdings accounting: mark-to-market and target allocation.

/// Usable price: finite and strictly positive.
pub(crate) fn tradable(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

/// Portfolio value: `Σ units · price + cash`. Unpriced holdings count as zero.
pub fn mark_to_market(units: &[f64], prices: &[f64], cash: f64) -> f64 {
    units
        .iter()
        .zip(prices)
        .filter(|(u, p)| **u != 0.0 && p.is_finite())
        .map(|(u, p)| u * p)
        .sum::<f64>()
        + cash
}

/// Result of allocating a portfolio value across target weights.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub units: Vec<f64>,
    pub cash: f64,
    /// Holdings whose weight was parked in cash because they had no usable price.
    pub unpriced: Vec<usize>,
}

/// Split `value` across `weights` (aligned with `prices`) plus `cash_weight`.
///
/// A holding without a tradable price cannot be bought; its allocation is
/// kept as cash so the portfolio value is unchanged by the rebalance.
pub fn allocate(value: f64, weights: &[f64], cash_weight: f64, prices: &[f64]) -> Allocation {
    let mut units = vec![0.0; weights.len()];
    let mut cash = value * cash_weight;
    let mut unpriced = Vec::new();

    for (i, (&w, &px)) in weights.iter().zip(prices).enumerate() {
        if w == 0.0 {
            continue;
        }
        let amount = value * w;
        if tradable(px) {
            units[i] = amount / px;
        } else {
            cash += amount;
            unpriced.push(i);
        }
    }

    Allocation {
        units,
        cash,
        unpriced,
    }
}

/// Weight of each holding in a portfolio worth `value`.
pub fn holding_weights(units: &[f64], prices: &[f64], value: f64) -> Vec<f64> {
    units
        .iter()
        .zip(prices)
        .map(|(&u, &p)| {
            if u == 0.0 || !p.is_finite() || value == 0.0 {
                0.0
            } else {
                u * p / value
            }
        })
        .collect()
}
