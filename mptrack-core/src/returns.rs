//! Return and window helpers shared by attribution and summaries.

/// Period-over-period change. The first element is NaN; so is any element
/// whose current or previous level is non-finite, or whose previous level is
/// zero (the warehouse's `NULLIF(prev, 0)` rule).
pub fn pct_change(levels: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(levels.len());
    for (i, &level) in levels.iter().enumerate() {
        if i == 0 {
            out.push(f64::NAN);
            continue;
        }
        let prev = levels[i - 1];
        if !prev.is_finite() || !level.is_finite() || prev == 0.0 {
            out.push(f64::NAN);
        } else {
            out.push(level / prev - 1.0);
        }
    }
    out
}

/// Cumulative mean from the first element, skipping NaN. Elements before the
/// first finite value are NaN.
pub fn expanding_mean(values: &[f64]) -> Vec<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    values
        .iter()
        .map(|&v| {
            if v.is_finite() {
                sum += v;
                count += 1;
            }
            if count == 0 {
                f64::NAN
            } else {
                sum / count as f64
            }
        })
        .collect()
}

/// Compounded return `Π(1 + r) − 1` over finite elements.
pub fn compound<I: IntoIterator<Item = f64>>(returns: I) -> f64 {
    returns
        .into_iter()
        .filter(|r| r.is_finite())
        .fold(1.0, |acc, r| acc * (1.0 + r))
        - 1.0
}

/// Mean over finite elements; NaN when there are none.
pub fn finite_mean<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let (sum, n) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pct_change_guards_zero_and_nan() {
        let r = pct_change(&[f64::NAN, 10.0, 11.0, 0.0, 5.0]);
        assert!(r[0].is_nan());
        assert!(r[1].is_nan());
        assert!((r[2] - 0.1).abs() < 1e-12);
        assert_eq!(r[3], -1.0);
        assert!(r[4].is_nan());
    }

    #[test]
    fn expanding_mean_skips_nan() {
        let m = expanding_mean(&[f64::NAN, 1.0, f64::NAN, 3.0]);
        assert!(m[0].is_nan());
        assert_eq!(m[1], 1.0);
        assert_eq!(m[2], 1.0);
        assert_eq!(m[3], 2.0);
    }

    #[test]
    fn compound_multiplies() {
        let c = compound([0.1, -0.1, f64::NAN]);
        assert!((c - (-0.01)).abs() < 1e-12);
        assert_eq!(compound(std::iter::empty()), 0.0);
    }
}
