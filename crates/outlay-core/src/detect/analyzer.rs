//! Amount and interval statistics for a merchant group

use super::grouper::MerchantGroup;

/// Amount-spread and inter-charge interval statistics
#[derive(Debug, Clone, PartialEq)]
pub struct PatternStats {
    /// One magnitude per member, chronological
    pub amounts: Vec<f64>,
    /// (max - min) / min * 100, or 0 when the minimum is 0
    pub amount_variance_pct: f64,
    /// Days between consecutive charges, rounded to one decimal
    pub intervals_days: Vec<f64>,
    pub avg_interval_days: f64,
    pub min_interval_days: f64,
    pub max_interval_days: f64,
}

impl PatternStats {
    pub fn total_amount(&self) -> f64 {
        self.amounts.iter().sum()
    }

    pub fn mean_amount(&self) -> f64 {
        if self.amounts.is_empty() {
            return 0.0;
        }
        self.total_amount() / self.amounts.len() as f64
    }

    /// True when every amount is bit-for-bit equal to the first
    pub fn amounts_identical(&self) -> bool {
        match self.amounts.first() {
            Some(first) => self.amounts.iter().all(|a| a.to_bits() == first.to_bits()),
            None => false,
        }
    }
}

/// Compute statistics for a group. Pure; never fails.
pub fn analyze(group: &MerchantGroup<'_>) -> PatternStats {
    let members = group.chronological();

    let amounts: Vec<f64> = members.iter().map(|t| coerce_amount(t.amount)).collect();

    let intervals_days: Vec<f64> = members
        .windows(2)
        .map(|w| round_to((w[1].date - w[0].date).num_days() as f64, 1))
        .collect();

    let (avg_interval_days, min_interval_days, max_interval_days) = if intervals_days.is_empty() {
        (0.0, 0.0, 0.0)
    } else {
        let sum: f64 = intervals_days.iter().sum();
        let min = intervals_days.iter().copied().fold(f64::INFINITY, f64::min);
        let max = intervals_days.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (sum / intervals_days.len() as f64, min, max)
    };

    PatternStats {
        amount_variance_pct: amount_variance_pct(&amounts),
        amounts,
        intervals_days,
        avg_interval_days,
        min_interval_days,
        max_interval_days,
    }
}

/// Relative spread between the smallest and largest amount, as a percentage of
/// the smallest. 0 for an empty slice or a zero minimum.
pub fn amount_variance_pct(amounts: &[f64]) -> f64 {
    if amounts.is_empty() {
        return 0.0;
    }

    let min = amounts.iter().copied().fold(f64::INFINITY, f64::min);
    let max = amounts.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if min > 0.0 {
        (max - min) / min * 100.0
    } else {
        0.0
    }
}

/// Non-finite amounts count as 0
fn coerce_amount(amount: f64) -> f64 {
    if amount.is_finite() {
        amount
    } else {
        0.0
    }
}

/// Round half away from zero to `places` decimals
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
