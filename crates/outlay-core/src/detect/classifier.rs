//! Frequency classification
//!
//! Decides whether a merchant group looks like a recurring charge and, if so,
//! at what frequency. Rules are evaluated in priority order and the first
//! match wins:
//!
//! | Rule | Condition | Frequency |
//! |---|---|---|
//! | [`RecurrenceRule::SimilarAmounts`] | 3+ charges, similar amounts | bucketed by average interval |
//! | [`RecurrenceRule::SameDay`] | 2+ charges at most a day apart, similar amounts | monthly |
//! | [`RecurrenceRule::WeeklyInterval`] | 2+ charges, average 5-9 days, similar amounts | weekly |
//! | [`RecurrenceRule::MonthlyInterval`] | 2+ charges, average 23-37 days, similar amounts | monthly |
//! | [`RecurrenceRule::YearlyInterval`] | 2+ charges, average 350-380 days, similar amounts | yearly |
//! | [`RecurrenceRule::IdenticalAmounts`] | 3+ charges, bit-identical amounts | monthly |

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

use super::analyzer::PatternStats;
use super::grouper::MerchantGroup;
use crate::config::DetectionConfig;
use crate::models::Frequency;

/// Which classification rule matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceRule {
    SimilarAmounts,
    SameDay,
    WeeklyInterval,
    MonthlyInterval,
    YearlyInterval,
    IdenticalAmounts,
}

impl RecurrenceRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SimilarAmounts => "similar_amounts",
            Self::SameDay => "same_day",
            Self::WeeklyInterval => "weekly_interval",
            Self::MonthlyInterval => "monthly_interval",
            Self::YearlyInterval => "yearly_interval",
            Self::IdenticalAmounts => "identical_amounts",
        }
    }
}

/// Classifier output, consumed by the signal aggregator even when not recurring
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RecurrenceVerdict {
    pub is_recurring: bool,
    pub frequency: Frequency,
    pub billing_interval_days: i64,
    pub rule: Option<RecurrenceRule>,
}

impl RecurrenceVerdict {
    pub fn not_recurring() -> Self {
        Self {
            is_recurring: false,
            frequency: Frequency::Monthly,
            billing_interval_days: 30,
            rule: None,
        }
    }

    fn recurring(rule: RecurrenceRule, frequency: Frequency, billing_interval_days: i64) -> Self {
        Self {
            is_recurring: true,
            frequency,
            billing_interval_days,
            rule: Some(rule),
        }
    }
}

/// Classify a group given its statistics. Pure: identical inputs give identical verdicts.
pub fn classify(
    group: &MerchantGroup<'_>,
    stats: &PatternStats,
    config: &DetectionConfig,
) -> RecurrenceVerdict {
    let count = group.len();
    let similar = stats.amount_variance_pct <= config.max_amount_variance_pct;
    let avg = stats.avg_interval_days;

    if count >= 3 && similar {
        let (frequency, days) = if stats.intervals_days.len() >= 2 {
            bucket_interval(avg)
        } else {
            let dates: Vec<NaiveDate> = group.chronological().iter().map(|t| t.date).collect();
            let pattern = detects_monthly_pattern(&dates);
            debug!(
                "{}: too few intervals to bucket, day-of-month pattern = {}",
                group.key, pattern
            );
            (Frequency::Monthly, 30)
        };
        return RecurrenceVerdict::recurring(RecurrenceRule::SimilarAmounts, frequency, days);
    }

    if count >= 2 && similar && stats.max_interval_days <= 1.0 {
        return RecurrenceVerdict::recurring(RecurrenceRule::SameDay, Frequency::Monthly, 30);
    }

    if count >= 2 && similar && (5.0..=9.0).contains(&avg) {
        return RecurrenceVerdict::recurring(RecurrenceRule::WeeklyInterval, Frequency::Weekly, 7);
    }

    if count >= 2 && similar && (23.0..=37.0).contains(&avg) {
        return RecurrenceVerdict::recurring(RecurrenceRule::MonthlyInterval, Frequency::Monthly, 30);
    }

    if count >= 2 && similar && (350.0..=380.0).contains(&avg) {
        return RecurrenceVerdict::recurring(RecurrenceRule::YearlyInterval, Frequency::Yearly, 365);
    }

    if count >= 3 && stats.amounts_identical() {
        return RecurrenceVerdict::recurring(RecurrenceRule::IdenticalAmounts, Frequency::Monthly, 30);
    }

    RecurrenceVerdict::not_recurring()
}

/// Map an average interval onto a billing frequency
fn bucket_interval(avg: f64) -> (Frequency, i64) {
    if (25.0..=35.0).contains(&avg) {
        (Frequency::Monthly, 30)
    } else if (350.0..=375.0).contains(&avg) {
        (Frequency::Yearly, 365)
    } else if (5.0..=9.0).contains(&avg) {
        (Frequency::Weekly, 7)
    } else if (1.0..=3.0).contains(&avg) {
        (Frequency::Daily, 1)
    } else {
        (Frequency::Monthly, 30)
    }
}

/// True when all dates fall within 2 days of the same day-of-month and span
/// at least 2 distinct calendar months
pub fn detects_monthly_pattern(dates: &[NaiveDate]) -> bool {
    if dates.len() < 2 {
        return false;
    }

    let days: Vec<u32> = dates.iter().map(|d| d.day()).collect();
    let (Some(min), Some(max)) = (days.iter().min(), days.iter().max()) else {
        return false;
    };
    if max - min > 2 {
        return false;
    }

    let months: HashSet<u32> = dates.iter().map(|d| d.month()).collect();
    months.len() >= 2
}
