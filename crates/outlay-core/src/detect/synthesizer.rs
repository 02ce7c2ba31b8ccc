//! Subscription candidate synthesis

use chrono::{Duration, NaiveDate};

use super::analyzer::{round_to, PatternStats};
use super::classifier::RecurrenceVerdict;
use super::grouper::MerchantGroup;
use crate::config::DetectionConfig;
use crate::error::{Error, Result};
use crate::models::SubscriptionCandidate;

/// Build a candidate from an emitted group.
///
/// Fails with [`Error::Validation`] when the next billing date cannot be projected.
pub fn synthesize(
    group: &MerchantGroup<'_>,
    stats: &PatternStats,
    verdict: &RecurrenceVerdict,
    config: &DetectionConfig,
) -> Result<SubscriptionCandidate> {
    let members = group.chronological();
    let (Some(first), Some(last)) = (members.first(), members.last()) else {
        return Err(Error::Validation(format!(
            "Cannot synthesize a subscription for empty group '{}'",
            group.key
        )));
    };

    let billing_days = if stats.intervals_days.len() >= 2 && stats.avg_interval_days > 0.0 {
        stats.avg_interval_days.round() as i64
    } else {
        verdict.billing_interval_days
    };

    let next_billing_date = project_next_billing(last.date, billing_days)?;

    let name = first
        .merchant_identity()
        .map(|s| s.to_string())
        .unwrap_or_else(|| group.key.clone());

    let category = first
        .category
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .map(|c| c.to_string())
        .unwrap_or_else(|| config.default_category.clone());

    Ok(SubscriptionCandidate {
        name,
        amount: round_to(stats.mean_amount(), 2),
        frequency: verdict.frequency,
        next_billing_date,
        merchant_name: first.merchant_name.clone(),
        category,
        icon: icon_for(&group.key, config),
        related_transaction_ids: members.iter().map(|t| t.id).collect(),
        occurrence_count: members.len(),
        total_spent: round_to(stats.total_amount(), 2),
    })
}

/// `last` plus `days`, or a validation error when the result is out of range
pub fn project_next_billing(last: NaiveDate, days: i64) -> Result<NaiveDate> {
    if days < 0 {
        return Err(Error::Validation(format!(
            "Negative billing interval: {} days",
            days
        )));
    }

    Duration::try_days(days)
        .and_then(|d| last.checked_add_signed(d))
        .ok_or_else(|| {
            Error::Validation(format!(
                "Next billing date out of range: {} + {} days",
                last, days
            ))
        })
}

/// First icon whose keyword appears in the merchant key, else the default icon
pub fn icon_for(key: &str, config: &DetectionConfig) -> String {
    let key = key.to_lowercase();
    config
        .icons
        .iter()
        .find(|(keyword, _)| key.contains(keyword.as_str()))
        .map(|(_, icon)| icon.clone())
        .unwrap_or_else(|| config.default_icon.clone())
}
