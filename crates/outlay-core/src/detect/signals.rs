//! Subscription signal aggregation
//!
//! A group becomes a candidate when any of three independent signals fires:
//! its merchant text mentions a known recurring service or recurrence word,
//! its category reads like a subscription, or the classifier found a pattern.

use super::classifier::RecurrenceVerdict;
use super::grouper::MerchantGroup;
use crate::config::DetectionConfig;

/// The three signals evaluated for a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubscriptionSignals {
    pub lexical: bool,
    pub category: bool,
    pub pattern: bool,
}

impl SubscriptionSignals {
    /// Evaluate signals against the earliest member of the group
    pub fn evaluate(
        group: &MerchantGroup<'_>,
        verdict: &RecurrenceVerdict,
        config: &DetectionConfig,
    ) -> Self {
        let members = group.chronological();
        let Some(first) = members.first() else {
            return Self::default();
        };

        Self {
            lexical: is_likely_subscription(
                first.merchant_name.as_deref(),
                first.title.as_deref(),
                config,
            ),
            category: category_suggests_subscription(first.category.as_deref(), config),
            pattern: verdict.is_recurring,
        }
    }

    pub fn should_emit(&self) -> bool {
        self.lexical || self.category || self.pattern
    }
}

/// Whether a group should be emitted as a candidate
pub fn should_emit(
    group: &MerchantGroup<'_>,
    verdict: &RecurrenceVerdict,
    config: &DetectionConfig,
) -> bool {
    SubscriptionSignals::evaluate(group, verdict, config).should_emit()
}

/// Case-insensitive keyword or recurrence-word match over merchant name and title
pub fn is_likely_subscription(
    merchant_name: Option<&str>,
    title: Option<&str>,
    config: &DetectionConfig,
) -> bool {
    if merchant_name.is_none() && title.is_none() {
        return false;
    }

    let text = format!(
        "{} {}",
        merchant_name.unwrap_or_default(),
        title.unwrap_or_default()
    )
    .to_lowercase();

    config
        .keywords
        .iter()
        .chain(config.recurrence_words.iter())
        .any(|word| !word.is_empty() && text.contains(word.as_str()))
}

fn category_suggests_subscription(category: Option<&str>, config: &DetectionConfig) -> bool {
    let text = category.unwrap_or_default().to_lowercase();
    config
        .category_hints
        .iter()
        .any(|hint| !hint.is_empty() && text.contains(hint.as_str()))
}
