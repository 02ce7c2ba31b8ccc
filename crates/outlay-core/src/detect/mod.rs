//! Subscription detection
//!
//! Finds recurring charges in a user's expense history:
//! - Group expenses by normalized merchant ([`grouper`])
//! - Compute amount spread and charge intervals ([`analyzer`])
//! - Classify the billing frequency ([`classifier`])
//! - Combine lexical, category and pattern signals ([`signals`])
//! - Build a subscription candidate ([`synthesizer`])
//!
//! The pipeline is pure and synchronous. Only the trailing window (120 days by
//! default) ending at the injected clock's date is considered.

pub mod analyzer;
pub mod classifier;
pub mod clock;
pub mod grouper;
pub mod signals;
pub mod synthesizer;

use std::collections::HashSet;

use chrono::{Duration, NaiveDate};
use tracing::{debug, info, warn};

use crate::config::DetectionConfig;
use crate::error::Error;
use crate::models::{SubscriptionCandidate, TransactionRecord};

pub use analyzer::{analyze, PatternStats};
pub use classifier::{classify, detects_monthly_pattern, RecurrenceRule, RecurrenceVerdict};
pub use clock::{Clock, FixedClock, SystemClock};
pub use grouper::{group, normalize_key, MerchantGroup};
pub use signals::{is_likely_subscription, should_emit, SubscriptionSignals};
pub use synthesizer::{icon_for, project_next_billing, synthesize};

/// A merchant group that could not be turned into a candidate
#[derive(Debug)]
pub struct DetectionFailure {
    /// Normalized merchant key
    pub merchant: String,
    pub error: Error,
}

/// Result of one detection run
#[derive(Debug, Default)]
pub struct DetectionOutcome {
    /// Unordered across merchants
    pub candidates: Vec<SubscriptionCandidate>,
    pub failures: Vec<DetectionFailure>,
}

/// First day inside a trailing window of `days` ending at `today`.
///
/// A window reaching past the start of the calendar covers all history; a
/// negative window reaching past its end covers nothing.
pub fn window_start(today: NaiveDate, days: i64) -> NaiveDate {
    Duration::try_days(days)
        .and_then(|d| today.checked_sub_signed(d))
        .unwrap_or(if days < 0 { NaiveDate::MAX } else { NaiveDate::MIN })
}

/// Detects recurring charges in expense history
pub struct SubscriptionDetector<C: Clock = SystemClock> {
    config: DetectionConfig,
    clock: C,
}

impl SubscriptionDetector<SystemClock> {
    pub fn new() -> Self {
        Self::with_config(DetectionConfig::default())
    }

    pub fn with_config(config: DetectionConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl Default for SubscriptionDetector<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> SubscriptionDetector<C> {
    pub fn with_clock(config: DetectionConfig, clock: C) -> Self {
        Self { config, clock }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// First day of the trailing detection window ending today
    pub fn window_start(&self) -> NaiveDate {
        window_start(self.clock.today(), self.config.window_days)
    }

    /// Run detection over a user's expenses.
    ///
    /// A group that fails synthesis is reported in [`DetectionOutcome::failures`]
    /// and does not affect the other groups.
    pub fn detect(&self, transactions: &[TransactionRecord]) -> DetectionOutcome {
        let cutoff = self.window_start();

        let in_window = transactions.iter().filter(|t| t.date >= cutoff);
        let groups = grouper::group(in_window);

        debug!(
            "Detecting subscriptions in {} merchant groups since {}",
            groups.len(),
            cutoff
        );

        let mut outcome = DetectionOutcome::default();
        let mut processed: HashSet<&str> = HashSet::new();

        for (key, group) in &groups {
            if group.len() < 2 {
                continue;
            }
            if !processed.insert(key.as_str()) {
                continue;
            }

            let stats = analyzer::analyze(group);
            let verdict = classifier::classify(group, &stats, &self.config);
            let signals = signals::SubscriptionSignals::evaluate(group, &verdict, &self.config);

            debug!(
                "{}: {} charges, variance {:.1}%, avg interval {:.1}d, rule {:?}, signals {:?}",
                key,
                group.len(),
                stats.amount_variance_pct,
                stats.avg_interval_days,
                verdict.rule.map(|r| r.as_str()),
                signals
            );

            if !signals.should_emit() {
                continue;
            }

            match synthesizer::synthesize(group, &stats, &verdict, &self.config) {
                Ok(candidate) => {
                    debug!(
                        "Detected {} ({}, next {})",
                        candidate.name, candidate.frequency, candidate.next_billing_date
                    );
                    outcome.candidates.push(candidate);
                }
                Err(e) => {
                    warn!(merchant = %key, error = %e, "Skipping merchant group");
                    outcome.failures.push(DetectionFailure {
                        merchant: key.clone(),
                        error: e,
                    });
                }
            }
        }

        info!(
            "Subscription detection complete: {} candidates, {} failures",
            outcome.candidates.len(),
            outcome.failures.len()
        );

        outcome
    }
}
