//! Subscription operations

use chrono::{Duration, NaiveDate};
use rusqlite::{params, OptionalExtension, Row};
use tracing::{debug, info, warn};

use super::{parse_date_column, parse_timestamp_column, Database};
use crate::detect::analyzer::round_to;
use crate::error::{Error, Result};
use crate::models::{
    DetectionMethod, Frequency, NewSubscription, Subscription, SubscriptionCandidate,
    SubscriptionStatus, SubscriptionSummary, SubscriptionUpdate, SyncResult,
};

const SUBSCRIPTION_COLUMNS: &str = r#"
    id, user_id, name, amount, frequency, next_billing_date, category, merchant_name, icon,
    detection_method, related_transaction_ids, status, reminder_enabled, reminder_days_before,
    last_reminder_sent, total_spent, occurrence_count, created_at, updated_at
"#;

const DEFAULT_CATEGORY: &str = "Subscription";
const DEFAULT_ICON: &str = "💳";

impl Database {
    /// Reconcile detected candidates with a user's stored subscriptions.
    ///
    /// Each candidate is upserted on (user, name) among active subscriptions:
    /// an existing one has its amount, next billing date, related expenses,
    /// occurrence count, total and frequency refreshed; otherwise a new
    /// auto-detected subscription is inserted. A candidate that fails to save
    /// is logged and skipped.
    pub fn sync_detected_subscriptions(
        &self,
        user_id: i64,
        candidates: &[SubscriptionCandidate],
    ) -> Result<SyncResult> {
        let mut result = SyncResult {
            detected: candidates.len(),
            ..Default::default()
        };

        for candidate in candidates {
            let saved = self
                .upsert_detected_subscription(user_id, candidate)
                .and_then(|id| self.get_subscription(id));

            match saved {
                Ok(Some(sub)) => {
                    result.saved += 1;
                    result.subscriptions.push(sub);
                }
                Ok(None) => {
                    warn!("Subscription '{}' vanished after save", candidate.name);
                }
                Err(e) => {
                    warn!(name = %candidate.name, error = %e, "Failed to save detected subscription");
                }
            }
        }

        info!(
            "Synced subscriptions for user {}: {} detected, {} saved",
            user_id, result.detected, result.saved
        );
        Ok(result)
    }

    /// Atomic insert-or-update of one detected subscription, returning its id
    fn upsert_detected_subscription(
        &self,
        user_id: i64,
        candidate: &SubscriptionCandidate,
    ) -> Result<i64> {
        let conn = self.conn()?;
        let related = serde_json::to_string(&candidate.related_transaction_ids)?;

        let id = conn.query_row(
            r#"
            INSERT INTO subscriptions (
                user_id, name, amount, frequency, next_billing_date, category, merchant_name,
                icon, detection_method, related_transaction_ids, status, total_spent, occurrence_count
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'auto', ?, 'active', ?, ?)
            ON CONFLICT(user_id, name) WHERE status = 'active' DO UPDATE SET
                amount = excluded.amount,
                next_billing_date = excluded.next_billing_date,
                related_transaction_ids = excluded.related_transaction_ids,
                occurrence_count = excluded.occurrence_count,
                total_spent = excluded.total_spent,
                frequency = excluded.frequency,
                updated_at = CURRENT_TIMESTAMP
            RETURNING id
            "#,
            params![
                user_id,
                candidate.name,
                candidate.amount,
                candidate.frequency.as_str(),
                candidate.next_billing_date.to_string(),
                candidate.category,
                candidate.merchant_name,
                candidate.icon,
                related,
                candidate.total_spent,
                candidate.occurrence_count as i64,
            ],
            |row| row.get(0),
        )?;

        debug!("Upserted subscription '{}' as {}", candidate.name, id);
        Ok(id)
    }

    /// Active subscriptions ordered by next billing date, with their combined monthly cost
    pub fn list_active_subscriptions(&self, user_id: i64) -> Result<SubscriptionSummary> {
        let conn = self.conn()?;
        let query = format!(
            "SELECT {} FROM subscriptions WHERE user_id = ? AND status = 'active' \
             ORDER BY next_billing_date ASC, id ASC",
            SUBSCRIPTION_COLUMNS
        );
        let mut stmt = conn.prepare(&query)?;

        let subscriptions = stmt
            .query_map(params![user_id], row_to_subscription)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let total_monthly = round_to(subscriptions.iter().map(|s| s.monthly_amount()).sum(), 2);

        Ok(SubscriptionSummary {
            count: subscriptions.len(),
            total_monthly,
            subscriptions,
        })
    }

    /// Record a subscription entered by hand
    pub fn create_subscription(&self, user_id: i64, new: &NewSubscription) -> Result<Subscription> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(Error::Validation("Subscription name is required".into()));
        }
        validate_amount(new.amount)?;

        let conn = self.conn()?;
        let id: i64 = conn
            .query_row(
                r#"
                INSERT INTO subscriptions (
                    user_id, name, amount, frequency, next_billing_date, category, icon,
                    detection_method, status
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, 'manual', 'active')
                RETURNING id
                "#,
                params![
                    user_id,
                    name,
                    new.amount,
                    new.frequency.as_str(),
                    new.next_billing_date.to_string(),
                    new.category.as_deref().unwrap_or(DEFAULT_CATEGORY),
                    new.icon.as_deref().unwrap_or(DEFAULT_ICON),
                ],
                |row| row.get(0),
            )
            .map_err(|e| duplicate_name_error(e, name))?;

        drop(conn);
        self.get_subscription(id)?
            .ok_or_else(|| Error::NotFound(format!("Subscription {}", id)))
    }

    /// Apply a partial update to one of a user's subscriptions
    pub fn update_subscription(
        &self,
        user_id: i64,
        id: i64,
        update: &SubscriptionUpdate,
    ) -> Result<Subscription> {
        if let Some(amount) = update.amount {
            validate_amount(amount)?;
        }
        if let Some(days) = update.reminder_days_before {
            if days < 0 {
                return Err(Error::Validation(format!(
                    "reminder_days_before must not be negative, got {}",
                    days
                )));
            }
        }
        let name = update.name.as_deref().map(str::trim);
        if name == Some("") {
            return Err(Error::Validation("Subscription name is required".into()));
        }

        let conn = self.conn()?;
        let changed = conn
            .execute(
                r#"
                UPDATE subscriptions SET
                    name = COALESCE(?, name),
                    amount = COALESCE(?, amount),
                    frequency = COALESCE(?, frequency),
                    next_billing_date = COALESCE(?, next_billing_date),
                    category = COALESCE(?, category),
                    icon = COALESCE(?, icon),
                    reminder_enabled = COALESCE(?, reminder_enabled),
                    reminder_days_before = COALESCE(?, reminder_days_before),
                    updated_at = CURRENT_TIMESTAMP
                WHERE id = ? AND user_id = ?
                "#,
                params![
                    name,
                    update.amount,
                    update.frequency.map(|f| f.as_str()),
                    update.next_billing_date.map(|d| d.to_string()),
                    update.category,
                    update.icon,
                    update.reminder_enabled,
                    update.reminder_days_before,
                    id,
                    user_id,
                ],
            )
            .map_err(|e| duplicate_name_error(e, name.unwrap_or_default()))?;

        if changed == 0 {
            return Err(Error::NotFound(format!("Subscription {}", id)));
        }

        drop(conn);
        self.get_subscription(id)?
            .ok_or_else(|| Error::NotFound(format!("Subscription {}", id)))
    }

    /// Mark one of a user's subscriptions as cancelled
    pub fn cancel_subscription(&self, user_id: i64, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            r#"
            UPDATE subscriptions
            SET status = 'cancelled', updated_at = CURRENT_TIMESTAMP
            WHERE id = ? AND user_id = ?
            "#,
            params![id, user_id],
        )?;

        if changed == 0 {
            return Err(Error::NotFound(format!("Subscription {}", id)));
        }

        info!("Cancelled subscription {}", id);
        Ok(())
    }

    /// Active subscriptions billing within `days` of `today` (overdue included), soonest first
    pub fn upcoming_subscriptions(
        &self,
        user_id: i64,
        today: NaiveDate,
        days: i64,
    ) -> Result<Vec<Subscription>> {
        let horizon = Duration::try_days(days)
            .and_then(|d| today.checked_add_signed(d))
            .ok_or_else(|| Error::Validation(format!("Horizon out of range: {} days", days)))?;

        let conn = self.conn()?;
        let query = format!(
            "SELECT {} FROM subscriptions \
             WHERE user_id = ? AND status = 'active' AND next_billing_date <= ? \
             ORDER BY next_billing_date ASC, id ASC",
            SUBSCRIPTION_COLUMNS
        );
        let mut stmt = conn.prepare(&query)?;

        let subscriptions = stmt
            .query_map(params![user_id, horizon.to_string()], row_to_subscription)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(subscriptions)
    }

    /// Active subscriptions with reminders enabled whose reminder date
    /// (next billing date minus `reminder_days_before`) has arrived and for
    /// which no reminder was sent since
    pub fn due_reminders(&self, user_id: i64, today: NaiveDate) -> Result<Vec<Subscription>> {
        let conn = self.conn()?;
        let query = format!(
            "SELECT {} FROM subscriptions \
             WHERE user_id = ? AND status = 'active' AND reminder_enabled = 1 \
               AND date(next_billing_date, '-' || reminder_days_before || ' days') <= ? \
               AND (last_reminder_sent IS NULL \
                    OR last_reminder_sent < date(next_billing_date, '-' || reminder_days_before || ' days')) \
             ORDER BY next_billing_date ASC, id ASC",
            SUBSCRIPTION_COLUMNS
        );
        let mut stmt = conn.prepare(&query)?;

        let subscriptions = stmt
            .query_map(params![user_id, today.to_string()], row_to_subscription)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(subscriptions)
    }

    /// Record that a reminder for one of a user's subscriptions went out on `today`
    pub fn mark_reminder_sent(&self, user_id: i64, id: i64, today: NaiveDate) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            r#"
            UPDATE subscriptions
            SET last_reminder_sent = ?, updated_at = CURRENT_TIMESTAMP
            WHERE id = ? AND user_id = ?
            "#,
            params![today.to_string(), id, user_id],
        )?;

        if changed == 0 {
            return Err(Error::NotFound(format!("Subscription {}", id)));
        }
        Ok(())
    }

    /// Get a subscription by ID
    pub fn get_subscription(&self, id: i64) -> Result<Option<Subscription>> {
        let conn = self.conn()?;
        let query = format!("SELECT {} FROM subscriptions WHERE id = ?", SUBSCRIPTION_COLUMNS);

        let sub = conn
            .query_row(&query, params![id], row_to_subscription)
            .optional()?;
        Ok(sub)
    }

    /// Count a user's subscriptions with the given status
    pub fn count_subscriptions(&self, user_id: i64, status: SubscriptionStatus) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM subscriptions WHERE user_id = ? AND status = ?",
            params![user_id, status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn validate_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(Error::Validation(format!(
            "Amount must be a non-negative number, got {}",
            amount
        )));
    }
    Ok(())
}

/// Map a unique-index violation on the active name to a validation error
fn duplicate_name_error(e: rusqlite::Error, name: &str) -> Error {
    match &e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Error::Validation(format!("An active subscription named '{}' already exists", name))
        }
        _ => Error::Database(e),
    }
}

fn row_to_subscription(row: &Row) -> rusqlite::Result<Subscription> {
    let frequency_str: String = row.get(4)?;
    let next_billing_str: String = row.get(5)?;
    let method_str: String = row.get(9)?;
    let related_str: String = row.get(10)?;
    let status_str: String = row.get(11)?;
    let last_reminder_str: Option<String> = row.get(14)?;
    let created_at_str: String = row.get(17)?;
    let updated_at_str: String = row.get(18)?;

    Ok(Subscription {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        amount: row.get(3)?,
        frequency: frequency_str.parse().unwrap_or(Frequency::Monthly),
        next_billing_date: parse_date_column(5, &next_billing_str)?,
        category: row.get(6)?,
        merchant_name: row.get(7)?,
        icon: row.get(8)?,
        detection_method: match method_str.as_str() {
            "auto" => DetectionMethod::Auto,
            _ => DetectionMethod::Manual,
        },
        related_transaction_ids: serde_json::from_str(&related_str).unwrap_or_default(),
        status: match status_str.as_str() {
            "cancelled" => SubscriptionStatus::Cancelled,
            _ => SubscriptionStatus::Active,
        },
        reminder_enabled: row.get(12)?,
        reminder_days_before: row.get(13)?,
        last_reminder_sent: last_reminder_str
            .map(|s| parse_date_column(14, &s))
            .transpose()?,
        total_spent: row.get(15)?,
        occurrence_count: row.get(16)?,
        created_at: parse_timestamp_column(17, &created_at_str)?,
        updated_at: parse_timestamp_column(18, &updated_at_str)?,
    })
}
