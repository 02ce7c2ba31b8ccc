//! Domain models for Outlay

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// An expense as consumed by the subscription detector.
///
/// Amounts are already coerced to a non-negative magnitude at the ingestion
/// boundary (see [`crate::ingest`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: i64,
    pub amount: f64,
    pub date: NaiveDate,
    pub merchant_name: Option<String>,
    pub title: Option<String>,
    pub category: Option<String>,
}

impl TransactionRecord {
    /// Merchant identity used for grouping: the merchant name when present,
    /// otherwise the title. Blank strings count as missing.
    pub fn merchant_identity(&self) -> Option<&str> {
        non_blank(self.merchant_name.as_deref()).or_else(|| non_blank(self.title.as_deref()))
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}

/// Where a stored transaction came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// Entered by hand
    #[default]
    Manual,
    /// Loaded from a CSV/JSON file
    Import,
    /// Delivered by a bank aggregator
    Bank,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Import => "import",
            Self::Bank => "bank",
        }
    }
}

impl std::str::FromStr for DataSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "manual" => Ok(Self::Manual),
            "import" => Ok(Self::Import),
            "bank" | "plaid" => Ok(Self::Bank),
            _ => Err(format!("Unknown data source: {}", s)),
        }
    }
}

/// A stored expense
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub date: NaiveDate,
    pub title: String,
    pub merchant_name: Option<String>,
    pub category: Option<String>,
    /// Non-negative magnitude
    pub amount: f64,
    pub data_source: DataSource,
    /// Hash for deduplication
    pub import_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A new expense to be stored (before DB insertion)
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub date: NaiveDate,
    pub title: String,
    pub merchant_name: Option<String>,
    pub category: Option<String>,
    pub amount: f64,
    pub data_source: DataSource,
    pub import_hash: String,
}

/// Subscription billing frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    #[default]
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    /// Factor that converts one charge at this frequency into a monthly cost
    pub fn monthly_multiplier(&self) -> f64 {
        match self {
            Self::Daily => 30.0,
            Self::Weekly => 4.0,
            Self::Monthly => 1.0,
            Self::Yearly => 1.0 / 12.0,
        }
    }
}

impl std::str::FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" | "annual" => Ok(Self::Yearly),
            _ => Err(format!("Unknown frequency: {}", s)),
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Subscription status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Cancelled => "cancelled",
        }
    }
}

/// How a subscription entered the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMethod {
    Auto,
    Manual,
}

impl DetectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
        }
    }
}

/// A detected recurring-payment pattern, not yet reconciled with stored records.
///
/// Created fresh on every detection run and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionCandidate {
    pub name: String,
    /// Mean charge, 2 decimals
    pub amount: f64,
    pub frequency: Frequency,
    pub next_billing_date: NaiveDate,
    pub merchant_name: Option<String>,
    pub category: String,
    pub icon: String,
    /// Member ids in chronological order
    pub related_transaction_ids: Vec<i64>,
    pub occurrence_count: usize,
    /// Sum of charges, 2 decimals
    pub total_spent: f64,
}

/// A stored subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub amount: f64,
    pub frequency: Frequency,
    pub next_billing_date: NaiveDate,
    pub category: String,
    pub merchant_name: Option<String>,
    pub icon: String,
    pub detection_method: DetectionMethod,
    pub related_transaction_ids: Vec<i64>,
    pub status: SubscriptionStatus,
    pub reminder_enabled: bool,
    pub reminder_days_before: i64,
    pub last_reminder_sent: Option<NaiveDate>,
    pub total_spent: f64,
    pub occurrence_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// What this subscription costs per month
    pub fn monthly_amount(&self) -> f64 {
        self.amount * self.frequency.monthly_multiplier()
    }
}

/// A manually entered subscription
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub name: String,
    pub amount: f64,
    pub frequency: Frequency,
    pub next_billing_date: NaiveDate,
    pub category: Option<String>,
    pub icon: Option<String>,
}

/// Partial update of a stored subscription; `None` leaves a field unchanged
#[derive(Debug, Clone, Default)]
pub struct SubscriptionUpdate {
    pub name: Option<String>,
    pub amount: Option<f64>,
    pub frequency: Option<Frequency>,
    pub next_billing_date: Option<NaiveDate>,
    pub category: Option<String>,
    pub icon: Option<String>,
    pub reminder_enabled: Option<bool>,
    pub reminder_days_before: Option<i64>,
}

/// Active subscriptions with their combined monthly cost
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionSummary {
    pub subscriptions: Vec<Subscription>,
    pub total_monthly: f64,
    pub count: usize,
}

/// Outcome of reconciling detected candidates with stored subscriptions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncResult {
    pub detected: usize,
    pub saved: usize,
    pub subscriptions: Vec<Subscription>,
}
