//! Merchant grouping
//!
//! Partitions expenses by normalized merchant identity: the merchant name
//! when present, otherwise the title, lower-cased and trimmed.

use std::collections::BTreeMap;

use tracing::debug;

use crate::models::TransactionRecord;

/// Expenses attributed to the same normalized payee
#[derive(Debug, Clone)]
pub struct MerchantGroup<'a> {
    pub key: String,
    /// In input order; use [`MerchantGroup::chronological`] for date order
    pub members: Vec<&'a TransactionRecord>,
}

impl<'a> MerchantGroup<'a> {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            members: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members sorted by date ascending. Stable: same-day members keep input order.
    pub fn chronological(&self) -> Vec<&'a TransactionRecord> {
        let mut sorted = self.members.clone();
        sorted.sort_by_key(|t| t.date);
        sorted
    }
}

/// Normalize a merchant identity into a grouping key
pub fn normalize_key(identity: &str) -> String {
    identity.trim().to_lowercase()
}

/// Group expenses by normalized merchant identity.
///
/// Expenses with neither a merchant name nor a title are dropped.
pub fn group<'a, I>(transactions: I) -> BTreeMap<String, MerchantGroup<'a>>
where
    I: IntoIterator<Item = &'a TransactionRecord>,
{
    let mut groups: BTreeMap<String, MerchantGroup<'a>> = BTreeMap::new();

    for tx in transactions {
        let Some(identity) = tx.merchant_identity() else {
            debug!("Skipping expense {} - no merchant name or title", tx.id);
            continue;
        };

        let key = normalize_key(identity);
        groups
            .entry(key.clone())
            .or_insert_with(|| MerchantGroup::new(key))
            .members
            .push(tx);
    }

    groups
}
