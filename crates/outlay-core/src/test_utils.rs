//! Builders for expense fixtures used across unit tests

use chrono::{Duration, NaiveDate};

use crate::models::{DataSource, NewTransaction, TransactionRecord};

/// Shorthand for a calendar date
pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// An expense with a merchant name and no category
pub fn expense(id: i64, merchant: &str, amount: f64, on: NaiveDate) -> TransactionRecord {
    TransactionRecord {
        id,
        amount,
        date: on,
        merchant_name: Some(merchant.to_string()),
        title: Some(merchant.to_string()),
        category: None,
    }
}

/// An expense that only carries a title (manual entry without merchant)
pub fn titled_expense(id: i64, title: &str, amount: f64, on: NaiveDate) -> TransactionRecord {
    TransactionRecord {
        id,
        amount,
        date: on,
        merchant_name: None,
        title: Some(title.to_string()),
        category: None,
    }
}

/// `count` charges of `amount` from `merchant`, `every` days apart starting at `start`.
/// Ids start at `first_id`.
pub fn series(
    first_id: i64,
    merchant: &str,
    amount: f64,
    start: NaiveDate,
    every: i64,
    count: usize,
) -> Vec<TransactionRecord> {
    (0..count)
        .map(|i| {
            expense(
                first_id + i as i64,
                merchant,
                amount,
                start + Duration::days(every * i as i64),
            )
        })
        .collect()
}

/// A storable expense
pub fn new_transaction(title: &str, amount: f64, on: NaiveDate) -> NewTransaction {
    NewTransaction {
        date: on,
        title: title.to_string(),
        merchant_name: Some(title.to_string()),
        category: None,
        amount,
        data_source: DataSource::Manual,
        import_hash: format!("{}|{}|{}", on, title, amount),
    }
}
