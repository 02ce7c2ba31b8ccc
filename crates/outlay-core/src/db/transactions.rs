//! Expense operations

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};

use super::{parse_date_column, parse_timestamp_column, Database};
use crate::error::Result;
use crate::models::{NewTransaction, Transaction, TransactionRecord};

/// Counts from a batch insert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertCounts {
    pub inserted: usize,
    pub duplicates: usize,
}

impl Database {
    /// Insert an expense, returning None if its import hash already exists for the user
    pub fn insert_transaction(&self, user_id: i64, tx: &NewTransaction) -> Result<Option<i64>> {
        let conn = self.conn()?;

        let id = conn
            .query_row(
                r#"
                INSERT INTO transactions (user_id, date, title, merchant_name, category, amount, data_source, import_hash)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(user_id, import_hash) DO NOTHING
                RETURNING id
                "#,
                params![
                    user_id,
                    tx.date.to_string(),
                    tx.title,
                    tx.merchant_name,
                    tx.category,
                    tx.amount,
                    tx.data_source.as_str(),
                    tx.import_hash,
                ],
                |row| row.get(0),
            )
            .optional()?;

        Ok(id)
    }

    /// Insert a batch of expenses, skipping duplicates
    pub fn insert_transactions(&self, user_id: i64, txs: &[NewTransaction]) -> Result<InsertCounts> {
        let mut counts = InsertCounts::default();
        for tx in txs {
            match self.insert_transaction(user_id, tx)? {
                Some(_) => counts.inserted += 1,
                None => counts.duplicates += 1,
            }
        }
        Ok(counts)
    }

    /// A user's expenses dated on or after `since`, oldest first, in the
    /// shape the detector consumes
    pub fn list_expenses(&self, user_id: i64, since: NaiveDate) -> Result<Vec<TransactionRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, amount, date, merchant_name, title, category
            FROM transactions
            WHERE user_id = ? AND date >= ?
            ORDER BY date ASC, id ASC
            "#,
        )?;

        let records = stmt
            .query_map(params![user_id, since.to_string()], |row| {
                let date_str: String = row.get(2)?;
                Ok(TransactionRecord {
                    id: row.get(0)?,
                    amount: row.get(1)?,
                    date: parse_date_column(2, &date_str)?,
                    merchant_name: row.get(3)?,
                    title: row.get(4)?,
                    category: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Most recent expenses first
    pub fn list_transactions(&self, user_id: i64, limit: i64) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, user_id, date, title, merchant_name, category, amount, data_source, import_hash, created_at
            FROM transactions
            WHERE user_id = ?
            ORDER BY date DESC, id DESC
            LIMIT ?
            "#,
        )?;

        let transactions = stmt
            .query_map(params![user_id, limit], row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(transactions)
    }

    /// Count a user's expenses
    pub fn count_transactions(&self, user_id: i64) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE user_id = ?",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn row_to_transaction(row: &Row) -> rusqlite::Result<Transaction> {
    let date_str: String = row.get(2)?;
    let source_str: String = row.get(7)?;
    let created_at_str: String = row.get(9)?;

    Ok(Transaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        date: parse_date_column(2, &date_str)?,
        title: row.get(3)?,
        merchant_name: row.get(4)?,
        category: row.get(5)?,
        amount: row.get(6)?,
        data_source: source_str.parse().unwrap_or_default(),
        import_hash: row.get(8)?,
        created_at: parse_timestamp_column(9, &created_at_str)?,
    })
}
