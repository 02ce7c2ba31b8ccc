//! Transaction command implementations

use anyhow::Result;
use outlay_core::db::Database;

use super::truncate;

pub fn cmd_transactions_list(db: &Database, user_id: i64, limit: i64) -> Result<()> {
    let transactions = db.list_transactions(user_id, limit)?;

    if transactions.is_empty() {
        println!("No transactions found. Import some with:");
        println!("  outlay import --file statement.csv");
        return Ok(());
    }

    println!();
    println!("📝 Recent Transactions");
    println!("   ─────────────────────────────────────────────────────────────");

    for tx in transactions {
        let merchant = tx.merchant_name.as_deref().unwrap_or("");
        println!(
            "   {} │ \x1b[31m{:>10}\x1b[0m │ {:30} │ {}",
            tx.date,
            format!("${:.2}", tx.amount),
            truncate(&tx.title, 30),
            truncate(merchant, 20)
        );
    }

    Ok(())
}
