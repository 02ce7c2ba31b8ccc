//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `parse_today`, `parse_date_arg`, `parse_frequency` - Argument parsing helpers
//! - `cmd_init` - Initialize the database
//! - `cmd_detect` - Run subscription detection and sync the results
//! - `cmd_status` - Show database status

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use outlay_core::{
    db::{Database, DB_KEY_ENV},
    models::{Frequency, SubscriptionCandidate, SubscriptionStatus},
    Clock, DetectionConfig, FixedClock, SubscriptionDetector, SystemClock,
};
use serde::Serialize;

use super::truncate;

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    if no_encrypt {
        Database::open_unencrypted(db_path).context("Failed to open database (unencrypted)")
    } else {
        Database::open_from_env(db_path).context("Failed to open database")
    }
}

/// Resolve `--today`, defaulting to the current UTC date
pub fn parse_today(today: Option<&str>) -> Result<NaiveDate> {
    match today {
        Some(s) => parse_date_arg(s, "--today"),
        None => Ok(SystemClock.today()),
    }
}

pub fn parse_date_arg(s: &str, flag: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid {} date '{}' (use YYYY-MM-DD)", flag, s))
}

pub fn parse_frequency(s: &str) -> Result<Frequency> {
    s.parse::<Frequency>().map_err(|e| anyhow::anyhow!(e))
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path, no_encrypt)?;

    if !db.is_encrypted() {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Import expenses: outlay import --file statement.csv");
    println!("  2. Review subscriptions: outlay subscriptions list");

    Ok(())
}

/// Options for a detection run
pub struct DetectOptions<'a> {
    /// Report candidates without saving them
    pub dry_run: bool,
    /// Print candidates as JSON instead of the human summary
    pub json: bool,
    pub today: NaiveDate,
    pub config_path: Option<&'a Path>,
}

/// Summary of one detection run
#[derive(Debug, Serialize)]
pub struct DetectReport {
    pub detected: usize,
    pub saved: usize,
    pub candidates: Vec<SubscriptionCandidate>,
    pub failures: Vec<FailureReport>,
}

#[derive(Debug, Serialize)]
pub struct FailureReport {
    pub merchant: String,
    pub error: String,
}

/// Run the detection pipeline over a user's expenses and sync the results
pub fn run_detection(db: &Database, user_id: i64, options: &DetectOptions) -> Result<DetectReport> {
    let config =
        DetectionConfig::load(options.config_path).context("Failed to load detection config")?;
    let detector = SubscriptionDetector::with_clock(config, FixedClock(options.today));
    let since = detector.window_start();

    let expenses = db
        .list_expenses(user_id, since)
        .context("Failed to load expenses")?;
    let outcome = detector.detect(&expenses);

    let saved = if options.dry_run {
        0
    } else {
        db.sync_detected_subscriptions(user_id, &outcome.candidates)
            .context("Failed to save subscriptions")?
            .saved
    };

    Ok(DetectReport {
        detected: outcome.candidates.len(),
        saved,
        candidates: outcome.candidates,
        failures: outcome
            .failures
            .into_iter()
            .map(|f| FailureReport {
                merchant: f.merchant,
                error: f.error.to_string(),
            })
            .collect(),
    })
}

pub fn cmd_detect(db: &Database, user_id: i64, options: &DetectOptions) -> Result<()> {
    if !options.json {
        println!("🔍 Running subscription detection...");
        if options.dry_run {
            println!("   Mode: Dry run (nothing will be saved)");
        }
    }

    let report = run_detection(db, user_id, options)?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_detect_report(&report);
    Ok(())
}

pub fn print_detect_report(report: &DetectReport) {
    println!();
    println!("📊 Detection Results");
    println!("   ─────────────────────────────");
    println!("   Subscriptions detected: {}", report.detected);
    println!("   Subscriptions saved: {}", report.saved);

    for candidate in &report.candidates {
        println!(
            "   {} {:24} │ {:>9} │ {:<7} │ next {}",
            candidate.icon,
            truncate(&candidate.name, 24),
            format!("${:.2}", candidate.amount),
            candidate.frequency,
            candidate.next_billing_date
        );
    }

    if !report.failures.is_empty() {
        println!();
        println!("⚠️  {} merchant(s) could not be processed:", report.failures.len());
        for failure in &report.failures {
            println!("   {} │ {}", truncate(&failure.merchant, 24), failure.error);
        }
    }

    if report.detected == 0 {
        println!();
        println!("✅ No recurring charges found.");
    }
}

pub fn cmd_status(db_path: &Path, user_id: i64, no_encrypt: bool) -> Result<()> {
    use std::fs;

    println!();
    println!("📊 Outlay Status");
    println!("   ─────────────────────────────────────────────────────────────");

    println!("   Database: {}", db_path.display());

    if db_path.exists() {
        if let Ok(metadata) = fs::metadata(db_path) {
            let size_kb = metadata.len() as f64 / 1024.0;
            if size_kb < 1024.0 {
                println!("   Size: {:.1} KB", size_kb);
            } else {
                println!("   Size: {:.1} MB", size_kb / 1024.0);
            }
        }
    } else {
        println!("   Size: (database not initialized)");
    }

    let has_key = std::env::var(DB_KEY_ENV).is_ok();
    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else if has_key {
        println!("   🔒 Encryption: ENABLED ({}=***)", DB_KEY_ENV);
    } else {
        println!("   ❌ Encryption: REQUIRED but {} not set", DB_KEY_ENV);
    }

    if db_path.exists() {
        match open_db(db_path, no_encrypt) {
            Ok(db) => {
                let transactions = db.count_transactions(user_id)?;
                let active = db.count_subscriptions(user_id, SubscriptionStatus::Active)?;
                let cancelled = db.count_subscriptions(user_id, SubscriptionStatus::Cancelled)?;
                println!();
                if db.is_encrypted() {
                    println!("   🔓 Unlocked with passphrase");
                }
                println!("   User: {}", user_id);
                println!("   Transactions: {}", transactions);
                println!("   Active subscriptions: {}", active);
                println!("   Cancelled subscriptions: {}", cancelled);
            }
            Err(e) => {
                println!();
                println!("   ❌ Error opening database: {}", e);
                if !no_encrypt && !has_key {
                    println!("      Set {} or use --no-encrypt", DB_KEY_ENV);
                } else if has_key {
                    println!("      (Check if {} is correct)", DB_KEY_ENV);
                }
            }
        }
    }

    println!();
    Ok(())
}
