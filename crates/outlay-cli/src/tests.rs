//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use outlay_core::db::Database;
use outlay_core::models::{Frequency, NewSubscription, SubscriptionStatus, SubscriptionUpdate};
use tempfile::TempDir;

use crate::commands::{self, truncate, DetectOptions, ImportOptions};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn setup_test_db(dir: &TempDir) -> (PathBuf, Database) {
    let path = dir.path().join("outlay.db");
    let db = commands::open_db(&path, true).unwrap();
    (path, db)
}

fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

const STATEMENT_CSV: &str = "date,title,merchant_name,category,amount
2024-01-10,Streaming,NETFLIX.COM,Entertainment,-15.49
2024-02-09,Streaming,NETFLIX.COM,Entertainment,-15.49
2024-03-10,Streaming,NETFLIX.COM,Entertainment,-15.49
2024-02-20,Lunch,Corner Cafe,Food,12.40
2024-03-20,Lunch,Corner Cafe,Food,31.75
";

fn import_options(config_path: Option<&Path>) -> ImportOptions<'_> {
    ImportOptions {
        format: None,
        source: "import",
        detect: false,
        config_path,
    }
}

fn detect_options(today: NaiveDate, dry_run: bool) -> DetectOptions<'static> {
    DetectOptions {
        dry_run,
        json: false,
        today,
        config_path: None,
    }
}

// ========== Helper Tests ==========

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("exactly10!", 10), "exactly10!");
    assert_eq!(truncate("this is too long", 10), "this is...");
}

#[test]
fn test_truncate_multibyte() {
    assert_eq!(truncate("Café Crème Brûlée", 8), "Café ...");
}

#[test]
fn test_parse_date_arg() {
    assert_eq!(
        commands::parse_date_arg("2024-03-15", "--next").unwrap(),
        date(2024, 3, 15)
    );
    let err = commands::parse_date_arg("03/15/2024", "--next").unwrap_err();
    assert!(err.to_string().contains("--next"));
}

#[test]
fn test_parse_today_explicit() {
    assert_eq!(
        commands::parse_today(Some("2024-05-01")).unwrap(),
        date(2024, 5, 1)
    );
    assert!(commands::parse_today(Some("yesterday")).is_err());
}

#[test]
fn test_parse_frequency() {
    assert_eq!(commands::parse_frequency("weekly").unwrap(), Frequency::Weekly);
    assert_eq!(commands::parse_frequency("Annual").unwrap(), Frequency::Yearly);
    assert!(commands::parse_frequency("fortnightly").is_err());
}

// ========== Core Command Tests ==========

#[test]
fn test_cmd_init_creates_database() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fresh.db");

    commands::cmd_init(&path, true).unwrap();
    assert!(path.exists());

    let db = commands::open_db(&path, true).unwrap();
    assert!(!db.is_encrypted());
    assert_eq!(db.count_transactions(1).unwrap(), 0);
}

#[test]
fn test_cmd_status_without_database() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing.db");

    commands::cmd_status(&path, 1, true).unwrap();
    assert!(!path.exists());
}

#[test]
fn test_cmd_status_with_database() {
    let dir = TempDir::new().unwrap();
    let (path, _db) = setup_test_db(&dir);
    assert!(commands::cmd_status(&path, 1, true).is_ok());
}

// ========== Import Command Tests ==========

#[test]
fn test_import_file_csv_and_dedupe() {
    let dir = TempDir::new().unwrap();
    let (_path, db) = setup_test_db(&dir);
    let file = write_file(&dir, "statement.csv", STATEMENT_CSV);

    let first = commands::import_file(&db, 1, &file, &import_options(None)).unwrap();
    assert_eq!(first.counts.inserted, 5);
    assert_eq!(first.counts.duplicates, 0);
    assert_eq!(first.skipped, 0);

    let second = commands::import_file(&db, 1, &file, &import_options(None)).unwrap();
    assert_eq!(second.counts.inserted, 0);
    assert_eq!(second.counts.duplicates, 5);

    assert_eq!(db.count_transactions(1).unwrap(), 5);
}

#[test]
fn test_import_file_explicit_json_format() {
    let dir = TempDir::new().unwrap();
    let (_path, db) = setup_test_db(&dir);
    let file = write_file(
        &dir,
        "export.txt",
        r#"[{"date": "2024-01-05", "title": "Gym", "amount": "45.00"}]"#,
    );

    // Extension says nothing, so the format must be explicit
    assert!(commands::import_file(&db, 1, &file, &import_options(None)).is_err());

    let options = ImportOptions {
        format: Some("json"),
        source: "bank",
        detect: false,
        config_path: None,
    };
    let report = commands::import_file(&db, 1, &file, &options).unwrap();
    assert_eq!(report.counts.inserted, 1);
}

#[test]
fn test_import_file_rejects_unknown_source() {
    let dir = TempDir::new().unwrap();
    let (_path, db) = setup_test_db(&dir);
    let file = write_file(&dir, "statement.csv", STATEMENT_CSV);

    let options = ImportOptions {
        format: None,
        source: "carrier-pigeon",
        detect: false,
        config_path: None,
    };
    assert!(commands::import_file(&db, 1, &file, &options).is_err());
    assert_eq!(db.count_transactions(1).unwrap(), 0);
}

#[test]
fn test_import_missing_file() {
    let dir = TempDir::new().unwrap();
    let (_path, db) = setup_test_db(&dir);
    let missing = dir.path().join("nope.csv");
    assert!(commands::import_file(&db, 1, &missing, &import_options(None)).is_err());
}

// ========== Detect Command Tests ==========

#[test]
fn test_run_detection_dry_run_saves_nothing() {
    let dir = TempDir::new().unwrap();
    let (_path, db) = setup_test_db(&dir);
    let file = write_file(&dir, "statement.csv", STATEMENT_CSV);
    commands::import_file(&db, 1, &file, &import_options(None)).unwrap();

    let report = commands::run_detection(&db, 1, &detect_options(date(2024, 3, 31), true)).unwrap();
    assert_eq!(report.detected, 1);
    assert_eq!(report.saved, 0);
    assert_eq!(report.candidates[0].name, "NETFLIX.COM");
    assert_eq!(db.list_active_subscriptions(1).unwrap().count, 0);
}

#[test]
fn test_run_detection_syncs_subscriptions() {
    let dir = TempDir::new().unwrap();
    let (_path, db) = setup_test_db(&dir);
    let file = write_file(&dir, "statement.csv", STATEMENT_CSV);
    commands::import_file(&db, 1, &file, &import_options(None)).unwrap();

    let report =
        commands::run_detection(&db, 1, &detect_options(date(2024, 3, 31), false)).unwrap();
    assert_eq!(report.detected, 1);
    assert_eq!(report.saved, 1);
    assert!(report.failures.is_empty());

    let summary = db.list_active_subscriptions(1).unwrap();
    assert_eq!(summary.count, 1);
    assert_eq!(summary.subscriptions[0].frequency, Frequency::Monthly);
    assert_eq!(summary.total_monthly, 15.49);

    // Another user sees nothing
    assert_eq!(db.list_active_subscriptions(2).unwrap().count, 0);
}

#[test]
fn test_run_detection_uses_config_file() {
    let dir = TempDir::new().unwrap();
    let (_path, db) = setup_test_db(&dir);
    let file = write_file(&dir, "statement.csv", STATEMENT_CSV);
    commands::import_file(&db, 1, &file, &import_options(None)).unwrap();

    // A 30-day window keeps a single Netflix charge, which is not enough to group
    let config = write_file(&dir, "detection.toml", "[detection]\nwindow_days = 30\n");
    let options = DetectOptions {
        dry_run: true,
        json: false,
        today: date(2024, 3, 31),
        config_path: Some(&config),
    };
    let report = commands::run_detection(&db, 1, &options).unwrap();
    assert_eq!(report.detected, 0);
}

#[test]
fn test_run_detection_missing_config_file() {
    let dir = TempDir::new().unwrap();
    let (_path, db) = setup_test_db(&dir);
    let missing = dir.path().join("absent.toml");
    let options = DetectOptions {
        dry_run: true,
        json: false,
        today: date(2024, 3, 31),
        config_path: Some(&missing),
    };
    assert!(commands::run_detection(&db, 1, &options).is_err());
}

#[test]
fn test_cmd_detect_json_output() {
    let dir = TempDir::new().unwrap();
    let (_path, db) = setup_test_db(&dir);
    let options = DetectOptions {
        dry_run: true,
        json: true,
        today: date(2024, 3, 31),
        config_path: None,
    };
    assert!(commands::cmd_detect(&db, 1, &options).is_ok());
}

#[test]
fn test_cmd_import_with_detection() {
    let dir = TempDir::new().unwrap();
    let (_path, db) = setup_test_db(&dir);
    let file = write_file(&dir, "statement.csv", STATEMENT_CSV);

    let options = ImportOptions {
        detect: true,
        ..import_options(None)
    };
    assert!(commands::cmd_import(&db, 1, &file, &options).is_ok());
    assert_eq!(db.count_transactions(1).unwrap(), 5);
}

// ========== Subscription Command Tests ==========

fn add_manual(db: &Database, name: &str, amount: f64, next: NaiveDate) -> i64 {
    let new = NewSubscription {
        name: name.to_string(),
        amount,
        frequency: Frequency::Monthly,
        next_billing_date: next,
        category: None,
        icon: None,
    };
    commands::cmd_subscriptions_add(db, 1, &new).unwrap();
    db.list_active_subscriptions(1)
        .unwrap()
        .subscriptions
        .into_iter()
        .find(|s| s.name == name)
        .unwrap()
        .id
}

#[test]
fn test_cmd_subscriptions_list_empty() {
    let dir = TempDir::new().unwrap();
    let (_path, db) = setup_test_db(&dir);
    assert!(commands::cmd_subscriptions_list(&db, 1).is_ok());
}

#[test]
fn test_cmd_subscriptions_add_and_list() {
    let dir = TempDir::new().unwrap();
    let (_path, db) = setup_test_db(&dir);

    add_manual(&db, "Newspaper", 12.0, date(2024, 4, 1));
    assert!(commands::cmd_subscriptions_list(&db, 1).is_ok());

    let summary = db.list_active_subscriptions(1).unwrap();
    assert_eq!(summary.count, 1);
    assert_eq!(summary.subscriptions[0].category, "Subscription");
}

#[test]
fn test_cmd_subscriptions_add_duplicate_fails() {
    let dir = TempDir::new().unwrap();
    let (_path, db) = setup_test_db(&dir);

    add_manual(&db, "Newspaper", 12.0, date(2024, 4, 1));
    let again = NewSubscription {
        name: "Newspaper".to_string(),
        amount: 9.0,
        frequency: Frequency::Monthly,
        next_billing_date: date(2024, 4, 1),
        category: None,
        icon: None,
    };
    assert!(commands::cmd_subscriptions_add(&db, 1, &again).is_err());
}

#[test]
fn test_cmd_subscriptions_update() {
    let dir = TempDir::new().unwrap();
    let (_path, db) = setup_test_db(&dir);
    let id = add_manual(&db, "Newspaper", 12.0, date(2024, 4, 1));

    let update = SubscriptionUpdate {
        amount: Some(14.0),
        reminder_enabled: Some(false),
        ..Default::default()
    };
    commands::cmd_subscriptions_update(&db, 1, id, &update).unwrap();

    let sub = db.get_subscription(id).unwrap().unwrap();
    assert_eq!(sub.amount, 14.0);
    assert!(!sub.reminder_enabled);
    assert_eq!(sub.name, "Newspaper");
}

#[test]
fn test_cmd_subscriptions_update_other_user_fails() {
    let dir = TempDir::new().unwrap();
    let (_path, db) = setup_test_db(&dir);
    let id = add_manual(&db, "Newspaper", 12.0, date(2024, 4, 1));

    let update = SubscriptionUpdate {
        amount: Some(1.0),
        ..Default::default()
    };
    assert!(commands::cmd_subscriptions_update(&db, 2, id, &update).is_err());
}

#[test]
fn test_cmd_subscriptions_cancel() {
    let dir = TempDir::new().unwrap();
    let (_path, db) = setup_test_db(&dir);
    let id = add_manual(&db, "Newspaper", 12.0, date(2024, 4, 1));

    commands::cmd_subscriptions_cancel(&db, 1, id).unwrap();
    let sub = db.get_subscription(id).unwrap().unwrap();
    assert_eq!(sub.status, SubscriptionStatus::Cancelled);

    assert!(commands::cmd_subscriptions_cancel(&db, 1, 9999).is_err());
}

#[test]
fn test_cmd_subscriptions_upcoming() {
    let dir = TempDir::new().unwrap();
    let (_path, db) = setup_test_db(&dir);
    add_manual(&db, "Soon", 5.0, date(2024, 4, 3));
    add_manual(&db, "Later", 5.0, date(2024, 5, 30));

    assert!(commands::cmd_subscriptions_upcoming(&db, 1, date(2024, 4, 1), 7).is_ok());
    let upcoming = db.upcoming_subscriptions(1, date(2024, 4, 1), 7).unwrap();
    assert_eq!(upcoming.len(), 1);
    assert_eq!(upcoming[0].name, "Soon");
}

#[test]
fn test_cmd_subscriptions_upcoming_huge_horizon_fails() {
    let dir = TempDir::new().unwrap();
    let (_path, db) = setup_test_db(&dir);
    add_manual(&db, "Soon", 5.0, date(2024, 4, 3));

    assert!(commands::cmd_subscriptions_upcoming(&db, 1, date(2024, 4, 1), i64::MAX).is_err());
}

#[test]
fn test_cmd_subscriptions_reminders_mark() {
    let dir = TempDir::new().unwrap();
    let (_path, db) = setup_test_db(&dir);
    // Default reminder lead time is 3 days
    add_manual(&db, "Soon", 5.0, date(2024, 4, 3));

    let today = date(2024, 4, 1);
    assert_eq!(db.due_reminders(1, today).unwrap().len(), 1);

    commands::cmd_subscriptions_reminders(&db, 1, today, false).unwrap();
    assert_eq!(db.due_reminders(1, today).unwrap().len(), 1);

    commands::cmd_subscriptions_reminders(&db, 1, today, true).unwrap();
    assert!(db.due_reminders(1, today).unwrap().is_empty());
}

// ========== Transaction Command Tests ==========

#[test]
fn test_cmd_transactions_list() {
    let dir = TempDir::new().unwrap();
    let (_path, db) = setup_test_db(&dir);
    assert!(commands::cmd_transactions_list(&db, 1, 10).is_ok());

    let file = write_file(&dir, "statement.csv", STATEMENT_CSV);
    commands::import_file(&db, 1, &file, &import_options(None)).unwrap();
    assert!(commands::cmd_transactions_list(&db, 1, 3).is_ok());
    assert_eq!(db.list_transactions(1, 3).unwrap().len(), 3);
}
