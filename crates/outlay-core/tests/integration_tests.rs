//! Integration tests for outlay-core
//!
//! These tests exercise the full import → detect → sync workflow.

use chrono::{Duration, NaiveDate};
use outlay_core::{
    db::Database,
    detect::{FixedClock, SubscriptionDetector},
    ingest::{parse_csv, parse_json},
    models::{DataSource, DetectionMethod, Frequency, SubscriptionStatus},
    DetectionConfig, RecurrenceRule,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Three obvious subscriptions (Netflix, Spotify, Hulu) billed monthly,
/// one weekly meal kit, and unrelated one-off spending
fn expense_csv() -> &'static str {
    "date,title,merchant_name,category,amount
2024-01-15,Netflix,NETFLIX.COM,Entertainment,-15.49
2024-02-14,Netflix,NETFLIX.COM,Entertainment,-15.49
2024-03-15,Netflix,NETFLIX.COM,Entertainment,-15.49
2024-04-14,Netflix,NETFLIX.COM,Entertainment,-15.49
01/20/2024,Music,SPOTIFY USA,Entertainment,10.99
02/20/2024,Music,SPOTIFY USA,Entertainment,10.99
03/20/2024,Music,SPOTIFY USA,Entertainment,10.99
2024-02-01,Hulu,,Streaming Service,17.99
2024-03-02,Hulu,,Streaming Service,17.99
2024-04-01,Hulu,,Streaming Service,17.99
2024-04-01,Meal Kit,,Food,$59.94
2024-04-08,Meal Kit,,Food,$59.94
2024-04-15,Meal Kit,,Food,$59.94
2024-04-23,Meal Kit,,Food,$59.94
2024-03-03,Hardware Store,,Home,82.10
2024-04-11,Hardware Store,,Home,12.45
2024-04-05,Bookshop,,Books,24.00
"
}

fn import(db: &Database, user_id: i64) {
    let parsed = parse_csv(expense_csv().as_bytes(), DataSource::Import).unwrap();
    assert_eq!(parsed.skipped, 0);
    db.insert_transactions(user_id, &parsed.transactions).unwrap();
}

fn detector(today: NaiveDate) -> SubscriptionDetector<FixedClock> {
    SubscriptionDetector::with_clock(DetectionConfig::default(), FixedClock(today))
}

#[test]
fn test_full_import_detect_sync_workflow() {
    let db = Database::in_memory().expect("Failed to create in-memory database");
    import(&db, 1);
    assert_eq!(db.count_transactions(1).unwrap(), 17);

    let today = date(2024, 4, 30);
    let detector = detector(today);
    let since = today - Duration::days(detector.config().window_days);
    let expenses = db.list_expenses(1, since).unwrap();

    let outcome = detector.detect(&expenses);
    assert!(outcome.failures.is_empty());

    let mut names: Vec<&str> = outcome.candidates.iter().map(|c| c.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["Hulu", "Meal Kit", "NETFLIX.COM", "SPOTIFY USA"]);

    let meal_kit = outcome
        .candidates
        .iter()
        .find(|c| c.name == "Meal Kit")
        .unwrap();
    assert_eq!(meal_kit.frequency, Frequency::Weekly);
    assert_eq!(meal_kit.next_billing_date, date(2024, 4, 30));
    assert_eq!(meal_kit.total_spent, 239.76);

    let hulu = outcome.candidates.iter().find(|c| c.name == "Hulu").unwrap();
    assert_eq!(hulu.merchant_name, None);
    assert_eq!(hulu.category, "Streaming Service");
    assert_eq!(hulu.icon, "📺");

    let result = db.sync_detected_subscriptions(1, &outcome.candidates).unwrap();
    assert_eq!(result.detected, 4);
    assert_eq!(result.saved, 4);

    let summary = db.list_active_subscriptions(1).unwrap();
    assert_eq!(summary.count, 4);
    assert!(summary
        .subscriptions
        .iter()
        .all(|s| s.detection_method == DetectionMethod::Auto));
    assert!(summary
        .subscriptions
        .windows(2)
        .all(|w| w[0].next_billing_date <= w[1].next_billing_date));
}

#[test]
fn test_reimport_and_redetect_is_idempotent() {
    let db = Database::in_memory().unwrap();
    import(&db, 1);

    // Second import of the same file inserts nothing
    let parsed = parse_csv(expense_csv().as_bytes(), DataSource::Import).unwrap();
    let counts = db.insert_transactions(1, &parsed.transactions).unwrap();
    assert_eq!(counts.inserted, 0);
    assert_eq!(counts.duplicates, 17);

    let detector = detector(date(2024, 4, 30));
    let expenses = db.list_expenses(1, date(2024, 1, 1)).unwrap();

    let first = detector.detect(&expenses);
    db.sync_detected_subscriptions(1, &first.candidates).unwrap();
    let ids_before: Vec<i64> = db
        .list_active_subscriptions(1)
        .unwrap()
        .subscriptions
        .iter()
        .map(|s| s.id)
        .collect();

    let second = detector.detect(&expenses);
    db.sync_detected_subscriptions(1, &second.candidates).unwrap();
    let ids_after: Vec<i64> = db
        .list_active_subscriptions(1)
        .unwrap()
        .subscriptions
        .iter()
        .map(|s| s.id)
        .collect();

    assert_eq!(ids_before, ids_after);
}

#[test]
fn test_window_excludes_stale_history() {
    let db = Database::in_memory().unwrap();
    import(&db, 1);

    // 120 days before 2024-08-01 is 2024-04-03: Netflix keeps a single charge
    // and the first meal kit delivery drops out
    let detector = detector(date(2024, 8, 1));
    let expenses = db.list_expenses(1, date(2020, 1, 1)).unwrap();
    let outcome = detector.detect(&expenses);

    let names: Vec<&str> = outcome.candidates.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Meal Kit"]);
    assert_eq!(outcome.candidates[0].occurrence_count, 3);
}

#[test]
fn test_json_import_with_epoch_dates() {
    let db = Database::in_memory().unwrap();
    let day_ms = 86_400_000_i64;
    // 2024-01-01T00:00:00Z
    let start = 1_704_067_200_000_i64;
    let json = format!(
        r#"[
            {{"date": {}, "title": "Gym Membership", "amount": 45}},
            {{"date": {}, "title": "Gym Membership", "amount": "45.00"}},
            {{"date": {}, "title": "Gym Membership", "amount": 45.0}}
        ]"#,
        start,
        start + 30 * day_ms,
        start + 60 * day_ms
    );

    let parsed = parse_json(json.as_bytes(), DataSource::Bank).unwrap();
    assert_eq!(parsed.transactions.len(), 3);
    let counts = db.insert_transactions(1, &parsed.transactions).unwrap();
    assert_eq!(counts.inserted, 3);

    let expenses = db.list_expenses(1, date(2024, 1, 1)).unwrap();
    let outcome = detector(date(2024, 3, 15)).detect(&expenses);
    assert_eq!(outcome.candidates.len(), 1);

    let gym = &outcome.candidates[0];
    assert_eq!(gym.frequency, Frequency::Monthly);
    assert_eq!(gym.next_billing_date, date(2024, 3, 31));
    assert_eq!(gym.icon, "💪");

    let transactions = db.list_transactions(1, 10).unwrap();
    assert!(transactions.iter().all(|t| t.data_source == DataSource::Bank));
}

#[test]
fn test_cancelled_subscription_stays_cancelled_until_redetected() {
    let db = Database::in_memory().unwrap();
    import(&db, 1);

    let detector = detector(date(2024, 4, 30));
    let expenses = db.list_expenses(1, date(2024, 1, 1)).unwrap();
    let outcome = detector.detect(&expenses);
    let synced = db.sync_detected_subscriptions(1, &outcome.candidates).unwrap();

    let hulu = synced
        .subscriptions
        .iter()
        .find(|s| s.name == "Hulu")
        .unwrap();
    db.cancel_subscription(1, hulu.id).unwrap();
    assert_eq!(db.list_active_subscriptions(1).unwrap().count, 3);

    let cancelled = db.get_subscription(hulu.id).unwrap().unwrap();
    assert_eq!(cancelled.status, SubscriptionStatus::Cancelled);

    // Detection recreates an active record; the cancelled one is kept as history
    db.sync_detected_subscriptions(1, &outcome.candidates).unwrap();
    assert_eq!(db.list_active_subscriptions(1).unwrap().count, 4);
    assert_eq!(
        db.count_subscriptions(1, SubscriptionStatus::Cancelled)
            .unwrap(),
        1
    );
}

#[test]
fn test_same_day_charges_with_distinct_ids_are_kept() {
    let db = Database::in_memory().unwrap();
    let json = r#"[
        {"id": 101, "date": "2024-03-01", "title": "Cloud Storage", "amount": 2.99},
        {"id": 102, "date": "2024-03-01", "title": "Cloud Storage", "amount": 2.99}
    ]"#;

    let parsed = parse_json(json.as_bytes(), DataSource::Bank).unwrap();
    let counts = db.insert_transactions(1, &parsed.transactions).unwrap();
    assert_eq!(counts.inserted, 2);
    assert_eq!(counts.duplicates, 0);

    // The same export again changes nothing
    let again = db.insert_transactions(1, &parsed.transactions).unwrap();
    assert_eq!(again.inserted, 0);
    assert_eq!(again.duplicates, 2);

    let expenses = db.list_expenses(1, date(2024, 1, 1)).unwrap();
    let config = DetectionConfig::default();
    let groups = outlay_core::detect::group(&expenses);
    let storage = &groups["cloud storage"];
    let stats = outlay_core::detect::analyze(storage);
    let verdict = outlay_core::detect::classify(storage, &stats, &config);
    assert_eq!(verdict.rule, Some(RecurrenceRule::SameDay));

    let outcome = detector(date(2024, 3, 15)).detect(&expenses);
    assert_eq!(outcome.candidates.len(), 1);
    let candidate = &outcome.candidates[0];
    assert_eq!(candidate.occurrence_count, 2);
    assert_eq!(candidate.total_spent, 5.98);
    assert_eq!(candidate.next_billing_date, date(2024, 3, 31));
}

#[test]
fn test_repeated_csv_rows_import_as_separate_charges() {
    let db = Database::in_memory().unwrap();
    let csv = "date,title,amount
2024-03-01,Parking,3.00
2024-03-01,Parking,3.00
";
    let parsed = parse_csv(csv.as_bytes(), DataSource::Import).unwrap();
    assert_eq!(db.insert_transactions(1, &parsed.transactions).unwrap().inserted, 2);

    let reparsed = parse_csv(csv.as_bytes(), DataSource::Import).unwrap();
    let counts = db.insert_transactions(1, &reparsed.transactions).unwrap();
    assert_eq!(counts.inserted, 0);
    assert_eq!(counts.duplicates, 2);
    assert_eq!(db.count_transactions(1).unwrap(), 2);
}
