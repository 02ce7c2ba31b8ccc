//! Subscription command implementations

use anyhow::{Context, Result};
use chrono::NaiveDate;
use outlay_core::{
    db::Database,
    models::{DetectionMethod, NewSubscription, Subscription, SubscriptionUpdate},
};

use super::truncate;

fn print_subscription_row(sub: &Subscription) {
    let method = match sub.detection_method {
        DetectionMethod::Auto => "auto",
        DetectionMethod::Manual => "manual",
    };
    println!(
        "   {:>4} {} {:22} │ {:>9}/{:<7} │ next {} │ {}",
        sub.id,
        sub.icon,
        truncate(&sub.name, 22),
        format!("${:.2}", sub.amount),
        sub.frequency,
        sub.next_billing_date,
        method
    );
}

pub fn cmd_subscriptions_list(db: &Database, user_id: i64) -> Result<()> {
    let summary = db.list_active_subscriptions(user_id)?;

    if summary.subscriptions.is_empty() {
        println!("No subscriptions yet. Import expenses or run:");
        println!("  outlay detect");
        return Ok(());
    }

    println!();
    println!("📋 Active Subscriptions ({})", summary.count);
    println!("   ─────────────────────────────────────────────────────────────");

    for sub in &summary.subscriptions {
        print_subscription_row(sub);
    }

    println!("   ─────────────────────────────────────────────────────────────");
    println!("   Monthly total: ${:.2}", summary.total_monthly);

    Ok(())
}

pub fn cmd_subscriptions_add(db: &Database, user_id: i64, new: &NewSubscription) -> Result<()> {
    let sub = db
        .create_subscription(user_id, new)
        .context("Failed to add subscription")?;

    println!(
        "✅ Added {} {} (ID: {}) at ${:.2}/{}",
        sub.icon, sub.name, sub.id, sub.amount, sub.frequency
    );
    println!("   Next billing: {}", sub.next_billing_date);

    Ok(())
}

pub fn cmd_subscriptions_update(
    db: &Database,
    user_id: i64,
    id: i64,
    update: &SubscriptionUpdate,
) -> Result<()> {
    let sub = db
        .update_subscription(user_id, id, update)
        .with_context(|| format!("Failed to update subscription {}", id))?;

    println!("✅ Subscription updated (ID: {})", sub.id);
    print_subscription_row(&sub);
    if sub.reminder_enabled {
        println!(
            "   🔔 Reminders: {} day(s) before billing",
            sub.reminder_days_before
        );
    } else {
        println!("   🔕 Reminders: off");
    }

    Ok(())
}

pub fn cmd_subscriptions_cancel(db: &Database, user_id: i64, id: i64) -> Result<()> {
    db.cancel_subscription(user_id, id)
        .with_context(|| format!("Failed to cancel subscription {}", id))?;

    println!("✅ Subscription cancelled (ID: {})", id);
    println!("   It will come back as a new entry if the charges continue.");

    Ok(())
}

pub fn cmd_subscriptions_upcoming(
    db: &Database,
    user_id: i64,
    today: NaiveDate,
    days: i64,
) -> Result<()> {
    let upcoming = db.upcoming_subscriptions(user_id, today, days)?;

    if upcoming.is_empty() {
        println!("Nothing billing in the next {} days.", days);
        return Ok(());
    }

    println!();
    println!("📅 Billing in the next {} days", days);
    println!("   ─────────────────────────────────────────────────────────────");

    let mut total = 0.0;
    for sub in &upcoming {
        let days_until = (sub.next_billing_date - today).num_days();
        let when = match days_until {
            d if d < 0 => format!("overdue {}d", -d),
            0 => "today".to_string(),
            1 => "tomorrow".to_string(),
            d => format!("in {}d", d),
        };
        println!(
            "   {} {:22} │ {:>9} │ {} ({})",
            sub.icon,
            truncate(&sub.name, 22),
            format!("${:.2}", sub.amount),
            sub.next_billing_date,
            when
        );
        total += sub.amount;
    }

    println!("   ─────────────────────────────────────────────────────────────");
    println!("   Total due: ${:.2}", total);

    Ok(())
}

pub fn cmd_subscriptions_reminders(
    db: &Database,
    user_id: i64,
    today: NaiveDate,
    mark: bool,
) -> Result<()> {
    let due = db.due_reminders(user_id, today)?;

    if due.is_empty() {
        println!("No reminders due.");
        return Ok(());
    }

    println!();
    println!("🔔 Reminders due ({})", due.len());
    println!("   ─────────────────────────────────────────────────────────────");

    for sub in &due {
        println!(
            "   {} {} bills ${:.2} on {}",
            sub.icon, sub.name, sub.amount, sub.next_billing_date
        );
        if mark {
            db.mark_reminder_sent(user_id, sub.id, today)
                .with_context(|| format!("Failed to mark reminder for {}", sub.name))?;
        }
    }

    if mark {
        println!();
        println!("✅ Marked {} reminder(s) as sent", due.len());
    }

    Ok(())
}
