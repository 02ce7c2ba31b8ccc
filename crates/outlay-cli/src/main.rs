//! Outlay CLI - Expense tracker with recurring-charge detection
//!
//! Usage:
//!   outlay init                   Initialize database
//!   outlay import --file CSV      Import expenses (CSV or JSON)
//!   outlay detect                 Detect subscriptions
//!   outlay subscriptions list     Show active subscriptions

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use outlay_core::models::{NewSubscription, SubscriptionUpdate};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Status => commands::cmd_status(&cli.db, cli.user, cli.no_encrypt),
        Commands::Import {
            file,
            format,
            source,
            no_detect,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let options = commands::ImportOptions {
                format: format.as_deref(),
                source: &source,
                detect: !no_detect,
                config_path,
            };
            commands::cmd_import(&db, cli.user, &file, &options)
        }
        Commands::Detect {
            dry_run,
            json,
            today,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let options = commands::DetectOptions {
                dry_run,
                json,
                today: commands::parse_today(today.as_deref())?,
                config_path,
            };
            commands::cmd_detect(&db, cli.user, &options)
        }
        Commands::Subscriptions { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action.unwrap_or(SubscriptionsAction::List) {
                SubscriptionsAction::List => commands::cmd_subscriptions_list(&db, cli.user),
                SubscriptionsAction::Add {
                    name,
                    amount,
                    frequency,
                    next,
                    category,
                    icon,
                } => {
                    let new = NewSubscription {
                        name,
                        amount,
                        frequency: commands::parse_frequency(&frequency)?,
                        next_billing_date: commands::parse_date_arg(&next, "--next")?,
                        category,
                        icon,
                    };
                    commands::cmd_subscriptions_add(&db, cli.user, &new)
                }
                SubscriptionsAction::Update {
                    id,
                    name,
                    amount,
                    frequency,
                    next,
                    category,
                    icon,
                    reminders,
                    reminder_days,
                } => {
                    let update = SubscriptionUpdate {
                        name,
                        amount,
                        frequency: frequency
                            .as_deref()
                            .map(commands::parse_frequency)
                            .transpose()?,
                        next_billing_date: next
                            .as_deref()
                            .map(|s| commands::parse_date_arg(s, "--next"))
                            .transpose()?,
                        category,
                        icon,
                        reminder_enabled: reminders.map(Toggle::enabled),
                        reminder_days_before: reminder_days,
                    };
                    commands::cmd_subscriptions_update(&db, cli.user, id, &update)
                }
                SubscriptionsAction::Cancel { id } => {
                    commands::cmd_subscriptions_cancel(&db, cli.user, id)
                }
                SubscriptionsAction::Upcoming { days, today } => {
                    let today = commands::parse_today(today.as_deref())?;
                    commands::cmd_subscriptions_upcoming(&db, cli.user, today, days)
                }
                SubscriptionsAction::Reminders { today, mark } => {
                    let today = commands::parse_today(today.as_deref())?;
                    commands::cmd_subscriptions_reminders(&db, cli.user, today, mark)
                }
            }
        }
        Commands::Transactions { limit } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_transactions_list(&db, cli.user, limit)
        }
    }
}
