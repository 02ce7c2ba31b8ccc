//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Outlay - Find the recurring charges hiding in your spending
#[derive(Parser)]
#[command(name = "outlay")]
#[command(about = "Expense tracker with recurring-charge detection", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "outlay.db", global = true)]
    pub db: PathBuf,

    /// User whose data the command reads and writes
    #[arg(long, default_value = "1", global = true)]
    pub user: i64,

    /// Detection config file (TOML)
    ///
    /// Falls back to the per-user override in the local data directory,
    /// then to built-in defaults.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set OUTLAY_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Import expenses from a CSV or JSON file
    Import {
        /// File to import
        #[arg(short, long)]
        file: PathBuf,

        /// File format: csv, json (inferred from the extension if not specified)
        #[arg(long)]
        format: Option<String>,

        /// Where the expenses came from: manual, import, bank
        #[arg(long, default_value = "import")]
        source: String,

        /// Skip subscription detection after import
        #[arg(long)]
        no_detect: bool,
    },

    /// Detect recurring charges and save them as subscriptions
    Detect {
        /// Show what would be detected without saving anything
        #[arg(long)]
        dry_run: bool,

        /// Print detected candidates as JSON
        #[arg(long)]
        json: bool,

        /// Treat this date as today (YYYY-MM-DD)
        #[arg(long)]
        today: Option<String>,
    },

    /// Manage subscriptions
    Subscriptions {
        #[command(subcommand)]
        action: Option<SubscriptionsAction>,
    },

    /// List recent transactions
    Transactions {
        /// Maximum number of transactions to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Show database status (encryption, size, counts)
    Status,
}

#[derive(Subcommand)]
pub enum SubscriptionsAction {
    /// List active subscriptions with the monthly total
    List,

    /// Add a subscription by hand
    Add {
        /// Subscription name
        name: String,

        /// Amount charged each billing period
        amount: f64,

        /// Billing frequency: daily, weekly, monthly, yearly
        #[arg(short, long, default_value = "monthly")]
        frequency: String,

        /// Next billing date (YYYY-MM-DD)
        #[arg(long)]
        next: String,

        /// Category label
        #[arg(long)]
        category: Option<String>,

        /// Display icon
        #[arg(long)]
        icon: Option<String>,
    },

    /// Update fields of a subscription
    Update {
        /// Subscription ID
        id: i64,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        amount: Option<f64>,

        /// Billing frequency: daily, weekly, monthly, yearly
        #[arg(short, long)]
        frequency: Option<String>,

        /// Next billing date (YYYY-MM-DD)
        #[arg(long)]
        next: Option<String>,

        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        icon: Option<String>,

        /// Turn reminders on or off
        #[arg(long)]
        reminders: Option<Toggle>,

        /// Days before billing to send a reminder
        #[arg(long)]
        reminder_days: Option<i64>,
    },

    /// Cancel a subscription
    Cancel {
        /// Subscription ID
        id: i64,
    },

    /// Show subscriptions billing soon
    Upcoming {
        /// Look-ahead window in days
        #[arg(short, long, default_value = "7")]
        days: i64,

        /// Treat this date as today (YYYY-MM-DD)
        #[arg(long)]
        today: Option<String>,
    },

    /// Show subscriptions due for a reminder
    Reminders {
        /// Treat this date as today (YYYY-MM-DD)
        #[arg(long)]
        today: Option<String>,

        /// Record the reminders as sent
        #[arg(long)]
        mark: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    pub fn enabled(self) -> bool {
        matches!(self, Toggle::On)
    }
}
