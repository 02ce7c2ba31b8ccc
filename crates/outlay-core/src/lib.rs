//! Outlay Core Library
//!
//! Shared functionality for the Outlay expense tracker:
//! - Database access and migrations
//! - CSV/JSON expense ingestion
//! - Subscription (recurring charge) detection
//! - Detection configuration

pub mod config;
pub mod db;
pub mod detect;
pub mod error;
pub mod ingest;
pub mod models;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::DetectionConfig;
pub use db::{Database, InsertCounts};
pub use detect::{
    Clock, DetectionFailure, DetectionOutcome, FixedClock, RecurrenceRule, RecurrenceVerdict,
    SubscriptionDetector, SystemClock,
};
pub use error::{Error, Result};
pub use ingest::{ImportFormat, ParsedImport, RawTransaction};
pub use models::*;
