//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Core commands (init, detect, status) and shared utilities (open_db)
//! - `import` - CSV/JSON expense import
//! - `subscriptions` - Subscription management commands
//! - `transactions` - Transaction listing

pub mod core;
pub mod import;
pub mod subscriptions;
pub mod transactions;

// Re-export command functions for main.rs
pub use core::*;
pub use import::*;
pub use subscriptions::*;
pub use transactions::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
