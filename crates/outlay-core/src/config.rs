//! Detection configuration
//!
//! Every tunable of the subscription detector lives in [`DetectionConfig`]:
//! the trailing window, the amount-variance ceiling, the keyword vocabulary
//! used by the lexical signal, the category hints, and the cosmetic icon table.
//!
//! ## Configuration Resolution
//!
//! 1. An explicit path (`--config`), which must exist
//! 2. An override in the data dir (~/.local/share/outlay/config/detection.toml)
//! 3. Built-in defaults
//!
//! Keys missing from a file keep their default value.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Upper bound on the detection window (about 100 years)
const MAX_WINDOW_DAYS: i64 = 36_500;

/// Well-known recurring services, utilities and billing terms
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "netflix", "spotify", "amazon prime", "hulu", "disney+", "apple music",
    "youtube premium", "linkedin", "adobe", "microsoft", "google one",
    "dropbox", "icloud", "github", "chatgpt", "canva", "grammarly",
    "gym", "fitness", "insurance", "rent", "mortgage", "phone", "internet",
    "electricity", "water", "gas", "subscription", "aws", "azure", "stripe",
    "twitch", "crunchyroll", "paramount", "apple tv", "max", "peacock",
    "notion", "figma", "slack", "asana", "jira", "confluence",
    "monthly", "recurring", "membership", "plan", "premium", "pro",
    "wix", "shopify", "squarespace", "weebly", "newsletter", "substack",
    "patreon", "onlyfans", "audible", "scribd", "masterclass",
    "cable", "wifi", "broadband", "vpn", "cloud", "storage",
    "bill", "charge", "verizon", "att", "comcast", "spectrum",
    "heating", "cooling", "utility", "waste", "trash", "recycling",
];

/// Words that mark a charge as explicitly recurring
pub const DEFAULT_RECURRENCE_WORDS: &[&str] =
    &["recurring", "daily", "weekly", "monthly", "yearly", "annual"];

/// Category substrings that suggest a subscription
pub const DEFAULT_CATEGORY_HINTS: &[&str] = &["subscription", "service", "membership"];

/// Keyword → icon lookup, checked in order
pub const DEFAULT_ICONS: &[(&str, &str)] = &[
    ("netflix", "🎬"),
    ("spotify", "🎵"),
    ("amazon", "📦"),
    ("hulu", "📺"),
    ("disney", "🏰"),
    ("apple", "🍎"),
    ("youtube", "▶️"),
    ("gym", "💪"),
    ("fitness", "🏋️"),
    ("rent", "🏠"),
    ("insurance", "🛡️"),
    ("phone", "📱"),
    ("internet", "🌐"),
    ("electricity", "⚡"),
    ("water", "💧"),
    ("gas", "🔥"),
];

/// Subscription detection configuration
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// Trailing window of history considered per run (days)
    pub window_days: i64,
    /// Maximum (max - min) / min spread, in percent, for amounts to count as similar
    pub max_amount_variance_pct: f64,
    /// Lexical signal vocabulary (lower-case substrings)
    pub keywords: Vec<String>,
    /// Explicit recurrence words (lower-case substrings)
    pub recurrence_words: Vec<String>,
    /// Category signal substrings
    pub category_hints: Vec<String>,
    /// Category used when the earliest expense has none
    pub default_category: String,
    /// Icon used when no keyword matches
    pub default_icon: String,
    /// Ordered keyword → icon table
    pub icons: Vec<(String, String)>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            window_days: 120,
            max_amount_variance_pct: 25.0,
            keywords: to_strings(DEFAULT_KEYWORDS),
            recurrence_words: to_strings(DEFAULT_RECURRENCE_WORDS),
            category_hints: to_strings(DEFAULT_CATEGORY_HINTS),
            default_category: "Subscription".to_string(),
            default_icon: "💳".to_string(),
            icons: DEFAULT_ICONS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl DetectionConfig {
    /// Load configuration, resolving an explicit path, then the data-dir override,
    /// then built-in defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            return Self::from_file(path);
        }

        match default_config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        debug!("Loading detection config from {}", path.display());
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML content
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

        let mut config = Self::default();

        if let Some(detection) = raw.detection {
            if let Some(days) = detection.window_days {
                config.window_days = days;
            }
            if let Some(pct) = detection.max_amount_variance_pct {
                config.max_amount_variance_pct = pct;
            }
        }

        if let Some(signals) = raw.signals {
            if let Some(keywords) = signals.keywords {
                config.keywords = lowercase_all(keywords);
            }
            if let Some(extra) = signals.extra_keywords {
                config.keywords.extend(lowercase_all(extra));
            }
            if let Some(words) = signals.recurrence_words {
                config.recurrence_words = lowercase_all(words);
            }
            if let Some(hints) = signals.category_hints {
                config.category_hints = lowercase_all(hints);
            }
        }

        if let Some(display) = raw.display {
            if let Some(category) = display.default_category {
                config.default_category = category;
            }
            if let Some(icon) = display.default_icon {
                config.default_icon = icon;
            }
            if let Some(icons) = display.icons {
                config.icons = icons
                    .into_iter()
                    .map(|i| (i.keyword.to_lowercase(), i.icon))
                    .collect();
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(1..=MAX_WINDOW_DAYS).contains(&self.window_days) {
            return Err(Error::Config(format!(
                "window_days must be between 1 and {}, got {}",
                MAX_WINDOW_DAYS, self.window_days
            )));
        }
        if !self.max_amount_variance_pct.is_finite() || self.max_amount_variance_pct < 0.0 {
            return Err(Error::Config(format!(
                "max_amount_variance_pct must be a non-negative number, got {}",
                self.max_amount_variance_pct
            )));
        }
        Ok(())
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("outlay").join("config").join("detection.toml"))
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn lowercase_all(items: Vec<String>) -> Vec<String> {
    items.into_iter().map(|s| s.to_lowercase()).collect()
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    detection: Option<RawDetection>,
    signals: Option<RawSignals>,
    display: Option<RawDisplay>,
}

#[derive(Debug, Deserialize)]
struct RawDetection {
    window_days: Option<i64>,
    max_amount_variance_pct: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawSignals {
    keywords: Option<Vec<String>>,
    extra_keywords: Option<Vec<String>>,
    recurrence_words: Option<Vec<String>>,
    category_hints: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawDisplay {
    default_category: Option<String>,
    default_icon: Option<String>,
    icons: Option<Vec<RawIcon>>,
}

#[derive(Debug, Deserialize)]
struct RawIcon {
    keyword: String,
    icon: String,
}
