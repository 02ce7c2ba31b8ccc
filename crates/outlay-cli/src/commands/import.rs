//! Import command implementation

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use outlay_core::{
    db::Database, ingest, models::DataSource, Clock, ImportFormat, InsertCounts, SystemClock,
};

use super::{print_detect_report, run_detection, DetectOptions};

/// Options for an import run
pub struct ImportOptions<'a> {
    /// Explicit format; inferred from the file extension when absent
    pub format: Option<&'a str>,
    pub source: &'a str,
    /// Run detection and sync after inserting
    pub detect: bool,
    pub config_path: Option<&'a Path>,
}

/// Outcome of importing one file
#[derive(Debug)]
pub struct ImportReport {
    pub format: ImportFormat,
    pub counts: InsertCounts,
    pub skipped: usize,
}

fn resolve_format(file: &Path, explicit: Option<&str>) -> Result<ImportFormat> {
    match explicit {
        Some(s) => s.parse::<ImportFormat>().map_err(|e| anyhow::anyhow!(e)),
        None => ImportFormat::from_path(file).ok_or_else(|| {
            anyhow::anyhow!(
                "Could not infer import format from {}.\n\
                 Specify --format with one of: csv, json",
                file.display()
            )
        }),
    }
}

/// Parse a file and insert its expenses, skipping duplicates
pub fn import_file(
    db: &Database,
    user_id: i64,
    file: &Path,
    options: &ImportOptions,
) -> Result<ImportReport> {
    let format = resolve_format(file, options.format)?;
    let source: DataSource = options
        .source
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let reader = BufReader::new(
        File::open(file).with_context(|| format!("Failed to open file: {}", file.display()))?,
    );
    let parsed = ingest::parse(reader, format, source)
        .with_context(|| format!("Failed to parse {}", file.display()))?;

    let counts = db
        .insert_transactions(user_id, &parsed.transactions)
        .context("Failed to store transactions")?;

    Ok(ImportReport {
        format,
        counts,
        skipped: parsed.skipped,
    })
}

pub fn cmd_import(db: &Database, user_id: i64, file: &Path, options: &ImportOptions) -> Result<()> {
    println!("📥 Importing {}...", file.display());

    let report = import_file(db, user_id, file, options)?;

    println!();
    println!("📊 Import Results ({})", report.format.as_str());
    println!("   ─────────────────────────────");
    println!("   Imported: {}", report.counts.inserted);
    println!("   Duplicates skipped: {}", report.counts.duplicates);
    if report.skipped > 0 {
        println!("   ⚠️  Unreadable records skipped: {}", report.skipped);
    }

    if !options.detect {
        println!();
        println!("💡 Detection skipped. Run 'outlay detect' when ready.");
        return Ok(());
    }

    println!();
    println!("🔍 Running subscription detection...");
    let detect = DetectOptions {
        dry_run: false,
        json: false,
        today: SystemClock.today(),
        config_path: options.config_path,
    };
    let detected = run_detection(db, user_id, &detect)?;
    print_detect_report(&detected);

    Ok(())
}
