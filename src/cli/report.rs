//! Report writers: full JSON payloads plus a compact terminal summary.
//!
//! JSON goes to stdout (or `--output`); the human summary always goes to
//! stderr so piped output stays clean.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use colored::Colorize;

use crate::core::naming::MigrationReport;
use crate::core::result::ExtractionResult;

pub fn write_extraction(result: &ExtractionResult, output: Option<&Path>) -> Result<()> {
    let json =
        serde_json::to_string_pretty(result).context("Failed to serialize extraction result")?;
    write_payload(&json, output)
}

pub fn write_migration(report: &MigrationReport, output: Option<&Path>) -> Result<()> {
    let json =
        serde_json::to_string_pretty(report).context("Failed to serialize migration report")?;
    write_payload(&json, output)
}

fn write_payload(json: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => fs::write(path, json)
            .with_context(|| format!("Failed to write report: {}", path.display())),
        None => {
            println!("{}", json);
            Ok(())
        }
    }
}

pub fn print_extraction_summary(result: &ExtractionResult) {
    let stats = &result.stats;
    eprintln!(
        "{} {} files, {} queries, {} variants, {} fragments in {}ms",
        "extracted:".bold().green(),
        stats.files,
        stats.queries,
        stats.variants,
        stats.fragments,
        stats.duration_ms
    );

    if !result.duplicate_groups.is_empty() {
        eprintln!(
            "{} {} duplicate group(s) by fingerprint",
            "note:".bold().cyan(),
            result.duplicate_groups.len()
        );
    }

    if !result.errors.is_empty() {
        eprintln!(
            "{} {} non-fatal error(s):",
            "warning:".bold().yellow(),
            result.errors.len()
        );
        for error in &result.errors {
            eprintln!("  {}", error);
        }
    }
}

pub fn print_migration_summary(report: &MigrationReport) {
    let summary = &report.summary;
    eprintln!(
        "{} {} of {} queries need migration ({} pattern, {} static), {} need manual review",
        "migration:".bold().green(),
        summary.needs_migration,
        summary.total,
        summary.pattern_migrations,
        summary.static_migrations,
        summary.requires_manual_review
    );

    for (transition, count) in &summary.version_transitions {
        eprintln!("  {}: {}", transition, count);
    }

    for entry in &report.name_table_diff {
        eprintln!(
            "  {} {} -> {}",
            "rename:".bold().cyan(),
            entry.current_name,
            entry.target_name.as_deref().unwrap_or("?")
        );
    }
}
