//! # Redact Subcommand
//!
//! PII redaction without policies or receipts. Needs no signing key.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde_json::{json, Value};

use govern_engine::EngineConfig;
use govern_pii::{summarize, PiiCategory, PiiDetector, Redactor};

/// Arguments for `govern redact`.
#[derive(Args, Debug)]
pub struct RedactArgs {
    /// Input file, or `-` for stdin.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Treat the input as JSON and redact every string leaf.
    #[arg(long)]
    pub json: bool,

    /// Comma-separated categories to scan for (overrides configuration).
    #[arg(long, value_delimiter = ',')]
    pub categories: Vec<PiiCategory>,

    /// Print the matches alongside the redacted output.
    #[arg(long)]
    pub report: bool,
}

/// Execute the redact subcommand.
pub fn run_redact(args: &RedactArgs, config: &EngineConfig) -> Result<u8> {
    let redactor = redactor_for(args, config)?;
    let input = crate::read_input(&args.file)?;

    if args.json {
        let value: Value = serde_json::from_str(&input)?;
        let out = redactor.redact_structure(&value);
        if args.report {
            let counts: serde_json::Map<String, Value> = summarize(&out.matches)
                .into_iter()
                .map(|(category, n)| (category.to_string(), json!(n)))
                .collect();
            crate::print_json(&json!({
                "redacted": out.value,
                "matches": out.matches,
                "counts": counts,
            }))?;
        } else {
            crate::print_json(&out.value)?;
        }
    } else {
        let out = redactor.redact(&input);
        if args.report {
            crate::print_json(&json!({"redacted": out.text, "matches": out.matches}))?;
        } else {
            print!("{}", out.text);
        }
    }
    Ok(0)
}

fn redactor_for(args: &RedactArgs, config: &EngineConfig) -> Result<Redactor> {
    let categories: Option<Vec<PiiCategory>> = if args.categories.is_empty() {
        config.pii_categories.clone()
    } else {
        Some(args.categories.clone())
    };
    let detector = match categories {
        Some(categories) => PiiDetector::with_categories(categories)?,
        None => PiiDetector::new()?,
    };
    Ok(Redactor::with_detector(detector))
}
