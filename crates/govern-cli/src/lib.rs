//! # govern-cli: Command-Line Front End
//!
//! Provides the `govern` binary over the governance crates.
//!
//! ## Subcommands
//!
//! - `govern evaluate`: policy evaluation, redaction and a signed receipt.
//! - `govern redact`: PII redaction of text or JSON.
//! - `govern policy`: policy file validation and listing.
//! - `govern receipts`: receipt log verification and queries.
//!
//! ```bash
//! govern policy check policies/
//! GOVERN_SIGNING_KEY=... govern evaluate --agent a1 payload.json
//! echo "mail bob@example.com" | govern redact -
//! govern receipts query --agent a1 --since 2026-01-01T00:00:00Z
//! ```
//!
//! ## Exit codes
//!
//! `0` success, `1` error or failed check, `2` the payload was denied.

pub mod evaluate;
pub mod policy;
pub mod receipts;
pub mod redact;

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

/// Exit code for a DENY decision.
pub const EXIT_DENIED: u8 = 2;

/// Read a whole input; `-` means stdin.
pub fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Read and parse a JSON document; `-` means stdin.
pub fn read_json(path: &Path) -> Result<Value> {
    let text = read_input(path)?;
    serde_json::from_str(&text).with_context(|| format!("invalid JSON in {}", path.display()))
}

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
