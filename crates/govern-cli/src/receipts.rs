//! # Receipts Subcommand
//!
//! Offline checks over a JSON-lines receipt log. Verification needs the
//! signing key the receipts were created with. The log is only read: a torn
//! trailing line is skipped with a warning and left for the next writer.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};

use govern_core::Timestamp;
use govern_engine::EngineConfig;
use govern_receipt::{Receipt, ReceiptGenerator, ReceiptLog, ReceiptQuery};

/// Arguments for `govern receipts`.
#[derive(Args, Debug)]
pub struct ReceiptsArgs {
    /// Receipt log (default: configured receipt log).
    #[arg(long, global = true)]
    pub log: Option<PathBuf>,

    #[command(subcommand)]
    pub command: ReceiptsCommand,
}

/// Receipt subcommands.
#[derive(Subcommand, Debug)]
pub enum ReceiptsCommand {
    /// Verify every signature in the log, or a single receipt file.
    Verify {
        /// A single receipt JSON file to verify instead of the log.
        #[arg(long)]
        receipt: Option<PathBuf>,
    },

    /// Print matching receipts as JSON lines in timestamp order.
    Query {
        /// Only receipts for this agent.
        #[arg(long)]
        agent: Option<String>,
        /// Inclusive lower bound (RFC 3339).
        #[arg(long)]
        since: Option<String>,
        /// Inclusive upper bound (RFC 3339).
        #[arg(long)]
        until: Option<String>,
        /// Maximum number of receipts.
        #[arg(long)]
        limit: Option<usize>,
    },
}

/// Execute the receipts subcommand.
pub fn run_receipts(args: &ReceiptsArgs, config: EngineConfig) -> Result<u8> {
    match &args.command {
        ReceiptsCommand::Verify { receipt: Some(file) } => {
            let generator = ReceiptGenerator::new(&config.signing_key()?)?;
            let receipt: Receipt = serde_json::from_value(crate::read_json(file)?)
                .with_context(|| format!("{} is not a receipt", file.display()))?;
            if generator.verify(&receipt) {
                println!("OK: receipt {} verified", receipt.receipt_id);
                Ok(0)
            } else {
                println!("FAIL: receipt {} has an invalid signature", receipt.receipt_id);
                Ok(1)
            }
        }
        ReceiptsCommand::Verify { receipt: None } => {
            let generator = ReceiptGenerator::new(&config.signing_key()?)?;
            let log = open_log(args.log.as_deref(), &config)?;
            let receipts = log.query(&ReceiptQuery::all());
            let invalid = invalid_receipts(&generator, &receipts);
            for r in &invalid {
                println!("FAIL: {} (agent {}, {})", r.receipt_id, r.agent_id, r.timestamp);
            }
            if invalid.is_empty() {
                println!("OK: {} receipts verified in {}", receipts.len(), log.path().display());
                Ok(0)
            } else {
                println!("FAIL: {} of {} receipts did not verify", invalid.len(), receipts.len());
                Ok(1)
            }
        }
        ReceiptsCommand::Query {
            agent,
            since,
            until,
            limit,
        } => {
            let log = open_log(args.log.as_deref(), &config)?;
            let query = build_query(agent.as_deref(), since.as_deref(), until.as_deref(), *limit)?;
            for receipt in log.query(&query) {
                println!("{}", serde_json::to_string(&receipt)?);
            }
            Ok(0)
        }
    }
}

fn open_log(arg: Option<&Path>, config: &EngineConfig) -> Result<ReceiptLog> {
    let path = arg
        .map(Path::to_path_buf)
        .or_else(|| config.receipt_log.clone())
        .context("no receipt log given and none configured (GOVERN_RECEIPT_LOG)")?;
    if !path.is_file() {
        bail!("receipt log not found: {}", path.display());
    }
    ReceiptLog::load(&path).with_context(|| format!("failed to read {}", path.display()))
}

/// Receipts whose signature does not verify under `generator`.
pub fn invalid_receipts<'a>(generator: &ReceiptGenerator, receipts: &'a [Receipt]) -> Vec<&'a Receipt> {
    receipts.iter().filter(|r| !generator.verify(r)).collect()
}

/// Assemble a query from command-line strings.
pub fn build_query(
    agent: Option<&str>,
    since: Option<&str>,
    until: Option<&str>,
    limit: Option<usize>,
) -> Result<ReceiptQuery> {
    let mut query = match agent {
        Some(agent) => ReceiptQuery::for_agent(agent),
        None => ReceiptQuery::all(),
    };
    if let Some(since) = since {
        query = query.since(Timestamp::parse(since)?);
    }
    if let Some(until) = until {
        query = query.until(Timestamp::parse(until)?);
    }
    if let Some(limit) = limit {
        query = query.limit(limit);
    }
    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use govern_engine::GovernanceEngine;
    use govern_receipt::{FileReceiptStore, SigningKey};
    use serde_json::json;
    use std::sync::Arc;

    const KEY: &str = "receipts-cli-test-key";

    fn populated_log(dir: &Path) -> PathBuf {
        let path = dir.join("receipts.jsonl");
        let store = Arc::new(FileReceiptStore::open(&path).unwrap());
        let engine = GovernanceEngine::builder()
            .signing_key(SigningKey::new(KEY.as_bytes()).unwrap())
            .store(store)
            .build()
            .unwrap();
        for agent in ["a1", "a2", "a1"] {
            engine
                .evaluate_payload(agent, json!({"agent": agent}), "", None)
                .unwrap();
        }
        path
    }

    fn config(log: &Path) -> EngineConfig {
        EngineConfig {
            signing_key: Some(KEY.into()),
            receipt_log: Some(log.to_path_buf()),
            ..EngineConfig::default()
        }
    }

    #[test]
    fn verify_log_succeeds_with_right_key() {
        let dir = tempfile::tempdir().unwrap();
        let log = populated_log(dir.path());
        let args = ReceiptsArgs {
            log: None,
            command: ReceiptsCommand::Verify { receipt: None },
        };
        assert_eq!(run_receipts(&args, config(&log)).unwrap(), 0);
    }

    #[test]
    fn verify_log_fails_with_wrong_key() {
        let dir = tempfile::tempdir().unwrap();
        let log = populated_log(dir.path());
        let mut cfg = config(&log);
        cfg.signing_key = Some("some-other-signing-key".into());
        let args = ReceiptsArgs {
            log: None,
            command: ReceiptsCommand::Verify { receipt: None },
        };
        assert_eq!(run_receipts(&args, cfg).unwrap(), 1);
    }

    #[test]
    fn tampered_receipt_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let log = populated_log(dir.path());
        let mut receipts = ReceiptLog::load(&log).unwrap().query(&ReceiptQuery::all());
        receipts[1].decision = govern_core::Decision::Deny;

        let generator =
            ReceiptGenerator::new(&SigningKey::new(KEY.as_bytes()).unwrap()).unwrap();
        let invalid = invalid_receipts(&generator, &receipts);
        assert_eq!(invalid.len(), 1);
        assert_eq!(invalid[0].receipt_id, receipts[1].receipt_id);
    }

    #[test]
    fn query_filters_by_agent() {
        let dir = tempfile::tempdir().unwrap();
        let log = populated_log(dir.path());
        let query = build_query(Some("a1"), None, None, Some(5)).unwrap();
        let log = open_log(Some(log.as_path()), &EngineConfig::default()).unwrap();
        assert_eq!(log.query(&query).len(), 2);
    }

    #[test]
    fn inspection_does_not_truncate_torn_tail() {
        let dir = tempfile::tempdir().unwrap();
        let log = populated_log(dir.path());
        let mut file = std::fs::OpenOptions::new().append(true).open(&log).unwrap();
        std::io::Write::write_all(&mut file, br#"{"receipt_id":"00000000-"#).unwrap();
        drop(file);
        let before = std::fs::read(&log).unwrap();

        for command in [
            ReceiptsCommand::Verify { receipt: None },
            ReceiptsCommand::Query {
                agent: None,
                since: None,
                until: None,
                limit: None,
            },
        ] {
            let args = ReceiptsArgs { log: None, command };
            assert_eq!(run_receipts(&args, config(&log)).unwrap(), 0);
        }
        assert_eq!(std::fs::read(&log).unwrap(), before);
        assert_eq!(ReceiptLog::load(&log).unwrap().len(), 3);
    }

    #[test]
    fn query_rejects_bad_timestamp() {
        assert!(build_query(None, Some("yesterday"), None, None).is_err());
    }

    #[test]
    fn missing_log_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(&dir.path().join("absent.jsonl"));
        assert!(open_log(None, &cfg).is_err());
        assert!(!dir.path().join("absent.jsonl").exists());
    }
}
