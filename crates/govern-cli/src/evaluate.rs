//! # Evaluate Subcommand
//!
//! Runs one payload through a configured engine and prints the
//! [`EvaluationResult`] as JSON. A receipt-store failure is printed to
//! stderr but does not change the exit code.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use govern_core::Decision;
use govern_engine::{EngineConfig, EvaluationRequest, EvaluationResult};
use govern_policy::PriorityOrder;

/// Arguments for `govern evaluate`.
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// JSON payload file, or `-` for stdin.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Identifier of the agent that produced the payload.
    #[arg(long)]
    pub agent: String,

    /// Action label recorded in the receipt.
    #[arg(long, default_value = "")]
    pub action: String,

    /// Metadata map as inline JSON.
    #[arg(long)]
    pub metadata: Option<String>,

    /// Policy file or directory (overrides configuration).
    #[arg(long)]
    pub policies: Option<PathBuf>,

    /// Receipt log to append to (overrides configuration).
    #[arg(long)]
    pub receipt_log: Option<PathBuf>,

    /// Policy priority direction (overrides configuration).
    #[arg(long, value_parser = parse_order)]
    pub order: Option<PriorityOrder>,

    /// Scan for PII even when auto-redaction is off.
    #[arg(long)]
    pub force_redaction: bool,

    /// Print only the released payload instead of the full result.
    #[arg(long)]
    pub payload_only: bool,
}

fn parse_order(s: &str) -> Result<PriorityOrder, String> {
    s.parse().map_err(|e: govern_core::ConfigError| e.to_string())
}

/// Execute the evaluate subcommand.
pub fn run_evaluate(args: &EvaluateArgs, config: EngineConfig) -> Result<u8> {
    let payload = crate::read_json(&args.file)?;
    let metadata = args
        .metadata
        .as_deref()
        .map(|raw| serde_json::from_str::<serde_json::Value>(raw))
        .transpose()
        .context("--metadata is not valid JSON")?;
    let request = EvaluationRequest {
        agent_id: args.agent.clone(),
        payload,
        action: args.action.clone(),
        metadata,
    };

    let result = evaluate(args, config, &request)?;

    if let Some(warning) = result.persistence.warning() {
        eprintln!("WARNING: receipt not persisted: {warning}");
    }
    if args.payload_only {
        match result.released_payload(&request.payload) {
            Some(released) => crate::print_json(released)?,
            None => println!("null"),
        }
    } else {
        crate::print_json(&result)?;
    }

    Ok(match result.decision {
        Decision::Deny => crate::EXIT_DENIED,
        Decision::Allow | Decision::Redact => 0,
    })
}

/// Build an engine from `config` plus command-line overrides and evaluate.
pub fn evaluate(
    args: &EvaluateArgs,
    mut config: EngineConfig,
    request: &EvaluationRequest,
) -> Result<EvaluationResult> {
    if let Some(path) = &args.policies {
        config.policy_path = Some(path.clone());
    }
    if let Some(path) = &args.receipt_log {
        config.receipt_log = Some(path.clone());
    }
    if let Some(order) = args.order {
        config.priority_order = order;
    }
    let engine = config.build_engine().context("failed to build engine")?;
    let result = if args.force_redaction {
        engine.evaluate_with_redaction(request)?
    } else {
        engine.evaluate(request)?
    };
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(policies: Option<PathBuf>) -> EvaluateArgs {
        EvaluateArgs {
            file: PathBuf::from("-"),
            agent: "cli-agent".into(),
            action: String::new(),
            metadata: None,
            policies,
            receipt_log: None,
            order: None,
            force_redaction: false,
            payload_only: false,
        }
    }

    fn config() -> EngineConfig {
        EngineConfig {
            signing_key: Some("cli-test-signing-key".into()),
            ..EngineConfig::default()
        }
    }

    #[test]
    fn evaluates_with_policy_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deny.yaml");
        std::fs::write(
            &path,
            "name: no-shell\nrules:\n  - field: tool\n    operator: equals\n    value: shell\n    action: deny\n",
        )
        .unwrap();

        let request = EvaluationRequest::new("cli-agent", json!({"tool": "shell"}));
        let result = evaluate(&args(Some(path)), config(), &request).unwrap();
        assert_eq!(result.decision, Decision::Deny);
        assert_eq!(result.matched_rules, vec!["no-shell#0"]);
    }

    #[test]
    fn missing_key_fails() {
        let request = EvaluationRequest::new("cli-agent", json!({}));
        let err = evaluate(&args(None), EngineConfig::default(), &request).unwrap_err();
        assert!(format!("{err:#}").contains("signing key"));
    }

    #[test]
    fn receipt_log_override_persists() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("receipts.jsonl");
        let mut a = args(None);
        a.receipt_log = Some(log.clone());
        let request = EvaluationRequest::new("cli-agent", json!({"msg": "hi"}));
        let result = evaluate(&a, config(), &request).unwrap();
        assert!(result.persistence.is_persisted());
        assert_eq!(std::fs::read_to_string(&log).unwrap().lines().count(), 1);
    }

    #[test]
    fn order_parser_accepts_short_forms() {
        assert_eq!(parse_order("desc").unwrap(), PriorityOrder::Descending);
        assert!(parse_order("sideways").is_err());
    }
}
