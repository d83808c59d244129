//! # Policy Subcommand
//!
//! Loads policy files exactly as the engine would and reports the result.
//! `check` exits non-zero on the first invalid definition; `list` prints
//! policies in evaluation order.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde_json::json;

use govern_engine::EngineConfig;
use govern_policy::{load_policies, PolicyEvaluator, PolicySet, PriorityOrder};

/// Arguments for `govern policy`.
#[derive(Args, Debug)]
pub struct PolicyArgs {
    #[command(subcommand)]
    pub command: PolicyCommand,
}

/// Policy subcommands.
#[derive(Subcommand, Debug)]
pub enum PolicyCommand {
    /// Validate a policy file or directory.
    Check {
        /// Policy file or directory (default: configured policy path).
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
    },

    /// Print policies and rules in evaluation order as JSON.
    List {
        /// Policy file or directory (default: configured policy path).
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
    },
}

/// Execute the policy subcommand.
pub fn run_policy(args: &PolicyArgs, config: &EngineConfig) -> Result<u8> {
    match &args.command {
        PolicyCommand::Check { path } => {
            let path = policy_path(path.as_deref(), config)?;
            let set = load(&path)?;
            println!(
                "OK: {} policies, {} rules in {}",
                set.len(),
                set.rule_count(),
                path.display()
            );
            Ok(0)
        }
        PolicyCommand::List { path } => {
            let path = policy_path(path.as_deref(), config)?;
            let set = load(&path)?;
            crate::print_json(&listing(&set, config.priority_order))?;
            Ok(0)
        }
    }
}

fn policy_path(arg: Option<&Path>, config: &EngineConfig) -> Result<PathBuf> {
    arg.map(Path::to_path_buf)
        .or_else(|| config.policy_path.clone())
        .context("no policy path given and none configured (GOVERN_POLICY_PATH)")
}

fn load(path: &Path) -> Result<PolicySet> {
    load_policies(path).with_context(|| format!("invalid policies in {}", path.display()))
}

/// Policies as evaluated under `order`, disabled ones flagged.
pub fn listing(set: &PolicySet, order: PriorityOrder) -> serde_json::Value {
    let evaluator = PolicyEvaluator::new(order);
    let policies: Vec<_> = evaluator
        .ordered(set)
        .into_iter()
        .map(|policy| {
            let rules: Vec<_> = policy
                .rules()
                .iter()
                .map(|rule| {
                    json!({
                        "id": rule.id,
                        "field": rule.field,
                        "operator": rule.operator.name(),
                        "action": rule.action,
                    })
                })
                .collect();
            json!({
                "name": policy.name(),
                "priority": policy.priority(),
                "enabled": policy.is_enabled(),
                "rules": rules,
            })
        })
        .collect();
    json!({ "order": order.as_str(), "policies": policies })
}
