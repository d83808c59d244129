//! # govern-engine: Governance Engine
//!
//! The single entry point that ties the policy evaluator, the PII redactor
//! and the receipt subsystem together.
//!
//! ```text
//! EvaluationRequest
//!   → validate
//!   → PolicyEvaluator          (DENY short-circuits)
//!   → field masks + Redactor   (ALLOW escalates to REDACT on substitution)
//!   → ReceiptGenerator         (canonical hashes, HMAC-SHA256)
//!   → ReceiptStore             (failure becomes a warning on the result)
//!   → EvaluationResult
//! ```
//!
//! There is no global engine. Callers build one with
//! [`GovernanceEngine::builder`] or [`EngineConfig::build_engine`] and share
//! it through `Arc`; the engine is `Send + Sync`.

pub mod config;
pub mod engine;
pub mod request;

// Re-export primary types.
pub use config::EngineConfig;
pub use engine::{EngineBuilder, GovernanceEngine};
pub use request::{EvaluationRequest, EvaluationResult, Persistence};
