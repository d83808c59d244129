//! # Governance Engine
//!
//! Orchestrates one evaluation end to end:
//!
//! 1. validate the request;
//! 2. run the policy set (a matching DENY short-circuits);
//! 3. mask fields named by REDACT rules with [`FIELD_MASK`];
//! 4. run PII detection and redaction when the decision is REDACT or
//!    auto-redaction is on, escalating ALLOW to REDACT on any substitution;
//! 5. sign a receipt and append it to the store.
//!
//! A store failure is reported on the result as [`Persistence::Failed`] and
//! never changes the decision.
//!
//! The policy set lives behind `RwLock<Arc<PolicySet>>`. Each evaluation
//! clones the `Arc` under a read lock, so [`GovernanceEngine::replace_policies`]
//! never disturbs evaluations already in flight.

use std::sync::Arc;

use govern_core::{resolve_mut, ConfigError, Decision, GovernError};
use govern_pii::{summarize, LocatedMatch, PiiCategory, PiiDetector, Redactor, FIELD_MASK};
use govern_policy::{PolicyEvaluator, PolicySet, PriorityOrder};
use govern_receipt::{
    MemoryReceiptStore, Receipt, ReceiptGenerator, ReceiptInput, ReceiptQuery, ReceiptStore,
    SigningKey,
};
use parking_lot::RwLock;
use serde_json::Value;

use crate::request::{EvaluationRequest, EvaluationResult, Persistence};

/// Policy evaluation, PII redaction and receipt signing behind one call.
pub struct GovernanceEngine {
    policies: RwLock<Arc<PolicySet>>,
    evaluator: PolicyEvaluator,
    redactor: Redactor,
    generator: ReceiptGenerator,
    store: Arc<dyn ReceiptStore>,
    auto_redaction: bool,
}

impl std::fmt::Debug for GovernanceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let policies = self.policies.read();
        f.debug_struct("GovernanceEngine")
            .field("policies", &policies.len())
            .field("rules", &policies.rule_count())
            .field("priority_order", &self.evaluator.order())
            .field("pii_categories", &self.redactor.detector().categories())
            .field("auto_redaction", &self.auto_redaction)
            .field("stored_receipts", &self.store.len())
            .finish()
    }
}

impl GovernanceEngine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Evaluate a request with the configured auto-redaction setting.
    pub fn evaluate(&self, request: &EvaluationRequest) -> Result<EvaluationResult, GovernError> {
        self.run(request, self.auto_redaction)
    }

    /// Evaluate a request, scanning for PII even if auto-redaction is off.
    pub fn evaluate_with_redaction(
        &self,
        request: &EvaluationRequest,
    ) -> Result<EvaluationResult, GovernError> {
        self.run(request, true)
    }

    /// Convenience form of [`evaluate`](Self::evaluate) for callers that
    /// hold the parts rather than a request.
    pub fn evaluate_payload(
        &self,
        agent_id: &str,
        payload: Value,
        action: &str,
        metadata: Option<Value>,
    ) -> Result<EvaluationResult, GovernError> {
        let request = EvaluationRequest {
            agent_id: agent_id.to_string(),
            payload,
            action: action.to_string(),
            metadata,
        };
        self.evaluate(&request)
    }

    /// Swap in a new policy set. Evaluations already running keep theirs.
    pub fn replace_policies(&self, policies: PolicySet) {
        let count = policies.len();
        *self.policies.write() = Arc::new(policies);
        tracing::info!(policies = count, "policy set replaced");
    }

    /// Snapshot of the current policy set.
    pub fn policies(&self) -> Arc<PolicySet> {
        Arc::clone(&*self.policies.read())
    }

    pub fn auto_redaction(&self) -> bool {
        self.auto_redaction
    }

    pub fn priority_order(&self) -> PriorityOrder {
        self.evaluator.order()
    }

    /// Check a receipt's signature against this engine's key.
    pub fn verify_receipt(&self, receipt: &Receipt) -> bool {
        self.generator.verify(receipt)
    }

    pub fn query_receipts(&self, query: &ReceiptQuery) -> Result<Vec<Receipt>, GovernError> {
        Ok(self.store.query(query)?)
    }

    pub fn store(&self) -> &Arc<dyn ReceiptStore> {
        &self.store
    }

    fn run(
        &self,
        request: &EvaluationRequest,
        scan_pii: bool,
    ) -> Result<EvaluationResult, GovernError> {
        request.validate()?;
        let policies = self.policies();
        let outcome = self.evaluator.evaluate(&policies, &request.payload);

        let mut decision = outcome.decision;
        let mut reason = outcome.reason;
        let mut pii_matches: Vec<LocatedMatch> = Vec::new();
        let mut released: Option<Value> = None;

        if decision != Decision::Deny {
            let mut working = request.payload.clone();
            mask_fields(&mut working, &outcome.redact_fields);

            if decision == Decision::Redact || scan_pii {
                let redacted = self.redactor.redact_structure(&working);
                if redacted.changed() {
                    working = redacted.value;
                    pii_matches = redacted.matches;
                    reason = append_pii_summary(reason, decision, &pii_matches);
                    decision = decision.combine(Decision::Redact);
                }
            }

            if working != request.payload {
                released = Some(working);
            }
        }

        let metadata = request.receipt_metadata();
        let pii_categories: Vec<String> = summarize(&pii_matches)
            .into_iter()
            .map(|(category, _)| category.to_string())
            .collect();
        let receipt = self.generator.create_receipt(&ReceiptInput {
            agent_id: &request.agent_id,
            action: &request.action,
            decision,
            matched_rules: &outcome.matched_rules,
            pii_categories: &pii_categories,
            original: &request.payload,
            modified: released.as_ref(),
            metadata: &metadata,
        })?;

        let persistence = match self.store.append(&receipt) {
            Ok(()) => Persistence::Persisted,
            Err(err) => {
                tracing::warn!(
                    receipt_id = %receipt.receipt_id,
                    agent_id = %request.agent_id,
                    error = %err,
                    "receipt was not persisted"
                );
                Persistence::Failed { warning: err.to_string() }
            }
        };

        tracing::info!(
            agent_id = %request.agent_id,
            action = %request.action,
            decision = decision.as_str(),
            matched_rules = outcome.matched_rules.len(),
            pii_matches = pii_matches.len(),
            receipt_id = %receipt.receipt_id,
            "evaluated request"
        );

        Ok(EvaluationResult {
            decision,
            modified_payload: released,
            matched_rules: outcome.matched_rules,
            reason,
            pii_matches,
            receipt,
            persistence,
        })
    }
}

/// Replace every resolvable field with the generic mask.
fn mask_fields(payload: &mut Value, fields: &[String]) {
    for field in fields {
        if let Some(slot) = resolve_mut(payload, field) {
            *slot = Value::String(FIELD_MASK.to_string());
        }
    }
}

fn append_pii_summary(reason: String, decision: Decision, matches: &[LocatedMatch]) -> String {
    let counts = summarize(matches)
        .into_iter()
        .map(|(category, n)| format!("{n} {category}"))
        .collect::<Vec<_>>()
        .join(", ");
    match decision {
        Decision::Allow => format!("PII redacted: {counts}"),
        _ => format!("{reason}; PII redacted: {counts}"),
    }
}

/// Assembles a [`GovernanceEngine`].
///
/// Only the signing key is required. Defaults: empty policy set, ascending
/// priority order, every PII category, auto-redaction on, in-memory store.
pub struct EngineBuilder {
    policies: PolicySet,
    signing_key: Option<SigningKey>,
    store: Option<Arc<dyn ReceiptStore>>,
    auto_redaction: bool,
    priority_order: PriorityOrder,
    pii_categories: Option<Vec<PiiCategory>>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            policies: PolicySet::empty(),
            signing_key: None,
            store: None,
            auto_redaction: true,
            priority_order: PriorityOrder::default(),
            pii_categories: None,
        }
    }
}

impl EngineBuilder {
    pub fn policies(mut self, policies: PolicySet) -> Self {
        self.policies = policies;
        self
    }

    pub fn signing_key(mut self, key: SigningKey) -> Self {
        self.signing_key = Some(key);
        self
    }

    pub fn store(mut self, store: Arc<dyn ReceiptStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn auto_redaction(mut self, enabled: bool) -> Self {
        self.auto_redaction = enabled;
        self
    }

    pub fn priority_order(mut self, order: PriorityOrder) -> Self {
        self.priority_order = order;
        self
    }

    /// Restrict PII scanning to `categories`.
    pub fn pii_categories(mut self, categories: impl IntoIterator<Item = PiiCategory>) -> Self {
        self.pii_categories = Some(categories.into_iter().collect());
        self
    }

    pub fn build(self) -> Result<GovernanceEngine, ConfigError> {
        let key = self.signing_key.ok_or(ConfigError::MissingSigningKey)?;
        let generator = ReceiptGenerator::new(&key)?;
        let detector = match self.pii_categories {
            Some(categories) => PiiDetector::with_categories(categories)?,
            None => PiiDetector::new()?,
        };
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryReceiptStore::new()));

        tracing::info!(
            policies = self.policies.len(),
            rules = self.policies.rule_count(),
            priority_order = self.priority_order.as_str(),
            auto_redaction = self.auto_redaction,
            pii_categories = detector.categories().len(),
            "governance engine ready"
        );

        Ok(GovernanceEngine {
            policies: RwLock::new(Arc::new(self.policies)),
            evaluator: PolicyEvaluator::new(self.priority_order),
            redactor: Redactor::with_detector(detector),
            generator,
            store,
            auto_redaction: self.auto_redaction,
        })
    }
}
