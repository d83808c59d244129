//! End-to-end evaluations through the public engine API.

use std::sync::Arc;

use govern_core::{Decision, StorageError};
use govern_engine::{EvaluationRequest, GovernanceEngine, Persistence};
use govern_policy::{load_policies_from_str, PolicyFormat, PolicySet, PriorityOrder};
use govern_receipt::{
    FileReceiptStore, MemoryReceiptStore, Receipt, ReceiptQuery, ReceiptStore, SigningKey,
};
use proptest::prelude::*;
use serde_json::{json, Value};
use uuid::Uuid;

const POLICIES: &str = r#"
- name: block-secrets-export
  priority: 0
  rules:
    - field: tool.name
      operator: equals
      value: export_secrets
      action: deny
- name: mask-customer
  priority: 5
  rules:
    - field: customer.ssn
      operator: exists
      action: redact
    - field: customer.note
      operator: contains
      value: confidential
      action: redact
- name: trusted-tools
  priority: 10
  rules:
    - field: tool.name
      operator: regex
      value: "^(search|summarize)$"
      action: allow
"#;

fn key() -> SigningKey {
    SigningKey::new(*b"integration-signing-key-0001").unwrap()
}

fn policies() -> PolicySet {
    load_policies_from_str(POLICIES, PolicyFormat::Yaml, "inline").unwrap()
}

fn engine() -> GovernanceEngine {
    GovernanceEngine::builder()
        .policies(policies())
        .signing_key(key())
        .build()
        .unwrap()
}

#[test]
fn phone_number_is_redacted_and_receipt_is_queryable() {
    let engine = GovernanceEngine::builder().signing_key(key()).build().unwrap();
    let result = engine
        .evaluate(&EvaluationRequest::new(
            "a1",
            json!({"msg": "call me at 555-123-4567"}),
        ))
        .unwrap();

    assert_eq!(result.decision, Decision::Redact);
    let modified = result.modified_payload.as_ref().unwrap();
    assert!(modified["msg"].as_str().unwrap().contains("[REDACTED_PHONE]"));
    assert_eq!(result.pii_matches.len(), 1);
    assert_eq!(result.pii_matches[0].path, "msg");
    assert_eq!(result.receipt.pii_categories, vec!["PHONE"]);
    assert!(result.persistence.is_persisted());

    let stored = engine
        .query_receipts(&ReceiptQuery::for_agent("a1"))
        .unwrap();
    assert_eq!(stored, vec![result.receipt.clone()]);
    assert!(engine.verify_receipt(&stored[0]));
    assert!(engine
        .query_receipts(&ReceiptQuery::for_agent("a2"))
        .unwrap()
        .is_empty());
}

#[test]
fn deny_releases_nothing() {
    let engine = engine();
    let payload = json!({
        "tool": {"name": "export_secrets"},
        "customer": {"ssn": "123-45-6789", "email": "bob@example.com"}
    });
    let result = engine
        .evaluate(&EvaluationRequest::new("agent-7", payload.clone()))
        .unwrap();

    assert_eq!(result.decision, Decision::Deny);
    assert!(result.modified_payload.is_none());
    assert!(result.pii_matches.is_empty());
    assert_eq!(result.matched_rules, vec!["block-secrets-export#0"]);
    assert!(result.released_payload(&payload).is_none());
    assert!(result.receipt.pii_categories.is_empty());

    let null_hash = govern_receipt::payload_hash(&Value::Null).unwrap();
    assert_eq!(result.receipt.modified_hash, null_hash);
    assert_eq!(
        result.receipt.original_hash,
        govern_receipt::payload_hash(&payload).unwrap()
    );
}

#[test]
fn redact_rules_mask_fields_and_record_rule_ids() {
    let engine = engine();
    let payload = json!({
        "tool": {"name": "search"},
        "customer": {"ssn": "123-45-6789", "note": "confidential: call 555-123-4567"}
    });
    let result = engine
        .evaluate(&EvaluationRequest::new("agent-7", payload))
        .unwrap();

    assert_eq!(result.decision, Decision::Redact);
    assert_eq!(
        result.matched_rules,
        vec!["mask-customer#0", "mask-customer#1", "trusted-tools#0"]
    );
    assert_eq!(
        result.modified_payload.unwrap(),
        json!({
            "tool": {"name": "search"},
            "customer": {"ssn": "[REDACTED]", "note": "[REDACTED]"}
        })
    );
    // Masked fields leave nothing for the PII pass.
    assert!(result.pii_matches.is_empty());
    assert!(result.receipt.pii_categories.is_empty());
}

#[test]
fn allow_with_pii_escalates_to_redact() {
    let engine = engine();
    let result = engine
        .evaluate_payload(
            "agent-7",
            json!({"tool": {"name": "summarize"}, "text": "reach alice@example.com"}),
            "tool_call",
            None,
        )
        .unwrap();
    assert_eq!(result.decision, Decision::Redact);
    assert_eq!(result.matched_rules, vec!["trusted-tools#0"]);
    assert_eq!(
        result.modified_payload.unwrap()["text"],
        json!("reach [REDACTED_EMAIL]")
    );
    assert_eq!(result.reason, "PII redacted: 1 EMAIL");
}

#[test]
fn receipt_hashes_track_the_released_payload() {
    let engine = engine();
    let payload = json!({"text": "ssn 123-45-6789"});
    let result = engine
        .evaluate(&EvaluationRequest::new("a", payload.clone()))
        .unwrap();
    let released = result.modified_payload.clone().unwrap();
    assert_eq!(
        result.receipt.modified_hash,
        govern_receipt::payload_hash(&released).unwrap()
    );
    assert_ne!(result.receipt.original_hash, result.receipt.modified_hash);
}

#[test]
fn receipt_records_redacted_categories_under_signature() {
    let engine = engine();
    let result = engine
        .evaluate(&EvaluationRequest::new(
            "a",
            json!({
                "to": "carol@example.com",
                "body": "card 4111 1111 1111 1111, backup bob@example.com, host 10.0.0.1"
            }),
        ))
        .unwrap();
    assert_eq!(
        result.receipt.pii_categories,
        vec!["EMAIL", "CREDIT_CARD", "IP_ADDRESS"]
    );
    assert!(engine.verify_receipt(&result.receipt));

    let stored = engine
        .query_receipts(&ReceiptQuery::for_agent("a"))
        .unwrap();
    let mut hidden = stored[0].clone();
    hidden.pii_categories.retain(|c| c != "CREDIT_CARD");
    assert!(!engine.verify_receipt(&hidden));
}

/// A store that refuses every write.
struct BrokenStore;

impl ReceiptStore for BrokenStore {
    fn append(&self, _receipt: &Receipt) -> Result<(), StorageError> {
        Err(StorageError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        )))
    }

    fn query(&self, _query: &ReceiptQuery) -> Result<Vec<Receipt>, StorageError> {
        Ok(Vec::new())
    }

    fn get(&self, _receipt_id: &Uuid) -> Result<Option<Receipt>, StorageError> {
        Ok(None)
    }

    fn len(&self) -> usize {
        0
    }
}

#[test]
fn storage_failure_is_a_warning_not_an_error() {
    let engine = GovernanceEngine::builder()
        .policies(policies())
        .signing_key(key())
        .store(Arc::new(BrokenStore))
        .build()
        .unwrap();
    let result = engine
        .evaluate(&EvaluationRequest::new(
            "a1",
            json!({"tool": {"name": "export_secrets"}}),
        ))
        .unwrap();

    assert_eq!(result.decision, Decision::Deny);
    match &result.persistence {
        Persistence::Failed { warning } => assert!(warning.contains("disk full")),
        other => panic!("expected failed persistence, got {other:?}"),
    }
    assert!(engine.verify_receipt(&result.receipt));
}

#[test]
fn replaced_policies_apply_to_later_calls() {
    let engine = GovernanceEngine::builder().signing_key(key()).build().unwrap();
    let req = EvaluationRequest::new("a1", json!({"tool": {"name": "export_secrets"}}));

    assert_eq!(engine.evaluate(&req).unwrap().decision, Decision::Allow);

    let before = engine.policies();
    engine.replace_policies(policies());
    assert!(before.is_empty());
    assert_eq!(engine.policies().len(), 3);
    assert_eq!(engine.evaluate(&req).unwrap().decision, Decision::Deny);
}

#[test]
fn priority_order_changes_reported_denial() {
    let text = r#"
- name: low
  priority: 1
  rules: [{field: x, operator: exists, action: deny}]
- name: high
  priority: 9
  rules: [{field: x, operator: exists, action: deny}]
"#;
    let set = || load_policies_from_str(text, PolicyFormat::Yaml, "inline").unwrap();
    let req = EvaluationRequest::new("a", json!({"x": 1}));

    let asc = GovernanceEngine::builder()
        .policies(set())
        .signing_key(key())
        .build()
        .unwrap();
    assert_eq!(asc.evaluate(&req).unwrap().matched_rules, vec!["low#0"]);

    let desc = GovernanceEngine::builder()
        .policies(set())
        .signing_key(key())
        .priority_order(PriorityOrder::Descending)
        .build()
        .unwrap();
    assert_eq!(desc.evaluate(&req).unwrap().matched_rules, vec!["high#0"]);
}

#[test]
fn concurrent_evaluations_share_one_engine() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn ReceiptStore> =
        Arc::new(FileReceiptStore::open(dir.path().join("receipts.jsonl")).unwrap());
    let engine = Arc::new(
        GovernanceEngine::builder()
            .policies(policies())
            .signing_key(key())
            .store(Arc::clone(&store))
            .build()
            .unwrap(),
    );

    let handles: Vec<_> = (0..6)
        .map(|t| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                for n in 0..20 {
                    let payload = json!({"n": n, "text": format!("user{t}@example.com")});
                    let result = engine
                        .evaluate(&EvaluationRequest::new(format!("agent-{t}"), payload))
                        .unwrap();
                    assert_eq!(result.decision, Decision::Redact);
                    assert!(result.persistence.is_persisted());
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(store.len(), 120);
    for t in 0..6 {
        let receipts = engine
            .query_receipts(&ReceiptQuery::for_agent(format!("agent-{t}")))
            .unwrap();
        assert_eq!(receipts.len(), 20);
        assert!(receipts.iter().all(|r| engine.verify_receipt(r)));
    }
}

#[test]
fn receipts_from_another_key_do_not_verify() {
    let store = Arc::new(MemoryReceiptStore::new());
    let first = GovernanceEngine::builder()
        .signing_key(key())
        .store(store.clone())
        .build()
        .unwrap();
    let other = GovernanceEngine::builder()
        .signing_key(SigningKey::new(*b"a-completely-different-key").unwrap())
        .build()
        .unwrap();
    let result = first
        .evaluate(&EvaluationRequest::new("a", json!({})))
        .unwrap();
    assert!(first.verify_receipt(&result.receipt));
    assert!(!other.verify_receipt(&result.receipt));
}

fn tool_name() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("search"), Just("summarize"), Just("export_secrets"), Just("shell")]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn any_matching_deny_yields_deny_without_payload(
        tool in tool_name(),
        with_ssn in any::<bool>(),
        note in "[a-z ]{0,24}",
    ) {
        let engine = engine();
        let mut payload = json!({"tool": {"name": tool}, "customer": {"note": note}});
        if with_ssn {
            payload["customer"]["ssn"] = json!("123-45-6789");
        }
        let result = engine.evaluate(&EvaluationRequest::new("p", payload)).unwrap();
        if tool == "export_secrets" {
            prop_assert_eq!(result.decision, Decision::Deny);
            prop_assert!(result.modified_payload.is_none());
        } else {
            prop_assert_ne!(result.decision, Decision::Deny);
        }
    }
}
