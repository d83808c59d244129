//! # Redaction
//!
//! Rewrites text and structured payloads, replacing each resolved match with
//! its category placeholder.
//!
//! Structures are walked recursively over the `serde_json::Value` sum type.
//! Only string leaves are rewritten; keys, numbers, booleans and nulls pass
//! through, and map key order is preserved. The input is never mutated.
//!
//! Placeholders are bracketed and contain no digits, so redacting an
//! already-redacted string finds nothing new.

use govern_core::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::category::PiiCategory;
use crate::detector::{PiiDetector, PiiMatch};
use crate::overlap::resolve_overlaps;

/// Generic marker used when a whole field is masked by a policy rule.
pub const FIELD_MASK: &str = "[REDACTED]";

// Matches no detector pattern and is a non-word character, like the
// brackets around a placeholder.
const BLANK: &str = "#";

/// A resolved match located inside a structured payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatedMatch {
    /// Dot-path of the string leaf; empty for a root string.
    pub path: String,
    /// The match, with offsets into that leaf.
    #[serde(flatten)]
    pub pii: PiiMatch,
}

/// Redacted text together with the matches that were substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedactedText {
    /// Rewritten text.
    pub text: String,
    /// Resolved matches, start-ordered, offsets into the original text.
    pub matches: Vec<PiiMatch>,
}

/// Redacted structure together with every substitution made.
#[derive(Debug, Clone, PartialEq)]
pub struct RedactedStructure {
    /// Rewritten copy of the payload.
    pub value: Value,
    /// Substitutions in traversal order.
    pub matches: Vec<LocatedMatch>,
}

impl RedactedStructure {
    /// True if at least one substitution happened.
    pub fn changed(&self) -> bool {
        !self.matches.is_empty()
    }
}

/// Detect, resolve and substitute.
#[derive(Debug, Clone)]
pub struct Redactor {
    detector: PiiDetector,
}

impl Redactor {
    /// Redactor over every category.
    pub fn new() -> Result<Self, ConfigError> {
        Ok(Self::with_detector(PiiDetector::new()?))
    }

    /// Redactor over a preconfigured detector.
    pub fn with_detector(detector: PiiDetector) -> Self {
        Self { detector }
    }

    /// The underlying detector.
    pub fn detector(&self) -> &PiiDetector {
        &self.detector
    }

    /// Resolved, non-overlapping matches in `text`, ordered by start.
    ///
    /// A candidate that loses overlap resolution can shadow a match beside
    /// it, so detection repeats over the text with accepted spans blanked
    /// out until a pass finds nothing. Blanking keeps byte offsets stable.
    pub fn scan(&self, text: &str) -> Vec<PiiMatch> {
        let mut accepted: Vec<PiiMatch> = Vec::new();
        let mut residue = text.to_string();
        loop {
            let found = resolve_overlaps(self.detector.detect(&residue));
            if found.is_empty() {
                break;
            }
            for m in &found {
                residue.replace_range(m.start..m.end, &BLANK.repeat(m.end - m.start));
            }
            accepted.extend(
                found
                    .into_iter()
                    .map(|m| PiiMatch::new(m.category, text, m.start, m.end)),
            );
        }
        accepted.sort_by_key(|m| m.start);
        accepted
    }

    /// Redact `text`, returning the substitutions made.
    pub fn redact(&self, text: &str) -> RedactedText {
        let matches = self.scan(text);
        RedactedText {
            text: apply_redactions(text, &matches),
            matches,
        }
    }

    /// Redact `text`.
    pub fn redact_text(&self, text: &str) -> String {
        self.redact(text).text
    }

    /// Redact every string leaf of `payload` into a new value.
    pub fn redact_structure(&self, payload: &Value) -> RedactedStructure {
        let mut matches = Vec::new();
        let mut path = Vec::new();
        let value = self.walk(payload, &mut path, &mut matches);
        RedactedStructure { value, matches }
    }

    fn walk(&self, value: &Value, path: &mut Vec<String>, out: &mut Vec<LocatedMatch>) -> Value {
        match value {
            Value::String(s) => {
                let redacted = self.redact(s);
                if redacted.matches.is_empty() {
                    return value.clone();
                }
                let joined = path.join(".");
                out.extend(redacted.matches.into_iter().map(|pii| LocatedMatch {
                    path: joined.clone(),
                    pii,
                }));
                Value::String(redacted.text)
            }
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        path.push(i.to_string());
                        let v = self.walk(item, path, out);
                        path.pop();
                        v
                    })
                    .collect(),
            ),
            Value::Object(map) => {
                let mut rewritten = Map::with_capacity(map.len());
                for (key, item) in map {
                    path.push(key.clone());
                    let v = self.walk(item, path, out);
                    path.pop();
                    rewritten.insert(key.clone(), v);
                }
                Value::Object(rewritten)
            }
            scalar => scalar.clone(),
        }
    }
}

/// Substitute `matches` into `text` in one left-to-right pass.
///
/// `matches` should be the output of
/// [`resolve_overlaps`](crate::overlap::resolve_overlaps). A match that is
/// out of order, overlaps an earlier one, or does not sit on character
/// boundaries is skipped rather than corrupting the output.
pub fn apply_redactions(text: &str, matches: &[PiiMatch]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for m in matches {
        let valid = m.start >= cursor
            && m.start < m.end
            && m.end <= text.len()
            && text.is_char_boundary(m.start)
            && text.is_char_boundary(m.end);
        if !valid {
            continue;
        }
        out.push_str(&text[cursor..m.start]);
        out.push_str(m.category.placeholder());
        cursor = m.end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Count substitutions by category.
pub fn summarize(matches: &[LocatedMatch]) -> Vec<(PiiCategory, usize)> {
    let mut counts = std::collections::BTreeMap::new();
    for m in matches {
        *counts.entry(m.pii.category).or_insert(0usize) += 1;
    }
    counts.into_iter().collect()
}
