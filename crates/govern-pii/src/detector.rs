//! # PII Detection
//!
//! Per-category regex scanners, some followed by a validity filter:
//!
//! | Category      | Pattern                                   | Filter            |
//! |---------------|-------------------------------------------|-------------------|
//! | `EMAIL`       | local@domain.tld                          |                   |
//! | `PHONE`       | NANP, optional `+1`, `(555)` area code    |                   |
//! | `SSN`         | `ddd-dd-dddd`                             |                   |
//! | `CREDIT_CARD` | runs of space/dash separated digit groups | Luhn window       |
//! | `IP_ADDRESS`  | dotted quad, octets 0-255                 |                   |
//! | `API_KEY`     | provider prefixes, generic fallback       | entropy (generic) |
//!
//! [`PiiDetector::detect`] returns raw matches: overlapping spans are allowed
//! and order is unspecified. Offsets are UTF-8 byte offsets into the input,
//! half-open.
//!
//! A digit run can hold several numbers ("qty 12 4111 1111 1111 1111"), so
//! the card scanner checks every window of whole groups inside the run
//! rather than the run itself.

use std::cmp::Reverse;
use std::collections::BTreeSet;

use govern_core::ConfigError;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::category::PiiCategory;

const EMAIL: &str = r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b";
const PHONE: &str = r"(?:\+1[\s.-]?)?(?:\(\d{3}\)|\b\d{3})[\s.-]?\d{3}[\s.-]?\d{4}\b";
const SSN: &str = r"\b\d{3}-\d{2}-\d{4}\b";
const CREDIT_CARD: &str = r"\b\d+(?:[ -]\d+)*\b";
const IP_ADDRESS: &str =
    r"\b(?:(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\.){3}(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\b";

const API_KEY_PROVIDERS: &[&str] = &[
    // OpenAI / Anthropic
    r"sk-(?:proj-|ant-)?[A-Za-z0-9_-]{20,}",
    // GitHub
    r"gh[pousr]_[A-Za-z0-9]{36,}",
    // AWS access key id
    r"\bAKIA[0-9A-Z]{16}\b",
    // Slack
    r"xox[bpar]-[A-Za-z0-9-]{10,}",
    // Stripe
    r"[rs]k_(?:live|test)_[A-Za-z0-9]{20,}",
    // Google
    r"AIza[0-9A-Za-z_-]{35}",
    r"\b(?:sk_|api_|key_|token_)[A-Za-z0-9_]{20,}\b",
];

const GENERIC_SECRET: &str = r"[A-Za-z0-9_-]{32,}";
const GENERIC_MIN_ENTROPY: f64 = 3.5;

/// A detected span of sensitive text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PiiMatch {
    /// What was detected.
    pub category: PiiCategory,
    /// Byte offset of the first byte.
    pub start: usize,
    /// Byte offset one past the last byte.
    pub end: usize,
    /// The matched text.
    pub text: String,
    /// Category precedence, copied for convenience.
    pub priority: u8,
}

impl PiiMatch {
    /// Build a match over `text[start..end]`.
    pub fn new(category: PiiCategory, text: &str, start: usize, end: usize) -> Self {
        Self {
            category,
            start,
            end,
            text: text[start..end].to_string(),
            priority: category.priority(),
        }
    }

    /// Span length in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// True for a zero-width span.
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// True if the two half-open spans share a byte.
    pub fn overlaps(&self, other: &PiiMatch) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[derive(Debug, Clone, Copy)]
enum Filter {
    None,
    Luhn,
    Entropy,
}

#[derive(Debug, Clone)]
struct Scanner {
    category: PiiCategory,
    regex: Regex,
    filter: Filter,
}

/// Compiled set of scanners for the enabled categories.
#[derive(Debug, Clone)]
pub struct PiiDetector {
    enabled: BTreeSet<PiiCategory>,
    scanners: Vec<Scanner>,
}

impl PiiDetector {
    /// Detector for every category.
    pub fn new() -> Result<Self, ConfigError> {
        Self::with_categories(PiiCategory::ALL)
    }

    /// Detector restricted to `categories`.
    pub fn with_categories(
        categories: impl IntoIterator<Item = PiiCategory>,
    ) -> Result<Self, ConfigError> {
        let enabled: BTreeSet<PiiCategory> = categories.into_iter().collect();
        let mut scanners = Vec::new();
        for &category in &enabled {
            match category {
                PiiCategory::Email => scanners.push(scanner(category, EMAIL, Filter::None)?),
                PiiCategory::Phone => scanners.push(scanner(category, PHONE, Filter::None)?),
                PiiCategory::Ssn => scanners.push(scanner(category, SSN, Filter::None)?),
                PiiCategory::CreditCard => {
                    scanners.push(scanner(category, CREDIT_CARD, Filter::Luhn)?)
                }
                PiiCategory::IpAddress => {
                    scanners.push(scanner(category, IP_ADDRESS, Filter::None)?)
                }
                PiiCategory::ApiKey => {
                    for pattern in API_KEY_PROVIDERS {
                        scanners.push(scanner(category, pattern, Filter::None)?);
                    }
                    scanners.push(scanner(category, GENERIC_SECRET, Filter::Entropy)?);
                }
            }
        }
        tracing::debug!(categories = enabled.len(), scanners = scanners.len(), "built PII detector");
        Ok(Self { enabled, scanners })
    }

    /// Enabled categories in declaration order.
    pub fn categories(&self) -> Vec<PiiCategory> {
        self.enabled.iter().copied().collect()
    }

    /// Whether `category` is scanned for.
    pub fn is_enabled(&self, category: PiiCategory) -> bool {
        self.enabled.contains(&category)
    }

    /// All raw matches in `text`. Spans may overlap.
    pub fn detect(&self, text: &str) -> Vec<PiiMatch> {
        let mut found = Vec::new();
        for s in &self.scanners {
            for m in s.regex.find_iter(text) {
                match s.filter {
                    Filter::None => found.push(PiiMatch::new(s.category, text, m.start(), m.end())),
                    Filter::Luhn => found.extend(
                        card_spans(text, m.start(), m.end())
                            .into_iter()
                            .map(|(start, end)| PiiMatch::new(s.category, text, start, end)),
                    ),
                    Filter::Entropy => {
                        if is_high_entropy_secret(m.as_str()) {
                            found.push(PiiMatch::new(s.category, text, m.start(), m.end()));
                        }
                    }
                }
            }
        }
        found
    }

    /// True if any enabled scanner fires.
    pub fn contains_pii(&self, text: &str) -> bool {
        !self.detect(text).is_empty()
    }
}

fn scanner(category: PiiCategory, pattern: &str, filter: Filter) -> Result<Scanner, ConfigError> {
    let regex = Regex::new(pattern).map_err(|e| ConfigError::DetectorPattern {
        category: category.to_string(),
        reason: e.to_string(),
    })?;
    Ok(Scanner { category, regex, filter })
}

/// Card numbers inside a run of digit groups spanning `text[start..end]`.
///
/// Every window of whole, adjacent groups holding 13 to 19 digits is a
/// candidate if it passes Luhn. Candidates are ranked by, in order: not
/// splitting a dash-joined number, fewest groups under four digits, most
/// digits, leftmost. Each is taken unless it shares a group with one
/// already taken, so a short number or phone beside a card never hides it.
fn card_spans(text: &str, start: usize, end: usize) -> Vec<(usize, usize)> {
    // (first byte, end byte, digits)
    let mut groups: Vec<(usize, usize, Vec<u8>)> = Vec::new();
    for (offset, &b) in text.as_bytes()[start..end].iter().enumerate() {
        if !b.is_ascii_digit() {
            continue;
        }
        let at = start + offset;
        match groups.last_mut() {
            Some(group) if group.1 == at => {
                group.1 = at + 1;
                group.2.push(b - b'0');
            }
            _ => groups.push((at, at + 1, vec![b - b'0'])),
        }
    }

    let dashed_after = |i: usize| i + 1 < groups.len() && text.as_bytes()[groups[i].1] == b'-';
    let mut windows = Vec::new();
    for first in 0..groups.len() {
        let mut digits = Vec::new();
        for last in first..groups.len() {
            digits.extend_from_slice(&groups[last].2);
            if digits.len() > 19 {
                break;
            }
            if digits.len() < 13 || !luhn_valid(&digits) {
                continue;
            }
            let splits = usize::from(first > 0 && dashed_after(first - 1))
                + usize::from(dashed_after(last));
            let short = groups[first..=last].iter().filter(|g| g.2.len() < 4).count();
            windows.push(((splits, short, Reverse(digits.len()), first), first, last));
        }
    }
    windows.sort_unstable();

    let mut taken = vec![false; groups.len()];
    let mut spans = Vec::new();
    for (_, first, last) in windows {
        if taken[first..=last].iter().any(|&t| t) {
            continue;
        }
        taken[first..=last].iter_mut().for_each(|t| *t = true);
        spans.push((groups[first].0, groups[last].1));
    }
    spans.sort_unstable();
    spans
}

/// Luhn checksum over decimal digits.
pub fn luhn_valid(digits: &[u8]) -> bool {
    if digits.is_empty() {
        return false;
    }
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            let d = u32::from(d);
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

/// Shannon entropy in bits per character.
pub fn shannon_entropy(s: &str) -> f64 {
    let mut counts = std::collections::HashMap::new();
    let mut total = 0usize;
    for c in s.chars() {
        *counts.entry(c).or_insert(0usize) += 1;
        total += 1;
    }
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    counts
        .values()
        .map(|&n| {
            let p = n as f64 / total;
            -p * p.log2()
        })
        .sum()
}

fn is_high_entropy_secret(candidate: &str) -> bool {
    candidate.chars().any(|c| c.is_ascii_alphabetic())
        && candidate.chars().any(|c| c.is_ascii_digit())
        && shannon_entropy(candidate) >= GENERIC_MIN_ENTROPY
}
