//! # govern-pii: PII Detection & Redaction
//!
//! Finds sensitive data in free text and replaces it with category
//! placeholders such as `[REDACTED_EMAIL]`.
//!
//! Pipeline:
//!
//! 1. [`PiiDetector`] runs per-category scanners and returns raw, possibly
//!    overlapping matches. Card numbers are Luhn-checked; generic secrets
//!    must clear an entropy threshold.
//! 2. [`resolve_overlaps`] keeps a deterministic, non-overlapping subset,
//!    preferring earlier spans, then higher category priority
//!    (API_KEY > CREDIT_CARD > SSN > EMAIL > PHONE > IP_ADDRESS).
//! 3. [`apply_redactions`] rewrites the text in one pass.
//!
//! [`Redactor`] wraps all three and extends them to nested payloads.

pub mod category;
pub mod detector;
pub mod overlap;
pub mod redactor;

// Re-export primary types.
pub use category::PiiCategory;
pub use detector::{luhn_valid, PiiDetector, PiiMatch};
pub use overlap::resolve_overlaps;
pub use redactor::{
    apply_redactions, summarize, LocatedMatch, RedactedStructure, RedactedText, Redactor,
    FIELD_MASK,
};
