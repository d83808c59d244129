//! # govern-core: Foundational Types for Agent Governance
//!
//! Every other crate in the workspace depends on `govern-core`; it depends on
//! nothing internal.
//!
//! ## Design Principles
//!
//! 1. **[`CanonicalBytes`] is the sole path to hashing.** Payload hashes and
//!    receipt signatures are computed over `CanonicalBytes::new()` output
//!    (RFC 8785 JCS), so semantically identical payloads always hash
//!    identically regardless of key order or whitespace.
//!
//! 2. **One [`Decision`] enum.** ALLOW, REDACT and DENY with their precedence
//!    encoded in `Ord`, shared by the evaluator, the engine and receipts.
//!
//! 3. **Total field resolution.** [`payload::resolve`] never fails; a missing
//!    segment is a distinguished [`Resolved::Missing`] value, not an error.
//!
//! 4. **Tagged errors.** [`GovernError`] wraps the per-subsystem error enums and
//!    exposes an [`ErrorKind`] tag. No `Box<dyn Error>`, no `.unwrap()`
//!    outside tests.

pub mod canonical;
pub mod decision;
pub mod digest;
pub mod error;
pub mod payload;
pub mod temporal;

// Re-export primary types at crate root for ergonomic imports.
pub use canonical::CanonicalBytes;
pub use decision::Decision;
pub use digest::{sha256_digest, sha256_hex, to_hex, ContentDigest};
pub use error::{
    CanonicalizationError, ConfigError, ErrorKind, GovernError, StorageError, ValidationError,
};
pub use payload::{resolve, resolve_mut, Payload, Resolved};
pub use temporal::Timestamp;
