//! # govern-receipt: Compliance Receipts
//!
//! Tamper-evident audit records of governance decisions, and the stores that
//! keep them.
//!
//! ## Security Invariant
//!
//! Every payload hash is `sha256(CanonicalBytes::new(payload))`, and every
//! signature is HMAC-SHA256 over `CanonicalBytes::new(receipt.body())`.
//! Verification recomputes the signature and compares with
//! `subtle::ConstantTimeEq`; it returns `bool`, never an error.

pub mod receipt;
pub mod store;

// Re-export primary types.
pub use receipt::{
    payload_hash, Receipt, ReceiptBody, ReceiptGenerator, ReceiptInput, SigningKey, MIN_KEY_LEN,
};
pub use store::{FileReceiptStore, MemoryReceiptStore, ReceiptLog, ReceiptQuery, ReceiptStore};
