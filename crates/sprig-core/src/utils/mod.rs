//! Utility functions and helpers.
//!
//! Common functionality used across multiple sprig crates.

pub mod hash;

// Re-export commonly used utilities
pub use hash::{blake3_hash, blake3_hash_file, verify_integrity, Fingerprint};
