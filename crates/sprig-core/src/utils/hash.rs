//! Content fingerprints.
//!
//! A fingerprint is an algorithm tag plus a hex digest (`blake3:ab12…`).
//! Sources may report digests computed with other algorithms; only blake3
//! fingerprints can be recomputed locally.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{SprigError, SprigResult};

const BLAKE3: &str = "blake3";

/// Opaque content hash of a package artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint {
    algorithm: String,
    digest: String,
}

impl Fingerprint {
    /// Blake3 fingerprint of some bytes
    pub fn of_bytes(data: &[u8]) -> Self {
        Self {
            algorithm: BLAKE3.to_string(),
            digest: blake3_hash(data),
        }
    }

    /// Build a fingerprint from an algorithm name and hex digest
    pub fn from_hex(algorithm: &str, digest: &str) -> SprigResult<Self> {
        let invalid = |reason: String| SprigError::IntegrityFailure {
            package: "fingerprint".to_string(),
            expected: "algorithm:hex-digest".to_string(),
            actual: reason,
        };

        if algorithm.is_empty() || !algorithm.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid(format!("bad algorithm '{}'", algorithm)));
        }
        let bytes = hex::decode(digest).map_err(|e| invalid(format!("invalid hex: {}", e)))?;
        if bytes.is_empty() {
            return Err(invalid("empty digest".to_string()));
        }

        Ok(Self {
            algorithm: algorithm.to_ascii_lowercase(),
            digest: hex::encode(bytes),
        })
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Check data against this fingerprint, when the algorithm is known
    pub fn verify(&self, data: &[u8]) -> SprigResult<()> {
        if self.algorithm != BLAKE3 {
            return Ok(());
        }
        verify_integrity(data, &self.digest)
    }
}

impl FromStr for Fingerprint {
    type Err = SprigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((algorithm, digest)) => Self::from_hex(algorithm, digest),
            None => Self::from_hex(BLAKE3, s),
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.digest)
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Compute Blake3 hash of data
pub fn blake3_hash(data: &[u8]) -> String {
    let hash = blake3::hash(data);
    hash.to_hex().to_string()
}

/// Compute Blake3 hash of a file
pub fn blake3_hash_file(path: &std::path::Path) -> SprigResult<String> {
    let data = std::fs::read(path)
        .map_err(|e| SprigError::io(format!("Failed to read file: {}", path.display()), e))?;
    Ok(blake3_hash(&data))
}

/// Verify data integrity against expected hash
pub fn verify_integrity(data: &[u8], expected_hash: &str) -> SprigResult<()> {
    let actual_hash = blake3_hash(data);
    if actual_hash == expected_hash {
        Ok(())
    } else {
        Err(SprigError::IntegrityFailure {
            package: "unknown".to_string(),
            expected: expected_hash.to_string(),
            actual: actual_hash,
        })
    }
}
