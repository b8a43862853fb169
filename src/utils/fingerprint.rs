use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 digest of a value's canonical JSON serialization.
///
/// Structurally equal values produce equal fingerprints, which lets collections be de-duplicated
/// with a hash set instead of pairwise comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentFingerprint([u8; 32]);

impl ContentFingerprint {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Get a short representation of the fingerprint for logging
    pub fn short_hash(&self) -> String {
        self.0[..4].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Fingerprint `value`; `None` when it cannot be serialized.
pub fn fingerprint_of<T: Serialize>(value: &T) -> Option<ContentFingerprint> {
    let bytes = serde_json::to_vec(value).ok()?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Some(ContentFingerprint(hasher.finalize().into()))
}
