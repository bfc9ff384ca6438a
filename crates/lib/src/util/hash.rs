//! Content digests for build-graph fragments and service descriptions.
//!
//! A digest is the SHA-256 of a value's canonical JSON form. Struct fields
//! serialize in declaration order and maps are ordered, so equal values
//! always produce equal digests.

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

pub type HashError = serde_json::Error;

/// A full content digest, rendered as `sha256:<64 hex chars>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Digest(pub String);

impl Digest {
  /// The hex part of the digest, without the algorithm prefix.
  pub fn hex(&self) -> &str {
    self.0.strip_prefix("sha256:").unwrap_or(&self.0)
  }
}

impl std::fmt::Display for Digest {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

pub trait Hashable: Serialize {
  fn digest(&self) -> Result<Digest, HashError> {
    let serialized = serde_json::to_vec(self)?;
    Ok(hash_bytes(&serialized))
  }
}

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> Digest {
  let mut hasher = Sha256::new();
  hasher.update(data);
  Digest(format!("sha256:{}", hex::encode(hasher.finalize())))
}
