//! Opaque object identifiers.
//!
//! An ID is the URL-safe, unpadded base64 of a JSON envelope:
//!
//! ```text
//! {"v": 1, "kind": "Directory", "payload": { ... }}
//! ```
//!
//! The version is pinned, so IDs stay valid across processes running the
//! same format version. Decoding checks both the version and the kind, so an
//! ID minted for one kind of object never decodes as another.

use std::fmt;
use std::marker::PhantomData;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::ID_FORMAT_VERSION;

/// Kinds of objects that can be identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdKind {
  Query,
  Directory,
  File,
  FileInfo,
  Container,
  Secret,
  Service,
}

impl IdKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      IdKind::Query => "Query",
      IdKind::Directory => "Directory",
      IdKind::File => "File",
      IdKind::FileInfo => "FileInfo",
      IdKind::Container => "Container",
      IdKind::Secret => "Secret",
      IdKind::Service => "Service",
    }
  }
}

impl fmt::Display for IdKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Error)]
pub enum DecodeError {
  #[error("empty {0} ID")]
  Empty(IdKind),

  #[error("malformed ID: {0}")]
  Base64(#[from] base64::DecodeError),

  #[error("malformed ID payload: {0}")]
  Json(#[from] serde_json::Error),

  #[error("expected {expected} ID, got {found} ID")]
  KindMismatch { expected: IdKind, found: IdKind },

  #[error("unsupported ID format version {found} (expected {expected})")]
  UnsupportedVersion { expected: u32, found: u32 },
}

#[derive(Debug, Error)]
#[error("failed to encode {kind} ID: {source}")]
pub struct EncodeError {
  pub kind: IdKind,
  #[source]
  pub source: serde_json::Error,
}

/// A payload that can be carried by an opaque ID.
pub trait Identified: Serialize + DeserializeOwned {
  const KIND: IdKind;
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
  v: u32,
  kind: IdKind,
  payload: &'a T,
}

#[derive(Deserialize)]
struct Envelope {
  v: u32,
  kind: IdKind,
  payload: serde_json::Value,
}

/// Encode a payload as an opaque ID string.
pub fn encode_id<T: Identified>(payload: &T) -> Result<String, EncodeError> {
  let envelope = EnvelopeRef {
    v: ID_FORMAT_VERSION,
    kind: T::KIND,
    payload,
  };
  let json = serde_json::to_vec(&envelope).map_err(|source| EncodeError { kind: T::KIND, source })?;
  Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Decode an opaque ID string into a payload of kind `T`.
pub fn decode_id<T: Identified>(id: &str) -> Result<T, DecodeError> {
  if id.is_empty() {
    return Err(DecodeError::Empty(T::KIND));
  }

  let bytes = URL_SAFE_NO_PAD.decode(id)?;
  let envelope: Envelope = serde_json::from_slice(&bytes)?;

  if envelope.v != ID_FORMAT_VERSION {
    return Err(DecodeError::UnsupportedVersion {
      expected: ID_FORMAT_VERSION,
      found: envelope.v,
    });
  }
  if envelope.kind != T::KIND {
    return Err(DecodeError::KindMismatch {
      expected: T::KIND,
      found: envelope.kind,
    });
  }

  Ok(serde_json::from_value(envelope.payload)?)
}

/// An encoded ID whose kind is known at compile time.
pub struct ObjectId<T> {
  raw: String,
  _kind: PhantomData<fn() -> T>,
}

impl<T: Identified> ObjectId<T> {
  pub fn encode(payload: &T) -> Result<Self, EncodeError> {
    Ok(Self {
      raw: encode_id(payload)?,
      _kind: PhantomData,
    })
  }

  /// Wrap a string received from a client. No decoding happens until
  /// [`ObjectId::decode`] is called.
  pub fn from_raw(raw: impl Into<String>) -> Self {
    Self {
      raw: raw.into(),
      _kind: PhantomData,
    }
  }

  pub fn decode(&self) -> Result<T, DecodeError> {
    decode_id(&self.raw)
  }

  pub fn as_str(&self) -> &str {
    &self.raw
  }

  pub fn is_empty(&self) -> bool {
    self.raw.is_empty()
  }
}

impl<T> Clone for ObjectId<T> {
  fn clone(&self) -> Self {
    Self {
      raw: self.raw.clone(),
      _kind: PhantomData,
    }
  }
}

impl<T> PartialEq for ObjectId<T> {
  fn eq(&self, other: &Self) -> bool {
    self.raw == other.raw
  }
}

impl<T> Eq for ObjectId<T> {}

impl<T> fmt::Debug for ObjectId<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("ObjectId").field(&self.raw).finish()
  }
}

impl<T> fmt::Display for ObjectId<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.raw)
  }
}

impl<'de, T> Deserialize<'de> for ObjectId<T> {
  fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    Ok(Self {
      raw: String::deserialize(deserializer)?,
      _kind: PhantomData,
    })
  }
}
