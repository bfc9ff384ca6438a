//! The content-addressed object model.
//!
//! Every object is an immutable value that serializes completely into its
//! opaque ID. Transforms build a new value from the old one's fields plus a
//! delta; reads solve the object's definition on the backend, with the
//! object's service bindings held for the duration of the read.

pub mod container;
pub mod directory;
pub mod file;
pub mod host;
pub mod query;
pub mod secret;
pub mod service;

use std::path::PathBuf;

use graft_router::{Cancelled, ResolveError};
use thiserror::Error;

use crate::backend::BackendError;
use crate::id::{DecodeError, EncodeError};
use crate::platform::Platform;
use crate::services::ServiceError;
use crate::util::hash::HashError;

pub use container::{Container, ImageConfig};
pub use directory::{CopyFilter, DockerBuild, Directory};
pub use file::{File, FileInfo};
pub use query::Query;
pub use secret::{Secret, SecretStore};
pub use service::Service;

#[derive(Debug, Error)]
pub enum ModelError {
  #[error(transparent)]
  Decode(#[from] DecodeError),

  #[error(transparent)]
  Encode(#[from] EncodeError),

  #[error("failed to digest object: {0}")]
  Digest(#[source] HashError),

  #[error("{operation}: no file to read, the result is empty")]
  EmptyResult { operation: &'static str },

  #[error("cannot export to {path}: destination is not a {expected}")]
  ExportDestination { path: PathBuf, expected: &'static str },

  #[error(transparent)]
  ServiceBinding(#[from] ServiceError),

  #[error("platform mismatch: {ours} vs {theirs}")]
  PlatformMismatch { ours: Platform, theirs: Platform },

  #[error("cannot diff directories with different working paths: {ours} vs {theirs}")]
  DiffPathMismatch { ours: String, theirs: String },

  #[error("service {hostname} exposes no ports")]
  NoExposedPorts { hostname: String },

  #[error(transparent)]
  Backend(#[from] BackendError),

  #[error("I/O error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("secret '{0}' not found")]
  UnknownSecret(String),

  #[error("request cancelled")]
  Cancelled,
}

impl From<Cancelled> for ModelError {
  fn from(_: Cancelled) -> Self {
    ModelError::Cancelled
  }
}

impl ModelError {
  pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> ModelError {
    let path = path.into();
    move |source| ModelError::Io { path, source }
  }

  /// Stable code surfaced to clients as `extensions.code`.
  pub fn code(&self) -> &'static str {
    match self {
      ModelError::Decode(_) => "DECODE_ERROR",
      ModelError::Encode(_) | ModelError::Digest(_) => "ENCODE_ERROR",
      ModelError::EmptyResult { .. } => "EMPTY_RESULT",
      ModelError::ExportDestination { .. } => "EXPORT_DESTINATION",
      ModelError::ServiceBinding(_) => "SERVICE_BINDING",
      ModelError::PlatformMismatch { .. } => "PLATFORM_MISMATCH",
      ModelError::DiffPathMismatch { .. } => "DIFF_PATH_MISMATCH",
      ModelError::NoExposedPorts { .. } => "NO_EXPOSED_PORTS",
      ModelError::Backend(_) => "BACKEND_ERROR",
      ModelError::Io { .. } => "IO_ERROR",
      ModelError::UnknownSecret(_) => "UNKNOWN_SECRET",
      ModelError::Cancelled => "CANCELLED",
    }
  }
}

impl From<ModelError> for ResolveError {
  fn from(err: ModelError) -> Self {
    match err {
      ModelError::Cancelled => ResolveError::Cancelled,
      err => ResolveError::domain(err.code(), err),
    }
  }
}
