//! Errors returned by field resolution.

use std::error::Error as StdError;

use thiserror::Error;

/// Message of the not-implemented stub, kept fixed so clients can match it.
pub const NOT_IMPLEMENTED_MESSAGE: &str = "not implemented yet";

/// An error produced while resolving a single field.
///
/// Field errors are isolated: the executor records them against the field's
/// response path and keeps resolving sibling fields.
#[derive(Debug, Error)]
pub enum ResolveError {
  /// The field is declared but intentionally has no implementation.
  #[error("not implemented yet")]
  NotImplemented { type_name: String, field: String },

  /// Arguments did not match the field's declared argument types.
  #[error("invalid arguments: {0}")]
  InvalidArguments(String),

  /// The parent value is not of the type the resolver works on.
  #[error("expected parent of type {expected}, found {found}")]
  InvalidParent { expected: String, found: String },

  /// The resolver returned a value its declared type cannot hold.
  #[error("invalid result: {0}")]
  InvalidResult(String),

  /// The request was cancelled before the field completed.
  #[error("request cancelled")]
  Cancelled,

  /// An error raised by the domain the resolver belongs to, with its code.
  #[error("{source}")]
  Domain {
    code: &'static str,
    source: Box<dyn StdError + Send + Sync>,
  },
}

impl ResolveError {
  pub fn domain(code: &'static str, source: impl StdError + Send + Sync + 'static) -> Self {
    ResolveError::Domain {
      code,
      source: Box::new(source),
    }
  }

  /// Stable error code surfaced as `extensions.code` in responses.
  pub fn code(&self) -> &'static str {
    match self {
      ResolveError::NotImplemented { .. } => "NOT_IMPLEMENTED",
      ResolveError::InvalidArguments(_) => "INVALID_ARGUMENTS",
      ResolveError::InvalidParent { .. } => "INVALID_PARENT",
      ResolveError::InvalidResult(_) => "INVALID_RESULT",
      ResolveError::Cancelled => "CANCELLED",
      ResolveError::Domain { code, .. } => code,
    }
  }
}
