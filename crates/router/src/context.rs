//! Request-scoped context handed to every resolver.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tokio::sync::watch;

use crate::error::ResolveError;

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Returned when work is abandoned because its request was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("request cancelled")]
pub struct Cancelled;

impl From<Cancelled> for ResolveError {
  fn from(_: Cancelled) -> Self {
    ResolveError::Cancelled
  }
}

/// Cancellation signal shared by everything working on one request.
///
/// Clones observe the same signal. Once cancelled, a token stays cancelled.
#[derive(Debug, Clone)]
pub struct CancelToken {
  sender: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
  fn default() -> Self {
    Self::new()
  }
}

impl CancelToken {
  pub fn new() -> Self {
    let (sender, _) = watch::channel(false);
    Self {
      sender: Arc::new(sender),
    }
  }

  pub fn cancel(&self) {
    self.sender.send_replace(true);
  }

  pub fn is_cancelled(&self) -> bool {
    *self.sender.borrow()
  }

  /// Completes once the token is cancelled.
  pub async fn cancelled(&self) {
    let mut receiver = self.sender.subscribe();
    // The sender lives as long as `self`, so this only returns on cancel.
    let _ = receiver.wait_for(|cancelled| *cancelled).await;
  }

  /// Drive `fut` to completion unless the token is cancelled first.
  ///
  /// On cancellation `fut` is dropped, which aborts whatever it was awaiting.
  pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Cancelled> {
    if self.is_cancelled() {
      return Err(Cancelled);
    }

    tokio::select! {
      biased;
      _ = self.cancelled() => Err(Cancelled),
      out = fut => Ok(out),
    }
  }
}

struct ContextInner {
  request_id: u64,
  cancel: CancelToken,
}

/// Context for one request. Cheap to clone; every field resolver of the
/// request receives a clone.
#[derive(Clone)]
pub struct Context {
  inner: Arc<ContextInner>,
}

impl std::fmt::Debug for Context {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Context")
      .field("request_id", &self.inner.request_id)
      .field("cancelled", &self.inner.cancel.is_cancelled())
      .finish()
  }
}

impl Default for Context {
  fn default() -> Self {
    Self::new()
  }
}

impl Context {
  /// Create a context with a fresh request id and cancellation token.
  pub fn new() -> Self {
    Self::with_cancel(CancelToken::new())
  }

  /// Create a context observing an existing cancellation token.
  pub fn with_cancel(cancel: CancelToken) -> Self {
    Self {
      inner: Arc::new(ContextInner {
        request_id: NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed),
        cancel,
      }),
    }
  }

  pub fn request_id(&self) -> u64 {
    self.inner.request_id
  }

  pub fn cancel_token(&self) -> &CancelToken {
    &self.inner.cancel
  }

  pub fn is_cancelled(&self) -> bool {
    self.inner.cancel.is_cancelled()
  }

  /// Shorthand for [`CancelToken::run`] on this request's token.
  pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Cancelled> {
    self.inner.cancel.run(fut).await
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use super::*;

  #[tokio::test]
  async fn run_completes_when_not_cancelled() {
    let ctx = Context::new();
    assert_eq!(ctx.run(async { 7 }).await, Ok(7));
  }

  #[tokio::test]
  async fn run_aborts_pending_work_on_cancel() {
    let ctx = Context::new();
    let token = ctx.cancel_token().clone();

    tokio::spawn(async move {
      tokio::time::sleep(Duration::from_millis(10)).await;
      token.cancel();
    });

    let result = ctx.run(std::future::pending::<()>()).await;
    assert_eq!(result, Err(Cancelled));
    assert!(ctx.is_cancelled());
  }

  #[tokio::test]
  async fn already_cancelled_token_short_circuits() {
    let token = CancelToken::new();
    token.cancel();
    assert_eq!(token.run(async { 1 }).await, Err(Cancelled));
  }

  #[test]
  fn request_ids_are_unique() {
    assert_ne!(Context::new().request_id(), Context::new().request_id());
  }
}
