//! Reference-counted service lifetimes.
//!
//! [`ServiceManager::with_services`] keeps every binding an operation needs
//! running for as long as the operation runs. Each binding key has at most
//! one running instance: concurrent callers share the start, and the last
//! lease released stops it. Leases release on every exit path; a lease
//! dropped without [`ServiceLeases::release`] (an error unwinding or a
//! cancelled future) schedules the stop on the runtime instead.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::{ServiceBinding, ServiceBindings};
use crate::backend::{Backend, BackendError, RunningService};

#[derive(Debug, Error)]
pub enum ServiceError {
  #[error("failed to start service {hostname}: {source}")]
  Start {
    hostname: String,
    #[source]
    source: BackendError,
  },

  #[error("invalid service description: {0}")]
  Describe(#[from] serde_json::Error),
}

struct Slot {
  refs: usize,
  service: Arc<OnceCell<RunningService>>,
}

struct Inner {
  backend: Arc<dyn Backend>,
  slots: Mutex<HashMap<String, Slot>>,
}

impl Inner {
  /// Drop one reference to `key`, returning the service to stop if it was
  /// the last one.
  fn release(&self, key: &str) -> Option<RunningService> {
    let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
    let slot = slots.get_mut(key)?;
    slot.refs -= 1;
    if slot.refs > 0 {
      return None;
    }
    slots.remove(key).and_then(|slot| slot.service.get().cloned())
  }

  async fn stop(&self, service: RunningService) {
    match self.backend.stop_service(&service).await {
      Ok(()) => info!(service = %service.hostname, "service released"),
      Err(e) => warn!(service = %service.hostname, error = %e, "failed to stop service"),
    }
  }
}

#[derive(Clone)]
pub struct ServiceManager {
  inner: Arc<Inner>,
}

impl std::fmt::Debug for ServiceManager {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ServiceManager").finish_non_exhaustive()
  }
}

impl ServiceManager {
  pub fn new(backend: Arc<dyn Backend>) -> Self {
    Self {
      inner: Arc::new(Inner {
        backend,
        slots: Mutex::new(HashMap::new()),
      }),
    }
  }

  /// Number of bindings currently held by at least one lease.
  #[cfg(test)]
  pub(crate) fn active(&self) -> usize {
    self.inner.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
  }

  /// Run `operation` with every binding in `bindings` running.
  pub async fn with_services<T, E, F>(&self, bindings: &ServiceBindings, operation: F) -> Result<T, E>
  where
    F: Future<Output = Result<T, E>>,
    E: From<ServiceError>,
  {
    if bindings.is_empty() {
      return operation.await;
    }

    let leases = self.acquire(bindings).await?;
    let result = operation.await;
    leases.release().await;
    result
  }

  /// Start (or join) every binding, returning leases that keep them up.
  pub async fn acquire(&self, bindings: &ServiceBindings) -> Result<ServiceLeases, ServiceError> {
    let mut leases = ServiceLeases { leases: Vec::new() };
    for (key, binding) in bindings.iter() {
      leases.leases.push(self.acquire_one(key, binding).await?);
    }
    Ok(leases)
  }

  async fn acquire_one(&self, key: &str, binding: &ServiceBinding) -> Result<ServiceLease, ServiceError> {
    let cell = {
      let mut slots = self.inner.slots.lock().unwrap_or_else(PoisonError::into_inner);
      let slot = slots.entry(key.to_string()).or_insert_with(|| Slot {
        refs: 0,
        service: Arc::new(OnceCell::new()),
      });
      slot.refs += 1;
      slot.service.clone()
    };

    // Counted before starting, so a failed or cancelled start gives the
    // reference back when the lease drops.
    let lease = ServiceLease {
      key: key.to_string(),
      inner: Some(self.inner.clone()),
    };

    let hostname = binding.service.hostname()?;
    let started = cell
      .get_or_try_init(|| async {
        debug!(service = %hostname, "starting service");
        self.inner.backend.start_service(&binding.service).await
      })
      .await;
    if let Err(source) = started {
      return Err(ServiceError::Start { hostname, source });
    }

    Ok(lease)
  }
}

struct ServiceLease {
  key: String,
  inner: Option<Arc<Inner>>,
}

impl Drop for ServiceLease {
  fn drop(&mut self) {
    let Some(inner) = self.inner.take() else {
      return;
    };
    let Some(service) = inner.release(&self.key) else {
      return;
    };

    match tokio::runtime::Handle::try_current() {
      Ok(handle) => {
        handle.spawn(async move { inner.stop(service).await });
      }
      Err(_) => warn!(service = %service.hostname, "no runtime to stop service on"),
    }
  }
}

/// Leases on a set of bindings, held for the duration of one operation.
pub struct ServiceLeases {
  leases: Vec<ServiceLease>,
}

impl ServiceLeases {
  /// Release every lease, stopping services nobody else holds.
  pub async fn release(mut self) {
    for mut lease in self.leases.drain(..) {
      let Some(inner) = lease.inner.take() else {
        continue;
      };
      if let Some(service) = inner.release(&lease.key) {
        inner.stop(service).await;
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::time::Duration;

  use async_trait::async_trait;

  use super::*;
  use crate::backend::{BuildResult, DockerBuildRequest, Reference};
  use crate::graph::Definition;
  use crate::model::container::ImageConfig;
  use crate::platform::Platform;
  use crate::services::ServiceSpec;

  #[derive(Default)]
  struct CountingBackend {
    starts: AtomicUsize,
    stops: AtomicUsize,
    fail: bool,
  }

  #[async_trait]
  impl Backend for CountingBackend {
    fn name(&self) -> &str {
      "counting"
    }

    async fn solve(&self, _definition: &Definition) -> Result<Option<Arc<dyn Reference>>, BackendError> {
      Ok(None)
    }

    async fn build_dockerfile(&self, _request: DockerBuildRequest) -> Result<BuildResult, BackendError> {
      Err(BackendError::Unsupported("builds"))
    }

    async fn start_service(&self, spec: &ServiceSpec) -> Result<RunningService, BackendError> {
      // Widen the window for concurrent starters.
      tokio::time::sleep(Duration::from_millis(20)).await;
      self.starts.fetch_add(1, Ordering::SeqCst);
      if self.fail {
        return Err(BackendError::Service {
          key: "x".into(),
          message: "boom".into(),
        });
      }
      Ok(RunningService {
        key: spec.key().unwrap(),
        hostname: spec.hostname().unwrap(),
        ports: spec.ports.clone(),
      })
    }

    async fn stop_service(&self, _service: &RunningService) -> Result<(), BackendError> {
      self.stops.fetch_add(1, Ordering::SeqCst);
      Ok(())
    }
  }

  fn bindings() -> ServiceBindings {
    let spec = ServiceSpec {
      rootfs: None,
      config: ImageConfig::default(),
      platform: Platform::host_default(),
      ports: vec![8080],
    };
    ServiceBindings::new().bind("web", spec).unwrap()
  }

  #[derive(Debug, Error)]
  enum OpError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("operation failed")]
    Failed,
  }

  #[tokio::test]
  async fn services_run_for_the_operation_and_stop_after() {
    let backend = Arc::new(CountingBackend::default());
    let manager = ServiceManager::new(backend.clone());

    let during = manager
      .with_services(&bindings(), async {
        Ok::<_, OpError>((backend.starts.load(Ordering::SeqCst), manager.active()))
      })
      .await
      .unwrap();

    assert_eq!(during, (1, 1));
    assert_eq!(backend.stops.load(Ordering::SeqCst), 1);
    assert_eq!(manager.active(), 0);
  }

  #[tokio::test]
  async fn concurrent_operations_share_one_start() {
    let backend = Arc::new(CountingBackend::default());
    let manager = ServiceManager::new(backend.clone());
    let bindings = bindings();

    let op = || async {
      tokio::time::sleep(Duration::from_millis(30)).await;
      Ok::<_, OpError>(())
    };
    let (a, b) = tokio::join!(
      manager.with_services(&bindings, op()),
      manager.with_services(&bindings, op())
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(backend.starts.load(Ordering::SeqCst), 1);
    assert_eq!(backend.stops.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn failing_operations_still_release() {
    let backend = Arc::new(CountingBackend::default());
    let manager = ServiceManager::new(backend.clone());

    let result = manager
      .with_services(&bindings(), async { Err::<(), _>(OpError::Failed) })
      .await;

    assert!(matches!(result, Err(OpError::Failed)));
    assert_eq!(backend.stops.load(Ordering::SeqCst), 1);
    assert_eq!(manager.active(), 0);
  }

  #[tokio::test]
  async fn cancelled_operations_release_on_drop() {
    let backend = Arc::new(CountingBackend::default());
    let manager = ServiceManager::new(backend.clone());

    let binding = bindings();
    let pending = manager.with_services(&binding, std::future::pending::<Result<(), OpError>>());
    assert!(tokio::time::timeout(Duration::from_millis(100), pending).await.is_err());

    // The stop is spawned from the dropped lease.
    for _ in 0..50 {
      if backend.stops.load(Ordering::SeqCst) == 1 {
        break;
      }
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(backend.stops.load(Ordering::SeqCst), 1);
    assert_eq!(manager.active(), 0);
  }

  #[tokio::test]
  async fn start_failures_are_binding_errors() {
    let backend = Arc::new(CountingBackend {
      fail: true,
      ..Default::default()
    });
    let manager = ServiceManager::new(backend.clone());

    let result = manager.with_services(&bindings(), async { Ok::<_, OpError>(()) }).await;

    assert!(matches!(result, Err(OpError::Service(ServiceError::Start { .. }))));
    assert_eq!(backend.stops.load(Ordering::SeqCst), 0);
    assert_eq!(manager.active(), 0);
  }
}
