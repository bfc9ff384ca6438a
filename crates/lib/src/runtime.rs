//! Everything object reads need at run time, injected into the resolvers
//! that perform them.

use std::future::Future;
use std::sync::Arc;

use graft_router::Context;
use tracing::debug;

use crate::backend::{Backend, BuildResult, DockerBuildRequest, Reference};
use crate::config::EngineConfig;
use crate::graph::Definition;
use crate::model::{ModelError, SecretStore};
use crate::services::{ServiceBindings, ServiceManager};
use crate::util::hash::Hashable;

pub struct Runtime {
  backend: Arc<dyn Backend>,
  services: ServiceManager,
  secrets: SecretStore,
  config: EngineConfig,
}

impl std::fmt::Debug for Runtime {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Runtime")
      .field("backend", &self.backend.name())
      .field("config", &self.config)
      .finish_non_exhaustive()
  }
}

impl Runtime {
  pub fn new(backend: Arc<dyn Backend>, config: EngineConfig) -> Self {
    Self {
      services: ServiceManager::new(backend.clone()),
      backend,
      secrets: SecretStore::new(),
      config,
    }
  }

  pub fn backend(&self) -> &Arc<dyn Backend> {
    &self.backend
  }

  pub fn services(&self) -> &ServiceManager {
    &self.services
  }

  pub fn secrets(&self) -> &SecretStore {
    &self.secrets
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  /// Solve `definition`, giving up if the request is cancelled first.
  pub async fn solve(&self, ctx: &Context, definition: &Definition) -> Result<Option<Arc<dyn Reference>>, ModelError> {
    if tracing::enabled!(tracing::Level::DEBUG) {
      let digest = definition.digest().map_err(ModelError::Digest)?;
      debug!(backend = self.backend.name(), digest = %digest, "solving");
    }
    Ok(ctx.run(self.backend.solve(definition)).await??)
  }

  pub async fn build_dockerfile(&self, ctx: &Context, request: DockerBuildRequest) -> Result<BuildResult, ModelError> {
    debug!(
      backend = self.backend.name(),
      dockerfile = %request.dockerfile,
      platform = %request.platform,
      "building"
    );
    Ok(ctx.run(self.backend.build_dockerfile(request)).await??)
  }

  /// Run `operation` with `bindings` up, releasing them when it finishes or
  /// the request is cancelled.
  pub async fn with_services<T, F>(&self, ctx: &Context, bindings: &ServiceBindings, operation: F) -> Result<T, ModelError>
  where
    F: Future<Output = Result<T, ModelError>>,
  {
    ctx.run(self.services.with_services(bindings, operation)).await?
  }
}
