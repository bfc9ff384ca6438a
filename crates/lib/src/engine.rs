//! The assembled engine: a runtime plus the registry of every schema module.

use std::sync::Arc;

use graft_router::{Context, Registry, RegistryBuilder, RegistryError, Request, Response, Value};
use thiserror::Error;
use tracing::info;

use crate::backend::Backend;
use crate::config::{ConfigError, EngineConfig};
use crate::model::{ModelError, Query};
use crate::runtime::Runtime;
use crate::schema;

#[derive(Debug, Error)]
pub enum EngineError {
  #[error("invalid configuration: {0}")]
  Config(#[from] ConfigError),

  #[error("failed to build the schema registry: {0}")]
  Registry(#[from] RegistryError),

  #[error("failed to encode the root query: {0}")]
  Root(#[from] ModelError),
}

#[derive(Debug, Clone)]
pub struct Engine {
  registry: Registry,
  runtime: Arc<Runtime>,
  root: String,
}

impl Engine {
  pub fn new(backend: Arc<dyn Backend>, config: EngineConfig) -> Result<Self, EngineError> {
    let runtime = Arc::new(Runtime::new(backend, config));

    let registry = schema::modules(&runtime)
      .into_iter()
      .fold(RegistryBuilder::new(), RegistryBuilder::register_arc)
      .build()?;

    info!(
      backend = runtime.backend().name(),
      platform = %runtime.config().platform,
      "engine ready"
    );

    Ok(Self {
      registry,
      runtime,
      root: Query::new().id()?,
    })
  }

  /// Build an engine configured from the environment.
  pub fn from_env(backend: Arc<dyn Backend>) -> Result<Self, EngineError> {
    Self::new(backend, EngineConfig::from_env()?)
  }

  pub fn registry(&self) -> &Registry {
    &self.registry
  }

  pub fn runtime(&self) -> &Arc<Runtime> {
    &self.runtime
  }

  /// The merged schema in SDL form.
  pub fn schema_sdl(&self) -> String {
    self.registry.schema().to_sdl()
  }

  pub async fn execute(&self, request: Request) -> Response {
    self.execute_with(Context::new(), request).await
  }

  /// Execute under a caller-provided context, e.g. one that can be cancelled.
  pub async fn execute_with(&self, ctx: Context, request: Request) -> Response {
    let root = Value::object("Query", self.root.clone());
    self.registry.execute(ctx, root, request).await
  }
}
