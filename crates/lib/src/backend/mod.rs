//! The execution backend contract.
//!
//! A backend solves build-graph definitions into references that can be
//! read, builds container images from build definitions, and runs services.
//! The object model only ever talks to a backend through these traits.

pub mod memory;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::Definition;
use crate::model::container::ImageConfig;
use crate::platform::Platform;
use crate::services::ServiceSpec;

pub use memory::MemoryBackend;

#[derive(Debug, Error)]
pub enum BackendError {
  #[error("{path}: no such file or directory")]
  NotFound { path: String },

  #[error("{path}: not a directory")]
  NotADirectory { path: String },

  #[error("{path}: is a directory")]
  IsADirectory { path: String },

  #[error("{path}: file exists")]
  AlreadyExists { path: String },

  #[error("invalid pattern '{pattern}': {message}")]
  InvalidPattern { pattern: String, message: String },

  #[error("{0} is not supported by this backend")]
  Unsupported(&'static str),

  #[error("solve failed: {0}")]
  Solve(String),

  #[error("service {key} failed: {message}")]
  Service { key: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
  File,
  Directory,
}

/// Metadata for one path inside a solved reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStat {
  /// Base name of the path; empty for the root.
  pub name: String,
  pub kind: FileKind,
  pub size: u64,
  pub mode: u32,
  /// Modification time, seconds since the Unix epoch.
  pub modified: i64,
}

impl FileStat {
  pub fn is_dir(&self) -> bool {
    self.kind == FileKind::Directory
  }
}

/// A solved definition that can be read.
#[async_trait]
pub trait Reference: Send + Sync + fmt::Debug {
  /// Entries of the directory at `path`, sorted by name.
  async fn read_dir(&self, path: &str) -> Result<Vec<FileStat>, BackendError>;

  async fn read_file(&self, path: &str) -> Result<Vec<u8>, BackendError>;

  async fn stat(&self, path: &str) -> Result<FileStat, BackendError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildArg {
  pub name: String,
  pub value: String,
}

/// A secret made available to a build, by ID.
#[derive(Clone, PartialEq, Eq)]
pub struct BuildSecret {
  pub id: String,
  pub plaintext: Vec<u8>,
}

impl fmt::Debug for BuildSecret {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BuildSecret").field("id", &self.id).finish_non_exhaustive()
  }
}

#[derive(Debug, Clone)]
pub struct DockerBuildRequest {
  /// Build context.
  pub context: Definition,
  /// Working path of the context inside `context`.
  pub context_dir: String,
  /// Build definition path, relative to `context_dir`.
  pub dockerfile: String,
  pub build_args: Vec<BuildArg>,
  pub target: Option<String>,
  pub secrets: Vec<BuildSecret>,
  pub platform: Platform,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
  pub rootfs: Definition,
  pub config: ImageConfig,
}

/// Handle to a running service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningService {
  pub key: String,
  pub hostname: String,
  pub ports: Vec<u16>,
}

#[async_trait]
pub trait Backend: Send + Sync {
  fn name(&self) -> &str;

  /// Solve a definition. `None` means it denotes an empty result.
  async fn solve(&self, definition: &Definition) -> Result<Option<Arc<dyn Reference>>, BackendError>;

  async fn build_dockerfile(&self, request: DockerBuildRequest) -> Result<BuildResult, BackendError>;

  async fn start_service(&self, spec: &ServiceSpec) -> Result<RunningService, BackendError>;

  async fn stop_service(&self, service: &RunningService) -> Result<(), BackendError>;
}
