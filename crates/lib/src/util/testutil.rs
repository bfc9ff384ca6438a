//! Helpers shared by unit tests.

use std::path::Path;
use std::sync::Arc;

use crate::backend::MemoryBackend;
use crate::config::EngineConfig;
use crate::model::Directory;
use crate::pipeline::PipelinePath;
use crate::platform::Platform;
use crate::runtime::Runtime;

/// A runtime over a fresh in-memory backend with the default configuration.
pub fn memory_runtime() -> Runtime {
  Runtime::new(Arc::new(MemoryBackend::new()), EngineConfig::default())
}

/// Like [`memory_runtime`], resolving relative exports against `workdir`.
pub fn memory_runtime_in(workdir: &Path) -> Runtime {
  Runtime::new(
    Arc::new(MemoryBackend::new()),
    EngineConfig::default().with_workdir(workdir),
  )
}

/// The empty directory on the host platform.
pub fn scratch() -> Directory {
  Directory::scratch(Platform::host_default(), PipelinePath::new())
}
