use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use graft_lib::backend::{
  Backend, BackendError, BuildResult, DockerBuildRequest, MemoryBackend, Reference, RunningService,
};
use graft_lib::graph::Definition;
use graft_lib::model::ImageConfig;
use graft_lib::services::ServiceSpec;
use graft_lib::{Engine, EngineConfig};
use graft_router::{Request, Response};

/// An engine over an in-memory backend the test can inspect.
pub struct Harness {
  pub engine: Engine,
  pub backend: Arc<MemoryBackend>,
}

pub fn harness() -> Harness {
  let backend = Arc::new(MemoryBackend::new());
  let engine = Engine::new(backend.clone(), EngineConfig::default()).unwrap();
  Harness { engine, backend }
}

pub async fn run(engine: &Engine, query: &str) -> Response {
  engine.execute(Request::new(query)).await
}

/// The string at `path`, failing the test with the response if absent.
pub fn string(response: &Response, path: &str) -> String {
  response
    .get(path)
    .and_then(|value| value.as_str())
    .unwrap_or_else(|| panic!("no string at {path}: {:?}", response))
    .to_string()
}

/// The ID of the directory holding `hello` at `a/b.txt`.
pub async fn hello_directory(engine: &Engine) -> String {
  let response = run(
    engine,
    r#"{ directory { withNewFile(path: "a/b.txt", contents: "hello") { id } } }"#,
  )
  .await;
  assert!(response.is_ok(), "{:?}", response.errors);
  string(&response, "directory.withNewFile.id")
}

/// Solves and runs services in memory, counting solves, and records image
/// builds instead of performing them.
#[derive(Default)]
pub struct RecordingBackend {
  memory: MemoryBackend,
  solves: AtomicUsize,
  builds: Mutex<Vec<DockerBuildRequest>>,
}

impl RecordingBackend {
  pub fn builds(&self) -> Vec<DockerBuildRequest> {
    self.builds.lock().unwrap_or_else(PoisonError::into_inner).clone()
  }

  pub fn solves(&self) -> usize {
    self.solves.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl Backend for RecordingBackend {
  fn name(&self) -> &str {
    "recording"
  }

  async fn solve(&self, definition: &Definition) -> Result<Option<Arc<dyn Reference>>, BackendError> {
    self.solves.fetch_add(1, Ordering::SeqCst);
    self.memory.solve(definition).await
  }

  async fn build_dockerfile(&self, request: DockerBuildRequest) -> Result<BuildResult, BackendError> {
    let result = BuildResult {
      rootfs: request.context.clone(),
      config: ImageConfig {
        cmd: vec!["built".to_string()],
        ..ImageConfig::default()
      },
    };
    self.builds.lock().unwrap_or_else(PoisonError::into_inner).push(request);
    Ok(result)
  }

  async fn start_service(&self, spec: &ServiceSpec) -> Result<RunningService, BackendError> {
    self.memory.start_service(spec).await
  }

  async fn stop_service(&self, service: &RunningService) -> Result<(), BackendError> {
    self.memory.stop_service(service).await
  }
}
