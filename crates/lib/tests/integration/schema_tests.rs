use std::sync::Arc;

use graft_lib::runtime::Runtime;
use graft_lib::schema;
use graft_lib::{Engine, EngineConfig, MemoryBackend};
use graft_router::{
  CancelToken, Context, NoArgs, ObjectResolver, RegistryBuilder, RegistryError, Request, ResolveError, Resolvers,
  SchemaModule, Value, resolver,
};
use serde_json::json;

use super::common::{RecordingBackend, harness, run};

/// A second module claiming `Directory.entries`.
struct ShadowEntries;

impl SchemaModule for ShadowEntries {
  fn name(&self) -> &str {
    "shadow-entries"
  }

  fn schema(&self) -> &str {
    "extend type Directory { entries(path: String): [String!]! }"
  }

  fn resolvers(&self) -> Resolvers {
    Resolvers::new().object(
      "Directory",
      ObjectResolver::new().field(
        "entries",
        resolver(|_ctx, _dir: Value, _args: NoArgs| async move { Ok::<_, ResolveError>(Vec::<String>::new()) }),
      ),
    )
  }

  fn dependencies(&self) -> &[&'static str] {
    &["directory"]
  }
}

#[test]
fn the_merged_schema_prints_every_type() {
  let sdl = harness().engine.schema_sdl();

  for declaration in [
    "scalar DirectoryID",
    "input BuildArg {",
    "type Directory {",
    "type File {",
    "type Container {",
    "type Service {",
    "type Secret {",
    "type Query {",
    "  withRootfs(directory: DirectoryID!): Container!",
    "  entries(path: String): [String!]!",
    "  endpoint(port: Int, scheme: String = \"\"): String!",
  ] {
    assert!(sdl.contains(declaration), "missing {declaration:?} in:\n{sdl}");
  }
  assert!(!sdl.contains("extend type"));
}

#[test]
fn a_second_entries_resolver_is_a_conflict() {
  let runtime = Arc::new(Runtime::new(Arc::new(MemoryBackend::new()), EngineConfig::default()));

  let err = schema::modules(&runtime)
    .into_iter()
    .fold(RegistryBuilder::new(), RegistryBuilder::register_arc)
    .register(ShadowEntries)
    .build()
    .unwrap_err();

  assert!(
    matches!(err, RegistryError::Conflict { ref type_name, ref field, .. } if type_name == "Directory" && field == "entries"),
    "{err}"
  );
}

#[tokio::test]
async fn missing_required_arguments_are_field_errors() {
  let h = harness();
  let response = run(&h.engine, "{ directory { withNewFile(path: \"x\") { id } } }").await;

  assert_eq!(response.errors.len(), 1);
  assert_eq!(response.errors[0].code(), "INVALID_ARGUMENTS");
  assert_eq!(response.errors[0].path_string(), "directory.withNewFile");
}

#[tokio::test]
async fn cancelled_requests_do_not_reach_the_backend() {
  let backend = Arc::new(RecordingBackend::default());
  let engine = Engine::new(backend.clone(), EngineConfig::default()).unwrap();
  let cancel = CancelToken::new();
  cancel.cancel();

  let response = engine
    .execute_with(
      Context::with_cancel(cancel),
      Request::new(r#"{ directory { withNewFile(path: "a", contents: "1") { entries } } }"#),
    )
    .await;

  assert_eq!(response.errors[0].code(), "CANCELLED");
  assert_eq!(backend.solves(), 0);
}

#[tokio::test]
async fn typename_reflects_the_object_type() {
  let h = harness();
  let response = run(
    &h.engine,
    "{ __typename directory { __typename file(path: \"x\") { __typename } } }",
  )
  .await;

  assert!(response.is_ok(), "{:?}", response.errors);
  assert_eq!(
    response.data,
    Some(json!({
      "__typename": "Query",
      "directory": { "__typename": "Directory", "file": { "__typename": "File" } }
    }))
  );
}
