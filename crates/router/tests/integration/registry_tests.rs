use graft_router::{ObjectResolver, Registry, RegistryError, ResolveError, Resolvers, SchemaModule, Value, resolver};

use super::common::{NotesModule, RootModule, registry};

struct ShadowNotes {
  overriding: bool,
}

impl SchemaModule for ShadowNotes {
  fn name(&self) -> &str {
    "shadow"
  }

  fn schema(&self) -> &str {
    "extend type Note { text: String! }"
  }

  fn resolvers(&self) -> Resolvers {
    let text = resolver(|_ctx, _note: Value, _args: graft_router::NoArgs| async move {
      Ok::<_, ResolveError>("shadowed")
    });
    let text = if self.overriding { text.overriding() } else { text };
    Resolvers::new().object("Note", ObjectResolver::new().field("text", text))
  }

  fn dependencies(&self) -> &[&'static str] {
    &["notes"]
  }
}

#[test]
fn merged_schema_prints_every_module() {
  let sdl = registry().schema().to_sdl();

  assert!(sdl.contains("type Query {"));
  assert!(sdl.contains("version: String!"));
  assert!(sdl.contains("note(title: String!): Note"));
  assert!(sdl.contains("type Note {"));
  assert!(!sdl.contains("extend"));
}

#[test]
fn conflicting_modules_are_rejected() {
  let err = Registry::builder()
    .register(RootModule)
    .register(NotesModule::new())
    .register(ShadowNotes { overriding: false })
    .build()
    .unwrap_err();

  assert!(
    matches!(err, RegistryError::Conflict { ref type_name, ref field, .. } if type_name == "Note" && field == "text"),
    "{err}"
  );
}

#[tokio::test]
async fn overriding_modules_replace_resolvers() {
  let registry = Registry::builder()
    .register(RootModule)
    .register(NotesModule::new())
    .register(ShadowNotes { overriding: true })
    .build()
    .unwrap();

  let response = registry
    .execute(
      graft_router::Context::new(),
      Value::object("Query", ""),
      graft_router::Request::new(r#"{ note(title: "a") { text } }"#),
    )
    .await;
  assert_eq!(response.get("note.text"), Some(&serde_json::json!("shadowed")));
}

#[test]
fn modules_are_merged_after_their_dependencies() {
  assert_eq!(registry().modules(), ["root", "notes"]);
}
