use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use graft_router::{
  Context, NoArgs, ObjectResolver, Registry, ResolveError, Resolvers, SchemaModule, Value, not_implemented, resolver,
};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Barrier;

#[derive(Debug, Error)]
#[error("no such note: {0}")]
pub struct MissingNote(pub String);

/// Declares the root type.
pub struct RootModule;

impl SchemaModule for RootModule {
  fn name(&self) -> &str {
    "root"
  }

  fn schema(&self) -> &str {
    r#"
      "The root of every request."
      type Query {
        version: String!
      }
    "#
  }

  fn resolvers(&self) -> Resolvers {
    Resolvers::new().object(
      "Query",
      ObjectResolver::new().field(
        "version",
        resolver(|_ctx, _root: Value, _args: NoArgs| async move { Ok::<_, ResolveError>("1.0") }),
      ),
    )
  }
}

#[derive(Debug, Deserialize)]
struct NoteArgs {
  title: String,
}

#[derive(Debug, Deserialize)]
struct WordsArgs {
  limit: i64,
}

/// A toy object type whose ID is its text.
pub struct NotesModule {
  pub barrier: Arc<Barrier>,
  pub words_calls: Arc<AtomicUsize>,
}

impl NotesModule {
  pub fn new() -> Self {
    Self {
      barrier: Arc::new(Barrier::new(2)),
      words_calls: Arc::new(AtomicUsize::new(0)),
    }
  }
}

fn note_text(parent: &Value) -> Result<String, ResolveError> {
  match parent {
    Value::Object(obj) => Ok(obj.id.clone()),
    other => Err(ResolveError::InvalidParent {
      expected: "Note".into(),
      found: other.kind().into(),
    }),
  }
}

impl SchemaModule for NotesModule {
  fn name(&self) -> &str {
    "notes"
  }

  fn schema(&self) -> &str {
    r#"
      type Note {
        text: String!
        words(limit: Int = 10): [String!]!
        broken: String!
        optional: String
        archive: String!
      }

      extend type Query {
        note(title: String!): Note
        requiredNote(title: String!): Note!
        left: Boolean!
        right: Boolean!
        forever: Boolean
      }
    "#
  }

  fn resolvers(&self) -> Resolvers {
    let left_barrier = self.barrier.clone();
    let right_barrier = self.barrier.clone();
    let calls = self.words_calls.clone();

    Resolvers::new()
      .object(
        "Query",
        ObjectResolver::new()
          .field(
            "note",
            resolver(|_ctx, _root: Value, args: NoteArgs| async move {
              if args.title == "missing" {
                return Err(ResolveError::domain("NOTE_NOT_FOUND", MissingNote(args.title)));
              }
              Ok(Value::object("Note", args.title))
            }),
          )
          .field(
            "requiredNote",
            resolver(|_ctx, _root: Value, args: NoteArgs| async move {
              Ok::<_, ResolveError>(Value::object("Note", args.title))
            }),
          )
          .field(
            "left",
            resolver(move |_ctx, _root: Value, _args: NoArgs| {
              let barrier = left_barrier.clone();
              async move {
                barrier.wait().await;
                Ok::<_, ResolveError>(true)
              }
            }),
          )
          .field(
            "right",
            resolver(move |_ctx, _root: Value, _args: NoArgs| {
              let barrier = right_barrier.clone();
              async move {
                barrier.wait().await;
                Ok::<_, ResolveError>(true)
              }
            }),
          )
          .field(
            "forever",
            resolver(|_ctx: Context, _root: Value, _args: NoArgs| async move {
              std::future::pending::<()>().await;
              Ok::<_, ResolveError>(true)
            }),
          ),
      )
      .object(
        "Note",
        ObjectResolver::new()
          .field(
            "text",
            resolver(|_ctx, note: Value, _args: NoArgs| async move { note_text(&note) }),
          )
          .field(
            "words",
            resolver(move |_ctx, note: Value, args: WordsArgs| {
              calls.fetch_add(1, Ordering::SeqCst);
              async move {
                let text = note_text(&note)?;
                let limit = usize::try_from(args.limit).unwrap_or(0);
                Ok::<_, ResolveError>(text.split('-').take(limit).map(String::from).collect::<Vec<_>>())
              }
            }),
          )
          .field(
            "broken",
            resolver(|_ctx, _note: Value, _args: NoArgs| async move { Ok::<_, ResolveError>(Value::Null) }),
          )
          .field(
            "optional",
            resolver(|_ctx, _note: Value, _args: NoArgs| async move { Ok::<_, ResolveError>(Option::<String>::None) }),
          )
          .field("archive", not_implemented("Note", "archive")),
      )
  }

  fn dependencies(&self) -> &[&'static str] {
    &["root"]
  }
}

pub fn registry() -> Registry {
  Registry::builder()
    .register(NotesModule::new())
    .register(RootModule)
    .build()
    .expect("test modules merge")
}
