use std::time::Duration;

use graft_router::{CancelToken, Context, NOT_IMPLEMENTED_MESSAGE, Request, Value};
use serde_json::json;

use super::common::registry;

async fn run(query: &str) -> graft_router::Response {
  registry()
    .execute(Context::new(), Value::object("Query", ""), Request::new(query))
    .await
}

#[tokio::test]
async fn resolves_nested_selections_with_aliases() {
  let response = run(r#"{ version first: note(title: "a-b-c") { text words(limit: 2) } }"#).await;

  assert!(response.is_ok(), "{:?}", response.errors);
  assert_eq!(
    response.data,
    Some(json!({ "version": "1.0", "first": { "text": "a-b-c", "words": ["a", "b"] } }))
  );
}

#[tokio::test]
async fn argument_defaults_apply() {
  let response = run(r#"{ note(title: "x-y") { words } }"#).await;
  assert_eq!(response.get("note.words"), Some(&json!(["x", "y"])));
}

#[tokio::test]
async fn typename_is_always_available() {
  let response = run(r#"{ __typename note(title: "n") { __typename } }"#).await;
  assert_eq!(response.get("__typename"), Some(&json!("Query")));
  assert_eq!(response.get("note.__typename"), Some(&json!("Note")));
}

#[tokio::test]
async fn sibling_fields_resolve_concurrently() {
  // Each resolver waits for the other at a barrier, so sequential
  // resolution would never finish.
  let response = tokio::time::timeout(Duration::from_secs(5), run("{ left right }"))
    .await
    .expect("siblings should not run one after another");

  assert_eq!(response.data, Some(json!({ "left": true, "right": true })));
}

#[tokio::test]
async fn field_errors_do_not_fail_siblings() {
  let response = run(r#"{ version note(title: "missing") { text } }"#).await;

  assert_eq!(response.data, Some(json!({ "version": "1.0", "note": null })));
  assert_eq!(response.errors.len(), 1);
  assert_eq!(response.errors[0].code(), "NOTE_NOT_FOUND");
  assert_eq!(response.errors[0].path_string(), "note");
  assert_eq!(response.errors[0].message, "no such note: missing");
}

#[tokio::test]
async fn non_null_failures_bubble_to_nullable_parent() {
  let response = run(r#"{ version note(title: "a") { text broken } }"#).await;

  assert_eq!(response.get("version"), Some(&json!("1.0")));
  assert_eq!(response.get("note"), Some(&json!(null)));
  assert_eq!(response.errors.len(), 1);
  assert_eq!(response.errors[0].path_string(), "note.broken");
}

#[tokio::test]
async fn non_null_failures_can_null_the_whole_result() {
  let response = run(r#"{ requiredNote(title: "a") { broken } }"#).await;
  assert_eq!(response.data, Some(json!(null)));
  assert_eq!(response.errors[0].path_string(), "requiredNote.broken");
}

#[tokio::test]
async fn nullable_fields_may_be_null_without_error() {
  let response = run(r#"{ note(title: "a") { optional } }"#).await;
  assert!(response.is_ok());
  assert_eq!(response.get("note.optional"), Some(&json!(null)));
}

#[tokio::test]
async fn stubbed_fields_report_not_implemented() {
  let response = run(r#"{ note(title: "a") { archive } }"#).await;

  let err = &response.errors[0];
  assert_eq!(err.message, NOT_IMPLEMENTED_MESSAGE);
  assert_eq!(err.code(), "NOT_IMPLEMENTED");
}

#[tokio::test]
async fn variables_are_substituted_and_checked() {
  let registry = registry();
  let query = r#"query Read($t: String!, $n: Int) { note(title: $t) { words(limit: $n) } }"#;

  let response = registry
    .execute(
      Context::new(),
      Value::object("Query", ""),
      Request::new(query).variable("t", "p-q-r").variable("n", 1),
    )
    .await;
  assert_eq!(response.get("note.words"), Some(&json!(["p"])));

  // An omitted nullable variable falls back to the argument default.
  let response = registry
    .execute(Context::new(), Value::object("Query", ""), Request::new(query).variable("t", "p-q"))
    .await;
  assert_eq!(response.get("note.words"), Some(&json!(["p", "q"])));

  let response = registry
    .execute(Context::new(), Value::object("Query", ""), Request::new(query))
    .await;
  assert!(response.data.is_none());
  assert_eq!(response.errors[0].code(), "VALIDATION_ERROR");
}

#[tokio::test]
async fn invalid_argument_types_are_field_errors() {
  let response = run(r#"{ version note(title: 3) { text } }"#).await;
  assert_eq!(response.get("version"), Some(&json!("1.0")));
  assert_eq!(response.errors[0].code(), "INVALID_ARGUMENTS");
}

#[tokio::test]
async fn unknown_fields_reject_the_request() {
  let response = run("{ nope }").await;
  assert!(response.data.is_none());
  assert_eq!(response.errors[0].code(), "VALIDATION_ERROR");
  assert!(response.errors[0].message.contains("nope"));
}

#[tokio::test]
async fn object_fields_require_a_selection() {
  let response = run(r#"{ note(title: "a") }"#).await;
  assert!(response.data.is_none());
}

#[tokio::test]
async fn syntax_errors_are_parse_errors() {
  let response = run("{ version").await;
  assert!(response.data.is_none());
  assert_eq!(response.errors[0].code(), "PARSE_ERROR");
}

#[tokio::test]
async fn named_operations_are_selected() {
  let registry = registry();
  let query = "query A { version } query B { __typename }";
  let response = registry
    .execute(Context::new(), Value::object("Query", ""), Request::new(query).operation_name("B"))
    .await;
  assert_eq!(response.data, Some(json!({ "__typename": "Query" })));
}

#[tokio::test]
async fn cancellation_aborts_pending_fields() {
  let token = CancelToken::new();
  let ctx = Context::with_cancel(token.clone());
  let registry = registry();

  let canceller = tokio::spawn(async move {
    tokio::time::sleep(Duration::from_millis(20)).await;
    token.cancel();
  });

  let response = tokio::time::timeout(
    Duration::from_secs(5),
    registry.execute(ctx, Value::object("Query", ""), Request::new("{ version forever }")),
  )
  .await
  .expect("cancellation should end the request");
  canceller.await.unwrap();

  assert_eq!(response.get("forever"), Some(&json!(null)));
  assert_eq!(response.errors[0].code(), "CANCELLED");
}

#[tokio::test]
async fn responses_serialize_in_wire_shape() {
  let response = run(r#"{ note(title: "missing") { text } }"#).await;
  let wire = response.to_json();

  assert_eq!(wire["data"], json!({ "note": null }));
  assert_eq!(wire["errors"][0]["path"], json!(["note"]));
  assert_eq!(wire["errors"][0]["extensions"]["code"], json!("NOTE_NOT_FOUND"));
}
