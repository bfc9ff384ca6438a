use graft_router::Request;
use serde_json::json;

use super::common::{harness, run, string};

const DATABASE: &str = r#"{
  container {
    withEnvVariable(name: "POSTGRES_DB", value: "app") {
      asService(ports: [5432]) { id hostname endpoint(scheme: "tcp") }
    }
  }
}"#;

#[tokio::test]
async fn services_have_digest_hostnames() {
  let h = harness();
  let response = run(&h.engine, DATABASE).await;

  assert!(response.is_ok(), "{:?}", response.errors);
  let hostname = string(&response, "container.withEnvVariable.asService.hostname");
  assert!(hostname.starts_with("svc-"), "{hostname}");
  assert_eq!(hostname.len(), "svc-".len() + 12);
  assert_eq!(
    string(&response, "container.withEnvVariable.asService.endpoint"),
    format!("tcp://{hostname}:5432")
  );

  // Describing a service does not start it.
  assert!(h.backend.started_services().is_empty());
}

#[tokio::test]
async fn services_without_ports_have_no_endpoint() {
  let h = harness();
  let response = run(&h.engine, "{ container { asService { endpoint } } }").await;

  assert_eq!(response.errors.len(), 1);
  assert_eq!(response.errors[0].code(), "NO_EXPOSED_PORTS");
}

#[tokio::test]
async fn bound_services_run_for_the_read_and_then_stop() {
  let h = harness();
  let response = run(&h.engine, DATABASE).await;
  let service = string(&response, "container.withEnvVariable.asService.id");

  let response = h
    .engine
    .execute(
      Request::new(
        r#"query($db: ServiceID!) {
          directory {
            withNewFile(path: "schema.sql", contents: "create table t();") {
              withServiceBinding(alias: "db", service: $db) { entries }
            }
          }
        }"#,
      )
      .variable("db", service),
    )
    .await;

  assert!(response.is_ok(), "{:?}", response.errors);
  assert_eq!(
    response.get("directory.withNewFile.withServiceBinding.entries"),
    Some(&json!(["schema.sql"]))
  );

  let started = h.backend.started_services();
  assert_eq!(started.len(), 1);
  assert_eq!(h.backend.stopped_services(), started);
}

#[tokio::test]
async fn bindings_follow_objects_into_their_copies() {
  let h = harness();
  let response = run(&h.engine, DATABASE).await;
  let service = string(&response, "container.withEnvVariable.asService.id");

  let response = h
    .engine
    .execute(
      Request::new(
        r#"query($db: ServiceID!) {
          directory {
            withNewFile(path: "a.txt", contents: "a") {
              withServiceBinding(alias: "db", service: $db) {
                file(path: "a.txt") { contents }
              }
            }
          }
        }"#,
      )
      .variable("db", service),
    )
    .await;

  assert!(response.is_ok(), "{:?}", response.errors);
  assert_eq!(h.backend.started_services().len(), 1);
  assert_eq!(h.backend.stopped_services().len(), 1);
}
