use std::sync::Arc;

use graft_lib::{Engine, EngineConfig};
use graft_router::{NOT_IMPLEMENTED_MESSAGE, Request};
use serde_json::json;

use super::common::{RecordingBackend, harness, hello_directory, run, string};

#[tokio::test]
async fn configuration_setters_replace_values() {
  let h = harness();
  let response = run(
    &h.engine,
    r#"{
      container(platform: "linux/arm64") {
        platform
        withEnvVariable(name: "MODE", value: "debug") {
          withEnvVariable(name: "MODE", value: "release") {
            envVariable(name: "MODE")
            missing: envVariable(name: "NOPE")
            withWorkdir(path: "/src") {
              workdir
              user
              withEntrypoint(args: ["/bin/sh", "-c"]) { entrypoint }
            }
          }
        }
      }
    }"#,
  )
  .await;

  assert!(response.is_ok(), "{:?}", response.errors);
  assert_eq!(string(&response, "container.platform"), "linux/arm64");

  let inner = response.get("container.withEnvVariable.withEnvVariable").unwrap();
  assert_eq!(inner["envVariable"], json!("release"));
  assert_eq!(inner["missing"], json!(null));
  assert_eq!(inner["withWorkdir"]["workdir"], json!("/src"));
  assert_eq!(inner["withWorkdir"]["user"], json!(null));
  assert_eq!(inner["withWorkdir"]["withEntrypoint"]["entrypoint"], json!(["/bin/sh", "-c"]));
}

#[tokio::test]
async fn containers_start_without_a_root_filesystem() {
  let h = harness();
  let response = run(&h.engine, "{ container { rootfs { entries } } }").await;

  assert!(response.is_ok(), "{:?}", response.errors);
  assert_eq!(response.get("container.rootfs.entries"), Some(&json!([])));
}

#[tokio::test]
async fn root_filesystems_can_be_replaced() {
  let h = harness();
  let dir = hello_directory(&h.engine).await;

  let response = h
    .engine
    .execute(
      Request::new("query($dir: DirectoryID!) { container { withRootfs(directory: $dir) { rootfs { entries } } } }")
        .variable("dir", dir),
    )
    .await;

  assert!(response.is_ok(), "{:?}", response.errors);
  assert_eq!(response.get("container.withRootfs.rootfs.entries"), Some(&json!(["a"])));
}

#[tokio::test]
async fn publishing_is_not_implemented() {
  let h = harness();
  let response = run(&h.engine, r#"{ container { publish(address: "registry.local/app") } }"#).await;

  assert_eq!(response.errors.len(), 1);
  assert_eq!(response.errors[0].code(), "NOT_IMPLEMENTED");
  assert_eq!(response.errors[0].message, NOT_IMPLEMENTED_MESSAGE);
  assert_eq!(response.errors[0].path_string(), "container.publish");
}

#[tokio::test]
async fn docker_builds_reach_the_backend() {
  let backend = Arc::new(RecordingBackend::default());
  let config = EngineConfig::default().with_platform("linux/amd64".parse().unwrap());
  let engine = Engine::new(backend.clone(), config).unwrap();

  let response = run(&engine, r#"{ setSecret(name: "token", plaintext: "s3cr3t") { id } }"#).await;
  let secret = string(&response, "setSecret.id");

  let response = engine
    .execute(
      Request::new(
        r#"query($token: SecretID!) {
          directory {
            withNewFile(path: "app/Containerfile", contents: "FROM scratch") {
              directory(path: "app") {
                dockerBuild(
                  dockerfile: "Containerfile"
                  buildArgs: [{ name: "VERSION", value: "1.2" }]
                  target: "release"
                  secrets: [$token]
                ) { platform defaultArgs }
              }
            }
          }
        }"#,
      )
      .variable("token", secret.clone()),
    )
    .await;

  assert!(response.is_ok(), "{:?}", response.errors);
  let built = response.get("directory.withNewFile.directory.dockerBuild").unwrap();
  assert_eq!(built["platform"], json!("linux/amd64"));
  assert_eq!(built["defaultArgs"], json!(["built"]));

  let builds = backend.builds();
  assert_eq!(builds.len(), 1);
  let request = &builds[0];
  assert_eq!(request.context_dir, "/app");
  assert_eq!(request.dockerfile, "Containerfile");
  assert_eq!(request.target.as_deref(), Some("release"));
  assert_eq!(request.build_args.len(), 1);
  assert_eq!(request.build_args[0].name, "VERSION");
  assert_eq!(request.secrets.len(), 1);
  assert_eq!(request.secrets[0].id, secret);
  assert_eq!(request.secrets[0].plaintext, b"s3cr3t");
}
