use graft_lib::id::decode_id;
use graft_lib::model::Directory;
use graft_router::Request;
use serde_json::json;

use super::common::{harness, hello_directory, run, string};

#[tokio::test]
async fn new_files_are_listed_and_readable() {
  let h = harness();
  let response = run(
    &h.engine,
    r#"{
      directory {
        withNewFile(path: "a/b.txt", contents: "hello") {
          entries(path: "a")
          file(path: "a/b.txt") { contents size }
        }
      }
    }"#,
  )
  .await;

  assert!(response.is_ok(), "{:?}", response.errors);
  assert_eq!(response.get("directory.withNewFile.entries"), Some(&json!(["b.txt"])));
  assert_eq!(string(&response, "directory.withNewFile.file.contents"), "hello");
  assert_eq!(response.get("directory.withNewFile.file.size"), Some(&json!(5)));
}

#[tokio::test]
async fn a_directory_diffed_with_itself_is_empty() {
  let h = harness();
  let dir = hello_directory(&h.engine).await;

  let response = h
    .engine
    .execute(
      Request::new("query($dir: DirectoryID!) { directory(id: $dir) { diff(other: $dir) { entries } } }")
        .variable("dir", dir),
    )
    .await;

  assert!(response.is_ok(), "{:?}", response.errors);
  assert_eq!(response.get("directory.diff.entries"), Some(&json!([])));
}

#[tokio::test]
async fn a_subdirectory_view_diffed_with_itself_is_empty() {
  let h = harness();
  let created = run(
    &h.engine,
    r#"{ directory { withNewFile(path: "a/b.txt", contents: "hi") { directory(path: "a") { id } } } }"#,
  )
  .await;
  let view = string(&created, "directory.withNewFile.directory.id");

  let response = h
    .engine
    .execute(
      Request::new("query($dir: DirectoryID!) { directory(id: $dir) { diff(other: $dir) { entries } } }")
        .variable("dir", view),
    )
    .await;

  assert!(response.is_ok(), "{:?}", response.errors);
  assert_eq!(response.get("directory.diff.entries"), Some(&json!([])));
}

#[tokio::test]
async fn removing_a_missing_file_changes_only_the_id() {
  let h = harness();
  let dir = hello_directory(&h.engine).await;

  let response = h
    .engine
    .execute(
      Request::new(
        r#"query($dir: DirectoryID!) {
          directory(id: $dir) {
            id
            entries
            withoutFile(path: "missing.txt") { id entries }
          }
        }"#,
      )
      .variable("dir", dir),
    )
    .await;

  assert!(response.is_ok(), "{:?}", response.errors);
  assert_ne!(
    string(&response, "directory.id"),
    string(&response, "directory.withoutFile.id")
  );
  assert_eq!(
    response.get("directory.entries"),
    response.get("directory.withoutFile.entries")
  );
}

#[tokio::test]
async fn new_directories_take_their_permissions() {
  let h = harness();
  let response = run(
    &h.engine,
    r#"{
      directory {
        withNewDirectory(path: "a", permissions: 493) {
          entries
          file(path: "a") { stat { permissions isDirectory } }
        }
      }
    }"#,
  )
  .await;

  assert!(response.is_ok(), "{:?}", response.errors);
  assert_eq!(response.get("directory.withNewDirectory.entries"), Some(&json!(["a"])));
  assert_eq!(
    response.get("directory.withNewDirectory.file.stat"),
    Some(&json!({ "permissions": 493, "isDirectory": true }))
  );
}

#[tokio::test]
async fn copies_apply_include_and_exclude_filters() {
  let h = harness();
  let response = run(
    &h.engine,
    r#"{
      directory {
        withNewFile(path: "src/lib.rs", contents: "") {
          withNewFile(path: "README.md", contents: "") { id }
        }
      }
    }"#,
  )
  .await;
  let source = string(&response, "directory.withNewFile.withNewFile.id");

  let response = h
    .engine
    .execute(
      Request::new(
        r#"query($src: DirectoryID!) {
          directory {
            withDirectory(path: "vendor", directory: $src, include: ["**/*.rs"]) {
              entries(path: "vendor")
            }
          }
        }"#,
      )
      .variable("src", source),
    )
    .await;

  assert!(response.is_ok(), "{:?}", response.errors);
  assert_eq!(response.get("directory.withDirectory.entries"), Some(&json!(["src"])));
}

#[tokio::test]
async fn the_empty_id_is_the_empty_directory() {
  let h = harness();
  let response = run(&h.engine, r#"{ directory(id: "") { entries } }"#).await;

  assert!(response.is_ok(), "{:?}", response.errors);
  assert_eq!(response.get("directory.entries"), Some(&json!([])));
}

#[tokio::test]
async fn lineage_is_inherited_and_only_grows() {
  let h = harness();
  let response = run(
    &h.engine,
    r#"{
      pipeline(name: "build") {
        directory {
          withNewFile(path: "x", contents: "1") {
            pipeline(name: "test", description: "unit tests") { id }
          }
        }
      }
    }"#,
  )
  .await;

  assert!(response.is_ok(), "{:?}", response.errors);
  let id = string(&response, "pipeline.directory.withNewFile.pipeline.id");
  let dir = decode_id::<Directory>(&id).unwrap();

  let names: Vec<_> = dir.pipeline.entries().iter().map(|p| p.name.as_str()).collect();
  assert_eq!(names, ["build", "test"]);
  assert_eq!(dir.pipeline.entries()[1].description, "unit tests");
}

#[tokio::test]
async fn timestamps_are_set_on_every_entry() {
  let h = harness();
  let response = run(
    &h.engine,
    r#"{
      directory {
        withNewFile(path: "a/b.txt", contents: "hello") {
          withTimestamps(timestamp: 1700000000) {
            file(path: "a/b.txt") { stat { modified } }
          }
        }
      }
    }"#,
  )
  .await;

  assert!(response.is_ok(), "{:?}", response.errors);
  assert_eq!(
    response.get("directory.withNewFile.withTimestamps.file.stat.modified"),
    Some(&json!(1_700_000_000))
  );
}

#[tokio::test]
async fn directories_export_to_the_host() {
  let h = harness();
  let temp = tempfile::tempdir().unwrap();
  let dest = temp.path().join("out");

  let dir = hello_directory(&h.engine).await;
  let response = h
    .engine
    .execute(
      Request::new("query($dir: DirectoryID!, $dest: String!) { directory(id: $dir) { export(path: $dest) } }")
        .variable("dir", dir)
        .variable("dest", dest.display().to_string()),
    )
    .await;

  assert!(response.is_ok(), "{:?}", response.errors);
  assert_eq!(response.get("directory.export"), Some(&json!(true)));
  assert_eq!(std::fs::read_to_string(dest.join("a/b.txt")).unwrap(), "hello");
}

#[tokio::test]
async fn file_export_onto_a_directory_leaves_it_untouched() {
  let h = harness();
  let temp = tempfile::tempdir().unwrap();
  let taken = temp.path().join("taken");
  std::fs::create_dir(&taken).unwrap();
  std::fs::write(taken.join("keep.txt"), "keep").unwrap();

  let dir = hello_directory(&h.engine).await;
  let response = h
    .engine
    .execute(
      Request::new(
        r#"query($dir: DirectoryID!, $dest: String!) {
          directory(id: $dir) { file(path: "a/b.txt") { export(path: $dest) } }
        }"#,
      )
      .variable("dir", dir)
      .variable("dest", taken.display().to_string()),
    )
    .await;

  assert_eq!(response.errors.len(), 1);
  assert_eq!(response.errors[0].code(), "EXPORT_DESTINATION");
  assert_eq!(response.errors[0].path_string(), "directory.file.export");
  assert_eq!(std::fs::read_to_string(taken.join("keep.txt")).unwrap(), "keep");
  assert_eq!(std::fs::read_dir(&taken).unwrap().count(), 1);
}

#[tokio::test]
async fn reading_an_empty_result_fails() {
  let h = harness();
  let response = run(&h.engine, r#"{ directory { file(path: "nothing") { contents } } }"#).await;

  assert_eq!(response.errors[0].code(), "EMPTY_RESULT");
}
