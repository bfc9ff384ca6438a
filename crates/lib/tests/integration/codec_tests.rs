use graft_lib::id::{DecodeError, IdKind, ObjectId, decode_id, encode_id};
use graft_lib::model::{Directory, File};
use graft_lib::pipeline::{Pipeline, PipelinePath};
use graft_lib::platform::Platform;
use graft_router::Request;
use proptest::prelude::*;

use super::common::{harness, hello_directory, run};

fn directory(step: &str, path: &str, contents: Vec<u8>) -> Directory {
  Directory::scratch(Platform::host_default(), PipelinePath::new())
    .with_pipeline(Pipeline {
      name: step.to_string(),
      description: String::new(),
      labels: Vec::new(),
    })
    .with_new_file(path, contents, None)
}

proptest! {
  #[test]
  fn ids_decode_to_what_was_encoded(
    step in "[a-z]{1,8}",
    path in "[a-z]{1,8}(/[a-z]{1,8}){0,2}",
    contents in prop::collection::vec(any::<u8>(), 0..64),
  ) {
    let dir = directory(&step, &path, contents);

    let id = encode_id(&dir).unwrap();
    prop_assert_eq!(decode_id::<Directory>(&id).unwrap(), dir.clone());

    let typed = ObjectId::encode(&dir).unwrap();
    prop_assert_eq!(typed.decode().unwrap(), dir);
  }
}

#[test]
fn ids_of_one_kind_do_not_decode_as_another() {
  let id = encode_id(&directory("build", "a", b"x".to_vec())).unwrap();

  let err = decode_id::<File>(&id).unwrap_err();
  assert!(
    matches!(
      err,
      DecodeError::KindMismatch {
        expected: IdKind::File,
        found: IdKind::Directory
      }
    ),
    "{err}"
  );
}

#[test]
fn malformed_and_empty_ids_are_rejected() {
  assert!(matches!(decode_id::<File>("not base64!"), Err(DecodeError::Base64(_))));
  assert!(matches!(decode_id::<File>(""), Err(DecodeError::Empty(IdKind::File))));
}

#[tokio::test]
async fn ids_are_stable_across_engines() {
  let first = hello_directory(&harness().engine).await;
  let second = hello_directory(&harness().engine).await;
  assert_eq!(first, second);
}

#[tokio::test]
async fn the_api_rejects_ids_of_the_wrong_kind() {
  let h = harness();
  let dir = hello_directory(&h.engine).await;

  let response = h
    .engine
    .execute(Request::new("query($id: FileID!) { file(id: $id) { size } }").variable("id", dir))
    .await;

  assert_eq!(response.errors.len(), 1);
  assert_eq!(response.errors[0].code(), "DECODE_ERROR");
  assert_eq!(response.errors[0].path_string(), "file");
}

#[tokio::test]
async fn the_api_rejects_malformed_ids() {
  let h = harness();
  let response = run(&h.engine, r#"{ container(id: "%%%") { platform } }"#).await;

  assert_eq!(response.errors[0].code(), "DECODE_ERROR");
}
