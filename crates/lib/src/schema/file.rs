use std::sync::Arc;

use graft_router::{Context, NoArgs, ObjectResolver, Resolvers, SchemaModule};
use serde::Deserialize;

use super::{IdArgs, op, pure};
use crate::model::{File, FileInfo, ModelError, Query};
use crate::runtime::Runtime;

#[derive(Debug, Deserialize)]
struct TimestampArgs {
  timestamp: i64,
}

#[derive(Debug, Deserialize)]
struct ExportArgs {
  path: String,
}

async fn contents(rt: Arc<Runtime>, ctx: Context, file: File, _: NoArgs) -> Result<String, ModelError> {
  let bytes = file.contents(&rt, &ctx).await?;
  Ok(String::from_utf8_lossy(&bytes).into_owned())
}

async fn size(rt: Arc<Runtime>, ctx: Context, file: File, _: NoArgs) -> Result<u64, ModelError> {
  file.size(&rt, &ctx).await
}

async fn stat(rt: Arc<Runtime>, ctx: Context, file: File, _: NoArgs) -> Result<FileInfo, ModelError> {
  Ok(FileInfo(file.stat(&rt, &ctx).await?))
}

async fn export(rt: Arc<Runtime>, ctx: Context, file: File, args: ExportArgs) -> Result<bool, ModelError> {
  file.export(&rt, &ctx, &args.path).await?;
  Ok(true)
}

pub struct FileModule {
  runtime: Arc<Runtime>,
}

impl FileModule {
  pub fn new(runtime: Arc<Runtime>) -> Self {
    Self { runtime }
  }
}

impl SchemaModule for FileModule {
  fn name(&self) -> &str {
    "file"
  }

  fn schema(&self) -> &str {
    include_str!("file.graphql")
  }

  fn dependencies(&self) -> &[&'static str] {
    &["query", "secret"]
  }

  fn resolvers(&self) -> Resolvers {
    let rt = &self.runtime;

    Resolvers::new()
      .object(
        "Query",
        ObjectResolver::new().field(
          "file",
          pure(|_: Query, args: IdArgs<File>| args.decode()),
        ),
      )
      .object(
        "File",
        ObjectResolver::new()
          .field("id", pure(|file: File, _: NoArgs| file.id()))
          .field("contents", op(rt, contents))
          .field("size", op(rt, size))
          .field("stat", op(rt, stat))
          .field(
            "withTimestamps",
            pure(|file: File, args: TimestampArgs| Ok(file.with_timestamps(args.timestamp))),
          )
          .field("export", op(rt, export))
          .field("secret", pure(|file: File, _: NoArgs| Ok(file.secret()))),
      )
      .object(
        "FileInfo",
        ObjectResolver::new()
          .field("id", pure(|info: FileInfo, _: NoArgs| info.id()))
          .field("name", pure(|info: FileInfo, _: NoArgs| Ok(info.0.name)))
          .field("size", pure(|info: FileInfo, _: NoArgs| Ok(info.0.size)))
          .field("permissions", pure(|info: FileInfo, _: NoArgs| Ok(info.0.mode)))
          .field("modified", pure(|info: FileInfo, _: NoArgs| Ok(info.0.modified)))
          .field("isDirectory", pure(|info: FileInfo, _: NoArgs| Ok(info.0.is_dir()))),
      )
  }
}
