use std::io::Cursor;

use graft_router::Context;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;
use tracing::{debug, info};

use super::host;
use super::secret::Secret;
use super::ModelError;
use crate::backend::FileStat;
use crate::graph::{CopyInfo, Definition, FileAction, path};
use crate::id::{IdKind, Identified, encode_id};
use crate::pipeline::PipelinePath;
use crate::platform::Platform;
use crate::runtime::Runtime;
use crate::services::ServiceBindings;

/// A single path inside a build graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
  pub def: Definition,
  pub file: String,
  pub pipeline: PipelinePath,
  #[serde(default, skip_serializing_if = "ServiceBindings::is_empty")]
  pub services: ServiceBindings,
}

impl Identified for File {
  const KIND: IdKind = IdKind::File;
}

/// Metadata of a file, as returned by [`File::stat`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileInfo(pub FileStat);

impl Identified for FileInfo {
  const KIND: IdKind = IdKind::FileInfo;
}

impl FileInfo {
  pub fn id(&self) -> Result<String, ModelError> {
    Ok(encode_id(self)?)
  }
}

impl File {
  pub fn new(def: Definition, file: &str, pipeline: PipelinePath, services: ServiceBindings) -> Self {
    Self {
      def,
      file: path::clean(file),
      pipeline,
      services,
    }
  }

  pub fn id(&self) -> Result<String, ModelError> {
    Ok(encode_id(self)?)
  }

  pub fn platform(&self) -> &Platform {
    &self.def.platform
  }

  pub async fn contents(&self, rt: &Runtime, ctx: &Context) -> Result<Vec<u8>, ModelError> {
    rt.with_services(ctx, &self.services, self.read(rt, ctx, "contents")).await
  }

  async fn read(&self, rt: &Runtime, ctx: &Context, operation: &'static str) -> Result<Vec<u8>, ModelError> {
    let reference = rt
      .solve(ctx, &self.def)
      .await?
      .ok_or(ModelError::EmptyResult { operation })?;
    Ok(reference.read_file(&self.file).await?)
  }

  /// An async reader over the file's contents.
  pub async fn open(&self, rt: &Runtime, ctx: &Context) -> Result<Box<dyn AsyncRead + Send + Unpin>, ModelError> {
    let data = rt.with_services(ctx, &self.services, self.read(rt, ctx, "open")).await?;
    Ok(Box::new(Cursor::new(data)))
  }

  pub async fn stat(&self, rt: &Runtime, ctx: &Context) -> Result<FileStat, ModelError> {
    rt.with_services(ctx, &self.services, self.read_stat(rt, ctx)).await
  }

  async fn read_stat(&self, rt: &Runtime, ctx: &Context) -> Result<FileStat, ModelError> {
    let reference = rt
      .solve(ctx, &self.def)
      .await?
      .ok_or(ModelError::EmptyResult { operation: "stat" })?;
    Ok(reference.stat(&self.file).await?)
  }

  pub async fn size(&self, rt: &Runtime, ctx: &Context) -> Result<u64, ModelError> {
    Ok(self.stat(rt, ctx).await?.size)
  }

  /// Re-root the file into a fresh definition under its base name, with its
  /// modification time set to `timestamp`.
  pub fn with_timestamps(&self, timestamp: i64) -> Self {
    let dest = path::resolve("/", &path::base_name(&self.file));
    debug!(op = "withTimestamps", file = %self.file, timestamp, "file transform");

    let def = Definition::scratch(self.def.platform.clone()).with_action(FileAction::Copy {
      source: Box::new(self.def.root.clone()),
      src: self.file.clone(),
      dest: dest.clone(),
      info: CopyInfo {
        create_dest_path: true,
        timestamp: Some(timestamp),
        ..CopyInfo::default()
      },
    });
    Self {
      def,
      file: dest,
      ..self.clone()
    }
  }

  /// Write the file to the host path `dest`.
  ///
  /// A destination that is an existing directory is rejected and left
  /// untouched.
  pub async fn export(&self, rt: &Runtime, ctx: &Context, dest: &str) -> Result<(), ModelError> {
    let dest = host::destination(&rt.config().workdir, dest);
    host::ensure_file_destination(&dest).await?;

    let (data, stat) = rt
      .with_services(ctx, &self.services, self.read_with_stat(rt, ctx))
      .await?;
    host::write_file(&dest, &data, stat.mode).await?;
    info!(dest = %dest.display(), size = data.len(), "file exported");
    Ok(())
  }

  async fn read_with_stat(&self, rt: &Runtime, ctx: &Context) -> Result<(Vec<u8>, FileStat), ModelError> {
    let reference = rt
      .solve(ctx, &self.def)
      .await?
      .ok_or(ModelError::EmptyResult { operation: "export" })?;
    let stat = reference.stat(&self.file).await?;
    let data = reference.read_file(&self.file).await?;
    Ok((data, stat))
  }

  /// A secret whose plaintext is this file's contents.
  pub fn secret(&self) -> Secret {
    Secret::File { file: self.clone() }
  }
}
