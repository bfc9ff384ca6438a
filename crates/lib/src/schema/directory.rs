use std::sync::Arc;

use graft_router::{Context, NoArgs, ObjectResolver, Resolvers, SchemaModule};
use serde::Deserialize;

use super::{IdArgs, PipelineArgs, ServiceBindingArgs, op, pure};
use crate::backend::BuildArg;
use crate::id::ObjectId;
use crate::model::{Container, CopyFilter, Directory, DockerBuild, File, ModelError, Query, Secret};
use crate::pipeline::PipelinePath;
use crate::platform::Platform;
use crate::runtime::Runtime;

/// Decode a directory argument. The empty ID is the empty directory.
fn directory_arg(
  id: Option<&ObjectId<Directory>>,
  platform: &Platform,
  pipeline: &PipelinePath,
) -> Result<Directory, ModelError> {
  match id.filter(|id| !id.is_empty()) {
    Some(id) => Ok(id.decode()?),
    None => Ok(Directory::scratch(platform.clone(), pipeline.clone())),
  }
}

#[derive(Debug, Deserialize)]
struct PathArgs {
  path: String,
}

#[derive(Debug, Deserialize)]
struct EntriesArgs {
  #[serde(default)]
  path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewFileArgs {
  path: String,
  contents: String,
  #[serde(default)]
  permissions: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct NewDirectoryArgs {
  path: String,
  #[serde(default)]
  permissions: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WithFileArgs {
  path: String,
  source: ObjectId<File>,
  #[serde(default)]
  permissions: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WithDirectoryArgs {
  path: String,
  directory: ObjectId<Directory>,
  #[serde(default)]
  include: Option<Vec<String>>,
  #[serde(default)]
  exclude: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct TimestampArgs {
  timestamp: i64,
}

#[derive(Debug, Deserialize)]
struct DiffArgs {
  other: ObjectId<Directory>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DockerBuildArgs {
  #[serde(default)]
  dockerfile: Option<String>,
  #[serde(default)]
  build_args: Option<Vec<BuildArg>>,
  #[serde(default)]
  target: Option<String>,
  #[serde(default)]
  secrets: Option<Vec<ObjectId<Secret>>>,
  #[serde(default)]
  platform: Option<Platform>,
}

#[derive(Debug, Deserialize)]
struct RootfsArgs {
  directory: ObjectId<Directory>,
}

async fn entries(rt: Arc<Runtime>, ctx: Context, dir: Directory, args: EntriesArgs) -> Result<Vec<String>, ModelError> {
  dir.entries(&rt, &ctx, args.path.as_deref()).await
}

async fn export(rt: Arc<Runtime>, ctx: Context, dir: Directory, args: PathArgs) -> Result<bool, ModelError> {
  dir.export(&rt, &ctx, &args.path).await?;
  Ok(true)
}

async fn docker_build(
  rt: Arc<Runtime>,
  ctx: Context,
  dir: Directory,
  args: DockerBuildArgs,
) -> Result<Container, ModelError> {
  let secrets = args
    .secrets
    .unwrap_or_default()
    .iter()
    .map(ObjectId::decode)
    .collect::<Result<Vec<_>, _>>()?;

  let build = DockerBuild {
    dockerfile: args.dockerfile.filter(|d| !d.is_empty()),
    build_args: args.build_args.unwrap_or_default(),
    target: args.target.filter(|t| !t.is_empty()),
    secrets,
    platform: args.platform,
  };
  dir.docker_build(&rt, &ctx, build).await
}

pub struct DirectoryModule {
  runtime: Arc<Runtime>,
}

impl DirectoryModule {
  pub fn new(runtime: Arc<Runtime>) -> Self {
    Self { runtime }
  }
}

impl SchemaModule for DirectoryModule {
  fn name(&self) -> &str {
    "directory"
  }

  fn schema(&self) -> &str {
    include_str!("directory.graphql")
  }

  fn dependencies(&self) -> &[&'static str] {
    &["query", "secret", "service", "file", "container"]
  }

  fn resolvers(&self) -> Resolvers {
    let rt = &self.runtime;
    let default_platform = rt.config().platform.clone();

    let query = ObjectResolver::new().field(
      "directory",
      pure(move |query: Query, args: IdArgs<Directory>| {
        directory_arg(args.given(), &default_platform, &query.pipeline)
      }),
    );

    let directory = ObjectResolver::new()
      .field("id", pure(|dir: Directory, _: NoArgs| dir.id()))
      .field("platform", pure(|dir: Directory, _: NoArgs| Ok(dir.def.platform)))
      .field(
        "pipeline",
        pure(|dir: Directory, args: PipelineArgs| Ok(dir.with_pipeline(args.into_pipeline()))),
      )
      .field("entries", op(rt, entries))
      .field("file", pure(|dir: Directory, args: PathArgs| Ok(dir.file(&args.path))))
      .field(
        "directory",
        pure(|dir: Directory, args: PathArgs| Ok(dir.directory(&args.path))),
      )
      .field(
        "withNewFile",
        pure(|dir: Directory, args: NewFileArgs| {
          Ok(dir.with_new_file(&args.path, args.contents.into_bytes(), args.permissions))
        }),
      )
      .field(
        "withNewDirectory",
        pure(|dir: Directory, args: NewDirectoryArgs| Ok(dir.with_new_directory(&args.path, args.permissions))),
      )
      .field(
        "withFile",
        pure(|dir: Directory, args: WithFileArgs| {
          Ok(dir.with_file(&args.path, &args.source.decode()?, args.permissions))
        }),
      )
      .field(
        "withDirectory",
        pure(|dir: Directory, args: WithDirectoryArgs| {
          let source = directory_arg(Some(&args.directory), dir.platform(), &dir.pipeline)?;
          let filter = CopyFilter {
            include: args.include.unwrap_or_default(),
            exclude: args.exclude.unwrap_or_default(),
          };
          Ok(dir.with_directory(&args.path, &source, &filter))
        }),
      )
      .field(
        "withoutFile",
        pure(|dir: Directory, args: PathArgs| Ok(dir.without_file(&args.path))),
      )
      .field(
        "withoutDirectory",
        pure(|dir: Directory, args: PathArgs| Ok(dir.without_directory(&args.path))),
      )
      .field(
        "withTimestamps",
        pure(|dir: Directory, args: TimestampArgs| Ok(dir.with_timestamps(args.timestamp))),
      )
      .field(
        "diff",
        pure(|dir: Directory, args: DiffArgs| {
          let other = directory_arg(Some(&args.other), dir.platform(), &dir.pipeline)?;
          dir.diff(&other)
        }),
      )
      .field("export", op(rt, export))
      .field(
        "withServiceBinding",
        pure(|dir: Directory, args: ServiceBindingArgs| {
          dir.with_service_binding(&args.alias, &args.service.decode()?)
        }),
      )
      .field("dockerBuild", op(rt, docker_build));

    let container = ObjectResolver::new()
      .field("rootfs", pure(|c: Container, _: NoArgs| Ok(c.rootfs())))
      .field(
        "withRootfs",
        pure(|c: Container, args: RootfsArgs| {
          let dir = directory_arg(Some(&args.directory), &c.platform, &c.pipeline)?;
          Ok(c.with_rootfs(&dir))
        }),
      );

    Resolvers::new()
      .object("Query", query)
      .object("Directory", directory)
      .object("Container", container)
  }
}
