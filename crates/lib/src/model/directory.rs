use graft_router::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::container::Container;
use super::file::File;
use super::host;
use super::secret::Secret;
use super::service::Service;
use super::ModelError;
use crate::backend::{BuildArg, BuildSecret, DockerBuildRequest};
use crate::consts::{DEFAULT_DIR_MODE, DEFAULT_DOCKERFILE, DEFAULT_FILE_MODE};
use crate::graph::{CopyInfo, Definition, FileAction, Node, path};
use crate::id::{IdKind, Identified, encode_id};
use crate::pipeline::{Pipeline, PipelinePath};
use crate::platform::Platform;
use crate::runtime::Runtime;
use crate::services::ServiceBindings;

/// A view of a directory inside a build graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directory {
  pub def: Definition,
  /// Working path of the view inside `def`; every path argument is
  /// resolved below it.
  pub dir: String,
  pub pipeline: PipelinePath,
  #[serde(default, skip_serializing_if = "ServiceBindings::is_empty")]
  pub services: ServiceBindings,
}

impl Identified for Directory {
  const KIND: IdKind = IdKind::Directory;
}

/// Include and exclude patterns applied when copying a directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CopyFilter {
  #[serde(default)]
  pub include: Vec<String>,
  #[serde(default)]
  pub exclude: Vec<String>,
}

/// Parameters of [`Directory::docker_build`].
#[derive(Debug, Clone, Default)]
pub struct DockerBuild {
  /// Build definition path relative to the directory; `Dockerfile` if unset.
  pub dockerfile: Option<String>,
  pub build_args: Vec<BuildArg>,
  pub target: Option<String>,
  pub secrets: Vec<Secret>,
  /// Target platform; the engine default if unset.
  pub platform: Option<Platform>,
}

impl Directory {
  pub fn new(def: Definition, dir: &str, pipeline: PipelinePath, services: ServiceBindings) -> Self {
    Self {
      def,
      dir: path::clean(dir),
      pipeline,
      services,
    }
  }

  /// The canonical empty directory.
  pub fn scratch(platform: Platform, pipeline: PipelinePath) -> Self {
    Self::new(Definition::scratch(platform), "/", pipeline, ServiceBindings::new())
  }

  pub fn id(&self) -> Result<String, ModelError> {
    Ok(encode_id(self)?)
  }

  pub fn platform(&self) -> &Platform {
    &self.def.platform
  }

  fn with_def(&self, def: Definition) -> Self {
    Self {
      def,
      ..self.clone()
    }
  }

  fn apply(&self, op: &'static str, actions: Vec<FileAction>) -> Self {
    debug!(op, dir = %self.dir, actions = actions.len(), "directory transform");
    self.with_def(self.def.with_actions(actions))
  }

  fn resolve(&self, target: &str) -> String {
    path::resolve(&self.dir, target)
  }

  pub fn with_pipeline(&self, pipeline: Pipeline) -> Self {
    Self {
      pipeline: self.pipeline.add(pipeline),
      ..self.clone()
    }
  }

  /// A definition whose root is this view's working path.
  pub fn rooted(&self) -> Definition {
    if self.dir == "/" {
      return self.def.clone();
    }
    self.copy_into_scratch(None)
  }

  fn copy_into_scratch(&self, timestamp: Option<i64>) -> Definition {
    Definition::scratch(self.def.platform.clone()).with_action(FileAction::Copy {
      source: Box::new(self.def.root.clone()),
      src: self.dir.clone(),
      dest: "/".to_string(),
      info: CopyInfo {
        create_dest_path: true,
        copy_dir_contents: true,
        timestamp,
        ..CopyInfo::default()
      },
    })
  }

  pub fn with_new_file(&self, target: &str, contents: Vec<u8>, permissions: Option<u32>) -> Self {
    let target = self.resolve(target);
    let mut actions = Vec::with_capacity(2);
    if let Some(parent) = path::parent(&target).filter(|p| p != "/") {
      actions.push(FileAction::Mkdir {
        path: parent,
        mode: DEFAULT_DIR_MODE,
        make_parents: true,
        timestamp: None,
      });
    }
    actions.push(FileAction::Mkfile {
      path: target,
      mode: permissions.unwrap_or(DEFAULT_FILE_MODE),
      data: contents,
      timestamp: None,
    });
    self.apply("withNewFile", actions)
  }

  pub fn with_new_directory(&self, target: &str, permissions: Option<u32>) -> Self {
    self.apply(
      "withNewDirectory",
      vec![FileAction::Mkdir {
        path: self.resolve(target),
        mode: permissions.unwrap_or(DEFAULT_DIR_MODE),
        make_parents: true,
        timestamp: None,
      }],
    )
  }

  /// A view of the subdirectory at `target`.
  pub fn directory(&self, target: &str) -> Self {
    Self {
      dir: self.resolve(target),
      ..self.clone()
    }
  }

  pub fn file(&self, target: &str) -> File {
    File::new(
      self.def.clone(),
      &self.resolve(target),
      self.pipeline.clone(),
      self.services.clone(),
    )
  }

  /// Copy the contents of `source` to `target`, creating it if needed.
  ///
  /// The result keeps this directory's platform and carries the bindings of
  /// both directories.
  pub fn with_directory(&self, target: &str, source: &Directory, filter: &CopyFilter) -> Self {
    let copied = self.apply(
      "withDirectory",
      vec![FileAction::Copy {
        source: Box::new(source.def.root.clone()),
        src: source.dir.clone(),
        dest: self.resolve(target),
        info: CopyInfo {
          create_dest_path: true,
          copy_dir_contents: true,
          include: filter.include.clone(),
          exclude: filter.exclude.clone(),
          ..CopyInfo::default()
        },
      }],
    );
    Self {
      services: self.services.union(&source.services),
      ..copied
    }
  }

  /// Copy `source` to `target`. Copying onto an existing directory places
  /// the file inside it.
  pub fn with_file(&self, target: &str, source: &File, permissions: Option<u32>) -> Self {
    let copied = self.apply(
      "withFile",
      vec![FileAction::Copy {
        source: Box::new(source.def.root.clone()),
        src: source.file.clone(),
        dest: self.resolve(target),
        info: CopyInfo {
          create_dest_path: true,
          mode: permissions,
          ..CopyInfo::default()
        },
      }],
    );
    Self {
      services: self.services.union(&source.services),
      ..copied
    }
  }

  fn without(&self, op: &'static str, target: &str) -> Self {
    self.apply(
      op,
      vec![FileAction::Rm {
        path: self.resolve(target),
        allow_not_found: true,
      }],
    )
  }

  /// Remove the file at `target`; a missing file is not an error.
  pub fn without_file(&self, target: &str) -> Self {
    self.without("withoutFile", target)
  }

  /// Remove the directory at `target`; a missing directory is not an error.
  pub fn without_directory(&self, target: &str) -> Self {
    self.without("withoutDirectory", target)
  }

  /// Re-root the view into a fresh definition with every modification
  /// time set to `timestamp`.
  pub fn with_timestamps(&self, timestamp: i64) -> Self {
    debug!(op = "withTimestamps", dir = %self.dir, timestamp, "directory transform");
    Self {
      def: self.copy_into_scratch(Some(timestamp)),
      dir: "/".to_string(),
      ..self.clone()
    }
  }

  /// What `other` adds or changes relative to this directory.
  pub fn diff(&self, other: &Directory) -> Result<Self, ModelError> {
    if self.def.platform != other.def.platform {
      return Err(ModelError::PlatformMismatch {
        ours: self.def.platform.clone(),
        theirs: other.def.platform.clone(),
      });
    }
    if self.dir != other.dir {
      return Err(ModelError::DiffPathMismatch {
        ours: self.dir.clone(),
        theirs: other.dir.clone(),
      });
    }

    debug!(op = "diff", dir = %self.dir, "directory transform");
    // The diff holds only changed paths, so it is taken between the rooted
    // views and read from its own root.
    let def = Definition {
      platform: self.def.platform.clone(),
      root: Node::Diff {
        lower: Box::new(self.rooted().root),
        upper: Box::new(other.rooted().root),
      },
    };
    Ok(Self {
      def,
      dir: "/".to_string(),
      services: self.services.union(&other.services),
      ..self.clone()
    })
  }

  pub fn with_service_binding(&self, alias: &str, service: &Service) -> Result<Self, ModelError> {
    Ok(Self {
      services: self.services.bind(alias, service.spec.clone()).map_err(ModelError::Digest)?,
      ..self.clone()
    })
  }

  /// Names of the entries at `target` (the view itself when `None`).
  pub async fn entries(&self, rt: &Runtime, ctx: &Context, target: Option<&str>) -> Result<Vec<String>, ModelError> {
    let target = self.resolve(target.unwrap_or_default());
    rt.with_services(ctx, &self.services, self.read_entries(rt, ctx, &target))
      .await
  }

  async fn read_entries(&self, rt: &Runtime, ctx: &Context, target: &str) -> Result<Vec<String>, ModelError> {
    let Some(reference) = rt.solve(ctx, &self.def).await? else {
      return Ok(Vec::new());
    };
    let entries = reference.read_dir(target).await?;
    Ok(entries.into_iter().map(|entry| entry.name).collect())
  }

  /// Write the view's contents into the host directory `dest`.
  ///
  /// An empty result writes nothing. A destination that exists and is not
  /// a directory is rejected before anything is solved.
  pub async fn export(&self, rt: &Runtime, ctx: &Context, dest: &str) -> Result<(), ModelError> {
    let dest = host::destination(&rt.config().workdir, dest);
    host::ensure_directory_destination(&dest).await?;

    let written = rt
      .with_services(ctx, &self.services, self.write_tree(rt, ctx, &dest))
      .await?;
    info!(dest = %dest.display(), files = written, "directory exported");
    Ok(())
  }

  async fn write_tree(&self, rt: &Runtime, ctx: &Context, dest: &std::path::Path) -> Result<usize, ModelError> {
    match rt.solve(ctx, &self.def).await? {
      Some(reference) => host::export_tree(reference.as_ref(), &self.dir, dest).await,
      None => Ok(0),
    }
  }

  /// Build a container image with this directory as the build context.
  pub async fn docker_build(&self, rt: &Runtime, ctx: &Context, build: DockerBuild) -> Result<Container, ModelError> {
    let platform = build.platform.unwrap_or_else(|| rt.config().platform.clone());

    let mut secrets = Vec::with_capacity(build.secrets.len());
    for secret in &build.secrets {
      secrets.push(BuildSecret {
        id: secret.id()?,
        plaintext: secret.plaintext(rt, ctx).await?,
      });
    }

    let request = DockerBuildRequest {
      context: self.def.clone(),
      context_dir: self.dir.clone(),
      dockerfile: build.dockerfile.unwrap_or_else(|| DEFAULT_DOCKERFILE.to_string()),
      build_args: build.build_args,
      target: build.target,
      secrets,
      platform: platform.clone(),
    };
    let result = rt
      .with_services(ctx, &self.services, rt.build_dockerfile(ctx, request))
      .await?;

    Ok(Container {
      rootfs: Some(result.rootfs),
      config: result.config,
      pipeline: self.pipeline.clone(),
      platform,
      services: self.services.clone(),
    })
  }
}
