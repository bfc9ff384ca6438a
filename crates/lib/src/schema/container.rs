use std::sync::Arc;

use graft_router::{NoArgs, ObjectResolver, Resolvers, SchemaModule, not_implemented};
use serde::Deserialize;

use super::{PipelineArgs, ServiceBindingArgs, pure};
use crate::id::ObjectId;
use crate::model::{Container, ModelError, Query};
use crate::platform::Platform;
use crate::runtime::Runtime;

#[derive(Debug, Deserialize)]
struct ContainerArgs {
  #[serde(default)]
  id: Option<ObjectId<Container>>,
  #[serde(default)]
  platform: Option<Platform>,
}

#[derive(Debug, Deserialize)]
struct NameArgs {
  name: String,
}

#[derive(Debug, Deserialize)]
struct NameValueArgs {
  name: String,
  value: String,
}

#[derive(Debug, Deserialize)]
struct ArgsArgs {
  args: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PathArgs {
  path: String,
}

#[derive(Debug, Deserialize)]
struct PortsArgs {
  #[serde(default)]
  ports: Option<Vec<u16>>,
}

pub struct ContainerModule {
  runtime: Arc<Runtime>,
}

impl ContainerModule {
  pub fn new(runtime: Arc<Runtime>) -> Self {
    Self { runtime }
  }
}

impl SchemaModule for ContainerModule {
  fn name(&self) -> &str {
    "container"
  }

  fn schema(&self) -> &str {
    include_str!("container.graphql")
  }

  fn dependencies(&self) -> &[&'static str] {
    &["query", "service"]
  }

  fn resolvers(&self) -> Resolvers {
    let default_platform = self.runtime.config().platform.clone();

    let container = move |query: Query, args: ContainerArgs| -> Result<Container, ModelError> {
      match args.id.filter(|id| !id.is_empty()) {
        Some(id) => Ok(id.decode()?),
        None => Ok(Container::new(
          args.platform.unwrap_or_else(|| default_platform.clone()),
          query.pipeline,
        )),
      }
    };

    Resolvers::new()
      .object("Query", ObjectResolver::new().field("container", pure(container)))
      .object(
        "Container",
        ObjectResolver::new()
          .field("id", pure(|c: Container, _: NoArgs| c.id()))
          .field("platform", pure(|c: Container, _: NoArgs| Ok(c.platform)))
          .field(
            "pipeline",
            pure(|c: Container, args: PipelineArgs| Ok(c.with_pipeline(args.into_pipeline()))),
          )
          .field("entrypoint", pure(|c: Container, _: NoArgs| Ok(c.config.entrypoint)))
          .field("defaultArgs", pure(|c: Container, _: NoArgs| Ok(c.config.cmd)))
          .field("workdir", pure(|c: Container, _: NoArgs| Ok(c.workdir().map(str::to_string))))
          .field("user", pure(|c: Container, _: NoArgs| Ok(c.user().map(str::to_string))))
          .field(
            "envVariable",
            pure(|c: Container, args: NameArgs| Ok(c.env_variable(&args.name).map(str::to_string))),
          )
          .field(
            "label",
            pure(|c: Container, args: NameArgs| Ok(c.label(&args.name).map(str::to_string))),
          )
          .field(
            "withEntrypoint",
            pure(|c: Container, args: ArgsArgs| Ok(c.with_entrypoint(args.args))),
          )
          .field(
            "withDefaultArgs",
            pure(|c: Container, args: ArgsArgs| Ok(c.with_default_args(args.args))),
          )
          .field(
            "withEnvVariable",
            pure(|c: Container, args: NameValueArgs| Ok(c.with_env_variable(&args.name, &args.value))),
          )
          .field(
            "withWorkdir",
            pure(|c: Container, args: PathArgs| Ok(c.with_workdir(&args.path))),
          )
          .field(
            "withUser",
            pure(|c: Container, args: NameArgs| Ok(c.with_user(&args.name))),
          )
          .field(
            "withLabel",
            pure(|c: Container, args: NameValueArgs| Ok(c.with_label(&args.name, &args.value))),
          )
          .field(
            "asService",
            pure(|c: Container, args: PortsArgs| Ok(c.as_service(args.ports.unwrap_or_default()))),
          )
          .field(
            "withServiceBinding",
            pure(|c: Container, args: ServiceBindingArgs| {
              c.with_service_binding(&args.alias, &args.service.decode()?)
            }),
          )
          .field("publish", not_implemented("Container", "publish")),
      )
  }
}
