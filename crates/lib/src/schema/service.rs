use graft_router::{NoArgs, ObjectResolver, Resolvers, SchemaModule};
use serde::Deserialize;

use super::{IdArgs, pure};
use crate::model::{Query, Service};

#[derive(Debug, Deserialize)]
struct EndpointArgs {
  #[serde(default)]
  port: Option<u16>,
  #[serde(default)]
  scheme: Option<String>,
}

/// Services need no runtime to describe; they start when an object bound
/// to them is read.
pub struct ServiceModule;

impl SchemaModule for ServiceModule {
  fn name(&self) -> &str {
    "service"
  }

  fn schema(&self) -> &str {
    include_str!("service.graphql")
  }

  fn dependencies(&self) -> &[&'static str] {
    &["query"]
  }

  fn resolvers(&self) -> Resolvers {
    Resolvers::new()
      .object(
        "Query",
        ObjectResolver::new().field(
          "service",
          pure(|_: Query, args: IdArgs<Service>| args.decode()),
        ),
      )
      .object(
        "Service",
        ObjectResolver::new()
          .field("id", pure(|svc: Service, _: NoArgs| svc.id()))
          .field("hostname", pure(|svc: Service, _: NoArgs| svc.hostname()))
          .field(
            "ports",
            pure(|svc: Service, _: NoArgs| Ok(svc.ports().iter().map(|&p| i64::from(p)).collect::<Vec<_>>())),
          )
          .field(
            "endpoint",
            pure(|svc: Service, args: EndpointArgs| svc.endpoint(args.port, args.scheme.as_deref().unwrap_or_default())),
          ),
      )
  }
}
