use std::sync::Arc;

use graft_router::{NoArgs, ObjectResolver, Resolvers, SchemaModule};

use super::{PipelineArgs, pure};
use crate::model::Query;
use crate::runtime::Runtime;

/// Declares the root type and the scalars every other module uses.
pub struct QueryModule {
  runtime: Arc<Runtime>,
}

impl QueryModule {
  pub fn new(runtime: Arc<Runtime>) -> Self {
    Self { runtime }
  }
}

impl SchemaModule for QueryModule {
  fn name(&self) -> &str {
    "query"
  }

  fn schema(&self) -> &str {
    include_str!("query.graphql")
  }

  fn resolvers(&self) -> Resolvers {
    let platform = self.runtime.config().platform.clone();

    Resolvers::new().object(
      "Query",
      ObjectResolver::new()
        .field(
          "defaultPlatform",
          pure(move |_: Query, _: NoArgs| Ok(platform.clone())),
        )
        .field(
          "pipeline",
          pure(|query: Query, args: PipelineArgs| Ok(query.with_pipeline(args.into_pipeline()))),
        ),
    )
  }
}
