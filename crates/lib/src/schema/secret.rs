use std::sync::Arc;

use graft_router::{Context, NoArgs, ObjectResolver, Resolvers, SchemaModule};
use serde::Deserialize;

use super::{op, pure};
use crate::id::ObjectId;
use crate::model::{ModelError, Query, Secret};
use crate::runtime::Runtime;

#[derive(Debug, Deserialize)]
struct SecretArgs {
  id: ObjectId<Secret>,
}

#[derive(Debug, Deserialize)]
struct SetSecretArgs {
  name: String,
  plaintext: String,
}

async fn plaintext(rt: Arc<Runtime>, ctx: Context, secret: Secret, _: NoArgs) -> Result<String, ModelError> {
  let bytes = secret.plaintext(&rt, &ctx).await?;
  Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub struct SecretModule {
  runtime: Arc<Runtime>,
}

impl SecretModule {
  pub fn new(runtime: Arc<Runtime>) -> Self {
    Self { runtime }
  }
}

impl SchemaModule for SecretModule {
  fn name(&self) -> &str {
    "secret"
  }

  fn schema(&self) -> &str {
    include_str!("secret.graphql")
  }

  fn dependencies(&self) -> &[&'static str] {
    &["query"]
  }

  fn resolvers(&self) -> Resolvers {
    let runtime = self.runtime.clone();

    Resolvers::new()
      .object(
        "Query",
        ObjectResolver::new()
          .field("secret", pure(|_: Query, args: SecretArgs| Ok(args.id.decode()?)))
          .field(
            "setSecret",
            pure(move |_: Query, args: SetSecretArgs| {
              Ok(runtime.secrets().set(&args.name, args.plaintext.into_bytes()))
            }),
          ),
      )
      .object(
        "Secret",
        ObjectResolver::new()
          .field("id", pure(|secret: Secret, _: NoArgs| secret.id()))
          .field("plaintext", op(&self.runtime, plaintext)),
      )
  }
}
