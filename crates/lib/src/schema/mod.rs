//! Schema modules exposing the object model through the router.
//!
//! Each module owns one object type: its schema fragment, the resolvers
//! for its fields, and the `Query` fields that construct it. Modules reach
//! the engine only through the [`Runtime`] they are built with.

pub mod container;
pub mod directory;
pub mod file;
pub mod query;
pub mod secret;
pub mod service;

use std::future::Future;
use std::sync::Arc;

use graft_router::{Context, FieldResolver, FromValue, IntoValue, ResolveError, SchemaModule, Value, resolver};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::id::{DecodeError, Identified, ObjectId, decode_id, encode_id};
use crate::model::{Container, Directory, File, FileInfo, ModelError, Query, Secret, Service};
use crate::pipeline::{Pipeline, PipelineLabel};
use crate::platform::Platform;
use crate::runtime::Runtime;

/// Every module of the API, ready to register.
pub fn modules(runtime: &Arc<Runtime>) -> Vec<Arc<dyn SchemaModule>> {
  vec![
    Arc::new(query::QueryModule::new(runtime.clone())),
    Arc::new(secret::SecretModule::new(runtime.clone())),
    Arc::new(service::ServiceModule),
    Arc::new(file::FileModule::new(runtime.clone())),
    Arc::new(container::ContainerModule::new(runtime.clone())),
    Arc::new(directory::DirectoryModule::new(runtime.clone())),
  ]
}

/// Objects travel between resolvers as their type name and ID.
macro_rules! object_value {
  ($($ty:ty),* $(,)?) => {
    $(
      impl IntoValue for $ty {
        fn into_value(self) -> Result<Value, ResolveError> {
          let id = encode_id(&self).map_err(ModelError::from)?;
          Ok(Value::object(<$ty as Identified>::KIND.as_str(), id))
        }
      }

      impl FromValue for $ty {
        fn from_value(value: Value) -> Result<Self, ResolveError> {
          let expected = <$ty as Identified>::KIND.as_str();
          match value {
            Value::Object(obj) if obj.typename == expected => Ok(decode_id(&obj.id).map_err(ModelError::from)?),
            Value::Object(obj) => Err(ResolveError::InvalidParent {
              expected: expected.to_string(),
              found: obj.typename,
            }),
            other => Err(ResolveError::InvalidParent {
              expected: expected.to_string(),
              found: other.kind().to_string(),
            }),
          }
        }
      }
    )*
  };
}

object_value!(Query, Directory, File, FileInfo, Container, Secret, Service);

impl IntoValue for Platform {
  fn into_value(self) -> Result<Value, ResolveError> {
    Ok(Value::String(self.to_string()))
  }
}

/// A resolver for a field that needs nothing but its parent and arguments.
pub(crate) fn pure<P, A, R, F>(func: F) -> FieldResolver
where
  P: FromValue + Send + 'static,
  A: DeserializeOwned + Send + 'static,
  R: IntoValue + Send + 'static,
  F: Fn(P, A) -> Result<R, ModelError> + Send + Sync + 'static,
{
  resolver(move |_ctx, parent: P, args: A| {
    let result = func(parent, args).map_err(ResolveError::from);
    async move { result }
  })
}

/// A resolver for a field that runs against the engine runtime.
pub(crate) fn op<P, A, R, F, Fut>(runtime: &Arc<Runtime>, func: F) -> FieldResolver
where
  P: FromValue + Send + 'static,
  A: DeserializeOwned + Send + 'static,
  R: IntoValue + Send + 'static,
  F: Fn(Arc<Runtime>, Context, P, A) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<R, ModelError>> + Send + 'static,
{
  let runtime = runtime.clone();
  resolver(move |ctx, parent: P, args: A| {
    let fut = func(runtime.clone(), ctx, parent, args);
    async move { fut.await.map_err(ResolveError::from) }
  })
}

/// Arguments of every `pipeline` field.
#[derive(Debug, Deserialize)]
pub(crate) struct PipelineArgs {
  name: String,
  #[serde(default)]
  description: Option<String>,
  #[serde(default)]
  labels: Option<Vec<PipelineLabel>>,
}

impl PipelineArgs {
  pub(crate) fn into_pipeline(self) -> Pipeline {
    Pipeline {
      name: self.name,
      description: self.description.unwrap_or_default(),
      labels: self.labels.unwrap_or_default(),
    }
  }
}

/// Arguments of the `Query` fields that load an object by ID.
#[derive(Debug, Deserialize)]
#[serde(bound = "")]
pub(crate) struct IdArgs<T> {
  #[serde(default)]
  id: Option<ObjectId<T>>,
}

impl<T: Identified> IdArgs<T> {
  /// The ID, unless it was omitted or empty.
  pub(crate) fn given(&self) -> Option<&ObjectId<T>> {
    self.id.as_ref().filter(|id| !id.is_empty())
  }

  pub(crate) fn decode(&self) -> Result<T, ModelError> {
    match self.given() {
      Some(id) => Ok(id.decode()?),
      None => Err(DecodeError::Empty(T::KIND).into()),
    }
  }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServiceBindingArgs {
  alias: String,
  service: ObjectId<Service>,
}
