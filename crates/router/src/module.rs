//! Schema modules and the resolvers they contribute.
//!
//! A module is an independently authored unit: a name, a schema fragment,
//! resolvers keyed by `(type, field)`, and the names of the modules whose
//! types it builds on. Modules never see each other directly; the registry
//! merges them.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::context::Context;
use crate::error::ResolveError;
use crate::value::{FromValue, IntoValue, Value};

/// Coerced field arguments, keyed by argument name.
pub type Arguments = serde_json::Map<String, serde_json::Value>;

pub type ResolveFuture = Pin<Box<dyn Future<Output = Result<Value, ResolveError>> + Send>>;

type ResolverFn = dyn Fn(Context, Value, Arguments) -> ResolveFuture + Send + Sync;

/// Argument type for fields that take no arguments.
#[derive(Debug, Default, Deserialize)]
pub struct NoArgs {}

/// A resolver for one `(type, field)` pair.
#[derive(Clone)]
pub struct FieldResolver {
  func: Arc<ResolverFn>,
  overrides: bool,
}

impl std::fmt::Debug for FieldResolver {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("FieldResolver").field("overrides", &self.overrides).finish()
  }
}

impl FieldResolver {
  /// Wrap an untyped resolver function.
  pub fn new<F>(func: F) -> Self
  where
    F: Fn(Context, Value, Arguments) -> ResolveFuture + Send + Sync + 'static,
  {
    Self {
      func: Arc::new(func),
      overrides: false,
    }
  }

  /// Mark this resolver as deliberately replacing one registered by a
  /// module earlier in dependency order.
  pub fn overriding(mut self) -> Self {
    self.overrides = true;
    self
  }

  pub fn overrides(&self) -> bool {
    self.overrides
  }

  pub fn call(&self, ctx: Context, parent: Value, args: Arguments) -> ResolveFuture {
    (self.func)(ctx, parent, args)
  }
}

/// Build a resolver from a typed function.
///
/// The parent is converted with [`FromValue`], the coerced arguments are
/// deserialized into `A`, and the result is converted with [`IntoValue`].
pub fn resolver<P, A, R, F, Fut>(func: F) -> FieldResolver
where
  P: FromValue + Send + 'static,
  A: DeserializeOwned + Send + 'static,
  R: IntoValue + 'static,
  F: Fn(Context, P, A) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<R, ResolveError>> + Send + 'static,
{
  FieldResolver::new(move |ctx, parent, args| -> ResolveFuture {
    let parent = match P::from_value(parent) {
      Ok(parent) => parent,
      Err(e) => return Box::pin(async move { Err(e) }),
    };
    let args: A = match serde_json::from_value(serde_json::Value::Object(args)) {
      Ok(args) => args,
      Err(e) => {
        let err = ResolveError::InvalidArguments(e.to_string());
        return Box::pin(async move { Err(err) });
      }
    };

    let fut = func(ctx, parent, args);
    Box::pin(async move { fut.await?.into_value() })
  })
}

/// A resolver for fields that are declared but intentionally unimplemented.
///
/// Always fails with [`ResolveError::NotImplemented`].
pub fn not_implemented(type_name: &str, field: &str) -> FieldResolver {
  let type_name = type_name.to_string();
  let field = field.to_string();

  FieldResolver::new(move |_, _, _| -> ResolveFuture {
    let err = ResolveError::NotImplemented {
      type_name: type_name.clone(),
      field: field.clone(),
    };
    Box::pin(async move { Err(err) })
  })
}

/// Resolvers for the fields of one object type.
#[derive(Debug, Default, Clone)]
pub struct ObjectResolver {
  fields: BTreeMap<String, FieldResolver>,
}

impl ObjectResolver {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn field(mut self, name: &str, resolver: FieldResolver) -> Self {
    self.fields.insert(name.to_string(), resolver);
    self
  }

  /// Register a resolver that replaces one from a dependency.
  pub fn override_field(self, name: &str, resolver: FieldResolver) -> Self {
    self.field(name, resolver.overriding())
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldResolver)> {
    self.fields.iter()
  }
}

/// All resolvers a module contributes, grouped by object type.
#[derive(Debug, Default, Clone)]
pub struct Resolvers {
  objects: BTreeMap<String, ObjectResolver>,
}

impl Resolvers {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add resolvers for `type_name`, merging with any already present.
  pub fn object(mut self, type_name: &str, resolver: ObjectResolver) -> Self {
    let entry = self.objects.entry(type_name.to_string()).or_default();
    entry.fields.extend(resolver.fields);
    self
  }

  pub fn get(&self, type_name: &str, field: &str) -> Option<&FieldResolver> {
    self.objects.get(type_name).and_then(|o| o.fields.get(field))
  }

  /// Iterate `(type, field, resolver)` triples in a stable order.
  pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &FieldResolver)> {
    self
      .objects
      .iter()
      .flat_map(|(ty, obj)| obj.iter().map(move |(field, r)| (ty.as_str(), field.as_str(), r)))
  }
}

/// A self-contained unit contributing types and resolvers to the API.
pub trait SchemaModule: Send + Sync {
  /// Unique module name.
  fn name(&self) -> &str;

  /// Schema-language fragment declaring this module's types and fields.
  fn schema(&self) -> &str;

  fn resolvers(&self) -> Resolvers;

  /// Names of modules that must be registered and merged before this one.
  fn dependencies(&self) -> &[&'static str] {
    &[]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Debug, Deserialize)]
  struct EchoArgs {
    text: String,
  }

  #[tokio::test]
  async fn typed_resolver_decodes_arguments() {
    let r = resolver(|_ctx, _parent: Value, args: EchoArgs| async move { Ok::<_, ResolveError>(args.text) });

    let mut args = Arguments::new();
    args.insert("text".into(), serde_json::json!("hi"));

    let out = r.call(Context::new(), Value::Null, args).await.unwrap();
    assert_eq!(out, Value::String("hi".into()));
  }

  #[tokio::test]
  async fn typed_resolver_reports_bad_arguments() {
    let r = resolver(|_ctx, _parent: Value, args: EchoArgs| async move { Ok::<_, ResolveError>(args.text) });

    let err = r.call(Context::new(), Value::Null, Arguments::new()).await.unwrap_err();
    assert!(matches!(err, ResolveError::InvalidArguments(_)));
  }

  #[tokio::test]
  async fn stub_always_fails_with_not_implemented() {
    let stub = not_implemented("Container", "publish");
    let err = stub.call(Context::new(), Value::Null, Arguments::new()).await.unwrap_err();
    assert_eq!(err.code(), "NOT_IMPLEMENTED");
  }

  #[test]
  fn object_resolvers_merge_by_type() {
    let noop = || resolver(|_ctx, _p: Value, _a: NoArgs| async move { Ok::<_, ResolveError>(true) });

    let resolvers = Resolvers::new()
      .object("Directory", ObjectResolver::new().field("entries", noop()))
      .object("Directory", ObjectResolver::new().override_field("id", noop()));

    assert!(resolvers.get("Directory", "entries").is_some());
    assert!(resolvers.get("Directory", "id").unwrap().overrides());
    assert_eq!(resolvers.iter().count(), 2);
  }
}
