//! graft-router: a modular, schema-driven API router.
//!
//! Independently authored [`SchemaModule`]s contribute schema fragments and
//! field resolvers. A [`RegistryBuilder`] merges them in dependency order
//! into an immutable [`Registry`], which parses, validates, and executes
//! query documents with per-field error isolation.

pub mod ast;
pub mod context;
pub mod document;
pub mod error;
pub mod execute;
pub mod module;
pub mod registry;
pub mod schema;
pub mod sdl;
pub mod value;

pub use context::{CancelToken, Cancelled, Context};
pub use error::{NOT_IMPLEMENTED_MESSAGE, ResolveError};
pub use execute::{PathSegment, Request, Response, ResponseError};
pub use ast::ParseError;
pub use module::{
  Arguments, FieldResolver, NoArgs, ObjectResolver, ResolveFuture, Resolvers, SchemaModule, not_implemented, resolver,
};
pub use registry::{Registry, RegistryBuilder, RegistryError};
pub use schema::{QUERY_TYPE, Schema};
pub use value::{FromValue, IntoValue, ObjectRef, Value};
