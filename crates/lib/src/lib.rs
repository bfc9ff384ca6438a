//! graft-lib: a content-addressed build graph served through graft-router.
//!
//! This crate provides:
//! - `id`: opaque, versioned object identifiers
//! - `graph`: the build-graph IR objects are made of
//! - `model`: `Directory`, `File`, `Container`, `Secret`, and `Service`
//! - `services`: service bindings and their refcounted lifecycle
//! - `backend`: the execution backend contract and an in-memory backend
//! - `schema`: the schema modules exposing the model
//! - `engine`: all of the above assembled behind one request entry point

pub mod backend;
pub mod config;
pub mod consts;
pub mod engine;
pub mod graph;
pub mod id;
pub mod model;
pub mod pipeline;
pub mod platform;
pub mod runtime;
pub mod schema;
pub mod services;
pub mod util;

pub use backend::{Backend, MemoryBackend};
pub use config::EngineConfig;
pub use engine::{Engine, EngineError};
pub use id::{IdKind, ObjectId};
pub use runtime::Runtime;
