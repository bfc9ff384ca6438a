//! Module registration and schema merging.
//!
//! Modules are registered on a [`RegistryBuilder`], then merged in dependency
//! order into one immutable [`Registry`]. Every module sees the types of the
//! modules it depends on, so it can extend them with new fields. Two modules
//! defining the same `(type, field)` pair is a conflict unless the later
//! module marks its resolver as an override.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use thiserror::Error;
use tracing::{debug, info};

use crate::ast::{ParseError, TypeRef};
use crate::module::{FieldResolver, SchemaModule};
use crate::schema::{QUERY_TYPE, Schema};
use crate::sdl::{TypeDef, TypeKind, parse_schema};

#[derive(Debug, Error)]
pub enum RegistryError {
  #[error("module '{0}' is registered more than once")]
  DuplicateModule(String),

  #[error("module '{module}' depends on '{dependency}', which is not registered")]
  MissingDependency { module: String, dependency: String },

  #[error("module dependencies form a cycle through '{0}'")]
  DependencyCycle(String),

  #[error("module '{module}' has an invalid schema: {source}")]
  InvalidSchema {
    module: String,
    #[source]
    source: ParseError,
  },

  #[error("{type_name}.{field} is defined by both '{first}' and '{second}'")]
  Conflict {
    type_name: String,
    field: String,
    first: String,
    second: String,
  },

  #[error("type '{type_name}' is declared as '{first}' and as '{second}'")]
  TypeKindConflict {
    type_name: String,
    first: &'static str,
    second: &'static str,
  },

  #[error("module '{module}' extends '{type_name}', which no module it depends on declares")]
  UnknownExtension { module: String, type_name: String },

  #[error("{location} refers to unknown type '{type_name}'")]
  UnknownType { location: String, type_name: String },

  #[error("module '{module}' resolves {type_name}.{field}, which is not declared")]
  UndeclaredResolver {
    module: String,
    type_name: String,
    field: String,
  },

  #[error("{type_name}.{field} has no resolver")]
  MissingResolver { type_name: String, field: String },

  #[error("no module declares the root type '{0}'")]
  MissingRootType(&'static str),
}

/// Collects modules before they are merged.
#[derive(Default)]
pub struct RegistryBuilder {
  modules: Vec<Arc<dyn SchemaModule>>,
}

impl RegistryBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(self, module: impl SchemaModule + 'static) -> Self {
    self.register_arc(Arc::new(module))
  }

  pub fn register_arc(mut self, module: Arc<dyn SchemaModule>) -> Self {
    self.modules.push(module);
    self
  }

  /// Merge every registered module into a registry.
  ///
  /// # Errors
  ///
  /// Fails on duplicate or missing modules, dependency cycles, unparsable
  /// schema fragments, unresolved conflicts, and fields left without a
  /// resolver.
  pub fn build(self) -> Result<Registry, RegistryError> {
    let ordered = dependency_order(&self.modules)?;
    let mut merger = Merger::default();

    for module in &ordered {
      merger.merge(module.as_ref())?;
    }

    let inner = merger.finish(ordered.iter().map(|m| m.name().to_string()).collect())?;
    info!(modules = inner.modules.len(), types = inner.schema.types().count(), "schema merged");

    Ok(Registry { inner: Arc::new(inner) })
  }
}

/// Order modules so that every module comes after its dependencies.
fn dependency_order(modules: &[Arc<dyn SchemaModule>]) -> Result<Vec<Arc<dyn SchemaModule>>, RegistryError> {
  let mut graph: DiGraph<usize, ()> = DiGraph::new();
  let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();

  for (i, module) in modules.iter().enumerate() {
    let idx = graph.add_node(i);
    if nodes.insert(module.name(), idx).is_some() {
      return Err(RegistryError::DuplicateModule(module.name().to_string()));
    }
  }

  for module in modules {
    let dependent = nodes[module.name()];
    for dependency in module.dependencies() {
      let Some(&dep_idx) = nodes.get(dependency) else {
        return Err(RegistryError::MissingDependency {
          module: module.name().to_string(),
          dependency: dependency.to_string(),
        });
      };
      graph.add_edge(dep_idx, dependent, ());
    }
  }

  let sorted = toposort(&graph, None)
    .map_err(|cycle| RegistryError::DependencyCycle(modules[graph[cycle.node_id()]].name().to_string()))?;

  Ok(sorted.into_iter().map(|idx| modules[graph[idx]].clone()).collect())
}

/// Accumulates merged types and resolvers, tracking which module owns each.
#[derive(Default)]
struct Merger {
  types: BTreeMap<String, TypeDef>,
  /// Module that last defined each `(type, field)` in schema language.
  field_owners: HashMap<(String, String), String>,
  resolvers: HashMap<String, HashMap<String, FieldResolver>>,
  resolver_owners: HashMap<(String, String), String>,
}

impl Merger {
  fn merge(&mut self, module: &dyn SchemaModule) -> Result<(), RegistryError> {
    let name = module.name();
    let defs = parse_schema(module.schema()).map_err(|source| RegistryError::InvalidSchema {
      module: name.to_string(),
      source,
    })?;
    let resolvers = module.resolvers();

    for def in defs {
      self.merge_type(name, def, |ty, field| resolvers.get(ty, field).is_some_and(FieldResolver::overrides))?;
    }

    for (type_name, field, resolver) in resolvers.iter() {
      let key = (type_name.to_string(), field.to_string());
      if let Some(first) = self.resolver_owners.get(&key)
        && !resolver.overrides()
      {
        return Err(RegistryError::Conflict {
          type_name: key.0,
          field: key.1,
          first: first.clone(),
          second: name.to_string(),
        });
      }

      if !self.types.get(type_name).is_some_and(|t| t.field(field).is_some()) {
        return Err(RegistryError::UndeclaredResolver {
          module: name.to_string(),
          type_name: key.0,
          field: key.1,
        });
      }

      debug!(module = name, type_name, field, overrides = resolver.overrides(), "resolver registered");
      self
        .resolvers
        .entry(key.0.clone())
        .or_default()
        .insert(key.1.clone(), resolver.clone());
      self.resolver_owners.insert(key, name.to_string());
    }

    Ok(())
  }

  fn merge_type(
    &mut self,
    module: &str,
    def: TypeDef,
    overrides: impl Fn(&str, &str) -> bool,
  ) -> Result<(), RegistryError> {
    let Some(existing) = self.types.get_mut(&def.name) else {
      if def.extension {
        return Err(RegistryError::UnknownExtension {
          module: module.to_string(),
          type_name: def.name,
        });
      }
      for field in &def.fields {
        self
          .field_owners
          .insert((def.name.clone(), field.name.clone()), module.to_string());
      }
      for field in &def.input_fields {
        self
          .field_owners
          .insert((def.name.clone(), field.name.clone()), module.to_string());
      }
      self.types.insert(def.name.clone(), TypeDef { extension: false, ..def });
      return Ok(());
    };

    if existing.kind != def.kind {
      return Err(RegistryError::TypeKindConflict {
        type_name: def.name,
        first: existing.kind.keyword(),
        second: def.kind.keyword(),
      });
    }

    if existing.description.is_none() {
      existing.description = def.description;
    }

    for field in def.fields {
      let key = (def.name.clone(), field.name.clone());
      match existing.fields.iter_mut().find(|f| f.name == field.name) {
        Some(slot) => {
          if !overrides(&def.name, &field.name) {
            return Err(conflict(key, &self.field_owners, module));
          }
          *slot = field;
        }
        None => existing.fields.push(field),
      }
      self.field_owners.insert(key, module.to_string());
    }

    for field in def.input_fields {
      let key = (def.name.clone(), field.name.clone());
      if existing.input_fields.iter().any(|f| f.name == field.name) {
        return Err(conflict(key, &self.field_owners, module));
      }
      existing.input_fields.push(field);
      self.field_owners.insert(key, module.to_string());
    }

    for value in def.enum_values {
      if !existing.enum_values.contains(&value) {
        existing.enum_values.push(value);
      }
    }

    Ok(())
  }

  fn finish(self, modules: Vec<String>) -> Result<RegistryInner, RegistryError> {
    let schema = Schema::new(self.types);

    match schema.get(QUERY_TYPE) {
      Some(def) if def.kind == TypeKind::Object => {}
      _ => return Err(RegistryError::MissingRootType(QUERY_TYPE)),
    }

    for def in schema.types() {
      for field in &def.fields {
        check_type_ref(&schema, &field.ty, || format!("{}.{}", def.name, field.name))?;
        for arg in &field.args {
          check_type_ref(&schema, &arg.ty, || format!("{}.{}({})", def.name, field.name, arg.name))?;
        }

        let resolved = self
          .resolvers
          .get(&def.name)
          .is_some_and(|fields| fields.contains_key(&field.name));
        if !resolved {
          return Err(RegistryError::MissingResolver {
            type_name: def.name.clone(),
            field: field.name.clone(),
          });
        }
      }
      for field in &def.input_fields {
        check_type_ref(&schema, &field.ty, || format!("{}.{}", def.name, field.name))?;
      }
    }

    Ok(RegistryInner {
      schema,
      resolvers: self.resolvers,
      modules,
    })
  }
}

fn conflict(key: (String, String), owners: &HashMap<(String, String), String>, second: &str) -> RegistryError {
  let first = owners.get(&key).cloned().unwrap_or_default();
  RegistryError::Conflict {
    type_name: key.0,
    field: key.1,
    first,
    second: second.to_string(),
  }
}

fn check_type_ref(schema: &Schema, ty: &TypeRef, location: impl FnOnce() -> String) -> Result<(), RegistryError> {
  let name = ty.base_name();
  if schema.kind_of(name).is_none() {
    return Err(RegistryError::UnknownType {
      location: location(),
      type_name: name.to_string(),
    });
  }
  Ok(())
}

pub(crate) struct RegistryInner {
  pub(crate) schema: Schema,
  pub(crate) resolvers: HashMap<String, HashMap<String, FieldResolver>>,
  pub(crate) modules: Vec<String>,
}

/// The merged, immutable API surface. Cheap to clone.
#[derive(Clone)]
pub struct Registry {
  pub(crate) inner: Arc<RegistryInner>,
}

impl std::fmt::Debug for Registry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Registry").field("modules", &self.inner.modules).finish()
  }
}

impl Registry {
  pub fn builder() -> RegistryBuilder {
    RegistryBuilder::new()
  }

  pub fn schema(&self) -> &Schema {
    &self.inner.schema
  }

  /// Module names in the order they were merged.
  pub fn modules(&self) -> &[String] {
    &self.inner.modules
  }

  pub fn resolver(&self, type_name: &str, field: &str) -> Option<&FieldResolver> {
    self.inner.resolvers.get(type_name).and_then(|fields| fields.get(field))
  }
}
