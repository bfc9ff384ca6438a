//! Request execution against a merged [`Registry`].
//!
//! A request is parsed, validated against the schema, then resolved field by
//! field starting at `Query`. Sibling fields resolve concurrently. Errors are
//! recorded against the failing field's path; the field becomes `null` and,
//! when its type is non-null, the nearest nullable ancestor does instead.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use tokio::task::JoinSet;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::ast::{InputValue, TypeRef};
use crate::context::Context;
use crate::document::{Selection, parse_query};
use crate::error::ResolveError;
use crate::module::Arguments;
use crate::registry::Registry;
use crate::schema::{QUERY_TYPE, Schema};
use crate::sdl::{FieldDef, TypeKind};
use crate::value::Value;

/// Error code for documents that fail to parse.
pub const PARSE_ERROR: &str = "PARSE_ERROR";
/// Error code for documents that parse but do not fit the schema.
pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
/// Error code for a resolver task that panicked.
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";

const TYPENAME_FIELD: &str = "__typename";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
  pub query: String,
  #[serde(default)]
  pub variables: Map<String, Json>,
  #[serde(default)]
  pub operation_name: Option<String>,
}

impl Request {
  pub fn new(query: impl Into<String>) -> Self {
    Self {
      query: query.into(),
      ..Default::default()
    }
  }

  pub fn variable(mut self, name: &str, value: impl Into<Json>) -> Self {
    self.variables.insert(name.to_string(), value.into());
    self
  }

  pub fn operation_name(mut self, name: &str) -> Self {
    self.operation_name = Some(name.to_string());
    self
  }
}

/// One step of a response path: a response key or a list index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
  Field(String),
  Index(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorExtensions {
  pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseError {
  pub message: String,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub path: Vec<PathSegment>,
  pub extensions: ErrorExtensions,
}

impl ResponseError {
  fn new(message: impl Into<String>, code: &str, path: Vec<PathSegment>) -> Self {
    Self {
      message: message.into(),
      path,
      extensions: ErrorExtensions { code: code.to_string() },
    }
  }

  pub fn code(&self) -> &str {
    &self.extensions.code
  }

  /// The path rendered as `a.b.0.c`, for assertions and logs.
  pub fn path_string(&self) -> String {
    self
      .path
      .iter()
      .map(|segment| match segment {
        PathSegment::Field(name) => name.clone(),
        PathSegment::Index(i) => i.to_string(),
      })
      .collect::<Vec<_>>()
      .join(".")
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
  pub data: Option<Json>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub errors: Vec<ResponseError>,
}

impl Response {
  fn rejected(error: ResponseError) -> Self {
    Self {
      data: None,
      errors: vec![error],
    }
  }

  pub fn is_ok(&self) -> bool {
    self.errors.is_empty()
  }

  /// Value at a `.`-separated path under `data`, if present.
  pub fn get(&self, path: &str) -> Option<&Json> {
    path.split('.').try_fold(self.data.as_ref()?, |value, key| match key.parse::<usize>() {
      Ok(i) => value.get(i),
      Err(_) => value.get(key),
    })
  }

  pub fn to_json(&self) -> Json {
    serde_json::to_value(self).unwrap_or(Json::Null)
  }
}

/// Marks a null that reached a non-null position and must move up to the
/// nearest nullable ancestor. The error is recorded where it originated.
#[derive(Debug, Clone, Copy)]
struct Bubble;

type Completion<T> = Pin<Box<dyn Future<Output = Result<T, Bubble>> + Send>>;

struct ExecState {
  registry: Registry,
  ctx: Context,
  variables: Map<String, Json>,
  errors: Mutex<Vec<ResponseError>>,
}

impl ExecState {
  fn schema(&self) -> &Schema {
    self.registry.schema()
  }

  fn record(&self, path: &[PathSegment], err: &ResolveError) {
    debug!(path = ?path, code = err.code(), error = %err, "field failed");
    let mut errors = self.errors.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    errors.push(ResponseError::new(err.to_string(), err.code(), path.to_vec()));
  }
}

impl Registry {
  /// Execute a request, resolving `Query` fields against `root`.
  pub async fn execute(&self, ctx: Context, root: Value, request: Request) -> Response {
    let span = info_span!("request", id = ctx.request_id());
    self.execute_inner(ctx, root, request).instrument(span).await
  }

  async fn execute_inner(&self, ctx: Context, root: Value, request: Request) -> Response {
    let document = match parse_query(&request.query) {
      Ok(document) => document,
      Err(e) => return Response::rejected(ResponseError::new(e.to_string(), PARSE_ERROR, Vec::new())),
    };
    let operation = match document.operation(request.operation_name.as_deref()) {
      Ok(operation) => operation.clone(),
      Err(e) => return Response::rejected(ResponseError::new(e.to_string(), VALIDATION_ERROR, Vec::new())),
    };

    let mut problems = Vec::new();
    validate_selections(self.schema(), QUERY_TYPE, &operation.selections, &mut problems);
    let declared: Vec<&str> = operation.variables.iter().map(|v| v.name.as_str()).collect();
    collect_undeclared_variables(&operation.selections, &declared, &mut problems);
    if !problems.is_empty() {
      return Response {
        data: None,
        errors: problems
          .into_iter()
          .map(|message| ResponseError::new(message, VALIDATION_ERROR, Vec::new()))
          .collect(),
      };
    }

    let mut variables = Map::new();
    for def in &operation.variables {
      let value = match request.variables.get(&def.name) {
        Some(value) => Some(value.clone()),
        None => def.default.clone(),
      };
      match value {
        Some(value) => match coerce_input(self.schema(), &def.ty, value) {
          Ok(value) => {
            variables.insert(def.name.clone(), value);
          }
          Err(e) => {
            let message = format!("variable '${}': {}", def.name, e);
            return Response::rejected(ResponseError::new(message, VALIDATION_ERROR, Vec::new()));
          }
        },
        None if def.ty.is_non_null() => {
          let message = format!("variable '${}' of type '{}' was not provided", def.name, def.ty);
          return Response::rejected(ResponseError::new(message, VALIDATION_ERROR, Vec::new()));
        }
        None => {}
      }
    }

    info!(operation = operation.name.as_deref().unwrap_or("<anonymous>"), "executing");

    let state = Arc::new(ExecState {
      registry: self.clone(),
      ctx,
      variables,
      errors: Mutex::new(Vec::new()),
    });

    let data = match execute_selection_set(state.clone(), QUERY_TYPE.to_string(), root, operation.selections, Vec::new()).await {
      Ok(map) => Json::Object(map),
      Err(Bubble) => Json::Null,
    };

    let errors = std::mem::take(&mut *state.errors.lock().unwrap_or_else(|poisoned| poisoned.into_inner()));
    if !errors.is_empty() {
      info!(errors = errors.len(), "request completed with field errors");
    }

    Response {
      data: Some(data),
      errors,
    }
  }
}

fn execute_selection_set(
  state: Arc<ExecState>,
  type_name: String,
  parent: Value,
  selections: Vec<Selection>,
  path: Vec<PathSegment>,
) -> Completion<Map<String, Json>> {
  Box::pin(async move {
    let mut tasks = JoinSet::new();
    let mut slots = Vec::with_capacity(selections.len());

    for (index, selection) in selections.into_iter().enumerate() {
      let key = selection.response_key().to_string();
      let non_null = state
        .schema()
        .field(&type_name, &selection.name)
        .is_some_and(|f| f.ty.is_non_null());
      let mut field_path = path.clone();
      field_path.push(PathSegment::Field(key.clone()));

      let task = resolve_field(state.clone(), type_name.clone(), parent.clone(), selection, field_path.clone());
      let handle = tasks.spawn(async move { (index, task.await) }.in_current_span());
      slots.push((key, non_null, field_path, handle.id(), None));
    }

    while let Some(joined) = tasks.join_next_with_id().await {
      match joined {
        Ok((_, (index, result))) => slots[index].4 = Some(result),
        Err(e) => {
          let Some(slot) = slots.iter_mut().find(|slot| slot.3 == e.id()) else {
            continue;
          };
          warn!(path = ?slot.2, "resolver task failed: {}", e);
          let err = ResolveError::domain(INTERNAL_ERROR, e);
          state.record(&slot.2, &err);
          slot.4 = Some(if slot.1 { Err(Bubble) } else { Ok(Json::Null) });
        }
      }
    }

    let mut out = Map::new();
    for (key, _, _, _, result) in slots {
      out.insert(key, result.unwrap_or(Ok(Json::Null))?);
    }
    Ok(out)
  })
}

async fn resolve_field(
  state: Arc<ExecState>,
  type_name: String,
  parent: Value,
  selection: Selection,
  path: Vec<PathSegment>,
) -> Result<Json, Bubble> {
  if selection.name == TYPENAME_FIELD {
    return Ok(Json::String(type_name));
  }

  // Validation guarantees the field exists.
  let Some(field) = state.schema().field(&type_name, &selection.name).cloned() else {
    return Ok(Json::Null);
  };
  let Some(resolver) = state.registry.resolver(&type_name, &field.name).cloned() else {
    return Ok(Json::Null);
  };

  let args = match coerce_arguments(state.schema(), &field, &selection.arguments, &state.variables) {
    Ok(args) => args,
    Err(e) => {
      state.record(&path, &e);
      return null_for(&field.ty);
    }
  };

  debug!(type_name = %type_name, field = %field.name, "resolving");
  let ctx = state.ctx.clone();
  let result = match ctx.run(resolver.call(ctx.clone(), parent, args)).await {
    Ok(result) => result,
    Err(cancelled) => Err(cancelled.into()),
  };

  match result {
    Ok(value) => complete_value(state, field.ty, value, selection.selections, path).await,
    Err(e) => {
      state.record(&path, &e);
      null_for(&field.ty)
    }
  }
}

fn null_for(ty: &TypeRef) -> Result<Json, Bubble> {
  if ty.is_non_null() { Err(Bubble) } else { Ok(Json::Null) }
}

fn complete_value(
  state: Arc<ExecState>,
  ty: TypeRef,
  value: Value,
  selections: Vec<Selection>,
  path: Vec<PathSegment>,
) -> Completion<Json> {
  Box::pin(async move {
    match ty {
      TypeRef::NonNull(inner) => {
        if value.is_null() {
          let err = ResolveError::InvalidResult(format!("null returned for non-null type '{}!'", inner));
          state.record(&path, &err);
          return Err(Bubble);
        }
        match complete_value(state, *inner, value, selections, path).await {
          Ok(Json::Null) | Err(Bubble) => Err(Bubble),
          ok => ok,
        }
      }

      TypeRef::List(inner) => {
        let items = match value {
          Value::Null => return Ok(Json::Null),
          Value::List(items) => items,
          other => {
            let err = ResolveError::InvalidResult(format!("expected a list, found {}", other.kind()));
            state.record(&path, &err);
            return Ok(Json::Null);
          }
        };

        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.into_iter().enumerate() {
          let mut item_path = path.clone();
          item_path.push(PathSegment::Index(i));
          match complete_value(state.clone(), (*inner).clone(), item, selections.clone(), item_path).await {
            Ok(json) => out.push(json),
            Err(Bubble) => return Ok(Json::Null),
          }
        }
        Ok(Json::Array(out))
      }

      TypeRef::Named(name) => {
        if value.is_null() {
          return Ok(Json::Null);
        }

        match state.schema().kind_of(&name) {
          Some(TypeKind::Object) => {
            if let Value::Object(obj) = &value
              && obj.typename != name
            {
              let err = ResolveError::InvalidResult(format!("expected {} object, found {}", name, obj.typename));
              state.record(&path, &err);
              return Ok(Json::Null);
            }
            match execute_selection_set(state, name, value, selections, path).await {
              Ok(map) => Ok(Json::Object(map)),
              Err(Bubble) => Ok(Json::Null),
            }
          }
          _ => match serialize_leaf(state.schema(), &name, value) {
            Ok(json) => Ok(json),
            Err(e) => {
              state.record(&path, &ResolveError::InvalidResult(e));
              Ok(Json::Null)
            }
          },
        }
      }
    }
  })
}

fn serialize_leaf(schema: &Schema, type_name: &str, value: Value) -> Result<Json, String> {
  let mismatch = |value: &Value| format!("cannot return {} as {}", value.kind(), type_name);

  match (type_name, value) {
    ("Int", Value::Int(n)) => Ok(Json::from(n)),
    ("Float", Value::Int(n)) => Ok(Json::from(n as f64)),
    ("Float", Value::Float(f)) => serde_json::Number::from_f64(f)
      .map(Json::Number)
      .ok_or_else(|| format!("{} is not a finite Float", f)),
    ("String" | "ID", Value::String(s)) => Ok(Json::String(s)),
    ("ID", Value::Int(n)) => Ok(Json::String(n.to_string())),
    ("Boolean", Value::Boolean(b)) => Ok(Json::Bool(b)),
    ("Int" | "Float" | "String" | "ID" | "Boolean", value) => Err(mismatch(&value)),
    (_, value) => match schema.get(type_name).map(|def| (def.kind, def)) {
      Some((TypeKind::Enum, def)) => match value {
        Value::String(s) if def.enum_values.contains(&s) => Ok(Json::String(s)),
        Value::String(s) => Err(format!("'{}' is not a value of enum {}", s, type_name)),
        other => Err(mismatch(&other)),
      },
      // Custom scalars pass any leaf value through.
      _ => match value {
        Value::String(s) => Ok(Json::String(s)),
        Value::Int(n) => Ok(Json::from(n)),
        Value::Boolean(b) => Ok(Json::Bool(b)),
        Value::Float(f) => serde_json::Number::from_f64(f)
          .map(Json::Number)
          .ok_or_else(|| format!("{} is not finite", f)),
        other => Err(mismatch(&other)),
      },
    },
  }
}

fn coerce_arguments(
  schema: &Schema,
  field: &FieldDef,
  given: &[(String, InputValue)],
  variables: &Map<String, Json>,
) -> Result<Arguments, ResolveError> {
  if let Some((name, _)) = given.iter().find(|(name, _)| field.arg(name).is_none()) {
    return Err(ResolveError::InvalidArguments(format!(
      "unknown argument '{}' on field '{}'",
      name, field.name
    )));
  }

  let mut args = Arguments::new();
  for def in &field.args {
    let value = match given.iter().find(|(name, _)| *name == def.name).map(|(_, v)| v) {
      Some(InputValue::Variable(var)) if !variables.contains_key(var) => def.default.clone(),
      Some(value) => Some(value.to_json(variables)),
      None => def.default.clone(),
    };

    match value {
      Some(value) => {
        let value = coerce_input(schema, &def.ty, value)
          .map_err(|e| ResolveError::InvalidArguments(format!("argument '{}': {}", def.name, e)))?;
        args.insert(def.name.clone(), value);
      }
      None if def.ty.is_non_null() => {
        return Err(ResolveError::InvalidArguments(format!(
          "missing required argument '{}' of type '{}'",
          def.name, def.ty
        )));
      }
      None => {}
    }
  }

  Ok(args)
}

/// Check an input value against its declared type, filling input object
/// defaults and wrapping single values given for list types.
fn coerce_input(schema: &Schema, ty: &TypeRef, value: Json) -> Result<Json, String> {
  match ty {
    TypeRef::NonNull(inner) => {
      if value.is_null() {
        return Err(format!("expected non-null value of type '{}'", ty));
      }
      coerce_input(schema, inner, value)
    }
    TypeRef::List(inner) => match value {
      Json::Null => Ok(Json::Null),
      Json::Array(items) => items
        .into_iter()
        .map(|item| coerce_input(schema, inner, item))
        .collect::<Result<Vec<_>, _>>()
        .map(Json::Array),
      single => Ok(Json::Array(vec![coerce_input(schema, inner, single)?])),
    },
    TypeRef::Named(name) => {
      if value.is_null() {
        return Ok(Json::Null);
      }
      coerce_named(schema, name, value)
    }
  }
}

fn coerce_named(schema: &Schema, name: &str, value: Json) -> Result<Json, String> {
  let mismatch = |value: &Json| format!("expected {}, found {}", name, value);

  match name {
    "Int" => match value.as_i64() {
      Some(_) => Ok(value),
      None => Err(mismatch(&value)),
    },
    "Float" => match value.is_number() {
      true => Ok(value),
      false => Err(mismatch(&value)),
    },
    "String" => match value.is_string() {
      true => Ok(value),
      false => Err(mismatch(&value)),
    },
    "ID" => match value {
      Json::String(_) => Ok(value),
      Json::Number(ref n) if n.is_i64() => Ok(Json::String(n.to_string())),
      _ => Err(mismatch(&value)),
    },
    "Boolean" => match value.is_boolean() {
      true => Ok(value),
      false => Err(mismatch(&value)),
    },
    _ => {
      let Some(def) = schema.get(name) else {
        return Err(format!("unknown type '{}'", name));
      };
      match def.kind {
        TypeKind::Scalar => Ok(value),
        TypeKind::Enum => match value.as_str() {
          Some(s) if def.enum_values.iter().any(|v| v == s) => Ok(value),
          _ => Err(mismatch(&value)),
        },
        TypeKind::InputObject => {
          let mut fields = match value {
            Json::Object(fields) => fields,
            other => return Err(mismatch(&other)),
          };
          if let Some(unknown) = fields.keys().find(|k| !def.input_fields.iter().any(|f| &f.name == *k)) {
            return Err(format!("unknown field '{}' for input {}", unknown, name));
          }

          let mut out = Map::new();
          for field in &def.input_fields {
            match fields.remove(&field.name).or_else(|| field.default.clone()) {
              Some(v) => {
                let v = coerce_input(schema, &field.ty, v).map_err(|e| format!("{}.{}: {}", name, field.name, e))?;
                out.insert(field.name.clone(), v);
              }
              None if field.ty.is_non_null() => {
                return Err(format!("missing required field '{}' for input {}", field.name, name));
              }
              None => {}
            }
          }
          Ok(Json::Object(out))
        }
        TypeKind::Object => Err(format!("'{}' is an output type", name)),
      }
    }
  }
}

fn validate_selections(schema: &Schema, type_name: &str, selections: &[Selection], problems: &mut Vec<String>) {
  for selection in selections {
    if selection.name == TYPENAME_FIELD {
      if !selection.selections.is_empty() {
        problems.push(format!("field '{}' has no subfields", TYPENAME_FIELD));
      }
      continue;
    }

    let Some(field) = schema.field(type_name, &selection.name) else {
      problems.push(format!("cannot query field '{}' on type '{}'", selection.name, type_name));
      continue;
    };

    let base = field.ty.base_name();
    match schema.kind_of(base) {
      Some(TypeKind::Object) if selection.selections.is_empty() => problems.push(format!(
        "field '{}' of type '{}' must have a selection of subfields",
        selection.name, field.ty
      )),
      Some(TypeKind::Object) => validate_selections(schema, base, &selection.selections, problems),
      _ if !selection.selections.is_empty() => problems.push(format!(
        "field '{}' must not have a selection since type '{}' has no subfields",
        selection.name, field.ty
      )),
      _ => {}
    }
  }
}

fn collect_undeclared_variables(selections: &[Selection], declared: &[&str], problems: &mut Vec<String>) {
  fn visit(value: &InputValue, declared: &[&str], problems: &mut Vec<String>) {
    match value {
      InputValue::Variable(name) if !declared.contains(&name.as_str()) => {
        problems.push(format!("variable '${}' is not defined", name));
      }
      InputValue::List(items) => items.iter().for_each(|v| visit(v, declared, problems)),
      InputValue::Object(fields) => fields.values().for_each(|v| visit(v, declared, problems)),
      _ => {}
    }
  }

  for selection in selections {
    for (_, value) in &selection.arguments {
      visit(value, declared, problems);
    }
    collect_undeclared_variables(&selection.selections, declared, problems);
  }
}
