//! Syntax shared by schema fragments and query documents: type references,
//! input values, and the errors raised while reading either.
//!
//! Documents are parsed with `graphql-parser` and lowered into these owned
//! forms, so the rest of the router never sees the parser's tree.

use std::collections::BTreeMap;
use std::fmt;

use graphql_parser::Pos;
use graphql_parser::query::{Type, Value};
use thiserror::Error;

/// Errors raised while parsing or lowering a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
  #[error("{0}")]
  Syntax(String),

  #[error("unsupported {what} at {line}:{column}")]
  Unsupported {
    what: &'static str,
    line: usize,
    column: usize,
  },

  #[error("variable '${name}' is not allowed in a constant value at {line}:{column}")]
  VariableInConst { name: String, line: usize, column: usize },

  #[error("empty selection set at {line}:{column}")]
  EmptySelection { line: usize, column: usize },

  #[error("document contains no operations")]
  NoOperation,

  #[error("unknown operation '{0}'")]
  UnknownOperation(String),

  #[error("document contains several operations; an operation name is required")]
  AmbiguousOperation,
}

impl ParseError {
  pub(crate) fn syntax(err: impl fmt::Display) -> Self {
    ParseError::Syntax(err.to_string())
  }

  pub(crate) fn unsupported(what: &'static str, pos: Pos) -> Self {
    ParseError::Unsupported {
      what,
      line: pos.line,
      column: pos.column,
    }
  }
}

/// A reference to a type as written in a field or argument declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
  Named(String),
  List(Box<TypeRef>),
  NonNull(Box<TypeRef>),
}

impl TypeRef {
  pub fn named(name: &str) -> Self {
    TypeRef::Named(name.to_string())
  }

  pub fn non_null(inner: TypeRef) -> Self {
    TypeRef::NonNull(Box::new(inner))
  }

  pub fn list(inner: TypeRef) -> Self {
    TypeRef::List(Box::new(inner))
  }

  /// The innermost named type, with list and non-null wrappers removed.
  pub fn base_name(&self) -> &str {
    match self {
      TypeRef::Named(name) => name,
      TypeRef::List(inner) | TypeRef::NonNull(inner) => inner.base_name(),
    }
  }

  pub fn is_non_null(&self) -> bool {
    matches!(self, TypeRef::NonNull(_))
  }

  /// The type with an outer non-null wrapper removed, if any.
  pub fn nullable(&self) -> &TypeRef {
    match self {
      TypeRef::NonNull(inner) => inner,
      other => other,
    }
  }

  /// The parser's form of this type, for printing.
  pub(crate) fn to_parser_type(&self) -> Type<'static, String> {
    match self {
      TypeRef::Named(name) => Type::NamedType(name.clone()),
      TypeRef::List(inner) => Type::ListType(Box::new(inner.to_parser_type())),
      TypeRef::NonNull(inner) => Type::NonNullType(Box::new(inner.to_parser_type())),
    }
  }
}

impl<'a> From<&Type<'a, &'a str>> for TypeRef {
  fn from(ty: &Type<'a, &'a str>) -> Self {
    match ty {
      Type::NamedType(name) => TypeRef::named(name),
      Type::ListType(inner) => TypeRef::list(TypeRef::from(inner.as_ref())),
      Type::NonNullType(inner) => TypeRef::non_null(TypeRef::from(inner.as_ref())),
    }
  }
}

impl fmt::Display for TypeRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TypeRef::Named(name) => write!(f, "{}", name),
      TypeRef::List(inner) => write!(f, "[{}]", inner),
      TypeRef::NonNull(inner) => write!(f, "{}!", inner),
    }
  }
}

/// A literal or variable as written in a document.
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
  Null,
  Int(i64),
  Float(f64),
  String(String),
  Boolean(bool),
  Enum(String),
  List(Vec<InputValue>),
  Object(BTreeMap<String, InputValue>),
  Variable(String),
}

impl<'a> From<&Value<'a, &'a str>> for InputValue {
  fn from(value: &Value<'a, &'a str>) -> Self {
    match value {
      Value::Null => InputValue::Null,
      Value::Int(n) => n.as_i64().map_or(InputValue::Null, InputValue::Int),
      Value::Float(n) => InputValue::Float(*n),
      Value::String(s) => InputValue::String(s.clone()),
      Value::Boolean(b) => InputValue::Boolean(*b),
      Value::Enum(name) => InputValue::Enum(name.to_string()),
      Value::List(items) => InputValue::List(items.iter().map(InputValue::from).collect()),
      Value::Object(fields) => InputValue::Object(
        fields
          .iter()
          .map(|(k, v)| (k.to_string(), InputValue::from(v)))
          .collect(),
      ),
      Value::Variable(name) => InputValue::Variable(name.to_string()),
    }
  }
}

impl InputValue {
  /// Convert to JSON, substituting variables from `variables`.
  ///
  /// Unknown variables become `null`; the executor validates declared
  /// variables before any value is converted.
  pub fn to_json(&self, variables: &serde_json::Map<String, serde_json::Value>) -> serde_json::Value {
    use serde_json::Value as Json;

    match self {
      InputValue::Null => Json::Null,
      InputValue::Int(n) => Json::from(*n),
      InputValue::Float(n) => serde_json::Number::from_f64(*n).map(Json::Number).unwrap_or(Json::Null),
      InputValue::String(s) | InputValue::Enum(s) => Json::String(s.clone()),
      InputValue::Boolean(b) => Json::Bool(*b),
      InputValue::List(items) => Json::Array(items.iter().map(|v| v.to_json(variables)).collect()),
      InputValue::Object(fields) => Json::Object(
        fields
          .iter()
          .map(|(k, v)| (k.clone(), v.to_json(variables)))
          .collect(),
      ),
      InputValue::Variable(name) => variables.get(name).cloned().unwrap_or(Json::Null),
    }
  }

  /// The first variable referenced anywhere in this value.
  pub fn first_variable(&self) -> Option<&str> {
    match self {
      InputValue::Variable(name) => Some(name),
      InputValue::List(items) => items.iter().find_map(InputValue::first_variable),
      InputValue::Object(fields) => fields.values().find_map(InputValue::first_variable),
      _ => None,
    }
  }
}

/// Lower a default value, which must not reference variables.
pub(crate) fn const_json<'a>(value: &Value<'a, &'a str>, pos: Pos) -> Result<serde_json::Value, ParseError> {
  let value = InputValue::from(value);
  if let Some(name) = value.first_variable() {
    return Err(ParseError::VariableInConst {
      name: name.to_string(),
      line: pos.line,
      column: pos.column,
    });
  }
  Ok(value.to_json(&serde_json::Map::new()))
}

/// The parser's form of a JSON constant, for printing defaults.
pub(crate) fn json_to_parser_value(value: &serde_json::Value) -> Value<'static, String> {
  use serde_json::Value as Json;

  match value {
    Json::Null => Value::Null,
    Json::Bool(b) => Value::Boolean(*b),
    Json::Number(n) => match n.as_i64().and_then(|n| i32::try_from(n).ok()) {
      Some(n) => Value::Int(n.into()),
      None => Value::Float(n.as_f64().unwrap_or_default()),
    },
    Json::String(s) => Value::String(s.clone()),
    Json::Array(items) => Value::List(items.iter().map(json_to_parser_value).collect()),
    Json::Object(fields) => Value::Object(
      fields
        .iter()
        .map(|(k, v)| (k.clone(), json_to_parser_value(v)))
        .collect(),
    ),
  }
}
