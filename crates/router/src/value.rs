//! Values flowing between resolvers.
//!
//! Object-typed values never carry live instances: they are an object type
//! name plus the object's opaque ID. A resolver receives its parent in this
//! form and decodes it; results are re-encoded before they leave it.

use crate::error::ResolveError;

/// Reference to an object value: its schema type and opaque ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
  pub typename: String,
  pub id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
  Null,
  Boolean(bool),
  Int(i64),
  Float(f64),
  String(String),
  List(Vec<Value>),
  Object(ObjectRef),
}

impl Value {
  pub fn object(typename: &str, id: impl Into<String>) -> Self {
    Value::Object(ObjectRef {
      typename: typename.to_string(),
      id: id.into(),
    })
  }

  pub fn is_null(&self) -> bool {
    matches!(self, Value::Null)
  }

  /// Short description of the value's shape, used in error messages.
  pub fn kind(&self) -> &'static str {
    match self {
      Value::Null => "null",
      Value::Boolean(_) => "Boolean",
      Value::Int(_) => "Int",
      Value::Float(_) => "Float",
      Value::String(_) => "String",
      Value::List(_) => "list",
      Value::Object(_) => "object",
    }
  }
}

/// Conversion of a resolver's return type into a [`Value`].
pub trait IntoValue {
  fn into_value(self) -> Result<Value, ResolveError>;
}

/// Conversion of a resolver's parent [`Value`] into the type it works on.
pub trait FromValue: Sized {
  fn from_value(value: Value) -> Result<Self, ResolveError>;
}

impl IntoValue for Value {
  fn into_value(self) -> Result<Value, ResolveError> {
    Ok(self)
  }
}

impl FromValue for Value {
  fn from_value(value: Value) -> Result<Self, ResolveError> {
    Ok(value)
  }
}

impl IntoValue for () {
  fn into_value(self) -> Result<Value, ResolveError> {
    Ok(Value::Null)
  }
}

impl IntoValue for bool {
  fn into_value(self) -> Result<Value, ResolveError> {
    Ok(Value::Boolean(self))
  }
}

impl IntoValue for i64 {
  fn into_value(self) -> Result<Value, ResolveError> {
    Ok(Value::Int(self))
  }
}

impl IntoValue for u32 {
  fn into_value(self) -> Result<Value, ResolveError> {
    Ok(Value::Int(i64::from(self)))
  }
}

impl IntoValue for u64 {
  fn into_value(self) -> Result<Value, ResolveError> {
    i64::try_from(self)
      .map(Value::Int)
      .map_err(|_| ResolveError::InvalidResult(format!("integer {} does not fit in Int", self)))
  }
}

impl IntoValue for f64 {
  fn into_value(self) -> Result<Value, ResolveError> {
    Ok(Value::Float(self))
  }
}

impl IntoValue for String {
  fn into_value(self) -> Result<Value, ResolveError> {
    Ok(Value::String(self))
  }
}

impl IntoValue for &str {
  fn into_value(self) -> Result<Value, ResolveError> {
    Ok(Value::String(self.to_string()))
  }
}

impl<T: IntoValue> IntoValue for Option<T> {
  fn into_value(self) -> Result<Value, ResolveError> {
    match self {
      Some(v) => v.into_value(),
      None => Ok(Value::Null),
    }
  }
}

impl<T: IntoValue> IntoValue for Vec<T> {
  fn into_value(self) -> Result<Value, ResolveError> {
    self
      .into_iter()
      .map(IntoValue::into_value)
      .collect::<Result<Vec<_>, _>>()
      .map(Value::List)
  }
}
