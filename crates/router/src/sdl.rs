//! Schema fragments modules contribute.
//!
//! Fragments are parsed with `graphql-parser`. Supported definitions:
//! `type`, `input`, `scalar`, `enum`, and the `extend` form of each.
//! Directives are accepted after fields and arguments; only
//! `@deprecated(reason: ...)` is retained.

use graphql_parser::Pos;
use graphql_parser::query::Value;
use graphql_parser::schema::{
  self as gql, Definition, Directive, EnumType, EnumValue, InputObjectType, ObjectType, ScalarType, TypeDefinition,
  TypeExtension,
};

use crate::ast::{ParseError, TypeRef, const_json, json_to_parser_value};

/// Reason recorded for `@deprecated` without one.
const DEFAULT_DEPRECATION: &str = "No longer supported";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
  Object,
  InputObject,
  Scalar,
  Enum,
}

impl TypeKind {
  pub fn keyword(&self) -> &'static str {
    match self {
      TypeKind::Object => "type",
      TypeKind::InputObject => "input",
      TypeKind::Scalar => "scalar",
      TypeKind::Enum => "enum",
    }
  }
}

/// An argument of a field, or a field of an input object.
#[derive(Debug, Clone, PartialEq)]
pub struct InputValueDef {
  pub name: String,
  pub description: Option<String>,
  pub ty: TypeRef,
  pub default: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
  pub name: String,
  pub description: Option<String>,
  pub args: Vec<InputValueDef>,
  pub ty: TypeRef,
  pub deprecated: Option<String>,
}

impl FieldDef {
  pub fn arg(&self, name: &str) -> Option<&InputValueDef> {
    self.args.iter().find(|a| a.name == name)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDef {
  pub name: String,
  pub kind: TypeKind,
  pub description: Option<String>,
  /// Output fields of an object type.
  pub fields: Vec<FieldDef>,
  /// Fields of an input object.
  pub input_fields: Vec<InputValueDef>,
  pub enum_values: Vec<String>,
  /// Whether this definition was written as `extend ...`.
  pub extension: bool,
}

impl TypeDef {
  fn new(name: &str, kind: TypeKind, description: Option<String>, extension: bool) -> Self {
    Self {
      name: name.to_string(),
      kind,
      description,
      fields: Vec::new(),
      input_fields: Vec::new(),
      enum_values: Vec::new(),
      extension,
    }
  }

  pub fn field(&self, name: &str) -> Option<&FieldDef> {
    self.fields.iter().find(|f| f.name == name)
  }
}

/// Parse a schema fragment into its type definitions, in source order.
pub fn parse_schema(source: &str) -> Result<Vec<TypeDef>, ParseError> {
  let document = gql::parse_schema::<&str>(source).map_err(ParseError::syntax)?;
  document.definitions.iter().map(lower_definition).collect()
}

fn lower_definition<'a>(def: &Definition<'a, &'a str>) -> Result<TypeDef, ParseError> {
  match def {
    Definition::TypeDefinition(ty) => lower_type_definition(ty),
    Definition::TypeExtension(ext) => lower_type_extension(ext),
    Definition::SchemaDefinition(schema) => Err(ParseError::unsupported("schema definition", schema.position)),
    Definition::DirectiveDefinition(directive) => {
      Err(ParseError::unsupported("directive definition", directive.position))
    }
  }
}

fn lower_type_definition<'a>(ty: &TypeDefinition<'a, &'a str>) -> Result<TypeDef, ParseError> {
  let def = match ty {
    TypeDefinition::Object(object) => TypeDef {
      fields: lower_fields(&object.fields)?,
      ..TypeDef::new(object.name, TypeKind::Object, object.description.clone(), false)
    },
    TypeDefinition::InputObject(input) => TypeDef {
      input_fields: lower_input_values(&input.fields)?,
      ..TypeDef::new(input.name, TypeKind::InputObject, input.description.clone(), false)
    },
    TypeDefinition::Scalar(scalar) => TypeDef::new(scalar.name, TypeKind::Scalar, scalar.description.clone(), false),
    TypeDefinition::Enum(e) => TypeDef {
      enum_values: e.values.iter().map(|v| v.name.to_string()).collect(),
      ..TypeDef::new(e.name, TypeKind::Enum, e.description.clone(), false)
    },
    TypeDefinition::Interface(interface) => return Err(ParseError::unsupported("interface", interface.position)),
    TypeDefinition::Union(union) => return Err(ParseError::unsupported("union", union.position)),
  };
  Ok(def)
}

fn lower_type_extension<'a>(ext: &TypeExtension<'a, &'a str>) -> Result<TypeDef, ParseError> {
  let def = match ext {
    TypeExtension::Object(object) => TypeDef {
      fields: lower_fields(&object.fields)?,
      ..TypeDef::new(object.name, TypeKind::Object, None, true)
    },
    TypeExtension::InputObject(input) => TypeDef {
      input_fields: lower_input_values(&input.fields)?,
      ..TypeDef::new(input.name, TypeKind::InputObject, None, true)
    },
    TypeExtension::Scalar(scalar) => TypeDef::new(scalar.name, TypeKind::Scalar, None, true),
    TypeExtension::Enum(e) => TypeDef {
      enum_values: e.values.iter().map(|v| v.name.to_string()).collect(),
      ..TypeDef::new(e.name, TypeKind::Enum, None, true)
    },
    TypeExtension::Interface(interface) => return Err(ParseError::unsupported("interface", interface.position)),
    TypeExtension::Union(union) => return Err(ParseError::unsupported("union", union.position)),
  };
  Ok(def)
}

fn lower_fields<'a>(fields: &[gql::Field<'a, &'a str>]) -> Result<Vec<FieldDef>, ParseError> {
  fields
    .iter()
    .map(|field| {
      Ok(FieldDef {
        name: field.name.to_string(),
        description: field.description.clone(),
        args: lower_input_values(&field.arguments)?,
        ty: TypeRef::from(&field.field_type),
        deprecated: deprecation(&field.directives),
      })
    })
    .collect()
}

fn lower_input_values<'a>(values: &[gql::InputValue<'a, &'a str>]) -> Result<Vec<InputValueDef>, ParseError> {
  values
    .iter()
    .map(|value| {
      Ok(InputValueDef {
        name: value.name.to_string(),
        description: value.description.clone(),
        ty: TypeRef::from(&value.value_type),
        default: value
          .default_value
          .as_ref()
          .map(|default| const_json(default, value.position))
          .transpose()?,
      })
    })
    .collect()
}

/// The deprecation reason, if `@deprecated` is among `directives`.
fn deprecation<'a>(directives: &[Directive<'a, &'a str>]) -> Option<String> {
  let directive = directives.iter().find(|d| d.name == "deprecated")?;
  let reason = directive.arguments.iter().find_map(|(name, value)| match value {
    Value::String(reason) if *name == "reason" => Some(reason.clone()),
    _ => None,
  });
  Some(reason.unwrap_or_else(|| DEFAULT_DEPRECATION.to_string()))
}

/// Render definitions back into schema-language text.
pub fn print_schema<'a>(defs: impl IntoIterator<Item = &'a TypeDef>) -> String {
  let document = gql::Document::<'static, String> {
    definitions: defs.into_iter().map(to_parser_definition).collect(),
  };
  document.to_string()
}

fn position() -> Pos {
  Pos { line: 1, column: 1 }
}

fn to_parser_definition(def: &TypeDef) -> Definition<'static, String> {
  let ty = match def.kind {
    TypeKind::Object => TypeDefinition::Object(ObjectType {
      position: position(),
      description: def.description.clone(),
      name: def.name.clone(),
      implements_interfaces: Vec::new(),
      directives: Vec::new(),
      fields: def.fields.iter().map(to_parser_field).collect(),
    }),
    TypeKind::InputObject => TypeDefinition::InputObject(InputObjectType {
      position: position(),
      description: def.description.clone(),
      name: def.name.clone(),
      directives: Vec::new(),
      fields: def.input_fields.iter().map(to_parser_input_value).collect(),
    }),
    TypeKind::Scalar => TypeDefinition::Scalar(ScalarType {
      position: position(),
      description: def.description.clone(),
      name: def.name.clone(),
      directives: Vec::new(),
    }),
    TypeKind::Enum => TypeDefinition::Enum(EnumType {
      position: position(),
      description: def.description.clone(),
      name: def.name.clone(),
      directives: Vec::new(),
      values: def
        .enum_values
        .iter()
        .map(|value| EnumValue {
          position: position(),
          description: None,
          name: value.clone(),
          directives: Vec::new(),
        })
        .collect(),
    }),
  };
  Definition::TypeDefinition(ty)
}

fn to_parser_field(field: &FieldDef) -> gql::Field<'static, String> {
  let directives = field
    .deprecated
    .iter()
    .map(|reason| Directive {
      position: position(),
      name: "deprecated".to_string(),
      arguments: vec![("reason".to_string(), Value::String(reason.clone()))],
    })
    .collect();

  gql::Field {
    position: position(),
    description: field.description.clone(),
    name: field.name.clone(),
    arguments: field.args.iter().map(to_parser_input_value).collect(),
    field_type: field.ty.to_parser_type(),
    directives,
  }
}

fn to_parser_input_value(value: &InputValueDef) -> gql::InputValue<'static, String> {
  gql::InputValue {
    position: position(),
    description: value.description.clone(),
    name: value.name.clone(),
    value_type: value.ty.to_parser_type(),
    default_value: value.default.as_ref().map(json_to_parser_value),
    directives: Vec::new(),
  }
}
