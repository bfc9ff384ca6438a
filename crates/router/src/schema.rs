//! The merged schema: every type and field contributed by all modules.

use std::collections::BTreeMap;

use crate::sdl::{FieldDef, TypeDef, TypeKind, print_schema};

/// Name of the root type every request starts from.
pub const QUERY_TYPE: &str = "Query";

/// Scalars every schema has without declaring them.
pub const BUILTIN_SCALARS: &[&str] = &["String", "Int", "Float", "Boolean", "ID"];

#[derive(Debug, Clone, Default)]
pub struct Schema {
  types: BTreeMap<String, TypeDef>,
}

impl Schema {
  pub(crate) fn new(types: BTreeMap<String, TypeDef>) -> Self {
    Self { types }
  }

  pub fn get(&self, name: &str) -> Option<&TypeDef> {
    self.types.get(name)
  }

  pub fn field(&self, type_name: &str, field: &str) -> Option<&FieldDef> {
    self.types.get(type_name).and_then(|t| t.field(field))
  }

  /// Kind of a named type, treating built-in scalars as declared.
  pub fn kind_of(&self, name: &str) -> Option<TypeKind> {
    if BUILTIN_SCALARS.contains(&name) {
      return Some(TypeKind::Scalar);
    }
    self.types.get(name).map(|t| t.kind)
  }

  pub fn types(&self) -> impl Iterator<Item = &TypeDef> {
    self.types.values()
  }

  /// The merged schema in schema-language form, types sorted by name.
  pub fn to_sdl(&self) -> String {
    print_schema(self.types.values())
  }
}
