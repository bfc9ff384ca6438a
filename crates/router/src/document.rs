//! Query documents.
//!
//! Documents are parsed with `graphql-parser` and lowered into owned
//! operations. Accepted: anonymous `{ ... }` shorthand and named `query`
//! operations with variable definitions, aliases, arguments and nested
//! selections. Fragments, directives and mutations are not part of the
//! protocol.

use graphql_parser::query::{
  self as gql, Definition, OperationDefinition, Selection as GqlSelection, SelectionSet, VariableDefinition,
};

use crate::ast::{InputValue, ParseError, TypeRef, const_json};

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDef {
  pub name: String,
  pub ty: TypeRef,
  pub default: Option<serde_json::Value>,
}

/// A single field selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
  pub alias: Option<String>,
  pub name: String,
  pub arguments: Vec<(String, InputValue)>,
  pub selections: Vec<Selection>,
}

impl Selection {
  /// The key this selection's result is stored under.
  pub fn response_key(&self) -> &str {
    self.alias.as_deref().unwrap_or(&self.name)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
  pub name: Option<String>,
  pub variables: Vec<VariableDef>,
  pub selections: Vec<Selection>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
  pub operations: Vec<Operation>,
}

impl Document {
  /// Pick the operation to run, by name when given.
  pub fn operation(&self, name: Option<&str>) -> Result<&Operation, ParseError> {
    match name {
      Some(name) => self
        .operations
        .iter()
        .find(|op| op.name.as_deref() == Some(name))
        .ok_or_else(|| ParseError::UnknownOperation(name.to_string())),
      None => match self.operations.as_slice() {
        [] => Err(ParseError::NoOperation),
        [op] => Ok(op),
        _ => Err(ParseError::AmbiguousOperation),
      },
    }
  }
}

/// Parse a query document.
pub fn parse_query(source: &str) -> Result<Document, ParseError> {
  let document = gql::parse_query::<&str>(source).map_err(ParseError::syntax)?;
  let operations = document
    .definitions
    .iter()
    .map(lower_definition)
    .collect::<Result<Vec<_>, _>>()?;

  if operations.is_empty() {
    return Err(ParseError::NoOperation);
  }

  Ok(Document { operations })
}

fn lower_definition<'a>(def: &Definition<'a, &'a str>) -> Result<Operation, ParseError> {
  let operation = match def {
    Definition::Operation(operation) => operation,
    Definition::Fragment(fragment) => return Err(ParseError::unsupported("fragment", fragment.position)),
  };

  match operation {
    OperationDefinition::SelectionSet(set) => Ok(Operation {
      name: None,
      variables: Vec::new(),
      selections: lower_selection_set(set)?,
    }),
    OperationDefinition::Query(query) => {
      if let Some(directive) = query.directives.first() {
        return Err(ParseError::unsupported("directive", directive.position));
      }
      Ok(Operation {
        name: query.name.map(str::to_string),
        variables: query
          .variable_definitions
          .iter()
          .map(lower_variable)
          .collect::<Result<_, _>>()?,
        selections: lower_selection_set(&query.selection_set)?,
      })
    }
    OperationDefinition::Mutation(mutation) => Err(ParseError::unsupported("mutation", mutation.position)),
    OperationDefinition::Subscription(subscription) => {
      Err(ParseError::unsupported("subscription", subscription.position))
    }
  }
}

fn lower_variable<'a>(def: &VariableDefinition<'a, &'a str>) -> Result<VariableDef, ParseError> {
  Ok(VariableDef {
    name: def.name.to_string(),
    ty: TypeRef::from(&def.var_type),
    default: def
      .default_value
      .as_ref()
      .map(|value| const_json(value, def.position))
      .transpose()?,
  })
}

fn lower_selection_set<'a>(set: &SelectionSet<'a, &'a str>) -> Result<Vec<Selection>, ParseError> {
  if set.items.is_empty() {
    let (start, _) = set.span;
    return Err(ParseError::EmptySelection {
      line: start.line,
      column: start.column,
    });
  }
  set.items.iter().map(lower_selection).collect()
}

fn lower_selection<'a>(selection: &GqlSelection<'a, &'a str>) -> Result<Selection, ParseError> {
  let field = match selection {
    GqlSelection::Field(field) => field,
    GqlSelection::FragmentSpread(spread) => return Err(ParseError::unsupported("fragment spread", spread.position)),
    GqlSelection::InlineFragment(inline) => return Err(ParseError::unsupported("inline fragment", inline.position)),
  };
  if let Some(directive) = field.directives.first() {
    return Err(ParseError::unsupported("directive", directive.position));
  }

  let selections = if field.selection_set.items.is_empty() {
    Vec::new()
  } else {
    lower_selection_set(&field.selection_set)?
  };

  Ok(Selection {
    alias: field.alias.map(str::to_string),
    name: field.name.to_string(),
    arguments: field
      .arguments
      .iter()
      .map(|(name, value)| (name.to_string(), InputValue::from(value)))
      .collect(),
    selections,
  })
}
