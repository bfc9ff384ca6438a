//! Pipeline lineage: the ordered record of named steps that produced an
//! object.
//!
//! Lineage only grows. [`PipelinePath::add`] returns a new path with one more
//! entry; nothing else changes it, and every derived object copies its
//! parent's path unchanged.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PipelineLabel {
  pub name: String,
  pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pipeline {
  pub name: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub description: String,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub labels: Vec<PipelineLabel>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelinePath(Vec<Pipeline>);

impl PipelinePath {
  pub fn new() -> Self {
    Self::default()
  }

  /// A copy of this path with one entry appended.
  pub fn add(&self, pipeline: Pipeline) -> Self {
    let mut entries = self.0.clone();
    entries.push(pipeline);
    Self(entries)
  }

  pub fn entries(&self) -> &[Pipeline] {
    &self.0
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// Entry names joined with ` / `, for log fields.
  pub fn display_name(&self) -> String {
    self.0.iter().map(|p| p.name.as_str()).collect::<Vec<_>>().join(" / ")
  }
}
