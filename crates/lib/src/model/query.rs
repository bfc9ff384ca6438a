use serde::{Deserialize, Serialize};

use super::ModelError;
use crate::id::{IdKind, Identified, encode_id};
use crate::pipeline::{Pipeline, PipelinePath};

/// The root object. Objects created from it inherit its lineage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
  pub pipeline: PipelinePath,
}

impl Identified for Query {
  const KIND: IdKind = IdKind::Query;
}

impl Query {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn id(&self) -> Result<String, ModelError> {
    Ok(encode_id(self)?)
  }

  pub fn with_pipeline(&self, pipeline: Pipeline) -> Self {
    Self {
      pipeline: self.pipeline.add(pipeline),
    }
  }
}
