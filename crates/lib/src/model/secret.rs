use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use graft_router::Context;
use serde::{Deserialize, Serialize};

use super::ModelError;
use super::file::File;
use crate::id::{IdKind, Identified, encode_id};
use crate::runtime::Runtime;

/// A secret. IDs name where the plaintext lives, never the plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Secret {
  /// Registered with the engine's secret store.
  Named { name: String },
  /// The contents of a file.
  File { file: File },
}

impl Identified for Secret {
  const KIND: IdKind = IdKind::Secret;
}

impl Secret {
  pub fn id(&self) -> Result<String, ModelError> {
    Ok(encode_id(self)?)
  }

  pub async fn plaintext(&self, rt: &Runtime, ctx: &Context) -> Result<Vec<u8>, ModelError> {
    match self {
      Secret::Named { name } => rt.secrets().get(name),
      Secret::File { file } => file.contents(rt, ctx).await,
    }
  }
}

/// Plaintexts of named secrets, kept in memory for the engine's lifetime.
#[derive(Default)]
pub struct SecretStore {
  secrets: RwLock<HashMap<String, Vec<u8>>>,
}

impl std::fmt::Debug for SecretStore {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let secrets = self.secrets.read().unwrap_or_else(PoisonError::into_inner);
    f.debug_struct("SecretStore").field("count", &secrets.len()).finish()
  }
}

impl SecretStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register `plaintext` under `name`, replacing any earlier value.
  pub fn set(&self, name: &str, plaintext: Vec<u8>) -> Secret {
    self
      .secrets
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(name.to_string(), plaintext);
    Secret::Named { name: name.to_string() }
  }

  pub fn get(&self, name: &str) -> Result<Vec<u8>, ModelError> {
    self
      .secrets
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .get(name)
      .cloned()
      .ok_or_else(|| ModelError::UnknownSecret(name.to_string()))
  }
}
