//! Service descriptions and the bindings objects carry to them.
//!
//! A binding is keyed by the content digest of the service description, so
//! two objects that bind the "same" service share one running instance.

pub mod manager;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::consts::SERVICE_HOSTNAME_DIGEST_LEN;
use crate::graph::Definition;
use crate::model::container::ImageConfig;
use crate::platform::Platform;
use crate::util::hash::{HashError, Hashable};

pub use manager::{ServiceError, ServiceLeases, ServiceManager};

/// What to run for a service: a root filesystem, its image configuration,
/// and the ports it exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
  pub rootfs: Option<Definition>,
  pub config: ImageConfig,
  pub platform: Platform,
  pub ports: Vec<u16>,
}

impl Hashable for ServiceSpec {}

impl ServiceSpec {
  /// Stable binding key: the hex digest of the description.
  pub fn key(&self) -> Result<String, HashError> {
    Ok(self.digest()?.hex().to_string())
  }

  /// Hostname the service is reachable under while bound.
  pub fn hostname(&self) -> Result<String, HashError> {
    let key = self.key()?;
    Ok(format!("svc-{}", &key[..SERVICE_HOSTNAME_DIGEST_LEN.min(key.len())]))
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceBinding {
  pub service: ServiceSpec,
  /// Extra hostnames the service is reachable under.
  pub aliases: BTreeSet<String>,
}

/// Service bindings by key. Combining two objects unions their bindings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceBindings(BTreeMap<String, ServiceBinding>);

impl ServiceBindings {
  pub fn new() -> Self {
    Self::default()
  }

  /// A copy with `service` bound under `alias`.
  pub fn bind(&self, alias: &str, service: ServiceSpec) -> Result<Self, HashError> {
    let key = service.key()?;
    let mut out = self.clone();
    out
      .0
      .entry(key)
      .or_insert_with(|| ServiceBinding {
        service,
        aliases: BTreeSet::new(),
      })
      .aliases
      .insert(alias.to_string());
    Ok(out)
  }

  /// A copy holding the bindings of both sets; aliases of shared keys merge.
  pub fn union(&self, other: &ServiceBindings) -> Self {
    let mut out = self.clone();
    for (key, binding) in &other.0 {
      match out.0.get_mut(key) {
        Some(existing) => existing.aliases.extend(binding.aliases.iter().cloned()),
        None => {
          out.0.insert(key.clone(), binding.clone());
        }
      }
    }
    out
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &ServiceBinding)> {
    self.0.iter()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}
