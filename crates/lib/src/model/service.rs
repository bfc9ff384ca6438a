use serde::{Deserialize, Serialize};

use super::ModelError;
use crate::id::{IdKind, Identified, encode_id};
use crate::services::ServiceSpec;

/// A long-running auxiliary process objects can bind to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
  pub spec: ServiceSpec,
}

impl Identified for Service {
  const KIND: IdKind = IdKind::Service;
}

impl Service {
  pub fn new(spec: ServiceSpec) -> Self {
    Self { spec }
  }

  pub fn id(&self) -> Result<String, ModelError> {
    Ok(encode_id(self)?)
  }

  pub fn hostname(&self) -> Result<String, ModelError> {
    self.spec.hostname().map_err(ModelError::Digest)
  }

  pub fn ports(&self) -> &[u16] {
    &self.spec.ports
  }

  /// `[scheme://]hostname:port`, defaulting to the first exposed port.
  pub fn endpoint(&self, port: Option<u16>, scheme: &str) -> Result<String, ModelError> {
    let hostname = self.hostname()?;
    let port = match port.or_else(|| self.spec.ports.first().copied()) {
      Some(port) => port,
      None => return Err(ModelError::NoExposedPorts { hostname }),
    };

    if scheme.is_empty() {
      Ok(format!("{}:{}", hostname, port))
    } else {
      Ok(format!("{}://{}:{}", scheme, hostname, port))
    }
  }
}
