use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::directory::Directory;
use super::service::Service;
use super::ModelError;
use crate::graph::Definition;
use crate::id::{IdKind, Identified, encode_id};
use crate::pipeline::{Pipeline, PipelinePath};
use crate::platform::Platform;
use crate::services::{ServiceBindings, ServiceSpec};

/// Image configuration carried by a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageConfig {
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub entrypoint: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub cmd: Vec<String>,
  /// `NAME=value` pairs, in definition order.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub env: Vec<String>,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub working_dir: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub user: String,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub labels: BTreeMap<String, String>,
}

impl ImageConfig {
  pub fn env_variable(&self, name: &str) -> Option<&str> {
    self.env.iter().rev().find_map(|pair| match pair.split_once('=') {
      Some((key, value)) if key == name => Some(value),
      _ => None,
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
  pub rootfs: Option<Definition>,
  pub config: ImageConfig,
  pub pipeline: PipelinePath,
  pub platform: Platform,
  #[serde(default, skip_serializing_if = "ServiceBindings::is_empty")]
  pub services: ServiceBindings,
}

impl Identified for Container {
  const KIND: IdKind = IdKind::Container;
}

fn non_empty(value: &str) -> Option<&str> {
  (!value.is_empty()).then_some(value)
}

impl Container {
  /// An empty container: no root filesystem, default configuration.
  pub fn new(platform: Platform, pipeline: PipelinePath) -> Self {
    Self {
      rootfs: None,
      config: ImageConfig::default(),
      pipeline,
      platform,
      services: ServiceBindings::new(),
    }
  }

  pub fn id(&self) -> Result<String, ModelError> {
    Ok(encode_id(self)?)
  }

  pub fn with_pipeline(&self, pipeline: Pipeline) -> Self {
    Self {
      pipeline: self.pipeline.add(pipeline),
      ..self.clone()
    }
  }

  /// The root filesystem as a directory; empty when the container has none.
  pub fn rootfs(&self) -> Directory {
    let def = self.rootfs.clone().unwrap_or_else(|| Definition::scratch(self.platform.clone()));
    Directory::new(def, "/", self.pipeline.clone(), self.services.clone())
  }

  /// A copy using `dir` as its root filesystem, adopting its bindings.
  pub fn with_rootfs(&self, dir: &Directory) -> Self {
    Self {
      rootfs: Some(dir.rooted()),
      services: self.services.union(&dir.services),
      ..self.clone()
    }
  }

  pub fn entrypoint(&self) -> &[String] {
    &self.config.entrypoint
  }

  pub fn default_args(&self) -> &[String] {
    &self.config.cmd
  }

  pub fn workdir(&self) -> Option<&str> {
    non_empty(&self.config.working_dir)
  }

  pub fn user(&self) -> Option<&str> {
    non_empty(&self.config.user)
  }

  pub fn env_variable(&self, name: &str) -> Option<&str> {
    self.config.env_variable(name)
  }

  pub fn label(&self, name: &str) -> Option<&str> {
    self.config.labels.get(name).map(String::as_str)
  }

  fn with_config(&self, update: impl FnOnce(&mut ImageConfig)) -> Self {
    let mut config = self.config.clone();
    update(&mut config);
    Self {
      config,
      ..self.clone()
    }
  }

  pub fn with_entrypoint(&self, args: Vec<String>) -> Self {
    self.with_config(|c| c.entrypoint = args)
  }

  pub fn with_default_args(&self, args: Vec<String>) -> Self {
    self.with_config(|c| c.cmd = args)
  }

  /// Set `name`, replacing any earlier definition of it.
  pub fn with_env_variable(&self, name: &str, value: &str) -> Self {
    self.with_config(|c| {
      c.env.retain(|pair| pair.split_once('=').is_none_or(|(key, _)| key != name));
      c.env.push(format!("{}={}", name, value));
    })
  }

  pub fn with_workdir(&self, path: &str) -> Self {
    self.with_config(|c| c.working_dir = path.to_string())
  }

  pub fn with_user(&self, name: &str) -> Self {
    self.with_config(|c| c.user = name.to_string())
  }

  pub fn with_label(&self, name: &str, value: &str) -> Self {
    self.with_config(|c| {
      c.labels.insert(name.to_string(), value.to_string());
    })
  }

  /// Describe a service running this container with `ports` exposed.
  pub fn as_service(&self, ports: Vec<u16>) -> Service {
    Service::new(ServiceSpec {
      rootfs: self.rootfs.clone(),
      config: self.config.clone(),
      platform: self.platform.clone(),
      ports,
    })
  }

  pub fn with_service_binding(&self, alias: &str, service: &Service) -> Result<Self, ModelError> {
    Ok(Self {
      services: self.services.bind(alias, service.spec.clone()).map_err(ModelError::Digest)?,
      ..self.clone()
    })
  }
}
