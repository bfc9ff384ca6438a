//! Engine configuration.
//!
//! Defaults come from the host. `GRAFT_PLATFORM` overrides the default
//! target platform and `GRAFT_WORKDIR` the directory relative export
//! destinations are resolved against.

use std::path::PathBuf;

use thiserror::Error;

use crate::consts::{PLATFORM_ENV, WORKDIR_ENV};
use crate::platform::{Platform, PlatformParseError};

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("invalid {var}: {source}")]
  Platform {
    var: &'static str,
    #[source]
    source: PlatformParseError,
  },

  #[error("{var} must be an absolute path, got {value}")]
  RelativeWorkdir { var: &'static str, value: String },

  #[error("cannot determine the working directory: {0}")]
  CurrentDir(#[source] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
  /// Platform objects target unless a caller picks another.
  pub platform: Platform,
  /// Base for relative export destinations.
  pub workdir: PathBuf,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      platform: Platform::host_default(),
      workdir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")),
    }
  }
}

impl EngineConfig {
  /// Build a configuration from the host defaults and the environment.
  pub fn from_env() -> Result<Self, ConfigError> {
    let platform = match std::env::var(PLATFORM_ENV) {
      Ok(value) if !value.is_empty() => value.parse().map_err(|source| ConfigError::Platform {
        var: PLATFORM_ENV,
        source,
      })?,
      _ => Platform::host_default(),
    };

    let workdir = match std::env::var(WORKDIR_ENV) {
      Ok(value) if !value.is_empty() => {
        let path = PathBuf::from(&value);
        if !path.is_absolute() {
          return Err(ConfigError::RelativeWorkdir { var: WORKDIR_ENV, value });
        }
        path
      }
      _ => std::env::current_dir().map_err(ConfigError::CurrentDir)?,
    };

    Ok(Self { platform, workdir })
  }

  pub fn with_platform(mut self, platform: Platform) -> Self {
    self.platform = platform;
    self
  }

  pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
    self.workdir = workdir.into();
    self
  }
}
