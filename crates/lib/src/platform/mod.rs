//! Target platforms, written `os/arch[/variant]` (e.g. `linux/arm64/v8`).

pub mod arch;
pub mod os;

use std::fmt;
use std::str::FromStr;

pub use arch::Arch;
pub use os::Os;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformParseError {
  #[error("invalid platform '{0}': expected os/arch[/variant]")]
  Format(String),

  #[error("unknown operating system '{0}'")]
  UnknownOs(String),

  #[error("unknown architecture '{0}'")]
  UnknownArch(String),
}

/// The platform a build graph targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Platform {
  pub os: Os,
  pub arch: Arch,
  pub variant: Option<String>,
}

impl Platform {
  pub fn new(os: Os, arch: Arch) -> Self {
    Self { os, arch, variant: None }
  }

  /// Platform builds target when nothing else is configured: Linux on the
  /// host architecture, falling back to `linux/amd64`.
  pub fn host_default() -> Self {
    Self::new(Os::Linux, Arch::current().unwrap_or(Arch::Amd64))
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.os, self.arch)?;
    if let Some(variant) = &self.variant {
      write!(f, "/{}", variant)?;
    }
    Ok(())
  }
}

impl FromStr for Platform {
  type Err = PlatformParseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let parts: Vec<&str> = s.split('/').collect();
    let (os, arch, variant) = match parts.as_slice() {
      [os, arch] => (*os, *arch, None),
      [os, arch, variant] if !variant.is_empty() => (*os, *arch, Some(variant.to_string())),
      _ => return Err(PlatformParseError::Format(s.to_string())),
    };

    Ok(Self {
      os: Os::parse(os).ok_or_else(|| PlatformParseError::UnknownOs(os.to_string()))?,
      arch: Arch::parse(arch).ok_or_else(|| PlatformParseError::UnknownArch(arch.to_string()))?,
      variant,
    })
  }
}

impl TryFrom<String> for Platform {
  type Error = PlatformParseError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<Platform> for String {
  fn from(value: Platform) -> Self {
    value.to_string()
  }
}
