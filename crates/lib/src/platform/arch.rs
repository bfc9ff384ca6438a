use std::fmt;

/// CPU architectures, named the way container platforms name them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
  Amd64,
  Arm64,
  Arm,
  I386,
  Riscv64,
  S390x,
  Ppc64le,
}

impl Arch {
  /// Detect the host architecture.
  pub fn current() -> Option<Self> {
    match std::env::consts::ARCH {
      "x86_64" => Some(Self::Amd64),
      "aarch64" => Some(Self::Arm64),
      "arm" => Some(Self::Arm),
      "x86" => Some(Self::I386),
      "riscv64" => Some(Self::Riscv64),
      "s390x" => Some(Self::S390x),
      "powerpc64" => Some(Self::Ppc64le),
      _ => None,
    }
  }

  /// Parse an architecture name, accepting the common aliases.
  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "amd64" | "x86_64" => Some(Self::Amd64),
      "arm64" | "aarch64" => Some(Self::Arm64),
      "arm" => Some(Self::Arm),
      "386" | "i386" => Some(Self::I386),
      "riscv64" => Some(Self::Riscv64),
      "s390x" => Some(Self::S390x),
      "ppc64le" => Some(Self::Ppc64le),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Amd64 => "amd64",
      Self::Arm64 => "arm64",
      Self::Arm => "arm",
      Self::I386 => "386",
      Self::Riscv64 => "riscv64",
      Self::S390x => "s390x",
      Self::Ppc64le => "ppc64le",
    }
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}
