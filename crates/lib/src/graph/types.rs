//! The build-graph IR.
//!
//! A [`Definition`] is a tree of [`Node`]s describing how to produce a
//! filesystem. Nodes are plain data: building one never touches a backend,
//! and equal definitions have equal digests.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::platform::Platform;
use crate::util::hash::Hashable;

/// A complete graph fragment and the platform it targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
  pub platform: Platform,
  pub root: Node,
}

impl Hashable for Definition {}

impl Definition {
  /// The empty filesystem.
  pub fn scratch(platform: Platform) -> Self {
    Self {
      platform,
      root: Node::Scratch,
    }
  }

  pub fn is_scratch(&self) -> bool {
    matches!(self.root, Node::Scratch)
  }

  /// A new definition applying `action` on top of this one.
  pub fn with_action(&self, action: FileAction) -> Self {
    Self {
      platform: self.platform.clone(),
      root: Node::File {
        base: Box::new(self.root.clone()),
        action,
      },
    }
  }

  /// Apply several actions in order.
  pub fn with_actions(&self, actions: impl IntoIterator<Item = FileAction>) -> Self {
    actions.into_iter().fold(self.clone(), |def, action| def.with_action(action))
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Node {
  /// Nothing at all.
  Scratch,
  /// `base` with one file operation applied.
  File { base: Box<Node>, action: FileAction },
  /// What `upper` adds or changes relative to `lower`.
  Diff { lower: Box<Node>, upper: Box<Node> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileAction {
  Mkdir {
    path: String,
    mode: u32,
    make_parents: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<i64>,
  },
  Mkfile {
    path: String,
    mode: u32,
    #[serde(serialize_with = "serialize_bytes", deserialize_with = "deserialize_bytes")]
    data: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<i64>,
  },
  Rm {
    path: String,
    allow_not_found: bool,
  },
  Copy {
    source: Box<Node>,
    src: String,
    dest: String,
    info: CopyInfo,
  },
}

/// Options for [`FileAction::Copy`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyInfo {
  /// Create missing parents of `dest`.
  pub create_dest_path: bool,
  /// When `src` is a directory, copy its entries into `dest` instead of
  /// the directory itself.
  pub copy_dir_contents: bool,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub include: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub exclude: Vec<String>,
  /// Permissions forced on copied files.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub mode: Option<u32>,
  /// Modification time forced on everything copied.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub timestamp: Option<i64>,
}

fn serialize_bytes<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
  serializer.serialize_str(&STANDARD.encode(data))
}

fn deserialize_bytes<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
  let encoded = String::deserialize(deserializer)?;
  STANDARD.decode(encoded).map_err(serde::de::Error::custom)
}
