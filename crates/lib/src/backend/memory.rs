//! An in-memory backend.
//!
//! Interprets build-graph definitions over an in-memory tree. Solved
//! references are cached by definition digest. Services are recorded rather
//! than run, and container image builds are unsupported.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, info};

use super::{Backend, BackendError, BuildResult, DockerBuildRequest, FileKind, FileStat, Reference, RunningService};
use crate::consts::DEFAULT_DIR_MODE;
use crate::graph::path;
use crate::graph::{CopyInfo, Definition, FileAction, Node};
use crate::services::ServiceSpec;
use crate::util::hash::{Digest, Hashable};

#[derive(Debug, Clone, PartialEq, Eq)]
enum FsNode {
  File {
    data: Vec<u8>,
    mode: u32,
    modified: i64,
  },
  Dir {
    mode: u32,
    modified: i64,
    entries: BTreeMap<String, FsNode>,
  },
}

impl FsNode {
  fn empty_dir(mode: u32, modified: i64) -> Self {
    FsNode::Dir {
      mode,
      modified,
      entries: BTreeMap::new(),
    }
  }

  fn stat(&self, name: &str) -> FileStat {
    match self {
      FsNode::File { data, mode, modified } => FileStat {
        name: name.to_string(),
        kind: FileKind::File,
        size: data.len() as u64,
        mode: *mode,
        modified: *modified,
      },
      FsNode::Dir { mode, modified, .. } => FileStat {
        name: name.to_string(),
        kind: FileKind::Directory,
        size: 0,
        mode: *mode,
        modified: *modified,
      },
    }
  }

  fn set_modified(&mut self, timestamp: i64) {
    match self {
      FsNode::File { modified, .. } => *modified = timestamp,
      FsNode::Dir { modified, entries, .. } => {
        *modified = timestamp;
        for child in entries.values_mut() {
          child.set_modified(timestamp);
        }
      }
    }
  }

  fn set_file_mode(&mut self, new_mode: u32) {
    match self {
      FsNode::File { mode, .. } => *mode = new_mode,
      FsNode::Dir { entries, .. } => {
        for child in entries.values_mut() {
          child.set_file_mode(new_mode);
        }
      }
    }
  }
}

fn lookup<'a>(root: &'a FsNode, target: &str) -> Result<&'a FsNode, BackendError> {
  let mut node = root;
  for name in path::components(target) {
    node = match node {
      FsNode::Dir { entries, .. } => entries
        .get(&name)
        .ok_or_else(|| BackendError::NotFound { path: path::clean(target) })?,
      FsNode::File { .. } => return Err(BackendError::NotADirectory { path: path::clean(target) }),
    };
  }
  Ok(node)
}

/// Entries of the directory at `dir`, creating missing directories on the
/// way when `create` is set.
fn dir_entries_mut<'a>(
  root: &'a mut FsNode,
  dir: &str,
  create: bool,
  modified: i64,
) -> Result<&'a mut BTreeMap<String, FsNode>, BackendError> {
  let mut node = root;
  for name in path::components(dir) {
    let FsNode::Dir { entries, .. } = node else {
      return Err(BackendError::NotADirectory { path: path::clean(dir) });
    };
    if !entries.contains_key(&name) {
      if !create {
        return Err(BackendError::NotFound { path: path::clean(dir) });
      }
      entries.insert(name.clone(), FsNode::empty_dir(DEFAULT_DIR_MODE, modified));
    }
    node = entries
      .get_mut(&name)
      .ok_or_else(|| BackendError::NotFound { path: path::clean(dir) })?;
  }

  match node {
    FsNode::Dir { entries, .. } => Ok(entries),
    FsNode::File { .. } => Err(BackendError::NotADirectory { path: path::clean(dir) }),
  }
}

fn merge_into(entries: &mut BTreeMap<String, FsNode>, incoming: BTreeMap<String, FsNode>) {
  for (name, node) in incoming {
    match node {
      FsNode::Dir {
        mode,
        modified,
        entries: children,
      } => {
        if let Some(FsNode::Dir { entries: existing, .. }) = entries.get_mut(&name) {
          merge_into(existing, children);
        } else {
          entries.insert(
            name,
            FsNode::Dir {
              mode,
              modified,
              entries: children,
            },
          );
        }
      }
      file => {
        entries.insert(name, file);
      }
    }
  }
}

struct Filter {
  include: Option<GlobSet>,
  exclude: Option<GlobSet>,
}

impl Filter {
  fn new(info: &CopyInfo) -> Result<Self, BackendError> {
    Ok(Self {
      include: glob_set(&info.include)?,
      exclude: glob_set(&info.exclude)?,
    })
  }

  fn is_noop(&self) -> bool {
    self.include.is_none() && self.exclude.is_none()
  }

  fn excluded(&self, rel: &str) -> bool {
    self.exclude.as_ref().is_some_and(|set| set.is_match(rel))
  }

  fn included(&self, rel: &str) -> bool {
    self.include.as_ref().is_none_or(|set| set.is_match(rel))
  }

  /// Apply the filter to the entries of a copied directory. Excluding a
  /// directory drops its whole subtree; including one keeps everything
  /// below it that is not excluded.
  fn apply(&self, entries: &BTreeMap<String, FsNode>, prefix: &str, forced: bool) -> BTreeMap<String, FsNode> {
    let mut out = BTreeMap::new();
    for (name, node) in entries {
      let rel = if prefix.is_empty() {
        name.clone()
      } else {
        format!("{}/{}", prefix, name)
      };
      if self.excluded(&rel) {
        continue;
      }

      let keep_all = forced || (self.include.is_some() && self.included(&rel));
      match node {
        FsNode::File { .. } => {
          if keep_all || self.included(&rel) {
            out.insert(name.clone(), node.clone());
          }
        }
        FsNode::Dir { mode, modified, entries } => {
          let children = self.apply(entries, &rel, keep_all);
          if keep_all || !children.is_empty() {
            out.insert(
              name.clone(),
              FsNode::Dir {
                mode: *mode,
                modified: *modified,
                entries: children,
              },
            );
          }
        }
      }
    }
    out
  }
}

fn glob_set(patterns: &[String]) -> Result<Option<GlobSet>, BackendError> {
  if patterns.is_empty() {
    return Ok(None);
  }

  let mut builder = GlobSetBuilder::new();
  for pattern in patterns {
    let glob = Glob::new(pattern).map_err(|e| BackendError::InvalidPattern {
      pattern: pattern.clone(),
      message: e.to_string(),
    })?;
    builder.add(glob);
  }
  let set = builder.build().map_err(|e| BackendError::InvalidPattern {
    pattern: patterns.join(","),
    message: e.to_string(),
  })?;
  Ok(Some(set))
}

/// Evaluates definitions into trees. `now` stamps anything created without
/// an explicit timestamp, so one solve is internally consistent.
struct Interpreter {
  now: i64,
}

impl Interpreter {
  fn eval(&self, node: &Node) -> Result<FsNode, BackendError> {
    match node {
      Node::Scratch => Ok(FsNode::empty_dir(DEFAULT_DIR_MODE, self.now)),
      Node::File { base, action } => {
        let mut tree = self.eval(base)?;
        self.apply(&mut tree, action)?;
        Ok(tree)
      }
      Node::Diff { lower, upper } => {
        let lower = self.eval(lower)?;
        let upper = self.eval(upper)?;
        Ok(diff(&lower, &upper).unwrap_or_else(|| FsNode::empty_dir(DEFAULT_DIR_MODE, self.now)))
      }
    }
  }

  fn apply(&self, root: &mut FsNode, action: &FileAction) -> Result<(), BackendError> {
    match action {
      FileAction::Mkdir {
        path: target,
        mode,
        make_parents,
        timestamp,
      } => {
        let modified = timestamp.unwrap_or(self.now);
        let Some(parent) = path::parent(target) else {
          return Ok(());
        };
        let name = path::base_name(target);
        let entries = dir_entries_mut(root, &parent, *make_parents, modified)?;
        match entries.get(&name) {
          Some(FsNode::Dir { .. }) if *make_parents => Ok(()),
          Some(_) => Err(BackendError::AlreadyExists { path: path::clean(target) }),
          None => {
            entries.insert(name, FsNode::empty_dir(*mode, modified));
            Ok(())
          }
        }
      }

      FileAction::Mkfile {
        path: target,
        mode,
        data,
        timestamp,
      } => {
        let Some(parent) = path::parent(target) else {
          return Err(BackendError::IsADirectory { path: "/".to_string() });
        };
        let name = path::base_name(target);
        let entries = dir_entries_mut(root, &parent, false, self.now)?;
        if let Some(FsNode::Dir { .. }) = entries.get(&name) {
          return Err(BackendError::IsADirectory { path: path::clean(target) });
        }
        entries.insert(
          name,
          FsNode::File {
            data: data.clone(),
            mode: *mode,
            modified: timestamp.unwrap_or(self.now),
          },
        );
        Ok(())
      }

      FileAction::Rm {
        path: target,
        allow_not_found,
      } => {
        let Some(parent) = path::parent(target) else {
          if let FsNode::Dir { entries, .. } = root {
            entries.clear();
          }
          return Ok(());
        };
        let removed = match dir_entries_mut(root, &parent, false, self.now) {
          Ok(entries) => entries.remove(&path::base_name(target)).is_some(),
          Err(BackendError::NotFound { .. }) => false,
          Err(e) => return Err(e),
        };
        if removed || *allow_not_found {
          Ok(())
        } else {
          Err(BackendError::NotFound { path: path::clean(target) })
        }
      }

      FileAction::Copy { source, src, dest, info } => {
        let source_tree = self.eval(source)?;
        let mut copied = lookup(&source_tree, src)?.clone();

        if let Some(mode) = info.mode {
          copied.set_file_mode(mode);
        }
        if let Some(timestamp) = info.timestamp {
          copied.set_modified(timestamp);
        }

        match copied {
          FsNode::Dir { entries, .. } => {
            let filter = Filter::new(info)?;
            let entries = if filter.is_noop() {
              entries
            } else {
              filter.apply(&entries, "", false)
            };
            let target = dir_entries_mut(root, dest, info.create_dest_path || info.copy_dir_contents, self.now)?;
            merge_into(target, entries);
            Ok(())
          }
          file @ FsNode::File { .. } => {
            // Copying onto an existing directory places the file inside it.
            let dest_is_dir = matches!(lookup(root, dest), Ok(FsNode::Dir { .. }));
            let (dir, name) = if dest_is_dir {
              (path::clean(dest), path::base_name(src))
            } else {
              let Some(parent) = path::parent(dest) else {
                return Err(BackendError::IsADirectory { path: "/".to_string() });
              };
              (parent, path::base_name(dest))
            };
            let target = dir_entries_mut(root, &dir, info.create_dest_path, self.now)?;
            target.insert(name, file);
            Ok(())
          }
        }
      }
    }
  }
}

/// What `upper` adds or changes relative to `lower`; `None` when nothing.
fn diff(lower: &FsNode, upper: &FsNode) -> Option<FsNode> {
  match (lower, upper) {
    (
      FsNode::Dir { entries: lower_entries, .. },
      FsNode::Dir {
        mode,
        modified,
        entries: upper_entries,
      },
    ) => {
      let mut out = BTreeMap::new();
      for (name, upper_child) in upper_entries {
        let changed = match lower_entries.get(name) {
          None => Some(upper_child.clone()),
          Some(lower_child) if lower_child == upper_child => None,
          Some(lower_child) => match (lower_child, upper_child) {
            (FsNode::Dir { mode: lower_mode, .. }, FsNode::Dir { mode: upper_mode, .. }) => {
              match diff(lower_child, upper_child) {
                Some(child) => Some(child),
                None if lower_mode != upper_mode => Some(FsNode::empty_dir(*upper_mode, upper_child.stat("").modified)),
                None => None,
              }
            }
            _ => Some(upper_child.clone()),
          },
        };
        if let Some(node) = changed {
          out.insert(name.clone(), node);
        }
      }

      if out.is_empty() {
        None
      } else {
        Some(FsNode::Dir {
          mode: *mode,
          modified: *modified,
          entries: out,
        })
      }
    }
    _ if lower == upper => None,
    _ => Some(upper.clone()),
  }
}

#[derive(Debug)]
struct MemoryRef {
  root: FsNode,
}

#[async_trait]
impl Reference for MemoryRef {
  async fn read_dir(&self, target: &str) -> Result<Vec<FileStat>, BackendError> {
    match lookup(&self.root, target)? {
      FsNode::Dir { entries, .. } => Ok(entries.iter().map(|(name, node)| node.stat(name)).collect()),
      FsNode::File { .. } => Err(BackendError::NotADirectory { path: path::clean(target) }),
    }
  }

  async fn read_file(&self, target: &str) -> Result<Vec<u8>, BackendError> {
    match lookup(&self.root, target)? {
      FsNode::File { data, .. } => Ok(data.clone()),
      FsNode::Dir { .. } => Err(BackendError::IsADirectory { path: path::clean(target) }),
    }
  }

  async fn stat(&self, target: &str) -> Result<FileStat, BackendError> {
    Ok(lookup(&self.root, target)?.stat(&path::base_name(target)))
  }
}

#[derive(Debug, Default)]
struct ServiceLog {
  started: Vec<String>,
  stopped: Vec<String>,
}

#[derive(Default)]
pub struct MemoryBackend {
  cache: Mutex<HashMap<Digest, Arc<MemoryRef>>>,
  services: Mutex<ServiceLog>,
}

impl MemoryBackend {
  pub fn new() -> Self {
    Self::default()
  }

  /// Keys of every service start, in order.
  pub fn started_services(&self) -> Vec<String> {
    self.services.lock().unwrap_or_else(PoisonError::into_inner).started.clone()
  }

  /// Keys of every service stop, in order.
  pub fn stopped_services(&self) -> Vec<String> {
    self.services.lock().unwrap_or_else(PoisonError::into_inner).stopped.clone()
  }

  /// Number of distinct definitions solved so far.
  #[cfg(test)]
  pub(crate) fn solved_count(&self) -> usize {
    self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
  }
}

fn now() -> i64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_secs() as i64)
    .unwrap_or_default()
}

#[async_trait]
impl Backend for MemoryBackend {
  fn name(&self) -> &str {
    "memory"
  }

  async fn solve(&self, definition: &Definition) -> Result<Option<Arc<dyn Reference>>, BackendError> {
    if definition.is_scratch() {
      return Ok(None);
    }

    let digest = definition.digest().map_err(|e| BackendError::Solve(e.to_string()))?;
    if let Some(cached) = self.cache.lock().unwrap_or_else(PoisonError::into_inner).get(&digest) {
      debug!(digest = %digest, "solve cache hit");
      let reference: Arc<dyn Reference> = cached.clone();
      return Ok(Some(reference));
    }

    let root = Interpreter { now: now() }.eval(&definition.root)?;
    let reference = Arc::new(MemoryRef { root });
    debug!(digest = %digest, platform = %definition.platform, "solved");

    let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
    let reference: Arc<dyn Reference> = cache.entry(digest).or_insert(reference).clone();
    Ok(Some(reference))
  }

  async fn build_dockerfile(&self, _request: DockerBuildRequest) -> Result<BuildResult, BackendError> {
    Err(BackendError::Unsupported("building images from a build definition"))
  }

  async fn start_service(&self, spec: &ServiceSpec) -> Result<RunningService, BackendError> {
    let key = spec.key().map_err(|e| BackendError::Service {
      key: String::new(),
      message: e.to_string(),
    })?;
    let hostname = spec.hostname().map_err(|e| BackendError::Service {
      key: key.clone(),
      message: e.to_string(),
    })?;

    info!(service = %hostname, "service started");
    self
      .services
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .started
      .push(key.clone());

    Ok(RunningService {
      key,
      hostname,
      ports: spec.ports.clone(),
    })
  }

  async fn stop_service(&self, service: &RunningService) -> Result<(), BackendError> {
    info!(service = %service.hostname, "service stopped");
    self
      .services
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .stopped
      .push(service.key.clone());
    Ok(())
  }
}
