//! Writing solved results to the host filesystem.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use super::ModelError;
use crate::backend::Reference;
use crate::graph::path;

/// Resolve an export destination against the configured working directory.
pub fn destination(workdir: &Path, dest: &str) -> PathBuf {
  let dest = Path::new(dest);
  if dest.is_absolute() {
    dest.to_path_buf()
  } else {
    workdir.join(dest)
  }
}

/// Fail if `dest` exists and is not a directory.
pub async fn ensure_directory_destination(dest: &Path) -> Result<(), ModelError> {
  match fs::metadata(dest).await {
    Ok(meta) if !meta.is_dir() => Err(ModelError::ExportDestination {
      path: dest.to_path_buf(),
      expected: "directory",
    }),
    _ => Ok(()),
  }
}

/// Fail if `dest` exists and is a directory.
pub async fn ensure_file_destination(dest: &Path) -> Result<(), ModelError> {
  match fs::metadata(dest).await {
    Ok(meta) if meta.is_dir() => Err(ModelError::ExportDestination {
      path: dest.to_path_buf(),
      expected: "file",
    }),
    _ => Ok(()),
  }
}

/// Write `data` to `dest` with permissions `mode`, creating parents.
pub async fn write_file(dest: &Path, data: &[u8], mode: u32) -> Result<(), ModelError> {
  ensure_file_destination(dest).await?;
  if let Some(parent) = dest.parent() {
    fs::create_dir_all(parent).await.map_err(ModelError::io(parent))?;
  }
  fs::write(dest, data).await.map_err(ModelError::io(dest))?;
  set_mode(dest, mode).await
}

#[cfg(unix)]
async fn set_mode(dest: &Path, mode: u32) -> Result<(), ModelError> {
  use std::os::unix::fs::PermissionsExt;
  fs::set_permissions(dest, std::fs::Permissions::from_mode(mode))
    .await
    .map_err(ModelError::io(dest))
}

#[cfg(not(unix))]
async fn set_mode(_dest: &Path, _mode: u32) -> Result<(), ModelError> {
  Ok(())
}

/// One step of an export, planned before anything is written.
enum Step {
  Dir(PathBuf),
  File { dest: PathBuf, data: Vec<u8>, mode: u32 },
}

/// Read the tree under `src` and check every destination it maps to. Fails
/// before the first write if any destination conflicts.
async fn plan_tree(reference: &dyn Reference, src: &str, dest: &Path) -> Result<Vec<Step>, ModelError> {
  ensure_directory_destination(dest).await?;

  let mut steps = Vec::new();
  let mut pending = vec![(path::clean(src), dest.to_path_buf())];
  while let Some((src, dest)) = pending.pop() {
    steps.push(Step::Dir(dest.clone()));

    for entry in reference.read_dir(&src).await? {
      let child_src = path::resolve(&src, &entry.name);
      let child_dest = dest.join(&entry.name);
      if entry.is_dir() {
        ensure_directory_destination(&child_dest).await?;
        pending.push((child_src, child_dest));
      } else {
        ensure_file_destination(&child_dest).await?;
        let data = reference.read_file(&child_src).await?;
        steps.push(Step::File {
          dest: child_dest,
          data,
          mode: entry.mode,
        });
      }
    }
  }
  Ok(steps)
}

/// Copy the tree under `src` in `reference` into the host directory `dest`.
/// A conflicting destination leaves the host untouched.
pub async fn export_tree(reference: &dyn Reference, src: &str, dest: &Path) -> Result<usize, ModelError> {
  let steps = plan_tree(reference, src, dest).await?;

  let mut written = 0;
  for step in steps {
    match step {
      Step::Dir(dir) => fs::create_dir_all(&dir).await.map_err(ModelError::io(&dir))?,
      Step::File { dest, data, mode } => {
        write_file(&dest, &data, mode).await?;
        written += 1;
      }
    }
  }

  debug!(dest = %dest.display(), files = written, "tree written");
  Ok(written)
}
