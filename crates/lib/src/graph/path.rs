//! Lexical path handling for paths inside a build graph.
//!
//! Graph paths are always absolute and `/`-separated. Resolution never
//! touches a filesystem; `..` is applied lexically and cannot climb above
//! the root it is resolved against.

/// Normalize `path` into an absolute form without `.`, `..`, or repeated
/// separators. A relative path is taken relative to `/`.
pub fn clean(path: &str) -> String {
  let mut parts: Vec<&str> = Vec::new();
  for part in path.split('/') {
    match part {
      "" | "." => {}
      ".." => {
        parts.pop();
      }
      other => parts.push(other),
    }
  }
  format!("/{}", parts.join("/"))
}

/// Resolve `path` inside the view rooted at `base`.
///
/// Absolute paths are relative to the view root, and `..` stops at it, so
/// the result always lies at or below `base`.
pub fn resolve(base: &str, path: &str) -> String {
  let relative = clean(path);
  let base = clean(base);
  if relative == "/" {
    base
  } else if base == "/" {
    relative
  } else {
    format!("{}{}", base, relative)
  }
}

/// The parent of a cleaned path, or `None` for the root.
pub fn parent(path: &str) -> Option<String> {
  let path = clean(path);
  if path == "/" {
    return None;
  }
  match path.rfind('/') {
    Some(0) => Some("/".to_string()),
    Some(i) => Some(path[..i].to_string()),
    None => None,
  }
}

/// The last component of a cleaned path; empty for the root.
pub fn base_name(path: &str) -> String {
  clean(path).rsplit('/').next().unwrap_or_default().to_string()
}

/// Components of a cleaned path, root excluded.
pub fn components(path: &str) -> Vec<String> {
  clean(path)
    .split('/')
    .filter(|p| !p.is_empty())
    .map(str::to_string)
    .collect()
}
