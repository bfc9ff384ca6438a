//! Content-addressed build graphs.

pub mod path;
pub mod types;

pub use types::{CopyInfo, Definition, FileAction, Node};
