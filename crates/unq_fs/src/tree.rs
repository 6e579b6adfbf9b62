use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

/// Deepest tree a caller may request.
pub const MAX_TREE_DEPTH: usize = 16;

/// One node of a materialized directory tree.
#[derive(Debug, Clone, Serialize)]
pub struct TreeNode {
    pub name: String,
    pub path: PathBuf,
    pub children: Vec<TreeNode>,
}

/// Depth-bounded directory tree builder that skips hidden entries.
///
/// Symlinks are listed but never descended into.
#[derive(Debug, Clone, Copy)]
pub struct TreeWalker {
    max_depth: usize,
}

impl Default for TreeWalker {
    fn default() -> Self {
        Self { max_depth: 3 }
    }
}

impl TreeWalker {
    /// Walker limited to `max_depth`, clamped to [`MAX_TREE_DEPTH`].
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.min(MAX_TREE_DEPTH),
        }
    }

    /// Build the tree rooted at `root`.
    ///
    /// The root is depth 0 and is always returned, even when empty or
    /// unreadable. Nodes at `max_depth` carry no children. Directories that
    /// cannot be listed are kept as childless nodes.
    pub fn build(&self, root: &Path) -> TreeNode {
        debug!(root = %root.display(), max_depth = self.max_depth, "building tree");
        self.build_node(root, root.is_dir(), 0)
    }

    fn build_node(&self, path: &Path, is_dir: bool, depth: usize) -> TreeNode {
        let mut node = TreeNode {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            path: path.to_path_buf(),
            children: Vec::new(),
        };

        if depth >= self.max_depth || !is_dir {
            return node;
        }

        let entries = match fs::read_dir(path) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "skipping unreadable directory");
                return node;
            }
        };

        // `file_type` does not follow symlinks, so a linked directory is a leaf.
        let mut children: Vec<(String, bool)> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| {
                let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
                (entry.file_name().to_string_lossy().into_owned(), is_dir)
            })
            .filter(|(name, _)| !name.starts_with('.'))
            .collect();
        children.sort();

        node.children = children
            .iter()
            .map(|(name, is_dir)| self.build_node(&path.join(name), *is_dir, depth + 1))
            .collect();
        node
    }
}
