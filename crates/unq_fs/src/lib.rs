// Filesystem access rooted at a single base directory

pub mod files;
pub mod mime;
pub mod paths;
pub mod search;
pub mod tree;

pub use files::{EntryKind, FileContent, FileEntry, FileStore, Listing, RenameOutcome, WriteOutcome};
pub use paths::PathResolver;
pub use search::{ContentSearch, SearchMatch, SearchOptions, SearchReport};
pub use tree::{MAX_TREE_DEPTH, TreeNode, TreeWalker};
