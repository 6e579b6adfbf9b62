use std::fs;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use serde::Serialize;
use tracing::debug;
use unq_core::{BridgeError, BridgeResult};

/// Lines of context kept on each side of a matching line.
const CONTEXT_LINES: usize = 2;

/// Options controlling how a search is performed.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Filename suffix filter; `"*"` disables filtering.
    pub file_type: String,
    /// Descend into hidden directories and read hidden files.
    pub include_hidden: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            file_type: "*".to_string(),
            include_hidden: true,
        }
    }
}

/// A single matching line with its surrounding context.
#[derive(Debug, Clone, Serialize)]
pub struct SearchMatch {
    pub file: PathBuf,
    /// 1-based line number.
    pub line_number: usize,
    /// The matching line with surrounding whitespace trimmed.
    pub line_content: String,
    /// Up to two lines before and after the match, clipped at file bounds.
    pub context: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    pub matches: Vec<SearchMatch>,
    pub total: usize,
}

/// Case-insensitive substring search over every text file below a root.
///
/// Files that cannot be read as UTF-8 are skipped silently; the tree may
/// contain binaries.
#[derive(Debug, Clone)]
pub struct ContentSearch {
    root: PathBuf,
}

impl ContentSearch {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn search(&self, query: &str, options: &SearchOptions) -> BridgeResult<SearchReport> {
        if !self.root.is_dir() {
            return Err(BridgeError::not_found(&self.root));
        }

        let needle = query.to_lowercase();
        let walker = WalkBuilder::new(&self.root)
            .standard_filters(false)
            .hidden(!options.include_hidden)
            .build();

        debug!(query, file_type = %options.file_type, root = %self.root.display(), "searching");

        let mut matches = Vec::new();
        for entry in walker {
            let Ok(entry) = entry else { continue };
            // Symlinks are never read; their targets may lie outside the root.
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }

            let path = entry.path();
            if !matches_file_type(path, &options.file_type) {
                continue;
            }

            let Ok(content) = fs::read_to_string(path) else {
                continue;
            };
            if !content.to_lowercase().contains(&needle) {
                continue;
            }

            collect_line_matches(path, &content, &needle, &mut matches);
        }

        debug!("Found {} matches", matches.len());
        Ok(SearchReport {
            total: matches.len(),
            matches,
        })
    }
}

fn matches_file_type(path: &Path, file_type: &str) -> bool {
    if file_type == "*" {
        return true;
    }
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().ends_with(file_type))
}

fn collect_line_matches(path: &Path, content: &str, needle: &str, out: &mut Vec<SearchMatch>) {
    let lines: Vec<&str> = content.split('\n').collect();
    for (idx, line) in lines.iter().enumerate() {
        if !line.to_lowercase().contains(needle) {
            continue;
        }
        let start = idx.saturating_sub(CONTEXT_LINES);
        let end = (idx + CONTEXT_LINES + 1).min(lines.len());
        out.push(SearchMatch {
            file: path.to_path_buf(),
            line_number: idx + 1,
            line_content: line.trim().to_string(),
            context: lines[start..end].iter().map(|l| l.to_string()).collect(),
        });
    }
}
