use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing::debug;
use unq_core::{BridgeError, BridgeResult};

use crate::mime;
use crate::paths::PathResolver;

/// Whether a listed entry is a regular file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// A single immediate child of a listed directory.
#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub path: PathBuf,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Size in bytes; always 0 for directories.
    pub size: u64,
    /// Extension including the leading dot (`""` when the file has none),
    /// `None` for directories.
    pub extension: Option<String>,
}

/// Result of listing a directory.
#[derive(Debug, Clone, Serialize)]
pub struct Listing {
    pub files: Vec<FileEntry>,
    pub current_path: PathBuf,
}

/// Full text content of a file plus metadata.
#[derive(Debug, Clone, Serialize)]
pub struct FileContent {
    pub content: String,
    pub path: PathBuf,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WriteOutcome {
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenameOutcome {
    pub old_path: PathBuf,
    pub new_path: PathBuf,
}

/// File CRUD confined to the resolver's base directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    resolver: PathResolver,
}

impl FileStore {
    pub fn new(resolver: PathResolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// List the immediate children of `dir` (the base directory when `None`).
    ///
    /// Entries are sorted by name. Hidden entries are included.
    pub fn list(&self, dir: Option<&str>) -> BridgeResult<Listing> {
        let path = self.resolver.resolve_or_base(dir)?;
        if !path.is_dir() {
            return Err(BridgeError::not_found(&path));
        }

        debug!("Listing directory: {}", path.display());
        let mut files = Vec::new();
        for entry in fs::read_dir(&path)? {
            let entry = entry?;
            let entry_path = entry.path();
            // Follow symlinks like a plain `stat`, falling back to the link
            // itself when it dangles.
            let metadata = match fs::metadata(&entry_path) {
                Ok(m) => m,
                Err(_) => entry.metadata()?,
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = metadata.is_dir();

            files.push(FileEntry {
                extension: (!is_dir).then(|| split_extension(&name).to_string()),
                name,
                path: entry_path,
                kind: if is_dir { EntryKind::Directory } else { EntryKind::File },
                size: if is_dir { 0 } else { metadata.len() },
            });
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Listing {
            files,
            current_path: path,
        })
    }

    /// Read a file's full contents as UTF-8.
    pub fn read(&self, path: &str) -> BridgeResult<FileContent> {
        let resolved = self.resolver.resolve(path)?;
        if !resolved.is_file() {
            return Err(BridgeError::not_found(&resolved));
        }

        debug!("Reading file: {}", resolved.display());
        let content = fs::read_to_string(&resolved)?;
        let size = fs::metadata(&resolved)?.len();

        Ok(FileContent {
            content,
            mime_type: mime::guess(&resolved),
            path: resolved,
            size,
        })
    }

    /// Create or overwrite a file, creating parent directories as needed.
    pub fn write(&self, path: &str, content: &str) -> BridgeResult<WriteOutcome> {
        let resolved = self.resolver.resolve(path)?;

        if let Some(parent) = resolved.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        debug!("Writing file: {}", resolved.display());
        replace_file(&resolved, content)?;

        Ok(WriteOutcome {
            path: resolved,
            size: content.len() as u64,
        })
    }

    /// Delete a file, or a directory and everything below it.
    ///
    /// Returns the kind of entry that was removed.
    pub fn delete(&self, path: &str) -> BridgeResult<EntryKind> {
        let resolved = self.resolver.resolve(path)?;
        self.refuse_base(&resolved, "delete")?;

        let Ok(metadata) = fs::symlink_metadata(&resolved) else {
            return Err(BridgeError::not_found(&resolved));
        };

        debug!("Deleting: {}", resolved.display());
        if metadata.is_dir() {
            fs::remove_dir_all(&resolved)?;
            Ok(EntryKind::Directory)
        } else {
            // Regular files and symlinks (the link itself, never its target).
            fs::remove_file(&resolved)?;
            Ok(EntryKind::File)
        }
    }

    /// Rename or move `old` to `new`, both relative to the base directory.
    ///
    /// With `overwrite` set, an existing target is replaced following the
    /// platform's rename semantics; otherwise an existing target is a
    /// [`BridgeError::Conflict`].
    pub fn rename(&self, old: &str, new: &str, overwrite: bool) -> BridgeResult<RenameOutcome> {
        let old_path = self.resolver.resolve(old)?;
        let new_path = self.resolver.resolve(new)?;
        self.refuse_base(&old_path, "rename")?;
        self.refuse_base(&new_path, "rename onto")?;

        if fs::symlink_metadata(&old_path).is_err() {
            return Err(BridgeError::not_found(&old_path));
        }
        if !overwrite && fs::symlink_metadata(&new_path).is_ok() {
            return Err(BridgeError::Conflict(new_path.display().to_string()));
        }

        debug!("Renaming {} -> {}", old_path.display(), new_path.display());
        fs::rename(&old_path, &new_path)?;

        Ok(RenameOutcome { old_path, new_path })
    }

    fn refuse_base(&self, path: &Path, action: &str) -> BridgeResult<()> {
        if path == self.resolver.base() {
            return Err(BridgeError::Forbidden(format!(
                "Refusing to {action} the base directory"
            )));
        }
        Ok(())
    }
}

/// Write `content` to a sibling temp file and rename it over `path`, so
/// concurrent writers leave one complete content behind.
fn replace_file(path: &Path, content: &str) -> std::io::Result<()> {
    static NEXT_TMP: AtomicU64 = AtomicU64::new(0);

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(
        ".{name}.{}.{}.tmp",
        std::process::id(),
        NEXT_TMP.fetch_add(1, Ordering::Relaxed)
    ));

    let result = fs::write(&tmp, content).and_then(|()| fs::rename(&tmp, path));
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

/// Extension of `name` including the leading dot. Leading dots of hidden
/// files do not count, so `.bashrc` has no extension.
fn split_extension(name: &str) -> &str {
    let stem_start = name.len() - name.trim_start_matches('.').len();
    match name[stem_start..].rfind('.') {
        Some(idx) => &name[stem_start + idx..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(PathResolver::new(dir.path()).unwrap());
        (dir, store)
    }

    #[test]
    fn test_write_and_read_roundtrip() {
        let (_dir, store) = setup();
        let content = "hello\nwörld\n";
        store.write("hello.txt", content).unwrap();
        let read = store.read("hello.txt").unwrap();
        assert_eq!(read.content, content);
        assert_eq!(read.size, content.len() as u64);
        assert_eq!(read.mime_type, Some("text/plain"));
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let (dir, store) = setup();
        let outcome = store.write("a/b/c.txt", "deep").unwrap();
        assert_eq!(outcome.size, 4);
        assert_eq!(fs::read_to_string(dir.path().join("a/b/c.txt")).unwrap(), "deep");
        // Second write into the same tree must not fail on existing parents.
        store.write("a/b/d.txt", "again").unwrap();
    }

    #[test]
    fn test_write_then_list_reports_byte_size() {
        let (_dir, store) = setup();
        store.write("sub/data.bin", "ünï").unwrap();
        let listing = store.list(Some("sub")).unwrap();
        assert_eq!(listing.files.len(), 1);
        assert_eq!(listing.files[0].name, "data.bin");
        assert_eq!(listing.files[0].size, "ünï".len() as u64);
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let (_dir, store) = setup();
        let err = store.read("missing.txt").unwrap_err();
        assert!(matches!(err, BridgeError::NotFound(_)));
    }

    #[test]
    fn test_read_directory_is_not_found() {
        let (dir, store) = setup();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let err = store.read("sub").unwrap_err();
        assert!(matches!(err, BridgeError::NotFound(_)));
    }

    #[test]
    fn test_read_binary_is_generic_failure() {
        let (dir, store) = setup();
        fs::write(dir.path().join("blob.bin"), [0xff, 0xfe, 0x00]).unwrap();
        let err = store.read("blob.bin").unwrap_err();
        assert!(matches!(err, BridgeError::Io(_)));
    }

    #[test]
    fn test_list_scenario() {
        let (dir, store) = setup();
        fs::write(dir.path().join("a.txt"), "hello").unwrap();
        fs::write(dir.path().join(".secret"), "s").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let listing = store.list(None).unwrap();
        assert_eq!(listing.current_path, dir.path().canonicalize().unwrap());

        let a: Vec<_> = listing.files.iter().filter(|f| f.name == "a.txt").collect();
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].kind, EntryKind::File);
        assert_eq!(a[0].size, 5);
        assert_eq!(a[0].extension.as_deref(), Some(".txt"));

        let sub = listing.files.iter().find(|f| f.name == "sub").unwrap();
        assert_eq!(sub.kind, EntryKind::Directory);
        assert_eq!(sub.size, 0);
        assert!(sub.extension.is_none());
    }

    #[test]
    fn test_list_missing_dir_is_not_found() {
        let (_dir, store) = setup();
        let err = store.list(Some("nope")).unwrap_err();
        assert!(matches!(err, BridgeError::NotFound(_)));
    }

    #[test]
    fn test_delete_file_and_directory() {
        let (dir, store) = setup();
        store.write("gone.txt", "x").unwrap();
        store.write("tree/inner/f.txt", "y").unwrap();

        assert_eq!(store.delete("gone.txt").unwrap(), EntryKind::File);
        assert_eq!(store.delete("tree").unwrap(), EntryKind::Directory);
        assert!(!dir.path().join("gone.txt").exists());
        assert!(!dir.path().join("tree").exists());

        assert!(matches!(store.read("gone.txt"), Err(BridgeError::NotFound(_))));
        let listing = store.list(None).unwrap();
        assert!(listing.files.iter().all(|f| f.name != "gone.txt"));
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let (_dir, store) = setup();
        assert!(matches!(store.delete("missing"), Err(BridgeError::NotFound(_))));
    }

    #[test]
    fn test_delete_base_is_forbidden() {
        let (_dir, store) = setup();
        assert!(matches!(store.delete(""), Err(BridgeError::Forbidden(_))));
    }

    #[test]
    fn test_rename() {
        let (dir, store) = setup();
        store.write("old.txt", "data").unwrap();
        let outcome = store.rename("old.txt", "new.txt", true).unwrap();
        assert!(outcome.new_path.ends_with("new.txt"));
        assert!(!dir.path().join("old.txt").exists());
        assert_eq!(fs::read_to_string(dir.path().join("new.txt")).unwrap(), "data");
    }

    #[test]
    fn test_rename_missing_source() {
        let (_dir, store) = setup();
        let err = store.rename("nope.txt", "x.txt", true).unwrap_err();
        assert!(matches!(err, BridgeError::NotFound(_)));
    }

    #[test]
    fn test_rename_collision_policies() {
        let (dir, store) = setup();
        store.write("a.txt", "A").unwrap();
        store.write("b.txt", "B").unwrap();

        let err = store.rename("a.txt", "b.txt", false).unwrap_err();
        assert!(matches!(err, BridgeError::Conflict(_)));
        assert_eq!(fs::read_to_string(dir.path().join("b.txt")).unwrap(), "B");

        store.rename("a.txt", "b.txt", true).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("b.txt")).unwrap(), "A");
    }

    #[test]
    fn test_escape_is_rejected_before_touching_disk() {
        let (_dir, store) = setup();
        assert!(matches!(
            store.write("../escape.txt", "x"),
            Err(BridgeError::OutsideBase(_))
        ));
        assert!(matches!(
            store.rename("../a", "b", true),
            Err(BridgeError::OutsideBase(_))
        ));
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("a.txt"), ".txt");
        assert_eq!(split_extension("archive.tar.gz"), ".gz");
        assert_eq!(split_extension("Makefile"), "");
        assert_eq!(split_extension(".bashrc"), "");
        assert_eq!(split_extension(".config.json"), ".json");
    }

    #[test]
    fn test_entry_wire_shape() {
        let (dir, store) = setup();
        fs::write(dir.path().join("a.txt"), "hello").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let listing = store.list(None).unwrap();
        let json = serde_json::to_value(&listing).unwrap();
        let files = json["files"].as_array().unwrap();
        assert_eq!(files[0]["type"], "file");
        assert_eq!(files[0]["extension"], ".txt");
        assert_eq!(files[1]["type"], "directory");
        assert!(files[1]["extension"].is_null());
    }

    #[test]
    fn test_concurrent_writes_never_mix() {
        let (dir, store) = setup();
        let long = "a".repeat(200_000);
        let short = "b".repeat(100);

        for _ in 0..50 {
            let writers: Vec<_> = [long.clone(), short.clone()]
                .into_iter()
                .map(|content| {
                    let store = store.clone();
                    std::thread::spawn(move || store.write("shared.txt", &content).unwrap())
                })
                .collect();
            for writer in writers {
                writer.join().unwrap();
            }

            let content = fs::read_to_string(dir.path().join("shared.txt")).unwrap();
            assert!(content == long || content == short, "mixed content of {} bytes", content.len());
        }

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_write_onto_directory_fails_cleanly() {
        let (dir, store) = setup();
        fs::create_dir(dir.path().join("folder")).unwrap();
        assert!(store.write("folder", "x").is_err());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_write_through_dangling_link_stays_inside() {
        let (dir, store) = setup();
        let outside = tempfile::tempdir().unwrap();
        let target = outside.path().join("pwned.txt");
        std::os::unix::fs::symlink(&target, dir.path().join("link")).unwrap();

        let err = store.write("link", "escaped").unwrap_err();
        assert!(matches!(err, BridgeError::OutsideBase(_)));
        assert!(!target.exists());
    }
}
