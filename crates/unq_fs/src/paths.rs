use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use tracing::debug;
use unq_core::{BridgeError, BridgeResult};

/// Resolves caller-supplied paths against a fixed base directory.
///
/// Every filesystem operation goes through [`PathResolver::resolve`]. The
/// result is guaranteed to lie inside the base directory, even when the
/// input contains `..` segments, is absolute, or walks through a symlink.
/// Existence is *not* checked here; callers do that themselves.
#[derive(Debug, Clone)]
pub struct PathResolver {
    base: PathBuf,
}

impl PathResolver {
    /// Create a resolver rooted at `base`, which must be an existing directory.
    pub fn new(base: impl AsRef<Path>) -> BridgeResult<Self> {
        let base = base.as_ref();
        let canonical = base
            .canonicalize()
            .with_context(|| format!("Cannot resolve base directory: {}", base.display()))?;
        if !canonical.is_dir() {
            return Err(anyhow::anyhow!(
                "Base directory is not a directory: {}",
                canonical.display()
            )
            .into());
        }
        Ok(Self { base: canonical })
    }

    /// The canonical base directory.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Join `input` onto the base directory and confine the result to it.
    pub fn resolve(&self, input: &str) -> BridgeResult<PathBuf> {
        let normalized = normalize(&self.base.join(input));

        let anchored = anchor(normalized);

        if !anchored.starts_with(&self.base) || !self.link_target_inside(&anchored) {
            return Err(BridgeError::OutsideBase(input.to_string()));
        }

        debug!(input, resolved = %anchored.display(), "resolved path");
        Ok(anchored)
    }

    /// Like [`resolve`](Self::resolve), but an empty or missing input yields
    /// the base directory itself.
    pub fn resolve_or_base(&self, input: Option<&str>) -> BridgeResult<PathBuf> {
        match input {
            Some(p) if !p.is_empty() => self.resolve(p),
            _ => Ok(self.base.clone()),
        }
    }
}

/// Maximum symlink hops followed before a chain is treated as escaping.
const MAX_LINK_HOPS: usize = 40;

impl PathResolver {
    /// Follow `path` through any chain of symlinks, dangling ones included,
    /// and check that every hop stays inside the base.
    fn link_target_inside(&self, path: &Path) -> bool {
        let mut current = path.to_path_buf();
        for _ in 0..MAX_LINK_HOPS {
            let Ok(target) = fs::read_link(&current) else {
                return true;
            };
            let joined = match current.parent() {
                Some(parent) => parent.join(target),
                None => target,
            };
            current = anchor(normalize(&joined));
            if !current.starts_with(&self.base) {
                return false;
            }
        }
        false
    }
}

/// Canonicalize everything above the final component, keeping the final
/// component itself as-is so a symlink there is not followed.
fn anchor(path: PathBuf) -> PathBuf {
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => canonicalize_existing_prefix(parent).join(name),
        _ => path,
    }
}

/// Lexically remove `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Canonicalize the deepest existing ancestor of `path` and re-append the
/// components that do not exist yet.
fn canonicalize_existing_prefix(path: &Path) -> PathBuf {
    let mut existing = path.to_path_buf();
    let mut missing = Vec::new();

    loop {
        if let Ok(canonical) = existing.canonicalize() {
            let mut result = canonical;
            for name in missing.iter().rev() {
                result.push(name);
            }
            return result;
        }
        match (existing.file_name().map(|n| n.to_os_string()), existing.parent()) {
            (Some(name), Some(parent)) => {
                missing.push(name);
                existing = parent.to_path_buf();
            }
            _ => return path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathResolver) {
        let dir = tempfile::tempdir().unwrap();
        let resolver = PathResolver::new(dir.path()).unwrap();
        (dir, resolver)
    }

    #[test]
    fn resolves_relative_path_inside_base() {
        let (dir, resolver) = setup();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        let resolved = resolver.resolve("a.txt").unwrap();
        assert_eq!(resolved, dir.path().canonicalize().unwrap().join("a.txt"));
    }

    #[test]
    fn resolves_missing_nested_path() {
        let (dir, resolver) = setup();
        let resolved = resolver.resolve("x/y/z.txt").unwrap();
        assert_eq!(
            resolved,
            dir.path().canonicalize().unwrap().join("x").join("y").join("z.txt")
        );
    }

    #[test]
    fn inner_parent_segments_are_allowed() {
        let (dir, resolver) = setup();
        let resolved = resolver.resolve("sub/../b.txt").unwrap();
        assert_eq!(resolved, dir.path().canonicalize().unwrap().join("b.txt"));
    }

    #[test]
    fn rejects_parent_escape() {
        let (_dir, resolver) = setup();
        let err = resolver.resolve("../outside.txt").unwrap_err();
        assert!(matches!(err, BridgeError::OutsideBase(_)));

        let err = resolver.resolve("a/../../../etc/passwd").unwrap_err();
        assert!(matches!(err, BridgeError::OutsideBase(_)));
    }

    #[test]
    fn rejects_absolute_path_outside_base() {
        let (_dir, resolver) = setup();
        let err = resolver.resolve("/etc/passwd").unwrap_err();
        assert!(matches!(err, BridgeError::OutsideBase(_)));
    }

    #[test]
    fn accepts_absolute_path_inside_base() {
        let (dir, resolver) = setup();
        let inside = dir.path().canonicalize().unwrap().join("c.txt");
        let resolved = resolver.resolve(&inside.to_string_lossy()).unwrap();
        assert_eq!(resolved, inside);
    }

    #[test]
    fn empty_input_is_base() {
        let (dir, resolver) = setup();
        let canonical = dir.path().canonicalize().unwrap();
        assert_eq!(resolver.resolve("").unwrap(), canonical);
        assert_eq!(resolver.resolve_or_base(None).unwrap(), canonical);
        assert_eq!(resolver.resolve_or_base(Some("")).unwrap(), canonical);
    }

    #[cfg(unix)]
    #[test]
    fn rejects_symlink_pointing_outside() {
        let (dir, resolver) = setup();
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("secret.txt"), "s").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        let err = resolver.resolve("link/secret.txt").unwrap_err();
        assert!(matches!(err, BridgeError::OutsideBase(_)));

        std::os::unix::fs::symlink(
            outside.path().join("secret.txt"),
            dir.path().join("file_link"),
        )
        .unwrap();
        let err = resolver.resolve("file_link").unwrap_err();
        assert!(matches!(err, BridgeError::OutsideBase(_)));
    }

    #[cfg(unix)]
    #[test]
    fn rejects_dangling_symlink_pointing_outside() {
        let (dir, resolver) = setup();
        let outside = tempfile::tempdir().unwrap();
        let target = outside.path().join("not_yet.txt");
        std::os::unix::fs::symlink(&target, dir.path().join("dangling")).unwrap();

        let err = resolver.resolve("dangling").unwrap_err();
        assert!(matches!(err, BridgeError::OutsideBase(_)));

        // Relative target climbing out of the base.
        std::os::unix::fs::symlink("../../escape.txt", dir.path().join("relative")).unwrap();
        assert!(resolver.resolve("relative").is_err());
        assert!(!target.exists());
    }

    #[cfg(unix)]
    #[test]
    fn accepts_symlinks_that_stay_inside() {
        let (dir, resolver) = setup();
        let base = dir.path().canonicalize().unwrap();
        std::os::unix::fs::symlink("later.txt", dir.path().join("inner")).unwrap();
        std::os::unix::fs::symlink("inner", dir.path().join("chain")).unwrap();

        assert_eq!(resolver.resolve("inner").unwrap(), base.join("inner"));
        assert_eq!(resolver.resolve("chain").unwrap(), base.join("chain"));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_loop_is_rejected() {
        let (dir, resolver) = setup();
        std::os::unix::fs::symlink("b", dir.path().join("a")).unwrap();
        std::os::unix::fs::symlink("a", dir.path().join("b")).unwrap();
        assert!(matches!(
            resolver.resolve("a"),
            Err(BridgeError::OutsideBase(_))
        ));
    }

    #[test]
    fn new_rejects_missing_base() {
        let dir = tempfile::tempdir().unwrap();
        assert!(PathResolver::new(dir.path().join("missing")).is_err());
    }
}
