//! Path validation — filesystem sandboxing to the workspace root.
//!
//! Tool paths supplied by the model are always relative to one root. Absolute
//! paths and `..` components that would climb out of the root are refused,
//! and an existing target reached through a symlink must still live under the
//! root.

use std::path::{Component, Path, PathBuf};

/// Error returned when path validation fails.
#[derive(Debug, thiserror::Error)]
pub enum PathValidationError {
    #[error("Path is empty")]
    Empty,

    #[error("Absolute path '{path}' is not allowed; use a path relative to the workspace")]
    AbsolutePath { path: String },

    #[error("Path traversal detected in '{path}'")]
    PathTraversal { path: String },

    #[error("Path '{path}' resolves outside the workspace")]
    OutsideRoot { path: String },

    #[error("Failed to canonicalize path '{path}': {reason}")]
    CanonicalizeFailed { path: String, reason: String },
}

/// A directory every tool path is resolved against.
#[derive(Debug, Clone)]
pub struct SandboxRoot {
    root: PathBuf,
}

impl SandboxRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a model-supplied path to a location under the root.
    ///
    /// The check is lexical first (no absolute paths, no escaping `..`), then,
    /// when the target already exists, the canonical path must stay under the
    /// canonical root so symlinks cannot leak out.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, PathValidationError> {
        let raw = path.trim();
        if raw.is_empty() {
            return Err(PathValidationError::Empty);
        }

        let normalized_input = raw.replace('\\', "/");
        let input = Path::new(&normalized_input);

        let mut relative = PathBuf::new();
        for component in input.components() {
            match component {
                Component::Prefix(_) | Component::RootDir => {
                    return Err(PathValidationError::AbsolutePath { path: path.into() });
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    if !relative.pop() {
                        return Err(PathValidationError::PathTraversal { path: path.into() });
                    }
                }
                Component::Normal(part) => relative.push(part),
            }
        }

        if relative.as_os_str().is_empty() {
            return Err(PathValidationError::Empty);
        }

        let resolved = self.root.join(&relative);
        self.check_symlinks(path, &resolved)?;
        Ok(resolved)
    }

    fn check_symlinks(&self, original: &str, resolved: &Path) -> Result<(), PathValidationError> {
        if !resolved.exists() || !self.root.exists() {
            return Ok(());
        }

        let canonicalize = |p: &Path| {
            p.canonicalize()
                .map_err(|e| PathValidationError::CanonicalizeFailed {
                    path: original.into(),
                    reason: e.to_string(),
                })
        };

        let canonical_root = canonicalize(&self.root)?;
        let canonical = canonicalize(resolved)?;
        if !canonical.starts_with(&canonical_root) {
            tracing::warn!(path = %original, "Path escapes workspace via symlink");
            return Err(PathValidationError::OutsideRoot {
                path: original.into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn relative_path_joins_root() {
        let sandbox = SandboxRoot::new("apis");
        let resolved = sandbox.resolve("ixia/multicast.py").unwrap();
        assert_eq!(resolved, PathBuf::from("apis/ixia/multicast.py"));
    }

    #[test]
    fn dot_components_are_normalized() {
        let sandbox = SandboxRoot::new("apis");
        let resolved = sandbox.resolve("./ixia/../ixia/./a.py").unwrap();
        assert_eq!(resolved, PathBuf::from("apis/ixia/a.py"));
    }

    #[test]
    fn absolute_path_refused() {
        let sandbox = SandboxRoot::new("apis");
        match sandbox.resolve("/etc/passwd").unwrap_err() {
            PathValidationError::AbsolutePath { .. } => {}
            other => panic!("Expected AbsolutePath, got: {other}"),
        }
    }

    #[test]
    fn path_traversal_blocked() {
        let sandbox = SandboxRoot::new("apis");
        match sandbox.resolve("../../../etc/passwd").unwrap_err() {
            PathValidationError::PathTraversal { .. } => {}
            other => panic!("Expected PathTraversal, got: {other}"),
        }
    }

    #[test]
    fn path_traversal_mid_path_blocked() {
        let sandbox = SandboxRoot::new("apis");
        assert!(sandbox.resolve("ixia/../../secret.txt").is_err());
    }

    #[test]
    fn backslashes_are_treated_as_separators() {
        let sandbox = SandboxRoot::new("apis");
        assert!(sandbox.resolve("..\\..\\etc\\passwd").is_err());
    }

    #[test]
    fn empty_path_refused() {
        let sandbox = SandboxRoot::new("apis");
        assert!(matches!(sandbox.resolve("  "), Err(PathValidationError::Empty)));
        assert!(matches!(sandbox.resolve("."), Err(PathValidationError::Empty)));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escape_blocked() {
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "s3cret").unwrap();

        let root = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), root.path().join("link")).unwrap();

        let sandbox = SandboxRoot::new(root.path());
        match sandbox.resolve("link/secret.txt").unwrap_err() {
            PathValidationError::OutsideRoot { .. } => {}
            other => panic!("Expected OutsideRoot, got: {other}"),
        }
    }

    #[test]
    fn existing_file_inside_root_allowed() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("a.py"), "x = 1").unwrap();
        let sandbox = SandboxRoot::new(root.path());
        assert_eq!(sandbox.resolve("a.py").unwrap(), root.path().join("a.py"));
    }
}
