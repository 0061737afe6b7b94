//! Sandboxed path resolution
//!
//! Generated file paths come from model replies and are untrusted. Every write
//! goes through a [`SandboxRoot`] so that a path can only ever resolve to a
//! descendant of the directory it was scoped to.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

// ============================================================================
// Sandbox Error Types
// ============================================================================

/// Errors that can occur during path sandbox operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SandboxError {
    /// The sandbox root path does not exist
    #[error("Sandbox root does not exist: {path}")]
    RootNotFound { path: String },

    /// The sandbox root path is not a directory
    #[error("Sandbox root is not a directory: {path}")]
    RootNotDirectory { path: String },

    /// Failed to canonicalize the sandbox root path
    #[error("Failed to canonicalize sandbox root '{path}': {reason}")]
    RootCanonicalizationFailed { path: String, reason: String },

    /// Path is empty or only `.` components
    #[error("Path is empty")]
    EmptyPath,

    /// Path contains ".." traversal components
    #[error("Path contains parent directory traversal: {path}")]
    ParentTraversal { path: String },

    /// Path is absolute (or carries a drive/UNC prefix)
    #[error("Absolute path not allowed: {path}")]
    AbsolutePath { path: String },

    /// Path resolves outside the sandbox root
    #[error("Path escapes sandbox root: {path} resolves outside {root}")]
    EscapeAttempt { path: String, root: String },

    /// Path is or contains a symlink (when symlinks are not allowed)
    #[error("Symlink not allowed: {path}")]
    SymlinkNotAllowed { path: String },

    /// Failed to canonicalize the joined path
    #[error("Failed to canonicalize path '{path}': {reason}")]
    PathCanonicalizationFailed { path: String, reason: String },
}

impl SandboxError {
    /// Whether the error was caused by the requested path itself rather than
    /// by the state of the root directory.
    #[must_use]
    pub fn is_traversal(&self) -> bool {
        matches!(
            self,
            Self::ParentTraversal { .. }
                | Self::AbsolutePath { .. }
                | Self::EscapeAttempt { .. }
                | Self::SymlinkNotAllowed { .. }
        )
    }
}

/// Configuration for sandbox path validation behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SandboxConfig {
    /// Whether to allow symlinks inside the sandbox
    pub allow_symlinks: bool,
}

impl SandboxConfig {
    /// Create a permissive config that allows symlinks
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            allow_symlinks: true,
        }
    }
}

/// Lexical check for a relative path: not absolute, no prefix, not empty, and
/// never climbing above its root.
///
/// `..` is resolved against the preceding components, so `src/../main.rs`
/// passes while `src/../../main.rs` does not. This does not touch the
/// filesystem and is used both for reply validation and as the first stage
/// of [`SandboxRoot::join`].
pub fn check_relative(rel: &Path) -> Result<(), SandboxError> {
    let display = rel.display().to_string();

    if rel.is_absolute() || rel.has_root() {
        return Err(SandboxError::AbsolutePath { path: display });
    }

    let mut depth = 0usize;
    for component in rel.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                return Err(SandboxError::AbsolutePath { path: display });
            }
            Component::ParentDir => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| SandboxError::ParentTraversal {
                        path: display.clone(),
                    })?;
            }
            Component::CurDir => {}
            Component::Normal(_) => depth += 1,
        }
    }

    // Backslash separators are not components on Unix, but a reply written
    // for Windows can still smuggle a traversal through them.
    if display.contains('\\') && display.split('\\').any(|segment| segment == "..") {
        return Err(SandboxError::ParentTraversal { path: display });
    }

    if depth == 0 {
        return Err(SandboxError::EmptyPath);
    }

    Ok(())
}

/// Lexically normalized form of a relative path: `.` components dropped,
/// `..` folded into its parent, separators unified to `/`. Two paths that
/// name the same file normalize equal.
#[must_use]
pub fn normalize_relative(rel: &Path) -> String {
    let mut parts: Vec<String> = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::ParentDir => {
                parts.pop();
            }
            _ => {}
        }
    }
    parts.join("/")
}

// ============================================================================
// SandboxRoot - Validated root directory for sandboxed operations
// ============================================================================

/// A validated root directory for sandboxed operations.
///
/// `SandboxRoot` canonicalizes the root path at construction time and
/// validates all joined paths to prevent directory traversal.
///
/// # Example
///
/// ```rust,no_run
/// use vibeforge_utils::paths::{SandboxRoot, SandboxConfig};
///
/// let root = SandboxRoot::new("/tmp/demo/backend", SandboxConfig::default())?;
/// let file = root.join("src/main.rs")?;
/// println!("Safe path: {}", file.as_path().display());
/// # Ok::<(), vibeforge_utils::paths::SandboxError>(())
/// ```
#[derive(Debug, Clone)]
pub struct SandboxRoot {
    /// Canonicalized absolute path to the root
    root: PathBuf,
    config: SandboxConfig,
}

impl SandboxRoot {
    /// Create a new sandbox root from an existing directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the path does not exist, is not a directory, or
    /// cannot be canonicalized.
    pub fn new(root: impl AsRef<Path>, config: SandboxConfig) -> Result<Self, SandboxError> {
        let root_path = root.as_ref();

        if !root_path.exists() {
            return Err(SandboxError::RootNotFound {
                path: root_path.display().to_string(),
            });
        }

        if !root_path.is_dir() {
            return Err(SandboxError::RootNotDirectory {
                path: root_path.display().to_string(),
            });
        }

        let canonical =
            root_path
                .canonicalize()
                .map_err(|e| SandboxError::RootCanonicalizationFailed {
                    path: root_path.display().to_string(),
                    reason: e.to_string(),
                })?;

        Ok(Self {
            root: canonical,
            config,
        })
    }

    /// Create a sandbox root with default (restrictive) configuration.
    pub fn new_default(root: impl AsRef<Path>) -> Result<Self, SandboxError> {
        Self::new(root, SandboxConfig::default())
    }

    /// Join a relative path, validating it stays within the sandbox.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The path is absolute or empty
    /// - A `..` component climbs above the root
    /// - The resolved path escapes the sandbox root
    /// - The path is or contains a symlink (when symlinks are not allowed)
    pub fn join(&self, rel: impl AsRef<Path>) -> Result<SandboxPath, SandboxError> {
        let rel_path = rel.as_ref();
        check_relative(rel_path)?;
        let resolved = PathBuf::from(normalize_relative(rel_path));
        let rel_path = resolved.as_path();

        let full_path = self.root.join(rel_path);

        if !self.config.allow_symlinks {
            self.check_symlinks_below_root(rel_path)?;
        }

        if full_path.exists() {
            let canonical =
                full_path
                    .canonicalize()
                    .map_err(|e| SandboxError::PathCanonicalizationFailed {
                        path: full_path.display().to_string(),
                        reason: e.to_string(),
                    })?;

            if !canonical.starts_with(&self.root) {
                return Err(SandboxError::EscapeAttempt {
                    path: rel_path.display().to_string(),
                    root: self.root.display().to_string(),
                });
            }

            Ok(SandboxPath {
                full: canonical,
                rel: rel_path.to_path_buf(),
            })
        } else {
            // The nearest existing ancestor must also stay inside the root,
            // otherwise a symlinked directory could redirect the write.
            self.validate_ancestor_within_sandbox(&full_path, rel_path)?;

            Ok(SandboxPath {
                full: full_path,
                rel: rel_path.to_path_buf(),
            })
        }
    }

    /// Check each existing component under the root for symlinks.
    fn check_symlinks_below_root(&self, rel: &Path) -> Result<(), SandboxError> {
        let mut current = self.root.clone();

        for component in rel.components() {
            if let Component::Normal(part) = component {
                current.push(part);
                let is_symlink = current
                    .symlink_metadata()
                    .map(|m| m.file_type().is_symlink())
                    .unwrap_or(false);
                if is_symlink {
                    return Err(SandboxError::SymlinkNotAllowed {
                        path: current.display().to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    fn validate_ancestor_within_sandbox(
        &self,
        full_path: &Path,
        rel_path: &Path,
    ) -> Result<(), SandboxError> {
        let mut ancestor = full_path.to_path_buf();
        while !ancestor.exists() {
            if !ancestor.pop() {
                return Ok(());
            }
        }

        let canonical_ancestor =
            ancestor
                .canonicalize()
                .map_err(|e| SandboxError::PathCanonicalizationFailed {
                    path: ancestor.display().to_string(),
                    reason: e.to_string(),
                })?;

        if !canonical_ancestor.starts_with(&self.root) {
            return Err(SandboxError::EscapeAttempt {
                path: rel_path.display().to_string(),
                root: self.root.display().to_string(),
            });
        }

        Ok(())
    }

    /// Get the canonicalized root path.
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.root
    }
}

/// A path that has been validated to be within a `SandboxRoot`.
///
/// Cannot be constructed directly; must come from [`SandboxRoot::join()`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxPath {
    full: PathBuf,
    rel: PathBuf,
}

impl SandboxPath {
    /// Full path for I/O operations.
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.full
    }

    /// Path relative to the sandbox root, as requested.
    #[must_use]
    pub fn relative(&self) -> &Path {
        &self.rel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_join_plain_relative_path() {
        let temp = TempDir::new().unwrap();
        let root = SandboxRoot::new_default(temp.path()).unwrap();

        let path = root.join("src/main.rs").unwrap();
        assert!(path.as_path().starts_with(root.as_path()));
        assert_eq!(path.relative(), Path::new("src/main.rs"));
    }

    #[test]
    fn test_rejects_parent_traversal() {
        let temp = TempDir::new().unwrap();
        let root = SandboxRoot::new_default(temp.path()).unwrap();

        let err = root.join("../escape.txt").unwrap_err();
        assert!(matches!(err, SandboxError::ParentTraversal { .. }));
        assert!(err.is_traversal());

        let err = root.join("a/../../b").unwrap_err();
        assert!(matches!(err, SandboxError::ParentTraversal { .. }));
    }

    #[test]
    fn test_parent_dir_inside_root_resolves() {
        let temp = TempDir::new().unwrap();
        let root = SandboxRoot::new_default(temp.path()).unwrap();

        let path = root.join("src/../main.ext").unwrap();
        assert_eq!(path.relative(), Path::new("main.ext"));
        assert_eq!(path.as_path(), root.as_path().join("main.ext"));

        assert_eq!(check_relative(Path::new("src/..")), Err(SandboxError::EmptyPath));
    }

    #[test]
    fn test_rejects_absolute_path() {
        let temp = TempDir::new().unwrap();
        let root = SandboxRoot::new_default(temp.path()).unwrap();

        let err = root.join("/etc/passwd").unwrap_err();
        assert!(matches!(err, SandboxError::AbsolutePath { .. }));
    }

    #[test]
    fn test_rejects_backslash_traversal() {
        assert!(matches!(
            check_relative(Path::new("..\\..\\evil.txt")),
            Err(SandboxError::ParentTraversal { .. })
        ));
    }

    #[test]
    fn test_rejects_empty_path() {
        assert_eq!(check_relative(Path::new("")), Err(SandboxError::EmptyPath));
        assert_eq!(check_relative(Path::new("./")), Err(SandboxError::EmptyPath));
    }

    #[test]
    fn test_root_must_exist() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope");
        assert!(matches!(
            SandboxRoot::new_default(&missing),
            Err(SandboxError::RootNotFound { .. })
        ));
    }

    #[test]
    fn test_normalize_relative_collapses_cur_dir() {
        assert_eq!(normalize_relative(Path::new("./src/./main.rs")), "src/main.rs");
        assert_eq!(normalize_relative(Path::new("src/lib/../main.rs")), "src/main.rs");
        assert_eq!(normalize_relative(Path::new("src/main.rs")), "src/main.rs");
    }

    #[cfg(unix)]
    #[test]
    fn test_rejects_symlinked_directory() {
        let temp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), temp.path().join("link")).unwrap();

        let root = SandboxRoot::new_default(temp.path()).unwrap();
        let err = root.join("link/file.txt").unwrap_err();
        assert!(matches!(err, SandboxError::SymlinkNotAllowed { .. }));

        let permissive = SandboxRoot::new(temp.path(), SandboxConfig::permissive()).unwrap();
        let err = permissive.join("link/file.txt").unwrap_err();
        assert!(matches!(err, SandboxError::EscapeAttempt { .. }));
    }
}
