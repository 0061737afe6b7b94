//! Writing an expert result to disk
//!
//! Every file lands under `project_root/<expert>/`. Paths are resolved
//! through a [`SandboxRoot`] scoped to that directory, so a reply can never
//! write into a sibling expert's directory or outside the project.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use vibeforge_experts::ExpertResult;
use vibeforge_utils::VibeError;
use vibeforge_utils::atomic_write::write_text_atomic;
use vibeforge_utils::paths::{SandboxRoot, check_relative, normalize_relative};

/// Why one declared file was not written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    PathTraversal,
    WriteFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedFile {
    pub path: String,
    pub kind: RejectionKind,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    /// Path relative to the expert directory, as declared
    pub path: String,
    pub bytes: u64,
}

/// What one materialization did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
    pub expert: String,
    pub expert_dir: PathBuf,
    pub written: Vec<WrittenFile>,
    pub rejected: Vec<RejectedFile>,
    /// Bytes written, dependency manifest included
    pub bytes_written: u64,
    /// File name of the dependency manifest, when one was written
    pub dependency_manifest: Option<String>,
}

impl WriteReport {
    #[must_use]
    pub fn has_traversal(&self) -> bool {
        self.rejected
            .iter()
            .any(|r| r.kind == RejectionKind::PathTraversal)
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }

    /// Relative paths written, dependency manifest last
    #[must_use]
    pub fn written_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.written.iter().map(|w| w.path.clone()).collect();
        if let Some(manifest) = &self.dependency_manifest
            && !paths.contains(manifest)
        {
            paths.push(manifest.clone());
        }
        paths
    }
}

#[derive(Debug, Clone)]
pub struct Materializer {
    dependency_manifest: String,
}

impl Default for Materializer {
    fn default() -> Self {
        Self::new(vibeforge_config::DEFAULT_DEPENDENCY_MANIFEST)
    }
}

impl Materializer {
    #[must_use]
    pub fn new(dependency_manifest: impl Into<String>) -> Self {
        Self {
            dependency_manifest: dependency_manifest.into(),
        }
    }

    #[must_use]
    pub fn dependency_manifest(&self) -> &str {
        &self.dependency_manifest
    }

    /// Directory of `expert_key` inside `project_root`, created if missing.
    ///
    /// # Errors
    ///
    /// `VibeError::Sandbox` when the key is not a single plain path segment,
    /// `VibeError::Io` when the directory cannot be created.
    pub fn expert_root(&self, project_root: &Path, expert_key: &str) -> Result<SandboxRoot, VibeError> {
        check_relative(Path::new(expert_key))?;
        if expert_key.contains(['/', '\\']) {
            return Err(VibeError::UnknownExpert {
                key: expert_key.to_string(),
            });
        }
        let dir = project_root.join(expert_key);
        fs::create_dir_all(&dir)?;
        Ok(SandboxRoot::new_default(&dir)?)
    }

    /// Write every declared file, then the dependency manifest.
    ///
    /// Individual file failures are collected in the report; only failing to
    /// prepare the expert directory is an error.
    pub fn materialize(
        &self,
        project_root: &Path,
        expert_key: &str,
        result: &ExpertResult,
    ) -> Result<WriteReport, VibeError> {
        let root = self.expert_root(project_root, expert_key)?;
        let mut report = WriteReport {
            expert: expert_key.to_string(),
            expert_dir: root.as_path().to_path_buf(),
            written: Vec::new(),
            rejected: Vec::new(),
            bytes_written: 0,
            dependency_manifest: None,
        };

        let has_manifest = !result.dependencies.is_empty();
        for file in &result.files {
            if has_manifest
                && normalize_relative(Path::new(&file.path)) == self.dependency_manifest
            {
                warn!(
                    expert = expert_key,
                    file = %self.dependency_manifest,
                    "Declared file is replaced by the dependency manifest"
                );
                continue;
            }
            Self::write_one(&root, &file.path, &file.content, &mut report);
        }

        if has_manifest {
            let mut body = result.dependencies.join("\n");
            body.push('\n');
            let before = report.written.len();
            Self::write_one(&root, &self.dependency_manifest, &body, &mut report);
            if report.written.len() > before {
                report.written.pop();
                report.dependency_manifest = Some(self.dependency_manifest.clone());
            }
        }

        info!(
            expert = expert_key,
            files = report.written.len(),
            bytes = report.bytes_written,
            rejected = report.rejected.len(),
            "Materialized expert result"
        );

        Ok(report)
    }

    fn write_one(root: &SandboxRoot, rel: &str, content: &str, report: &mut WriteReport) {
        let target = match root.join(rel) {
            Ok(target) => target,
            Err(err) => {
                let kind = if err.is_traversal() {
                    RejectionKind::PathTraversal
                } else {
                    RejectionKind::WriteFailed
                };
                warn!(expert = %report.expert, path = rel, error = %err, "Rejected generated file");
                report.rejected.push(RejectedFile {
                    path: rel.to_string(),
                    kind,
                    reason: err.to_string(),
                });
                return;
            }
        };

        match write_text_atomic(target.as_path(), content) {
            Ok(written) => {
                report.bytes_written += written.bytes_written;
                report.written.push(WrittenFile {
                    path: rel.to_string(),
                    bytes: written.bytes_written,
                });
            }
            Err(err) => {
                warn!(expert = %report.expert, path = rel, error = %err, "Failed to write generated file");
                report.rejected.push(RejectedFile {
                    path: rel.to_string(),
                    kind: RejectionKind::WriteFailed,
                    reason: format!("{err:#}"),
                });
            }
        }
    }

    /// Write a Markdown report next to an expert's files.
    ///
    /// # Errors
    ///
    /// Fails if the expert directory cannot be prepared or the write fails.
    pub fn write_report(
        &self,
        project_root: &Path,
        expert_key: &str,
        file_name: &str,
        body: &str,
    ) -> Result<PathBuf, VibeError> {
        let root = self.expert_root(project_root, expert_key)?;
        let target = root.join(file_name)?;
        write_text_atomic(target.as_path(), body)?;
        Ok(target.as_path().to_path_buf())
    }
}
