//! Project records on disk
//!
//! Each project is one directory under the projects root holding
//! `project_config.json` (the descriptor) and `project_summary.json` (the
//! manifest), next to one subdirectory per consulted expert.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use vibeforge_experts::{ExpertResult, ProjectDescriptor};
use vibeforge_utils::atomic_write::write_text_atomic;
use vibeforge_utils::project_name::sanitize_project_name;
use vibeforge_utils::{ProviderError, VibeError};

use crate::consultation::{ConsultationFailure, FailureKind};

/// Serialized [`ProjectDescriptor`]
pub const DESCRIPTOR_FILE: &str = "project_config.json";

/// Serialized [`ProjectManifest`]
pub const MANIFEST_FILE: &str = "project_summary.json";

/// Latest recorded outcome for one expert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ManifestEntry {
    Success {
        result: ExpertResult,
        /// Paths relative to the expert's directory
        files_written: Vec<String>,
        bytes_written: u64,
        consulted_at: DateTime<Utc>,
    },
    Failure {
        kind: FailureKind,
        reason: String,
        #[serde(default)]
        last_provider_error: Option<ProviderError>,
        consulted_at: DateTime<Utc>,
    },
}

impl ManifestEntry {
    #[must_use]
    pub fn success(
        result: ExpertResult,
        files_written: Vec<String>,
        bytes_written: u64,
        consulted_at: DateTime<Utc>,
    ) -> Self {
        Self::Success {
            result,
            files_written,
            bytes_written,
            consulted_at,
        }
    }

    #[must_use]
    pub fn failure(failure: ConsultationFailure, consulted_at: DateTime<Utc>) -> Self {
        Self::Failure {
            kind: failure.kind,
            reason: failure.reason,
            last_provider_error: failure.last_provider_error,
            consulted_at,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    #[must_use]
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }

    #[must_use]
    pub fn consulted_at(&self) -> DateTime<Utc> {
        match self {
            Self::Success { consulted_at, .. } | Self::Failure { consulted_at, .. } => {
                *consulted_at
            }
        }
    }
}

/// Aggregate record of every expert consulted for a project
///
/// Carries its own copy of the descriptor so the summary reads on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectManifest {
    pub project: ProjectDescriptor,
    #[serde(default)]
    pub experts: BTreeMap<String, ManifestEntry>,
    pub generated_at: DateTime<Utc>,
}

impl ProjectManifest {
    #[must_use]
    pub fn new(project: &ProjectDescriptor) -> Self {
        Self {
            project: project.clone(),
            experts: BTreeMap::new(),
            generated_at: Utc::now(),
        }
    }

    /// Replace the entry for `expert`, leaving other experts untouched.
    pub fn record(&mut self, expert: impl Into<String>, entry: ManifestEntry) {
        self.experts.insert(expert.into(), entry);
        self.generated_at = Utc::now();
    }

    #[must_use]
    pub fn entry(&self, expert: &str) -> Option<&ManifestEntry> {
        self.experts.get(expert)
    }

    /// Experts whose latest entry is a failure, sorted by key
    #[must_use]
    pub fn failed_experts(&self) -> Vec<&str> {
        self.experts
            .iter()
            .filter(|(_, entry)| !entry.is_success())
            .map(|(key, _)| key.as_str())
            .collect()
    }
}

/// Filesystem store rooted at the projects directory
#[derive(Debug, Clone)]
pub struct ProjectStore {
    root: PathBuf,
}

impl ProjectStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for a project, named after its sanitized name.
    pub fn project_dir(&self, name: &str) -> Result<PathBuf, VibeError> {
        Ok(self.root.join(sanitize_project_name(name)?))
    }

    /// Names of stored projects, sorted.
    ///
    /// A missing root is an empty store. Directories without a descriptor
    /// are not projects.
    pub fn list_projects(&self) -> Result<Vec<String>, VibeError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() || !entry.path().join(DESCRIPTOR_FILE).is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn load_descriptor(&self, name: &str) -> Result<ProjectDescriptor, VibeError> {
        let path = self.project_dir(name)?.join(DESCRIPTOR_FILE);
        if !path.is_file() {
            return Err(VibeError::ProjectNotFound {
                name: name.to_string(),
                root: self.root.display().to_string(),
            });
        }
        read_json(&path)
    }

    /// Write the descriptor, creating the project directory.
    pub fn save_descriptor(&self, descriptor: &ProjectDescriptor) -> Result<PathBuf, VibeError> {
        let dir = self.project_dir(&descriptor.name)?;
        fs::create_dir_all(&dir)?;
        let path = dir.join(DESCRIPTOR_FILE);
        write_json(&path, descriptor)?;
        Ok(path)
    }

    /// Stored manifest, or `None` when the project has none yet.
    pub fn load_manifest(&self, name: &str) -> Result<Option<ProjectManifest>, VibeError> {
        let path = self.project_dir(name)?.join(MANIFEST_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        read_json(&path).map(Some)
    }

    pub fn save_manifest(&self, manifest: &ProjectManifest) -> Result<PathBuf, VibeError> {
        let dir = self.project_dir(&manifest.project.name)?;
        fs::create_dir_all(&dir)?;
        let path = dir.join(MANIFEST_FILE);
        write_json(&path, manifest)?;
        Ok(path)
    }

    /// Record one expert's entry in the stored manifest, refreshing its
    /// copy of the descriptor.
    pub fn record_outcome(
        &self,
        project: &ProjectDescriptor,
        expert: &str,
        entry: ManifestEntry,
    ) -> Result<ProjectManifest, VibeError> {
        let mut manifest = match self.load_manifest(&project.name)? {
            Some(mut manifest) => {
                manifest.project = project.clone();
                manifest
            }
            None => ProjectManifest::new(project),
        };
        manifest.record(expert, entry);
        self.save_manifest(&manifest)?;
        Ok(manifest)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, VibeError> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| VibeError::CorruptRecord {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), VibeError> {
    let mut body = serde_json::to_string_pretty(value).map_err(anyhow::Error::from)?;
    body.push('\n');
    write_text_atomic(path, &body)?;
    Ok(())
}
