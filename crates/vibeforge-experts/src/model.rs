//! Project descriptor and expert result types

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use vibeforge_utils::paths::{SandboxError, check_relative, normalize_relative};

/// Kind of project being built.
///
/// Parsing trims and ignores case, for CLI flags and stored JSON alike.
/// Values outside the known set are kept, lowercased, in `Other`; they
/// select no category-specific expert.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Category {
    Web,
    Api,
    Mobile,
    Desktop,
    Fullstack,
    Other(String),
}

impl Category {
    /// The known categories, in display order
    pub const KNOWN: [Category; 5] = [
        Category::Web,
        Category::Api,
        Category::Mobile,
        Category::Desktop,
        Category::Fullstack,
    ];

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Web => "web",
            Self::Api => "api",
            Self::Mobile => "mobile",
            Self::Desktop => "desktop",
            Self::Fullstack => "fullstack",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Ok(Self::KNOWN
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .unwrap_or(Self::Other(normalized)))
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let Ok(category) = raw.parse();
        Ok(category)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::VariantNames,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Complexity {
    Simple,
    #[default]
    Medium,
    Complex,
}

/// Immutable description of the project every expert works on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDescriptor {
    pub name: String,
    pub description: String,
    pub category: Category,
    #[serde(default)]
    pub tech_stack: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub target_audience: String,
    #[serde(default)]
    pub complexity: Complexity,
    #[serde(default)]
    pub needs_database: bool,
    #[serde(default)]
    pub needs_auth: bool,
    #[serde(default)]
    pub needs_api: bool,
}

/// One file declared by an expert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GeneratedFile {
    /// Path relative to the expert's directory, using `/` separators
    pub path: String,
    /// Full file content
    pub content: String,
    /// Short tag such as `python`, `config`, `markdown`
    #[serde(default)]
    pub file_type: String,
    /// What the file is for
    #[serde(default)]
    pub description: String,
}

/// Structured answer of one expert consultation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ExpertResult {
    /// Key of the expert that answered
    #[serde(alias = "expert_type")]
    pub expert: String,
    /// Free-text analysis of the project from this expert's angle
    pub analysis: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
    /// Files to create under the expert's directory
    #[serde(default, alias = "code_files")]
    pub files: Vec<GeneratedFile>,
    /// Packages the generated files depend on, one per entry
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub next_steps: Vec<String>,
}

/// Broken [`ExpertResult`] invariant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResultViolation {
    #[error("file #{index} has an empty path")]
    EmptyPath { index: usize },

    #[error("file path '{path}' is absolute")]
    AbsolutePath { path: String },

    #[error("file path '{path}' is declared more than once")]
    DuplicatePath { path: String },
}

impl ExpertResult {
    /// Check that every file path is relative and unique.
    ///
    /// Paths compare after lexical normalization, so `a/b.txt` and
    /// `./a//b.txt` collide. Paths that climb above the expert directory
    /// are left to the materializer, which rejects them per file.
    pub fn validate(&self) -> Result<(), ResultViolation> {
        let mut seen = HashSet::new();

        for (index, file) in self.files.iter().enumerate() {
            let path = Path::new(&file.path);
            match check_relative(path) {
                Err(SandboxError::EmptyPath) => {
                    return Err(ResultViolation::EmptyPath { index });
                }
                Err(SandboxError::AbsolutePath { .. }) => {
                    return Err(ResultViolation::AbsolutePath {
                        path: file.path.clone(),
                    });
                }
                Err(_) => continue,
                Ok(()) => {}
            }

            if !seen.insert(normalize_relative(path)) {
                return Err(ResultViolation::DuplicatePath {
                    path: file.path.clone(),
                });
            }
        }

        Ok(())
    }

    /// Total declared content size in bytes
    #[must_use]
    pub fn content_bytes(&self) -> usize {
        self.files.iter().map(|f| f.content.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str) -> GeneratedFile {
        GeneratedFile {
            path: path.to_string(),
            content: "X".to_string(),
            file_type: "text".to_string(),
            description: String::new(),
        }
    }

    fn result(paths: &[&str]) -> ExpertResult {
        ExpertResult {
            expert: "backend".to_string(),
            analysis: String::new(),
            recommendations: vec![],
            files: paths.iter().map(|p| file(p)).collect(),
            dependencies: vec![],
            next_steps: vec![],
        }
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!("Web".parse::<Category>().unwrap(), Category::Web);
        assert_eq!(" api ".parse::<Category>().unwrap(), Category::Api);
        assert_eq!(
            "game".parse::<Category>().unwrap(),
            Category::Other("game".to_string())
        );
    }

    #[test]
    fn test_category_serde_keeps_unknown_values() {
        let known: Category = serde_json::from_str("\"fullstack\"").unwrap();
        assert_eq!(known, Category::Fullstack);

        let unknown: Category = serde_json::from_str("\"embedded\"").unwrap();
        assert_eq!(unknown, Category::Other("embedded".to_string()));
        assert_eq!(serde_json::to_string(&unknown).unwrap(), "\"embedded\"");
    }

    #[test]
    fn test_category_deserialize_matches_parsing() {
        let web: Category = serde_json::from_str("\"Web\"").unwrap();
        assert_eq!(web, Category::Web);
        let api: Category = serde_json::from_str("\" API \"").unwrap();
        assert_eq!(api, Category::Api);

        let json = r#"{"name":"x","description":"d","category":"Web"}"#;
        let descriptor: ProjectDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(descriptor.category, Category::Web);
        let selected = crate::select_experts(&descriptor);
        assert!(selected.contains(&"frontend".to_string()));
        assert!(selected.contains(&"backend".to_string()));
    }

    #[test]
    fn test_complexity_forms() {
        assert_eq!("COMPLEX".parse::<Complexity>().unwrap(), Complexity::Complex);
        assert_eq!(Complexity::Simple.to_string(), "simple");
        assert_eq!(serde_json::to_string(&Complexity::Medium).unwrap(), "\"medium\"");
    }

    #[test]
    fn test_descriptor_defaults_optional_fields() {
        let json = r#"{"name":"demo","description":"d","category":"api"}"#;
        let descriptor: ProjectDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(descriptor.complexity, Complexity::Medium);
        assert!(descriptor.tech_stack.is_empty());
        assert!(!descriptor.needs_database);
    }

    #[test]
    fn test_validate_accepts_unique_relative_paths() {
        assert!(result(&["main.py", "src/app.py", "README.md"]).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicates_after_normalization() {
        let err = result(&["src/app.py", "./src//app.py"]).validate().unwrap_err();
        assert_eq!(
            err,
            ResultViolation::DuplicatePath {
                path: "./src//app.py".to_string()
            }
        );
    }

    #[test]
    fn test_validate_rejects_absolute_and_empty() {
        assert!(matches!(
            result(&["/etc/passwd"]).validate(),
            Err(ResultViolation::AbsolutePath { .. })
        ));
        assert_eq!(
            result(&["ok.txt", ""]).validate(),
            Err(ResultViolation::EmptyPath { index: 1 })
        );
    }

    #[test]
    fn test_validate_leaves_parent_segments_to_materializer() {
        assert!(result(&["../escape.txt", "main.ext"]).validate().is_ok());
    }

    #[test]
    fn test_result_accepts_legacy_field_names() {
        let json = r#"{
            "expert_type": "backend",
            "analysis": "ok",
            "code_files": [{"path": "main.py", "content": "print()"}]
        }"#;
        let parsed: ExpertResult = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.expert, "backend");
        assert_eq!(parsed.files.len(), 1);
        assert_eq!(parsed.files[0].file_type, "");
    }
}
