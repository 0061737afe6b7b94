//! Project name sanitization
//!
//! Project names become directory names under the projects root, so they are
//! reduced to a portable character set before any path is built from them.

use crate::error::{ErrorCategory, UserFriendlyError};
use unicode_normalization::UnicodeNormalization;

/// Error type for project name validation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProjectNameError {
    #[error("Project name is empty")]
    Empty,

    #[error("Project name '{0}' contains no usable characters")]
    OnlyInvalidCharacters(String),

    #[error("Project name '{0}' is reserved")]
    Reserved(String),
}

impl UserFriendlyError for ProjectNameError {
    fn user_message(&self) -> String {
        match self {
            Self::Empty => "The project name is empty".to_string(),
            Self::OnlyInvalidCharacters(raw) => {
                format!("The project name '{raw}' has no letters, digits, dots or dashes")
            }
            Self::Reserved(raw) => format!("'{raw}' cannot be used as a project name"),
        }
    }

    fn context(&self) -> Option<String> {
        Some("Project names are used as directory names. Only ASCII letters, digits, '.', '-' and '_' are kept; other characters become '_'.".to_string())
    }

    fn suggestions(&self) -> Vec<String> {
        vec![
            "Provide a name such as todo-api, shop_v2 or portfolio".to_string(),
            "Avoid names made only of punctuation or whitespace".to_string(),
        ]
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Validation
    }
}

/// Sanitize a project name for filesystem use.
///
/// - Normalizes Unicode with NFKC
/// - Keeps `[A-Za-z0-9._-]`, replaces everything else with `_`
/// - Trims leading/trailing `_` and `.` introduced by replacement
/// - Rejects empty results and the reserved names `.` and `..`
pub fn sanitize_project_name(raw: &str) -> Result<String, ProjectNameError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ProjectNameError::Empty);
    }
    if trimmed == "." || trimmed == ".." {
        return Err(ProjectNameError::Reserved(trimmed.to_string()));
    }

    let sanitized: String = trimmed
        .nfkc()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let sanitized = sanitized.trim_matches(|c| c == '_' || c == '.').to_string();

    if sanitized.is_empty() || !sanitized.chars().any(|c| c.is_ascii_alphanumeric()) {
        return Err(ProjectNameError::OnlyInvalidCharacters(trimmed.to_string()));
    }

    if sanitized != trimmed {
        tracing::warn!(original = %trimmed, sanitized = %sanitized, "Project name was sanitized");
    }

    Ok(sanitized)
}
