//! Descriptor suggestion and report rendering
//!
//! Pure helpers used by the analyzer and test-review flows. Nothing here
//! talks to a provider.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use vibeforge_experts::registry::EXPERT_TEST;
use vibeforge_experts::{Category, Complexity, ExpertResult, GeneratedFile, ProjectDescriptor};
use vibeforge_utils::VibeError;

/// Extensions collected as review context
pub const REVIEWED_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "jsx", "tsx", "html", "css", "sql", "json", "yml", "yaml", "md", "rs", "toml",
];

/// Characters kept per reviewed file
pub const REVIEW_TRUNCATE_CHARS: usize = 1000;

const TRUNCATION_MARKER: &str = "\n... (file truncated)";

/// Project name derived from the first three words of a request.
#[must_use]
pub fn suggested_name(request: &str) -> String {
    let words: Vec<String> = request
        .split_whitespace()
        .map(|w| w.replace([',', '.'], "").to_lowercase())
        .filter(|w| !w.is_empty())
        .take(3)
        .collect();
    if words.is_empty() {
        "project".to_string()
    } else {
        words.join("_")
    }
}

/// Descriptor proposed by the analyzer for a free-text request.
#[must_use]
pub fn suggest_descriptor(
    request: &str,
    name: Option<&str>,
    result: &ExpertResult,
) -> ProjectDescriptor {
    let mentions = |items: &[String], needles: &[&str]| {
        items.iter().any(|item| {
            let item = item.to_lowercase();
            needles.iter().any(|n| item.contains(n))
        })
    };

    let tech_stack = if result.dependencies.is_empty() {
        vec!["Web Application".to_string()]
    } else {
        result.dependencies.clone()
    };
    let features = if result.recommendations.is_empty() {
        vec!["Core Features".to_string()]
    } else {
        result.recommendations.clone()
    };

    ProjectDescriptor {
        name: name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map_or_else(|| suggested_name(request), str::to_string),
        description: request.trim().to_string(),
        category: Category::Web,
        needs_database: mentions(&result.dependencies, &["database", "sql"]),
        needs_auth: mentions(&result.recommendations, &["auth", "login"]),
        needs_api: mentions(&result.dependencies, &["api"]),
        tech_stack,
        features,
        target_audience: "General users".to_string(),
        complexity: Complexity::Medium,
    }
}

fn bullet_list(out: &mut String, items: &[String]) {
    for item in items {
        let _ = writeln!(out, "- {item}");
    }
}

/// `analysis_report.md` written next to the analyzer's files.
#[must_use]
pub fn analysis_report_markdown(project: &str, request: &str, result: &ExpertResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Project Analysis - {project}\n");
    let _ = writeln!(out, "## Request\n{request}\n");
    let _ = writeln!(out, "## Analysis\n{}\n", result.analysis);
    out.push_str("## Selected Technologies\n");
    bullet_list(&mut out, &result.dependencies);
    out.push_str("\n## Implementation Plan\n");
    bullet_list(&mut out, &result.next_steps);
    out
}

/// README stand-in for an analyzer reply that declared no files.
#[must_use]
pub fn analyzer_readme(project: &str, request: &str, result: &ExpertResult) -> GeneratedFile {
    let mut content = String::new();
    let _ = writeln!(content, "# {project}\n");
    let _ = writeln!(content, "## Description\n{request}\n");
    let _ = writeln!(content, "## Analysis\n{}\n", result.analysis);
    content.push_str("## Technologies\n");
    bullet_list(&mut content, &result.dependencies);
    content.push_str("\n## Next Steps\n");
    bullet_list(&mut content, &result.next_steps);

    GeneratedFile {
        path: "README.md".to_string(),
        content,
        file_type: "markdown".to_string(),
        description: "Project overview".to_string(),
    }
}

/// `test_analysis_report.md` written by the test expert.
#[must_use]
pub fn test_report_markdown(project: &str, result: &ExpertResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Test Analysis Report - {project}\n");
    let _ = writeln!(out, "## Analysis\n{}\n", result.analysis);
    out.push_str("## Recommendations\n");
    bullet_list(&mut out, &result.recommendations);
    out.push_str("\n## Next Steps\n");
    bullet_list(&mut out, &result.next_steps);
    out
}

fn is_reviewed(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| REVIEWED_EXTENSIONS.contains(&ext))
}

fn collect_files(dir: &Path, out: &mut Vec<std::path::PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_files(&entry.path(), out)?;
        } else if file_type.is_file() && is_reviewed(&entry.path()) {
            out.push(entry.path());
        }
    }
    Ok(())
}

fn truncate_chars(content: &str, limit: usize) -> String {
    match content.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &content[..cut]),
        None => content.to_string(),
    }
}

/// Existing expert output of a project, rendered as review context.
///
/// Walks every expert directory except `test`, in sorted order. Files at
/// the project root (the JSON records) are never included. Unreadable or
/// non-UTF-8 files are listed without content.
pub fn collect_existing_code(project_dir: &Path) -> Result<String, VibeError> {
    let mut expert_dirs: Vec<_> = fs::read_dir(project_dir)?
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
        .filter(|e| e.file_name() != EXPERT_TEST)
        .map(|e| e.path())
        .collect();
    expert_dirs.sort();

    let mut out = String::from("EXISTING PROJECT FILES:\n");
    for dir in expert_dirs {
        let mut files = Vec::new();
        collect_files(&dir, &mut files)?;
        if files.is_empty() {
            continue;
        }
        files.sort();

        let label = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let _ = writeln!(out, "\n[{label}]");
        for file in files {
            let rel = file
                .strip_prefix(project_dir)
                .unwrap_or(&file)
                .to_string_lossy()
                .replace('\\', "/");
            match fs::read_to_string(&file) {
                Ok(content) => {
                    let body = truncate_chars(&content, REVIEW_TRUNCATE_CHARS);
                    let _ = writeln!(out, "\n--- {rel} ---\n```\n{body}\n```");
                }
                Err(_) => {
                    let _ = writeln!(out, "\n--- {rel} --- (unreadable)");
                }
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn reply(dependencies: &[&str], recommendations: &[&str]) -> ExpertResult {
        ExpertResult {
            expert: "analyzer".to_string(),
            analysis: "A small storefront".to_string(),
            recommendations: recommendations.iter().map(|s| (*s).to_string()).collect(),
            files: vec![],
            dependencies: dependencies.iter().map(|s| (*s).to_string()).collect(),
            next_steps: vec!["Build the catalog".to_string()],
        }
    }

    #[test]
    fn test_suggested_name_uses_first_three_words() {
        assert_eq!(suggested_name("Online Shop, with cart. and more"), "online_shop_with");
        assert_eq!(suggested_name("Blog"), "blog");
        assert_eq!(suggested_name("  "), "project");
    }

    #[test]
    fn test_descriptor_heuristics() {
        let d = suggest_descriptor(
            "an online shop",
            None,
            &reply(&["PostgreSQL database", "REST API"], &["Add login page"]),
        );
        assert_eq!(d.name, "an_online_shop");
        assert_eq!(d.category, Category::Web);
        assert!(d.needs_database);
        assert!(d.needs_auth);
        assert!(d.needs_api);
        assert_eq!(d.complexity, Complexity::Medium);
        assert_eq!(d.target_audience, "General users");
    }

    #[test]
    fn test_descriptor_fallbacks() {
        let d = suggest_descriptor("a landing page", Some("landing"), &reply(&[], &[]));
        assert_eq!(d.name, "landing");
        assert_eq!(d.tech_stack, vec!["Web Application"]);
        assert_eq!(d.features, vec!["Core Features"]);
        assert!(!d.needs_database && !d.needs_auth && !d.needs_api);
    }

    #[test]
    fn test_reports_contain_sections() {
        let r = reply(&["flask"], &["Write unit tests"]);
        let analysis = analysis_report_markdown("shop", "an online shop", &r);
        assert!(analysis.starts_with("# Project Analysis - shop"));
        assert!(analysis.contains("- flask"));
        assert!(analysis.contains("## Implementation Plan\n- Build the catalog"));

        let test = test_report_markdown("shop", &r);
        assert!(test.contains("## Recommendations\n- Write unit tests"));

        let readme = analyzer_readme("shop", "an online shop", &r);
        assert_eq!(readme.path, "README.md");
        assert!(readme.content.contains("## Technologies\n- flask"));
    }

    #[test]
    fn test_collect_existing_code_filters_and_truncates() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("backend/src")).unwrap();
        fs::create_dir_all(root.join("test")).unwrap();
        fs::write(root.join("backend/src/app.py"), "print('hi')").unwrap();
        fs::write(root.join("backend/logo.png"), "binary").unwrap();
        fs::write(root.join("backend/big.js"), "x".repeat(1500)).unwrap();
        fs::write(root.join("test/test_app.py"), "assert True").unwrap();
        fs::write(root.join("project_config.json"), "{}").unwrap();

        let code = collect_existing_code(root).unwrap();
        assert!(code.contains("--- backend/src/app.py ---"));
        assert!(code.contains("print('hi')"));
        assert!(!code.contains("logo.png"));
        assert!(!code.contains("test_app.py"));
        assert!(!code.contains("project_config.json"));
        assert!(code.contains(TRUNCATION_MARKER));
        assert!(!code.contains(&"x".repeat(1001)));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "é".repeat(5);
        assert_eq!(truncate_chars(&text, 10), text);
        assert!(truncate_chars(&text, 2).starts_with("éé\n"));
    }
}
