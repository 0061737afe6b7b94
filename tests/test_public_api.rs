//! Public API boundary tests
//!
//! Uses only items re-exported from the crate root. If one of these stops
//! compiling, the stable surface changed.

use vibeforge::{
    Category, CliArgs, Complexity, Config, ConfigSource, ErrorCategory, ExitCode, ExpertRegistry,
    ExpertResult, FailureKind, GeneratedFile, Materializer, PassState,
    ProjectDescriptor, ProjectManifest, ProjectStore, UserFriendlyError, VibeError,
    select_experts,
};

fn descriptor(category: Category) -> ProjectDescriptor {
    ProjectDescriptor {
        name: "shop".to_string(),
        description: "An online shop".to_string(),
        category,
        tech_stack: vec![],
        features: vec![],
        target_audience: String::new(),
        complexity: Complexity::Simple,
        needs_database: false,
        needs_auth: false,
        needs_api: false,
    }
}

#[test]
fn test_builtin_registry_has_catalog_experts() {
    let registry = ExpertRegistry::builtin();
    for key in ["frontend", "backend", "database", "ux", "devops", "mobile", "test"] {
        assert!(registry.contains(key), "missing expert {key}");
    }
}

#[test]
fn test_selection_is_available_from_root() {
    assert_eq!(
        select_experts(&descriptor(Category::Web)),
        vec!["frontend", "backend", "ux", "devops", "test"]
    );
    assert_eq!(
        select_experts(&descriptor(Category::Mobile)),
        vec!["mobile", "ux", "devops", "test"]
    );
}

#[test]
fn test_config_builder_defaults() {
    let config = Config::builder().build().unwrap();
    assert_eq!(config.max_parallel_experts(), 1);
    assert_eq!(config.pass_timeout(), None);
    assert_eq!(CliArgs::default().llm_provider, None);
    assert_ne!(ConfigSource::Cli, ConfigSource::Default);
}

#[test]
fn test_result_types_construct() {
    let result = ExpertResult {
        expert: "backend".to_string(),
        analysis: "fine".to_string(),
        recommendations: vec![],
        files: vec![GeneratedFile {
            path: "src/main.py".to_string(),
            content: "print()".to_string(),
            file_type: "python".to_string(),
            description: String::new(),
        }],
        dependencies: vec!["flask".to_string()],
        next_steps: vec![],
    };
    assert!(result.validate().is_ok());

    let manifest = ProjectManifest::new(&descriptor(Category::Web));
    assert_eq!(manifest.project.name, "shop");
    assert!(manifest.entry("backend").is_none());
    assert!(manifest.failed_experts().is_empty());
    assert_eq!(FailureKind::PathTraversal.to_string(), "path_traversal");
}

#[test]
fn test_error_surface_maps_to_exit_codes() {
    let err = VibeError::Cancelled;
    assert_eq!(err.to_exit_code(), ExitCode::CANCELLED);
    assert!(!err.user_message().is_empty());
    let _: ErrorCategory = err.category();
}

#[test]
fn test_store_and_materializer_are_constructible() {
    let temp = tempfile::TempDir::new().unwrap();
    let store = ProjectStore::new(temp.path());
    assert!(store.list_projects().unwrap().is_empty());
    assert_eq!(Materializer::default().dependency_manifest(), "requirements.txt");
    assert_ne!(PassState::Selecting, PassState::Done);
}
