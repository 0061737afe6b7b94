//! Static catalog of expert roles
//!
//! Each role carries the persona text sent as the system instruction. All
//! roles share one output schema, generated from [`ExpertResult`].

use once_cell::sync::Lazy;
use schemars::schema_for;

use crate::model::ExpertResult;

pub const EXPERT_FRONTEND: &str = "frontend";
pub const EXPERT_BACKEND: &str = "backend";
pub const EXPERT_DATABASE: &str = "database";
pub const EXPERT_UX: &str = "ux";
pub const EXPERT_DEVOPS: &str = "devops";
pub const EXPERT_MOBILE: &str = "mobile";
pub const EXPERT_TEST: &str = "test";
pub const EXPERT_ANALYZER: &str = "analyzer";

/// Every expert key, in catalog order
pub const CATALOG_ORDER: [&str; 8] = [
    EXPERT_FRONTEND,
    EXPERT_BACKEND,
    EXPERT_DATABASE,
    EXPERT_UX,
    EXPERT_DEVOPS,
    EXPERT_MOBILE,
    EXPERT_TEST,
    EXPERT_ANALYZER,
];

static RESULT_SCHEMA: Lazy<serde_json::Value> = Lazy::new(|| {
    serde_json::to_value(schema_for!(ExpertResult)).unwrap_or(serde_json::Value::Null)
});

/// JSON Schema every expert reply must satisfy
#[must_use]
pub fn result_schema() -> &'static serde_json::Value {
    &RESULT_SCHEMA
}

/// A catalog entry. Immutable and shared by every consultation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpertRole {
    pub key: &'static str,
    /// Human-readable name for listings
    pub title: &'static str,
    /// Persona and responsibilities sent as the system instruction
    pub profile: &'static str,
}

impl ExpertRole {
    #[must_use]
    pub fn schema(&self) -> &'static serde_json::Value {
        result_schema()
    }
}

const BUILTIN_ROLES: [ExpertRole; 8] = [
    ExpertRole {
        key: EXPERT_FRONTEND,
        title: "Frontend Engineer",
        profile: "You are a frontend development expert.\n\
Responsibilities:\n\
- Design modern, responsive and accessible user interfaces\n\
- Apply component-based architecture and pick a state management approach\n\
- Optimize rendering and bundle performance\n\
- Use TypeScript where the stack allows it and include component tests\n\
Deliver component files, styling, routing configuration, state setup, tests and build configuration.",
    },
    ExpertRole {
        key: EXPERT_BACKEND,
        title: "Backend Engineer",
        profile: "You are a backend development expert.\n\
Responsibilities:\n\
- Design robust and scalable backend architecture\n\
- Build REST or GraphQL endpoints with input validation\n\
- Model persistence and ORM layers when data storage is required\n\
- Apply security and performance practices, clean architecture and async I/O\n\
Deliver source files, API documentation, migrations, container configuration and tests.",
    },
    ExpertRole {
        key: EXPERT_DATABASE,
        title: "Database Engineer",
        profile: "You are a database expert.\n\
Responsibilities:\n\
- Design normalized schemas with integrity constraints\n\
- Propose an indexing strategy and optimize the key queries\n\
- Write migrations and seed data\n\
- Plan backup, recovery and scaling\n\
Deliver schema files, migration scripts, seed data, index definitions and database configuration.",
    },
    ExpertRole {
        key: EXPERT_UX,
        title: "UI/UX Designer",
        profile: "You are a UI/UX design expert.\n\
Responsibilities:\n\
- Design user-centered flows and a design system\n\
- Specify components, interaction patterns and responsive behavior\n\
- Apply accessibility guidelines\n\
- Propose usability test scenarios\n\
Deliver design system documents, component specifications, a style guide and an accessibility checklist.",
    },
    ExpertRole {
        key: EXPERT_DEVOPS,
        title: "DevOps Engineer",
        profile: "You are a DevOps expert.\n\
Responsibilities:\n\
- Design CI/CD pipelines with automated testing and security scanning\n\
- Containerize the services\n\
- Describe infrastructure as code\n\
- Set up monitoring and logging\n\
Deliver Dockerfiles, orchestration manifests, pipeline configuration, infrastructure scripts and monitoring configuration.",
    },
    ExpertRole {
        key: EXPERT_MOBILE,
        title: "Mobile Engineer",
        profile: "You are a mobile development expert.\n\
Responsibilities:\n\
- Design cross-platform or native mobile applications\n\
- Apply mobile UX patterns and offline-first data handling\n\
- Optimize startup time, battery and network use\n\
- Prepare for app store submission\n\
Deliver screens, navigation, state management, platform configuration and tests.",
    },
    ExpertRole {
        key: EXPERT_TEST,
        title: "Test & QA Engineer",
        profile: "You are a testing and quality assurance expert.\n\
Responsibilities:\n\
- Build a test strategy covering unit, integration and end-to-end tests\n\
- Analyze existing code for coverage gaps, likely bugs, security issues and performance bottlenecks\n\
- Define quality gates and a CI test pipeline\n\
- Propose refactorings where quality suffers\n\
Deliver test plans, test files, fixtures, automation scripts and a concise quality report.",
    },
    ExpertRole {
        key: EXPERT_ANALYZER,
        title: "Project Analyzer",
        profile: "You are a project analyst who turns a single natural-language request into a concrete plan.\n\
Responsibilities:\n\
- Extract the project type, scope, audience and technical requirements\n\
- Choose the programming language, frameworks, database and hosting that fit best\n\
- Raise only the few questions that are truly blocking\n\
- Draft the file layout and an implementation roadmap\n\
List the chosen technologies as dependencies, the features as recommendations and the roadmap as next steps.",
    },
];

/// Read-only mapping from expert key to role
#[derive(Debug, Clone)]
pub struct ExpertRegistry {
    roles: Vec<ExpertRole>,
}

static BUILTIN: Lazy<ExpertRegistry> = Lazy::new(|| ExpertRegistry {
    roles: BUILTIN_ROLES.to_vec(),
});

impl ExpertRegistry {
    /// The built-in catalog
    #[must_use]
    pub fn builtin() -> &'static Self {
        &BUILTIN
    }

    /// A registry restricted to the given roles, in the order given.
    #[must_use]
    pub fn from_roles(roles: Vec<ExpertRole>) -> Self {
        Self { roles }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ExpertRole> {
        self.roles.iter().find(|r| r.key == key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.roles.iter().map(|r| r.key)
    }

    #[must_use]
    pub fn roles(&self) -> &[ExpertRole] {
        &self.roles
    }

    /// Keys from `keys` that this registry does not know.
    #[must_use]
    pub fn unknown<'a>(&self, keys: &'a [String]) -> Vec<&'a str> {
        keys.iter()
            .map(String::as_str)
            .filter(|k| !self.contains(k))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_follows_catalog_order() {
        let keys: Vec<_> = ExpertRegistry::builtin().keys().collect();
        assert_eq!(keys, CATALOG_ORDER.to_vec());
    }

    #[test]
    fn test_lookup() {
        let registry = ExpertRegistry::builtin();
        assert_eq!(registry.get("backend").unwrap().title, "Backend Engineer");
        assert!(registry.get("uiux").is_none());
        assert!(registry.contains("analyzer"));
    }

    #[test]
    fn test_unknown_keys_reported() {
        let registry = ExpertRegistry::from_roles(vec![*ExpertRegistry::builtin().get("ux").unwrap()]);
        let keys = vec!["ux".to_string(), "devops".to_string()];
        assert_eq!(registry.unknown(&keys), vec!["devops"]);
    }

    #[test]
    fn test_schema_describes_result_fields() {
        let schema = result_schema();
        let properties = schema["properties"].as_object().unwrap();
        for field in ["expert", "analysis", "recommendations", "files", "dependencies", "next_steps"] {
            assert!(properties.contains_key(field), "missing {field}");
        }
        let required: Vec<_> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert!(required.contains(&"expert"));
        assert!(required.contains(&"analysis"));
    }
}
