//! Prompt rendering
//!
//! The system instruction is the role profile plus the output contract; the
//! task text embeds every descriptor field in a fixed layout.

use std::fmt::Write;

use crate::model::ProjectDescriptor;
use crate::registry::ExpertRole;

/// The two texts sent for one consultation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsultationPrompt {
    pub system: String,
    pub task: String,
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

/// Role profile followed by the JSON output contract.
#[must_use]
pub fn system_instruction(role: &ExpertRole) -> String {
    let schema = serde_json::to_string_pretty(role.schema()).unwrap_or_default();
    format!(
        "{profile}\n\n\
Answer with exactly one JSON object matching this JSON Schema and nothing else:\n\
{schema}\n\n\
Rules for the reply:\n\
- \"expert\" is \"{key}\"\n\
- every file path is relative to your own directory, uses '/' separators, and never starts with '/' or contains '..'\n\
- each path appears at most once\n\
- \"dependencies\" lists one installable package per entry",
        profile = role.profile,
        key = role.key,
    )
}

fn descriptor_block(descriptor: &ProjectDescriptor) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "PROJECT:");
    let _ = writeln!(out, "- Name: {}", descriptor.name);
    let _ = writeln!(out, "- Description: {}", descriptor.description);
    let _ = writeln!(out, "- Category: {}", descriptor.category);
    let _ = writeln!(out, "- Tech stack: {}", list_or_none(&descriptor.tech_stack));
    let _ = writeln!(out, "- Features: {}", list_or_none(&descriptor.features));
    let _ = writeln!(out, "- Target audience: {}", descriptor.target_audience);
    let _ = writeln!(out, "- Complexity: {}", descriptor.complexity);
    let _ = writeln!(out, "- Database: {}", yes_no(descriptor.needs_database));
    let _ = writeln!(out, "- Authentication: {}", yes_no(descriptor.needs_auth));
    let _ = writeln!(out, "- API: {}", yes_no(descriptor.needs_api));
    out
}

/// Task text for a regular consultation.
#[must_use]
pub fn render_task(
    role: &ExpertRole,
    descriptor: &ProjectDescriptor,
    additional_request: Option<&str>,
) -> String {
    let mut task = format!(
        "Work on the {title} part of the '{name}' project.\n\n\
{block}\n\
TASKS:\n\
1. Analyze the project from the {key} point of view\n\
2. Give concrete {key} recommendations\n\
3. Create the files this part of the project needs\n\
4. List the dependencies\n\
5. Describe the next steps\n\n\
Keep the code clean, testable and documented.",
        title = role.title,
        name = descriptor.name,
        key = role.key,
        block = descriptor_block(descriptor),
    );

    if let Some(extra) = additional_request.map(str::trim).filter(|s| !s.is_empty()) {
        let _ = write!(task, "\n\nADDITIONAL REQUEST: {extra}");
    }

    task
}

/// Task text for the analyzer, built from a free-text request.
#[must_use]
pub fn render_analysis_request(request: &str) -> String {
    format!(
        "User request: \"{}\"\n\n\
Analyze this request:\n\
1. Extract the project requirements\n\
2. Note only the blocking open questions\n\
3. Choose the most suitable technology stack\n\
4. Draft a workable solution outline\n\
5. Create the essential starter files",
        request.trim()
    )
}

/// Task text for the test expert reviewing code other experts produced.
#[must_use]
pub fn render_code_review(descriptor: &ProjectDescriptor, existing_code: &str) -> String {
    format!(
        "Review the existing code of the '{name}' project and build its test strategy.\n\n\
{block}\n\
EXISTING CODE:\n{existing_code}\n\n\
TASKS:\n\
1. Analyze code quality, likely bugs, security issues and performance bottlenecks\n\
2. Plan unit, integration and end-to-end tests\n\
3. Define coverage targets and quality gates\n\
4. Create test files, fixtures and automation scripts\n\
5. Summarize the findings and the improvements to make",
        name = descriptor.name,
        block = descriptor_block(descriptor),
    )
}

/// Full prompt pair for `role` on `descriptor`.
#[must_use]
pub fn consultation_prompt(
    role: &ExpertRole,
    descriptor: &ProjectDescriptor,
    additional_request: Option<&str>,
) -> ConsultationPrompt {
    ConsultationPrompt {
        system: system_instruction(role),
        task: render_task(role, descriptor, additional_request),
    }
}
