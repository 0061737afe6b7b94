//! Command implementations and helpers
//!
//! Every command returns `Result<(), VibeError>`; `run` turns the error into
//! output and an exit code. Command output goes to stdout, logs to stderr.

use std::str::FromStr;

use tokio_util::sync::CancellationToken;

use vibeforge_config::Config;
use vibeforge_engine::{
    ConsultationEngine, ConsultationFailure, ConsultationOutcome, ExpertRun, FailureKind,
    ManifestEntry, PassReport, ProjectOrchestrator, ProjectStore,
};
use vibeforge_experts::{Category, Complexity, ExpertRegistry, ExpertResult, ProjectDescriptor};
use vibeforge_llm::LlmError;
use vibeforge_utils::project_name::sanitize_project_name;
use vibeforge_utils::{ConfigError, VibeError};

use super::args::NewArgs;

/// Recover the typed error behind an `anyhow` chain.
pub(crate) fn from_anyhow(err: anyhow::Error) -> VibeError {
    let err = match err.downcast::<VibeError>() {
        Ok(vibe) => return vibe,
        Err(err) => err,
    };
    match err.downcast::<ConfigError>() {
        Ok(config) => VibeError::Config(config),
        Err(err) => VibeError::Other(err),
    }
}

pub(crate) fn from_llm(err: LlmError) -> VibeError {
    match err {
        LlmError::Config(config) => VibeError::Config(config),
        other => VibeError::Other(anyhow::Error::new(other)),
    }
}

/// Error reported when a standalone consultation fails.
pub(crate) fn consultation_error(project: &str, failure: &ConsultationFailure) -> VibeError {
    match (failure.kind, &failure.last_provider_error) {
        (FailureKind::Cancelled, _) => VibeError::Cancelled,
        (FailureKind::Exhausted, Some(last)) => VibeError::Provider(last.clone()),
        _ => VibeError::PassIncomplete {
            project: project.to_string(),
            failed: 1,
        },
    }
}

fn store_for(config: &Config) -> ProjectStore {
    ProjectStore::new(config.projects_dir().into_std_path_buf())
}

fn orchestrator_for(config: &Config) -> Result<ProjectOrchestrator, VibeError> {
    let invoker = vibeforge_llm::from_config(config).map_err(from_llm)?;
    let engine = ConsultationEngine::new(
        invoker,
        ExpertRegistry::builtin().clone(),
        config.llm_timeout(),
    );
    Ok(ProjectOrchestrator::from_config(engine, config))
}

/// Descriptor described by `vibeforge new` flags.
pub(crate) fn descriptor_from_args(args: &NewArgs) -> Result<ProjectDescriptor, VibeError> {
    let complexity =
        Complexity::from_str(args.complexity.trim()).map_err(|_| ConfigError::InvalidValue {
            key: "complexity".to_string(),
            value: format!("'{}' (expected simple, medium or complex)", args.complexity),
        })?;
    let category = Category::from_str(&args.category).unwrap_or_else(|never| match never {});

    Ok(ProjectDescriptor {
        name: sanitize_project_name(&args.name)?,
        description: args.description.trim().to_string(),
        category,
        tech_stack: clean_list(&args.tech_stack),
        features: clean_list(&args.features),
        target_audience: args.audience.trim().to_string(),
        complexity,
        needs_database: args.database,
        needs_auth: args.auth,
        needs_api: args.api,
    })
}

fn clean_list(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn print_result(result: &ExpertResult) {
    println!("Analysis:\n  {}", result.analysis.replace('\n', "\n  "));
    if !result.recommendations.is_empty() {
        println!("\nRecommendations:");
        for rec in &result.recommendations {
            println!("  - {rec}");
        }
    }
    if !result.files.is_empty() {
        println!("\nFiles:");
        for file in &result.files {
            println!("  {} ({} bytes)", file.path, file.content.len());
        }
    }
    if !result.dependencies.is_empty() {
        println!("\nDependencies: {}", result.dependencies.join(", "));
    }
    if !result.next_steps.is_empty() {
        println!("\nNext steps:");
        for step in &result.next_steps {
            println!("  - {step}");
        }
    }
}

fn print_run(run: &ExpertRun) {
    match &run.entry {
        ManifestEntry::Success {
            files_written,
            bytes_written,
            ..
        } => println!(
            "  ✓ {:<10} {} file(s), {bytes_written} bytes",
            run.expert,
            files_written.len()
        ),
        ManifestEntry::Failure { kind, reason, .. } => {
            println!("  ✗ {:<10} {kind}: {reason}", run.expert);
        }
    }
}

fn print_pass(report: &PassReport) {
    println!("Project: {}", report.project);
    println!("  Directory: {}", report.project_root.display());
    println!("  Experts: {}", report.selected.join(", "));
    println!();
    for run in &report.runs {
        print_run(run);
    }
    for skipped in report.not_started() {
        println!("  - {skipped:<10} not started");
    }
    if report.deadline_exceeded {
        println!("\nThe pass deadline was reached before every expert finished.");
    }
}

pub async fn execute_new_command(
    args: &NewArgs,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<(), VibeError> {
    let descriptor = descriptor_from_args(args)?;
    let store = store_for(config);
    let path = store.save_descriptor(&descriptor)?;
    println!("✓ Created project '{}'", descriptor.name);
    println!("  Descriptor: {}", path.display());

    if args.develop {
        return execute_develop_command(&descriptor.name, config, cancel).await;
    }
    println!("\nNext: vibeforge develop {}", descriptor.name);
    Ok(())
}

pub async fn execute_develop_command(
    project: &str,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<(), VibeError> {
    let descriptor = store_for(config).load_descriptor(project)?;
    let orchestrator = orchestrator_for(config)?;

    let report = orchestrator.run_pass(&descriptor, cancel).await?;
    print_pass(&report);

    match report.status_error(orchestrator.pass_timeout()) {
        Some(err) => Err(err),
        None => {
            println!("\n✓ All experts finished");
            Ok(())
        }
    }
}

pub async fn execute_consult_command(
    project: &str,
    expert: &str,
    request: Option<&str>,
    save: bool,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<(), VibeError> {
    let orchestrator = orchestrator_for(config)?;
    let (descriptor, outcome) = orchestrator
        .consult_one(project, expert, request, cancel)
        .await?;

    match &outcome {
        ConsultationOutcome::Success(result) => {
            println!("Expert: {expert}\n");
            print_result(result);
        }
        ConsultationOutcome::Failure(failure) => {
            println!("✗ {expert}: {failure}");
        }
    }

    if save {
        let run = orchestrator.save_consultation(&descriptor, expert, &outcome)?;
        println!();
        print_run(&run);
        if let Some(report) = &run.report {
            println!("  Directory: {}", report.expert_dir.display());
        }
    } else if outcome.is_success() {
        println!("\nNothing was written. Re-run with --save to keep this answer.");
    }

    match outcome {
        ConsultationOutcome::Failure(failure) => Err(consultation_error(&descriptor.name, &failure)),
        ConsultationOutcome::Success(_) => Ok(()),
    }
}

pub async fn execute_analyze_command(
    request: &str,
    name: Option<&str>,
    save: bool,
    config: &Config,
    cancel: &CancellationToken,
) -> Result<(), VibeError> {
    let orchestrator = orchestrator_for(config)?;
    let analysis = orchestrator.analyze(request, name, cancel).await?;

    let (result, descriptor) = match (&analysis.outcome, &analysis.descriptor) {
        (ConsultationOutcome::Success(result), Some(descriptor)) => (result, descriptor),
        (ConsultationOutcome::Failure(failure), _) => {
            println!("✗ analyzer: {failure}");
            return Err(consultation_error(name.unwrap_or("analysis"), failure));
        }
        (ConsultationOutcome::Success(_), None) => {
            return Err(VibeError::Other(anyhow::anyhow!(
                "analysis succeeded without a descriptor"
            )));
        }
    };

    print_result(result);
    println!("\nSuggested project:");
    println!("  Name: {}", descriptor.name);
    println!("  Category: {}", descriptor.category);
    println!("  Tech stack: {}", descriptor.tech_stack.join(", "));
    println!("  Features: {}", descriptor.features.join(", "));
    println!(
        "  Database: {}  Auth: {}  API: {}",
        descriptor.needs_database, descriptor.needs_auth, descriptor.needs_api
    );

    if save {
        let run = orchestrator.save_analysis(&analysis)?;
        println!("\n✓ Created project '{}'", descriptor.name);
        print_run(&run);
        println!("\nNext: vibeforge develop {}", descriptor.name);
    } else {
        println!("\nNothing was written. Re-run with --save to create the project.");
    }
    Ok(())
}

pub fn execute_list_command(config: &Config) -> Result<(), VibeError> {
    let store = store_for(config);
    let projects = store.list_projects()?;
    if projects.is_empty() {
        println!("No projects under {}", store.root().display());
        return Ok(());
    }
    for name in projects {
        println!("{name}");
    }
    Ok(())
}

pub fn execute_show_command(project: &str, json: bool, config: &Config) -> Result<(), VibeError> {
    let store = store_for(config);
    let descriptor = store.load_descriptor(project)?;
    let manifest = store.load_manifest(project)?;

    if json {
        let body = serde_json::json!({
            "descriptor": descriptor,
            "manifest": manifest,
        });
        let text = serde_json::to_string_pretty(&body).map_err(anyhow::Error::from)?;
        println!("{text}");
        return Ok(());
    }

    println!("Project: {}", descriptor.name);
    println!("  Description: {}", descriptor.description);
    println!("  Category: {}", descriptor.category);
    println!("  Complexity: {}", descriptor.complexity);
    if !descriptor.tech_stack.is_empty() {
        println!("  Tech stack: {}", descriptor.tech_stack.join(", "));
    }

    let Some(manifest) = manifest else {
        println!("\nNo experts consulted yet.");
        return Ok(());
    };
    println!(
        "\nExperts (updated {}):",
        manifest.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    for (expert, entry) in &manifest.experts {
        match entry {
            ManifestEntry::Success {
                files_written,
                bytes_written,
                consulted_at,
                ..
            } => println!(
                "  ✓ {expert:<10} {} file(s), {bytes_written} bytes, {}",
                files_written.len(),
                consulted_at.format("%Y-%m-%d %H:%M")
            ),
            ManifestEntry::Failure {
                kind,
                reason,
                consulted_at,
                ..
            } => println!(
                "  ✗ {expert:<10} {kind}: {reason}, {}",
                consulted_at.format("%Y-%m-%d %H:%M")
            ),
        }
    }
    Ok(())
}

pub fn execute_experts_command() -> Result<(), VibeError> {
    for role in ExpertRegistry::builtin().roles() {
        println!("{:<10} {}", role.key, role.title);
    }
    Ok(())
}

pub fn execute_config_command(config: &Config) -> Result<(), VibeError> {
    println!("Effective configuration:");
    for (key, (value, source)) in config.effective_config() {
        println!("  {key} = {value}  ({source})");
    }

    println!();
    match vibeforge_llm::resolve_providers(config, &|var: &str| std::env::var(var).ok()) {
        Ok(selection) => {
            println!("Primary provider: {}", selection.primary);
            println!(
                "Fallback provider: {}",
                selection.fallback.as_deref().unwrap_or("none")
            );
        }
        Err(err) => println!("Providers: not available ({err})"),
    }
    Ok(())
}
