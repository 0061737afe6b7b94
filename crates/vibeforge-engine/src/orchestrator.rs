//! Project orchestration
//!
//! A pass walks `Selecting → Consulting(e) → Materializing(e) → … →
//! Summarizing → Done`. One expert's failure never stops the others. The
//! manifest is written once, after every started expert has finished, by the
//! task that owns the pass.

use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, warn};

use vibeforge_config::Config;
use vibeforge_experts::prompt::{render_analysis_request, render_code_review, system_instruction};
use vibeforge_experts::registry::{EXPERT_ANALYZER, EXPERT_TEST};
use vibeforge_experts::{ConsultationPrompt, ExpertResult, ProjectDescriptor, select_experts};
use vibeforge_utils::VibeError;
use vibeforge_utils::logging::pass_span;
use vibeforge_utils::project_name::sanitize_project_name;

use crate::analysis::{
    analysis_report_markdown, analyzer_readme, collect_existing_code, suggest_descriptor,
    test_report_markdown,
};
use crate::consultation::{
    ConsultationEngine, ConsultationFailure, ConsultationOutcome, FailureKind,
};
use crate::materializer::{Materializer, RejectionKind, WriteReport};
use crate::store::{ManifestEntry, ProjectManifest, ProjectStore};

/// Report written by the analyzer next to its files
pub const ANALYSIS_REPORT_FILE: &str = "analysis_report.md";

/// Report written by the test expert next to its files
pub const TEST_REPORT_FILE: &str = "test_analysis_report.md";

/// Where a pass is
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "expert", rename_all = "snake_case")]
pub enum PassState {
    Selecting,
    Consulting(String),
    Materializing(String),
    Summarizing,
    Done,
    Aborted,
}

/// What happened to one expert during a pass
#[derive(Debug, Clone)]
pub struct ExpertRun {
    pub expert: String,
    pub entry: ManifestEntry,
    /// Present when materialization was attempted
    pub report: Option<WriteReport>,
    states: Vec<PassState>,
}

/// Outcome of a full pass
#[derive(Debug, Clone)]
pub struct PassReport {
    pub project: String,
    pub project_root: PathBuf,
    /// Experts chosen by the selector, in catalog order
    pub selected: Vec<String>,
    /// Experts that were started, in selection order
    pub runs: Vec<ExpertRun>,
    /// Manifest as written at the end of the pass
    pub manifest: ProjectManifest,
    pub deadline_exceeded: bool,
    pub cancelled: bool,
    pub transitions: Vec<PassState>,
}

impl PassReport {
    #[must_use]
    pub fn final_state(&self) -> Option<&PassState> {
        self.transitions.last()
    }

    /// Experts started in this pass whose entry is a failure
    #[must_use]
    pub fn failed(&self) -> Vec<&str> {
        self.runs
            .iter()
            .filter(|run| !run.entry.is_success())
            .map(|run| run.expert.as_str())
            .collect()
    }

    /// Experts selected but never started
    #[must_use]
    pub fn not_started(&self) -> Vec<&str> {
        self.selected
            .iter()
            .filter(|key| !self.runs.iter().any(|run| &run.expert == *key))
            .map(String::as_str)
            .collect()
    }

    /// Error the CLI reports for an incomplete pass, `None` when every
    /// selected expert succeeded.
    #[must_use]
    pub fn status_error(&self, pass_timeout: Option<Duration>) -> Option<VibeError> {
        if self.cancelled {
            return Some(VibeError::Cancelled);
        }
        if self.deadline_exceeded {
            return Some(VibeError::DeadlineExceeded {
                project: self.project.clone(),
                seconds: pass_timeout.map_or(0, |d| d.as_secs()),
            });
        }
        let failed = self.failed().len();
        (failed > 0).then(|| VibeError::PassIncomplete {
            project: self.project.clone(),
            failed,
        })
    }
}

/// Outcome of the analyzer on a free-text request
#[derive(Debug, Clone)]
pub struct Analysis {
    pub request: String,
    pub outcome: ConsultationOutcome,
    /// Suggested descriptor, present on success
    pub descriptor: Option<ProjectDescriptor>,
}

/// Drives passes, single consultations, and analyses for projects in one
/// [`ProjectStore`].
#[derive(Debug, Clone)]
pub struct ProjectOrchestrator {
    engine: Arc<ConsultationEngine>,
    materializer: Materializer,
    store: ProjectStore,
    max_parallel: usize,
    pass_timeout: Option<Duration>,
}

impl ProjectOrchestrator {
    #[must_use]
    pub fn new(engine: ConsultationEngine, materializer: Materializer, store: ProjectStore) -> Self {
        Self {
            engine: Arc::new(engine),
            materializer,
            store,
            max_parallel: 1,
            pass_timeout: None,
        }
    }

    /// Orchestrator with the store, materializer, and limits from `config`.
    #[must_use]
    pub fn from_config(engine: ConsultationEngine, config: &Config) -> Self {
        Self::new(
            engine,
            Materializer::new(config.dependency_manifest()),
            ProjectStore::new(config.projects_dir().into_std_path_buf()),
        )
        .with_max_parallel(config.max_parallel_experts())
        .with_pass_timeout(config.pass_timeout())
    }

    #[must_use]
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    #[must_use]
    pub fn with_pass_timeout(mut self, pass_timeout: Option<Duration>) -> Self {
        self.pass_timeout = pass_timeout;
        self
    }

    #[must_use]
    pub fn store(&self) -> &ProjectStore {
        &self.store
    }

    #[must_use]
    pub fn engine(&self) -> &ConsultationEngine {
        &self.engine
    }

    #[must_use]
    pub fn pass_timeout(&self) -> Option<Duration> {
        self.pass_timeout
    }

    /// Run every selected expert for `descriptor` and write the manifest.
    ///
    /// # Errors
    ///
    /// `VibeError::UnknownExpert` when the selection names an unregistered
    /// expert (the pass is aborted before any consultation), or a store
    /// error reading or writing the project records. Expert failures are
    /// recorded in the report, not returned.
    pub async fn run_pass(
        &self,
        descriptor: &ProjectDescriptor,
        cancel: &CancellationToken,
    ) -> Result<PassReport, VibeError> {
        let mut descriptor = descriptor.clone();
        descriptor.name = sanitize_project_name(&descriptor.name)?;
        let selected = select_experts(&descriptor);

        let span = pass_span(&descriptor.name, selected.len());
        self.run_pass_inner(descriptor, selected, cancel)
            .instrument(span)
            .await
    }

    async fn run_pass_inner(
        &self,
        descriptor: ProjectDescriptor,
        selected: Vec<String>,
        cancel: &CancellationToken,
    ) -> Result<PassReport, VibeError> {
        let mut transitions = vec![PassState::Selecting];

        let unknown = self.engine.registry().unknown(&selected);
        if let Some(first) = unknown.first() {
            transitions.push(PassState::Aborted);
            error!(project = %descriptor.name, unknown = ?unknown, "Selection names unregistered experts; pass aborted");
            return Err(VibeError::UnknownExpert {
                key: (*first).to_string(),
            });
        }

        self.store.save_descriptor(&descriptor)?;
        let project_root = self.store.project_dir(&descriptor.name)?;
        let prior = self.store.load_manifest(&descriptor.name)?;

        info!(experts = ?selected, parallel = self.max_parallel, "Starting pass");

        let pass_token = cancel.child_token();
        let deadline = Arc::new(AtomicBool::new(false));
        let timer = self.pass_timeout.map(|limit| {
            let token = pass_token.clone();
            let flag = Arc::clone(&deadline);
            tokio::spawn(async move {
                tokio::select! {
                    () = tokio::time::sleep(limit) => {
                        flag.store(true, Ordering::SeqCst);
                        warn!(seconds = limit.as_secs(), "Pass deadline exceeded; cancelling");
                        token.cancel();
                    }
                    () = token.cancelled() => {}
                }
            })
        });

        let runs = if self.max_parallel > 1 {
            self.run_parallel(&descriptor, &project_root, &selected, &pass_token, &deadline)
                .await?
        } else {
            self.run_sequential(&descriptor, &project_root, &selected, &pass_token, &deadline)
                .await?
        };

        if let Some(timer) = timer {
            timer.abort();
        }

        for run in &runs {
            transitions.extend(run.states.iter().cloned());
        }
        transitions.push(PassState::Summarizing);

        let mut manifest = match prior {
            Some(mut manifest) => {
                manifest.project = descriptor.clone();
                manifest
            }
            None => ProjectManifest::new(&descriptor),
        };
        for run in &runs {
            manifest.record(run.expert.clone(), run.entry.clone());
        }
        self.store.save_manifest(&manifest)?;
        transitions.push(PassState::Done);

        // Flags follow what was recorded; a token firing after the last
        // expert finished interrupts nothing.
        let skipped = runs.len() < selected.len();
        let interrupted =
            |kind: FailureKind| runs.iter().any(|run| run.entry.failure_kind() == Some(kind));
        let deadline_exceeded = interrupted(FailureKind::DeadlineExceeded)
            || (skipped && deadline.load(Ordering::SeqCst));
        let cancelled = interrupted(FailureKind::Cancelled) || (skipped && cancel.is_cancelled());

        let report = PassReport {
            project: descriptor.name.clone(),
            project_root,
            selected,
            runs,
            manifest,
            deadline_exceeded,
            cancelled,
            transitions,
        };

        info!(
            succeeded = report.runs.len() - report.failed().len(),
            failed = report.failed().len(),
            not_started = report.not_started().len(),
            deadline_exceeded = report.deadline_exceeded,
            "Pass finished"
        );

        Ok(report)
    }

    async fn run_sequential(
        &self,
        descriptor: &ProjectDescriptor,
        project_root: &Path,
        selected: &[String],
        token: &CancellationToken,
        deadline: &Arc<AtomicBool>,
    ) -> Result<Vec<ExpertRun>, VibeError> {
        let mut runs = Vec::with_capacity(selected.len());
        for expert in selected {
            if token.is_cancelled() {
                break;
            }
            runs.push(
                run_expert(
                    &self.engine,
                    &self.materializer,
                    project_root,
                    descriptor,
                    expert,
                    token,
                    deadline,
                )
                .await?,
            );
        }
        Ok(runs)
    }

    async fn run_parallel(
        &self,
        descriptor: &ProjectDescriptor,
        project_root: &Path,
        selected: &[String],
        token: &CancellationToken,
        deadline: &Arc<AtomicBool>,
    ) -> Result<Vec<ExpertRun>, VibeError> {
        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let descriptor = Arc::new(descriptor.clone());
        let mut tasks = JoinSet::new();

        for (index, expert) in selected.iter().enumerate() {
            let engine = Arc::clone(&self.engine);
            let materializer = self.materializer.clone();
            let root = project_root.to_path_buf();
            let descriptor = Arc::clone(&descriptor);
            let expert = expert.clone();
            let token = token.clone();
            let deadline = Arc::clone(deadline);
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(
                async move {
                    let _permit = tokio::select! {
                        biased;
                        () = token.cancelled() => return Ok(None),
                        permit = semaphore.acquire_owned() => match permit {
                            Ok(permit) => permit,
                            Err(_) => return Ok(None),
                        },
                    };
                    if token.is_cancelled() {
                        return Ok(None);
                    }
                    run_expert(&engine, &materializer, &root, &descriptor, &expert, &token, &deadline)
                        .await
                        .map(|run| Some((index, run)))
                }
                .in_current_span(),
            );
        }

        let mut finished = Vec::with_capacity(selected.len());
        while let Some(joined) = tasks.join_next().await {
            let run = joined.map_err(|e| VibeError::Other(anyhow::anyhow!("expert task failed: {e}")))??;
            if let Some(run) = run {
                finished.push(run);
            }
        }
        finished.sort_by_key(|(index, _)| *index);
        Ok(finished.into_iter().map(|(_, run)| run).collect())
    }

    /// Consult one expert on a stored project without writing anything.
    ///
    /// The `test` expert reviews the files other experts already produced.
    ///
    /// # Errors
    ///
    /// `ProjectNotFound`, `CorruptRecord`, or `UnknownExpert` before the
    /// provider is called.
    pub async fn consult_one(
        &self,
        project: &str,
        expert: &str,
        additional_request: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<(ProjectDescriptor, ConsultationOutcome), VibeError> {
        let descriptor = self.store.load_descriptor(project)?;
        let role = self.engine.role(expert)?;

        let prompt = if role.key == EXPERT_TEST {
            let project_root = self.store.project_dir(&descriptor.name)?;
            let code = collect_existing_code(&project_root)?;
            let mut task = render_code_review(&descriptor, &code);
            if let Some(extra) = additional_request.map(str::trim).filter(|s| !s.is_empty()) {
                task.push_str("\n\nADDITIONAL REQUEST: ");
                task.push_str(extra);
            }
            ConsultationPrompt {
                system: system_instruction(&role),
                task,
            }
        } else {
            vibeforge_experts::consultation_prompt(&role, &descriptor, additional_request)
        };

        let outcome = self
            .engine
            .consult_with_prompt(&role, &descriptor.name, prompt, cancel)
            .await;
        Ok((descriptor, outcome))
    }

    /// Materialize a single consultation and record it in the manifest.
    ///
    /// Failures are recorded too, so the manifest always shows the latest
    /// attempt for the expert.
    pub fn save_consultation(
        &self,
        descriptor: &ProjectDescriptor,
        expert: &str,
        outcome: &ConsultationOutcome,
    ) -> Result<ExpertRun, VibeError> {
        let project_root = self.store.project_dir(&descriptor.name)?;
        let mut run = settle(&self.materializer, &project_root, expert, outcome.clone());

        if expert == EXPERT_TEST
            && let ConsultationOutcome::Success(result) = outcome
        {
            self.materializer.write_report(
                &project_root,
                expert,
                TEST_REPORT_FILE,
                &test_report_markdown(&descriptor.name, result),
            )?;
            push_written(&mut run, TEST_REPORT_FILE);
        }

        self.store
            .record_outcome(descriptor, expert, run.entry.clone())?;
        Ok(run)
    }

    /// Run the analyzer on a free-text request and suggest a descriptor.
    pub async fn analyze(
        &self,
        request: &str,
        name: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Analysis, VibeError> {
        let role = self.engine.role(EXPERT_ANALYZER)?;
        let prompt = ConsultationPrompt {
            system: system_instruction(&role),
            task: render_analysis_request(request),
        };
        let label = name.unwrap_or("analysis");
        let outcome = self
            .engine
            .consult_with_prompt(&role, label, prompt, cancel)
            .await;

        let descriptor = match &outcome {
            ConsultationOutcome::Success(result) => {
                let mut descriptor = suggest_descriptor(request, name, result);
                descriptor.name = sanitize_project_name(&descriptor.name)?;
                Some(descriptor)
            }
            ConsultationOutcome::Failure(_) => None,
        };

        Ok(Analysis {
            request: request.trim().to_string(),
            outcome,
            descriptor,
        })
    }

    /// Create the project suggested by a successful analysis.
    ///
    /// Writes the descriptor, the analyzer's files (a README when it
    /// declared none), and the analysis report.
    ///
    /// # Errors
    ///
    /// `VibeError::Other` when the analysis has no descriptor, or a store
    /// error.
    pub fn save_analysis(&self, analysis: &Analysis) -> Result<ExpertRun, VibeError> {
        let (Some(descriptor), ConsultationOutcome::Success(result)) =
            (&analysis.descriptor, &analysis.outcome)
        else {
            return Err(VibeError::Other(anyhow::anyhow!(
                "analysis did not produce a project to save"
            )));
        };

        self.store.save_descriptor(descriptor)?;
        let project_root = self.store.project_dir(&descriptor.name)?;

        let mut result: ExpertResult = result.clone();
        if result.files.is_empty() {
            result
                .files
                .push(analyzer_readme(&descriptor.name, &analysis.request, &result));
        }

        let mut run = settle(
            &self.materializer,
            &project_root,
            EXPERT_ANALYZER,
            ConsultationOutcome::Success(result.clone()),
        );
        self.materializer.write_report(
            &project_root,
            EXPERT_ANALYZER,
            ANALYSIS_REPORT_FILE,
            &analysis_report_markdown(&descriptor.name, &analysis.request, &result),
        )?;
        push_written(&mut run, ANALYSIS_REPORT_FILE);

        self.store
            .record_outcome(descriptor, EXPERT_ANALYZER, run.entry.clone())?;
        Ok(run)
    }
}

async fn run_expert(
    engine: &ConsultationEngine,
    materializer: &Materializer,
    project_root: &Path,
    descriptor: &ProjectDescriptor,
    expert: &str,
    token: &CancellationToken,
    deadline: &AtomicBool,
) -> Result<ExpertRun, VibeError> {
    debug!(expert = expert, "Consulting");
    let outcome = engine.consult(expert, descriptor, None, token).await?;

    let outcome = match outcome {
        ConsultationOutcome::Failure(failure)
            if failure.kind == FailureKind::Cancelled && deadline.load(Ordering::SeqCst) =>
        {
            ConsultationOutcome::Failure(ConsultationFailure {
                kind: FailureKind::DeadlineExceeded,
                reason: "pass deadline exceeded during consultation".to_string(),
                last_provider_error: failure.last_provider_error,
            })
        }
        other => other,
    };

    Ok(settle(materializer, project_root, expert, outcome))
}

/// Turn an outcome into a manifest entry, materializing successes.
fn settle(
    materializer: &Materializer,
    project_root: &Path,
    expert: &str,
    outcome: ConsultationOutcome,
) -> ExpertRun {
    let mut states = vec![PassState::Consulting(expert.to_string())];
    let now = Utc::now();

    let (entry, report) = match outcome {
        ConsultationOutcome::Failure(failure) => {
            warn!(expert = expert, kind = %failure.kind, reason = %failure.reason, "Expert failed");
            (ManifestEntry::failure(failure, now), None)
        }
        ConsultationOutcome::Success(result) => {
            states.push(PassState::Materializing(expert.to_string()));
            match materializer.materialize(project_root, expert, &result) {
                Ok(report) => (entry_for_report(result, &report, now), Some(report)),
                Err(err) => {
                    warn!(expert = expert, error = %err, "Could not prepare expert directory");
                    let failure = ConsultationFailure::new(FailureKind::WriteFailed, err.to_string());
                    (ManifestEntry::failure(failure, now), None)
                }
            }
        }
    };

    ExpertRun {
        expert: expert.to_string(),
        entry,
        report,
        states,
    }
}

fn entry_for_report(
    result: ExpertResult,
    report: &WriteReport,
    now: chrono::DateTime<Utc>,
) -> ManifestEntry {
    if report.is_clean() {
        return ManifestEntry::success(result, report.written_paths(), report.bytes_written, now);
    }

    let kind = if report.has_traversal() {
        FailureKind::PathTraversal
    } else {
        FailureKind::WriteFailed
    };
    let rejected: Vec<String> = report
        .rejected
        .iter()
        .filter(|r| {
            kind == FailureKind::WriteFailed || r.kind == RejectionKind::PathTraversal
        })
        .map(|r| r.path.clone())
        .collect();
    ManifestEntry::failure(
        ConsultationFailure::new(
            kind,
            format!(
                "rejected {}; wrote {} other file(s)",
                rejected.join(", "),
                report.written.len()
            ),
        ),
        now,
    )
}

fn push_written(run: &mut ExpertRun, file: &str) {
    if let ManifestEntry::Success { files_written, .. } = &mut run.entry
        && !files_written.iter().any(|f| f == file)
    {
        files_written.push(file.to_string());
    }
}
