//! Consultation, materialization, and orchestration for vibeforge
//!
//! - [`consultation`]: one expert, one validated result
//! - [`materializer`]: writing a result under the expert's directory
//! - [`store`]: project descriptor and manifest on disk
//! - [`orchestrator`]: full passes, single consultations, analyses
//! - [`analysis`]: descriptor suggestion and report rendering

pub mod analysis;
pub mod consultation;
pub mod materializer;
pub mod orchestrator;
pub mod store;

#[cfg(test)]
mod testing;

pub use consultation::{ConsultationEngine, ConsultationFailure, ConsultationOutcome, FailureKind};
pub use materializer::{Materializer, RejectedFile, RejectionKind, WriteReport, WrittenFile};
pub use orchestrator::{Analysis, ExpertRun, PassReport, PassState, ProjectOrchestrator};
pub use store::{DESCRIPTOR_FILE, MANIFEST_FILE, ManifestEntry, ProjectManifest, ProjectStore};
