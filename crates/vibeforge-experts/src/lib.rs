//! Expert catalog and the data that flows through a consultation
//!
//! - [`model`]: project descriptor and expert result types
//! - [`registry`]: the static expert catalog and the shared result schema
//! - [`selector`]: which experts a project needs
//! - [`prompt`]: system instruction and task rendering
//! - [`reply`]: decoding provider replies

pub mod model;
pub mod prompt;
pub mod registry;
pub mod reply;
pub mod selector;

pub use model::{Category, Complexity, ExpertResult, GeneratedFile, ProjectDescriptor, ResultViolation};
pub use prompt::{ConsultationPrompt, consultation_prompt};
pub use registry::{CATALOG_ORDER, ExpertRegistry, ExpertRole, result_schema};
pub use reply::{ReplyError, parse_reply};
pub use selector::select_experts;
