//! Expert selection from a project descriptor

use crate::model::{Category, ProjectDescriptor};
use crate::registry::{
    CATALOG_ORDER, EXPERT_BACKEND, EXPERT_DATABASE, EXPERT_DEVOPS, EXPERT_FRONTEND, EXPERT_MOBILE,
    EXPERT_TEST, EXPERT_UX,
};

/// Experts every project is reviewed by
pub const BASELINE_EXPERTS: [&str; 3] = [EXPERT_UX, EXPERT_DEVOPS, EXPERT_TEST];

/// Ordered set of experts that must be consulted for `descriptor`.
///
/// Rules are unioned and the result follows catalog order. An unknown
/// category contributes nothing beyond the baseline.
#[must_use]
pub fn select_experts(descriptor: &ProjectDescriptor) -> Vec<String> {
    let mut wanted: Vec<&str> = match descriptor.category {
        Category::Web | Category::Fullstack => vec![EXPERT_FRONTEND, EXPERT_BACKEND],
        Category::Mobile => vec![EXPERT_MOBILE],
        Category::Api => vec![EXPERT_BACKEND],
        Category::Desktop => vec![EXPERT_FRONTEND],
        Category::Other(_) => vec![],
    };

    if descriptor.needs_database {
        wanted.push(EXPERT_DATABASE);
    }
    wanted.extend(BASELINE_EXPERTS);

    CATALOG_ORDER
        .iter()
        .filter(|key| wanted.contains(key))
        .map(|key| (*key).to_string())
        .collect()
}
