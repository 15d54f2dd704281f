//! Stage seam shared by the CRM transforms.
//!
//! Each stage takes ownership of the exposure rows and returns them
//! transformed. Anything a stage wants to report beyond the rows goes into
//! the [`StageContext`].

use crate::collateral::CollateralAllocation;
use crate::exposure::CrmExposure;
use crm_core::relation::missing_required;
use crm_core::{CrmIssue, Relation};
use tracing::{info, warn};

/// Side outputs accumulated across stages.
#[derive(Debug, Clone, Default)]
pub struct StageContext {
    /// Non-fatal issues.
    pub issues: Vec<CrmIssue>,
    /// Per-item collateral allocations.
    pub allocations: Vec<CollateralAllocation>,
}

impl StageContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an issue.
    pub fn push_issue(&mut self, issue: CrmIssue) {
        self.issues.push(issue);
    }
}

/// A relation-to-relation transform over exposure rows.
pub trait ExposureTransform {
    /// Stage name for logs and issues.
    fn name(&self) -> &'static str;

    /// Transforms the rows.
    fn apply(&self, exposures: Vec<CrmExposure>, ctx: &mut StageContext) -> Vec<CrmExposure>;
}

/// Schema-presence check for an optional input relation.
///
/// Returns the relation when it is present and carries every required
/// column. An absent relation is skipped quietly; a relation missing
/// columns is skipped with a data-quality issue.
pub(crate) fn usable_relation<'a, T>(
    relation: Option<&'a Relation<T>>,
    required: &[&str],
    stage: &'static str,
    code: &'static str,
    ctx: &mut StageContext,
) -> Option<&'a Relation<T>> {
    let Some(missing) = missing_required(relation, required) else {
        info!(%stage, "No input supplied; stage skipped");
        return None;
    };

    if missing.is_empty() {
        return relation;
    }

    warn!(%stage, missing = ?missing, "Required columns missing; stage skipped");
    ctx.push_issue(
        CrmIssue::data_quality(
            code,
            format!("{} input lacks required columns: {}", stage, missing.join(", ")),
        )
        .with_context("stage", stage)
        .with_context("missing", missing.join(",")),
    );
    None
}
