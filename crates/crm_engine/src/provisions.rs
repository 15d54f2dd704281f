//! Provision waterfall.
//!
//! Provisions are allocated at three levels and summed per exposure:
//!
//! - direct: 1:1 on the exposure reference
//! - facility: pro-rata over the facility's members
//! - counterparty: pro-rata over the counterparty's exposures
//!
//! The pro-rata weight is `max(0, drawn) + interest + nominal`.
//!
//! Standardised exposures deduct the allocation from the drawn balance
//! first and the nominal second; interest is never reduced. IRB and
//! slotting exposures keep the allocation for expected-loss comparison
//! but deduct nothing.

use crate::allocation::{level_key, sum_by_beneficiary, GroupTotals};
use crate::exposure::{CrmExposure, ProvisionSplit};
use crate::stage::{usable_relation, ExposureTransform, StageContext};
use crm_core::{Approach, BeneficiaryLevel, ParallelConfig, Relation};
use crm_hierarchy::ProvisionItem;
use tracing::debug;

/// Columns a provision relation must carry.
pub const REQUIRED_PROVISION_COLUMNS: &[&str] = &["beneficiary_reference", "amount"];

/// Allocates and deducts provisions.
#[derive(Debug, Clone, Copy)]
pub struct ProvisionWaterfall<'a> {
    provisions: Option<&'a Relation<ProvisionItem>>,
    parallel: &'a ParallelConfig,
}

impl<'a> ProvisionWaterfall<'a> {
    /// Creates the stage over an optional provision relation.
    pub fn new(provisions: Option<&'a Relation<ProvisionItem>>, parallel: &'a ParallelConfig) -> Self {
        Self {
            provisions,
            parallel,
        }
    }
}

impl ExposureTransform for ProvisionWaterfall<'_> {
    fn name(&self) -> &'static str {
        "provisions"
    }

    fn apply(&self, exposures: Vec<CrmExposure>, ctx: &mut StageContext) -> Vec<CrmExposure> {
        let Some(provisions) = usable_relation(
            self.provisions,
            REQUIRED_PROVISION_COLUMNS,
            self.name(),
            "provisions_missing_columns",
            ctx,
        ) else {
            return exposures;
        };

        let allocated = allocate_provisions(&exposures, provisions.rows());
        debug!(
            items = provisions.len(),
            allocated = allocated.iter().sum::<f64>(),
            "Allocated provisions"
        );

        let rows: Vec<(CrmExposure, f64)> = exposures.into_iter().zip(allocated).collect();
        self.parallel.map_owned(rows, |(mut e, amount)| {
            e.provision = split_provision(&e, amount);
            e
        })
    }
}

/// Total provision allocated to each exposure, in row order.
pub fn allocate_provisions(exposures: &[CrmExposure], provisions: &[ProvisionItem]) -> Vec<f64> {
    let amount = |p: &ProvisionItem| p.amount.max(0.0);
    let direct = sum_by_beneficiary(provisions, BeneficiaryLevel::Direct, amount);
    let by_facility = sum_by_beneficiary(provisions, BeneficiaryLevel::Facility, amount);
    let by_counterparty = sum_by_beneficiary(provisions, BeneficiaryLevel::Counterparty, amount);

    let weight = CrmExposure::gross_exposure;
    let facility_totals = GroupTotals::build(exposures, BeneficiaryLevel::Facility, weight);
    let counterparty_totals = GroupTotals::build(exposures, BeneficiaryLevel::Counterparty, weight);

    exposures
        .iter()
        .map(|e| {
            let w = weight(e);
            let mut total = direct.get(e.reference.as_str()).copied().unwrap_or(0.0);
            if let Some(key) = level_key(e, BeneficiaryLevel::Facility) {
                if let Some(pool) = by_facility.get(key) {
                    total += pool * facility_totals.share(key, w);
                }
            }
            if let Some(pool) = by_counterparty.get(e.counterparty.as_str()) {
                total += pool * counterparty_totals.share(e.counterparty.as_str(), w);
            }
            total
        })
        .collect()
}

/// Splits an allocated provision into drawn and nominal deductions.
pub fn split_provision(exposure: &CrmExposure, allocated: f64) -> ProvisionSplit {
    if exposure.approach != Approach::Standardised {
        return ProvisionSplit {
            allocated,
            ..ProvisionSplit::default()
        };
    }

    let on_drawn = allocated.min(exposure.drawn_amount.max(0.0));
    let on_nominal = (allocated - on_drawn)
        .min(exposure.nominal_amount)
        .max(0.0);
    ProvisionSplit {
        allocated,
        on_drawn,
        on_nominal,
    }
}
