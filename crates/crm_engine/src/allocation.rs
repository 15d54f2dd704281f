//! Pro-rata helpers shared by the provision, collateral and guarantee stages.
//!
//! Items pledged at facility or counterparty level are spread over the
//! member exposures in proportion to a per-exposure weight. Group totals
//! are gathered once, sequentially, before any row-level work.

use crate::exposure::CrmExposure;
use crm_core::BeneficiaryLevel;
use crm_hierarchy::{CollateralItem, GuaranteeItem, ProvisionItem};
use std::collections::HashMap;

/// Key an exposure is matched on at a beneficiary level.
///
/// Exposures outside any facility have no facility-level key.
pub(crate) fn level_key(exposure: &CrmExposure, level: BeneficiaryLevel) -> Option<&str> {
    match level {
        BeneficiaryLevel::Direct => Some(exposure.reference.as_str()),
        BeneficiaryLevel::Facility => exposure.parent_facility.as_ref().map(|f| f.as_str()),
        BeneficiaryLevel::Counterparty => Some(exposure.counterparty.as_str()),
    }
}

/// Sum of a weight over the members of each group at one level.
#[derive(Debug, Default)]
pub(crate) struct GroupTotals<'a> {
    totals: HashMap<&'a str, f64>,
}

impl<'a> GroupTotals<'a> {
    /// Sums `weight` over exposures grouped by their key at `level`.
    pub(crate) fn build<F>(exposures: &'a [CrmExposure], level: BeneficiaryLevel, weight: F) -> Self
    where
        F: Fn(&CrmExposure) -> f64,
    {
        let mut totals: HashMap<&'a str, f64> = HashMap::new();
        for e in exposures {
            if let Some(key) = level_key(e, level) {
                *totals.entry(key).or_insert(0.0) += weight(e);
            }
        }
        Self { totals }
    }

    /// Group total, zero for unknown keys.
    pub(crate) fn total(&self, key: &str) -> f64 {
        self.totals.get(key).copied().unwrap_or(0.0)
    }

    /// Share of the group carried by `weight`; zero when the group total is not positive.
    pub(crate) fn share(&self, key: &str, weight: f64) -> f64 {
        let total = self.total(key);
        if total > 0.0 {
            weight / total
        } else {
            0.0
        }
    }
}

/// A CRM item linked to an exposure, facility or counterparty.
pub(crate) trait Beneficiary {
    /// Level the item is pledged at.
    fn level(&self) -> BeneficiaryLevel;
    /// Reference of the beneficiary at that level.
    fn beneficiary(&self) -> &str;
}

impl Beneficiary for CollateralItem {
    fn level(&self) -> BeneficiaryLevel {
        self.beneficiary_level
    }
    fn beneficiary(&self) -> &str {
        &self.beneficiary_reference
    }
}

impl Beneficiary for GuaranteeItem {
    fn level(&self) -> BeneficiaryLevel {
        self.beneficiary_level
    }
    fn beneficiary(&self) -> &str {
        &self.beneficiary_reference
    }
}

impl Beneficiary for ProvisionItem {
    fn level(&self) -> BeneficiaryLevel {
        self.beneficiary_level
    }
    fn beneficiary(&self) -> &str {
        &self.beneficiary_reference
    }
}

/// Sums item amounts by beneficiary reference for one level.
pub(crate) fn sum_by_beneficiary<T, A>(
    items: &[T],
    level: BeneficiaryLevel,
    amount_of: A,
) -> HashMap<&str, f64>
where
    T: Beneficiary,
    A: Fn(&T) -> f64,
{
    let mut sums: HashMap<&str, f64> = HashMap::new();
    for item in items.iter().filter(|i| i.level() == level) {
        *sums.entry(item.beneficiary()).or_insert(0.0) += amount_of(item);
    }
    sums
}
