//! Inputs to one CRM run.

use crate::exposure::CrmExposure;
use crm_core::{Approach, CrmIssue, ExposureClass, Relation};
use crm_hierarchy::{
    CollateralItem, CounterpartyLookup, CounterpartyProfile, GuaranteeItem, ProvisionItem,
    ResolvedHierarchy, UnifiedExposure,
};

/// Classified exposures plus the optional CRM relations.
///
/// `None` for a relation means the source did not supply it; the matching
/// stage is skipped.
#[derive(Debug, Clone, Default)]
pub struct CrmInputs {
    /// Classified exposure rows.
    pub exposures: Vec<CrmExposure>,
    /// Collateral.
    pub collateral: Option<Relation<CollateralItem>>,
    /// Guarantees.
    pub guarantees: Option<Relation<GuaranteeItem>>,
    /// Provisions.
    pub provisions: Option<Relation<ProvisionItem>>,
    /// Counterparty profiles used to treat guarantors.
    pub counterparty_lookup: Option<CounterpartyLookup>,
    /// Issues carried over from earlier processing.
    pub issues: Vec<CrmIssue>,
}

impl CrmInputs {
    /// Inputs with exposures only.
    pub fn new(exposures: Vec<CrmExposure>) -> Self {
        Self {
            exposures,
            ..Self::default()
        }
    }

    /// Builds inputs from a resolved hierarchy.
    ///
    /// `classify` assigns each unified row its exposure class and approach
    /// given the obligor's profile. Resolution issues are carried forward.
    pub fn from_resolved<F>(resolved: ResolvedHierarchy, classify: F) -> Self
    where
        F: Fn(&UnifiedExposure, Option<&CounterpartyProfile>) -> (ExposureClass, Approach),
    {
        let lookup = resolved.counterparty_lookup;
        let exposures = resolved
            .exposures
            .into_iter()
            .map(|row| {
                let (class, approach) = classify(&row, lookup.get(&row.counterparty));
                CrmExposure::from_unified(row, class, approach)
            })
            .collect();

        Self {
            exposures,
            collateral: resolved.collateral,
            guarantees: resolved.guarantees,
            provisions: resolved.provisions,
            counterparty_lookup: Some(lookup),
            issues: resolved.issues,
        }
    }

    /// Sets the collateral relation.
    pub fn with_collateral(mut self, collateral: Relation<CollateralItem>) -> Self {
        self.collateral = Some(collateral);
        self
    }

    /// Sets the guarantee relation.
    pub fn with_guarantees(mut self, guarantees: Relation<GuaranteeItem>) -> Self {
        self.guarantees = Some(guarantees);
        self
    }

    /// Sets the provision relation.
    pub fn with_provisions(mut self, provisions: Relation<ProvisionItem>) -> Self {
        self.provisions = Some(provisions);
        self
    }

    /// Sets the counterparty lookup.
    pub fn with_counterparty_lookup(mut self, lookup: CounterpartyLookup) -> Self {
        self.counterparty_lookup = Some(lookup);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crm_core::CalculationConfig;
    use crm_hierarchy::{Counterparty, HierarchyResolver, Loan, RawDataBuilder};

    #[test]
    fn test_from_resolved_applies_classifier() {
        let data = RawDataBuilder::new()
            .add_counterparty(Counterparty::new("CP1", "bank"))
            .add_loan(Loan::new("L1", "CP1", "GBP", 100.0))
            .build()
            .unwrap();
        let resolved = HierarchyResolver::new(CalculationConfig::default()).resolve(data);

        let inputs = CrmInputs::from_resolved(resolved, |_, profile| {
            let class = profile
                .and_then(|p| p.exposure_class)
                .unwrap_or(ExposureClass::Other);
            (class, Approach::Standardised)
        });

        assert_eq!(inputs.exposures.len(), 1);
        assert_eq!(inputs.exposures[0].exposure_class, ExposureClass::Institution);
        assert!(inputs.counterparty_lookup.is_some());
        assert!(inputs.collateral.is_none());
    }
}
