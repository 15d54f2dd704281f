//! Per-exposure CRM audit trail.

use crate::exposure::{CrmExposure, GuarantorApproach};
use crm_core::{Approach, CounterpartyId, ExposureClass, ExposureId};

/// Flat audit row for one exposure after CRM.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CrmAuditRecord {
    /// Exposure reference.
    pub exposure_reference: ExposureId,
    /// Obligor.
    pub counterparty: CounterpartyId,
    /// Calculation approach.
    pub approach: Approach,
    /// EAD after provisions and CCF.
    pub ead_gross: f64,
    /// Off-balance contribution to EAD.
    pub ead_from_ccf: f64,
    /// Conversion factor applied.
    pub ccf: f64,
    /// Adjusted collateral allocated.
    pub collateral_adjusted_value: f64,
    /// Guarantee amount before capping.
    pub guarantee_amount: f64,
    /// Provision allocated.
    pub provision_allocated: f64,
    /// Final EAD.
    pub ead_final: f64,
    /// LGD before collateral.
    pub lgd_pre_crm: f64,
    /// LGD after collateral.
    pub lgd_post_crm: f64,
    /// CRM audit string.
    pub crm_calculation: String,
    /// Counterparty before CRM.
    pub pre_crm_counterparty: CounterpartyId,
    /// Exposure class before CRM.
    pub pre_crm_exposure_class: ExposureClass,
    /// Counterparty of the guaranteed portion.
    pub post_crm_counterparty_guaranteed: CounterpartyId,
    /// Exposure class of the guaranteed portion.
    pub post_crm_exposure_class_guaranteed: ExposureClass,
    /// Whether any part is guaranteed.
    pub is_guaranteed: bool,
    /// Covered part of EAD.
    pub guaranteed_portion: f64,
    /// Uncovered part of EAD.
    pub unguaranteed_portion: f64,
    /// Guarantor reference.
    pub guarantor_reference: Option<CounterpartyId>,
    /// CCF before cross-approach substitution.
    pub ccf_original: f64,
    /// CCF on the guaranteed share.
    pub ccf_guaranteed: f64,
    /// CCF on the unguaranteed share.
    pub ccf_unguaranteed: f64,
    /// Covered share of EAD.
    pub guarantee_ratio: f64,
    /// Guarantor treatment.
    pub guarantor_approach: Option<GuarantorApproach>,
}

impl From<&CrmExposure> for CrmAuditRecord {
    fn from(e: &CrmExposure) -> Self {
        Self {
            exposure_reference: e.reference.clone(),
            counterparty: e.counterparty.clone(),
            approach: e.approach,
            ead_gross: e.ead_gross,
            ead_from_ccf: e.ead_from_ccf,
            ccf: e.ccf,
            collateral_adjusted_value: e.collateral.adjusted_value,
            guarantee_amount: e.guarantee.amount,
            provision_allocated: e.provision.allocated,
            ead_final: e.ead_final,
            lgd_pre_crm: e.lgd_pre_crm,
            lgd_post_crm: e.lgd_post_crm,
            crm_calculation: e.crm_calculation.clone(),
            pre_crm_counterparty: e.counterparty.clone(),
            pre_crm_exposure_class: e.exposure_class,
            post_crm_counterparty_guaranteed: e.post_crm_counterparty_guaranteed().clone(),
            post_crm_exposure_class_guaranteed: e.post_crm_exposure_class_guaranteed(),
            is_guaranteed: e.is_guaranteed(),
            guaranteed_portion: e.guarantee.guaranteed_portion,
            unguaranteed_portion: e.guarantee.unguaranteed_portion,
            guarantor_reference: e.guarantee.guarantor.clone(),
            ccf_original: e.ccf_original,
            ccf_guaranteed: e.ccf_guaranteed,
            ccf_unguaranteed: e.ccf_unguaranteed,
            guarantee_ratio: e.guarantee.guarantee_ratio,
            guarantor_approach: e.guarantee.guarantor_approach,
        }
    }
}

/// Builds the audit trail for a set of exposures.
pub fn build_audit(exposures: &[CrmExposure]) -> Vec<CrmAuditRecord> {
    exposures.iter().map(CrmAuditRecord::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exposure::GuaranteeStatus;

    #[test]
    fn test_audit_reports_guarantor_side() {
        let mut e = CrmExposure::new("L1", "CP1", ExposureClass::Corporate, Approach::Standardised);
        e.guarantee.guaranteed_portion = 10.0;
        e.guarantee.guarantor = Some(CounterpartyId::new("GOV"));
        e.guarantee.guarantor_exposure_class = Some(ExposureClass::CentralGovtCentralBank);
        e.guarantee.status = GuaranteeStatus::SaRwSubstitution;

        let record = CrmAuditRecord::from(&e);
        assert!(record.is_guaranteed);
        assert_eq!(record.pre_crm_counterparty.as_str(), "CP1");
        assert_eq!(record.post_crm_counterparty_guaranteed.as_str(), "GOV");
        assert_eq!(
            record.post_crm_exposure_class_guaranteed,
            ExposureClass::CentralGovtCentralBank
        );
    }

    #[test]
    fn test_audit_unguaranteed_defaults() {
        let e = CrmExposure::new("L1", "CP1", ExposureClass::RetailOther, Approach::Standardised);
        let audit = build_audit(std::slice::from_ref(&e));
        assert_eq!(audit.len(), 1);
        assert!(!audit[0].is_guaranteed);
        assert_eq!(audit[0].guarantor_reference, None);
        assert_eq!(audit[0].post_crm_exposure_class_guaranteed, ExposureClass::RetailOther);
    }
}
