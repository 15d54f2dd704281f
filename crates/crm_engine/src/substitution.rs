//! Risk parameters compared during guarantee substitution.
//!
//! Standardised risk weights by class and credit-quality step, the
//! borrower's own parameter, and how a guarantor is treated.

use crate::exposure::{CrmExposure, GuarantorApproach};
use crate::irb;
use chrono::NaiveDate;
use crm_core::{Approach, ExposureClass, FrameworkParams, IrbPermissions};

/// Central governments and central banks, CQS 1 to 6.
const SOVEREIGN: [f64; 6] = [0.0, 0.20, 0.50, 1.00, 1.00, 1.50];
const SOVEREIGN_UNRATED: f64 = 1.00;

/// Institutions, CQS 1 to 6. CQS 2 is 30% in a sterling book.
const INSTITUTION: [f64; 6] = [0.20, 0.50, 0.50, 1.00, 1.00, 1.50];
const INSTITUTION_CQS2_GBP: f64 = 0.30;
const INSTITUTION_UNRATED: f64 = 0.40;

/// Corporates, CQS 1 to 6.
const CORPORATE: [f64; 6] = [0.20, 0.50, 1.00, 1.00, 1.50, 1.50];
const CORPORATE_UNRATED: f64 = 1.00;

const RETAIL: f64 = 0.75;
const RETAIL_MORTGAGE: f64 = 0.35;
const DEFAULT_RW: f64 = 1.00;

fn by_cqs(table: &[f64; 6], cqs: Option<u8>, unrated: f64) -> f64 {
    match cqs {
        Some(step @ 1..=6) => table[usize::from(step) - 1],
        _ => unrated,
    }
}

/// Standardised risk weight of a guarantor.
///
/// Only sovereigns, institutions and corporates can substitute; every
/// other class returns `None`.
pub fn guarantor_sa_risk_weight(
    class: ExposureClass,
    cqs: Option<u8>,
    base_currency: &str,
) -> Option<f64> {
    let rw = match class {
        ExposureClass::CentralGovtCentralBank => by_cqs(&SOVEREIGN, cqs, SOVEREIGN_UNRATED),
        ExposureClass::Institution => match cqs {
            Some(2) if base_currency.eq_ignore_ascii_case("GBP") => INSTITUTION_CQS2_GBP,
            _ => by_cqs(&INSTITUTION, cqs, INSTITUTION_UNRATED),
        },
        ExposureClass::Corporate | ExposureClass::CorporateSme => {
            by_cqs(&CORPORATE, cqs, CORPORATE_UNRATED)
        }
        _ => return None,
    };
    Some(rw)
}

/// Standardised risk weight of a borrower before substitution.
pub fn borrower_sa_risk_weight(class: ExposureClass, cqs: Option<u8>, base_currency: &str) -> f64 {
    match class {
        ExposureClass::RetailOther | ExposureClass::RetailQrre => RETAIL,
        ExposureClass::RetailMortgage => RETAIL_MORTGAGE,
        _ => guarantor_sa_risk_weight(class, cqs, base_currency).unwrap_or(DEFAULT_RW),
    }
}

/// Borrower parameter the guarantor is compared against.
///
/// A caller-supplied pre-CRM weight wins. IRB exposures with a PD go
/// through the capital formula on their post-collateral LGD; everything
/// else uses the standardised table.
pub fn borrower_risk_weight(
    exposure: &CrmExposure,
    params: &FrameworkParams,
    base_currency: &str,
    reporting_date: NaiveDate,
) -> f64 {
    if let Some(rw) = exposure.pre_crm_risk_weight {
        return rw;
    }
    match (exposure.approach, exposure.pd) {
        (Approach::FoundationIrb | Approach::AdvancedIrb, Some(pd)) => irb::risk_weight(
            params,
            exposure.exposure_class,
            pd,
            exposure.lgd_post_crm,
            exposure.residual_maturity_years(reporting_date),
        ),
        _ => borrower_sa_risk_weight(exposure.exposure_class, exposure.cqs, base_currency),
    }
}

/// Treatment of a guarantor.
///
/// IRB needs both a permission for the guarantor's class and an internal
/// rating; a known class without both is standardised; an unknown class
/// cannot substitute.
pub fn guarantor_approach(
    permissions: &IrbPermissions,
    class: Option<ExposureClass>,
    internally_rated: bool,
) -> Option<GuarantorApproach> {
    let class = class?;
    if internally_rated && permissions.permits_irb(class) {
        Some(GuarantorApproach::Irb)
    } else {
        Some(GuarantorApproach::Sa)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sovereign_table() {
        assert_eq!(guarantor_sa_risk_weight(ExposureClass::CentralGovtCentralBank, Some(1), "EUR"), Some(0.0));
        assert_eq!(guarantor_sa_risk_weight(ExposureClass::CentralGovtCentralBank, Some(6), "EUR"), Some(1.5));
        assert_eq!(guarantor_sa_risk_weight(ExposureClass::CentralGovtCentralBank, None, "EUR"), Some(1.0));
    }

    #[test]
    fn test_institution_cqs2_depends_on_base_currency() {
        assert_eq!(guarantor_sa_risk_weight(ExposureClass::Institution, Some(2), "GBP"), Some(0.30));
        assert_eq!(guarantor_sa_risk_weight(ExposureClass::Institution, Some(2), "EUR"), Some(0.50));
        assert_eq!(guarantor_sa_risk_weight(ExposureClass::Institution, None, "GBP"), Some(0.40));
    }

    #[test]
    fn test_other_classes_cannot_substitute() {
        assert_eq!(guarantor_sa_risk_weight(ExposureClass::Mdb, Some(1), "GBP"), None);
        assert_eq!(guarantor_sa_risk_weight(ExposureClass::RetailOther, None, "GBP"), None);
    }

    #[test]
    fn test_out_of_range_cqs_is_unrated() {
        assert_eq!(guarantor_sa_risk_weight(ExposureClass::Corporate, Some(9), "GBP"), Some(1.0));
    }

    #[test]
    fn test_borrower_table() {
        assert_eq!(borrower_sa_risk_weight(ExposureClass::RetailOther, Some(1), "GBP"), 0.75);
        assert_eq!(borrower_sa_risk_weight(ExposureClass::RetailMortgage, None, "GBP"), 0.35);
        assert_eq!(borrower_sa_risk_weight(ExposureClass::Corporate, Some(1), "GBP"), 0.20);
        assert_eq!(borrower_sa_risk_weight(ExposureClass::Equity, None, "GBP"), 1.0);
    }

    #[test]
    fn test_borrower_rw_prefers_supplied_weight() {
        let date = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let params = FrameworkParams::crr();
        let e = CrmExposure::new("L1", "CP1", ExposureClass::Corporate, Approach::Standardised)
            .with_cqs(1)
            .with_pre_crm_risk_weight(0.65);
        assert_eq!(borrower_risk_weight(&e, &params, "GBP", date), 0.65);
    }

    #[test]
    fn test_borrower_rw_irb_uses_formula() {
        let date = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let params = FrameworkParams::basel_3_1();
        let mut e = CrmExposure::new("L1", "CP1", ExposureClass::Corporate, Approach::FoundationIrb)
            .with_pd(0.01);
        e.lgd_post_crm = 0.40;
        let expected = irb::risk_weight(&params, ExposureClass::Corporate, 0.01, 0.40, None);
        assert_relative_eq!(borrower_risk_weight(&e, &params, "GBP", date), expected);

        let no_pd = CrmExposure::new("L2", "CP1", ExposureClass::Corporate, Approach::FoundationIrb);
        assert_eq!(borrower_risk_weight(&no_pd, &params, "GBP", date), 1.0);
    }

    #[test]
    fn test_guarantor_approach() {
        let firb = IrbPermissions::firb_only();
        let sa = IrbPermissions::sa_only();
        let corp = Some(ExposureClass::Corporate);
        assert_eq!(guarantor_approach(&firb, corp, true), Some(GuarantorApproach::Irb));
        assert_eq!(guarantor_approach(&firb, corp, false), Some(GuarantorApproach::Sa));
        assert_eq!(guarantor_approach(&sa, corp, true), Some(GuarantorApproach::Sa));
        assert_eq!(guarantor_approach(&firb, None, true), None);
    }
}
