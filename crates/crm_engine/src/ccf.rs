//! Credit conversion factors.
//!
//! | Approach | Source of the factor |
//! |----------|----------------------|
//! | SA, slotting | standardised table by risk type |
//! | FIRB | 75% for MR/MLR, short-term trade LC exception at 20% |
//! | AIRB | own estimate, SA fallback, floored at a share of SA where the framework requires |
//!
//! A row with no nominal gets a factor of zero.

use crate::exposure::CrmExposure;
use crate::stage::{ExposureTransform, StageContext};
use crm_core::{Approach, FrameworkParams, ParallelConfig, RiskType};
use tracing::debug;

/// Conversion factor for an approach and risk category.
pub fn ccf_for(
    params: &FrameworkParams,
    approach: Approach,
    risk_type: Option<RiskType>,
    ccf_modelled: Option<f64>,
    short_term_trade_lc: bool,
) -> f64 {
    let sa = params.sa_ccf(risk_type);
    match approach {
        Approach::Standardised | Approach::Slotting => sa,
        Approach::FoundationIrb => params.firb_ccf(risk_type, short_term_trade_lc),
        Approach::AdvancedIrb => {
            let own = ccf_modelled.unwrap_or(sa);
            match params.airb_ccf_floor_ratio {
                Some(ratio) => own.max(sa * ratio),
                None => own,
            }
        }
    }
}

/// Applies the CCF and computes pre-CRM exposure value.
#[derive(Debug, Clone, Copy)]
pub struct CcfStage<'a> {
    params: &'a FrameworkParams,
    parallel: &'a ParallelConfig,
}

impl<'a> CcfStage<'a> {
    /// Creates the stage.
    pub fn new(params: &'a FrameworkParams, parallel: &'a ParallelConfig) -> Self {
        Self { params, parallel }
    }
}

impl ExposureTransform for CcfStage<'_> {
    fn name(&self) -> &'static str {
        "ccf"
    }

    fn apply(&self, exposures: Vec<CrmExposure>, _ctx: &mut StageContext) -> Vec<CrmExposure> {
        let out = self
            .parallel
            .map_owned(exposures, |e| apply_ccf(e, self.params));
        debug!(
            rows = out.len(),
            ead_from_ccf = out.iter().map(|e| e.ead_from_ccf).sum::<f64>(),
            "Applied CCF"
        );
        out
    }
}

/// Sets `ccf`, `ead_from_ccf`, `ead_pre_crm` and the CCF audit string.
pub fn apply_ccf(mut e: CrmExposure, params: &FrameworkParams) -> CrmExposure {
    e.ccf = if e.nominal_amount == 0.0 {
        0.0
    } else {
        ccf_for(
            params,
            e.approach,
            e.risk_type,
            e.ccf_modelled,
            e.is_short_term_trade_lc,
        )
    };
    e.ead_from_ccf = e.nominal_after_provision() * e.ccf;
    e.ead_pre_crm = e.on_balance_after_provision() + e.ead_from_ccf;
    e.ccf_calculation = format!(
        "CCF={:.0}%; risk_type={}; drawn={:.0}; interest={:.0}; nominal={:.0}; ead_ccf={:.0}",
        e.ccf * 100.0,
        e.risk_type
            .map(|r| r.to_string())
            .unwrap_or_else(|| "unknown".to_string()),
        e.drawn_amount,
        e.interest,
        e.nominal_amount,
        e.ead_from_ccf,
    );
    e
}

/// EAD split when the guaranteed share takes a different CCF.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CcfBlend {
    /// Exposure value of the guaranteed share.
    pub guaranteed: f64,
    /// Exposure value of the unguaranteed share.
    pub unguaranteed: f64,
    /// Off-balance contribution across both shares.
    pub ead_from_ccf: f64,
}

/// Recomputes EAD with `ccf_guaranteed` on the covered share and the
/// exposure's own CCF on the rest.
///
/// The on-balance part and the post-provision nominal are split by
/// `ratio`, clamped to `[0, 1]`.
pub fn blend_cross_approach(e: &CrmExposure, ratio: f64, ccf_guaranteed: f64) -> CcfBlend {
    let ratio = ratio.clamp(0.0, 1.0);
    let on_bal = e.on_balance_after_provision();
    let nominal = e.nominal_after_provision();
    let off_guaranteed = nominal * ratio * ccf_guaranteed;
    let off_unguaranteed = nominal * (1.0 - ratio) * e.ccf_original;
    CcfBlend {
        guaranteed: on_bal * ratio + off_guaranteed,
        unguaranteed: on_bal * (1.0 - ratio) + off_unguaranteed,
        ead_from_ccf: off_guaranteed + off_unguaranteed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crm_core::ExposureClass;

    fn contingent(approach: Approach, risk_type: Option<RiskType>) -> CrmExposure {
        CrmExposure::new("C1", "CP1", ExposureClass::Corporate, approach)
            .with_nominal(1_000.0, risk_type)
    }

    #[test]
    fn test_sa_table_by_framework() {
        let crr = FrameworkParams::crr();
        let b31 = FrameworkParams::basel_3_1();
        let lr = Some(RiskType::LowRisk);
        assert_eq!(ccf_for(&crr, Approach::Standardised, lr, None, false), 0.0);
        assert_eq!(ccf_for(&b31, Approach::Standardised, lr, None, false), 0.10);
        assert_eq!(ccf_for(&crr, Approach::Slotting, Some(RiskType::FullRisk), None, false), 1.0);
    }

    #[test]
    fn test_firb_trade_lc_exception() {
        let crr = FrameworkParams::crr();
        let mlr = Some(RiskType::MediumLowRisk);
        assert_eq!(ccf_for(&crr, Approach::FoundationIrb, mlr, None, false), 0.75);
        assert_eq!(ccf_for(&crr, Approach::FoundationIrb, mlr, None, true), 0.20);
    }

    #[test]
    fn test_airb_floor_only_under_basel_3_1() {
        let mr = Some(RiskType::MediumRisk);
        let crr = FrameworkParams::crr();
        let b31 = FrameworkParams::basel_3_1();
        assert_eq!(ccf_for(&crr, Approach::AdvancedIrb, mr, Some(0.10), false), 0.10);
        assert_relative_eq!(ccf_for(&b31, Approach::AdvancedIrb, mr, Some(0.10), false), 0.25);
        assert_eq!(ccf_for(&b31, Approach::AdvancedIrb, mr, None, false), 0.5);
    }

    #[test]
    fn test_zero_nominal_has_zero_ccf() {
        let e = CrmExposure::new("L1", "CP1", ExposureClass::Corporate, Approach::Standardised)
            .with_drawn(500.0)
            .with_interest(10.0);
        let e = apply_ccf(e, &FrameworkParams::crr());
        assert_eq!(e.ccf, 0.0);
        assert_relative_eq!(e.ead_pre_crm, 510.0);
    }

    #[test]
    fn test_ead_uses_nominal_after_provision() {
        let mut e = contingent(Approach::Standardised, Some(RiskType::MediumRisk)).with_drawn(100.0);
        e.provision.allocated = 300.0;
        e.provision.on_drawn = 100.0;
        e.provision.on_nominal = 200.0;
        let e = apply_ccf(e, &FrameworkParams::crr());
        assert_relative_eq!(e.ead_from_ccf, 400.0);
        assert_relative_eq!(e.ead_pre_crm, 400.0);
    }

    #[test]
    fn test_audit_string() {
        let e = apply_ccf(contingent(Approach::Standardised, None), &FrameworkParams::crr());
        assert_eq!(
            e.ccf_calculation,
            "CCF=50%; risk_type=unknown; drawn=0; interest=0; nominal=1000; ead_ccf=500"
        );
    }

    #[test]
    fn test_cross_approach_blend() {
        let mut e = apply_ccf(
            contingent(Approach::FoundationIrb, Some(RiskType::MediumRisk)).with_drawn(1_000.0),
            &FrameworkParams::crr(),
        );
        e.ccf_original = e.ccf;
        let blend = blend_cross_approach(&e, 0.5, 0.5);
        // on-balance 1000 split evenly; nominal 1000 at 50% / 75%.
        assert_relative_eq!(blend.guaranteed, 500.0 + 250.0);
        assert_relative_eq!(blend.unguaranteed, 500.0 + 375.0);
        assert_relative_eq!(blend.ead_from_ccf, 625.0);
    }
}
