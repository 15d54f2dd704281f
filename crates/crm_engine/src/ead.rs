//! EAD initialisation and finalisation around the CRM stages.

use crate::exposure::CrmExposure;
use crate::stage::{ExposureTransform, StageContext};
use crm_core::{FrameworkParams, ParallelConfig};

/// Seeds the EAD waterfall and pre-CRM LGD after the CCF stage.
#[derive(Debug, Clone, Copy)]
pub struct InitializeEad<'a> {
    params: &'a FrameworkParams,
    parallel: &'a ParallelConfig,
}

impl<'a> InitializeEad<'a> {
    /// Creates the stage.
    pub fn new(params: &'a FrameworkParams, parallel: &'a ParallelConfig) -> Self {
        Self { params, parallel }
    }
}

impl ExposureTransform for InitializeEad<'_> {
    fn name(&self) -> &'static str {
        "initialize_ead"
    }

    fn apply(&self, exposures: Vec<CrmExposure>, _ctx: &mut StageContext) -> Vec<CrmExposure> {
        self.parallel
            .map_owned(exposures, |e| initialize_ead(e, self.params))
    }
}

/// Every EAD field starts at `ead_pre_crm`; LGD starts at the own estimate
/// or the unsecured supervisory value for the seniority.
pub fn initialize_ead(mut e: CrmExposure, params: &FrameworkParams) -> CrmExposure {
    e.ead_gross = e.ead_pre_crm;
    e.ead_after_collateral = e.ead_pre_crm;
    e.ead_after_guarantee = e.ead_pre_crm;
    e.ead_final = e.ead_pre_crm;

    let lgd = e.lgd.unwrap_or_else(|| params.unsecured_lgd(e.seniority));
    e.lgd_pre_crm = lgd;
    e.lgd_post_crm = lgd;

    e.ccf_original = e.ccf;
    e.ccf_guaranteed = e.ccf;
    e.ccf_unguaranteed = e.ccf;

    e.guarantee.unguaranteed_portion = e.ead_pre_crm;
    e
}

/// Closes the EAD waterfall and writes the CRM audit string.
#[derive(Debug, Clone, Copy)]
pub struct FinalizeEad<'a> {
    parallel: &'a ParallelConfig,
}

impl<'a> FinalizeEad<'a> {
    /// Creates the stage.
    pub fn new(parallel: &'a ParallelConfig) -> Self {
        Self { parallel }
    }
}

impl ExposureTransform for FinalizeEad<'_> {
    fn name(&self) -> &'static str {
        "finalize_ead"
    }

    fn apply(&self, exposures: Vec<CrmExposure>, _ctx: &mut StageContext) -> Vec<CrmExposure> {
        self.parallel.map_owned(exposures, finalize_ead)
    }
}

/// Sets `ead_after_guarantee` and a non-negative `ead_final`.
pub fn finalize_ead(mut e: CrmExposure) -> CrmExposure {
    e.ead_after_guarantee = e.ead_after_collateral;
    e.ead_final = e.ead_after_collateral.max(0.0);
    if e.guarantee.guaranteed_portion == 0.0 {
        e.guarantee.unguaranteed_portion = e.ead_final;
    }
    e.crm_calculation = crm_calculation(&e);
    e
}

/// `EAD: gross=..; coll=..; guar=..; prov=..; final=..` with whole amounts.
pub fn crm_calculation(e: &CrmExposure) -> String {
    format!(
        "EAD: gross={:.0}; coll={:.0}; guar={:.0}; prov={:.0}; final={:.0}",
        e.ead_gross,
        e.collateral.adjusted_value,
        e.guarantee.amount,
        e.provision.allocated,
        e.ead_final,
    )
}
