//! CRM state machine.
//!
//! ```text
//! Raw → ProvisionsResolved → CcfApplied → EadInitialized
//!     → CollateralApplied → GuaranteesApplied → Finalized
//! ```
//!
//! [`CrmRun::advance`] moves exactly one state forward. [`CrmRun::run`]
//! drives to [`CrmState::Finalized`] and returns the [`CrmAdjustedBundle`].
//! Rows are compacted after EAD initialisation, and after collateral when
//! `materialise_after_collateral` is set.

use crate::audit::{build_audit, CrmAuditRecord};
use crate::ccf::CcfStage;
use crate::collateral::{CollateralAllocation, CollateralAllocator};
use crate::ead::{FinalizeEad, InitializeEad};
use crate::exposure::CrmExposure;
use crate::guarantees::GuaranteeSubstitution;
use crate::inputs::CrmInputs;
use crate::provisions::ProvisionWaterfall;
use crate::stage::{ExposureTransform, StageContext};
use crm_core::{
    Approach, CalculationConfig, CrmError, CrmIssue, FrameworkParams, Relation,
};
use crm_hierarchy::{CollateralItem, CounterpartyLookup, GuaranteeItem, ProvisionItem};
use std::fmt;
use std::time::Instant;
use tracing::{debug, info};

/// Position of a run in the CRM pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CrmState {
    /// Classified rows, nothing applied.
    Raw,
    /// Provisions allocated and deducted.
    ProvisionsResolved,
    /// CCF applied, pre-CRM EAD known.
    CcfApplied,
    /// EAD waterfall and pre-CRM LGD seeded.
    EadInitialized,
    /// Collateral allocated.
    CollateralApplied,
    /// Guarantees substituted.
    GuaranteesApplied,
    /// EAD final and audit strings written.
    Finalized,
}

impl CrmState {
    /// The following state, `None` at [`CrmState::Finalized`].
    pub fn next(self) -> Option<Self> {
        match self {
            CrmState::Raw => Some(CrmState::ProvisionsResolved),
            CrmState::ProvisionsResolved => Some(CrmState::CcfApplied),
            CrmState::CcfApplied => Some(CrmState::EadInitialized),
            CrmState::EadInitialized => Some(CrmState::CollateralApplied),
            CrmState::CollateralApplied => Some(CrmState::GuaranteesApplied),
            CrmState::GuaranteesApplied => Some(CrmState::Finalized),
            CrmState::Finalized => None,
        }
    }
}

impl fmt::Display for CrmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CrmState::Raw => "Raw",
            CrmState::ProvisionsResolved => "ProvisionsResolved",
            CrmState::CcfApplied => "CcfApplied",
            CrmState::EadInitialized => "EadInitialized",
            CrmState::CollateralApplied => "CollateralApplied",
            CrmState::GuaranteesApplied => "GuaranteesApplied",
            CrmState::Finalized => "Finalized",
        };
        write!(f, "{}", s)
    }
}

/// Output of a finished run.
#[derive(Debug, Clone, Default)]
pub struct CrmAdjustedBundle {
    /// Every exposure, in input order.
    pub exposures: Vec<CrmExposure>,
    /// Standardised exposures.
    pub sa_exposures: Vec<CrmExposure>,
    /// Foundation and advanced IRB exposures.
    pub irb_exposures: Vec<CrmExposure>,
    /// Slotting exposures.
    pub slotting_exposures: Vec<CrmExposure>,
    /// Audit row per exposure.
    pub audit: Vec<CrmAuditRecord>,
    /// Per-item collateral allocations.
    pub collateral_allocations: Vec<CollateralAllocation>,
    /// Non-fatal issues from resolution and every stage.
    pub issues: Vec<CrmIssue>,
}

impl CrmAdjustedBundle {
    fn new(exposures: Vec<CrmExposure>, ctx: StageContext) -> Self {
        let by_approach = |pred: fn(Approach) -> bool| -> Vec<CrmExposure> {
            exposures
                .iter()
                .filter(|e| pred(e.approach))
                .cloned()
                .collect()
        };
        let sa_exposures = by_approach(|a| a == Approach::Standardised);
        let irb_exposures = by_approach(Approach::is_irb);
        let slotting_exposures = by_approach(|a| a == Approach::Slotting);
        let audit = build_audit(&exposures);

        Self {
            exposures,
            sa_exposures,
            irb_exposures,
            slotting_exposures,
            audit,
            collateral_allocations: ctx.allocations,
            issues: ctx.issues,
        }
    }

    /// Returns `true` when any issue was recorded.
    pub fn is_degraded(&self) -> bool {
        !self.issues.is_empty()
    }

    /// Sum of final EAD.
    pub fn total_ead_final(&self) -> f64 {
        self.exposures.iter().map(|e| e.ead_final).sum()
    }
}

/// Runs the CRM stages under one validated configuration.
#[derive(Debug, Clone)]
pub struct CrmOrchestrator {
    config: CalculationConfig,
    params: FrameworkParams,
}

impl CrmOrchestrator {
    /// Validates the configuration and resolves framework parameters.
    ///
    /// # Errors
    ///
    /// Returns [`CrmError::Config`] when validation fails.
    pub fn new(config: CalculationConfig) -> Result<Self, CrmError> {
        config.validate()?;
        let params = config.params();
        info!(
            framework = %config.framework,
            base_currency = %config.base_currency,
            "CRM orchestrator configured"
        );
        Ok(Self { config, params })
    }

    /// Configuration in use.
    pub fn config(&self) -> &CalculationConfig {
        &self.config
    }

    /// Framework parameters in use.
    pub fn params(&self) -> &FrameworkParams {
        &self.params
    }

    /// Starts a run at [`CrmState::Raw`].
    pub fn start(&self, inputs: CrmInputs) -> CrmRun<'_> {
        info!(rows = inputs.exposures.len(), "Starting CRM run");
        CrmRun {
            orchestrator: self,
            state: CrmState::Raw,
            exposures: inputs.exposures,
            collateral: inputs.collateral,
            guarantees: inputs.guarantees,
            provisions: inputs.provisions,
            counterparty_lookup: inputs.counterparty_lookup,
            ctx: StageContext {
                issues: inputs.issues,
                allocations: Vec::new(),
            },
        }
    }

    /// Runs every stage and returns the adjusted bundle.
    ///
    /// # Errors
    ///
    /// Propagates [`CrmError`] from the state machine.
    pub fn run(&self, inputs: CrmInputs) -> Result<CrmAdjustedBundle, CrmError> {
        self.start(inputs).run()
    }
}

/// One CRM run in progress.
#[derive(Debug)]
pub struct CrmRun<'a> {
    orchestrator: &'a CrmOrchestrator,
    state: CrmState,
    exposures: Vec<CrmExposure>,
    collateral: Option<Relation<CollateralItem>>,
    guarantees: Option<Relation<GuaranteeItem>>,
    provisions: Option<Relation<ProvisionItem>>,
    counterparty_lookup: Option<CounterpartyLookup>,
    ctx: StageContext,
}

impl CrmRun<'_> {
    /// Current state.
    pub fn state(&self) -> CrmState {
        self.state
    }

    /// Rows as of the current state.
    pub fn exposures(&self) -> &[CrmExposure] {
        &self.exposures
    }

    /// Issues recorded so far.
    pub fn issues(&self) -> &[CrmIssue] {
        &self.ctx.issues
    }

    /// Applies the next stage.
    ///
    /// # Errors
    ///
    /// Returns [`CrmError::InvalidTransition`] once the run is finalized.
    pub fn advance(&mut self) -> Result<CrmState, CrmError> {
        let next = self
            .state
            .next()
            .ok_or_else(|| CrmError::InvalidTransition(self.state.to_string()))?;

        let started = Instant::now();
        let config = &self.orchestrator.config;
        let params = &self.orchestrator.params;
        let parallel = &config.parallel;
        let rows = std::mem::take(&mut self.exposures);

        self.exposures = match next {
            CrmState::Raw => rows,
            CrmState::ProvisionsResolved => {
                ProvisionWaterfall::new(self.provisions.as_ref(), parallel).apply(rows, &mut self.ctx)
            }
            CrmState::CcfApplied => CcfStage::new(params, parallel).apply(rows, &mut self.ctx),
            CrmState::EadInitialized => {
                InitializeEad::new(params, parallel).apply(rows, &mut self.ctx)
            }
            CrmState::CollateralApplied => CollateralAllocator::new(
                params,
                config.reporting_date,
                self.collateral.as_ref(),
                parallel,
            )
            .apply(rows, &mut self.ctx),
            CrmState::GuaranteesApplied => GuaranteeSubstitution::new(
                params,
                config,
                self.guarantees.as_ref(),
                self.counterparty_lookup.as_ref(),
            )
            .apply(rows, &mut self.ctx),
            CrmState::Finalized => FinalizeEad::new(parallel).apply(rows, &mut self.ctx),
        };

        let barrier = next == CrmState::EadInitialized
            || (next == CrmState::CollateralApplied && config.materialise_after_collateral);
        if barrier {
            self.exposures.shrink_to_fit();
            debug!(
                state = %next,
                rows = self.exposures.len(),
                capacity = self.exposures.capacity(),
                "Materialised intermediate rows"
            );
        }

        self.state = next;
        info!(
            state = %next,
            rows = self.exposures.len(),
            issues = self.ctx.issues.len(),
            elapsed_ms = started.elapsed().as_secs_f64() * 1e3,
            "CRM state advanced"
        );
        Ok(next)
    }

    /// Drives the run to [`CrmState::Finalized`] and builds the bundle.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`CrmRun::advance`].
    pub fn run(mut self) -> Result<CrmAdjustedBundle, CrmError> {
        while self.state != CrmState::Finalized {
            self.advance()?;
        }
        Ok(CrmAdjustedBundle::new(self.exposures, self.ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use crm_core::{BeneficiaryLevel, CollateralType, ExposureClass, IrbPermissions, RiskType};

    fn config() -> CalculationConfig {
        CalculationConfig::crr(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap())
    }

    fn loan(reference: &str, drawn: f64) -> CrmExposure {
        CrmExposure::new(reference, "CP1", ExposureClass::Corporate, Approach::Standardised)
            .with_drawn(drawn)
            .with_currency("GBP")
    }

    #[test]
    fn test_state_sequence() {
        let orchestrator = CrmOrchestrator::new(config()).unwrap();
        let mut run = orchestrator.start(CrmInputs::new(vec![loan("L1", 100.0)]));
        let mut seen = vec![run.state()];
        while run.state() != CrmState::Finalized {
            seen.push(run.advance().unwrap());
        }
        assert_eq!(
            seen,
            vec![
                CrmState::Raw,
                CrmState::ProvisionsResolved,
                CrmState::CcfApplied,
                CrmState::EadInitialized,
                CrmState::CollateralApplied,
                CrmState::GuaranteesApplied,
                CrmState::Finalized,
            ]
        );
    }

    #[test]
    fn test_advance_past_final_rejected() {
        let orchestrator = CrmOrchestrator::new(config()).unwrap();
        let mut run = orchestrator.start(CrmInputs::new(vec![loan("L1", 100.0)]));
        for _ in 0..6 {
            run.advance().unwrap();
        }
        let err = run.advance().unwrap_err();
        assert!(matches!(err, CrmError::InvalidTransition(ref s) if s == "Finalized"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let bad = config().with_base_currency("pounds");
        assert!(matches!(CrmOrchestrator::new(bad), Err(CrmError::Config(_))));
    }

    #[test]
    fn test_partial_run_exposes_intermediate_state() {
        let orchestrator = CrmOrchestrator::new(config()).unwrap();
        let e = loan("L1", 100.0).with_nominal(200.0, Some(RiskType::MediumRisk));
        let mut run = orchestrator.start(CrmInputs::new(vec![e]));
        run.advance().unwrap();
        run.advance().unwrap();
        assert_eq!(run.state(), CrmState::CcfApplied);
        assert_relative_eq!(run.exposures()[0].ead_pre_crm, 200.0);
        assert_eq!(run.exposures()[0].ead_final, 0.0);
    }

    #[test]
    fn test_bundle_splits_by_approach() {
        let config = config().with_irb_permissions(IrbPermissions::firb_only());
        let orchestrator = CrmOrchestrator::new(config).unwrap();
        let irb = CrmExposure::new("L2", "CP2", ExposureClass::Corporate, Approach::FoundationIrb)
            .with_drawn(50.0);
        let slot = CrmExposure::new("L3", "CP3", ExposureClass::SpecialisedLending, Approach::Slotting)
            .with_drawn(25.0);
        let bundle = orchestrator
            .run(CrmInputs::new(vec![loan("L1", 100.0), irb, slot]))
            .unwrap();
        assert_eq!(bundle.exposures.len(), 3);
        assert_eq!(bundle.sa_exposures.len(), 1);
        assert_eq!(bundle.irb_exposures.len(), 1);
        assert_eq!(bundle.slotting_exposures.len(), 1);
        assert_eq!(bundle.audit.len(), 3);
        assert_relative_eq!(bundle.total_ead_final(), 175.0);
        assert_relative_eq!(bundle.irb_exposures[0].lgd_post_crm, 0.45);
        assert!(!bundle.is_degraded());
    }

    #[test]
    fn test_missing_columns_degrade_without_failing() {
        let orchestrator = CrmOrchestrator::new(config()).unwrap();
        let collateral = Relation::with_columns(
            vec![CollateralItem::new("C1", BeneficiaryLevel::Direct, "L1", CollateralType::Cash, 50.0)],
            ["beneficiary_reference"],
        );
        let bundle = orchestrator
            .run(CrmInputs::new(vec![loan("L1", 100.0)]).with_collateral(collateral))
            .unwrap();
        assert_relative_eq!(bundle.exposures[0].ead_final, 100.0);
        assert!(bundle.is_degraded());
        assert_eq!(bundle.issues[0].code, "collateral_missing_columns");
        assert_eq!(
            bundle.exposures[0].crm_calculation,
            "EAD: gross=100; coll=0; guar=0; prov=0; final=100"
        );
    }
}
