//! The exposure row threaded through every CRM stage.
//!
//! A [`CrmExposure`] starts as a classified [`UnifiedExposure`] and picks up
//! provision, CCF, collateral and guarantee results as the orchestrator
//! advances. Stage outputs are grouped into small value types so a stage
//! only ever writes its own group plus the EAD/LGD waterfall fields.

use chrono::NaiveDate;
use crm_core::{
    Approach, CounterpartyId, ExposureClass, ExposureId, ExposureType, FacilityId, RiskType,
    Seniority,
};
use crm_hierarchy::UnifiedExposure;
use std::fmt;

/// Provision allocated to an exposure and how much of it was deducted.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProvisionSplit {
    /// Total provision allocated across all levels.
    pub allocated: f64,
    /// Deducted from the drawn balance.
    pub on_drawn: f64,
    /// Deducted from the nominal before CCF.
    pub on_nominal: f64,
}

impl ProvisionSplit {
    /// Total deducted from exposure value.
    #[inline]
    pub fn deducted(&self) -> f64 {
        self.on_drawn + self.on_nominal
    }
}

/// Collateral effect on one exposure.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CollateralOutcome {
    /// Adjusted (post-haircut) collateral allocated across all levels.
    pub adjusted_value: f64,
    /// Part of `adjusted_value` eligible to reduce standardised EAD.
    pub eligible_value: f64,
    /// Collateral counted for LGD after overcollateralisation and minimum coverage.
    pub effective_value: f64,
    /// Blended supervisory LGD of the secured part.
    pub lgd_secured: Option<f64>,
    /// `min(C, E) / E × 100`.
    pub coverage_pct: f64,
}

/// How a guarantor is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GuarantorApproach {
    /// Standardised risk-weight table.
    Sa,
    /// Internal-ratings formula with the guarantor's PD.
    Irb,
}

impl fmt::Display for GuarantorApproach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuarantorApproach::Sa => write!(f, "sa"),
            GuarantorApproach::Irb => write!(f, "irb"),
        }
    }
}

/// Outcome of guarantee substitution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GuaranteeStatus {
    /// No guarantee covers the exposure.
    #[default]
    NoGuarantee,
    /// Guarantor's standardised risk weight substituted.
    SaRwSubstitution,
    /// Guarantor's PD substituted through the IRB formula.
    PdSubstitution,
    /// Guarantee recorded but the guarantor parameter was not lower.
    NotAppliedNonBeneficial,
}

impl GuaranteeStatus {
    /// Returns `true` when substitution changed the risk weight.
    #[inline]
    pub fn is_applied(self) -> bool {
        matches!(
            self,
            GuaranteeStatus::SaRwSubstitution | GuaranteeStatus::PdSubstitution
        )
    }
}

impl fmt::Display for GuaranteeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GuaranteeStatus::NoGuarantee => "no_guarantee",
            GuaranteeStatus::SaRwSubstitution => "sa_rw_substitution",
            GuaranteeStatus::PdSubstitution => "pd_substitution",
            GuaranteeStatus::NotAppliedNonBeneficial => "not_applied_non_beneficial",
        };
        write!(f, "{}", s)
    }
}

/// Guarantee effect on one exposure.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GuaranteeOutcome {
    /// Guarantee amount before capping at EAD.
    pub amount: f64,
    /// Covered part of EAD.
    pub guaranteed_portion: f64,
    /// Uncovered part of EAD.
    pub unguaranteed_portion: f64,
    /// `guaranteed_portion / EAD`, capped at 1.
    pub guarantee_ratio: f64,
    /// Guarantor of the largest contribution.
    pub guarantor: Option<CounterpartyId>,
    /// Guarantor's standardised exposure class.
    pub guarantor_exposure_class: Option<ExposureClass>,
    /// Guarantor treatment.
    pub guarantor_approach: Option<GuarantorApproach>,
    /// Guarantor's effective credit-quality step.
    pub guarantor_cqs: Option<u8>,
    /// Guarantor's effective PD.
    pub guarantor_pd: Option<f64>,
    /// Borrower risk weight before substitution.
    pub borrower_risk_weight: Option<f64>,
    /// Guarantor risk weight applied to the covered part.
    pub guarantor_risk_weight: Option<f64>,
    /// Blended risk weight after substitution.
    pub risk_weight: Option<f64>,
    /// Substitution outcome.
    pub status: GuaranteeStatus,
    /// `borrower - blended` when applied, else zero.
    pub benefit_rw: f64,
}

/// One exposure moving through the CRM pipeline.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CrmExposure {
    /// Exposure reference.
    pub reference: ExposureId,
    /// Row kind.
    pub exposure_type: ExposureType,
    /// Obligor.
    pub counterparty: CounterpartyId,
    /// Regulatory class assigned by the classifier.
    pub exposure_class: ExposureClass,
    /// Calculation approach assigned by the classifier.
    pub approach: Approach,
    /// Currency of the amounts; empty when unknown.
    pub currency: String,
    /// Contractual maturity.
    pub maturity_date: Option<NaiveDate>,
    /// Immediate parent facility.
    pub parent_facility: Option<FacilityId>,
    /// Top-most facility.
    pub root_facility: Option<FacilityId>,
    /// Drawn balance.
    pub drawn_amount: f64,
    /// Accrued interest.
    pub interest: f64,
    /// Off-balance-sheet nominal.
    pub nominal_amount: f64,
    /// CCF risk category.
    pub risk_type: Option<RiskType>,
    /// Own CCF estimate.
    pub ccf_modelled: Option<f64>,
    /// Short-term trade letter of credit.
    pub is_short_term_trade_lc: bool,
    /// Claim seniority.
    pub seniority: Seniority,
    /// Own LGD estimate.
    pub lgd: Option<f64>,
    /// Counterparty credit-quality step.
    pub cqs: Option<u8>,
    /// Counterparty PD.
    pub pd: Option<f64>,
    /// Risk weight supplied by the caller, overriding the internal lookup.
    pub pre_crm_risk_weight: Option<f64>,

    /// Provision allocation.
    pub provision: ProvisionSplit,

    /// Conversion factor applied to the nominal.
    pub ccf: f64,
    /// `nominal_after_provision × ccf`.
    pub ead_from_ccf: f64,
    /// Exposure value before CRM.
    pub ead_pre_crm: f64,
    /// CCF audit string.
    pub ccf_calculation: String,
    /// CCF before any cross-approach substitution.
    pub ccf_original: f64,
    /// CCF applied to the guaranteed share.
    pub ccf_guaranteed: f64,
    /// CCF applied to the unguaranteed share.
    pub ccf_unguaranteed: f64,

    /// EAD after provisions and CCF.
    pub ead_gross: f64,
    /// EAD after collateral.
    pub ead_after_collateral: f64,
    /// EAD after guarantees.
    pub ead_after_guarantee: f64,
    /// Final EAD, never negative.
    pub ead_final: f64,
    /// LGD before collateral.
    pub lgd_pre_crm: f64,
    /// LGD after collateral.
    pub lgd_post_crm: f64,

    /// Collateral effect.
    pub collateral: CollateralOutcome,
    /// Guarantee effect.
    pub guarantee: GuaranteeOutcome,

    /// CRM audit string.
    pub crm_calculation: String,
}

impl CrmExposure {
    /// Creates an exposure with zero amounts.
    pub fn new(
        reference: impl Into<ExposureId>,
        counterparty: impl Into<CounterpartyId>,
        exposure_class: ExposureClass,
        approach: Approach,
    ) -> Self {
        Self {
            reference: reference.into(),
            exposure_type: ExposureType::Loan,
            counterparty: counterparty.into(),
            exposure_class,
            approach,
            currency: String::new(),
            maturity_date: None,
            parent_facility: None,
            root_facility: None,
            drawn_amount: 0.0,
            interest: 0.0,
            nominal_amount: 0.0,
            risk_type: None,
            ccf_modelled: None,
            is_short_term_trade_lc: false,
            seniority: Seniority::Senior,
            lgd: None,
            cqs: None,
            pd: None,
            pre_crm_risk_weight: None,
            provision: ProvisionSplit::default(),
            ccf: 0.0,
            ead_from_ccf: 0.0,
            ead_pre_crm: 0.0,
            ccf_calculation: String::new(),
            ccf_original: 0.0,
            ccf_guaranteed: 0.0,
            ccf_unguaranteed: 0.0,
            ead_gross: 0.0,
            ead_after_collateral: 0.0,
            ead_after_guarantee: 0.0,
            ead_final: 0.0,
            lgd_pre_crm: 0.0,
            lgd_post_crm: 0.0,
            collateral: CollateralOutcome::default(),
            guarantee: GuaranteeOutcome::default(),
            crm_calculation: String::new(),
        }
    }

    /// Builds a CRM exposure from a unified row and its classification.
    pub fn from_unified(row: UnifiedExposure, exposure_class: ExposureClass, approach: Approach) -> Self {
        let mut e = Self::new(row.reference, row.counterparty, exposure_class, approach);
        e.exposure_type = row.exposure_type;
        e.currency = row.currency;
        e.maturity_date = row.maturity_date;
        e.parent_facility = row.parent_facility;
        e.root_facility = row.root_facility;
        e.drawn_amount = row.drawn_amount;
        e.interest = row.interest;
        e.nominal_amount = row.nominal_amount;
        e.risk_type = row.risk_type;
        e.ccf_modelled = row.ccf_modelled;
        e.is_short_term_trade_lc = row.is_short_term_trade_lc;
        e.seniority = row.seniority;
        e.lgd = row.lgd;
        e.cqs = row.cqs;
        e.pd = row.pd;
        e
    }

    /// Sets the row kind.
    pub fn with_exposure_type(mut self, exposure_type: ExposureType) -> Self {
        self.exposure_type = exposure_type;
        self
    }

    /// Sets the currency.
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Sets the drawn balance.
    pub fn with_drawn(mut self, amount: f64) -> Self {
        self.drawn_amount = amount;
        self
    }

    /// Sets accrued interest.
    pub fn with_interest(mut self, interest: f64) -> Self {
        self.interest = interest;
        self
    }

    /// Sets the nominal and its CCF risk category.
    pub fn with_nominal(mut self, amount: f64, risk_type: Option<RiskType>) -> Self {
        self.nominal_amount = amount;
        self.risk_type = risk_type;
        self
    }

    /// Sets the own CCF estimate.
    pub fn with_ccf_modelled(mut self, ccf: f64) -> Self {
        self.ccf_modelled = Some(ccf);
        self
    }

    /// Flags a short-term trade letter of credit.
    pub fn short_term_trade_lc(mut self) -> Self {
        self.is_short_term_trade_lc = true;
        self
    }

    /// Places the exposure under a facility.
    pub fn with_parent_facility(mut self, facility: impl Into<FacilityId>) -> Self {
        let facility = facility.into();
        if self.root_facility.is_none() {
            self.root_facility = Some(facility.clone());
        }
        self.parent_facility = Some(facility);
        self
    }

    /// Sets the maturity date.
    pub fn with_maturity_date(mut self, date: NaiveDate) -> Self {
        self.maturity_date = Some(date);
        self
    }

    /// Sets the own LGD estimate.
    pub fn with_lgd(mut self, lgd: f64) -> Self {
        self.lgd = Some(lgd);
        self
    }

    /// Sets the seniority.
    pub fn with_seniority(mut self, seniority: Seniority) -> Self {
        self.seniority = seniority;
        self
    }

    /// Sets the counterparty credit-quality step.
    pub fn with_cqs(mut self, cqs: u8) -> Self {
        self.cqs = Some(cqs);
        self
    }

    /// Sets the counterparty PD.
    pub fn with_pd(mut self, pd: f64) -> Self {
        self.pd = Some(pd);
        self
    }

    /// Sets a caller-supplied pre-CRM risk weight.
    pub fn with_pre_crm_risk_weight(mut self, rw: f64) -> Self {
        self.pre_crm_risk_weight = Some(rw);
        self
    }

    /// Nominal remaining after the provision deducted from it.
    #[inline]
    pub fn nominal_after_provision(&self) -> f64 {
        self.nominal_amount - self.provision.on_nominal
    }

    /// Drawn balance net of provision, floored at zero, plus interest.
    #[inline]
    pub fn on_balance_after_provision(&self) -> f64 {
        (self.drawn_amount.max(0.0) - self.provision.on_drawn).max(0.0) + self.interest
    }

    /// Weight used for provision pro-rating: `max(0, drawn) + interest + nominal`.
    #[inline]
    pub fn gross_exposure(&self) -> f64 {
        self.drawn_amount.max(0.0) + self.interest + self.nominal_amount
    }

    /// Residual maturity in years from the reporting date.
    pub fn residual_maturity_years(&self, reporting_date: NaiveDate) -> Option<f64> {
        self.maturity_date
            .map(|m| (m - reporting_date).num_days() as f64 / 365.0)
    }

    /// Counterparty carrying the guaranteed portion after CRM.
    pub fn post_crm_counterparty_guaranteed(&self) -> &CounterpartyId {
        match &self.guarantee.guarantor {
            Some(g) if self.is_guaranteed() => g,
            _ => &self.counterparty,
        }
    }

    /// Exposure class of the guaranteed portion after CRM.
    pub fn post_crm_exposure_class_guaranteed(&self) -> ExposureClass {
        match self.guarantee.guarantor_exposure_class {
            Some(class) if self.is_guaranteed() => class,
            _ => self.exposure_class,
        }
    }

    /// Returns `true` when any part of the exposure is guaranteed.
    #[inline]
    pub fn is_guaranteed(&self) -> bool {
        self.guarantee.guaranteed_portion > 0.0
    }
}
