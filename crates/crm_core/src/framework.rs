//! Framework-dependent regulatory parameters.
//!
//! The framework is resolved once per run into a [`FrameworkParams`] value
//! that every stage reads from, so no stage branches on the framework itself.

use crate::types::{CollateralCategory, Framework, RiskType, Seniority};

/// Maturity band layout for debt-security haircuts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaturityBands {
    /// `<= 1y`, `<= 5y`, `> 5y`.
    Three,
    /// `<= 1y`, `<= 3y`, `<= 5y`, `<= 10y`, `> 10y`.
    Five,
}

impl MaturityBands {
    /// Returns the band index for a residual maturity in years.
    ///
    /// Unknown maturity falls into the longest band.
    pub fn band_index(self, residual_maturity_years: Option<f64>) -> usize {
        let upper: &[f64] = match self {
            MaturityBands::Three => &[1.0, 5.0],
            MaturityBands::Five => &[1.0, 3.0, 5.0, 10.0],
        };
        match residual_maturity_years {
            Some(m) => upper.iter().position(|&edge| m <= edge).unwrap_or(upper.len()),
            None => upper.len(),
        }
    }

    /// Number of bands.
    pub fn len(self) -> usize {
        match self {
            MaturityBands::Three => 3,
            MaturityBands::Five => 5,
        }
    }

    /// Always `false`; present for API symmetry with `len`.
    pub fn is_empty(self) -> bool {
        false
    }
}

/// Regulatory constants for one framework.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameworkParams {
    /// Framework these parameters describe.
    pub framework: Framework,
    /// Standardised CCF for low-risk (unconditionally cancellable) items.
    pub sa_ccf_low_risk: f64,
    /// Foundation-IRB CCF for low-risk items.
    pub firb_ccf_low_risk: f64,
    /// Floor on own-estimate CCFs as a fraction of the standardised CCF.
    pub airb_ccf_floor_ratio: Option<f64>,
    /// Supervisory LGD for senior unsecured claims.
    pub lgd_senior_unsecured: f64,
    /// Supervisory LGD for subordinated claims.
    pub lgd_subordinated: f64,
    /// Supervisory LGD for the secured part backed by receivables.
    pub lgd_receivables: f64,
    /// Supervisory LGD for the secured part backed by real estate.
    pub lgd_real_estate: f64,
    /// Supervisory LGD for the secured part backed by other physical collateral.
    pub lgd_other_physical: f64,
    /// Maturity band layout for bond haircuts.
    pub maturity_bands: MaturityBands,
    /// Haircut for main-index equities.
    pub equity_main_index_haircut: f64,
    /// Haircut for other equities.
    pub equity_other_haircut: f64,
    /// Minimum PD applied in the IRB formula.
    pub pd_floor: f64,
    /// Multiplier on IRB capital.
    pub irb_scaling_factor: f64,
    /// Whether internally-rated IRB guarantors substitute PD rather than risk weight.
    pub allows_pd_substitution: bool,
    /// LGD used for the guaranteed portion under PD substitution.
    pub guarantor_substitution_lgd: f64,
}

/// Currency-mismatch haircut.
pub const FX_HAIRCUT: f64 = 0.08;

/// Share of gross EAD non-financial collateral must cover before it counts.
pub const MIN_NON_FINANCIAL_COVERAGE: f64 = 0.30;

/// Default traversal cap for hierarchy resolution.
pub const DEFAULT_MAX_HIERARCHY_DEPTH: usize = 10;

impl FrameworkParams {
    /// Parameters for the CRR framework.
    pub fn crr() -> Self {
        Self {
            framework: Framework::Crr,
            sa_ccf_low_risk: 0.0,
            firb_ccf_low_risk: 0.0,
            airb_ccf_floor_ratio: None,
            lgd_senior_unsecured: 0.45,
            lgd_subordinated: 0.75,
            lgd_receivables: 0.35,
            lgd_real_estate: 0.35,
            lgd_other_physical: 0.40,
            maturity_bands: MaturityBands::Three,
            equity_main_index_haircut: 0.15,
            equity_other_haircut: 0.25,
            pd_floor: 0.0003,
            irb_scaling_factor: 1.06,
            allows_pd_substitution: false,
            guarantor_substitution_lgd: 0.45,
        }
    }

    /// Parameters for the Basel 3.1 framework.
    pub fn basel_3_1() -> Self {
        Self {
            framework: Framework::Basel31,
            sa_ccf_low_risk: 0.10,
            firb_ccf_low_risk: 0.10,
            airb_ccf_floor_ratio: Some(0.5),
            lgd_senior_unsecured: 0.40,
            lgd_subordinated: 0.75,
            lgd_receivables: 0.20,
            lgd_real_estate: 0.20,
            lgd_other_physical: 0.25,
            maturity_bands: MaturityBands::Five,
            equity_main_index_haircut: 0.25,
            equity_other_haircut: 0.35,
            pd_floor: 0.0005,
            irb_scaling_factor: 1.0,
            allows_pd_substitution: true,
            guarantor_substitution_lgd: 0.40,
        }
    }

    /// Resolves the parameters for a framework.
    pub fn for_framework(framework: Framework) -> Self {
        match framework {
            Framework::Crr => Self::crr(),
            Framework::Basel31 => Self::basel_3_1(),
        }
    }

    /// Standardised CCF for a risk category; unknown categories take medium risk.
    pub fn sa_ccf(&self, risk_type: Option<RiskType>) -> f64 {
        match risk_type {
            Some(RiskType::FullRisk) => 1.0,
            Some(RiskType::MediumRisk) | None => 0.5,
            Some(RiskType::MediumLowRisk) => 0.2,
            Some(RiskType::LowRisk) => self.sa_ccf_low_risk,
        }
    }

    /// Foundation-IRB CCF for a risk category.
    ///
    /// Short-term trade letters of credit in the medium-low category keep
    /// the 20% factor; unknown categories take 75%.
    pub fn firb_ccf(&self, risk_type: Option<RiskType>, short_term_trade_lc: bool) -> f64 {
        match risk_type {
            Some(RiskType::FullRisk) => 1.0,
            Some(RiskType::LowRisk) => self.firb_ccf_low_risk,
            Some(RiskType::MediumLowRisk) if short_term_trade_lc => 0.2,
            Some(RiskType::MediumRisk) | Some(RiskType::MediumLowRisk) | None => 0.75,
        }
    }

    /// Unsecured LGD by seniority.
    pub fn unsecured_lgd(&self, seniority: Seniority) -> f64 {
        match seniority {
            Seniority::Senior => self.lgd_senior_unsecured,
            Seniority::Subordinated => self.lgd_subordinated,
        }
    }

    /// Supervisory LGD for the part secured by a collateral category.
    pub fn collateral_lgd(&self, category: CollateralCategory) -> f64 {
        match category {
            CollateralCategory::Financial => 0.0,
            CollateralCategory::Receivables => self.lgd_receivables,
            CollateralCategory::RealEstate => self.lgd_real_estate,
            CollateralCategory::OtherPhysical => self.lgd_other_physical,
            CollateralCategory::Unknown => self.lgd_senior_unsecured,
        }
    }
}

impl Framework {
    /// Resolves this framework's parameter set.
    pub fn params(self) -> FrameworkParams {
        FrameworkParams::for_framework(self)
    }
}
