//! Supervisory haircuts for financial collateral.
//!
//! The adjusted value of a collateral item is
//!
//! ```text
//! adjusted = max(0, MV × (1 − Hc − Hfx)) × maturity_factor
//! ```
//!
//! where `Hc` depends on collateral type, issuer CQS and residual maturity
//! band, `Hfx` is the currency-mismatch add-on, and `maturity_factor`
//! scales protection that ends before the exposure does.
//!
//! All functions here are pure in their inputs.

use crm_core::{CollateralType, FrameworkParams, MaturityBands, FX_HAIRCUT};
use crm_hierarchy::CollateralItem;

/// Residual maturity assumed for collateral with none recorded.
pub const DEFAULT_COLLATERAL_MATURITY_YEARS: f64 = 10.0;

/// Residual maturity assumed for exposures with none recorded.
pub const DEFAULT_EXPOSURE_MATURITY_YEARS: f64 = 5.0;

/// Protection shorter than this gives no benefit.
pub const MIN_PROTECTION_YEARS: f64 = 0.25;

/// Government bonds, CQS 1, by band.
const GOVT_CQS1_CRR: [f64; 3] = [0.005, 0.02, 0.04];
const GOVT_CQS1_B31: [f64; 5] = [0.005, 0.02, 0.02, 0.04, 0.04];
/// Government bonds, CQS 2 and 3, by band.
const GOVT_CQS23_CRR: [f64; 3] = [0.01, 0.03, 0.06];
const GOVT_CQS23_B31: [f64; 5] = [0.01, 0.03, 0.04, 0.06, 0.12];
const GOVT_OTHER: f64 = 0.15;

/// Corporate bonds, CQS 1 and 2, by band.
const CORP_CQS12_CRR: [f64; 3] = [0.01, 0.04, 0.06];
const CORP_CQS12_B31: [f64; 5] = [0.01, 0.04, 0.06, 0.10, 0.12];
/// Corporate bonds, CQS 3, by band.
const CORP_CQS3_CRR: [f64; 3] = [0.02, 0.06, 0.08];
const CORP_CQS3_B31: [f64; 5] = [0.02, 0.06, 0.08, 0.15, 0.15];
const CORP_OTHER: f64 = 0.20;

const GOLD: f64 = 0.15;
const RECEIVABLES: f64 = 0.20;
const OTHER_PHYSICAL: f64 = 0.40;

/// Result of haircutting one collateral item.
#[derive(Debug, Clone, PartialEq)]
pub struct HaircutResult {
    /// Market value before haircuts.
    pub market_value: f64,
    /// Collateral-type haircut.
    pub collateral_haircut: f64,
    /// Currency-mismatch haircut.
    pub fx_haircut: f64,
    /// `max(0, MV × (1 − Hc − Hfx))`.
    pub value_after_haircut: f64,
    /// Maturity-mismatch factor in `[0, 1]`.
    pub maturity_factor: f64,
    /// `value_after_haircut × maturity_factor`.
    pub adjusted_value: f64,
    /// `MV=..; Hc=..%; Hfx=..%; Adj=..`.
    pub description: String,
}

/// Haircut lookups for one framework.
#[derive(Debug, Clone, Copy)]
pub struct HaircutCalculator<'a> {
    params: &'a FrameworkParams,
}

impl<'a> HaircutCalculator<'a> {
    /// Creates a calculator over the framework's parameters.
    pub fn new(params: &'a FrameworkParams) -> Self {
        Self { params }
    }

    /// Collateral-type haircut `Hc`.
    pub fn collateral_haircut(
        &self,
        collateral_type: CollateralType,
        issuer_cqs: Option<u8>,
        residual_maturity_years: Option<f64>,
        is_main_index: bool,
    ) -> f64 {
        let bands = self.params.maturity_bands;
        let band = bands.band_index(residual_maturity_years);
        match collateral_type {
            CollateralType::Cash | CollateralType::Deposit => 0.0,
            CollateralType::Gold => GOLD,
            CollateralType::GovernmentBond => match issuer_cqs {
                Some(1) => by_band(bands, band, &GOVT_CQS1_CRR, &GOVT_CQS1_B31),
                Some(2) | Some(3) => by_band(bands, band, &GOVT_CQS23_CRR, &GOVT_CQS23_B31),
                _ => GOVT_OTHER,
            },
            CollateralType::CorporateBond => match issuer_cqs {
                Some(1) | Some(2) => by_band(bands, band, &CORP_CQS12_CRR, &CORP_CQS12_B31),
                Some(3) => by_band(bands, band, &CORP_CQS3_CRR, &CORP_CQS3_B31),
                _ => CORP_OTHER,
            },
            CollateralType::Equity if is_main_index => self.params.equity_main_index_haircut,
            CollateralType::Equity => self.params.equity_other_haircut,
            CollateralType::Receivables => RECEIVABLES,
            CollateralType::RealEstate => 0.0,
            CollateralType::FinancialCollateral
            | CollateralType::OtherPhysical
            | CollateralType::Unknown => OTHER_PHYSICAL,
        }
    }

    /// Haircuts one item against its beneficiary's currency and maturity.
    ///
    /// `market_value` is passed separately because pledged-percentage items
    /// resolve it from the beneficiary's EAD first.
    pub fn apply(
        &self,
        item: &CollateralItem,
        market_value: f64,
        exposure_currency: Option<&str>,
        exposure_maturity_years: Option<f64>,
    ) -> HaircutResult {
        let hc = self.collateral_haircut(
            item.collateral_type,
            item.issuer_cqs,
            item.residual_maturity_years,
            item.is_main_index,
        );
        let hfx = fx_haircut(item.currency.as_deref(), exposure_currency);
        let value_after_haircut = (market_value * (1.0 - hc - hfx)).max(0.0);
        let maturity_factor =
            maturity_mismatch_factor(item.residual_maturity_years, exposure_maturity_years);
        let adjusted_value = value_after_haircut * maturity_factor;

        HaircutResult {
            market_value,
            collateral_haircut: hc,
            fx_haircut: hfx,
            value_after_haircut,
            maturity_factor,
            adjusted_value,
            description: format!(
                "MV={:.0}; Hc={:.1}%; Hfx={:.1}%; Adj={:.0}",
                market_value,
                hc * 100.0,
                hfx * 100.0,
                adjusted_value
            ),
        }
    }
}

fn by_band(bands: MaturityBands, band: usize, crr: &[f64; 3], b31: &[f64; 5]) -> f64 {
    let table: &[f64] = match bands {
        MaturityBands::Three => crr,
        MaturityBands::Five => b31,
    };
    table[band.min(table.len() - 1)]
}

/// Currency-mismatch haircut.
///
/// Zero when either currency is unknown or they match.
pub fn fx_haircut(collateral_currency: Option<&str>, exposure_currency: Option<&str>) -> f64 {
    match (collateral_currency, exposure_currency) {
        (Some(c), Some(e)) if !c.is_empty() && !e.is_empty() && !c.eq_ignore_ascii_case(e) => {
            FX_HAIRCUT
        }
        _ => 0.0,
    }
}

/// Maturity-mismatch scaling `(t − 0.25) / (T − 0.25)`.
///
/// `t` is the collateral's residual maturity (10y when unknown), `T` the
/// exposure's (5y when unknown) clamped to `[0.25, 5]`.
pub fn maturity_mismatch_factor(
    collateral_years: Option<f64>,
    exposure_years: Option<f64>,
) -> f64 {
    let t = collateral_years.unwrap_or(DEFAULT_COLLATERAL_MATURITY_YEARS);
    let big_t = exposure_years
        .unwrap_or(DEFAULT_EXPOSURE_MATURITY_YEARS)
        .clamp(MIN_PROTECTION_YEARS, DEFAULT_EXPOSURE_MATURITY_YEARS);

    if t >= big_t {
        1.0
    } else if t < MIN_PROTECTION_YEARS {
        0.0
    } else {
        ((t - MIN_PROTECTION_YEARS) / (big_t - MIN_PROTECTION_YEARS)).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crm_core::BeneficiaryLevel;
    use proptest::prelude::*;

    fn item(collateral_type: CollateralType, mv: f64) -> CollateralItem {
        CollateralItem::new("C1", BeneficiaryLevel::Direct, "L1", collateral_type, mv)
    }

    #[test]
    fn test_cash_no_haircut() {
        let params = FrameworkParams::crr();
        let r = HaircutCalculator::new(&params).apply(&item(CollateralType::Cash, 500_000.0), 500_000.0, None, None);
        assert_relative_eq!(r.value_after_haircut, 500_000.0);
        assert_relative_eq!(r.adjusted_value, 500_000.0);
        assert_eq!(r.description, "MV=500000; Hc=0.0%; Hfx=0.0%; Adj=500000");
    }

    #[test]
    fn test_main_index_equity_by_framework() {
        let equity = item(CollateralType::Equity, 400_000.0).main_index();
        let b31 = FrameworkParams::basel_3_1();
        let crr = FrameworkParams::crr();
        let new = HaircutCalculator::new(&b31).apply(&equity, 400_000.0, None, None);
        let old = HaircutCalculator::new(&crr).apply(&equity, 400_000.0, None, None);
        assert_relative_eq!(new.value_after_haircut, 300_000.0);
        assert_relative_eq!(old.value_after_haircut, 340_000.0);
    }

    #[test]
    fn test_bond_bands() {
        let crr = FrameworkParams::crr();
        let b31 = FrameworkParams::basel_3_1();
        let old = HaircutCalculator::new(&crr);
        let new = HaircutCalculator::new(&b31);
        let govt = CollateralType::GovernmentBond;
        let corp = CollateralType::CorporateBond;

        assert_eq!(old.collateral_haircut(govt, Some(1), Some(0.5), false), 0.005);
        assert_eq!(old.collateral_haircut(govt, Some(2), Some(7.0), false), 0.06);
        assert_eq!(new.collateral_haircut(govt, Some(3), Some(12.0), false), 0.12);
        assert_eq!(new.collateral_haircut(govt, Some(1), Some(4.0), false), 0.02);
        assert_eq!(old.collateral_haircut(govt, Some(5), Some(1.0), false), 0.15);
        assert_eq!(old.collateral_haircut(corp, Some(2), Some(3.0), false), 0.04);
        assert_eq!(new.collateral_haircut(corp, Some(3), Some(8.0), false), 0.15);
        assert_eq!(new.collateral_haircut(corp, None, Some(8.0), false), 0.20);
        // Unknown maturity takes the longest band.
        assert_eq!(old.collateral_haircut(corp, Some(1), None, false), 0.06);
    }

    #[test]
    fn test_non_financial_haircuts() {
        let crr = FrameworkParams::crr();
        let calc = HaircutCalculator::new(&crr);
        assert_eq!(calc.collateral_haircut(CollateralType::Receivables, None, None, false), 0.20);
        assert_eq!(calc.collateral_haircut(CollateralType::RealEstate, None, None, false), 0.0);
        assert_eq!(calc.collateral_haircut(CollateralType::OtherPhysical, None, None, false), 0.40);
        assert_eq!(calc.collateral_haircut(CollateralType::Gold, None, None, false), 0.15);
    }

    #[test]
    fn test_fx_mismatch() {
        assert_eq!(fx_haircut(Some("USD"), Some("GBP")), 0.08);
        assert_eq!(fx_haircut(Some("gbp"), Some("GBP")), 0.0);
        assert_eq!(fx_haircut(Some("USD"), None), 0.0);
        assert_eq!(fx_haircut(None, Some("GBP")), 0.0);

        let crr = FrameworkParams::crr();
        let r = HaircutCalculator::new(&crr).apply(
            &item(CollateralType::Cash, 100.0).with_currency("USD"),
            100.0,
            Some("GBP"),
            None,
        );
        assert_relative_eq!(r.adjusted_value, 92.0);
    }

    #[test]
    fn test_maturity_mismatch() {
        assert_eq!(maturity_mismatch_factor(None, None), 1.0);
        assert_eq!(maturity_mismatch_factor(Some(0.1), Some(3.0)), 0.0);
        assert_relative_eq!(maturity_mismatch_factor(Some(2.0), Some(4.0)), 1.75 / 3.75);
        // T capped at five years.
        assert_relative_eq!(maturity_mismatch_factor(Some(2.625), Some(20.0)), 0.5);
        assert_eq!(maturity_mismatch_factor(Some(6.0), Some(20.0)), 1.0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn prop_haircut_pure_and_bounded(
            mv in 0.0f64..1e7,
            cqs in proptest::option::of(1u8..7),
            maturity in proptest::option::of(0.0f64..30.0),
            basel_3_1 in any::<bool>(),
        ) {
            let params = if basel_3_1 { FrameworkParams::basel_3_1() } else { FrameworkParams::crr() };
            let calc = HaircutCalculator::new(&params);
            let mut c = item(CollateralType::CorporateBond, mv).with_currency("EUR");
            c.issuer_cqs = cqs;
            c.residual_maturity_years = maturity;

            let first = calc.apply(&c, mv, Some("GBP"), Some(3.0));
            let second = calc.apply(&c, mv, Some("GBP"), Some(3.0));
            prop_assert_eq!(&first, &second);
            prop_assert!(first.adjusted_value >= 0.0);
            prop_assert!(first.adjusted_value <= mv + 1e-9);
        }
    }
}
