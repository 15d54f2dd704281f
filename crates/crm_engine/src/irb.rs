//! Internal-ratings risk weight.
//!
//! Used to price the borrower side of an IRB guarantee comparison and the
//! guarantor side under PD substitution.
//!
//! ```text
//! K  = LGD · N[(1−R)^−½ · G(PD) + (R/(1−R))^½ · G(0.999)] − PD · LGD
//! b  = (0.11852 − 0.05478 · ln PD)²
//! MA = (1 + (M − 2.5) · b) / (1 − 1.5 · b)
//! RW = K · 12.5 · scaling · MA
//! ```

use crm_core::math::{norm_cdf, norm_ppf};
use crm_core::{ExposureClass, FrameworkParams};

/// Effective maturity when none is known, in years.
pub const DEFAULT_EFFECTIVE_MATURITY: f64 = 2.5;

const MATURITY_FLOOR: f64 = 1.0;
const MATURITY_CAP: f64 = 5.0;
const CONFIDENCE: f64 = 0.999;

/// Asset correlation for an exposure class at a PD.
pub fn correlation(class: ExposureClass, pd: f64) -> f64 {
    match class {
        ExposureClass::RetailMortgage => 0.15,
        ExposureClass::RetailQrre => 0.04,
        ExposureClass::RetailOther => pd_weighted(pd, 35.0, 0.03, 0.16),
        _ => pd_weighted(pd, 50.0, 0.12, 0.24),
    }
}

fn pd_weighted(pd: f64, decay: f64, low: f64, high: f64) -> f64 {
    let f = (1.0 - (-decay * pd).exp()) / (1.0 - (-decay).exp());
    low * f + high * (1.0 - f)
}

/// Capital requirement per unit of exposure.
///
/// A defaulted PD returns the LGD; a non-positive PD returns zero.
pub fn capital_k(pd: f64, lgd: f64, correlation: f64) -> f64 {
    if pd >= 1.0 {
        return lgd;
    }
    if pd <= 0.0 {
        return 0.0;
    }
    let conditional = norm_cdf(
        (1.0 / (1.0 - correlation)).sqrt() * norm_ppf(pd)
            + (correlation / (1.0 - correlation)).sqrt() * norm_ppf(CONFIDENCE),
    );
    (lgd * conditional - pd * lgd).max(0.0)
}

/// Maturity adjustment with `M` clamped to `[1, 5]` years.
pub fn maturity_adjustment(pd: f64, maturity_years: f64) -> f64 {
    let m = maturity_years.clamp(MATURITY_FLOOR, MATURITY_CAP);
    let b = (0.11852 - 0.05478 * pd.max(1e-5).ln()).powi(2);
    (1.0 + (m - 2.5) * b) / (1.0 - 1.5 * b)
}

/// IRB risk weight after the PD floor and framework scaling.
///
/// Retail classes take no maturity adjustment.
pub fn risk_weight(
    params: &FrameworkParams,
    class: ExposureClass,
    pd: f64,
    lgd: f64,
    maturity_years: Option<f64>,
) -> f64 {
    let pd = pd.max(params.pd_floor);
    let k = capital_k(pd, lgd, correlation(class, pd));
    let ma = if class.is_retail() {
        1.0
    } else {
        maturity_adjustment(pd, maturity_years.unwrap_or(DEFAULT_EFFECTIVE_MATURITY))
    };
    k * 12.5 * params.irb_scaling_factor * ma
}
