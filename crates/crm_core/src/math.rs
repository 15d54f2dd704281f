//! Standard normal distribution functions.
//!
//! - `norm_cdf`: cumulative distribution function
//! - `norm_ppf`: inverse CDF (quantile function)
//!
//! Both are generic over `T: Float` so callers can use `f32` or `f64`.

use num_traits::Float;

/// Converts an `f64` constant into `T`.
#[inline]
fn c<T: Float>(x: f64) -> T {
    T::from(x).unwrap_or_else(T::nan)
}

/// Complementary error function (Abramowitz and Stegun 7.1.26).
///
/// Maximum absolute error 1.5e-7.
#[inline]
fn erfc_approx<T: Float>(x: T) -> T {
    let one = T::one();
    let abs_x = x.abs();

    let t = one / (one + c::<T>(0.3275911) * abs_x);
    let poly = c::<T>(0.254829592)
        + t * (c::<T>(-0.284496736)
            + t * (c::<T>(1.421413741) + t * (c::<T>(-1.453152027) + t * c::<T>(1.061405429))));
    let erfc_abs = t * poly * (-abs_x * abs_x).exp();

    if x < T::zero() {
        c::<T>(2.0) - erfc_abs
    } else {
        erfc_abs
    }
}

/// Standard normal cumulative distribution function.
///
/// Φ(x) = ½ erfc(−x / √2)
#[inline]
pub fn norm_cdf<T: Float>(x: T) -> T {
    c::<T>(0.5) * erfc_approx(-x / c::<T>(std::f64::consts::SQRT_2))
}

// Acklam's rational approximation coefficients.
const A: [f64; 6] = [
    -3.969_683_028_665_376e1,
    2.209_460_984_245_205e2,
    -2.759_285_104_469_687e2,
    1.383_577_518_672_69e2,
    -3.066_479_806_614_716e1,
    2.506_628_277_459_239,
];
const B: [f64; 5] = [
    -5.447_609_879_822_406e1,
    1.615_858_368_580_409e2,
    -1.556_989_798_598_866e2,
    6.680_131_188_771_972e1,
    -1.328_068_155_288_572e1,
];
const C: [f64; 6] = [
    -7.784_894_002_430_293e-3,
    -3.223_964_580_411_365e-1,
    -2.400_758_277_161_838,
    -2.549_732_539_343_734,
    4.374_664_141_464_968,
    2.938_163_982_698_783,
];
const D: [f64; 4] = [
    7.784_695_709_041_462e-3,
    3.224_671_290_700_398e-1,
    2.445_134_137_142_996,
    3.754_408_661_907_416,
];
const P_LOW: f64 = 0.02425;

/// Inverse standard normal CDF (Acklam), absolute error below 1.15e-9.
///
/// Returns `-inf` for `p <= 0` and `+inf` for `p >= 1`.
pub fn norm_ppf<T: Float>(p: T) -> T {
    let one = T::one();
    if p <= T::zero() {
        return T::neg_infinity();
    }
    if p >= one {
        return T::infinity();
    }

    let tail = |q: T| -> T {
        (((((c::<T>(C[0]) * q + c::<T>(C[1])) * q + c::<T>(C[2])) * q + c::<T>(C[3])) * q
            + c::<T>(C[4]))
            * q
            + c::<T>(C[5]))
            / ((((c::<T>(D[0]) * q + c::<T>(D[1])) * q + c::<T>(D[2])) * q + c::<T>(D[3])) * q
                + one)
    };

    if p < c(P_LOW) {
        let q = (c::<T>(-2.0) * p.ln()).sqrt();
        tail(q)
    } else if p <= c(1.0 - P_LOW) {
        let q = p - c(0.5);
        let r = q * q;
        (((((c::<T>(A[0]) * r + c::<T>(A[1])) * r + c::<T>(A[2])) * r + c::<T>(A[3])) * r
            + c::<T>(A[4]))
            * r
            + c::<T>(A[5]))
            * q
            / (((((c::<T>(B[0]) * r + c::<T>(B[1])) * r + c::<T>(B[2])) * r + c::<T>(B[3])) * r
                + c::<T>(B[4]))
                * r
                + one)
    } else {
        let q = (c::<T>(-2.0) * (one - p).ln()).sqrt();
        -tail(q)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_norm_cdf_known_values() {
        assert_abs_diff_eq!(norm_cdf(0.0_f64), 0.5, epsilon = 1e-7);
        assert_abs_diff_eq!(norm_cdf(1.96_f64), 0.975_002_1, epsilon = 1e-6);
        assert_abs_diff_eq!(norm_cdf(-1.0_f64), 0.158_655_25, epsilon = 1e-6);
    }

    #[test]
    fn test_norm_ppf_known_values() {
        assert_abs_diff_eq!(norm_ppf(0.5_f64), 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(norm_ppf(0.999_f64), 3.090_232_306_167_813, epsilon = 1e-7);
        assert_abs_diff_eq!(norm_ppf(0.01_f64), -2.326_347_874_040_841, epsilon = 1e-7);
    }

    #[test]
    fn test_norm_ppf_bounds() {
        assert!(norm_ppf(0.0_f64).is_infinite());
        assert!(norm_ppf(1.0_f64).is_infinite() && norm_ppf(1.0_f64) > 0.0);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(500))]

            #[test]
            fn test_ppf_inverts_cdf(p in 0.001_f64..0.999) {
                let x = norm_ppf(p);
                prop_assert!((norm_cdf(x) - p).abs() < 1e-6);
            }

            #[test]
            fn test_cdf_monotone(a in -6.0_f64..6.0, b in -6.0_f64..6.0) {
                let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                prop_assert!(norm_cdf(lo) <= norm_cdf(hi) + 1e-12);
            }
        }
    }
}
