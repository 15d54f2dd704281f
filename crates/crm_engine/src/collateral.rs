//! Collateral allocation.
//!
//! Each item is haircut against its beneficiary, then spread over the
//! beneficiary's member exposures by share of gross EAD:
//!
//! ```text
//! direct        → the exposure itself
//! facility      → exposures whose parent facility is the beneficiary
//! counterparty  → every exposure of the counterparty
//! ```
//!
//! Standardised exposures lose EAD by the eligible allocated value.
//! Foundation-IRB exposures keep EAD and take a blended LGD:
//!
//! ```text
//! LGD* = (LGD_s × min(C, E) + LGD_u × max(E − C, 0)) / E
//! ```
//!
//! Non-financial collateral counts only when its raw allocated value covers
//! at least 30% of gross EAD, and is divided by its overcollateralisation
//! ratio before it counts.

use crate::allocation::level_key;
use crate::exposure::{CollateralOutcome, CrmExposure};
use crate::haircuts::HaircutCalculator;
use crate::stage::{usable_relation, ExposureTransform, StageContext};
use chrono::NaiveDate;
use crm_core::{
    Approach, BeneficiaryLevel, CollateralCategory, CollateralId, CrmIssue, ExposureId,
    FrameworkParams, ParallelConfig, Relation, MIN_NON_FINANCIAL_COVERAGE,
};
use crm_hierarchy::CollateralItem;
use std::collections::HashMap;
use tracing::{debug, info};

/// Columns a collateral relation must carry.
pub const REQUIRED_COLLATERAL_COLUMNS: &[&str] = &["beneficiary_reference", "market_value"];

/// Value of one collateral item allocated to one exposure.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CollateralAllocation {
    /// Collateral item.
    pub collateral_reference: CollateralId,
    /// Receiving exposure.
    pub exposure_reference: ExposureId,
    /// Level the item was pledged at.
    pub level: BeneficiaryLevel,
    /// Adjusted value allocated.
    pub allocated_value: f64,
}

/// Gross EAD, currency and maturity of a beneficiary group.
#[derive(Debug, Clone, Default)]
struct BeneficiaryGroup<'a> {
    ead: f64,
    currency: Option<&'a str>,
    maturity_date: Option<NaiveDate>,
    members: Vec<usize>,
}

/// Beneficiary groups at each level, keyed by reference.
#[derive(Debug, Default)]
struct BeneficiaryIndex<'a> {
    direct: HashMap<&'a str, BeneficiaryGroup<'a>>,
    facility: HashMap<&'a str, BeneficiaryGroup<'a>>,
    counterparty: HashMap<&'a str, BeneficiaryGroup<'a>>,
}

impl<'a> BeneficiaryIndex<'a> {
    fn build(exposures: &'a [CrmExposure]) -> Self {
        let mut index = Self::default();
        for (i, e) in exposures.iter().enumerate() {
            for level in [
                BeneficiaryLevel::Direct,
                BeneficiaryLevel::Facility,
                BeneficiaryLevel::Counterparty,
            ] {
                let Some(key) = level_key(e, level) else {
                    continue;
                };
                let group = index.level_mut(level).entry(key).or_default();
                if group.members.is_empty() {
                    // First member supplies currency and maturity for the group.
                    group.currency = Some(e.currency.as_str()).filter(|c| !c.is_empty());
                    group.maturity_date = e.maturity_date;
                }
                group.ead += e.ead_gross;
                group.members.push(i);
            }
        }
        index
    }

    fn level_mut(&mut self, level: BeneficiaryLevel) -> &mut HashMap<&'a str, BeneficiaryGroup<'a>> {
        match level {
            BeneficiaryLevel::Direct => &mut self.direct,
            BeneficiaryLevel::Facility => &mut self.facility,
            BeneficiaryLevel::Counterparty => &mut self.counterparty,
        }
    }

    fn get(&self, level: BeneficiaryLevel, key: &str) -> Option<&BeneficiaryGroup<'a>> {
        match level {
            BeneficiaryLevel::Direct => self.direct.get(key),
            BeneficiaryLevel::Facility => self.facility.get(key),
            BeneficiaryLevel::Counterparty => self.counterparty.get(key),
        }
    }
}

/// Allocated collateral gathered per exposure, split by category.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CollateralTotals {
    /// Adjusted value by category.
    pub financial: f64,
    /// Receivables.
    pub receivables: f64,
    /// Real estate.
    pub real_estate: f64,
    /// Other physical.
    pub other_physical: f64,
    /// Unclassified.
    pub unknown: f64,
    /// Part eligible to reduce standardised EAD.
    pub eligible: f64,
}

impl CollateralTotals {
    fn add(&mut self, category: CollateralCategory, value: f64, eligible: bool) {
        *self.slot(category) += value;
        if eligible {
            self.eligible += value;
        }
    }

    fn slot(&mut self, category: CollateralCategory) -> &mut f64 {
        match category {
            CollateralCategory::Financial => &mut self.financial,
            CollateralCategory::Receivables => &mut self.receivables,
            CollateralCategory::RealEstate => &mut self.real_estate,
            CollateralCategory::OtherPhysical => &mut self.other_physical,
            CollateralCategory::Unknown => &mut self.unknown,
        }
    }

    /// Total adjusted value.
    pub fn total(&self) -> f64 {
        self.financial + self.non_financial()
    }

    /// Adjusted value of the non-financial categories.
    pub fn non_financial(&self) -> f64 {
        self.receivables + self.real_estate + self.other_physical + self.unknown
    }

    fn non_financial_parts(&self) -> [(CollateralCategory, f64); 4] {
        [
            (CollateralCategory::Receivables, self.receivables),
            (CollateralCategory::RealEstate, self.real_estate),
            (CollateralCategory::OtherPhysical, self.other_physical),
            (CollateralCategory::Unknown, self.unknown),
        ]
    }

    /// Collateral counted for LGD and its blended secured LGD.
    ///
    /// Non-financial value is dropped when the raw amount covers less than
    /// the minimum share of `ead_gross`; otherwise each category is divided
    /// by its overcollateralisation ratio.
    pub fn effective(&self, ead_gross: f64, params: &FrameworkParams) -> (f64, Option<f64>) {
        let mut value = self.financial;
        let mut weighted_lgd = 0.0;

        let meets_minimum = ead_gross > 0.0
            && self.non_financial() >= MIN_NON_FINANCIAL_COVERAGE * ead_gross;
        if meets_minimum {
            for (category, raw) in self.non_financial_parts() {
                let counted = raw / category.overcollateralisation_ratio();
                value += counted;
                weighted_lgd += counted * params.collateral_lgd(category);
            }
        }

        if value > 0.0 {
            (value, Some(weighted_lgd / value))
        } else {
            (0.0, None)
        }
    }
}

/// Haircuts and allocates collateral.
#[derive(Debug, Clone, Copy)]
pub struct CollateralAllocator<'a> {
    params: &'a FrameworkParams,
    reporting_date: NaiveDate,
    collateral: Option<&'a Relation<CollateralItem>>,
    parallel: &'a ParallelConfig,
}

impl<'a> CollateralAllocator<'a> {
    /// Creates the stage.
    pub fn new(
        params: &'a FrameworkParams,
        reporting_date: NaiveDate,
        collateral: Option<&'a Relation<CollateralItem>>,
        parallel: &'a ParallelConfig,
    ) -> Self {
        Self {
            params,
            reporting_date,
            collateral,
            parallel,
        }
    }

    /// Allocates every item, returning per-exposure totals in row order.
    pub fn allocate(
        &self,
        exposures: &[CrmExposure],
        items: &[CollateralItem],
        ctx: &mut StageContext,
    ) -> Vec<CollateralTotals> {
        let index = BeneficiaryIndex::build(exposures);
        let haircuts = HaircutCalculator::new(self.params);
        let mut totals = vec![CollateralTotals::default(); exposures.len()];

        for item in items {
            let Some(group) = index.get(item.beneficiary_level, &item.beneficiary_reference) else {
                ctx.push_issue(
                    CrmIssue::data_quality(
                        "collateral_beneficiary_not_found",
                        format!(
                            "No {} beneficiary {} for collateral {}",
                            item.beneficiary_level, item.beneficiary_reference, item.reference
                        ),
                    )
                    .with_entity(item.reference.to_string())
                    .with_context("beneficiary", &item.beneficiary_reference),
                );
                continue;
            };

            let market_value = resolve_market_value(item, group.ead);
            let maturity = group
                .maturity_date
                .map(|m| (m - self.reporting_date).num_days() as f64 / 365.0);
            let haircut = haircuts.apply(item, market_value, group.currency, maturity);
            debug!(collateral = %item.reference, detail = %haircut.description, "Haircut collateral");

            if group.ead <= 0.0 {
                continue;
            }
            let category = item.collateral_type.category();
            let eligible = item
                .is_eligible_financial_collateral
                .unwrap_or(!item.collateral_type.is_real_estate());

            for &i in &group.members {
                let share = exposures[i].ead_gross / group.ead;
                let value = haircut.adjusted_value * share;
                totals[i].add(category, value, eligible);
                ctx.allocations.push(CollateralAllocation {
                    collateral_reference: item.reference.clone(),
                    exposure_reference: exposures[i].reference.clone(),
                    level: item.beneficiary_level,
                    allocated_value: value,
                });
            }
        }

        totals
    }
}

impl ExposureTransform for CollateralAllocator<'_> {
    fn name(&self) -> &'static str {
        "collateral"
    }

    fn apply(&self, exposures: Vec<CrmExposure>, ctx: &mut StageContext) -> Vec<CrmExposure> {
        let totals = match usable_relation(
            self.collateral,
            REQUIRED_COLLATERAL_COLUMNS,
            self.name(),
            "collateral_missing_columns",
            ctx,
        ) {
            Some(collateral) => {
                let totals = self.allocate(&exposures, collateral.rows(), ctx);
                info!(
                    items = collateral.len(),
                    allocated = totals.iter().map(CollateralTotals::total).sum::<f64>(),
                    "Allocated collateral"
                );
                totals
            }
            None => vec![CollateralTotals::default(); exposures.len()],
        };

        let params = self.params;
        let rows: Vec<(CrmExposure, CollateralTotals)> = exposures.into_iter().zip(totals).collect();
        self.parallel
            .map_owned(rows, |(e, t)| apply_collateral(e, &t, params))
    }
}

/// Market value, or the pledged share of the beneficiary's EAD when no
/// market value is given.
pub fn resolve_market_value(item: &CollateralItem, beneficiary_ead: f64) -> f64 {
    match (item.market_value, item.pledge_percentage) {
        (Some(mv), _) if mv != 0.0 => mv,
        (_, Some(pct)) if pct > 0.0 => pct * beneficiary_ead,
        (mv, _) => mv.unwrap_or(0.0),
    }
}

/// Applies allocated collateral to one exposure.
pub fn apply_collateral(
    mut e: CrmExposure,
    totals: &CollateralTotals,
    params: &FrameworkParams,
) -> CrmExposure {
    let ead = e.ead_gross;
    let (effective, lgd_secured) = totals.effective(ead, params);

    e.collateral = CollateralOutcome {
        adjusted_value: totals.total(),
        eligible_value: totals.eligible,
        effective_value: effective,
        lgd_secured,
        coverage_pct: if ead > 0.0 {
            effective.min(ead) / ead * 100.0
        } else {
            0.0
        },
    };

    match e.approach {
        Approach::Standardised => {
            e.ead_after_collateral = (ead - totals.eligible).max(0.0);
        }
        Approach::FoundationIrb => {
            let lgd_unsecured = params.unsecured_lgd(e.seniority);
            e.lgd_post_crm = match lgd_secured {
                Some(lgd_s) if ead > 0.0 => {
                    let secured = effective.min(ead);
                    (lgd_s * secured + lgd_unsecured * (ead - effective).max(0.0)) / ead
                }
                _ => lgd_unsecured,
            };
        }
        Approach::AdvancedIrb | Approach::Slotting => {}
    }
    e
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crm_core::{CollateralType, ExposureClass};

    fn with_ead(reference: &str, approach: Approach, ead: f64) -> CrmExposure {
        let mut e = CrmExposure::new(reference, "CP1", ExposureClass::Corporate, approach)
            .with_drawn(ead)
            .with_currency("GBP");
        e.ead_gross = ead;
        e.ead_after_collateral = ead;
        e.lgd_pre_crm = 0.45;
        e.lgd_post_crm = 0.45;
        e
    }

    fn run(
        params: &FrameworkParams,
        exposures: Vec<CrmExposure>,
        items: Vec<CollateralItem>,
    ) -> (Vec<CrmExposure>, StageContext) {
        let rel = Relation::new(items);
        let parallel = ParallelConfig::default();
        let mut ctx = StageContext::new();
        let date = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let out = CollateralAllocator::new(params, date, Some(&rel), &parallel).apply(exposures, &mut ctx);
        (out, ctx)
    }

    #[test]
    fn test_sa_cash_reduces_ead() {
        let params = FrameworkParams::crr();
        let (out, _) = run(
            &params,
            vec![with_ead("L1", Approach::Standardised, 1_000_000.0)],
            vec![CollateralItem::new("C1", BeneficiaryLevel::Direct, "L1", CollateralType::Cash, 500_000.0)],
        );
        assert_relative_eq!(out[0].ead_after_collateral, 500_000.0);
        assert_relative_eq!(out[0].collateral.adjusted_value, 500_000.0);
    }

    #[test]
    fn test_sa_real_estate_not_eligible_for_ead_reduction() {
        let params = FrameworkParams::crr();
        let (out, _) = run(
            &params,
            vec![with_ead("L1", Approach::Standardised, 100.0)],
            vec![CollateralItem::new("C1", BeneficiaryLevel::Direct, "L1", CollateralType::RealEstate, 80.0)],
        );
        assert_relative_eq!(out[0].ead_after_collateral, 100.0);
        assert_relative_eq!(out[0].collateral.adjusted_value, 80.0);
    }

    #[test]
    fn test_facility_collateral_conserved() {
        let params = FrameworkParams::crr();
        let (out, ctx) = run(
            &params,
            vec![
                with_ead("L1", Approach::Standardised, 600.0).with_parent_facility("F1"),
                with_ead("L2", Approach::Standardised, 400.0).with_parent_facility("F1"),
            ],
            vec![CollateralItem::new("C1", BeneficiaryLevel::Facility, "F1", CollateralType::Cash, 500.0)],
        );
        assert_relative_eq!(out[0].collateral.adjusted_value, 300.0);
        assert_relative_eq!(out[1].collateral.adjusted_value, 200.0);
        let total: f64 = ctx.allocations.iter().map(|a| a.allocated_value).sum();
        assert_relative_eq!(total, 500.0, epsilon = 1e-9);
    }

    #[test]
    fn test_firb_blended_lgd_with_cash() {
        let params = FrameworkParams::crr();
        let (out, _) = run(
            &params,
            vec![with_ead("L1", Approach::FoundationIrb, 1_000.0)],
            vec![CollateralItem::new("C1", BeneficiaryLevel::Direct, "L1", CollateralType::Cash, 400.0)],
        );
        // 40% secured at 0%, 60% unsecured at 45%.
        assert_relative_eq!(out[0].lgd_post_crm, 0.27, epsilon = 1e-12);
        assert_relative_eq!(out[0].ead_after_collateral, 1_000.0);
        assert_relative_eq!(out[0].collateral.coverage_pct, 40.0);
    }

    #[test]
    fn test_firb_non_financial_below_minimum_ignored() {
        let params = FrameworkParams::crr();
        let (out, _) = run(
            &params,
            vec![with_ead("L1", Approach::FoundationIrb, 1_000.0)],
            vec![CollateralItem::new("C1", BeneficiaryLevel::Direct, "L1", CollateralType::RealEstate, 250.0)],
        );
        assert_relative_eq!(out[0].lgd_post_crm, 0.45);
        assert_eq!(out[0].collateral.effective_value, 0.0);
    }

    #[test]
    fn test_firb_real_estate_overcollateralisation() {
        let params = FrameworkParams::crr();
        let (out, _) = run(
            &params,
            vec![with_ead("L1", Approach::FoundationIrb, 1_000.0)],
            vec![CollateralItem::new("C1", BeneficiaryLevel::Direct, "L1", CollateralType::RealEstate, 700.0)],
        );
        // 700 / 1.4 = 500 counted at 35%, remaining 500 at 45%.
        assert_relative_eq!(out[0].collateral.effective_value, 500.0, epsilon = 1e-9);
        assert_relative_eq!(out[0].lgd_post_crm, 0.40, epsilon = 1e-12);
    }

    #[test]
    fn test_airb_keeps_own_lgd() {
        let params = FrameworkParams::basel_3_1();
        let mut e = with_ead("L1", Approach::AdvancedIrb, 1_000.0);
        e.lgd_pre_crm = 0.30;
        e.lgd_post_crm = 0.30;
        let (out, _) = run(
            &params,
            vec![e],
            vec![CollateralItem::new("C1", BeneficiaryLevel::Direct, "L1", CollateralType::Cash, 400.0)],
        );
        assert_relative_eq!(out[0].lgd_post_crm, 0.30);
    }

    #[test]
    fn test_pledge_percentage_resolved_from_ead() {
        let params = FrameworkParams::crr();
        let (out, _) = run(
            &params,
            vec![with_ead("L1", Approach::Standardised, 800.0)],
            vec![CollateralItem::pledged_percentage(
                "C1",
                BeneficiaryLevel::Direct,
                "L1",
                CollateralType::Cash,
                0.25,
            )],
        );
        assert_relative_eq!(out[0].ead_after_collateral, 600.0);
    }

    #[test]
    fn test_unknown_beneficiary_reported() {
        let params = FrameworkParams::crr();
        let (out, ctx) = run(
            &params,
            vec![with_ead("L1", Approach::Standardised, 100.0)],
            vec![CollateralItem::new("C1", BeneficiaryLevel::Direct, "L9", CollateralType::Cash, 50.0)],
        );
        assert_relative_eq!(out[0].ead_after_collateral, 100.0);
        assert_eq!(ctx.issues[0].code, "collateral_beneficiary_not_found");
    }

    #[test]
    fn test_firb_without_collateral_takes_unsecured_lgd() {
        let params = FrameworkParams::basel_3_1();
        let parallel = ParallelConfig::default();
        let date = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let mut ctx = StageContext::new();
        let out = CollateralAllocator::new(&params, date, None, &parallel)
            .apply(vec![with_ead("L1", Approach::FoundationIrb, 100.0)], &mut ctx);
        assert_relative_eq!(out[0].lgd_post_crm, 0.40);
        assert!(ctx.issues.is_empty());
    }
}
