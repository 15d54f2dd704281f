//! Guarantee substitution.
//!
//! Guarantees are gathered per exposure, capped at the post-collateral EAD
//! and priced from the guarantor's side:
//!
//! - standardised guarantors substitute their risk weight by class and CQS;
//! - internally rated guarantors with an IRB permission substitute their PD
//!   through the capital formula where the framework allows it, and fall
//!   back to risk-weight substitution otherwise.
//!
//! Substitution only happens when the guarantor's weight is strictly lower
//! than the borrower's. The covered share is then weighted at the
//! guarantor's parameter and the rest at the borrower's:
//!
//! ```text
//! RW = (unguaranteed × RW_borrower + guaranteed × RW_guarantor) / EAD
//! ```
//!
//! An IRB exposure guaranteed by a standardised guarantor also takes the
//! standardised CCF on the covered share of its nominal.

use crate::allocation::{level_key, Beneficiary, GroupTotals};
use crate::ccf::blend_cross_approach;
use crate::exposure::{CrmExposure, GuaranteeOutcome, GuaranteeStatus, GuarantorApproach};
use crate::irb;
use crate::stage::{usable_relation, ExposureTransform, StageContext};
use crate::substitution::{borrower_risk_weight, guarantor_approach, guarantor_sa_risk_weight};
use crm_core::{
    BeneficiaryLevel, CalculationConfig, CounterpartyId, CrmIssue, FrameworkParams, Relation,
};
use crm_hierarchy::{CounterpartyLookup, GuaranteeItem};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Columns a guarantee relation must carry.
pub const REQUIRED_GUARANTEE_COLUMNS: &[&str] =
    &["beneficiary_reference", "amount_covered", "guarantor"];

/// Guarantee cover gathered for one exposure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GuaranteeCover {
    /// Total covered amount before capping at EAD.
    pub amount: f64,
    /// Guarantor of the largest contribution.
    pub guarantor: Option<CounterpartyId>,
}

/// Gathers guarantee cover per exposure, in row order.
///
/// Direct amounts add. Facility and counterparty amounts are spread by
/// share of `ead_after_collateral`. A percentage-only guarantee covers that
/// percentage of each member's `ead_after_collateral`.
pub fn aggregate_guarantees(exposures: &[CrmExposure], items: &[GuaranteeItem]) -> Vec<GuaranteeCover> {
    let mut by_beneficiary: HashMap<(BeneficiaryLevel, &str), Vec<&GuaranteeItem>> = HashMap::new();
    for item in items {
        by_beneficiary
            .entry((item.level(), item.beneficiary()))
            .or_default()
            .push(item);
    }

    let weight = |e: &CrmExposure| e.ead_after_collateral;
    let facility = GroupTotals::build(exposures, BeneficiaryLevel::Facility, weight);
    let counterparty = GroupTotals::build(exposures, BeneficiaryLevel::Counterparty, weight);

    exposures
        .iter()
        .map(|e| {
            let ead = e.ead_after_collateral;
            let mut by_guarantor: Vec<(&CounterpartyId, f64)> = Vec::new();

            for level in [
                BeneficiaryLevel::Direct,
                BeneficiaryLevel::Facility,
                BeneficiaryLevel::Counterparty,
            ] {
                let Some(key) = level_key(e, level) else {
                    continue;
                };
                let Some(items) = by_beneficiary.get(&(level, key)) else {
                    continue;
                };
                let share = match level {
                    BeneficiaryLevel::Direct => 1.0,
                    BeneficiaryLevel::Facility => facility.share(key, ead),
                    BeneficiaryLevel::Counterparty => counterparty.share(key, ead),
                };
                for item in items {
                    let contribution = match (item.amount_covered, item.percentage_covered) {
                        (Some(amount), _) if amount > 0.0 => amount * share,
                        (_, Some(pct)) if pct > 0.0 => pct * ead,
                        _ => 0.0,
                    };
                    if contribution <= 0.0 {
                        continue;
                    }
                    match by_guarantor.iter_mut().find(|(g, _)| *g == &item.guarantor) {
                        Some((_, total)) => *total += contribution,
                        None => by_guarantor.push((&item.guarantor, contribution)),
                    }
                }
            }

            let amount = by_guarantor.iter().map(|(_, c)| c).sum();
            let guarantor = by_guarantor
                .iter()
                .fold(None::<(&CounterpartyId, f64)>, |best, &(g, c)| match best {
                    Some((_, top)) if top >= c => best,
                    _ => Some((g, c)),
                })
                .map(|(g, _)| g.clone());
            GuaranteeCover { amount, guarantor }
        })
        .collect()
}

/// Applies guarantee substitution.
#[derive(Debug, Clone, Copy)]
pub struct GuaranteeSubstitution<'a> {
    params: &'a FrameworkParams,
    config: &'a CalculationConfig,
    guarantees: Option<&'a Relation<GuaranteeItem>>,
    lookup: Option<&'a CounterpartyLookup>,
}

impl<'a> GuaranteeSubstitution<'a> {
    /// Creates the stage.
    pub fn new(
        params: &'a FrameworkParams,
        config: &'a CalculationConfig,
        guarantees: Option<&'a Relation<GuaranteeItem>>,
        lookup: Option<&'a CounterpartyLookup>,
    ) -> Self {
        Self {
            params,
            config,
            guarantees,
            lookup,
        }
    }

    /// Substitutes one exposure's guarantee cover.
    ///
    /// Returns the issue raised when the guarantee could not be applied.
    pub fn substitute(
        &self,
        mut e: CrmExposure,
        cover: GuaranteeCover,
        lookup: &CounterpartyLookup,
    ) -> (CrmExposure, Option<CrmIssue>) {
        let Some(guarantor) = cover.guarantor else {
            return (e, None);
        };
        if cover.amount <= 0.0 {
            return (e, None);
        }

        let ead = e.ead_after_collateral.max(0.0);
        let guaranteed = cover.amount.min(ead);
        let unguaranteed = ead - guaranteed;
        let ratio = if ead > 0.0 { (guaranteed / ead).min(1.0) } else { 0.0 };

        let profile = lookup.get(&guarantor);
        let class = profile.and_then(|p| p.exposure_class);
        let cqs = profile.and_then(|p| p.cqs());
        let pd = profile.and_then(|p| p.pd());
        let approach = guarantor_approach(
            &self.config.irb_permissions,
            class,
            profile.is_some_and(|p| p.rating.is_internal()),
        );

        // Held back until the guarantee proves beneficial.
        let cross_approach = (e.approach.is_irb()
            && approach == Some(GuarantorApproach::Sa)
            && guaranteed > 0.0
            && e.nominal_amount > 0.0)
            .then(|| {
                let ccf_guaranteed = self.params.sa_ccf(e.risk_type);
                (ccf_guaranteed, blend_cross_approach(&e, ratio, ccf_guaranteed))
            });

        let borrower_rw = borrower_risk_weight(
            &e,
            self.params,
            &self.config.base_currency,
            self.config.reporting_date,
        );
        let maturity = e.residual_maturity_years(self.config.reporting_date);
        let candidate = match (approach, class, pd) {
            (Some(GuarantorApproach::Irb), Some(class), Some(pd))
                if self.params.allows_pd_substitution =>
            {
                let rw = irb::risk_weight(
                    self.params,
                    class,
                    pd,
                    self.params.guarantor_substitution_lgd,
                    maturity,
                );
                Some((rw, GuaranteeStatus::PdSubstitution))
            }
            (Some(_), Some(class), _) => {
                guarantor_sa_risk_weight(class, cqs, &self.config.base_currency)
                    .map(|rw| (rw, GuaranteeStatus::SaRwSubstitution))
            }
            _ => None,
        };

        let mut outcome = GuaranteeOutcome {
            amount: cover.amount,
            guaranteed_portion: guaranteed,
            unguaranteed_portion: unguaranteed,
            guarantee_ratio: ratio,
            guarantor: Some(guarantor.clone()),
            guarantor_exposure_class: class,
            guarantor_approach: approach,
            guarantor_cqs: cqs,
            guarantor_pd: pd,
            borrower_risk_weight: Some(borrower_rw),
            guarantor_risk_weight: candidate.map(|(rw, _)| rw),
            risk_weight: Some(borrower_rw),
            status: GuaranteeStatus::NotAppliedNonBeneficial,
            benefit_rw: 0.0,
        };

        let issue = match candidate {
            Some((guarantor_rw, status)) if guarantor_rw < borrower_rw => {
                let (guaranteed, unguaranteed) = match cross_approach {
                    Some((ccf_guaranteed, blend)) => {
                        e.ccf_guaranteed = ccf_guaranteed;
                        e.ccf_unguaranteed = e.ccf_original;
                        e.ead_from_ccf = blend.ead_from_ccf;
                        e.ead_after_collateral = blend.guaranteed + blend.unguaranteed;
                        outcome.guaranteed_portion = blend.guaranteed;
                        outcome.unguaranteed_portion = blend.unguaranteed;
                        (blend.guaranteed, blend.unguaranteed)
                    }
                    None => (guaranteed, unguaranteed),
                };
                let total = guaranteed + unguaranteed;
                let blended = if total > 0.0 {
                    (unguaranteed * borrower_rw + guaranteed * guarantor_rw) / total
                } else {
                    borrower_rw
                };
                outcome.risk_weight = Some(blended);
                outcome.status = status;
                outcome.benefit_rw = borrower_rw - blended;
                None
            }
            Some((guarantor_rw, _)) => Some(
                CrmIssue::business_rule(
                    "guarantee_not_beneficial",
                    format!(
                        "Guarantor {} risk weight {:.4} not below borrower {:.4}",
                        guarantor, guarantor_rw, borrower_rw
                    ),
                )
                .with_entity(e.reference.to_string()),
            ),
            None if profile.is_none() => Some(
                CrmIssue::data_quality(
                    "guarantor_not_found",
                    format!("Guarantor {} missing from counterparty lookup", guarantor),
                )
                .with_entity(e.reference.to_string()),
            ),
            None => Some(
                CrmIssue::business_rule(
                    "guarantor_not_eligible",
                    format!("Guarantor {} has no substitutable risk weight", guarantor),
                )
                .with_entity(e.reference.to_string())
                .with_context(
                    "guarantor_class",
                    class.map(|c| c.to_string()).unwrap_or_default(),
                ),
            ),
        };

        e.guarantee = outcome;
        (e, issue)
    }
}

impl ExposureTransform for GuaranteeSubstitution<'_> {
    fn name(&self) -> &'static str {
        "guarantees"
    }

    fn apply(&self, exposures: Vec<CrmExposure>, ctx: &mut StageContext) -> Vec<CrmExposure> {
        let Some(guarantees) = usable_relation(
            self.guarantees,
            REQUIRED_GUARANTEE_COLUMNS,
            self.name(),
            "guarantees_missing_columns",
            ctx,
        ) else {
            return exposures;
        };
        let Some(lookup) = self.lookup else {
            warn!(stage = self.name(), "No counterparty lookup; skipping guarantees");
            ctx.push_issue(CrmIssue::data_quality(
                "guarantee_lookup_missing",
                "Guarantees supplied without a counterparty lookup; stage skipped",
            ));
            return exposures;
        };

        let covers = aggregate_guarantees(&exposures, guarantees.rows());
        let rows: Vec<(CrmExposure, GuaranteeCover)> = exposures.into_iter().zip(covers).collect();
        let (out, issues): (Vec<CrmExposure>, Vec<Option<CrmIssue>>) = self
            .config
            .parallel
            .map_owned(rows, |(e, cover)| self.substitute(e, cover, lookup))
            .into_iter()
            .unzip();

        for issue in issues.into_iter().flatten() {
            debug!(code = issue.code, entity = ?issue.entity_reference, "Guarantee not applied");
            ctx.push_issue(issue);
        }
        info!(
            items = guarantees.len(),
            applied = out.iter().filter(|e| e.guarantee.status.is_applied()).count(),
            guaranteed = out.iter().map(|e| e.guarantee.guaranteed_portion).sum::<f64>(),
            "Applied guarantees"
        );
        out
    }
}
