//! Exposure unification.
//!
//! Loans, contingents and computed facility headroom are merged into one
//! row shape carrying facility hierarchy keys and counterparty rating
//! fields.

use crate::graph::HierarchyLookup;
use crate::rating::EffectiveRating;
use crate::records::{Contingent, Facility, FacilityMapping, Loan, MappingChildType};
use chrono::NaiveDate;
use crm_core::{CounterpartyId, ExposureId, ExposureType, FacilityId, RiskType, Seniority};
use std::collections::{HashMap, HashSet};

/// A unified exposure row.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UnifiedExposure {
    /// Exposure reference.
    pub reference: ExposureId,
    /// Row kind.
    pub exposure_type: ExposureType,
    /// Obligor.
    pub counterparty: CounterpartyId,
    /// Currency of the amounts.
    pub currency: String,
    /// Contractual maturity.
    pub maturity_date: Option<NaiveDate>,
    /// Drawn balance.
    pub drawn_amount: f64,
    /// Accrued interest.
    pub interest: f64,
    /// Off-balance-sheet nominal.
    pub nominal_amount: f64,
    /// Facility headroom; equals nominal on undrawn rows.
    pub undrawn_amount: f64,
    /// Own LGD estimate.
    pub lgd: Option<f64>,
    /// Claim seniority.
    pub seniority: Seniority,
    /// CCF risk category.
    pub risk_type: Option<RiskType>,
    /// Own CCF estimate.
    pub ccf_modelled: Option<f64>,
    /// Short-term trade letter of credit.
    pub is_short_term_trade_lc: bool,
    /// Immediate parent facility.
    pub parent_facility: Option<FacilityId>,
    /// Top-most facility.
    pub root_facility: Option<FacilityId>,
    /// Levels below the root facility (0 when unmapped).
    pub facility_hierarchy_depth: usize,
    /// Counterparty credit-quality step after inheritance.
    pub cqs: Option<u8>,
    /// Counterparty PD after inheritance.
    pub pd: Option<f64>,
    /// Lending group parent.
    pub lending_group: Option<CounterpartyId>,
    /// Sum of drawn and nominal across the lending group.
    pub lending_group_total_exposure: f64,
    /// Sum of retail-threshold exposure across the lending group.
    pub lending_group_adjusted_exposure: f64,
    /// Loan-to-value from the nearest real-estate pledge.
    pub ltv: Option<f64>,
    /// Residential real estate securing this row, capped at drawn.
    pub residential_collateral_value: f64,
    /// All real estate securing this row, capped at drawn.
    pub property_collateral_value: f64,
    /// Real estate is pledged at some level of this row's hierarchy.
    pub has_facility_property_collateral: bool,
    /// Drawn balance net of residential cover.
    pub exposure_for_retail_threshold: f64,
    /// Currency before FX conversion.
    pub original_currency: Option<String>,
    /// Drawn plus interest plus nominal before FX conversion.
    pub original_amount: Option<f64>,
    /// Rate used to convert to the base currency.
    pub fx_rate_applied: Option<f64>,
}

impl UnifiedExposure {
    fn blank(
        reference: ExposureId,
        exposure_type: ExposureType,
        counterparty: CounterpartyId,
        currency: String,
    ) -> Self {
        Self {
            reference,
            exposure_type,
            counterparty,
            currency,
            maturity_date: None,
            drawn_amount: 0.0,
            interest: 0.0,
            nominal_amount: 0.0,
            undrawn_amount: 0.0,
            lgd: None,
            seniority: Seniority::Senior,
            risk_type: None,
            ccf_modelled: None,
            is_short_term_trade_lc: false,
            parent_facility: None,
            root_facility: None,
            facility_hierarchy_depth: 0,
            cqs: None,
            pd: None,
            lending_group: None,
            lending_group_total_exposure: 0.0,
            lending_group_adjusted_exposure: 0.0,
            ltv: None,
            residential_collateral_value: 0.0,
            property_collateral_value: 0.0,
            has_facility_property_collateral: false,
            exposure_for_retail_threshold: 0.0,
            original_currency: None,
            original_amount: None,
            fx_rate_applied: None,
        }
    }

    /// Drawn balance floored at zero plus nominal.
    #[inline]
    pub fn gross_utilisation(&self) -> f64 {
        self.drawn_amount.max(0.0) + self.nominal_amount
    }
}

impl From<&Loan> for UnifiedExposure {
    fn from(loan: &Loan) -> Self {
        Self {
            maturity_date: loan.maturity_date,
            drawn_amount: loan.drawn_amount,
            interest: loan.interest,
            lgd: loan.lgd,
            seniority: loan.seniority,
            ..Self::blank(
                loan.reference.clone(),
                ExposureType::Loan,
                loan.counterparty.clone(),
                loan.currency.clone(),
            )
        }
    }
}

impl From<&Contingent> for UnifiedExposure {
    fn from(c: &Contingent) -> Self {
        let base = Self {
            maturity_date: c.maturity_date,
            lgd: c.lgd,
            seniority: c.seniority,
            ..Self::blank(
                c.reference.clone(),
                ExposureType::Contingent,
                c.counterparty.clone(),
                c.currency.clone(),
            )
        };
        if c.on_balance_sheet {
            // Already funded: no conversion applies.
            Self {
                drawn_amount: c.nominal_amount,
                ..base
            }
        } else {
            Self {
                nominal_amount: c.nominal_amount,
                risk_type: c.risk_type,
                ccf_modelled: c.ccf_modelled,
                is_short_term_trade_lc: c.is_short_term_trade_lc,
                ..base
            }
        }
    }
}

/// Facility→facility edges from the mapping table.
pub fn facility_edges(
    mappings: &[FacilityMapping],
) -> impl Iterator<Item = (Option<FacilityId>, Option<FacilityId>)> + '_ {
    mappings
        .iter()
        .filter(|m| m.child_type == MappingChildType::Facility)
        .map(|m| (m.child_reference.clone().map(FacilityId::from), m.parent.clone()))
}

/// Parent facility per loan/contingent reference; first mapping wins.
fn exposure_parents(mappings: &[FacilityMapping]) -> HashMap<&str, &FacilityId> {
    let mut parents = HashMap::new();
    for m in mappings {
        if m.child_type == MappingChildType::Facility {
            continue;
        }
        if let (Some(child), Some(parent)) = (m.child_reference.as_deref(), m.parent.as_ref()) {
            parents.entry(child).or_insert(parent);
        }
    }
    parents
}

/// Computes undrawn headroom rows for root facilities.
///
/// `headroom = max(0, limit − Σ max(0, drawn) − Σ max(0, contingent nominal))`
/// where children under sub-facilities count against their root. Rows with
/// no headroom are omitted, as are sub-facilities.
pub fn facility_undrawn(
    facilities: &[Facility],
    loans: &[Loan],
    contingents: &[Contingent],
    mappings: &[FacilityMapping],
    roots: &HierarchyLookup<FacilityId>,
) -> Vec<UnifiedExposure> {
    let mut typed: HashMap<(MappingChildType, &str), &FacilityId> = HashMap::new();
    for m in mappings {
        if let (Some(child), Some(parent)) = (m.child_reference.as_deref(), m.parent.as_ref()) {
            typed.entry((m.child_type, child)).or_insert(parent);
        }
    }

    let children = loans
        .iter()
        .map(|l| (MappingChildType::Loan, l.reference.as_str(), l.drawn_amount))
        .chain(
            contingents
                .iter()
                .map(|c| (MappingChildType::Contingent, c.reference.as_str(), c.nominal_amount)),
        );

    let mut utilised: HashMap<FacilityId, f64> = HashMap::new();
    for (kind, reference, amount) in children {
        if let Some(&parent) = typed.get(&(kind, reference)) {
            let root = roots.root_of(parent).clone();
            // Credit balances never release headroom.
            *utilised.entry(root).or_insert(0.0) += amount.max(0.0);
        }
    }

    facilities
        .iter()
        .filter(|f| !roots.contains(&f.reference))
        .filter_map(|f| {
            let used = utilised.get(&f.reference).copied().unwrap_or(0.0);
            let headroom = (f.limit - used).max(0.0);
            if headroom <= 0.0 {
                return None;
            }
            Some(UnifiedExposure {
                maturity_date: f.maturity_date,
                nominal_amount: headroom,
                undrawn_amount: headroom,
                lgd: f.lgd,
                seniority: f.seniority,
                risk_type: f.risk_type,
                ccf_modelled: f.ccf_modelled,
                is_short_term_trade_lc: f.is_short_term_trade_lc,
                parent_facility: Some(f.reference.clone()),
                ..UnifiedExposure::blank(
                    ExposureId::undrawn_for(&f.reference),
                    ExposureType::FacilityUndrawn,
                    f.counterparty.clone(),
                    f.currency.clone(),
                )
            })
        })
        .collect()
}

/// Merges loans, contingents and facility headroom into unified rows.
///
/// Attaches `parent_facility`, `root_facility` and
/// `facility_hierarchy_depth`, plus the counterparty's inherited CQS and PD.
pub fn unify_exposures(
    loans: &[Loan],
    contingents: &[Contingent],
    facilities: &[Facility],
    mappings: &[FacilityMapping],
    roots: &HierarchyLookup<FacilityId>,
    ratings: &HashMap<CounterpartyId, EffectiveRating>,
) -> Vec<UnifiedExposure> {
    let parents = exposure_parents(mappings);

    let mut rows: Vec<UnifiedExposure> = loans
        .iter()
        .map(UnifiedExposure::from)
        .chain(contingents.iter().map(UnifiedExposure::from))
        .map(|mut row| {
            row.parent_facility = parents.get(row.reference.as_str()).map(|&p| p.clone());
            row
        })
        .collect();
    rows.extend(facility_undrawn(facilities, loans, contingents, mappings, roots));

    for row in &mut rows {
        if let Some(parent) = row.parent_facility.clone() {
            match roots.get(&parent) {
                Some(node) => {
                    row.root_facility = Some(node.root.clone());
                    row.facility_hierarchy_depth = node.depth + 1;
                }
                None => {
                    row.root_facility = Some(parent);
                    row.facility_hierarchy_depth = 1;
                }
            }
        }
        if let Some(rating) = ratings.get(&row.counterparty) {
            row.cqs = rating.cqs;
            row.pd = rating.pd;
        }
    }

    rows
}

/// References of loans/contingents whose mapped parent facility is unknown.
pub fn unknown_parent_facilities<'a>(
    mappings: &'a [FacilityMapping],
    facilities: &[Facility],
) -> Vec<(&'a str, &'a FacilityId)> {
    let known: HashSet<&FacilityId> = facilities.iter().map(|f| &f.reference).collect();
    mappings
        .iter()
        .filter_map(|m| Some((m.child_reference.as_deref()?, m.parent.as_ref()?)))
        .filter(|(_, parent)| !known.contains(parent))
        .collect()
}
