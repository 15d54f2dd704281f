//! Lending-group membership and group exposure totals.

use crate::records::LendingMapping;
use crate::unify::UnifiedExposure;
use crm_core::CounterpartyId;
use std::collections::{BTreeMap, HashMap};

/// Maps each member counterparty to its lending-group parent.
///
/// Child edges are considered before parents joining their own group, and
/// the first assignment of a member wins.
pub fn lending_groups(mappings: &[LendingMapping]) -> HashMap<CounterpartyId, CounterpartyId> {
    let mut groups = HashMap::new();
    for m in mappings {
        groups.entry(m.child.clone()).or_insert_with(|| m.parent.clone());
    }
    for m in mappings {
        groups.entry(m.parent.clone()).or_insert_with(|| m.parent.clone());
    }
    groups
}

/// Attaches the lending group and its exposure totals to every row.
///
/// The total is `Σ max(0, drawn) + nominal` over all rows in the group, and
/// the adjusted total sums `exposure_for_retail_threshold`, so property
/// coverage must already be attached. Rows outside any group carry zero.
pub fn apply_lending_groups(
    rows: &mut [UnifiedExposure],
    groups: &HashMap<CounterpartyId, CounterpartyId>,
) {
    let mut totals: HashMap<&CounterpartyId, (f64, f64)> = HashMap::new();
    for row in rows.iter() {
        if let Some(group) = groups.get(&row.counterparty) {
            let entry = totals.entry(group).or_insert((0.0, 0.0));
            entry.0 += row.gross_utilisation();
            entry.1 += row.exposure_for_retail_threshold;
        }
    }

    for row in rows.iter_mut() {
        match groups.get(&row.counterparty) {
            Some(group) => {
                let (total, adjusted) = totals.get(group).copied().unwrap_or((0.0, 0.0));
                row.lending_group_total_exposure = total;
                row.lending_group_adjusted_exposure = adjusted;
                row.lending_group = Some(group.clone());
            }
            None => {
                row.lending_group = None;
                row.lending_group_total_exposure = 0.0;
                row.lending_group_adjusted_exposure = 0.0;
            }
        }
    }
}

/// Aggregate exposure of one lending group.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LendingGroupTotals {
    /// Group parent counterparty.
    pub lending_group: CounterpartyId,
    /// `Σ max(0, drawn)`.
    pub total_drawn: f64,
    /// `Σ nominal`.
    pub total_nominal: f64,
    /// Drawn plus nominal.
    pub total_exposure: f64,
    /// `Σ exposure_for_retail_threshold`.
    pub adjusted_exposure: f64,
    /// `Σ residential_collateral_value`.
    pub total_residential_coverage: f64,
    /// Rows in the group.
    pub exposure_count: usize,
}

/// Per-group totals over rows already tagged with their lending group,
/// ordered by group reference.
pub fn lending_group_totals(rows: &[UnifiedExposure]) -> Vec<LendingGroupTotals> {
    let mut totals: BTreeMap<&CounterpartyId, LendingGroupTotals> = BTreeMap::new();
    for row in rows {
        let Some(group) = row.lending_group.as_ref() else {
            continue;
        };
        let t = totals.entry(group).or_insert_with(|| LendingGroupTotals {
            lending_group: group.clone(),
            total_drawn: 0.0,
            total_nominal: 0.0,
            total_exposure: 0.0,
            adjusted_exposure: 0.0,
            total_residential_coverage: 0.0,
            exposure_count: 0,
        });
        t.total_drawn += row.drawn_amount.max(0.0);
        t.total_nominal += row.nominal_amount;
        t.total_exposure += row.gross_utilisation();
        t.adjusted_exposure += row.exposure_for_retail_threshold;
        t.total_residential_coverage += row.residential_collateral_value;
        t.exposure_count += 1;
    }
    totals.into_values().collect()
}
