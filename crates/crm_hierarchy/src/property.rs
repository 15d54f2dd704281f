//! Real-estate enrichment of unified exposures.
//!
//! Collateral pledged at exposure, facility or counterparty level is looked
//! up for each row, nearest level first. Two passes run here:
//!
//! - loan-to-value, taken from the first pledge carrying one
//! - residential and total property cover, which nets residential real
//!   estate out of the drawn balance for the retail threshold test
//!
//! Facility- and counterparty-level cover is spread across member rows in
//! proportion to their drawn balances.

use crate::records::CollateralItem;
use crate::unify::UnifiedExposure;
use crm_core::relation::missing_required;
use crm_core::{BeneficiaryLevel, CounterpartyId, FacilityId, Relation};
use std::collections::HashMap;
use tracing::debug;

const LTV_COLUMNS: &[&str] = &["beneficiary_reference", "property_ltv"];

const COVERAGE_COLUMNS: &[&str] = &[
    "beneficiary_reference",
    "collateral_type",
    "market_value",
    "property_type",
];

fn usable<'a>(
    collateral: Option<&'a Relation<CollateralItem>>,
    required: &[&str],
    pass: &'static str,
) -> Option<&'a Relation<CollateralItem>> {
    match missing_required(collateral, required) {
        Some(missing) if missing.is_empty() => collateral,
        Some(missing) => {
            debug!(%pass, missing = ?missing, "Collateral lacks property columns; pass skipped");
            None
        }
        None => None,
    }
}

/// Values keyed by beneficiary reference, one map per level.
struct ByLevel<'a, V> {
    direct: HashMap<&'a str, V>,
    facility: HashMap<&'a str, V>,
    counterparty: HashMap<&'a str, V>,
}

impl<'a, V> ByLevel<'a, V> {
    fn new() -> Self {
        Self {
            direct: HashMap::new(),
            facility: HashMap::new(),
            counterparty: HashMap::new(),
        }
    }

    fn level_mut(&mut self, level: BeneficiaryLevel) -> &mut HashMap<&'a str, V> {
        match level {
            BeneficiaryLevel::Direct => &mut self.direct,
            BeneficiaryLevel::Facility => &mut self.facility,
            BeneficiaryLevel::Counterparty => &mut self.counterparty,
        }
    }

    fn for_row(&self, row: &UnifiedExposure) -> [Option<&V>; 3] {
        [
            self.direct.get(row.reference.as_str()),
            row.parent_facility
                .as_ref()
                .and_then(|f| self.facility.get(f.as_str())),
            self.counterparty.get(row.counterparty.as_str()),
        ]
    }
}

/// Attaches the loan-to-value of the nearest real-estate pledge.
///
/// Exposure-level pledges take precedence over facility-level, which take
/// precedence over counterparty-level. Within a level the first item with
/// an LTV wins. Rows are left with no LTV when collateral is absent or
/// lacks the LTV columns.
pub fn apply_collateral_ltv(
    rows: &mut [UnifiedExposure],
    collateral: Option<&Relation<CollateralItem>>,
) {
    let Some(collateral) = usable(collateral, LTV_COLUMNS, "ltv") else {
        rows.iter_mut().for_each(|r| r.ltv = None);
        return;
    };

    let mut ltvs = ByLevel::new();
    for item in collateral.rows() {
        if let Some(ltv) = item.property_ltv {
            ltvs.level_mut(item.beneficiary_level)
                .entry(item.beneficiary_reference.as_str())
                .or_insert(ltv);
        }
    }

    for row in rows.iter_mut() {
        row.ltv = ltvs.for_row(row).into_iter().flatten().next().copied();
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Cover {
    residential: f64,
    property: f64,
}

/// Attaches residential and total real-estate cover to every row.
///
/// Cover at facility level is weighted by the row's share of drawn balance
/// under its parent facility, and counterparty cover by its share across
/// the counterparty. Both values are capped at the row's floored drawn
/// balance, and `exposure_for_retail_threshold` is that balance less the
/// residential cover.
pub fn apply_property_coverage(
    rows: &mut [UnifiedExposure],
    collateral: Option<&Relation<CollateralItem>>,
) {
    for row in rows.iter_mut() {
        row.residential_collateral_value = 0.0;
        row.property_collateral_value = 0.0;
        row.has_facility_property_collateral = false;
        row.exposure_for_retail_threshold = row.drawn_amount.max(0.0);
    }

    let Some(collateral) = usable(collateral, COVERAGE_COLUMNS, "property_coverage") else {
        return;
    };

    let mut cover: ByLevel<Cover> = ByLevel::new();
    for item in collateral
        .rows()
        .iter()
        .filter(|c| c.collateral_type.is_real_estate())
    {
        let value = item.market_value.unwrap_or(0.0);
        let entry = cover
            .level_mut(item.beneficiary_level)
            .entry(item.beneficiary_reference.as_str())
            .or_default();
        entry.property += value;
        if item.is_residential_property() {
            entry.residential += value;
        }
    }

    let weights: Vec<(f64, f64)> = {
        let mut facility_totals: HashMap<&FacilityId, f64> = HashMap::new();
        let mut cp_totals: HashMap<&CounterpartyId, f64> = HashMap::new();
        for row in rows.iter() {
            let drawn = row.drawn_amount.max(0.0);
            if let Some(f) = row.parent_facility.as_ref() {
                *facility_totals.entry(f).or_insert(0.0) += drawn;
            }
            *cp_totals.entry(&row.counterparty).or_insert(0.0) += drawn;
        }

        let share = |drawn: f64, total: f64| if total > 0.0 { drawn / total } else { 0.0 };
        rows.iter()
            .map(|row| {
                let drawn = row.drawn_amount.max(0.0);
                let facility_total = row
                    .parent_facility
                    .as_ref()
                    .and_then(|f| facility_totals.get(f).copied())
                    .unwrap_or(drawn);
                let cp_total = cp_totals.get(&row.counterparty).copied().unwrap_or(drawn);
                (share(drawn, facility_total), share(drawn, cp_total))
            })
            .collect()
    };

    for (row, (facility_weight, cp_weight)) in rows.iter_mut().zip(weights) {
        let [direct, facility, counterparty] = cover.for_row(row).map(|c| c.copied().unwrap_or_default());
        let total = row.drawn_amount.max(0.0);

        let residential = direct.residential
            + facility.residential * facility_weight
            + counterparty.residential * cp_weight;
        let property =
            direct.property + facility.property * facility_weight + counterparty.property * cp_weight;

        row.residential_collateral_value = residential.min(total);
        row.property_collateral_value = property.min(total);
        row.has_facility_property_collateral =
            direct.property > 0.0 || facility.property > 0.0 || counterparty.property > 0.0;
        row.exposure_for_retail_threshold = total - row.residential_collateral_value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Loan;
    use approx::assert_relative_eq;
    use crm_core::{CollateralType, PropertyType};

    fn loan(reference: &str, cp: &str, drawn: f64, facility: Option<&str>) -> UnifiedExposure {
        let mut row = UnifiedExposure::from(&Loan::new(reference, cp, "GBP", drawn));
        row.parent_facility = facility.map(FacilityId::from);
        row
    }

    fn property(
        reference: &str,
        level: BeneficiaryLevel,
        beneficiary: &str,
        value: f64,
        kind: PropertyType,
        ltv: Option<f64>,
    ) -> CollateralItem {
        CollateralItem::new(reference, level, beneficiary, CollateralType::RealEstate, value)
            .with_property(kind, ltv)
    }

    #[test]
    fn test_ltv_nearest_level_wins() {
        let collateral = Relation::new(vec![
            property("C1", BeneficiaryLevel::Counterparty, "CP1", 1.0, PropertyType::Residential, Some(0.9)),
            property("C2", BeneficiaryLevel::Facility, "F1", 1.0, PropertyType::Residential, Some(0.7)),
            property("C3", BeneficiaryLevel::Direct, "L1", 1.0, PropertyType::Residential, Some(0.5)),
            property("C4", BeneficiaryLevel::Direct, "L1", 1.0, PropertyType::Residential, Some(0.4)),
        ]);
        let mut rows = vec![
            loan("L1", "CP1", 100.0, Some("F1")),
            loan("L2", "CP1", 100.0, Some("F1")),
            loan("L3", "CP1", 100.0, None),
            loan("L4", "CP2", 100.0, None),
        ];
        apply_collateral_ltv(&mut rows, Some(&collateral));

        assert_eq!(rows[0].ltv, Some(0.5));
        assert_eq!(rows[1].ltv, Some(0.7));
        assert_eq!(rows[2].ltv, Some(0.9));
        assert_eq!(rows[3].ltv, None);
    }

    #[test]
    fn test_ltv_skips_items_without_ltv() {
        let collateral = Relation::new(vec![
            property("C1", BeneficiaryLevel::Direct, "L1", 1.0, PropertyType::Commercial, None),
            property("C2", BeneficiaryLevel::Direct, "L1", 1.0, PropertyType::Commercial, Some(0.6)),
        ]);
        let mut rows = vec![loan("L1", "CP1", 100.0, None)];
        apply_collateral_ltv(&mut rows, Some(&collateral));
        assert_eq!(rows[0].ltv, Some(0.6));
    }

    #[test]
    fn test_ltv_requires_columns() {
        let collateral = Relation::with_columns(
            vec![property("C1", BeneficiaryLevel::Direct, "L1", 1.0, PropertyType::Residential, Some(0.6))],
            ["beneficiary_reference", "market_value"],
        );
        let mut rows = vec![loan("L1", "CP1", 100.0, None)];
        apply_collateral_ltv(&mut rows, Some(&collateral));
        assert_eq!(rows[0].ltv, None);
    }

    #[test]
    fn test_facility_cover_spread_by_drawn_share() {
        let collateral = Relation::new(vec![
            property("C1", BeneficiaryLevel::Facility, "F1", 90.0, PropertyType::Residential, None),
            property("C2", BeneficiaryLevel::Facility, "F1", 30.0, PropertyType::Commercial, None),
        ]);
        let mut rows = vec![
            loan("L1", "CP1", 100.0, Some("F1")),
            loan("L2", "CP1", 200.0, Some("F1")),
        ];
        apply_property_coverage(&mut rows, Some(&collateral));

        assert_relative_eq!(rows[0].residential_collateral_value, 30.0);
        assert_relative_eq!(rows[1].residential_collateral_value, 60.0);
        assert_relative_eq!(rows[0].property_collateral_value, 40.0);
        assert_relative_eq!(rows[1].property_collateral_value, 80.0);
        assert_relative_eq!(rows[0].exposure_for_retail_threshold, 70.0);
        assert_relative_eq!(rows[1].exposure_for_retail_threshold, 140.0);
        assert!(rows.iter().all(|r| r.has_facility_property_collateral));
    }

    #[test]
    fn test_cover_capped_at_drawn() {
        let collateral = Relation::new(vec![property(
            "C1",
            BeneficiaryLevel::Direct,
            "L1",
            500.0,
            PropertyType::Residential,
            None,
        )]);
        let mut rows = vec![loan("L1", "CP1", 100.0, None)];
        apply_property_coverage(&mut rows, Some(&collateral));

        assert_relative_eq!(rows[0].residential_collateral_value, 100.0);
        assert_relative_eq!(rows[0].property_collateral_value, 100.0);
        assert_relative_eq!(rows[0].exposure_for_retail_threshold, 0.0);
    }

    #[test]
    fn test_counterparty_cover_ignores_undrawn_rows() {
        let collateral = Relation::new(vec![property(
            "C1",
            BeneficiaryLevel::Counterparty,
            "CP1",
            50.0,
            PropertyType::Residential,
            None,
        )]);
        let mut undrawn = loan("U1", "CP1", 0.0, None);
        undrawn.nominal_amount = 400.0;
        let mut rows = vec![loan("L1", "CP1", 100.0, None), undrawn];
        apply_property_coverage(&mut rows, Some(&collateral));

        assert_relative_eq!(rows[0].residential_collateral_value, 50.0);
        assert_relative_eq!(rows[1].residential_collateral_value, 0.0);
        assert!(rows[1].has_facility_property_collateral);
    }

    #[test]
    fn test_non_property_collateral_ignored() {
        let collateral = Relation::new(vec![CollateralItem::new(
            "C1",
            BeneficiaryLevel::Direct,
            "L1",
            CollateralType::Cash,
            80.0,
        )]);
        let mut rows = vec![loan("L1", "CP1", 100.0, None)];
        apply_property_coverage(&mut rows, Some(&collateral));

        assert_eq!(rows[0].property_collateral_value, 0.0);
        assert!(!rows[0].has_facility_property_collateral);
        assert_relative_eq!(rows[0].exposure_for_retail_threshold, 100.0);
    }

    #[test]
    fn test_missing_property_type_column_falls_back() {
        let collateral = Relation::with_columns(
            vec![property("C1", BeneficiaryLevel::Direct, "L1", 60.0, PropertyType::Residential, None)],
            ["beneficiary_reference", "collateral_type", "market_value"],
        );
        let mut rows = vec![loan("L1", "CP1", -10.0, None)];
        apply_property_coverage(&mut rows, Some(&collateral));

        assert_eq!(rows[0].residential_collateral_value, 0.0);
        assert_eq!(rows[0].exposure_for_retail_threshold, 0.0);
    }
}
