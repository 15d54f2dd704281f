//! End-to-end hierarchy resolution over a small banking book.

use approx::assert_relative_eq;
use chrono::NaiveDate;
use crm_core::{
    BeneficiaryLevel, CalculationConfig, CollateralType, CounterpartyId, ExposureClass,
    ExposureType, FacilityId, Relation, RiskType,
};
use crm_hierarchy::{
    CollateralItem, Contingent, Counterparty, Facility, FacilityMapping, FxRate,
    HierarchyResolver, InheritanceReason, LendingMapping, Loan, OrgMapping, RawData,
    RawDataBuilder, Rating, ResolvedHierarchy,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn book() -> RawData {
    RawDataBuilder::new()
        .add_counterparties([
            Counterparty::new("GROUP", "corporate"),
            Counterparty::new("OPCO", "company"),
            Counterparty::new("BANK1", "bank"),
        ])
        .add_org_mapping(OrgMapping::new("GROUP", "OPCO"))
        .add_ratings([
            Rating::external("GROUP", "R-G-1", 3, date(2023, 6, 30)),
            Rating::external("GROUP", "R-G-2", 2, date(2024, 6, 30)),
            Rating::internal("BANK1", "R-B-1", 0.004, date(2024, 3, 31)),
        ])
        .add_facilities([
            Facility::new("RCF", "OPCO", "GBP", 5_000_000.0, Some(RiskType::MediumRisk)),
            Facility::new("RCF-A", "OPCO", "GBP", 2_000_000.0, Some(RiskType::MediumRisk)),
        ])
        .add_loans([
            Loan::new("L1", "OPCO", "GBP", 1_500_000.0).with_interest(10_000.0),
            Loan::new("L2", "OPCO", "USD", 1_000_000.0),
            Loan::new("L3", "GROUP", "GBP", 250_000.0),
        ])
        .add_contingent(Contingent::new("LC1", "OPCO", "GBP", 500_000.0, Some(RiskType::MediumLowRisk)))
        .add_facility_mappings([
            FacilityMapping::facility("RCF", "RCF-A"),
            FacilityMapping::loan("RCF-A", "L1"),
            FacilityMapping::loan("RCF", "L2"),
            FacilityMapping::contingent("RCF-A", "LC1"),
        ])
        .add_lending_mapping(LendingMapping::new("GROUP", "OPCO"))
        .with_fx_rates(vec![FxRate::new("USD", "GBP", 0.8)])
        .with_collateral(Relation::new(vec![CollateralItem::new(
            "COL1",
            BeneficiaryLevel::Facility,
            "RCF",
            CollateralType::Cash,
            100_000.0,
        )
        .with_currency("USD")]))
        .build()
        .unwrap()
}

fn resolve(config: CalculationConfig) -> ResolvedHierarchy {
    init_tracing();
    HierarchyResolver::new(config).resolve(book())
}

#[test]
fn test_unified_rows_and_facility_keys() {
    let resolved = resolve(CalculationConfig::default());
    assert_eq!(resolved.exposures.len(), 5);

    let undrawn = resolved
        .exposures
        .iter()
        .find(|e| e.exposure_type == ExposureType::FacilityUndrawn)
        .unwrap();
    assert_eq!(undrawn.reference.as_str(), "RCF_UNDRAWN");
    // 5m − (1.5m + 1.0m + 0.5m), counted at the root; no FX applied by default.
    assert_relative_eq!(undrawn.nominal_amount, 2_000_000.0);

    let l1 = resolved.exposures.iter().find(|e| e.reference.as_str() == "L1").unwrap();
    assert_eq!(l1.parent_facility, Some(FacilityId::new("RCF-A")));
    assert_eq!(l1.root_facility, Some(FacilityId::new("RCF")));
    assert_eq!(l1.facility_hierarchy_depth, 2);

    assert!(resolved.issues.is_empty(), "{:?}", resolved.issues);
}

#[test]
fn test_rating_inherited_through_lookup() {
    let resolved = resolve(CalculationConfig::default());
    let opco = resolved
        .counterparty_lookup
        .get(&CounterpartyId::new("OPCO"))
        .unwrap();
    assert_eq!(opco.ultimate_parent, CounterpartyId::new("GROUP"));
    assert_eq!(opco.rating.reason, InheritanceReason::ParentRating);
    assert_eq!(opco.cqs(), Some(2));
    assert_eq!(opco.exposure_class, Some(ExposureClass::Corporate));

    let bank = resolved
        .counterparty_lookup
        .get(&CounterpartyId::new("BANK1"))
        .unwrap();
    assert!(bank.rating.is_internal());
    assert_eq!(bank.pd(), Some(0.004));

    let l1 = resolved.exposures.iter().find(|e| e.reference.as_str() == "L1").unwrap();
    assert_eq!(l1.cqs, Some(2));
}

#[test]
fn test_fx_conversion_applies_to_exposures_and_collateral() {
    let config = CalculationConfig::crr(date(2024, 12, 31)).with_fx_conversion();
    let resolved = resolve(config);

    let l2 = resolved.exposures.iter().find(|e| e.reference.as_str() == "L2").unwrap();
    assert_relative_eq!(l2.drawn_amount, 800_000.0);
    assert_eq!(l2.currency, "GBP");
    assert_eq!(l2.original_currency.as_deref(), Some("USD"));
    assert_eq!(l2.fx_rate_applied, Some(0.8));

    let collateral = resolved.collateral.as_ref().unwrap();
    assert_relative_eq!(collateral.rows()[0].market_value.unwrap(), 80_000.0);
}

#[test]
fn test_lending_group_totals() {
    let resolved = resolve(CalculationConfig::default());
    // Σ max(0, drawn) + nominal over GROUP and OPCO rows, including headroom.
    let expected = 1_500_000.0 + 1_000_000.0 + 250_000.0 + 500_000.0 + 2_000_000.0;
    for row in &resolved.exposures {
        assert_eq!(row.lending_group, Some(CounterpartyId::new("GROUP")));
        assert_relative_eq!(row.lending_group_total_exposure, expected);
    }
}
