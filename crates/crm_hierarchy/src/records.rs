//! Raw input records.
//!
//! These mirror the rows a loader produces for a single calculation run.
//! Required fields are taken by `new`; optional attributes are set with
//! `with_*` builders.

use chrono::NaiveDate;
use crm_core::{
    BeneficiaryLevel, CollateralId, CollateralType, Columnar, CounterpartyId, ExposureId,
    FacilityId, GuaranteeId, PropertyType, ProvisionId, RatingType, RiskType, Seniority,
};

/// A counterparty and its entity type.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Counterparty {
    /// Counterparty reference.
    pub reference: CounterpartyId,
    /// Entity type, e.g. `"corporate"`, `"sovereign"`, `"bank"`.
    pub entity_type: String,
}

impl Counterparty {
    /// Creates a counterparty.
    pub fn new(reference: impl Into<CounterpartyId>, entity_type: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            entity_type: entity_type.into(),
        }
    }
}

/// Ownership edge between two counterparties.
///
/// Either side may be missing in source data; such edges are dropped.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OrgMapping {
    /// Owning counterparty.
    pub parent: Option<CounterpartyId>,
    /// Owned counterparty.
    pub child: Option<CounterpartyId>,
}

impl OrgMapping {
    /// Creates a complete ownership edge.
    pub fn new(parent: impl Into<CounterpartyId>, child: impl Into<CounterpartyId>) -> Self {
        Self {
            parent: Some(parent.into()),
            child: Some(child.into()),
        }
    }
}

/// A credit rating record.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rating {
    /// Rated counterparty.
    pub counterparty: CounterpartyId,
    /// Record identifier, used to break ties between same-day ratings.
    pub rating_reference: String,
    /// Internal or external.
    pub rating_type: RatingType,
    /// Agency or internal model name.
    pub agency: Option<String>,
    /// Rating grade as published, e.g. `"AA-"`.
    pub rating_value: Option<String>,
    /// Credit-quality step (1..=6).
    pub cqs: Option<u8>,
    /// Probability of default for internal ratings.
    pub pd: Option<f64>,
    /// Rating date.
    pub rating_date: NaiveDate,
}

impl Rating {
    /// An external rating with a credit-quality step.
    pub fn external(
        counterparty: impl Into<CounterpartyId>,
        rating_reference: impl Into<String>,
        cqs: u8,
        rating_date: NaiveDate,
    ) -> Self {
        Self {
            counterparty: counterparty.into(),
            rating_reference: rating_reference.into(),
            rating_type: RatingType::External,
            agency: None,
            rating_value: None,
            cqs: Some(cqs),
            pd: None,
            rating_date,
        }
    }

    /// An internal rating with a probability of default.
    pub fn internal(
        counterparty: impl Into<CounterpartyId>,
        rating_reference: impl Into<String>,
        pd: f64,
        rating_date: NaiveDate,
    ) -> Self {
        Self {
            counterparty: counterparty.into(),
            rating_reference: rating_reference.into(),
            rating_type: RatingType::Internal,
            agency: None,
            rating_value: None,
            cqs: None,
            pd: Some(pd),
            rating_date,
        }
    }

    /// Sets the agency.
    pub fn with_agency(mut self, agency: impl Into<String>) -> Self {
        self.agency = Some(agency.into());
        self
    }

    /// Sets the published grade.
    pub fn with_rating_value(mut self, value: impl Into<String>) -> Self {
        self.rating_value = Some(value.into());
        self
    }

    /// Sets the credit-quality step.
    pub fn with_cqs(mut self, cqs: u8) -> Self {
        self.cqs = Some(cqs);
        self
    }

    /// Returns `true` when the record carries any usable rating field.
    pub fn is_populated(&self) -> bool {
        self.cqs.is_some() || self.rating_value.is_some() || self.pd.is_some()
    }
}

/// A drawn loan balance.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Loan {
    /// Loan reference.
    pub reference: ExposureId,
    /// Borrower.
    pub counterparty: CounterpartyId,
    /// Currency of the balance.
    pub currency: String,
    /// Drawn balance. Negative values (credit balances) are allowed.
    pub drawn_amount: f64,
    /// Accrued interest.
    pub interest: f64,
    /// Contractual maturity.
    pub maturity_date: Option<NaiveDate>,
    /// Own LGD estimate.
    pub lgd: Option<f64>,
    /// Claim seniority.
    pub seniority: Seniority,
}

impl Loan {
    /// Creates a senior loan with no interest accrued.
    pub fn new(
        reference: impl Into<ExposureId>,
        counterparty: impl Into<CounterpartyId>,
        currency: impl Into<String>,
        drawn_amount: f64,
    ) -> Self {
        Self {
            reference: reference.into(),
            counterparty: counterparty.into(),
            currency: currency.into(),
            drawn_amount,
            interest: 0.0,
            maturity_date: None,
            lgd: None,
            seniority: Seniority::Senior,
        }
    }

    /// Sets accrued interest.
    pub fn with_interest(mut self, interest: f64) -> Self {
        self.interest = interest;
        self
    }

    /// Sets the maturity date.
    pub fn with_maturity_date(mut self, date: NaiveDate) -> Self {
        self.maturity_date = Some(date);
        self
    }

    /// Sets the own LGD estimate.
    pub fn with_lgd(mut self, lgd: f64) -> Self {
        self.lgd = Some(lgd);
        self
    }

    /// Sets the seniority.
    pub fn with_seniority(mut self, seniority: Seniority) -> Self {
        self.seniority = seniority;
        self
    }
}

/// An off-balance-sheet contingent item.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Contingent {
    /// Contingent reference.
    pub reference: ExposureId,
    /// Obligor.
    pub counterparty: CounterpartyId,
    /// Currency.
    pub currency: String,
    /// Committed nominal.
    pub nominal_amount: f64,
    /// Flagged as already on balance sheet.
    pub on_balance_sheet: bool,
    /// CCF risk category.
    pub risk_type: Option<RiskType>,
    /// Own CCF estimate.
    pub ccf_modelled: Option<f64>,
    /// Short-term self-liquidating trade letter of credit.
    pub is_short_term_trade_lc: bool,
    /// Contractual maturity.
    pub maturity_date: Option<NaiveDate>,
    /// Own LGD estimate.
    pub lgd: Option<f64>,
    /// Claim seniority.
    pub seniority: Seniority,
}

impl Contingent {
    /// Creates an off-balance-sheet contingent.
    pub fn new(
        reference: impl Into<ExposureId>,
        counterparty: impl Into<CounterpartyId>,
        currency: impl Into<String>,
        nominal_amount: f64,
        risk_type: Option<RiskType>,
    ) -> Self {
        Self {
            reference: reference.into(),
            counterparty: counterparty.into(),
            currency: currency.into(),
            nominal_amount,
            on_balance_sheet: false,
            risk_type,
            ccf_modelled: None,
            is_short_term_trade_lc: false,
            maturity_date: None,
            lgd: None,
            seniority: Seniority::Senior,
        }
    }

    /// Marks the item as on balance sheet.
    pub fn on_balance_sheet(mut self) -> Self {
        self.on_balance_sheet = true;
        self
    }

    /// Sets the own CCF estimate.
    pub fn with_ccf_modelled(mut self, ccf: f64) -> Self {
        self.ccf_modelled = Some(ccf);
        self
    }

    /// Flags a short-term trade letter of credit.
    pub fn short_term_trade_lc(mut self) -> Self {
        self.is_short_term_trade_lc = true;
        self
    }

    /// Sets the maturity date.
    pub fn with_maturity_date(mut self, date: NaiveDate) -> Self {
        self.maturity_date = Some(date);
        self
    }

    /// Sets the own LGD estimate.
    pub fn with_lgd(mut self, lgd: f64) -> Self {
        self.lgd = Some(lgd);
        self
    }
}

/// A committed facility limit.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Facility {
    /// Facility reference.
    pub reference: FacilityId,
    /// Borrower.
    pub counterparty: CounterpartyId,
    /// Currency of the limit.
    pub currency: String,
    /// Committed limit.
    pub limit: f64,
    /// Contractual maturity.
    pub maturity_date: Option<NaiveDate>,
    /// Own LGD estimate.
    pub lgd: Option<f64>,
    /// Claim seniority.
    pub seniority: Seniority,
    /// CCF risk category of the undrawn headroom.
    pub risk_type: Option<RiskType>,
    /// Own CCF estimate.
    pub ccf_modelled: Option<f64>,
    /// Short-term self-liquidating trade letter of credit.
    pub is_short_term_trade_lc: bool,
}

impl Facility {
    /// Creates a facility.
    pub fn new(
        reference: impl Into<FacilityId>,
        counterparty: impl Into<CounterpartyId>,
        currency: impl Into<String>,
        limit: f64,
        risk_type: Option<RiskType>,
    ) -> Self {
        Self {
            reference: reference.into(),
            counterparty: counterparty.into(),
            currency: currency.into(),
            limit,
            maturity_date: None,
            lgd: None,
            seniority: Seniority::Senior,
            risk_type,
            ccf_modelled: None,
            is_short_term_trade_lc: false,
        }
    }

    /// Sets the own CCF estimate.
    pub fn with_ccf_modelled(mut self, ccf: f64) -> Self {
        self.ccf_modelled = Some(ccf);
        self
    }

    /// Sets the maturity date.
    pub fn with_maturity_date(mut self, date: NaiveDate) -> Self {
        self.maturity_date = Some(date);
        self
    }

    /// Sets the own LGD estimate.
    pub fn with_lgd(mut self, lgd: f64) -> Self {
        self.lgd = Some(lgd);
        self
    }
}

/// Kind of node on the child side of a facility mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MappingChildType {
    /// A loan drawn under the facility.
    Loan,
    /// A contingent issued under the facility.
    Contingent,
    /// A sub-facility.
    Facility,
}

/// Edge from a facility to a loan, contingent or sub-facility.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FacilityMapping {
    /// Parent facility.
    pub parent: Option<FacilityId>,
    /// Child reference (loan, contingent or facility).
    pub child_reference: Option<String>,
    /// Child kind.
    pub child_type: MappingChildType,
}

impl FacilityMapping {
    /// Maps a loan under a facility.
    pub fn loan(parent: impl Into<FacilityId>, child: impl Into<String>) -> Self {
        Self::new(parent, child, MappingChildType::Loan)
    }

    /// Maps a contingent under a facility.
    pub fn contingent(parent: impl Into<FacilityId>, child: impl Into<String>) -> Self {
        Self::new(parent, child, MappingChildType::Contingent)
    }

    /// Maps a sub-facility under a facility.
    pub fn facility(parent: impl Into<FacilityId>, child: impl Into<String>) -> Self {
        Self::new(parent, child, MappingChildType::Facility)
    }

    fn new(
        parent: impl Into<FacilityId>,
        child: impl Into<String>,
        child_type: MappingChildType,
    ) -> Self {
        Self {
            parent: Some(parent.into()),
            child_reference: Some(child.into()),
            child_type,
        }
    }
}

/// Lending-group membership edge.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LendingMapping {
    /// Group parent; also a member of its own group.
    pub parent: CounterpartyId,
    /// Group member.
    pub child: CounterpartyId,
}

impl LendingMapping {
    /// Creates a lending-group edge.
    pub fn new(parent: impl Into<CounterpartyId>, child: impl Into<CounterpartyId>) -> Self {
        Self {
            parent: parent.into(),
            child: child.into(),
        }
    }
}

/// Spot FX rate: one unit of `from` is worth `rate` units of `to`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FxRate {
    /// Source currency.
    pub from: String,
    /// Target currency.
    pub to: String,
    /// Conversion rate.
    pub rate: f64,
}

impl FxRate {
    /// Creates an FX rate.
    pub fn new(from: impl Into<String>, to: impl Into<String>, rate: f64) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            rate,
        }
    }
}

/// A pledged collateral item.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CollateralItem {
    /// Collateral reference.
    pub reference: CollateralId,
    /// Level the item is pledged at.
    pub beneficiary_level: BeneficiaryLevel,
    /// Exposure, facility or counterparty reference, depending on level.
    pub beneficiary_reference: String,
    /// Collateral type.
    pub collateral_type: CollateralType,
    /// Market value.
    pub market_value: Option<f64>,
    /// Pledge as a fraction of the beneficiary's EAD, used when no market value is given.
    pub pledge_percentage: Option<f64>,
    /// Currency of the collateral.
    pub currency: Option<String>,
    /// Residual maturity in years.
    pub residual_maturity_years: Option<f64>,
    /// Issuer credit-quality step for debt securities.
    pub issuer_cqs: Option<u8>,
    /// Equity listed on a main index.
    pub is_main_index: bool,
    /// Explicit eligibility for standardised EAD reduction.
    pub is_eligible_financial_collateral: Option<bool>,
    /// Residential or commercial use, for real estate.
    pub property_type: Option<PropertyType>,
    /// Loan-to-value of the secured lending, for real estate.
    pub property_ltv: Option<f64>,
}

impl CollateralItem {
    /// Creates a collateral item with a market value.
    pub fn new(
        reference: impl Into<CollateralId>,
        beneficiary_level: BeneficiaryLevel,
        beneficiary_reference: impl Into<String>,
        collateral_type: CollateralType,
        market_value: f64,
    ) -> Self {
        Self {
            reference: reference.into(),
            beneficiary_level,
            beneficiary_reference: beneficiary_reference.into(),
            collateral_type,
            market_value: Some(market_value),
            pledge_percentage: None,
            currency: None,
            residual_maturity_years: None,
            issuer_cqs: None,
            is_main_index: false,
            is_eligible_financial_collateral: None,
            property_type: None,
            property_ltv: None,
        }
    }

    /// Creates an item pledged as a percentage of its beneficiary's EAD.
    pub fn pledged_percentage(
        reference: impl Into<CollateralId>,
        beneficiary_level: BeneficiaryLevel,
        beneficiary_reference: impl Into<String>,
        collateral_type: CollateralType,
        pledge_percentage: f64,
    ) -> Self {
        Self {
            market_value: None,
            pledge_percentage: Some(pledge_percentage),
            ..Self::new(
                reference,
                beneficiary_level,
                beneficiary_reference,
                collateral_type,
                0.0,
            )
        }
    }

    /// Sets the currency.
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    /// Sets the residual maturity in years.
    pub fn with_residual_maturity(mut self, years: f64) -> Self {
        self.residual_maturity_years = Some(years);
        self
    }

    /// Sets the issuer credit-quality step.
    pub fn with_issuer_cqs(mut self, cqs: u8) -> Self {
        self.issuer_cqs = Some(cqs);
        self
    }

    /// Marks equity as main-index listed.
    pub fn main_index(mut self) -> Self {
        self.is_main_index = true;
        self
    }

    /// Sets explicit eligibility for standardised EAD reduction.
    pub fn with_eligibility(mut self, eligible: bool) -> Self {
        self.is_eligible_financial_collateral = Some(eligible);
        self
    }

    /// Sets the property use and, when known, the loan-to-value.
    pub fn with_property(mut self, property_type: PropertyType, ltv: Option<f64>) -> Self {
        self.property_type = Some(property_type);
        self.property_ltv = ltv;
        self
    }

    /// Returns `true` for real estate in residential use.
    #[inline]
    pub fn is_residential_property(&self) -> bool {
        self.collateral_type.is_real_estate() && self.property_type == Some(PropertyType::Residential)
    }
}

impl Columnar for CollateralItem {
    const COLUMNS: &'static [&'static str] = &[
        "collateral_reference",
        "beneficiary_type",
        "beneficiary_reference",
        "collateral_type",
        "market_value",
        "pledge_percentage",
        "currency",
        "residual_maturity_years",
        "issuer_cqs",
        "is_main_index",
        "is_eligible_financial_collateral",
        "property_type",
        "property_ltv",
    ];
}

/// A guarantee or credit-protection agreement.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GuaranteeItem {
    /// Guarantee reference.
    pub reference: GuaranteeId,
    /// Level the guarantee is given at.
    pub beneficiary_level: BeneficiaryLevel,
    /// Exposure, facility or counterparty reference, depending on level.
    pub beneficiary_reference: String,
    /// Protection provider.
    pub guarantor: CounterpartyId,
    /// Covered amount.
    pub amount_covered: Option<f64>,
    /// Covered fraction of EAD, used when no amount is given.
    pub percentage_covered: Option<f64>,
    /// Currency of the covered amount.
    pub currency: Option<String>,
}

impl GuaranteeItem {
    /// A guarantee for a fixed amount.
    pub fn amount(
        reference: impl Into<GuaranteeId>,
        beneficiary_level: BeneficiaryLevel,
        beneficiary_reference: impl Into<String>,
        guarantor: impl Into<CounterpartyId>,
        amount_covered: f64,
    ) -> Self {
        Self {
            reference: reference.into(),
            beneficiary_level,
            beneficiary_reference: beneficiary_reference.into(),
            guarantor: guarantor.into(),
            amount_covered: Some(amount_covered),
            percentage_covered: None,
            currency: None,
        }
    }

    /// A guarantee for a fraction of EAD.
    pub fn percentage(
        reference: impl Into<GuaranteeId>,
        beneficiary_level: BeneficiaryLevel,
        beneficiary_reference: impl Into<String>,
        guarantor: impl Into<CounterpartyId>,
        percentage_covered: f64,
    ) -> Self {
        Self {
            amount_covered: None,
            percentage_covered: Some(percentage_covered),
            ..Self::amount(reference, beneficiary_level, beneficiary_reference, guarantor, 0.0)
        }
    }

    /// Sets the currency.
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }
}

impl Columnar for GuaranteeItem {
    const COLUMNS: &'static [&'static str] = &[
        "guarantee_reference",
        "beneficiary_type",
        "beneficiary_reference",
        "guarantor",
        "amount_covered",
        "percentage_covered",
        "currency",
    ];
}

/// A specific credit-risk adjustment (provision).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProvisionItem {
    /// Provision reference.
    pub reference: ProvisionId,
    /// Level the provision is booked at.
    pub beneficiary_level: BeneficiaryLevel,
    /// Exposure, facility or counterparty reference, depending on level.
    pub beneficiary_reference: String,
    /// Provision amount.
    pub amount: f64,
    /// Currency of the amount.
    pub currency: Option<String>,
}

impl ProvisionItem {
    /// Creates a provision.
    pub fn new(
        reference: impl Into<ProvisionId>,
        beneficiary_level: BeneficiaryLevel,
        beneficiary_reference: impl Into<String>,
        amount: f64,
    ) -> Self {
        Self {
            reference: reference.into(),
            beneficiary_level,
            beneficiary_reference: beneficiary_reference.into(),
            amount,
            currency: None,
        }
    }

    /// Sets the currency.
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }
}

impl Columnar for ProvisionItem {
    const COLUMNS: &'static [&'static str] = &[
        "provision_reference",
        "beneficiary_type",
        "beneficiary_reference",
        "amount",
        "currency",
    ];
}

#[cfg(test)]
mod tests {
    use super::*;
    use crm_core::Relation;

    #[test]
    fn test_rating_population() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(Rating::external("CP1", "R1", 2, date).is_populated());
        assert!(Rating::internal("CP1", "R2", 0.01, date).is_populated());

        let mut empty = Rating::external("CP1", "R3", 2, date);
        empty.cqs = None;
        assert!(!empty.is_populated());
    }

    #[test]
    fn test_pledged_percentage_has_no_market_value() {
        let item = CollateralItem::pledged_percentage(
            "C1",
            BeneficiaryLevel::Facility,
            "FAC1",
            CollateralType::Cash,
            0.5,
        );
        assert_eq!(item.market_value, None);
        assert_eq!(item.pledge_percentage, Some(0.5));
    }

    #[test]
    fn test_relation_schema_for_crm_items() {
        let rel = Relation::new(vec![GuaranteeItem::percentage(
            "G1",
            BeneficiaryLevel::Direct,
            "L1",
            "GUAR1",
            0.6,
        )]);
        assert!(rel
            .missing_columns(&["beneficiary_reference", "amount_covered", "guarantor"])
            .is_empty());
    }

    #[test]
    fn test_facility_mapping_constructors() {
        let m = FacilityMapping::facility("FAC1", "FAC1A");
        assert_eq!(m.child_type, MappingChildType::Facility);
        assert_eq!(m.parent, Some(FacilityId::new("FAC1")));
        assert_eq!(m.child_reference.as_deref(), Some("FAC1A"));
    }
}
