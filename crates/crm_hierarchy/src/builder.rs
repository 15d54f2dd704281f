//! Builder for assembling validated raw input data.

use crate::records::{
    CollateralItem, Contingent, Counterparty, Facility, FacilityMapping, FxRate, GuaranteeItem,
    LendingMapping, Loan, OrgMapping, ProvisionItem, Rating,
};
use crm_core::{InputError, Relation};
use std::collections::HashSet;

/// Raw input snapshot for one calculation run.
///
/// Collateral, guarantees, provisions and FX rates are optional; `None`
/// means the source did not supply the relation at all.
#[derive(Debug, Clone, Default)]
pub struct RawData {
    /// Counterparties.
    pub counterparties: Vec<Counterparty>,
    /// Ownership edges.
    pub org_mappings: Vec<OrgMapping>,
    /// Rating records.
    pub ratings: Vec<Rating>,
    /// Drawn loans.
    pub loans: Vec<Loan>,
    /// Contingent items.
    pub contingents: Vec<Contingent>,
    /// Facilities.
    pub facilities: Vec<Facility>,
    /// Facility to loan/contingent/sub-facility edges.
    pub facility_mappings: Vec<FacilityMapping>,
    /// Lending-group edges.
    pub lending_mappings: Vec<LendingMapping>,
    /// FX rates into the base currency.
    pub fx_rates: Option<Vec<FxRate>>,
    /// Collateral.
    pub collateral: Option<Relation<CollateralItem>>,
    /// Guarantees.
    pub guarantees: Option<Relation<GuaranteeItem>>,
    /// Provisions.
    pub provisions: Option<Relation<ProvisionItem>>,
}

/// Builder for [`RawData`].
///
/// # Examples
///
/// ```
/// use crm_hierarchy::{RawDataBuilder, Counterparty, Loan};
///
/// let data = RawDataBuilder::new()
///     .add_counterparty(Counterparty::new("CP1", "corporate"))
///     .add_loan(Loan::new("L1", "CP1", "GBP", 1_000.0))
///     .build()
///     .unwrap();
///
/// assert_eq!(data.loans.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct RawDataBuilder {
    data: RawData,
}

impl RawDataBuilder {
    /// Creates an empty builder.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a counterparty.
    pub fn add_counterparty(mut self, counterparty: Counterparty) -> Self {
        self.data.counterparties.push(counterparty);
        self
    }

    /// Adds multiple counterparties.
    pub fn add_counterparties(mut self, items: impl IntoIterator<Item = Counterparty>) -> Self {
        self.data.counterparties.extend(items);
        self
    }

    /// Adds an ownership edge.
    pub fn add_org_mapping(mut self, mapping: OrgMapping) -> Self {
        self.data.org_mappings.push(mapping);
        self
    }

    /// Adds multiple ownership edges.
    pub fn add_org_mappings(mut self, items: impl IntoIterator<Item = OrgMapping>) -> Self {
        self.data.org_mappings.extend(items);
        self
    }

    /// Adds a rating.
    pub fn add_rating(mut self, rating: Rating) -> Self {
        self.data.ratings.push(rating);
        self
    }

    /// Adds multiple ratings.
    pub fn add_ratings(mut self, items: impl IntoIterator<Item = Rating>) -> Self {
        self.data.ratings.extend(items);
        self
    }

    /// Adds a loan.
    pub fn add_loan(mut self, loan: Loan) -> Self {
        self.data.loans.push(loan);
        self
    }

    /// Adds multiple loans.
    pub fn add_loans(mut self, items: impl IntoIterator<Item = Loan>) -> Self {
        self.data.loans.extend(items);
        self
    }

    /// Adds a contingent.
    pub fn add_contingent(mut self, contingent: Contingent) -> Self {
        self.data.contingents.push(contingent);
        self
    }

    /// Adds multiple contingents.
    pub fn add_contingents(mut self, items: impl IntoIterator<Item = Contingent>) -> Self {
        self.data.contingents.extend(items);
        self
    }

    /// Adds a facility.
    pub fn add_facility(mut self, facility: Facility) -> Self {
        self.data.facilities.push(facility);
        self
    }

    /// Adds multiple facilities.
    pub fn add_facilities(mut self, items: impl IntoIterator<Item = Facility>) -> Self {
        self.data.facilities.extend(items);
        self
    }

    /// Adds a facility mapping.
    pub fn add_facility_mapping(mut self, mapping: FacilityMapping) -> Self {
        self.data.facility_mappings.push(mapping);
        self
    }

    /// Adds multiple facility mappings.
    pub fn add_facility_mappings(mut self, items: impl IntoIterator<Item = FacilityMapping>) -> Self {
        self.data.facility_mappings.extend(items);
        self
    }

    /// Adds a lending-group edge.
    pub fn add_lending_mapping(mut self, mapping: LendingMapping) -> Self {
        self.data.lending_mappings.push(mapping);
        self
    }

    /// Sets the FX rates.
    pub fn with_fx_rates(mut self, rates: Vec<FxRate>) -> Self {
        self.data.fx_rates = Some(rates);
        self
    }

    /// Sets the collateral relation.
    pub fn with_collateral(mut self, collateral: Relation<CollateralItem>) -> Self {
        self.data.collateral = Some(collateral);
        self
    }

    /// Sets the guarantee relation.
    pub fn with_guarantees(mut self, guarantees: Relation<GuaranteeItem>) -> Self {
        self.data.guarantees = Some(guarantees);
        self
    }

    /// Sets the provision relation.
    pub fn with_provisions(mut self, provisions: Relation<ProvisionItem>) -> Self {
        self.data.provisions = Some(provisions);
        self
    }

    /// Validates and returns the raw data.
    ///
    /// # Validation
    ///
    /// - No duplicate counterparty references
    /// - No duplicate facility references
    /// - No duplicate exposure references across loans and contingents
    /// - Drawn, interest, nominal and limit amounts are finite
    /// - Facility limits are non-negative
    ///
    /// Dangling references are not errors here; resolution reports them as
    /// data-quality issues.
    pub fn build(self) -> Result<RawData, InputError> {
        let data = self.data;

        let mut cp_ids = HashSet::new();
        for cp in &data.counterparties {
            if !cp_ids.insert(&cp.reference) {
                return Err(InputError::DuplicateCounterparty(cp.reference.to_string()));
            }
        }

        let mut facility_ids = HashSet::new();
        for f in &data.facilities {
            if !facility_ids.insert(&f.reference) {
                return Err(InputError::DuplicateFacility(f.reference.to_string()));
            }
            check_finite(f.reference.as_str(), "limit", f.limit)?;
            if f.limit < 0.0 {
                return Err(InputError::InvalidValue {
                    reference: f.reference.to_string(),
                    field: "limit",
                    reason: "must be non-negative".to_string(),
                });
            }
        }

        let mut exposure_ids = HashSet::new();
        for loan in &data.loans {
            if !exposure_ids.insert(&loan.reference) {
                return Err(InputError::DuplicateExposure(loan.reference.to_string()));
            }
            check_finite(loan.reference.as_str(), "drawn_amount", loan.drawn_amount)?;
            check_finite(loan.reference.as_str(), "interest", loan.interest)?;
        }
        for c in &data.contingents {
            if !exposure_ids.insert(&c.reference) {
                return Err(InputError::DuplicateExposure(c.reference.to_string()));
            }
            check_finite(c.reference.as_str(), "nominal_amount", c.nominal_amount)?;
        }

        Ok(data)
    }
}

fn check_finite(reference: &str, field: &'static str, value: f64) -> Result<(), InputError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(InputError::InvalidValue {
            reference: reference.to_string(),
            field,
            reason: "must be finite".to_string(),
        })
    }
}
