//! Domain enumerations shared across hierarchy resolution and CRM.
//!
//! String parsing accepts the aliases found in loan-book extracts
//! (`"FR"`, `"full_risk"`, `"gilt"`, `"junior"`, ...) case-insensitively.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind}: '{value}'")]
pub struct UnknownVariant {
    /// Name of the enumeration being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

impl UnknownVariant {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Regulatory capital framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Framework {
    /// Capital Requirements Regulation (older framework).
    #[default]
    #[serde(rename = "crr")]
    Crr,
    /// Basel 3.1 (newer framework).
    #[serde(rename = "basel_3_1", alias = "basel31", alias = "b31")]
    Basel31,
}

impl Framework {
    /// Returns `true` for the Basel 3.1 framework.
    #[inline]
    pub fn is_basel_3_1(self) -> bool {
        matches!(self, Framework::Basel31)
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Framework::Crr => write!(f, "crr"),
            Framework::Basel31 => write!(f, "basel_3_1"),
        }
    }
}

impl FromStr for Framework {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "crr" => Ok(Framework::Crr),
            "basel_3_1" | "basel31" | "b31" => Ok(Framework::Basel31),
            _ => Err(UnknownVariant::new("framework", s)),
        }
    }
}

/// Calculation approach assigned to an exposure by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Approach {
    /// Standardised approach.
    #[serde(rename = "sa")]
    Standardised,
    /// Foundation internal-ratings approach.
    #[serde(rename = "firb")]
    FoundationIrb,
    /// Advanced internal-ratings approach (own LGD and CCF estimates).
    #[serde(rename = "airb")]
    AdvancedIrb,
    /// Supervisory slotting for specialised lending.
    #[serde(rename = "slotting")]
    Slotting,
}

impl Approach {
    /// Returns `true` for foundation or advanced IRB.
    #[inline]
    pub fn is_irb(self) -> bool {
        matches!(self, Approach::FoundationIrb | Approach::AdvancedIrb)
    }
}

impl fmt::Display for Approach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Approach::Standardised => "sa",
            Approach::FoundationIrb => "firb",
            Approach::AdvancedIrb => "airb",
            Approach::Slotting => "slotting",
        };
        write!(f, "{}", s)
    }
}

/// Regulatory exposure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposureClass {
    /// Central governments and central banks.
    CentralGovtCentralBank,
    /// Regional governments and local authorities.
    Rgla,
    /// Public sector entities.
    Pse,
    /// Multilateral development banks and international organisations.
    Mdb,
    /// Institutions (banks, CCPs, investment firms).
    Institution,
    /// Corporates.
    Corporate,
    /// SME corporates.
    CorporateSme,
    /// Retail secured on residential property.
    RetailMortgage,
    /// Qualifying revolving retail.
    RetailQrre,
    /// Other retail.
    RetailOther,
    /// Specialised lending.
    SpecialisedLending,
    /// Equity.
    Equity,
    /// Anything else.
    Other,
}

impl ExposureClass {
    /// Maps a counterparty entity type onto its standardised exposure class.
    ///
    /// Returns `None` for entity types that carry no class mapping.
    pub fn from_entity_type(entity_type: &str) -> Option<Self> {
        let class = match entity_type.trim().to_lowercase().as_str() {
            "sovereign" | "central_bank" => ExposureClass::CentralGovtCentralBank,
            "rgla_sovereign" | "rgla_institution" => ExposureClass::Rgla,
            "pse_sovereign" | "pse_institution" => ExposureClass::Pse,
            "mdb" | "international_org" => ExposureClass::Mdb,
            "institution" | "bank" | "ccp" | "financial_institution" => {
                ExposureClass::Institution
            }
            "corporate" | "company" => ExposureClass::Corporate,
            "individual" | "retail" => ExposureClass::RetailOther,
            "specialised_lending" => ExposureClass::SpecialisedLending,
            "equity" => ExposureClass::Equity,
            _ => return None,
        };
        Some(class)
    }

    /// Returns `true` for the retail classes.
    #[inline]
    pub fn is_retail(self) -> bool {
        matches!(
            self,
            ExposureClass::RetailMortgage | ExposureClass::RetailQrre | ExposureClass::RetailOther
        )
    }
}

impl fmt::Display for ExposureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExposureClass::CentralGovtCentralBank => "central_govt_central_bank",
            ExposureClass::Rgla => "rgla",
            ExposureClass::Pse => "pse",
            ExposureClass::Mdb => "mdb",
            ExposureClass::Institution => "institution",
            ExposureClass::Corporate => "corporate",
            ExposureClass::CorporateSme => "corporate_sme",
            ExposureClass::RetailMortgage => "retail_mortgage",
            ExposureClass::RetailQrre => "retail_qrre",
            ExposureClass::RetailOther => "retail_other",
            ExposureClass::SpecialisedLending => "specialised_lending",
            ExposureClass::Equity => "equity",
            ExposureClass::Other => "other",
        };
        write!(f, "{}", s)
    }
}

/// Off-balance-sheet risk category driving the CCF lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskType {
    /// Full risk (FR).
    FullRisk,
    /// Medium risk (MR).
    MediumRisk,
    /// Medium-low risk (MLR).
    MediumLowRisk,
    /// Low risk (LR), unconditionally cancellable.
    LowRisk,
}

impl FromStr for RiskType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fr" | "full_risk" => Ok(RiskType::FullRisk),
            "mr" | "medium_risk" => Ok(RiskType::MediumRisk),
            "mlr" | "medium_low_risk" => Ok(RiskType::MediumLowRisk),
            "lr" | "low_risk" => Ok(RiskType::LowRisk),
            _ => Err(UnknownVariant::new("risk type", s)),
        }
    }
}

impl fmt::Display for RiskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskType::FullRisk => "FR",
            RiskType::MediumRisk => "MR",
            RiskType::MediumLowRisk => "MLR",
            RiskType::LowRisk => "LR",
        };
        write!(f, "{}", s)
    }
}

/// Kind of pledged collateral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollateralType {
    /// Cash.
    Cash,
    /// Cash on deposit with the lender.
    Deposit,
    /// Gold bullion.
    Gold,
    /// Generic eligible financial collateral.
    FinancialCollateral,
    /// Debt securities issued by sovereigns.
    GovernmentBond,
    /// Debt securities issued by corporates or institutions.
    CorporateBond,
    /// Listed equities.
    Equity,
    /// Trade receivables.
    Receivables,
    /// Residential or commercial real estate.
    RealEstate,
    /// Other physical collateral (equipment, inventory).
    OtherPhysical,
    /// Unrecognised collateral description.
    Unknown,
}

impl CollateralType {
    /// Parses a collateral description, falling back to [`CollateralType::Unknown`].
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or(CollateralType::Unknown)
    }

    /// Returns the LGD category this collateral type belongs to.
    pub fn category(self) -> CollateralCategory {
        match self {
            CollateralType::Cash
            | CollateralType::Deposit
            | CollateralType::Gold
            | CollateralType::FinancialCollateral
            | CollateralType::GovernmentBond
            | CollateralType::CorporateBond
            | CollateralType::Equity => CollateralCategory::Financial,
            CollateralType::Receivables => CollateralCategory::Receivables,
            CollateralType::RealEstate => CollateralCategory::RealEstate,
            CollateralType::OtherPhysical => CollateralCategory::OtherPhysical,
            CollateralType::Unknown => CollateralCategory::Unknown,
        }
    }

    /// Returns `true` for real estate, which never reduces standardised EAD.
    #[inline]
    pub fn is_real_estate(self) -> bool {
        matches!(self, CollateralType::RealEstate)
    }
}

impl FromStr for CollateralType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = match s.trim().to_lowercase().as_str() {
            "cash" => CollateralType::Cash,
            "deposit" => CollateralType::Deposit,
            "gold" => CollateralType::Gold,
            "financial_collateral" => CollateralType::FinancialCollateral,
            "govt_bond" | "sovereign_bond" | "government_bond" | "gilt" => {
                CollateralType::GovernmentBond
            }
            "corp_bond" | "corporate_bond" => CollateralType::CorporateBond,
            "equity" | "shares" | "stock" => CollateralType::Equity,
            "receivables" | "trade_receivables" => CollateralType::Receivables,
            "real_estate" | "property" | "rre" | "cre" | "residential_re" | "commercial_re"
            | "residential" | "commercial" | "residential_property" | "commercial_property" => {
                CollateralType::RealEstate
            }
            "other_physical" | "equipment" | "inventory" | "other" => CollateralType::OtherPhysical,
            _ => return Err(UnknownVariant::new("collateral type", s)),
        };
        Ok(parsed)
    }
}

/// Supervisory LGD category of a collateral type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollateralCategory {
    /// Eligible financial collateral.
    Financial,
    /// Receivables.
    Receivables,
    /// Real estate.
    RealEstate,
    /// Other physical collateral.
    OtherPhysical,
    /// Unrecognised; treated as unsecured.
    Unknown,
}

impl CollateralCategory {
    /// Overcollateralisation ratio dividing the adjusted value before it counts.
    pub fn overcollateralisation_ratio(self) -> f64 {
        match self {
            CollateralCategory::Financial | CollateralCategory::Unknown => 1.0,
            CollateralCategory::Receivables => 1.25,
            CollateralCategory::RealEstate | CollateralCategory::OtherPhysical => 1.40,
        }
    }

    /// Returns `true` for the financial category.
    #[inline]
    pub fn is_financial(self) -> bool {
        matches!(self, CollateralCategory::Financial)
    }
}

/// Level at which a CRM item is pledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BeneficiaryLevel {
    /// Linked to a single exposure.
    #[default]
    Direct,
    /// Linked to a facility and shared by its member exposures.
    Facility,
    /// Linked to a counterparty and shared by all its exposures.
    Counterparty,
}

impl BeneficiaryLevel {
    /// Parses a beneficiary type, treating unrecognised values as direct.
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or(BeneficiaryLevel::Direct)
    }
}

impl FromStr for BeneficiaryLevel {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "direct" | "exposure" | "loan" | "contingent" => Ok(BeneficiaryLevel::Direct),
            "facility" => Ok(BeneficiaryLevel::Facility),
            "counterparty" => Ok(BeneficiaryLevel::Counterparty),
            _ => Err(UnknownVariant::new("beneficiary type", s)),
        }
    }
}

impl fmt::Display for BeneficiaryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BeneficiaryLevel::Direct => "direct",
            BeneficiaryLevel::Facility => "facility",
            BeneficiaryLevel::Counterparty => "counterparty",
        };
        write!(f, "{}", s)
    }
}

/// Claim seniority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Seniority {
    /// Senior claim.
    #[default]
    Senior,
    /// Subordinated or junior claim.
    Subordinated,
}

impl FromStr for Seniority {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "senior" => Ok(Seniority::Senior),
            "subordinated" | "junior" => Ok(Seniority::Subordinated),
            _ => Err(UnknownVariant::new("seniority", s)),
        }
    }
}

/// Use of real estate pledged as collateral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    /// Residential property.
    Residential,
    /// Commercial property.
    Commercial,
}

impl FromStr for PropertyType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "residential" | "rre" | "residential_property" => Ok(PropertyType::Residential),
            "commercial" | "cre" | "commercial_property" => Ok(PropertyType::Commercial),
            _ => Err(UnknownVariant::new("property type", s)),
        }
    }
}

/// Origin of a credit rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingType {
    /// Firm's own internal rating (carries a PD).
    Internal,
    /// External agency rating (carries a CQS).
    External,
}

/// Kind of a unified exposure row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposureType {
    /// Drawn loan balance.
    Loan,
    /// Off-balance-sheet contingent item.
    Contingent,
    /// Synthetic undrawn headroom of a root facility.
    FacilityUndrawn,
}

impl fmt::Display for ExposureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExposureType::Loan => "loan",
            ExposureType::Contingent => "contingent",
            ExposureType::FacilityUndrawn => "facility_undrawn",
        };
        write!(f, "{}", s)
    }
}
