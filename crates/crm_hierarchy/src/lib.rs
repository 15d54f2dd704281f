//! # CRM Hierarchy
//!
//! Resolves counterparty ownership and facility sub-structures, inherits
//! ratings from ultimate parents, and merges loans, contingents and
//! undrawn facility headroom into one exposure relation.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────────┐   ┌──────────────────┐
//! │ OrgMapping   │──▶│ HierarchyGraph    │──▶│ rating           │
//! │ edges        │   │ (arena, visited)  │   │ inheritance      │
//! └──────────────┘   └───────────────────┘   └──────────────────┘
//!                                                     │
//! ┌──────────────┐   ┌───────────────────┐            ▼
//! │ Facility     │──▶│ HierarchyGraph    │──▶┌──────────────────┐
//! │ mappings     │   │ (root facility)   │   │ unify_exposures  │
//! └──────────────┘   └───────────────────┘   └──────────────────┘
//!                                                     │
//!              FX conversion, property coverage, lending groups
//!                                                     ▼
//!                                            ResolvedHierarchy
//! ```
//!
//! ## Example
//!
//! ```
//! use crm_core::CalculationConfig;
//! use crm_hierarchy::{
//!     Counterparty, Facility, FacilityMapping, HierarchyResolver, Loan, RawDataBuilder,
//! };
//! use crm_core::RiskType;
//!
//! let data = RawDataBuilder::new()
//!     .add_counterparty(Counterparty::new("CP1", "corporate"))
//!     .add_facility(Facility::new("FAC1", "CP1", "GBP", 1_000_000.0, Some(RiskType::MediumRisk)))
//!     .add_loan(Loan::new("L1", "CP1", "GBP", 600_000.0))
//!     .add_facility_mapping(FacilityMapping::loan("FAC1", "L1"))
//!     .build()
//!     .unwrap();
//!
//! let resolved = HierarchyResolver::new(CalculationConfig::default()).resolve(data);
//! assert_eq!(resolved.exposures.len(), 2);
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod builder;
pub mod fx;
pub mod graph;
pub mod lending;
pub mod lookup;
pub mod property;
pub mod rating;
pub mod records;
pub mod resolver;
pub mod unify;

pub use builder::{RawData, RawDataBuilder};
pub use fx::FxTable;
pub use graph::{ConflictingEdge, HierarchyGraph, HierarchyLookup, ResolvedNode};
pub use lending::LendingGroupTotals;
pub use lookup::{CounterpartyLookup, CounterpartyProfile};
pub use rating::{EffectiveRating, InheritanceReason};
pub use records::{
    CollateralItem, Contingent, Counterparty, Facility, FacilityMapping, FxRate, GuaranteeItem,
    LendingMapping, Loan, MappingChildType, OrgMapping, ProvisionItem, Rating,
};
pub use resolver::{HierarchyResolver, ResolvedHierarchy};
pub use unify::UnifiedExposure;
