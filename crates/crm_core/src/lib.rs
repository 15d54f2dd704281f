//! # CRM Core
//!
//! Shared foundation for hierarchy resolution and credit-risk-mitigation
//! processing of bank credit portfolios.
//!
//! This crate provides:
//! - Strongly-typed identifiers for counterparties, facilities and exposures
//! - Domain enumerations (approach, exposure class, collateral type, ...)
//! - [`FrameworkParams`]: CRR / Basel 3.1 constants resolved once per run
//! - [`CalculationConfig`]: TOML configuration with env overrides and validation
//! - Error taxonomy: fatal errors and accumulated [`CrmIssue`]s
//! - [`Relation`]: row sets with a declared column schema
//! - Normal distribution functions and Rayon helpers
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              crm_engine                 │
//! │  provisions → CCF → collateral →        │
//! │  guarantees, orchestrated per run       │
//! └─────────────────────────────────────────┘
//!          ↓
//! ┌─────────────────────────────────────────┐
//! │             crm_hierarchy               │
//! │  ownership/facility graphs, ratings,    │
//! │  exposure unification                   │
//! └─────────────────────────────────────────┘
//!          ↓
//! ┌─────────────────────────────────────────┐
//! │               crm_core                  │
//! │  ids, types, framework, config, errors  │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use crm_core::{CalculationConfig, IrbPermissions, Framework};
//! use chrono::NaiveDate;
//!
//! let date = NaiveDate::from_ymd_opt(2027, 6, 30).unwrap();
//! let config = CalculationConfig::basel_3_1(date)
//!     .with_irb_permissions(IrbPermissions::firb_only());
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.params().framework, Framework::Basel31);
//! assert_eq!(config.params().lgd_senior_unsecured, 0.40);
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod config;
pub mod error;
pub mod framework;
pub mod ids;
pub mod math;
pub mod parallel;
pub mod relation;
pub mod types;

pub use config::{CalculationConfig, ConfigError, IrbPermissions};
pub use error::{CrmError, CrmIssue, ErrorCategory, InputError};
pub use framework::{FrameworkParams, MaturityBands, FX_HAIRCUT, MIN_NON_FINANCIAL_COVERAGE};
pub use ids::{CollateralId, CounterpartyId, ExposureId, FacilityId, GuaranteeId, ProvisionId};
pub use parallel::ParallelConfig;
pub use relation::{Columnar, Relation};
pub use types::{
    Approach, BeneficiaryLevel, CollateralCategory, CollateralType, ExposureClass, ExposureType,
    Framework, PropertyType, RatingType, RiskType, Seniority, UnknownVariant,
};
