//! # CRM Engine
//!
//! Applies credit-risk mitigation to classified exposures: provisions,
//! credit conversion factors, collateral and guarantees, in that order.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌───────────────────┐   ┌──────────┐   ┌─────────────────┐
//! │ CrmInputs │──▶│ ProvisionWaterfall│──▶│ CcfStage │──▶│ InitializeEad   │
//! └───────────┘   └───────────────────┘   └──────────┘   └─────────────────┘
//!                                                                 │
//!                  ┌──────────────────────┐   ┌─────────────────────▼─────┐
//!                  │ GuaranteeSubstitution│◀──│ CollateralAllocator       │
//!                  │ (irb, substitution)  │   │ (haircuts, LGD blending)  │
//!                  └──────────────────────┘   └───────────────────────────┘
//!                             │
//!                             ▼
//!                   FinalizeEad → CrmAdjustedBundle
//! ```
//!
//! Each stage implements [`ExposureTransform`]; [`CrmOrchestrator`] owns the
//! ordering and the state machine.
//!
//! ## Example
//!
//! ```
//! use chrono::NaiveDate;
//! use crm_core::{Approach, BeneficiaryLevel, CalculationConfig, CollateralType, ExposureClass, Relation};
//! use crm_engine::{CrmExposure, CrmInputs, CrmOrchestrator};
//! use crm_hierarchy::CollateralItem;
//!
//! let date = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
//! let orchestrator = CrmOrchestrator::new(CalculationConfig::crr(date)).unwrap();
//!
//! let loan = CrmExposure::new("L1", "CP1", ExposureClass::Corporate, Approach::Standardised)
//!     .with_drawn(1_000_000.0)
//!     .with_currency("GBP");
//! let cash = CollateralItem::new("C1", BeneficiaryLevel::Direct, "L1", CollateralType::Cash, 500_000.0);
//!
//! let bundle = orchestrator
//!     .run(CrmInputs::new(vec![loan]).with_collateral(Relation::new(vec![cash])))
//!     .unwrap();
//! assert_eq!(bundle.exposures[0].ead_final, 500_000.0);
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

mod allocation;
pub mod audit;
pub mod ccf;
pub mod collateral;
pub mod ead;
pub mod exposure;
pub mod guarantees;
pub mod haircuts;
pub mod inputs;
pub mod irb;
pub mod orchestrator;
pub mod provisions;
pub mod stage;
pub mod substitution;

pub use audit::CrmAuditRecord;
pub use ccf::CcfStage;
pub use collateral::{CollateralAllocation, CollateralAllocator};
pub use ead::{FinalizeEad, InitializeEad};
pub use exposure::{
    CollateralOutcome, CrmExposure, GuaranteeOutcome, GuaranteeStatus, GuarantorApproach,
    ProvisionSplit,
};
pub use guarantees::GuaranteeSubstitution;
pub use haircuts::{HaircutCalculator, HaircutResult};
pub use inputs::CrmInputs;
pub use orchestrator::{CrmAdjustedBundle, CrmOrchestrator, CrmRun, CrmState};
pub use provisions::ProvisionWaterfall;
pub use stage::{ExposureTransform, StageContext};
