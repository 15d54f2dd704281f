//! Error types for hierarchy resolution and CRM processing.
//!
//! Two kinds of failure exist:
//!
//! - fatal errors ([`CrmError`], [`InputError`], [`ConfigError`]) returned
//!   through `Result` before or instead of producing output;
//! - non-fatal [`CrmIssue`]s accumulated alongside a best-effort result.
//!   A run never aborts because optional data is missing.

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

pub use crate::config::ConfigError;

/// Taxonomy of non-fatal conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Missing or malformed optional input; the affected stage is skipped.
    DataQuality,
    /// A rule declined to apply (e.g. non-beneficial guarantee).
    BusinessRule,
    /// Cycle or truncation during hierarchy traversal.
    Hierarchy,
    /// Configuration problem detected during processing.
    Configuration,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCategory::DataQuality => "data_quality",
            ErrorCategory::BusinessRule => "business_rule",
            ErrorCategory::Hierarchy => "hierarchy",
            ErrorCategory::Configuration => "configuration",
        };
        write!(f, "{}", s)
    }
}

/// A structured, non-fatal issue recorded during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct CrmIssue {
    /// Issue category.
    pub category: ErrorCategory,
    /// Stable machine-readable code, e.g. `"collateral_missing_columns"`.
    pub code: &'static str,
    /// Human-readable description.
    pub message: String,
    /// Entity the issue relates to, if any.
    pub entity_reference: Option<String>,
    /// Additional key/value context.
    pub context: BTreeMap<String, String>,
}

impl CrmIssue {
    /// Creates an issue without entity or context.
    pub fn new(category: ErrorCategory, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            category,
            code,
            message: message.into(),
            entity_reference: None,
            context: BTreeMap::new(),
        }
    }

    /// Creates a data-quality issue.
    pub fn data_quality(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::DataQuality, code, message)
    }

    /// Creates a hierarchy issue.
    pub fn hierarchy(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Hierarchy, code, message)
    }

    /// Creates a business-rule issue.
    pub fn business_rule(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::BusinessRule, code, message)
    }

    /// Attaches the related entity reference.
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity_reference = Some(entity.into());
        self
    }

    /// Adds a context entry.
    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }
}

impl fmt::Display for CrmIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}] {}", self.category, self.code, self.message)?;
        if let Some(entity) = &self.entity_reference {
            write!(f, " (entity={})", entity)?;
        }
        Ok(())
    }
}

/// Errors raised while assembling raw input data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    /// Duplicate counterparty reference.
    #[error("Duplicate counterparty reference: {0}")]
    DuplicateCounterparty(String),

    /// Duplicate facility reference.
    #[error("Duplicate facility reference: {0}")]
    DuplicateFacility(String),

    /// Duplicate exposure reference across loans and contingents.
    #[error("Duplicate exposure reference: {0}")]
    DuplicateExposure(String),

    /// A numeric field failed validation.
    #[error("Invalid value for {field} on {reference}: {reason}")]
    InvalidValue {
        /// Offending record.
        reference: String,
        /// Offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

/// Top-level error type for the CRM engine.
#[derive(Debug, Error)]
pub enum CrmError {
    /// Configuration rejected before processing.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Raw input rejected.
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    /// The orchestrator was asked to advance past its terminal state.
    #[error("Invalid CRM state transition from {0}")]
    InvalidTransition(String),
}
