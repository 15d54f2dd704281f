//! Calculation configuration.
//!
//! Loaded from TOML with environment variable overrides, then validated
//! before any processing begins:
//!
//! ```toml
//! framework = "basel_3_1"
//! reporting_date = "2027-06-30"
//! base_currency = "GBP"
//! max_hierarchy_depth = 10
//!
//! [irb_permissions]
//! corporate = ["sa", "firb"]
//! institution = ["sa", "firb"]
//! ```

use crate::framework::{FrameworkParams, DEFAULT_MAX_HIERARCHY_DEPTH};
use crate::parallel::ParallelConfig;
use crate::types::{Approach, ExposureClass, Framework};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use thiserror::Error;

/// Configuration error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// IO error reading the config file.
    #[error("IO error: {0}")]
    Io(String),

    /// Parse error in the config file.
    #[error("Parse error: {0}")]
    Parse(String),

    /// One or more validation failures.
    #[error("Validation errors: {}", .0.join("; "))]
    Validation(Vec<String>),
}

/// Approaches the firm is permitted to use, per exposure class.
///
/// Classes absent from the map are standardised-only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IrbPermissions(BTreeMap<ExposureClass, BTreeSet<Approach>>);

impl IrbPermissions {
    /// Standardised approach for every class.
    pub fn sa_only() -> Self {
        Self::default()
    }

    /// Foundation IRB for institutions and corporates, slotting for
    /// specialised lending.
    pub fn firb_only() -> Self {
        let firb = [Approach::Standardised, Approach::FoundationIrb];
        Self::sa_only()
            .with_class(ExposureClass::Institution, firb)
            .with_class(ExposureClass::Corporate, firb)
            .with_class(ExposureClass::CorporateSme, firb)
            .with_class(
                ExposureClass::SpecialisedLending,
                [Approach::Standardised, Approach::FoundationIrb, Approach::Slotting],
            )
    }

    /// Foundation and advanced IRB for every class except equity.
    ///
    /// Valid under CRR only; Basel 3.1 withdraws IRB for sovereigns and
    /// advanced IRB for institutions.
    pub fn full_irb() -> Self {
        let all = [
            Approach::Standardised,
            Approach::FoundationIrb,
            Approach::AdvancedIrb,
        ];
        let mut permissions = Self::sa_only();
        for class in [
            ExposureClass::CentralGovtCentralBank,
            ExposureClass::Institution,
            ExposureClass::Corporate,
            ExposureClass::CorporateSme,
            ExposureClass::RetailMortgage,
            ExposureClass::RetailQrre,
            ExposureClass::RetailOther,
        ] {
            permissions = permissions.with_class(class, all);
        }
        permissions.with_class(
            ExposureClass::SpecialisedLending,
            [
                Approach::Standardised,
                Approach::FoundationIrb,
                Approach::AdvancedIrb,
                Approach::Slotting,
            ],
        )
    }

    /// Sets the permitted approaches for a class.
    pub fn with_class(
        mut self,
        class: ExposureClass,
        approaches: impl IntoIterator<Item = Approach>,
    ) -> Self {
        self.0.insert(class, approaches.into_iter().collect());
        self
    }

    /// Returns `true` when foundation or advanced IRB is permitted for the class.
    pub fn permits_irb(&self, class: ExposureClass) -> bool {
        self.0
            .get(&class)
            .map(|set| set.iter().any(|a| a.is_irb()))
            .unwrap_or(false)
    }

    /// Returns `true` when the given approach is permitted for the class.
    pub fn permits(&self, class: ExposureClass, approach: Approach) -> bool {
        approach == Approach::Standardised
            || self.0.get(&class).is_some_and(|set| set.contains(&approach))
    }

    /// Iterates over the explicitly configured classes.
    pub fn iter(&self) -> impl Iterator<Item = (&ExposureClass, &BTreeSet<Approach>)> {
        self.0.iter()
    }
}

/// Calculation configuration consumed by hierarchy resolution and CRM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationConfig {
    /// Regulatory framework.
    #[serde(default)]
    pub framework: Framework,

    /// Reporting date used for residual maturities.
    #[serde(default = "default_reporting_date")]
    pub reporting_date: NaiveDate,

    /// Base (reporting) currency.
    #[serde(default = "default_base_currency")]
    pub base_currency: String,

    /// IRB permissions by exposure class.
    #[serde(default)]
    pub irb_permissions: IrbPermissions,

    /// Maximum hierarchy traversal depth.
    #[serde(default = "default_max_hierarchy_depth")]
    pub max_hierarchy_depth: usize,

    /// Convert amounts to the base currency during hierarchy resolution.
    #[serde(default)]
    pub apply_fx_conversion: bool,

    /// Compact intermediate state after the collateral stage as well.
    #[serde(default)]
    pub materialise_after_collateral: bool,

    /// Row-level parallelism settings.
    #[serde(default)]
    pub parallel: ParallelConfig,
}

fn default_reporting_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 12, 31).unwrap_or_default()
}

fn default_base_currency() -> String {
    "GBP".to_string()
}

fn default_max_hierarchy_depth() -> usize {
    DEFAULT_MAX_HIERARCHY_DEPTH
}

impl Default for CalculationConfig {
    fn default() -> Self {
        Self {
            framework: Framework::default(),
            reporting_date: default_reporting_date(),
            base_currency: default_base_currency(),
            irb_permissions: IrbPermissions::default(),
            max_hierarchy_depth: default_max_hierarchy_depth(),
            apply_fx_conversion: false,
            materialise_after_collateral: false,
            parallel: ParallelConfig::default(),
        }
    }
}

impl CalculationConfig {
    /// CRR configuration for a reporting date.
    pub fn crr(reporting_date: NaiveDate) -> Self {
        Self {
            framework: Framework::Crr,
            reporting_date,
            ..Self::default()
        }
    }

    /// Basel 3.1 configuration for a reporting date.
    pub fn basel_3_1(reporting_date: NaiveDate) -> Self {
        Self {
            framework: Framework::Basel31,
            reporting_date,
            ..Self::default()
        }
    }

    /// Sets the IRB permissions.
    pub fn with_irb_permissions(mut self, permissions: IrbPermissions) -> Self {
        self.irb_permissions = permissions;
        self
    }

    /// Sets the base currency.
    pub fn with_base_currency(mut self, currency: impl Into<String>) -> Self {
        self.base_currency = currency.into();
        self
    }

    /// Sets the hierarchy traversal cap.
    pub fn with_max_hierarchy_depth(mut self, depth: usize) -> Self {
        self.max_hierarchy_depth = depth;
        self
    }

    /// Enables FX conversion to the base currency.
    pub fn with_fx_conversion(mut self) -> Self {
        self.apply_fx_conversion = true;
        self
    }

    /// Sets the parallelism settings.
    pub fn with_parallel(mut self, parallel: ParallelConfig) -> Self {
        self.parallel = parallel;
        self
    }

    /// Resolves the framework parameters for this run.
    pub fn params(&self) -> FrameworkParams {
        FrameworkParams::for_framework(self.framework)
    }

    /// Returns `true` under Basel 3.1.
    #[inline]
    pub fn is_basel_3_1(&self) -> bool {
        self.framework.is_basel_3_1()
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Loads configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), framework = %config.framework, "Loaded configuration");
        Ok(config)
    }

    /// Applies `CRM_*` environment variable overrides.
    pub fn with_env_override(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary key lookup.
    ///
    /// Unparseable values are ignored and leave the current setting in place.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(framework) = lookup("CRM_FRAMEWORK").and_then(|v| v.parse().ok()) {
            self.framework = framework;
        }

        if let Some(currency) = lookup("CRM_BASE_CURRENCY") {
            self.base_currency = currency;
        }

        if let Some(date) = lookup("CRM_REPORTING_DATE")
            .and_then(|v| NaiveDate::parse_from_str(&v, "%Y-%m-%d").ok())
        {
            self.reporting_date = date;
        }

        if let Some(depth) = lookup("CRM_MAX_HIERARCHY_DEPTH").and_then(|v| v.parse().ok()) {
            self.max_hierarchy_depth = depth;
        }

        if let Some(flag) = lookup("CRM_APPLY_FX_CONVERSION").and_then(|v| v.parse().ok()) {
            self.apply_fx_conversion = flag;
        }

        self
    }

    /// Validates the configuration, collecting every problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        let ccy = self.base_currency.as_str();
        if ccy.len() != 3 || !ccy.chars().all(|c| c.is_ascii_uppercase()) {
            errors.push(format!(
                "Invalid base_currency '{}'. Must be a three-letter uppercase ISO code",
                self.base_currency
            ));
        }

        if self.max_hierarchy_depth == 0 {
            errors.push("max_hierarchy_depth must be greater than 0".to_string());
        }

        if self.parallel.batch_size == 0 {
            errors.push("parallel.batch_size must be greater than 0".to_string());
        }

        for (class, approaches) in self.irb_permissions.iter() {
            if approaches.contains(&Approach::Slotting)
                && *class != ExposureClass::SpecialisedLending
            {
                errors.push(format!(
                    "Slotting permission is only valid for specialised_lending, not {}",
                    class
                ));
            }
            if self.is_basel_3_1() {
                let any_irb = approaches.iter().any(|a| a.is_irb());
                match class {
                    ExposureClass::Equity if any_irb => errors.push(
                        "IRB permission for equity is not available under basel_3_1".to_string(),
                    ),
                    ExposureClass::CentralGovtCentralBank if any_irb => errors.push(
                        "IRB permission for central_govt_central_bank is not available under basel_3_1"
                            .to_string(),
                    ),
                    ExposureClass::Institution
                        if approaches.contains(&Approach::AdvancedIrb) =>
                    {
                        errors.push(
                            "Advanced IRB for institution is not available under basel_3_1"
                                .to_string(),
                        )
                    }
                    _ => {}
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Loads from file, applies environment overrides and validates.
    pub fn load_with_env_and_validate(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?.with_env_override();
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = CalculationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.framework, Framework::Crr);
        assert_eq!(config.max_hierarchy_depth, 10);
    }

    #[test]
    fn test_from_toml_str() {
        let toml = r#"
            framework = "basel_3_1"
            reporting_date = "2027-06-30"
            base_currency = "EUR"

            [irb_permissions]
            corporate = ["sa", "firb"]
        "#;
        let config = CalculationConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.framework, Framework::Basel31);
        assert_eq!(config.reporting_date, date(2027, 6, 30));
        assert_eq!(config.base_currency, "EUR");
        assert!(config.irb_permissions.permits_irb(ExposureClass::Corporate));
        assert!(!config.irb_permissions.permits_irb(ExposureClass::Institution));
    }

    #[test]
    fn test_parse_error() {
        let result = CalculationConfig::from_toml_str("framework = 42");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "framework = \"crr\"\nmax_hierarchy_depth = 4").unwrap();
        let config = CalculationConfig::load(file.path()).unwrap();
        assert_eq!(config.max_hierarchy_depth, 4);
    }

    #[test]
    fn test_load_missing_file() {
        let result = CalculationConfig::load(Path::new("/nonexistent/crm.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_overrides_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("CRM_FRAMEWORK", "basel_3_1"),
            ("CRM_BASE_CURRENCY", "USD"),
            ("CRM_REPORTING_DATE", "2026-03-31"),
            ("CRM_MAX_HIERARCHY_DEPTH", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let config = CalculationConfig::default()
            .with_overrides_from(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.framework, Framework::Basel31);
        assert_eq!(config.base_currency, "USD");
        assert_eq!(config.reporting_date, date(2026, 3, 31));
        assert_eq!(config.max_hierarchy_depth, 10);
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let config = CalculationConfig::default()
            .with_base_currency("gbp")
            .with_max_hierarchy_depth(0);
        match config.validate() {
            Err(ConfigError::Validation(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_validation_rejects_slotting_outside_specialised_lending() {
        let permissions = IrbPermissions::sa_only()
            .with_class(ExposureClass::Corporate, [Approach::Slotting]);
        let config = CalculationConfig::default().with_irb_permissions(permissions);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_equity_irb_under_basel_3_1() {
        let permissions = IrbPermissions::sa_only()
            .with_class(ExposureClass::Equity, [Approach::FoundationIrb]);
        let b31 = CalculationConfig::basel_3_1(date(2027, 1, 1))
            .with_irb_permissions(permissions.clone());
        let crr = CalculationConfig::crr(date(2024, 1, 1)).with_irb_permissions(permissions);
        assert!(b31.validate().is_err());
        assert!(crr.validate().is_ok());
    }

    #[test]
    fn test_preset_permissions_validate_under_both_frameworks() {
        for permissions in [IrbPermissions::sa_only(), IrbPermissions::firb_only()] {
            let config = CalculationConfig::basel_3_1(date(2027, 1, 1))
                .with_irb_permissions(permissions);
            assert!(config.validate().is_ok());
        }
        let crr = CalculationConfig::crr(date(2024, 1, 1))
            .with_irb_permissions(IrbPermissions::full_irb());
        assert!(crr.validate().is_ok());
    }

    #[test]
    fn test_full_irb_rejected_under_basel_3_1() {
        let config = CalculationConfig::basel_3_1(date(2027, 1, 1))
            .with_irb_permissions(IrbPermissions::full_irb());
        match config.validate() {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors.len(), 2);
                assert!(errors.iter().any(|e| e.contains("central_govt_central_bank")));
                assert!(errors.iter().any(|e| e.contains("Advanced IRB for institution")));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_permits_standardised_always() {
        let permissions = IrbPermissions::sa_only();
        assert!(permissions.permits(ExposureClass::Corporate, Approach::Standardised));
        assert!(!permissions.permits(ExposureClass::Corporate, Approach::FoundationIrb));
    }

    #[test]
    fn test_validation_error_display() {
        let err = ConfigError::Validation(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(err.to_string(), "Validation errors: a; b");
    }
}
