//! Identifier types for CRM entities.
//!
//! Strongly-typed references for counterparties, facilities, exposures and
//! credit-risk-mitigation items. Beneficiary links on collateral, guarantees
//! and provisions stay plain strings because their target kind depends on
//! the beneficiary level; these newtypes cover the owning side.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! reference_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier.
            #[inline]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

reference_id!(
    /// Unique identifier for a counterparty.
    ///
    /// # Examples
    ///
    /// ```
    /// use crm_core::ids::CounterpartyId;
    ///
    /// let id = CounterpartyId::new("CP001");
    /// assert_eq!(id.as_str(), "CP001");
    /// ```
    CounterpartyId
);

reference_id!(
    /// Unique identifier for a facility (committed limit).
    FacilityId
);

reference_id!(
    /// Unique identifier for a unified exposure row.
    ///
    /// Synthetic undrawn rows use the facility reference suffixed with
    /// `_UNDRAWN`.
    ExposureId
);

reference_id!(
    /// Unique identifier for a collateral item.
    CollateralId
);

reference_id!(
    /// Unique identifier for a guarantee.
    GuaranteeId
);

reference_id!(
    /// Unique identifier for a provision record.
    ProvisionId
);

impl ExposureId {
    /// Builds the reference of the synthetic undrawn row for a facility.
    pub fn undrawn_for(facility: &FacilityId) -> Self {
        Self(format!("{}_UNDRAWN", facility.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_counterparty_id_roundtrip() {
        let id = CounterpartyId::new("CP001");
        assert_eq!(id.as_str(), "CP001");
        assert_eq!(format!("{}", id), "CP001");
    }

    #[test]
    fn test_ids_from_str_and_string() {
        let a: FacilityId = "FAC1".into();
        let b: FacilityId = String::from("FAC1").into();
        assert_eq!(a, b);
    }

    #[test]
    fn test_ids_hashable() {
        let mut set = HashSet::new();
        set.insert(ExposureId::new("L1"));
        set.insert(ExposureId::new("L1"));
        set.insert(ExposureId::new("L2"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_undrawn_reference() {
        let fac = FacilityId::new("FAC9");
        assert_eq!(ExposureId::undrawn_for(&fac).as_str(), "FAC9_UNDRAWN");
    }
}
