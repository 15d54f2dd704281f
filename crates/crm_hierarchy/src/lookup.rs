//! Counterparty lookup: hierarchy position plus effective rating.

use crate::graph::{HierarchyGraph, HierarchyLookup};
use crate::rating::EffectiveRating;
use crate::records::Counterparty;
use crm_core::{CounterpartyId, ExposureClass};
use std::collections::HashMap;

/// Everything later stages need to know about a counterparty.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CounterpartyProfile {
    /// Counterparty reference.
    pub reference: CounterpartyId,
    /// Entity type as supplied.
    pub entity_type: String,
    /// Standardised class derived from the entity type.
    pub exposure_class: Option<ExposureClass>,
    /// Direct parent.
    pub parent: Option<CounterpartyId>,
    /// Ultimate parent; the counterparty itself when it has none.
    pub ultimate_parent: CounterpartyId,
    /// Ownership levels to the ultimate parent.
    pub hierarchy_depth: usize,
    /// Effective rating after inheritance.
    pub rating: EffectiveRating,
}

impl CounterpartyProfile {
    /// A standalone, unrated profile.
    pub fn standalone(reference: impl Into<CounterpartyId>, entity_type: impl Into<String>) -> Self {
        let reference = reference.into();
        let entity_type = entity_type.into();
        Self {
            exposure_class: ExposureClass::from_entity_type(&entity_type),
            ultimate_parent: reference.clone(),
            reference,
            entity_type,
            parent: None,
            hierarchy_depth: 0,
            rating: EffectiveRating::unrated(),
        }
    }

    /// Replaces the effective rating.
    pub fn with_rating(mut self, rating: EffectiveRating) -> Self {
        self.rating = rating;
        self
    }

    /// Returns `true` when the counterparty has a parent.
    #[inline]
    pub fn has_parent(&self) -> bool {
        self.parent.is_some()
    }

    /// Effective credit-quality step.
    #[inline]
    pub fn cqs(&self) -> Option<u8> {
        self.rating.cqs
    }

    /// Effective probability of default.
    #[inline]
    pub fn pd(&self) -> Option<f64> {
        self.rating.pd
    }
}

/// Profiles keyed by counterparty reference.
#[derive(Debug, Clone, Default)]
pub struct CounterpartyLookup {
    profiles: HashMap<CounterpartyId, CounterpartyProfile>,
}

impl CounterpartyLookup {
    /// Builds profiles for every counterparty.
    pub fn build(
        counterparties: &[Counterparty],
        graph: &HierarchyGraph<CounterpartyId>,
        ultimate: &HierarchyLookup<CounterpartyId>,
        ratings: &HashMap<CounterpartyId, EffectiveRating>,
    ) -> Self {
        Self::from_profiles(counterparties.iter().map(|cp| {
            let mut profile = CounterpartyProfile::standalone(cp.reference.clone(), cp.entity_type.clone());
            profile.parent = graph.parent_of(&cp.reference).cloned();
            profile.ultimate_parent = ultimate.root_of(&cp.reference).clone();
            profile.hierarchy_depth = ultimate.depth_of(&cp.reference);
            if let Some(rating) = ratings.get(&cp.reference) {
                profile.rating = rating.clone();
            }
            profile
        }))
    }

    /// Builds the lookup from ready-made profiles.
    pub fn from_profiles(profiles: impl IntoIterator<Item = CounterpartyProfile>) -> Self {
        Self {
            profiles: profiles
                .into_iter()
                .map(|p| (p.reference.clone(), p))
                .collect(),
        }
    }

    /// Profile of a counterparty.
    pub fn get(&self, reference: &CounterpartyId) -> Option<&CounterpartyProfile> {
        self.profiles.get(reference)
    }

    /// Returns `true` when the counterparty is known.
    pub fn contains(&self, reference: &CounterpartyId) -> bool {
        self.profiles.contains_key(reference)
    }

    /// Number of profiles.
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Returns `true` when empty.
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Iterates over profiles in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &CounterpartyProfile> {
        self.profiles.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standalone_profile() {
        let p = CounterpartyProfile::standalone("CP1", "bank");
        assert_eq!(p.exposure_class, Some(ExposureClass::Institution));
        assert_eq!(p.ultimate_parent, CounterpartyId::new("CP1"));
        assert!(!p.has_parent());
        assert_eq!(p.cqs(), None);
    }

    #[test]
    fn test_build_with_hierarchy() {
        let cps = vec![
            Counterparty::new("SUB", "company"),
            Counterparty::new("TOP", "company"),
        ];
        let graph = HierarchyGraph::from_edges([(
            Some(CounterpartyId::new("SUB")),
            Some(CounterpartyId::new("TOP")),
        )]);
        let lookup = CounterpartyLookup::build(&cps, &graph, &graph.resolve(10), &HashMap::new());

        let sub = lookup.get(&CounterpartyId::new("SUB")).unwrap();
        assert_eq!(sub.ultimate_parent, CounterpartyId::new("TOP"));
        assert_eq!(sub.hierarchy_depth, 1);
        assert!(sub.has_parent());
        assert_eq!(sub.exposure_class, Some(ExposureClass::Corporate));

        let top = lookup.get(&CounterpartyId::new("TOP")).unwrap();
        assert_eq!(top.hierarchy_depth, 0);
        assert_eq!(lookup.len(), 2);
    }
}
