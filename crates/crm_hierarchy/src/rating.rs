//! Rating inheritance.
//!
//! Each counterparty takes its own latest rating; an unrated counterparty
//! falls back to its ultimate parent's own latest rating. Rating fields are
//! coalesced one by one, so gaps in the own record are filled from the
//! parent's. Only one hop up the resolved chain is consulted.

use crate::graph::HierarchyLookup;
use crate::records::{Counterparty, Rating};
use chrono::NaiveDate;
use crm_core::{CounterpartyId, RatingType};
use std::collections::HashMap;
use std::fmt;

/// Why a counterparty carries the rating it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum InheritanceReason {
    /// The counterparty's own rating.
    OwnRating,
    /// Inherited from the ultimate parent.
    ParentRating,
    /// Neither the counterparty nor its ultimate parent is rated.
    Unrated,
}

impl fmt::Display for InheritanceReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InheritanceReason::OwnRating => "own_rating",
            InheritanceReason::ParentRating => "parent_rating",
            InheritanceReason::Unrated => "unrated",
        };
        write!(f, "{}", s)
    }
}

/// Effective rating of a counterparty after inheritance.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EffectiveRating {
    /// Internal or external, if rated.
    pub rating_type: Option<RatingType>,
    /// Agency or model.
    pub agency: Option<String>,
    /// Published grade.
    pub rating_value: Option<String>,
    /// Credit-quality step.
    pub cqs: Option<u8>,
    /// Probability of default.
    pub pd: Option<f64>,
    /// Date of the rating used.
    pub rating_date: Option<NaiveDate>,
    /// Taken from the ultimate parent.
    pub inherited: bool,
    /// Counterparty whose rating was used.
    pub source_counterparty: Option<CounterpartyId>,
    /// Inheritance outcome.
    pub reason: InheritanceReason,
}

impl EffectiveRating {
    /// An unrated result.
    pub fn unrated() -> Self {
        Self {
            rating_type: None,
            agency: None,
            rating_value: None,
            cqs: None,
            pd: None,
            rating_date: None,
            inherited: false,
            source_counterparty: None,
            reason: InheritanceReason::Unrated,
        }
    }

    /// Merges the own latest record with the ultimate parent's, field by
    /// field with the own record first.
    fn coalesce(own: Option<&Rating>, parent: Option<&Rating>) -> Self {
        fn field<T>(
            own: Option<&Rating>,
            parent: Option<&Rating>,
            f: impl Fn(&Rating) -> Option<T>,
        ) -> Option<T> {
            own.and_then(&f).or_else(|| parent.and_then(&f))
        }

        let (inherited, source_counterparty, reason) = if own.is_some_and(Rating::is_populated) {
            (false, own.map(|r| r.counterparty.clone()), InheritanceReason::OwnRating)
        } else if parent.is_some_and(Rating::is_populated) {
            (true, parent.map(|r| r.counterparty.clone()), InheritanceReason::ParentRating)
        } else {
            (false, None, InheritanceReason::Unrated)
        };

        Self {
            rating_type: field(own, parent, |r| Some(r.rating_type)),
            agency: field(own, parent, |r| r.agency.clone()),
            rating_value: field(own, parent, |r| r.rating_value.clone()),
            cqs: field(own, parent, |r| r.cqs),
            pd: field(own, parent, |r| r.pd),
            rating_date: field(own, parent, |r| Some(r.rating_date)),
            inherited,
            source_counterparty,
            reason,
        }
    }

    /// Returns `true` for an internal rating.
    pub fn is_internal(&self) -> bool {
        self.rating_type == Some(RatingType::Internal)
    }
}

/// Picks the latest rating per counterparty.
///
/// Ordering is rating date descending, then rating reference descending.
pub fn latest_ratings(ratings: &[Rating]) -> HashMap<&CounterpartyId, &Rating> {
    let mut latest: HashMap<&CounterpartyId, &Rating> = HashMap::new();
    for rating in ratings {
        latest
            .entry(&rating.counterparty)
            .and_modify(|current| {
                let key = (rating.rating_date, rating.rating_reference.as_str());
                let cur = (current.rating_date, current.rating_reference.as_str());
                if key > cur {
                    *current = rating;
                }
            })
            .or_insert(rating);
    }
    latest
}

/// Resolves the effective rating of every counterparty.
pub fn resolve_ratings(
    counterparties: &[Counterparty],
    ratings: &[Rating],
    parents: &HierarchyLookup<CounterpartyId>,
) -> HashMap<CounterpartyId, EffectiveRating> {
    let latest = latest_ratings(ratings);

    counterparties
        .iter()
        .map(|cp| {
            let reference = &cp.reference;
            let parent = parents.root_of(reference);
            let own = latest.get(reference).copied();
            let inherited = if parent != reference {
                latest.get(parent).copied()
            } else {
                None
            };
            (reference.clone(), EffectiveRating::coalesce(own, inherited))
        })
        .collect()
}
