//! Top-level hierarchy resolution.
//!
//! Runs once per calculation over the full raw snapshot:
//!
//! 1. counterparty ownership graph → ultimate parents
//! 2. rating inheritance
//! 3. counterparty lookup
//! 4. facility graph → root facilities
//! 5. exposure unification
//! 6. FX conversion (optional)
//! 7. collateral LTV and property coverage
//! 8. lending groups and group totals

use crate::builder::RawData;
use crate::fx::{self, FxTable};
use crate::graph::{HierarchyGraph, HierarchyLookup};
use crate::lending::{apply_lending_groups, lending_group_totals, lending_groups, LendingGroupTotals};
use crate::lookup::CounterpartyLookup;
use crate::property::{apply_collateral_ltv, apply_property_coverage};
use crate::rating::resolve_ratings;
use crate::records::{CollateralItem, GuaranteeItem, ProvisionItem};
use crate::unify::{facility_edges, unify_exposures, unknown_parent_facilities, UnifiedExposure};
use crm_core::{CalculationConfig, CounterpartyId, CrmIssue, FacilityId, Relation};
use std::collections::HashSet;
use std::fmt::Display;
use std::hash::Hash;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Output of hierarchy resolution.
#[derive(Debug, Clone, Default)]
pub struct ResolvedHierarchy {
    /// Unified exposure rows.
    pub exposures: Vec<UnifiedExposure>,
    /// Counterparty profiles with ratings.
    pub counterparty_lookup: CounterpartyLookup,
    /// Sub-facility to root facility lookup.
    pub facility_roots: HierarchyLookup<FacilityId>,
    /// Collateral, converted when FX conversion ran.
    pub collateral: Option<Relation<CollateralItem>>,
    /// Guarantees, converted when FX conversion ran.
    pub guarantees: Option<Relation<GuaranteeItem>>,
    /// Provisions, converted when FX conversion ran.
    pub provisions: Option<Relation<ProvisionItem>>,
    /// Per-group aggregates, empty without lending mappings.
    pub lending_group_totals: Vec<LendingGroupTotals>,
    /// Non-fatal issues found during resolution.
    pub issues: Vec<CrmIssue>,
}

/// Resolves hierarchies and unifies exposures.
#[derive(Debug, Clone)]
pub struct HierarchyResolver {
    config: CalculationConfig,
}

impl HierarchyResolver {
    /// Creates a resolver with the given configuration.
    pub fn new(config: CalculationConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[inline]
    pub fn config(&self) -> &CalculationConfig {
        &self.config
    }

    /// Resolves the raw snapshot.
    pub fn resolve(&self, data: RawData) -> ResolvedHierarchy {
        let start = Instant::now();
        let max_depth = self.config.max_hierarchy_depth;
        let parallel = &self.config.parallel;
        let mut issues = Vec::new();

        let cp_graph = HierarchyGraph::from_edges(
            data.org_mappings
                .iter()
                .map(|m| (m.child.clone(), m.parent.clone())),
        );
        let ultimate_parents = cp_graph.resolve_with(max_depth, parallel);
        graph_issues(&cp_graph, &ultimate_parents, "counterparty", &mut issues);

        let ratings = resolve_ratings(&data.counterparties, &data.ratings, &ultimate_parents);
        let counterparty_lookup =
            CounterpartyLookup::build(&data.counterparties, &cp_graph, &ultimate_parents, &ratings);

        let fac_graph = HierarchyGraph::from_edges(facility_edges(&data.facility_mappings));
        let facility_roots = fac_graph.resolve_with(max_depth, parallel);
        graph_issues(&fac_graph, &facility_roots, "facility", &mut issues);

        let mut exposures = unify_exposures(
            &data.loans,
            &data.contingents,
            &data.facilities,
            &data.facility_mappings,
            &facility_roots,
            &ratings,
        );

        data_quality_issues(&data, &mut issues);

        let mut collateral = data.collateral;
        let mut guarantees = data.guarantees;
        let mut provisions = data.provisions;

        if self.config.apply_fx_conversion {
            match &data.fx_rates {
                Some(rates) => {
                    let table = FxTable::new(rates, &self.config.base_currency);
                    issues.extend(fx::convert_exposures(&mut exposures, &table));
                    if let Some(c) = collateral.as_mut() {
                        issues.extend(fx::convert_collateral(c, &table));
                    }
                    if let Some(g) = guarantees.as_mut() {
                        issues.extend(fx::convert_guarantees(g, &table));
                    }
                    if let Some(p) = provisions.as_mut() {
                        issues.extend(fx::convert_provisions(p, &table));
                    }
                    debug!(base = %self.config.base_currency, "Applied FX conversion");
                }
                None => info!("FX conversion enabled but no rates supplied; amounts left as booked"),
            }
        }

        apply_collateral_ltv(&mut exposures, collateral.as_ref());
        apply_property_coverage(&mut exposures, collateral.as_ref());

        let lending_group_totals = if data.lending_mappings.is_empty() {
            Vec::new()
        } else {
            let groups = lending_groups(&data.lending_mappings);
            apply_lending_groups(&mut exposures, &groups);
            lending_group_totals(&exposures)
        };

        info!(
            counterparties = data.counterparties.len(),
            exposures = exposures.len(),
            issues = issues.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Resolved hierarchy"
        );

        ResolvedHierarchy {
            exposures,
            counterparty_lookup,
            facility_roots,
            collateral,
            guarantees,
            provisions,
            lending_group_totals,
            issues,
        }
    }
}

fn graph_issues<K>(
    graph: &HierarchyGraph<K>,
    lookup: &HierarchyLookup<K>,
    kind: &'static str,
    issues: &mut Vec<CrmIssue>,
) where
    K: Clone + Eq + Hash + Send + Sync + Display,
{
    for conflict in graph.conflicts() {
        warn!(%kind, child = %conflict.child, "Multiple parents; keeping first");
        issues.push(
            CrmIssue::data_quality(
                "duplicate_parent_edge",
                format!(
                    "{} {} has parents {} and {}; keeping {}",
                    kind,
                    conflict.child,
                    conflict.kept_parent,
                    conflict.ignored_parent,
                    conflict.kept_parent
                ),
            )
            .with_entity(conflict.child.to_string())
            .with_context("kind", kind)
            .with_context("ignored_parent", &conflict.ignored_parent),
        );
    }

    for node in lookup.iter() {
        if node.cycle {
            debug!(%kind, entity = %node.entity, root = %node.root, "Cycle detected in hierarchy");
            issues.push(
                CrmIssue::hierarchy(
                    "cycle_detected",
                    format!("Cycle in {} hierarchy; truncated at {}", kind, node.root),
                )
                .with_entity(node.entity.to_string())
                .with_context("kind", kind)
                .with_context("depth", node.depth),
            );
        } else if node.truncated {
            issues.push(
                CrmIssue::hierarchy(
                    "max_depth_reached",
                    format!("{} hierarchy deeper than {}; truncated at {}", kind, node.depth, node.root),
                )
                .with_entity(node.entity.to_string())
                .with_context("kind", kind),
            );
        }
    }
}

fn data_quality_issues(data: &RawData, issues: &mut Vec<CrmIssue>) {
    let known: HashSet<&CounterpartyId> = data.counterparties.iter().map(|c| &c.reference).collect();
    if known.is_empty() {
        return;
    }

    let exposures = data
        .loans
        .iter()
        .map(|l| (l.reference.as_str(), &l.counterparty))
        .chain(data.contingents.iter().map(|c| (c.reference.as_str(), &c.counterparty)));
    for (reference, counterparty) in exposures {
        if !known.contains(counterparty) {
            issues.push(
                CrmIssue::data_quality(
                    "orphan_exposure",
                    format!("Counterparty {} not found", counterparty),
                )
                .with_entity(reference)
                .with_context("counterparty", counterparty),
            );
        }
    }

    for (child, parent) in unknown_parent_facilities(&data.facility_mappings, &data.facilities) {
        issues.push(
            CrmIssue::data_quality(
                "unknown_parent_facility",
                format!("Parent facility {} not found", parent),
            )
            .with_entity(child)
            .with_context("facility", parent),
        );
    }
}
