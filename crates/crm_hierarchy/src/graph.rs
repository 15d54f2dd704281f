//! Child→parent graph resolution with cycle safety.
//!
//! Nodes live in an arena indexed by `usize`; each node stores at most one
//! parent index. Resolution walks parent indices with a per-walk visited
//! set, so bad data containing loops terminates instead of recursing.
//!
//! ```text
//!   edges                arena                 lookup
//!   B → A            [0]=B parent=1        B: root=A depth=1
//!   C → B     ==>    [1]=A parent=-        C: root=A depth=2
//!                    [2]=C parent=0
//! ```

use crm_core::ParallelConfig;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// A child edge discarded because the child already had a parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictingEdge<K> {
    /// Child with more than one parent.
    pub child: K,
    /// Parent kept (first seen).
    pub kept_parent: K,
    /// Parent discarded.
    pub ignored_parent: K,
}

/// Resolution result for one child node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNode<K> {
    /// The child entity.
    pub entity: K,
    /// Last distinct ancestor reached.
    pub root: K,
    /// Number of parent edges traversed.
    pub depth: usize,
    /// The walk stopped on a revisited node.
    pub cycle: bool,
    /// The walk stopped at the depth cap with ancestors remaining.
    pub truncated: bool,
}

/// Arena-backed child→parent graph.
#[derive(Debug, Clone)]
pub struct HierarchyGraph<K> {
    nodes: Vec<K>,
    index: HashMap<K, usize>,
    parent: Vec<Option<usize>>,
    children: Vec<usize>,
    conflicts: Vec<ConflictingEdge<K>>,
}

impl<K> HierarchyGraph<K>
where
    K: Clone + Eq + Hash + Send + Sync,
{
    /// Builds the graph from `(child, parent)` pairs.
    ///
    /// Pairs with a missing side are dropped. When a child appears more than
    /// once the first parent wins and the rest are recorded as conflicts.
    pub fn from_edges<I>(edges: I) -> Self
    where
        I: IntoIterator<Item = (Option<K>, Option<K>)>,
    {
        let mut graph = Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            parent: Vec::new(),
            children: Vec::new(),
            conflicts: Vec::new(),
        };

        for (child, parent) in edges {
            let (child, parent) = match (child, parent) {
                (Some(c), Some(p)) => (c, p),
                _ => continue,
            };
            let c = graph.intern(child);
            let p = graph.intern(parent);
            match graph.parent[c] {
                None => {
                    graph.parent[c] = Some(p);
                    graph.children.push(c);
                }
                Some(existing) if existing == p => {}
                Some(existing) => graph.conflicts.push(ConflictingEdge {
                    child: graph.nodes[c].clone(),
                    kept_parent: graph.nodes[existing].clone(),
                    ignored_parent: graph.nodes[p].clone(),
                }),
            }
        }

        graph
    }

    fn intern(&mut self, key: K) -> usize {
        if let Some(&i) = self.index.get(&key) {
            return i;
        }
        let i = self.nodes.len();
        self.index.insert(key.clone(), i);
        self.nodes.push(key);
        self.parent.push(None);
        i
    }

    /// Number of nodes with an outgoing edge.
    pub fn edge_count(&self) -> usize {
        self.children.len()
    }

    /// Returns `true` when no edges survived filtering.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Duplicate-parent edges that were discarded.
    pub fn conflicts(&self) -> &[ConflictingEdge<K>] {
        &self.conflicts
    }

    /// Direct parent of a node, if any.
    pub fn parent_of(&self, key: &K) -> Option<&K> {
        let i = *self.index.get(key)?;
        self.parent[i].map(|p| &self.nodes[p])
    }

    fn walk(&self, start: usize, max_depth: usize) -> ResolvedNode<K> {
        let mut current = start;
        let mut depth = 0;
        let mut visited = HashSet::from([start]);
        let mut cycle = false;

        while let Some(next) = self.parent[current] {
            if depth >= max_depth {
                break;
            }
            if !visited.insert(next) {
                cycle = true;
                break;
            }
            current = next;
            depth += 1;
        }

        let truncated = !cycle && depth >= max_depth && self.parent[current].is_some();
        ResolvedNode {
            entity: self.nodes[start].clone(),
            root: self.nodes[current].clone(),
            depth,
            cycle,
            truncated,
        }
    }

    /// Resolves every child to its root, sequentially.
    pub fn resolve(&self, max_depth: usize) -> HierarchyLookup<K> {
        self.resolve_with(max_depth, &ParallelConfig::sequential())
    }

    /// Resolves every child to its root; walks run in parallel for large graphs.
    pub fn resolve_with(&self, max_depth: usize, parallel: &ParallelConfig) -> HierarchyLookup<K> {
        let resolved = parallel.map_owned(self.children.clone(), |i| self.walk(i, max_depth));
        HierarchyLookup::from_nodes(resolved)
    }
}

/// Flat lookup from child entity to its resolved root.
///
/// Entities with no parent edge are absent; callers treat them as their own
/// root at depth 0.
#[derive(Debug, Clone)]
pub struct HierarchyLookup<K> {
    nodes: Vec<ResolvedNode<K>>,
    index: HashMap<K, usize>,
}

impl<K> Default for HierarchyLookup<K> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<K> HierarchyLookup<K>
where
    K: Clone + Eq + Hash,
{
    fn from_nodes(nodes: Vec<ResolvedNode<K>>) -> Self {
        let index = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.entity.clone(), i))
            .collect();
        Self { nodes, index }
    }

    /// Resolution record for a child, if it has a parent.
    pub fn get(&self, key: &K) -> Option<&ResolvedNode<K>> {
        self.index.get(key).map(|&i| &self.nodes[i])
    }

    /// Root of `key`, or `key` itself when it has no parent.
    pub fn root_of<'a>(&'a self, key: &'a K) -> &'a K {
        self.get(key).map(|n| &n.root).unwrap_or(key)
    }

    /// Depth of `key`, 0 when it has no parent.
    pub fn depth_of(&self, key: &K) -> usize {
        self.get(key).map(|n| n.depth).unwrap_or(0)
    }

    /// Returns `true` when `key` appears as a child.
    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// All resolved child nodes, in edge order.
    pub fn iter(&self) -> impl Iterator<Item = &ResolvedNode<K>> {
        self.nodes.iter()
    }

    /// Number of resolved children.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` when nothing was resolved.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges(pairs: &[(&str, &str)]) -> Vec<(Option<String>, Option<String>)> {
        pairs
            .iter()
            .map(|(c, p)| (Some(c.to_string()), Some(p.to_string())))
            .collect()
    }

    #[test]
    fn test_linear_chain() {
        let graph = HierarchyGraph::from_edges(edges(&[("C", "B"), ("B", "A")]));
        let lookup = graph.resolve(10);

        let c = lookup.get(&"C".to_string()).unwrap();
        assert_eq!(c.root, "A");
        assert_eq!(c.depth, 2);
        assert!(!c.cycle);

        let a = "A".to_string();
        assert_eq!(lookup.root_of(&a), "A");
        assert_eq!(lookup.depth_of(&a), 0);
        assert!(!lookup.contains(&a));
    }

    #[test]
    fn test_cycle_terminates() {
        let graph = HierarchyGraph::from_edges(edges(&[("A", "B"), ("B", "C"), ("C", "A")]));
        let lookup = graph.resolve(10);

        assert_eq!(lookup.len(), 3);
        for node in lookup.iter() {
            assert!(node.cycle);
            assert_eq!(node.depth, 2);
            assert_ne!(node.root, node.entity);
        }
        assert_eq!(lookup.get(&"A".to_string()).unwrap().root, "C");
    }

    #[test]
    fn test_self_loop() {
        let graph = HierarchyGraph::from_edges(edges(&[("A", "A")]));
        let node = graph.resolve(10).get(&"A".to_string()).cloned().unwrap();
        assert_eq!(node.root, "A");
        assert_eq!(node.depth, 0);
        assert!(node.cycle);
    }

    #[test]
    fn test_depth_cap_truncates() {
        let graph = HierarchyGraph::from_edges(edges(&[("D", "C"), ("C", "B"), ("B", "A")]));
        let node = graph.resolve(2).get(&"D".to_string()).cloned().unwrap();
        assert_eq!(node.root, "B");
        assert_eq!(node.depth, 2);
        assert!(node.truncated);
        assert!(!node.cycle);
    }

    #[test]
    fn test_null_edges_dropped() {
        let graph = HierarchyGraph::from_edges(vec![
            (Some("A".to_string()), None),
            (None, Some("B".to_string())),
            (Some("C".to_string()), Some("D".to_string())),
        ]);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_first_parent_wins() {
        let graph = HierarchyGraph::from_edges(edges(&[("A", "P1"), ("A", "P2"), ("A", "P1")]));
        assert_eq!(graph.parent_of(&"A".to_string()), Some(&"P1".to_string()));
        assert_eq!(graph.conflicts().len(), 1);
        assert_eq!(graph.conflicts()[0].ignored_parent, "P2");
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let pairs: Vec<(String, String)> = (1..500)
            .map(|i| (format!("N{}", i), format!("N{}", i / 2)))
            .collect();
        let graph = HierarchyGraph::from_edges(
            pairs
                .iter()
                .map(|(c, p)| (Some(c.clone()), Some(p.clone()))),
        );
        let seq = graph.resolve(20);
        let par = graph.resolve_with(20, &ParallelConfig::new(16, 1));
        assert_eq!(seq.nodes, par.nodes);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(200))]

            #[test]
            fn test_resolution_terminates_within_cap(
                raw in prop::collection::vec((0u8..20, 0u8..20), 0..60),
                max_depth in 1usize..12,
            ) {
                let graph = HierarchyGraph::from_edges(
                    raw.iter().map(|(c, p)| (Some(*c), Some(*p))),
                );
                let lookup = graph.resolve(max_depth);
                for node in lookup.iter() {
                    prop_assert!(node.depth <= max_depth);
                }
                prop_assert_eq!(lookup.len(), graph.edge_count());
            }
        }
    }
}
