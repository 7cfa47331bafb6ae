// src/resolver/mod.rs

//! Dependency closure over the catalog graph
//!
//! Dependencies are plain identifiers; there is no version selection. The
//! closure of a set of roots is the roots plus everything reachable through
//! dependency edges. Identifiers the catalog does not know are kept as
//! leaves: they might be installed by hand or removed from the catalog, and
//! neither case should sink the whole computation.

use crate::catalog::{Catalog, ComponentId};
use std::collections::{BTreeSet, HashSet};

/// Compute the transitive dependency closure of `roots`
///
/// Uses an explicit worklist with a visited guard, so cycles terminate and
/// each identifier is expanded at most once. O(V + E) over the subgraph
/// reachable from `roots`.
pub fn compute_closure<C, I, S>(roots: I, catalog: &C) -> BTreeSet<ComponentId>
where
    C: Catalog + ?Sized,
    I: IntoIterator<Item = S>,
    S: Into<ComponentId>,
{
    let mut visited: HashSet<ComponentId> = HashSet::new();
    let mut worklist: Vec<ComponentId> = Vec::new();

    for root in roots {
        let root = root.into();
        if visited.insert(root.clone()) {
            worklist.push(root);
        }
    }

    while let Some(id) = worklist.pop() {
        let Some(descriptor) = catalog.lookup(&id) else {
            tracing::trace!("{} not in catalog, treating as leaf", id);
            continue;
        };

        for dep in descriptor.dependencies {
            if visited.insert(dep.clone()) {
                worklist.push(dep);
            }
        }
    }

    visited.into_iter().collect()
}

/// Dependencies in the closure of `id` (excluding `id`) that the catalog knows
/// and that `is_present` reports missing
pub fn missing_dependencies<C, F>(id: &str, catalog: &C, is_present: F) -> Vec<ComponentId>
where
    C: Catalog + ?Sized,
    F: Fn(&str) -> bool,
{
    compute_closure([id], catalog)
        .into_iter()
        .filter(|dep| dep != id && catalog.contains(dep) && !is_present(dep.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ComponentDescriptor, MemoryCatalog};

    fn set(items: &[&str]) -> BTreeSet<ComponentId> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_closure_chain() {
        let catalog = MemoryCatalog::new()
            .with(ComponentDescriptor::new("A").with_dependencies(["B"]))
            .with(ComponentDescriptor::new("B").with_dependencies(["C"]))
            .with(ComponentDescriptor::new("C"));

        assert_eq!(compute_closure(["A"], &catalog), set(&["A", "B", "C"]));
        assert_eq!(compute_closure(["B"], &catalog), set(&["B", "C"]));
    }

    #[test]
    fn test_closure_cycle_terminates() {
        let catalog = MemoryCatalog::new()
            .with(ComponentDescriptor::new("A").with_dependencies(["B"]))
            .with(ComponentDescriptor::new("B").with_dependencies(["A"]));

        assert_eq!(compute_closure(["A"], &catalog), set(&["A", "B"]));
    }

    #[test]
    fn test_closure_self_loop() {
        let catalog =
            MemoryCatalog::new().with(ComponentDescriptor::new("A").with_dependencies(["A"]));

        assert_eq!(compute_closure(["A"], &catalog), set(&["A"]));
    }

    #[test]
    fn test_closure_unknown_is_leaf() {
        let catalog = MemoryCatalog::new()
            .with(ComponentDescriptor::new("A").with_dependencies(["ghost"]));

        assert_eq!(compute_closure(["A"], &catalog), set(&["A", "ghost"]));
        assert_eq!(compute_closure(["ghost"], &catalog), set(&["ghost"]));
    }

    #[test]
    fn test_closure_diamond_and_multiple_roots() {
        let catalog = MemoryCatalog::new()
            .with(ComponentDescriptor::new("A").with_dependencies(["B", "C"]))
            .with(ComponentDescriptor::new("B").with_dependencies(["D"]))
            .with(ComponentDescriptor::new("C").with_dependencies(["D"]))
            .with(ComponentDescriptor::new("D"))
            .with(ComponentDescriptor::new("E"));

        assert_eq!(
            compute_closure(["A", "E"], &catalog),
            set(&["A", "B", "C", "D", "E"])
        );
    }

    #[test]
    fn test_closure_empty_roots() {
        let catalog = MemoryCatalog::new();
        assert!(compute_closure(Vec::<String>::new(), &catalog).is_empty());
    }

    #[test]
    fn test_closure_long_chain_no_recursion_limit() {
        let mut catalog = MemoryCatalog::new();
        for i in 0..50_000 {
            catalog.insert(
                ComponentDescriptor::new(format!("c{}", i))
                    .with_dependencies([format!("c{}", i + 1)]),
            );
        }

        assert_eq!(compute_closure(["c0"], &catalog).len(), 50_001);
    }

    #[test]
    fn test_missing_dependencies() {
        let catalog = MemoryCatalog::new()
            .with(ComponentDescriptor::new("A").with_dependencies(["B", "ghost"]))
            .with(ComponentDescriptor::new("B").with_dependencies(["C"]))
            .with(ComponentDescriptor::new("C"));

        let missing = missing_dependencies("A", &catalog, |id| id == "B");
        assert_eq!(missing, vec!["C".to_string()]);
    }
}
