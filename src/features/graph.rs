//! Feature dependency graph utilities.

use std::collections::BTreeSet;

/// Order nodes so that every node comes after the nodes it requires, using
/// Kahn's algorithm.
///
/// `requires[i]` lists the indices node `i` depends on; out-of-range indices
/// are ignored. Among nodes that become ready at the same time the lowest
/// index is emitted first, so declaration order is preserved for
/// independent nodes.
///
/// # Errors
///
/// Returns the sorted indices of every node that could not be ordered when
/// the graph contains a cycle.
pub fn topological_order(requires: &[Vec<usize>]) -> Result<Vec<usize>, Vec<usize>> {
    let len = requires.len();

    let mut in_degree: Vec<usize> = requires
        .iter()
        .map(|deps| deps.iter().filter(|&&d| d < len).count())
        .collect();

    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); len];
    for (i, deps) in requires.iter().enumerate() {
        for &dep in deps {
            if let Some(rd) = dependents.get_mut(dep) {
                rd.push(i);
            }
        }
    }

    let mut ready: BTreeSet<usize> = in_degree
        .iter()
        .enumerate()
        .filter_map(|(i, &d)| (d == 0).then_some(i))
        .collect();
    let mut order = Vec::with_capacity(len);

    while let Some(idx) = ready.pop_first() {
        order.push(idx);
        if let Some(deps) = dependents.get(idx) {
            for &dep in deps {
                if let Some(count) = in_degree.get_mut(dep) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(dep);
                    }
                }
            }
        }
    }

    if order.len() == len {
        Ok(order)
    } else {
        let placed: BTreeSet<usize> = order.into_iter().collect();
        Err((0..len).filter(|i| !placed.contains(i)).collect())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // topological_order
    // -----------------------------------------------------------------------

    #[test]
    fn independent_nodes_keep_declaration_order() {
        let graph = vec![vec![], vec![], vec![]];
        assert_eq!(topological_order(&graph).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn chain_declared_backwards_is_reversed() {
        // 0 -> 1 -> 2
        let graph = vec![vec![1], vec![2], vec![]];
        assert_eq!(topological_order(&graph).unwrap(), vec![2, 1, 0]);
    }

    #[test]
    fn diamond_orders_root_first_and_sink_last() {
        // 3 requires 1 and 2, both require 0
        let graph = vec![vec![], vec![0], vec![0], vec![1, 2]];
        assert_eq!(topological_order(&graph).unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn out_of_range_requirements_are_ignored() {
        let graph = vec![vec![7]];
        assert_eq!(topological_order(&graph).unwrap(), vec![0]);
    }

    #[test]
    fn cycle_reports_remaining_nodes() {
        // 0 is free, 1 <-> 2 cycle, 3 depends on the cycle
        let graph = vec![vec![], vec![2], vec![1], vec![1]];
        assert_eq!(topological_order(&graph).unwrap_err(), vec![1, 2, 3]);
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let graph = vec![vec![0]];
        assert_eq!(topological_order(&graph).unwrap_err(), vec![0]);
    }

    #[test]
    fn empty_graph_has_empty_order() {
        assert!(topological_order(&[]).unwrap().is_empty());
    }
}
