//! Dependency graph over step ids.

use crate::errors::CycleDetectedError;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Adjacency map `id -> dependencies`, remembering declaration order.
///
/// Ids referenced as dependencies but never declared are ignored; the
/// validator rejects such documents before a graph is used for scheduling.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    order: Vec<String>,
    edges: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Builds a graph from `(id, depends_on)` pairs in declaration order.
    pub fn new<'a, I>(steps: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a [String])>,
    {
        let mut graph = Self::default();
        for (id, deps) in steps {
            if graph.edges.contains_key(id) {
                continue;
            }
            graph.order.push(id.to_string());
            graph.edges.insert(id.to_string(), deps.to_vec());
        }
        graph
    }

    /// Returns the ids in declaration order.
    #[must_use]
    pub fn ids(&self) -> &[String] {
        &self.order
    }

    /// Returns the declared dependencies of `id`.
    #[must_use]
    pub fn dependencies(&self, id: &str) -> &[String] {
        self.edges.get(id).map_or(&[], Vec::as_slice)
    }

    /// Returns the steps that list `id` as a direct dependency.
    #[must_use]
    pub fn dependents(&self, id: &str) -> Vec<String> {
        self.order
            .iter()
            .filter(|other| self.dependencies(other).iter().any(|d| d == id))
            .cloned()
            .collect()
    }

    /// Returns every step that transitively depends on `id`.
    #[must_use]
    pub fn descendants(&self, id: &str) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            for child in self.dependents(&current) {
                if found.insert(child.clone()) {
                    stack.push(child);
                }
            }
        }
        found
    }

    /// Looks for a cycle with a depth-first walk in declaration order.
    ///
    /// # Errors
    ///
    /// Returns the first cycle found. Its path starts and ends with the same
    /// id and every consecutive pair is a dependency edge.
    pub fn detect_cycle(&self) -> Result<(), CycleDetectedError> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        for id in &self.order {
            if !visited.contains(id.as_str()) {
                if let Some(cycle) = self.dfs_cycle(id, &mut visited, &mut rec_stack, &mut path) {
                    return Err(CycleDetectedError::new(cycle));
                }
            }
        }
        Ok(())
    }

    fn dfs_cycle<'a>(
        &'a self,
        node: &'a str,
        visited: &mut HashSet<&'a str>,
        rec_stack: &mut HashSet<&'a str>,
        path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        visited.insert(node);
        rec_stack.insert(node);
        path.push(node);

        for dep in self.dependencies(node) {
            if !self.edges.contains_key(dep) {
                continue;
            }
            if rec_stack.contains(dep.as_str()) {
                let start = path.iter().position(|n| *n == dep.as_str())?;
                let mut cycle: Vec<String> = path[start..].iter().map(ToString::to_string).collect();
                cycle.push(dep.clone());
                return Some(cycle);
            }
            if !visited.contains(dep.as_str()) {
                if let Some(cycle) = self.dfs_cycle(dep, visited, rec_stack, path) {
                    return Some(cycle);
                }
            }
        }

        path.pop();
        rec_stack.remove(node);
        None
    }

    /// Groups steps into levels by longest dependency chain from a root.
    ///
    /// Level 0 holds the steps without dependencies; every other step sits
    /// one level above its deepest dependency. Within a level, steps keep
    /// declaration order. The graph must be acyclic.
    #[must_use]
    pub fn levels(&self) -> Vec<Vec<String>> {
        let mut depth: HashMap<&str, usize> = HashMap::new();
        for id in &self.order {
            self.depth_of(id, &mut depth, &mut HashSet::new());
        }

        let mut levels: Vec<Vec<String>> = Vec::new();
        for id in &self.order {
            let level = depth.get(id.as_str()).copied().unwrap_or_default();
            if levels.len() <= level {
                levels.resize_with(level + 1, Vec::new);
            }
            levels[level].push(id.clone());
        }
        levels
    }

    fn depth_of<'a>(
        &'a self,
        id: &'a str,
        memo: &mut HashMap<&'a str, usize>,
        visiting: &mut HashSet<&'a str>,
    ) -> usize {
        if let Some(depth) = memo.get(id) {
            return *depth;
        }
        // Guards against cycles in graphs that skipped validation.
        if !visiting.insert(id) {
            return 0;
        }

        let depth = self
            .dependencies(id)
            .iter()
            .filter(|dep| self.edges.contains_key(dep.as_str()))
            .map(|dep| self.depth_of(dep, memo, visiting) + 1)
            .max()
            .unwrap_or(0);

        visiting.remove(id);
        memo.insert(id, depth);
        depth
    }

    /// Returns the level index of every step.
    #[must_use]
    pub fn level_index(&self) -> HashMap<String, usize> {
        self.levels()
            .into_iter()
            .enumerate()
            .flat_map(|(i, ids)| ids.into_iter().map(move |id| (id, i)))
            .collect()
    }

    /// Returns a dependency-respecting order, flattening the levels.
    #[must_use]
    pub fn topological_order(&self) -> Vec<String> {
        self.levels().into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(steps: &[(&str, &[&str])]) -> DependencyGraph {
        let owned: Vec<(String, Vec<String>)> = steps
            .iter()
            .map(|(id, deps)| ((*id).to_string(), deps.iter().map(|d| (*d).to_string()).collect()))
            .collect();
        DependencyGraph::new(owned.iter().map(|(id, deps)| (id.as_str(), deps.as_slice())))
    }

    fn assert_valid_cycle(g: &DependencyGraph, cycle: &[String]) {
        assert!(cycle.len() >= 2);
        assert_eq!(cycle.first(), cycle.last());
        for pair in cycle.windows(2) {
            assert!(
                g.dependencies(&pair[0]).contains(&pair[1]),
                "{} -> {} is not an edge",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_levels_diamond() {
        let g = graph(&[("a", &[]), ("b", &["a"]), ("c", &["a"]), ("d", &["b", "c"])]);
        assert_eq!(
            g.levels(),
            vec![vec!["a".to_string()], vec!["b".to_string(), "c".to_string()], vec!["d".to_string()]]
        );
    }

    #[test]
    fn test_levels_use_longest_path() {
        let g = graph(&[("a", &[]), ("b", &["a"]), ("c", &["b"]), ("d", &["a", "c"])]);
        let index = g.level_index();
        assert_eq!(index["d"], 3);
        for id in g.ids() {
            for dep in g.dependencies(id) {
                assert!(index[id] > index[dep]);
            }
        }
    }

    #[test]
    fn test_independent_roots_share_level_zero() {
        let g = graph(&[("x", &[]), ("y", &[]), ("z", &["y"])]);
        assert_eq!(g.levels()[0], vec!["x".to_string(), "y".to_string()]);
        assert_eq!(g.topological_order(), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_detects_two_node_cycle() {
        let g = graph(&[("a", &["b"]), ("b", &["a"])]);
        let err = g.detect_cycle().unwrap_err();
        assert_eq!(err.cycle_path, vec!["a", "b", "a"]);
        assert_valid_cycle(&g, &err.cycle_path);
    }

    #[test]
    fn test_detects_cycle_behind_acyclic_prefix() {
        let g = graph(&[("root", &[]), ("x", &["root", "z"]), ("y", &["x"]), ("z", &["y"])]);
        let err = g.detect_cycle().unwrap_err();
        assert_eq!(err.cycle_path, vec!["x", "z", "y", "x"]);
        assert_valid_cycle(&g, &err.cycle_path);
    }

    #[test]
    fn test_acyclic_graphs_pass() {
        let chains = [
            graph(&[("a", &[])]),
            graph(&[("a", &[]), ("b", &["a"]), ("c", &["b"])]),
            graph(&[("a", &[]), ("b", &["a"]), ("c", &["a"]), ("d", &["b", "c"])]),
        ];
        for g in &chains {
            assert!(g.detect_cycle().is_ok());
        }
    }

    #[test]
    fn test_every_ring_reports_a_valid_cycle() {
        for size in 2..7 {
            let ids: Vec<String> = (0..size).map(|i| format!("n{i}")).collect();
            let deps: Vec<Vec<String>> = (0..size).map(|i| vec![ids[(i + 1) % size].clone()]).collect();
            let g = DependencyGraph::new(ids.iter().map(String::as_str).zip(deps.iter().map(Vec::as_slice)));

            let err = g.detect_cycle().unwrap_err();
            assert_eq!(err.cycle_path.len(), size + 1);
            assert_valid_cycle(&g, &err.cycle_path);
        }
    }

    #[test]
    fn test_descendants_are_transitive() {
        let g = graph(&[("a", &[]), ("b", &["a"]), ("c", &["b"]), ("d", &[])]);
        let expected: BTreeSet<String> = ["b", "c"].iter().map(|s| (*s).to_string()).collect();
        assert_eq!(g.descendants("a"), expected);
        assert!(g.descendants("d").is_empty());
        assert_eq!(g.dependents("b"), vec!["c".to_string()]);
    }
}
