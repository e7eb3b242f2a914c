//! Import graph using petgraph::StableDiGraph keyed by source path
//!
//! An edge `a -> b` means `a` imports `b`. Dependents of a file are the
//! sources of its incoming edges.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;

/// The dependency graph of the current program.
pub struct DependencyGraph {
    inner: StableDiGraph<PathBuf, ()>,
    index: HashMap<PathBuf, NodeIndex>,
}

impl std::fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("file_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .finish()
    }
}

impl DependencyGraph {
    pub fn new() -> Self {
        DependencyGraph {
            inner: StableDiGraph::new(),
            index: HashMap::new(),
        }
    }

    fn ensure_node(&mut self, path: &Path) -> NodeIndex {
        if let Some(&idx) = self.index.get(path) {
            return idx;
        }
        let idx = self.inner.add_node(path.to_path_buf());
        self.index.insert(path.to_path_buf(), idx);
        idx
    }

    /// Add a file without edges. No-op if already present.
    pub fn add_file(&mut self, path: &Path) {
        self.ensure_node(path);
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.index.contains_key(path)
    }

    /// Total number of files.
    pub fn file_count(&self) -> usize {
        self.inner.node_count()
    }

    /// Total number of import edges.
    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Replace the outgoing import edges of `file`.
    pub fn set_imports<I>(&mut self, file: &Path, imports: I)
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let source = self.ensure_node(file);
        let stale: Vec<_> = self
            .inner
            .edges_directed(source, Direction::Outgoing)
            .map(|edge_ref| edge_ref.id())
            .collect();
        for edge in stale {
            self.inner.remove_edge(edge);
        }
        for target_path in imports {
            let target = self.ensure_node(&target_path);
            self.inner.update_edge(source, target, ());
        }
    }

    /// Files directly imported by `file`.
    pub fn imports_of(&self, file: &Path) -> BTreeSet<PathBuf> {
        self.neighbors(file, Direction::Outgoing)
    }

    /// Files that directly import `file`.
    pub fn dependents_of(&self, file: &Path) -> BTreeSet<PathBuf> {
        self.neighbors(file, Direction::Incoming)
    }

    fn neighbors(&self, file: &Path, direction: Direction) -> BTreeSet<PathBuf> {
        let Some(&idx) = self.index.get(file) else {
            return BTreeSet::new();
        };
        self.inner
            .neighbors_directed(idx, direction)
            .filter_map(|n| self.inner.node_weight(n).cloned())
            .collect()
    }

    /// All files that import any of `seeds`, directly or transitively.
    /// Seeds are only included when reached through an import chain.
    pub fn transitive_dependents(&self, seeds: &BTreeSet<PathBuf>) -> BTreeSet<PathBuf> {
        let mut found = BTreeSet::new();
        let mut to_visit: Vec<NodeIndex> = seeds
            .iter()
            .filter_map(|path| self.index.get(path).copied())
            .collect();

        while let Some(current) = to_visit.pop() {
            for importer in self.inner.neighbors_directed(current, Direction::Incoming) {
                if let Some(path) = self.inner.node_weight(importer) {
                    if found.insert(path.clone()) {
                        to_visit.push(importer);
                    }
                }
            }
        }

        found
    }

    /// Remove a file and all its edges.
    pub fn remove_file(&mut self, path: &Path) -> bool {
        match self.index.remove(path) {
            Some(idx) => self.inner.remove_node(idx).is_some(),
            None => false,
        }
    }

    /// Iterate over all files.
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.inner
            .node_indices()
            .filter_map(move |idx| self.inner.node_weight(idx).map(PathBuf::as_path))
    }

    /// Import cycles, each sorted, in sorted order.
    pub fn import_cycles(&self) -> Vec<Vec<PathBuf>> {
        let mut cycles: Vec<Vec<PathBuf>> = tarjan_scc(&self.inner)
            .into_iter()
            .filter(|scc| scc.len() > 1 || self.inner.find_edge(scc[0], scc[0]).is_some())
            .map(|scc| {
                let mut members: Vec<PathBuf> = scc
                    .into_iter()
                    .filter_map(|idx| self.inner.node_weight(idx).cloned())
                    .collect();
                members.sort();
                members
            })
            .collect();
        cycles.sort();
        cycles
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(name: &str) -> PathBuf {
        PathBuf::from(format!("/pkg/src/{}", name))
    }

    fn set(names: &[&str]) -> BTreeSet<PathBuf> {
        names.iter().map(|n| p(n)).collect()
    }

    #[test]
    fn test_set_imports_replaces_edges() {
        let mut graph = DependencyGraph::new();
        graph.set_imports(&p("a.ts"), vec![p("b.ts"), p("c.ts")]);
        assert_eq!(graph.edge_count(), 2);

        graph.set_imports(&p("a.ts"), vec![p("c.ts")]);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.imports_of(&p("a.ts")), set(&["c.ts"]));
        assert!(graph.dependents_of(&p("b.ts")).is_empty());
    }

    #[test]
    fn test_duplicate_imports_collapse() {
        let mut graph = DependencyGraph::new();
        graph.set_imports(&p("a.ts"), vec![p("b.ts"), p("b.ts")]);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_transitive_dependents() {
        let mut graph = DependencyGraph::new();
        graph.set_imports(&p("a.ts"), vec![p("b.ts")]);
        graph.set_imports(&p("b.ts"), vec![p("c.ts")]);
        graph.set_imports(&p("d.ts"), vec![]);

        assert_eq!(graph.transitive_dependents(&set(&["c.ts"])), set(&["a.ts", "b.ts"]));
        assert!(graph.transitive_dependents(&set(&["a.ts"])).is_empty());
        assert!(graph.transitive_dependents(&set(&["missing.ts"])).is_empty());
    }

    #[test]
    fn test_remove_file_drops_edges() {
        let mut graph = DependencyGraph::new();
        graph.set_imports(&p("a.ts"), vec![p("b.ts")]);
        assert!(graph.remove_file(&p("b.ts")));
        assert!(!graph.contains(&p("b.ts")));
        assert_eq!(graph.edge_count(), 0);
        assert!(!graph.remove_file(&p("b.ts")));
    }

    #[test]
    fn test_import_cycles() {
        let mut graph = DependencyGraph::new();
        graph.set_imports(&p("a.ts"), vec![p("b.ts")]);
        graph.set_imports(&p("b.ts"), vec![p("a.ts")]);
        graph.set_imports(&p("c.ts"), vec![p("c.ts")]);
        graph.set_imports(&p("d.ts"), vec![p("a.ts")]);

        let cycles = graph.import_cycles();
        assert_eq!(cycles, vec![vec![p("a.ts"), p("b.ts")], vec![p("c.ts")]]);
    }
}
