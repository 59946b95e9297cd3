//! Module dependency graph: import edges between module names, cycle
//! detection, and compilation ordering, `spec.md` section 4.1.
//!
//! Grounded on the same dense-entity-reference discipline the rest of the
//! workspace uses (`sixtyc-entity`), but keyed by module name rather than
//! a numeric id -- module names come from import statements and are
//! known up front, so a name-keyed adjacency map (in the style of
//! `cranelift-wasm`'s module-index bookkeeping, generalized from
//! numeric wasm module indices to source-level dotted names) is simpler
//! than introducing a dedicated entity type for a graph this small.

use rustc_hash::FxHashMap;
use sixtyc_diagnostics::Span;

/// A module-to-module import edge: the location of the `import` that
/// created it, for diagnostics.
#[derive(Debug, Clone)]
struct Edge {
    to: String,
    location: Span,
}

/// A cycle found by [`ModuleGraph::detect_cycles`]: the sequence of
/// module names forming the cycle (first and last equal, closing the
/// loop) and the location of the edge that closed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleInfo {
    /// Module names in the cycle, in edge order, with the first module
    /// repeated at the end to make the loop explicit.
    pub cycle: Vec<String>,
    /// Source location of the edge that closed the cycle.
    pub location: Span,
}

/// Directed graph of module names, `spec.md` section 3 ("Module graph").
#[derive(Debug, Default)]
pub struct ModuleGraph {
    nodes: FxHashMap<String, Vec<Edge>>,
    // Insertion order of nodes, preserved so `topologicalOrder` output is
    // deterministic rather than hash-order-dependent.
    order: Vec<String>,
}

impl ModuleGraph {
    /// An empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node for `name` if it doesn't already exist. Idempotent.
    pub fn add_node(&mut self, name: &str) {
        if !self.nodes.contains_key(name) {
            self.nodes.insert(name.to_string(), Vec::new());
            self.order.push(name.to_string());
        }
    }

    /// Add an edge `from -> to` (an import), creating either endpoint
    /// node if needed. If an edge to the same `to` already exists from
    /// `from`, its location is overwritten (idempotent on the edge's
    /// existence, not its recorded location), per `spec.md` section 4.1.
    pub fn add_edge(&mut self, from: &str, to: &str, location: Span) {
        self.add_node(from);
        self.add_node(to);
        let edges = self.nodes.get_mut(from).unwrap();
        if let Some(existing) = edges.iter_mut().find(|e| e.to == to) {
            existing.location = location;
        } else {
            edges.push(Edge {
                to: to.to_string(),
                location,
            });
        }
    }

    /// Modules that `name` directly imports from.
    pub fn dependencies(&self, name: &str) -> Vec<&str> {
        self.nodes
            .get(name)
            .map(|edges| edges.iter().map(|e| e.to.as_str()).collect())
            .unwrap_or_default()
    }

    /// Modules that directly import from `name`.
    pub fn dependents(&self, name: &str) -> Vec<&str> {
        self.order
            .iter()
            .filter(|m| {
                self.nodes
                    .get(m.as_str())
                    .is_some_and(|edges| edges.iter().any(|e| e.to == name))
            })
            .map(|s| s.as_str())
            .collect()
    }

    /// Find every cycle in the graph via an iterative depth-first search
    /// that tracks the current path stack; encountering a node already on
    /// the path emits a cycle consisting of the path slice from that node
    /// plus the closing node, per `spec.md` section 4.1. Self-loops
    /// (`a -> a`) are reported. Non-fatal to the detector itself: every
    /// cycle is reported, then the function returns (`spec.md` "Failure
    /// semantics").
    pub fn detect_cycles(&self) -> Vec<CycleInfo> {
        let mut cycles = Vec::new();
        let mut visited: FxHashMap<&str, VisitState> = FxHashMap::default();

        enum Frame<'a> {
            Enter(&'a str),
            Leave(&'a str),
        }

        for start in &self.order {
            if visited.get(start.as_str()).is_some() {
                continue;
            }
            let mut path: Vec<&str> = Vec::new();
            let mut stack = vec![Frame::Enter(start.as_str())];
            while let Some(frame) = stack.pop() {
                match frame {
                    Frame::Enter(node) => {
                        match visited.get(node) {
                            Some(VisitState::Done) => continue,
                            Some(VisitState::OnPath) => continue, // handled below via edge scan
                            None => {}
                        }
                        visited.insert(node, VisitState::OnPath);
                        path.push(node);
                        stack.push(Frame::Leave(node));
                        if let Some(edges) = self.nodes.get(node) {
                            for edge in edges {
                                match visited.get(edge.to.as_str()) {
                                    Some(VisitState::OnPath) => {
                                        let start_idx =
                                            path.iter().position(|&n| n == edge.to).unwrap_or(0);
                                        let mut cycle: Vec<String> =
                                            path[start_idx..].iter().map(|s| s.to_string()).collect();
                                        cycle.push(edge.to.clone());
                                        cycles.push(CycleInfo {
                                            cycle,
                                            location: edge.location.clone(),
                                        });
                                    }
                                    Some(VisitState::Done) => {}
                                    None => stack.push(Frame::Enter(edge.to.as_str())),
                                }
                            }
                        }
                    }
                    Frame::Leave(node) => {
                        visited.insert(node, VisitState::Done);
                        path.pop();
                    }
                }
            }
        }
        cycles
    }

    /// A topological order of module names: nodes with no incoming edges
    /// first, every edge pointing from an earlier to a later position.
    /// Disconnected nodes are included. Uses Kahn's algorithm; ties are
    /// broken by insertion order for determinism. If the graph has a
    /// cycle, the returned order is best-effort (nodes in the cycle are
    /// appended at the end in insertion order) -- callers must check
    /// [`ModuleGraph::detect_cycles`] first, per `spec.md` section 8
    /// ("`detectCycles() = [] iff topologicalOrder` yields every node
    /// exactly once...").
    pub fn topological_order(&self) -> Vec<String> {
        let mut in_degree: FxHashMap<&str, usize> =
            self.order.iter().map(|n| (n.as_str(), 0)).collect();
        for edges in self.nodes.values() {
            for edge in edges {
                *in_degree.get_mut(edge.to.as_str()).unwrap() += 1;
            }
        }

        let mut ready: Vec<&str> = self
            .order
            .iter()
            .map(|s| s.as_str())
            .filter(|n| in_degree[n] == 0)
            .collect();
        let mut result = Vec::with_capacity(self.order.len());
        let mut visited: FxHashMap<&str, bool> = FxHashMap::default();

        while !ready.is_empty() {
            ready.sort_by_key(|n| self.order.iter().position(|m| m == n).unwrap());
            let node = ready.remove(0);
            if visited.get(node).copied().unwrap_or(false) {
                continue;
            }
            visited.insert(node, true);
            result.push(node.to_string());
            if let Some(edges) = self.nodes.get(node) {
                for edge in edges {
                    let deg = in_degree.get_mut(edge.to.as_str()).unwrap();
                    *deg -= 1;
                    if *deg == 0 {
                        ready.push(edge.to.as_str());
                    }
                }
            }
        }

        // Any node not reached is part of a cycle (or downstream of one);
        // append in insertion order so every node still appears exactly
        // once, as the property in spec.md section 8 requires even when
        // a cycle makes strict ordering impossible.
        for node in &self.order {
            if !visited.get(node.as_str()).copied().unwrap_or(false) {
                result.push(node.clone());
            }
        }
        result
    }

    /// Leaf modules (no outgoing edges) first, so dependencies compile
    /// before dependents. Exactly the reverse of [`Self::topological_order`],
    /// per `spec.md` section 8.
    pub fn compilation_order(&self) -> Vec<String> {
        let mut order = self.topological_order();
        order.reverse();
        order
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    OnPath,
    Done,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acyclic_graph_has_no_cycles_and_valid_topo_order() {
        let mut g = ModuleGraph::new();
        g.add_edge("a", "b", Span::synthetic());
        g.add_edge("b", "c", Span::synthetic());
        assert!(g.detect_cycles().is_empty());
        let order = g.topological_order();
        let pos = |n: &str| order.iter().position(|m| m == n).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("b") < pos("c"));
    }

    #[test]
    fn compilation_order_is_exact_reverse_of_topo_order() {
        let mut g = ModuleGraph::new();
        g.add_edge("app", "lib", Span::synthetic());
        g.add_node("unrelated");
        let topo = g.topological_order();
        let mut rev = topo.clone();
        rev.reverse();
        assert_eq!(g.compilation_order(), rev);
    }

    #[test]
    fn two_cycle_is_detected_with_both_modules() {
        let mut g = ModuleGraph::new();
        g.add_edge("a", "b", Span::synthetic());
        g.add_edge("b", "a", Span::synthetic());
        let cycles = g.detect_cycles();
        assert_eq!(cycles.len(), 1);
        assert!(cycles[0].cycle.contains(&"a".to_string()));
        assert!(cycles[0].cycle.contains(&"b".to_string()));
    }

    #[test]
    fn self_loop_is_detected() {
        let mut g = ModuleGraph::new();
        g.add_edge("a", "a", Span::synthetic());
        let cycles = g.detect_cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].cycle, vec!["a".to_string(), "a".to_string()]);
    }

    #[test]
    fn disconnected_nodes_are_included_in_topo_order() {
        let mut g = ModuleGraph::new();
        g.add_edge("a", "b", Span::synthetic());
        g.add_node("standalone");
        let order = g.topological_order();
        assert_eq!(order.len(), 3);
        assert!(order.contains(&"standalone".to_string()));
    }
}
