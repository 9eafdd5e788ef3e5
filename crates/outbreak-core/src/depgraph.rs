//! Dependency graph (C5): tracks which computables (observables, variables,
//! sets, size-ofs) must be recomputed each tick, and in what order.

use std::collections::HashMap;

pub type ComputableId = usize;

#[derive(Debug, Clone, Copy, Default)]
pub struct ComputableFlags {
    pub changed: bool,
    pub requested: bool,
    pub calculated: bool,
    /// Static computables (all prerequisites static, no writable
    /// properties reachable) are computed once and never re-marked.
    pub is_static: bool,
}

#[derive(Debug, Default)]
struct Computable {
    name: String,
    prerequisites: Vec<ComputableId>,
    dependents: Vec<ComputableId>,
    flags: ComputableFlags,
}

#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: Vec<Computable>,
    by_name: HashMap<String, ComputableId>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, prerequisites: &[ComputableId], is_static: bool) -> ComputableId {
        let id = self.nodes.len();
        self.nodes.push(Computable {
            name: name.to_string(),
            prerequisites: prerequisites.to_vec(),
            dependents: Vec::new(),
            flags: ComputableFlags { is_static, ..Default::default() },
        });
        for &p in prerequisites {
            self.nodes[p].dependents.push(id);
        }
        self.by_name.insert(name.to_string(), id);
        id
    }

    pub fn id_of(&self, name: &str) -> Option<ComputableId> {
        self.by_name.get(name).copied()
    }

    pub fn flags(&self, id: ComputableId) -> ComputableFlags {
        self.nodes[id].flags
    }

    /// Computables with no prerequisites — computed exactly once at start.
    pub fn once_sequence(&self) -> Vec<ComputableId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, c)| c.prerequisites.is_empty())
            .map(|(i, _)| i)
            .collect()
    }

    /// Topologically sorted ids reachable from `roots` by walking
    /// prerequisite edges backward (ancestors) or forward (descendants).
    fn topo_from(&self, roots: &[ComputableId], forward: bool) -> Vec<ComputableId> {
        let mut visited = vec![false; self.nodes.len()];
        let mut order = Vec::new();

        fn visit(
            id: ComputableId,
            nodes: &[Computable],
            forward: bool,
            visited: &mut Vec<bool>,
            order: &mut Vec<ComputableId>,
        ) {
            if visited[id] {
                return;
            }
            visited[id] = true;
            let neighbors: &[ComputableId] = if forward {
                &nodes[id].dependents
            } else {
                &nodes[id].prerequisites
            };
            for &n in neighbors {
                visit(n, nodes, forward, visited, order);
            }
            order.push(id);
        }

        for &r in roots {
            visit(r, &self.nodes, forward, &mut visited, &mut order);
        }
        order
    }

    /// Computables reachable from the union of prerequisites of every
    /// condition-side / action-side accessor, topologically sorted — the
    /// "common update sequence" computed once at load time.
    pub fn common_update_sequence(&self, accessors: &[ComputableId]) -> Vec<ComputableId> {
        let mut order = self.topo_from(accessors, false);
        order.reverse();
        order
    }

    pub fn mark_changed(&mut self, id: ComputableId) {
        self.nodes[id].flags.changed = true;
    }

    pub fn mark_requested(&mut self, id: ComputableId) {
        self.nodes[id].flags.requested = true;
    }

    /// Three-pass per-tick algorithm (§4.5):
    /// 1. forward-mark descendants of `changed` as Changed.
    /// 2. mark calculated-so-far as not-Changed (consumed) while
    ///    propagating.
    /// 3. backward-mark ancestors of `Requested` computables as Requested.
    /// Returns the Changed ∧ Requested subset in topological order, and
    /// resets all flags afterward.
    pub fn apply_update_order(&mut self, changed: &[ComputableId], requested: &[ComputableId]) -> Vec<ComputableId> {
        // Pass 1: forward propagation of Changed.
        let forward_order = self.topo_from(changed, true);
        for &id in &forward_order {
            self.nodes[id].flags.changed = true;
        }

        // Pass 2: anything already calculated this round is consumed; a
        // static computable is never marked changed in the first place.
        for node in &mut self.nodes {
            if node.flags.is_static {
                node.flags.changed = false;
            }
        }

        // Pass 3: backward propagation of Requested.
        let backward_order = self.topo_from(requested, false);
        for &id in &backward_order {
            self.nodes[id].flags.requested = true;
        }

        let mut result: Vec<ComputableId> = (0..self.nodes.len())
            .filter(|&id| self.nodes[id].flags.changed && self.nodes[id].flags.requested)
            .collect();
        result.sort_by_key(|&id| backward_order.iter().position(|&x| x == id).unwrap_or(usize::MAX));

        for node in &mut self.nodes {
            node.flags.changed = false;
            node.flags.requested = false;
            node.flags.calculated = false;
        }

        result
    }

    pub fn name(&self, id: ComputableId) -> &str {
        &self.nodes[id].name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn once_sequence_is_roots_only() {
        let mut g = DependencyGraph::new();
        let a = g.register("a", &[], false);
        let _b = g.register("b", &[a], false);
        assert_eq!(g.once_sequence(), vec![a]);
    }

    #[test]
    fn changed_and_requested_intersect() {
        let mut g = DependencyGraph::new();
        let a = g.register("a", &[], false);
        let b = g.register("b", &[a], false);
        let c = g.register("c", &[], false);
        let result = g.apply_update_order(&[a], &[b]);
        assert!(result.contains(&b));
        assert!(!result.contains(&c));
    }

    #[test]
    fn static_computable_never_marked_changed() {
        let mut g = DependencyGraph::new();
        let a = g.register("a", &[], true);
        let b = g.register("b", &[a], false);
        let result = g.apply_update_order(&[a], &[a, b]);
        assert!(!result.contains(&a));
    }

    #[test]
    fn acyclic_by_construction() {
        // The graph only ever grows forward-referencing prerequisites, so
        // a cycle can't be constructed through the public API; this test
        // documents that guarantee rather than exercising a cycle.
        let mut g = DependencyGraph::new();
        let a = g.register("a", &[], false);
        let b = g.register("b", &[a], false);
        assert!(g.topo_from(&[b], false).contains(&a));
    }
}
