//! Arena-backed node/edge storage (§9 Design Notes: avoid cyclic ownership;
//! back-pointers become indices into flat vectors instead of `Rc`/`RefCell`
//! graphs).

use crate::value::TraitBits;

/// Dense index into [`Network::nodes`]. Distinct from a node's stable `id`
/// (which may be sparse or externally assigned); the index is what owning
/// threads use to partition work.
pub type NodeIndex = usize;
/// Dense index into [`Network::edges`].
pub type EdgeIndex = usize;

#[derive(Debug, Clone)]
pub struct Node {
    pub id: u64,
    pub health_state: u32,
    pub susceptibility_factor: f64,
    pub infectivity_factor: f64,
    pub susceptibility: f64,
    pub infectivity: f64,
    pub node_trait: TraitBits,
    /// Indices into `Network::edges` for edges whose target is this node.
    pub incoming: Vec<EdgeIndex>,
}

impl Node {
    pub fn new(id: u64, health_state: u32) -> Self {
        Node {
            id,
            health_state,
            susceptibility_factor: 1.0,
            infectivity_factor: 1.0,
            susceptibility: 0.0,
            infectivity: 0.0,
            node_trait: TraitBits::ZERO,
            incoming: Vec::new(),
        }
    }

    pub fn effective_susceptibility(&self) -> f64 {
        self.susceptibility * self.susceptibility_factor
    }

    pub fn effective_infectivity(&self) -> f64 {
        self.infectivity * self.infectivity_factor
    }
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub target_id: u64,
    pub source_id: u64,
    pub target_activity: TraitBits,
    pub source_activity: TraitBits,
    pub duration: f64,
    pub weight: f64,
    pub active: bool,
    pub edge_trait: TraitBits,
    pub target: NodeIndex,
    pub source: NodeIndex,
}

/// Owning arena for a single process's partition of the contact network.
/// Edges are stored sorted by target id (enforced by [`Network::finalize`]),
/// and an edge belongs to the process owning its target node. Cross-partition
/// edges are dropped at partition time (see `outbreak-cli`'s partitioner), so
/// every `Edge::source`/`target` here resolves within this same arena.
#[derive(Debug, Clone, Default)]
pub struct Network {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    /// id -> local index, for nodes owned by this process.
    local_index: std::collections::HashMap<u64, NodeIndex>,
}

impl Network {
    pub fn new() -> Self {
        Network::default()
    }

    pub fn add_node(&mut self, node: Node) -> NodeIndex {
        let idx = self.nodes.len();
        self.local_index.insert(node.id, idx);
        self.nodes.push(node);
        idx
    }

    pub fn node_index(&self, id: u64) -> Option<NodeIndex> {
        self.local_index.get(&id).copied()
    }

    pub fn add_edge(&mut self, edge: Edge) -> EdgeIndex {
        let idx = self.edges.len();
        let target = edge.target;
        self.edges.push(edge);
        self.nodes[target].incoming.push(idx);
        idx
    }

    /// Sort each node's incoming-edge index list by source id, matching the
    /// "edges stored sorted by target id (contiguous per target)" invariant
    /// at the per-node granularity used for deterministic iteration order.
    pub fn finalize(&mut self) {
        for node in &mut self.nodes {
            let edges = &self.edges;
            node.incoming.sort_by_key(|&e| edges[e].source_id);
        }
    }
}
