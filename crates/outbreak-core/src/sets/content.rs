//! Set-content expressions: composable selectors producing a sorted,
//! duplicate-free vector of node or edge indices (§4.6).

use crate::condition::Comparator;
use crate::db_field::DbFieldSelector;
use crate::network::{EdgeIndex, Network, NodeIndex};
use crate::property::{EdgeProperty, NodeProperty};
use crate::value::ValueList;
use crate::valueinstance::{Bound, Environment, ValueInstance};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum SetContent {
    AllNodes,
    AllEdges,
    NodePropertyCmp { prop: NodeProperty, op: Comparator, value: ValueInstance },
    NodePropertyInList { prop: NodeProperty, list: ValueInstance },
    /// Like `NodePropertyInList`, but the comparison list comes from an
    /// external `DbFieldSelector` rather than a manifest-literal list (§4.6).
    NodePropertyInDbList { prop: NodeProperty, selector: Arc<dyn DbFieldSelector> },
    WithIncomingEdgeIn { edge_set: String },
    EdgePropertyCmp { prop: EdgeProperty, op: Comparator, value: ValueInstance },
    EdgePropertyInList { prop: EdgeProperty, list: ValueInstance },
    EdgePropertyInDbList { prop: EdgeProperty, selector: Arc<dyn DbFieldSelector> },
    WithTargetNodeIn { node_set: String },
    WithSourceNodeIn { node_set: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SetResult {
    Nodes(Vec<NodeIndex>),
    Edges(Vec<EdgeIndex>),
}

impl SetResult {
    pub fn len(&self) -> usize {
        match self {
            SetResult::Nodes(v) => v.len(),
            SetResult::Edges(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn compare(op: Comparator, lhs: &crate::value::Value, rhs_inst: &ValueInstance, env: &dyn Environment, bound: Bound) -> bool {
    match op {
        Comparator::In | Comparator::NotIn => {
            let list: ValueList = rhs_inst.resolve_list(env, bound);
            let contained = list.contains(lhs);
            if op == Comparator::In { contained } else { !contained }
        }
        _ => {
            let rhs = rhs_inst.resolve(env, bound);
            let ord = lhs.partial_cmp_same_kind(&rhs);
            match op {
                Comparator::Eq => lhs.eq_value(&rhs),
                Comparator::Ne => !lhs.eq_value(&rhs),
                Comparator::Lt => ord == Some(std::cmp::Ordering::Less),
                Comparator::Le => matches!(ord, Some(std::cmp::Ordering::Less) | Some(std::cmp::Ordering::Equal)),
                Comparator::Gt => ord == Some(std::cmp::Ordering::Greater),
                Comparator::Ge => matches!(ord, Some(std::cmp::Ordering::Greater) | Some(std::cmp::Ordering::Equal)),
                Comparator::In | Comparator::NotIn => unreachable!(),
            }
        }
    }
}

impl SetContent {
    /// Evaluates the set content against a fully-materialized `network`,
    /// given the other named sets it may reference (`registry`) and the
    /// environment used to resolve comparison operands.
    pub fn evaluate(&self, network: &Network, registry: &HashMap<String, SetResult>, env: &dyn Environment) -> SetResult {
        match self {
            SetContent::AllNodes => {
                let mut v: Vec<NodeIndex> = (0..network.nodes.len()).collect();
                v.sort_unstable();
                SetResult::Nodes(v)
            }
            SetContent::AllEdges => {
                let mut v: Vec<EdgeIndex> = (0..network.edges.len()).collect();
                v.sort_unstable();
                SetResult::Edges(v)
            }
            SetContent::NodePropertyCmp { prop, op, value } => {
                let mut v: Vec<NodeIndex> = (0..network.nodes.len())
                    .filter(|&i| {
                        let lhs = prop.read(&network.nodes[i]);
                        compare(*op, &lhs, value, env, Bound::Node(i))
                    })
                    .collect();
                v.sort_unstable();
                SetResult::Nodes(v)
            }
            SetContent::NodePropertyInList { prop, list } => {
                let values = list.resolve_list(env, Bound::None);
                let mut v: Vec<NodeIndex> = (0..network.nodes.len())
                    .filter(|&i| values.contains(&prop.read(&network.nodes[i])))
                    .collect();
                v.sort_unstable();
                SetResult::Nodes(v)
            }
            SetContent::NodePropertyInDbList { prop, selector } => {
                let values = selector.values();
                let mut v: Vec<NodeIndex> = (0..network.nodes.len())
                    .filter(|&i| values.contains(&prop.read(&network.nodes[i])))
                    .collect();
                v.sort_unstable();
                SetResult::Nodes(v)
            }
            SetContent::EdgePropertyCmp { prop, op, value } => {
                let mut v: Vec<EdgeIndex> = (0..network.edges.len())
                    .filter(|&i| {
                        let lhs = prop.read(&network.edges[i]);
                        compare(*op, &lhs, value, env, Bound::Edge(i))
                    })
                    .collect();
                v.sort_unstable();
                SetResult::Edges(v)
            }
            SetContent::EdgePropertyInList { prop, list } => {
                let values = list.resolve_list(env, Bound::None);
                let mut v: Vec<EdgeIndex> = (0..network.edges.len())
                    .filter(|&i| values.contains(&prop.read(&network.edges[i])))
                    .collect();
                v.sort_unstable();
                SetResult::Edges(v)
            }
            SetContent::EdgePropertyInDbList { prop, selector } => {
                let values = selector.values();
                let mut v: Vec<EdgeIndex> = (0..network.edges.len())
                    .filter(|&i| values.contains(&prop.read(&network.edges[i])))
                    .collect();
                v.sort_unstable();
                SetResult::Edges(v)
            }
            SetContent::WithIncomingEdgeIn { edge_set } => {
                let edges = match registry.get(edge_set) {
                    Some(SetResult::Edges(e)) => e,
                    _ => return SetResult::Nodes(Vec::new()),
                };
                let edge_member: std::collections::HashSet<EdgeIndex> = edges.iter().copied().collect();
                let mut v: Vec<NodeIndex> = (0..network.nodes.len())
                    .filter(|&n| network.nodes[n].incoming.iter().any(|e| edge_member.contains(e)))
                    .collect();
                v.sort_unstable();
                SetResult::Nodes(v)
            }
            SetContent::WithTargetNodeIn { node_set } => {
                let nodes = match registry.get(node_set) {
                    Some(SetResult::Nodes(n)) => n,
                    _ => return SetResult::Edges(Vec::new()),
                };
                let node_member: std::collections::HashSet<NodeIndex> = nodes.iter().copied().collect();
                let mut v: Vec<EdgeIndex> = (0..network.edges.len())
                    .filter(|&e| node_member.contains(&network.edges[e].target))
                    .collect();
                v.sort_unstable();
                SetResult::Edges(v)
            }
            SetContent::WithSourceNodeIn { node_set } => {
                let nodes = match registry.get(node_set) {
                    Some(SetResult::Nodes(n)) => n,
                    _ => return SetResult::Edges(Vec::new()),
                };
                let node_member: std::collections::HashSet<NodeIndex> = nodes.iter().copied().collect();
                let mut v: Vec<EdgeIndex> = (0..network.edges.len())
                    .filter(|&e| node_member.contains(&network.edges[e].source))
                    .collect();
                v.sort_unstable();
                SetResult::Edges(v)
            }
        }
    }

    /// The name of another set this selector reads out of the registry, if
    /// any — used to order set recomputation so a referenced set is always
    /// evaluated before the set that reads it (§4.5 dependency tracking).
    pub fn depends_on(&self) -> Option<&str> {
        match self {
            SetContent::WithIncomingEdgeIn { edge_set } => Some(edge_set),
            SetContent::WithTargetNodeIn { node_set } => Some(node_set),
            SetContent::WithSourceNodeIn { node_set } => Some(node_set),
            _ => None,
        }
    }

    /// Whether this selector's membership test depends only on a single
    /// writable property, and so is eligible for collector-based
    /// incremental maintenance (§4.6).
    pub fn collectible_property(&self) -> Option<CollectibleProperty> {
        match self {
            SetContent::NodePropertyCmp { prop, .. }
            | SetContent::NodePropertyInList { prop, .. }
            | SetContent::NodePropertyInDbList { prop, .. } => Some(CollectibleProperty::Node(*prop)),
            SetContent::EdgePropertyCmp { prop, .. }
            | SetContent::EdgePropertyInList { prop, .. }
            | SetContent::EdgePropertyInDbList { prop, .. } => Some(CollectibleProperty::Edge(*prop)),
            _ => None,
        }
    }

    /// Re-tests a single node against this selector, for collector
    /// maintenance after a property write. `None` means this selector
    /// isn't a per-node property test (not collectible this way).
    pub fn node_matches(&self, idx: NodeIndex, network: &Network, env: &dyn Environment) -> Option<bool> {
        match self {
            SetContent::NodePropertyCmp { prop, op, value } => {
                let lhs = prop.read(&network.nodes[idx]);
                Some(compare(*op, &lhs, value, env, Bound::Node(idx)))
            }
            SetContent::NodePropertyInList { prop, list } => {
                let values = list.resolve_list(env, Bound::None);
                Some(values.contains(&prop.read(&network.nodes[idx])))
            }
            SetContent::NodePropertyInDbList { prop, selector } => {
                Some(selector.values().contains(&prop.read(&network.nodes[idx])))
            }
            _ => None,
        }
    }

    /// Re-tests a single edge against this selector, for collector
    /// maintenance after a property write.
    pub fn edge_matches(&self, idx: EdgeIndex, network: &Network, env: &dyn Environment) -> Option<bool> {
        match self {
            SetContent::EdgePropertyCmp { prop, op, value } => {
                let lhs = prop.read(&network.edges[idx]);
                Some(compare(*op, &lhs, value, env, Bound::Edge(idx)))
            }
            SetContent::EdgePropertyInList { prop, list } => {
                let values = list.resolve_list(env, Bound::None);
                Some(values.contains(&prop.read(&network.edges[idx])))
            }
            SetContent::EdgePropertyInDbList { prop, selector } => {
                Some(selector.values().contains(&prop.read(&network.edges[idx])))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectibleProperty {
    Node(NodeProperty),
    Edge(EdgeProperty),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Edge, Node};
    use crate::value::{TraitBits, Value};
    use crate::valueinstance::Observable;

    struct FakeEnv;
    impl Environment for FakeEnv {
        fn node_property(&self, _node: NodeIndex, _prop: NodeProperty) -> Value {
            Value::Int(0)
        }
        fn edge_property(&self, _edge: EdgeIndex, _prop: EdgeProperty) -> Value {
            Value::Int(0)
        }
        fn variable(&self, _name: &str) -> Value {
            Value::Int(0)
        }
        fn observable(&self, _obs: &Observable) -> Value {
            Value::Int(0)
        }
        fn set_size(&self, _set_name: &str) -> usize {
            0
        }
    }

    fn network_with_states() -> Network {
        let mut net = Network::new();
        net.add_node(Node::new(1, 0));
        net.add_node(Node::new(2, 1));
        net.add_node(Node::new(3, 1));
        net
    }

    #[test]
    fn node_property_cmp_is_sorted_and_filtered() {
        let net = network_with_states();
        let content = SetContent::NodePropertyCmp {
            prop: NodeProperty::HealthState,
            op: Comparator::Eq,
            value: ValueInstance::Literal(Value::Int(1)),
        };
        let result = content.evaluate(&net, &HashMap::new(), &FakeEnv);
        assert_eq!(result, SetResult::Nodes(vec![1, 2]));
    }

    #[test]
    fn with_target_node_in_filters_edges() {
        let mut net = network_with_states();
        net.add_edge(Edge {
            target_id: 2,
            source_id: 1,
            target_activity: TraitBits::ZERO,
            source_activity: TraitBits::ZERO,
            duration: 1.0,
            weight: 1.0,
            active: true,
            edge_trait: TraitBits::ZERO,
            target: 1,
            source: 0,
        });
        let mut registry = HashMap::new();
        registry.insert("infected".to_string(), SetResult::Nodes(vec![1]));
        let content = SetContent::WithTargetNodeIn { node_set: "infected".to_string() };
        let result = content.evaluate(&net, &registry, &FakeEnv);
        assert_eq!(result, SetResult::Edges(vec![0]));
    }
}
