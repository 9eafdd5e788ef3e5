//! Node/edge property accessors (C1).

use crate::error::{CoreError, Result};
use crate::network::{Edge, Node};
use crate::value::{TraitBits, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeProperty {
    Id,
    SusceptibilityFactor,
    InfectivityFactor,
    HealthState,
    NodeTrait,
}

impl NodeProperty {
    pub fn is_writable(self) -> bool {
        !matches!(self, NodeProperty::Id)
    }

    pub fn name(self) -> &'static str {
        match self {
            NodeProperty::Id => "id",
            NodeProperty::SusceptibilityFactor => "susceptibilityFactor",
            NodeProperty::InfectivityFactor => "infectivityFactor",
            NodeProperty::HealthState => "healthState",
            NodeProperty::NodeTrait => "nodeTrait",
        }
    }

    pub fn read(self, node: &Node) -> Value {
        match self {
            NodeProperty::Id => Value::Id(node.id),
            NodeProperty::SusceptibilityFactor => Value::Number(node.susceptibility_factor),
            NodeProperty::InfectivityFactor => Value::Number(node.infectivity_factor),
            NodeProperty::HealthState => Value::Int(node.health_state as i64),
            NodeProperty::NodeTrait => Value::TraitData(node.node_trait),
        }
    }

    /// Writes `value` into the property, returning whether the node's
    /// health state changed (callers must follow up with C3's
    /// `state_changed` handling when this is `true`).
    pub fn write(self, node: &mut Node, value: Value) -> Result<bool> {
        if !self.is_writable() {
            return Err(CoreError::ReadOnlyProperty(self.name().to_string()));
        }
        match (self, value) {
            (NodeProperty::SusceptibilityFactor, v) => {
                node.susceptibility_factor = v.as_f64().ok_or_else(|| CoreError::ValueKindMismatch(self.name().into()))?;
                Ok(false)
            }
            (NodeProperty::InfectivityFactor, v) => {
                node.infectivity_factor = v.as_f64().ok_or_else(|| CoreError::ValueKindMismatch(self.name().into()))?;
                Ok(false)
            }
            (NodeProperty::HealthState, v) => {
                let new_state = v.as_f64().ok_or_else(|| CoreError::ValueKindMismatch(self.name().into()))? as u32;
                let changed = new_state != node.health_state;
                node.health_state = new_state;
                Ok(changed)
            }
            (NodeProperty::NodeTrait, Value::TraitData(t)) => {
                node.node_trait = t;
                Ok(false)
            }
            (NodeProperty::NodeTrait, Value::TraitValue(t)) => {
                node.node_trait = node.node_trait.union(&t);
                Ok(false)
            }
            _ => Err(CoreError::ValueKindMismatch(self.name().to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeProperty {
    TargetId,
    SourceId,
    EdgeTrait,
    Active,
    Weight,
    Duration,
}

impl EdgeProperty {
    pub fn is_writable(self) -> bool {
        matches!(self, EdgeProperty::EdgeTrait | EdgeProperty::Active | EdgeProperty::Weight)
    }

    pub fn name(self) -> &'static str {
        match self {
            EdgeProperty::TargetId => "targetId",
            EdgeProperty::SourceId => "sourceId",
            EdgeProperty::EdgeTrait => "edgeTrait",
            EdgeProperty::Active => "active",
            EdgeProperty::Weight => "weight",
            EdgeProperty::Duration => "duration",
        }
    }

    pub fn read(self, edge: &Edge) -> Value {
        match self {
            EdgeProperty::TargetId => Value::Id(edge.target_id),
            EdgeProperty::SourceId => Value::Id(edge.source_id),
            EdgeProperty::EdgeTrait => Value::TraitData(edge.edge_trait),
            EdgeProperty::Active => Value::Bool(edge.active),
            EdgeProperty::Weight => Value::Number(edge.weight),
            EdgeProperty::Duration => Value::Number(edge.duration),
        }
    }

    pub fn write(self, edge: &mut Edge, value: Value) -> Result<()> {
        if !self.is_writable() {
            return Err(CoreError::ReadOnlyProperty(self.name().to_string()));
        }
        match (self, value) {
            (EdgeProperty::Active, Value::Bool(b)) => {
                edge.active = b;
                Ok(())
            }
            (EdgeProperty::Weight, v) => {
                edge.weight = v.as_f64().ok_or_else(|| CoreError::ValueKindMismatch(self.name().into()))?;
                Ok(())
            }
            (EdgeProperty::EdgeTrait, Value::TraitData(t)) => {
                edge.edge_trait = t;
                Ok(())
            }
            (EdgeProperty::EdgeTrait, Value::TraitValue(t)) => {
                edge.edge_trait = edge.edge_trait.union(&t);
                Ok(())
            }
            _ => Err(CoreError::ValueKindMismatch(self.name().to_string())),
        }
    }
}

pub fn trait_bits(bits: u128) -> TraitBits {
    TraitBits((bits & u64::MAX as u128) as u64, (bits >> 64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Node;

    #[test]
    fn id_is_read_only() {
        let mut node = Node::new(1, 0);
        assert!(NodeProperty::Id.write(&mut node, Value::Id(2)).is_err());
    }

    #[test]
    fn health_state_write_reports_change() {
        let mut node = Node::new(1, 0);
        let changed = NodeProperty::HealthState.write(&mut node, Value::Int(1)).unwrap();
        assert!(changed);
        let unchanged = NodeProperty::HealthState.write(&mut node, Value::Int(1)).unwrap();
        assert!(!unchanged);
    }
}
