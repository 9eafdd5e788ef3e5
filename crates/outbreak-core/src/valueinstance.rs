//! Read-expressions that resolve to a [`Value`] (part of the data model's
//! "Value instance" type), plus the [`Environment`] seam that lets the
//! engine crate supply node/edge/variable/set state without this crate
//! depending on the engine's concrete storage.

use crate::network::{EdgeIndex, NodeIndex};
use crate::property::{EdgeProperty, NodeProperty};
use crate::value::{Value, ValueList};

/// What an observable reads.
#[derive(Debug, Clone, PartialEq)]
pub enum Observable {
    CurrentTick,
    TotalPopulation,
    /// Count of nodes currently in a health state, by state index.
    HealthStateAbsoluteCount(u32),
    /// Fraction of the population currently in a health state.
    HealthStateRelativeCount(u32),
}

/// The element, if any, a property-valued [`ValueInstance`] is bound to.
#[derive(Debug, Clone, Copy)]
pub enum Bound {
    Node(NodeIndex),
    Edge(EdgeIndex),
    None,
}

/// Supplies the concrete state a [`ValueInstance`] reads from. Implemented
/// by the engine crate's tick context; this crate only depends on the
/// trait, keeping the data model free of storage/threading concerns.
pub trait Environment {
    fn node_property(&self, node: NodeIndex, prop: NodeProperty) -> Value;
    fn edge_property(&self, edge: EdgeIndex, prop: EdgeProperty) -> Value;
    fn variable(&self, name: &str) -> Value;
    fn observable(&self, obs: &Observable) -> Value;
    fn set_size(&self, set_name: &str) -> usize;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValueInstance {
    Literal(Value),
    List(ValueList),
    Observable(Observable),
    NodeProperty(NodeProperty),
    EdgeProperty(EdgeProperty),
    Variable(String),
    SizeOf(String),
}

impl ValueInstance {
    pub fn resolve(&self, env: &dyn Environment, bound: Bound) -> Value {
        match self {
            ValueInstance::Literal(v) => v.clone(),
            ValueInstance::List(_) => panic!("ValueList is not a scalar ValueInstance result"),
            ValueInstance::Observable(o) => env.observable(o),
            ValueInstance::NodeProperty(p) => match bound {
                Bound::Node(n) => env.node_property(n, *p),
                _ => panic!("NodeProperty ValueInstance requires a node-bound evaluation"),
            },
            ValueInstance::EdgeProperty(p) => match bound {
                Bound::Edge(e) => env.edge_property(e, *p),
                _ => panic!("EdgeProperty ValueInstance requires an edge-bound evaluation"),
            },
            ValueInstance::Variable(name) => env.variable(name),
            ValueInstance::SizeOf(set_name) => Value::Int(env.set_size(set_name) as i64),
        }
    }

    pub fn resolve_list(&self, env: &dyn Environment, bound: Bound) -> ValueList {
        match self {
            ValueInstance::List(list) => list.clone(),
            other => ValueList(vec![other.resolve(env, bound)]),
        }
    }
}
