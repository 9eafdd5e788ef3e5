//! Operation definitions: target + operator + source (C7).

use crate::error::{CoreError, Result};
use crate::network::{EdgeIndex, NodeIndex};
use crate::property::{EdgeProperty, NodeProperty};
use crate::value::Value;
use crate::valueinstance::{Bound, Environment, ValueInstance};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
}

impl Operator {
    pub fn requires_numeric(self) -> bool {
        !matches!(self, Operator::Assign)
    }

    fn apply_numeric(self, current: f64, operand: f64) -> f64 {
        match self {
            Operator::Assign => operand,
            Operator::Add => current + operand,
            Operator::Sub => current - operand,
            Operator::Mul => current * operand,
            Operator::Div => current / operand,
        }
    }
}

#[derive(Debug, Clone)]
pub enum OperationTarget {
    NodeProperty(NodeProperty),
    EdgeProperty(EdgeProperty),
    Variable(String),
}

impl OperationTarget {
    fn name(&self) -> String {
        match self {
            OperationTarget::NodeProperty(p) => p.name().to_string(),
            OperationTarget::EdgeProperty(p) => p.name().to_string(),
            OperationTarget::Variable(v) => v.clone(),
        }
    }

    fn writable(&self) -> bool {
        match self {
            OperationTarget::NodeProperty(p) => p.is_writable(),
            OperationTarget::EdgeProperty(p) => p.is_writable(),
            OperationTarget::Variable(_) => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Operation {
    pub target: OperationTarget,
    pub operator: Operator,
    pub source: ValueInstance,
}

/// Mutation seam the engine crate implements over its concrete node/edge
/// arena and variable store, mirroring [`Environment`] on the read side.
///
/// `write_variable` takes the operator and operand rather than a
/// precombined value: a global variable's current value and new value must
/// be read and written atomically (§4.2's RMA counter contract), which the
/// engine can only guarantee if it performs the read-modify-write itself
/// instead of receiving an already-combined value computed from a
/// possibly-stale read.
pub trait WriteTarget {
    fn write_node_property(&mut self, node: NodeIndex, prop: NodeProperty, value: Value) -> Result<bool>;
    fn write_edge_property(&mut self, edge: EdgeIndex, prop: EdgeProperty, value: Value) -> Result<()>;
    fn write_variable(&mut self, name: &str, operator: Operator, operand: Value) -> Result<()>;
}

impl Operation {
    /// Checks the "non-`=` operators require a numeric target" invariant
    /// against the target's *kind* (ids/durations/activities are
    /// statically read-only or non-numeric); the actual runtime value is
    /// checked again in [`Operation::apply`] since some targets, like
    /// variables, don't know their kind until they hold a value.
    pub fn validate(&self) -> Result<()> {
        if self.operator.requires_numeric() {
            if let OperationTarget::NodeProperty(NodeProperty::Id) = &self.target {
                return Err(CoreError::NonNumericOperator {
                    op: format!("{:?}", self.operator),
                    target: self.target.name(),
                });
            }
        }
        if !self.target.writable() {
            return Err(CoreError::ReadOnlyProperty(self.target.name()));
        }
        Ok(())
    }

    /// Applies the operation. For a non-`Assign` operator the target must
    /// currently hold a numeric value; the new value is `op(current,
    /// source)`. Returns whether a node's health state changed (callers
    /// follow up with C3's stateChanged handling).
    pub fn apply(
        &self,
        env: &dyn Environment,
        write: &mut dyn WriteTarget,
        bound: Bound,
    ) -> Result<bool> {
        let operand = self.source.resolve(env, bound);

        // Variables go through an atomic read-modify-write at the engine
        // level (see `WriteTarget::write_variable`'s doc comment); node and
        // edge properties are owned by exactly one thread, so combining
        // here is safe.
        if let OperationTarget::Variable(name) = &self.target {
            write.write_variable(name, self.operator, operand)?;
            return Ok(false);
        }

        let new_value = if self.operator == Operator::Assign {
            operand
        } else {
            let current = match (&self.target, bound) {
                (OperationTarget::NodeProperty(p), Bound::Node(n)) => env.node_property(n, *p),
                (OperationTarget::EdgeProperty(p), Bound::Edge(e)) => env.edge_property(e, *p),
                _ => return Err(CoreError::ValueKindMismatch(self.target.name())),
            };
            let c = current
                .as_f64()
                .ok_or_else(|| CoreError::NonNumericOperator {
                    op: format!("{:?}", self.operator),
                    target: self.target.name(),
                })?;
            let o = operand
                .as_f64()
                .ok_or_else(|| CoreError::NonNumericOperator {
                    op: format!("{:?}", self.operator),
                    target: self.target.name(),
                })?;
            Value::Number(self.operator.apply_numeric(c, o))
        };

        match (&self.target, bound) {
            (OperationTarget::NodeProperty(p), Bound::Node(n)) => write.write_node_property(n, *p, new_value),
            (OperationTarget::EdgeProperty(p), Bound::Edge(e)) => {
                write.write_edge_property(e, *p, new_value)?;
                Ok(false)
            }
            _ => Err(CoreError::ValueKindMismatch(self.target.name())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::valueinstance::Observable;
    use std::cell::RefCell;

    struct FakeEnv {
        var: RefCell<f64>,
    }
    impl Environment for FakeEnv {
        fn node_property(&self, _node: NodeIndex, _prop: NodeProperty) -> Value {
            Value::Number(0.0)
        }
        fn edge_property(&self, _edge: EdgeIndex, _prop: EdgeProperty) -> Value {
            Value::Number(0.0)
        }
        fn variable(&self, _name: &str) -> Value {
            Value::Number(*self.var.borrow())
        }
        fn observable(&self, _obs: &Observable) -> Value {
            Value::Number(0.0)
        }
        fn set_size(&self, _set_name: &str) -> usize {
            0
        }
    }
    struct FakeWrite<'a> {
        var: &'a RefCell<f64>,
    }
    impl<'a> WriteTarget for FakeWrite<'a> {
        fn write_node_property(&mut self, _node: NodeIndex, _prop: NodeProperty, _value: Value) -> Result<bool> {
            Ok(false)
        }
        fn write_edge_property(&mut self, _edge: EdgeIndex, _prop: EdgeProperty, _value: Value) -> Result<()> {
            Ok(())
        }
        fn write_variable(&mut self, _name: &str, operator: Operator, operand: Value) -> Result<()> {
            let mut current = self.var.borrow_mut();
            let o = operand.as_f64().unwrap();
            *current = match operator {
                Operator::Assign => o,
                Operator::Add => *current + o,
                Operator::Sub => *current - o,
                Operator::Mul => *current * o,
                Operator::Div => *current / o,
            };
            Ok(())
        }
    }

    #[test]
    fn add_accumulates() {
        let var = RefCell::new(1.0);
        let env = FakeEnv { var: var.clone() };
        let mut write = FakeWrite { var: &var };
        let op = Operation {
            target: OperationTarget::Variable("v".into()),
            operator: Operator::Add,
            source: ValueInstance::Literal(Value::Number(2.0)),
        };
        op.apply(&env, &mut write, Bound::None).unwrap();
        assert_eq!(*var.borrow(), 3.0);
    }

    #[test]
    fn assign_overwrites_even_if_current_nonnumeric() {
        let var = RefCell::new(0.0);
        let env = FakeEnv { var: var.clone() };
        let mut write = FakeWrite { var: &var };
        let op = Operation {
            target: OperationTarget::Variable("v".into()),
            operator: Operator::Assign,
            source: ValueInstance::Literal(Value::Number(9.0)),
        };
        op.apply(&env, &mut write, Bound::None).unwrap();
        assert_eq!(*var.borrow(), 9.0);
    }
}
