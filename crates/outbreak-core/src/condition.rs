//! Condition definitions: a boolean tree over value-instance comparisons (C7).

use crate::error::{CoreError, Result};
use crate::valueinstance::{Bound, Environment, ValueInstance};
use crate::value::ValueList;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

impl Comparator {
    pub fn requires_list(self) -> bool {
        matches!(self, Comparator::In | Comparator::NotIn)
    }
}

#[derive(Debug, Clone)]
pub enum Condition {
    Value(ValueInstance),
    Comparison {
        op: Comparator,
        left: ValueInstance,
        right: ValueInstance,
    },
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    /// Validates the "`in`/`not in` require a list; all other comparators
    /// forbid one" invariant. Call at load time, not at evaluation time.
    pub fn validate(&self) -> Result<()> {
        match self {
            Condition::Comparison { op, right, .. } => {
                let is_list = matches!(right, ValueInstance::List(_));
                if op.requires_list() && !is_list {
                    return Err(CoreError::ComparisonRequiresList(format!("{:?}", op)));
                }
                if !op.requires_list() && is_list {
                    return Err(CoreError::ComparisonForbidsList(format!("{:?}", op)));
                }
                Ok(())
            }
            Condition::And(children) | Condition::Or(children) => {
                children.iter().try_for_each(Condition::validate)
            }
            Condition::Not(inner) => inner.validate(),
            Condition::Value(_) => Ok(()),
        }
    }

    pub fn evaluate(&self, env: &dyn Environment, bound: Bound) -> bool {
        match self {
            Condition::Value(v) => matches!(v.resolve(env, bound), crate::value::Value::Bool(true)),
            Condition::Comparison { op, left, right } => {
                let lv = left.resolve(env, bound);
                match op {
                    Comparator::In | Comparator::NotIn => {
                        let list: ValueList = right.resolve_list(env, bound);
                        let contained = list.contains(&lv);
                        if *op == Comparator::In {
                            contained
                        } else {
                            !contained
                        }
                    }
                    _ => {
                        let rv = right.resolve(env, bound);
                        let ord = lv.partial_cmp_same_kind(&rv);
                        match op {
                            Comparator::Eq => lv.eq_value(&rv),
                            Comparator::Ne => !lv.eq_value(&rv),
                            Comparator::Lt => ord == Some(std::cmp::Ordering::Less),
                            Comparator::Le => matches!(ord, Some(std::cmp::Ordering::Less) | Some(std::cmp::Ordering::Equal)),
                            Comparator::Gt => ord == Some(std::cmp::Ordering::Greater),
                            Comparator::Ge => matches!(ord, Some(std::cmp::Ordering::Greater) | Some(std::cmp::Ordering::Equal)),
                            Comparator::In | Comparator::NotIn => unreachable!(),
                        }
                    }
                }
            }
            Condition::And(children) => children.iter().all(|c| c.evaluate(env, bound)),
            Condition::Or(children) => children.iter().any(|c| c.evaluate(env, bound)),
            Condition::Not(inner) => !inner.evaluate(env, bound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{EdgeIndex, NodeIndex};
    use crate::property::{EdgeProperty, NodeProperty};
    use crate::value::Value;
    use crate::valueinstance::Observable;

    struct FakeEnv;
    impl Environment for FakeEnv {
        fn node_property(&self, _node: NodeIndex, _prop: NodeProperty) -> Value {
            Value::Int(1)
        }
        fn edge_property(&self, _edge: EdgeIndex, _prop: EdgeProperty) -> Value {
            Value::Bool(true)
        }
        fn variable(&self, _name: &str) -> Value {
            Value::Int(5)
        }
        fn observable(&self, _obs: &Observable) -> Value {
            Value::Int(10)
        }
        fn set_size(&self, _set_name: &str) -> usize {
            3
        }
    }

    #[test]
    fn in_requires_list_validation() {
        let c = Condition::Comparison {
            op: Comparator::In,
            left: ValueInstance::Variable("v".into()),
            right: ValueInstance::Literal(Value::Int(1)),
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn and_short_circuits() {
        let c = Condition::And(vec![
            Condition::Comparison {
                op: Comparator::Eq,
                left: ValueInstance::Variable("v".into()),
                right: ValueInstance::Literal(Value::Int(5)),
            },
            Condition::Comparison {
                op: Comparator::Gt,
                left: ValueInstance::Observable(Observable::CurrentTick),
                right: ValueInstance::Literal(Value::Int(1)),
            },
        ]);
        assert!(c.evaluate(&FakeEnv, Bound::None));
    }

    #[test]
    fn not_negates() {
        let c = Condition::Not(Box::new(Condition::Comparison {
            op: Comparator::Eq,
            left: ValueInstance::Variable("v".into()),
            right: ValueInstance::Literal(Value::Int(5)),
        }));
        assert!(!c.evaluate(&FakeEnv, Bound::None));
    }
}
