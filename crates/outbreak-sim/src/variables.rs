//! Runtime variable storage (C4): local values live directly on the
//! engine's thread-local state; global values are backed by the shared
//! [`CounterStore`](crate::counters::CounterStore).

use crate::counters::CounterStore;
use crate::error::Result;
use outbreak_core::operation::Operator;
use outbreak_core::value::Value;
use outbreak_core::variable::{Scope, VariableDefinition};
use std::collections::HashMap;
use std::sync::Arc;

pub struct VariableStore {
    defs: Vec<VariableDefinition>,
    by_name: HashMap<String, usize>,
    local_values: HashMap<String, f64>,
    counters: Arc<CounterStore>,
}

impl VariableStore {
    pub fn new(defs: Vec<VariableDefinition>, counters: Arc<CounterStore>) -> Self {
        let mut by_name = HashMap::new();
        let mut local_values = HashMap::new();
        for (i, d) in defs.iter().enumerate() {
            by_name.insert(d.id.clone(), i);
            if d.scope == Scope::Local {
                local_values.insert(d.id.clone(), d.initial_value.as_f64().unwrap_or(0.0));
            }
        }
        VariableStore { defs, by_name, local_values, counters }
    }

    fn def(&self, name: &str) -> Option<&VariableDefinition> {
        self.by_name.get(name).map(|&i| &self.defs[i])
    }

    /// Every registered variable id, in definition order (used to build the
    /// summary CSV's variable columns).
    pub fn ids(&self) -> Vec<String> {
        self.defs.iter().map(|d| d.id.clone()).collect()
    }

    pub fn read(&self, name: &str) -> Value {
        match self.def(name) {
            Some(d) if d.scope == Scope::Global => {
                let idx = d.global_index.expect("global variable missing counter index");
                Value::Number(self.counters.get(idx).unwrap_or(0.0))
            }
            Some(d) => Value::Number(*self.local_values.get(&d.id).unwrap_or(&0.0)),
            None => Value::Number(0.0),
        }
    }

    pub fn write(&mut self, name: &str, operator: Operator, operand: Value) -> Result<()> {
        let operand = operand.as_f64().unwrap_or(0.0);
        match self.def(name).cloned() {
            Some(d) if d.scope == Scope::Global => {
                let idx = d.global_index.expect("global variable missing counter index");
                self.counters.update(idx, operator, operand)?;
            }
            Some(d) => {
                let current = *self.local_values.get(&d.id).unwrap_or(&0.0);
                let new_value = match operator {
                    Operator::Assign => operand,
                    Operator::Add => current + operand,
                    Operator::Sub => current - operand,
                    Operator::Mul => current * operand,
                    Operator::Div => current / operand,
                };
                self.local_values.insert(d.id.clone(), new_value);
            }
            None => {}
        }
        Ok(())
    }

    /// Applies §4.4's reset phase: on threads due for reset (`tick %
    /// reset_period == 0`), restores local variables to their initial
    /// value, and on the master thread (process 0) also resets the shared
    /// global counters.
    pub fn reset_due(&mut self, tick: u64, is_master: bool) {
        for d in self.defs.clone() {
            if !d.due_for_reset(tick) {
                continue;
            }
            match d.scope {
                Scope::Local => {
                    self.local_values.insert(d.id.clone(), d.initial_value.as_f64().unwrap_or(0.0));
                }
                Scope::Global if is_master => {
                    if let Some(idx) = d.global_index {
                        let _ = self.counters.reset(idx, d.initial_value.as_f64().unwrap_or(0.0));
                    }
                }
                Scope::Global => {}
            }
        }
    }
}
