//! Remote-memory-access counter store (C2): fixed-size double slots
//! conceptually hosted on process 0. `get`/`update` guard the table with a
//! single lock for the in-process backend, matching the "atomic
//! get-modify-put under a per-window exclusive lock" contract; a real
//! multi-process deployment would replace this with genuine one-sided RMA.

use crate::error::{Result, SimError};
use outbreak_core::operation::Operator;
use parking_lot::Mutex;

#[derive(Debug, Default)]
pub struct CounterStore {
    slots: Mutex<Vec<f64>>,
}

impl CounterStore {
    pub fn new(capacity: usize) -> Self {
        CounterStore { slots: Mutex::new(vec![0.0; capacity]) }
    }

    pub fn get(&self, index: usize) -> Result<f64> {
        self.slots
            .lock()
            .get(index)
            .copied()
            .ok_or(SimError::CounterIndexOutOfRange(index))
    }

    pub fn update(&self, index: usize, op: Operator, value: f64) -> Result<f64> {
        let mut slots = self.slots.lock();
        let slot = slots.get_mut(index).ok_or(SimError::CounterIndexOutOfRange(index))?;
        *slot = match op {
            Operator::Assign => value,
            Operator::Add => *slot + value,
            Operator::Sub => *slot - value,
            Operator::Mul => *slot * value,
            Operator::Div => *slot / value,
        };
        Ok(*slot)
    }

    pub fn reset(&self, index: usize, value: f64) -> Result<()> {
        let mut slots = self.slots.lock();
        let slot = slots.get_mut(index).ok_or(SimError::CounterIndexOutOfRange(index))?;
        *slot = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrent_updates_are_serialized() {
        let store = std::sync::Arc::new(CounterStore::new(1));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        store.update(0, Operator::Add, 1.0).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.get(0).unwrap(), 8000.0);
    }

    #[test]
    fn out_of_range_index_errors() {
        let store = CounterStore::new(1);
        assert!(store.get(5).is_err());
    }
}
