//! Action queue (C9): a delay-indexed ring of priority buckets, drained
//! re-entrantly within a tick. The two-phase "detach the current bucket,
//! then iterate it" drain step is adapted from the collect-then-apply
//! shape used for contagion propagation in the teacher's system module —
//! here it exists so actions enqueued *during* drain land in a fresh
//! bucket rather than being mutated out from under the iterator.

use outbreak_core::action_def::Action;
use std::collections::BTreeMap;

/// One tick's worth of pending actions, keyed by `order` (the dense
/// priority rank from `outbreak_core::action_def::assign_orders`).
#[derive(Debug, Default)]
pub struct Bucket {
    by_order: BTreeMap<u32, Vec<Action>>,
}

impl Bucket {
    fn push(&mut self, order: u32, action: Action) {
        self.by_order.entry(order).or_default().push(action);
    }

    fn is_empty(&self) -> bool {
        self.by_order.values().all(Vec::is_empty)
    }
}

/// Per-thread ring of current-action buckets, indexed by absolute tick.
#[derive(Default)]
pub struct ActionQueue {
    buckets: BTreeMap<u64, Bucket>,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, current_tick: u64, delta_tick: u32, order: u32, action: Action) {
        let at = current_tick + delta_tick as u64;
        self.buckets.entry(at).or_default().push(order, action);
    }

    /// Detaches the bucket scheduled at `tick`, if any, leaving an empty
    /// one behind so actions added while processing this detached bucket
    /// accumulate separately and are picked up by the next drain pass.
    pub fn detach(&mut self, tick: u64) -> Option<Bucket> {
        self.buckets.remove(&tick)
    }

    pub fn pending_count_at(&self, tick: u64) -> usize {
        self.buckets.get(&tick).map(|b| b.by_order.values().map(Vec::len).sum()).unwrap_or(0)
    }

    pub fn is_empty_at(&self, tick: u64) -> bool {
        self.buckets.get(&tick).map(Bucket::is_empty).unwrap_or(true)
    }
}

impl Bucket {
    /// Iterates priority buckets in ascending order; within a bucket the
    /// actions are shuffled (by the caller, using the thread-local RNG) to
    /// break ties fairly before execution.
    pub fn orders_ascending(&mut self) -> impl Iterator<Item = (u32, Vec<Action>)> + '_ {
        std::mem::take(&mut self.by_order).into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outbreak_core::action_def::ActionKind;

    fn noop_action() -> Action {
        Action { definition: 0, kind: ActionKind::Variable }
    }

    #[test]
    fn add_schedules_at_tick_plus_delay() {
        let mut q = ActionQueue::new();
        q.add(10, 3, 0, noop_action());
        assert_eq!(q.pending_count_at(13), 1);
        assert_eq!(q.pending_count_at(10), 0);
    }

    #[test]
    fn detach_leaves_empty_bucket_for_reentrant_adds() {
        let mut q = ActionQueue::new();
        q.add(0, 0, 0, noop_action());
        let mut bucket = q.detach(0).unwrap();
        assert!(q.is_empty_at(0));
        q.add(0, 0, 0, noop_action());
        assert_eq!(q.pending_count_at(0), 1);
        let drained: Vec<_> = bucket.orders_ascending().collect();
        assert_eq!(drained[0].1.len(), 1);
    }

    #[test]
    fn orders_ascend() {
        let mut q = ActionQueue::new();
        q.add(0, 0, 2, noop_action());
        q.add(0, 0, 0, noop_action());
        q.add(0, 0, 1, noop_action());
        let mut bucket = q.detach(0).unwrap();
        let orders: Vec<u32> = bucket.orders_ascending().map(|(o, _)| o).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }
}
