//! Incremental set-content maintenance (§4.6).
//!
//! A collector watches writes to a single property and records, per
//! element, whether it now matches the owning selector. At the next
//! compute the collector replays insertions/deletions as a sorted-merge
//! against the previous content instead of re-scanning every element.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delta {
    Insert,
    Remove,
}

#[derive(Debug, Default)]
pub struct Collector<Id: Ord + Copy> {
    enabled: bool,
    pending: Vec<(Id, Delta)>,
}

impl<Id: Ord + Copy> Collector<Id> {
    pub fn new() -> Self {
        Collector { enabled: false, pending: Vec::new() }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Called from the property-write path when `id`'s match state may
    /// have changed.
    pub fn record(&mut self, id: Id, now_matches: bool) {
        if !self.enabled {
            return;
        }
        self.pending.push((id, if now_matches { Delta::Insert } else { Delta::Remove }));
    }

    /// Applies pending inserts/removes onto a previously sorted,
    /// duplicate-free `content`, returning the new sorted content. The
    /// first call after construction always receives a full initial scan
    /// from the caller and simply enables the collector afterward.
    pub fn apply(&mut self, mut content: Vec<Id>) -> Vec<Id> {
        if self.pending.is_empty() {
            self.enabled = true;
            return content;
        }
        for (id, delta) in self.pending.drain(..) {
            match delta {
                Delta::Insert => {
                    if let Err(pos) = content.binary_search(&id) {
                        content.insert(pos, id);
                    }
                }
                Delta::Remove => {
                    if let Ok(pos) = content.binary_search(&id) {
                        content.remove(pos);
                    }
                }
            }
        }
        self.enabled = true;
        content
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_apply_enables_without_changes() {
        let mut c: Collector<u32> = Collector::new();
        let initial = c.apply(vec![1, 2, 3]);
        assert_eq!(initial, vec![1, 2, 3]);
        assert!(c.is_enabled());
    }

    #[test]
    fn replays_inserts_and_removes_sorted() {
        let mut c: Collector<u32> = Collector::new();
        let _ = c.apply(vec![1, 3]);
        c.record(2, true);
        c.record(1, false);
        let result = c.apply(vec![1, 3]);
        assert_eq!(result, vec![2, 3]);
    }
}
