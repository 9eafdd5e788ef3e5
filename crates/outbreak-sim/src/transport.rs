//! Cross-process communication primitives (C2's `CCommunicate` surface)
//! behind a `Transport` seam, plus `LocalTransport`: an in-process,
//! thread-and-channel backed implementation that exercises the full
//! round-robin/broadcast/sequential/barrier contract on a single machine
//! without a real MPI runtime. A production deployment swaps in a
//! different `Transport` (TCP, an MPI binding) without touching the tick
//! loop, action queue, or disease model.

use crossbeam_channel::{Receiver, Sender};
use std::sync::{Arc, Barrier, Condvar, Mutex};

/// Generates the canonical "circle method" round-robin schedule: for `p`
/// participants, produces a list of rounds, each round a list of
/// unordered pairs such that every pair meets exactly once. Odd `p` gets a
/// synthetic bye slot (`None` partner) per round.
pub fn round_robin_schedule(p: usize) -> Vec<Vec<Option<usize>>> {
    if p == 0 {
        return Vec::new();
    }
    let padded = if p % 2 == 0 { p } else { p + 1 };
    let rounds = padded - 1;
    let mut participants: Vec<Option<usize>> = (0..padded).map(|i| if i < p { Some(i) } else { None }).collect();

    let mut schedule = vec![vec![None; p]; rounds];
    for round in 0..rounds {
        for i in 0..padded / 2 {
            let a = participants[i];
            let b = participants[padded - 1 - i];
            if let (Some(a), Some(b)) = (a, b) {
                schedule[round][a] = Some(b);
                schedule[round][b] = Some(a);
            }
        }
        // rotate all but the first fixed element
        let last = participants.pop().unwrap();
        participants.insert(1, last);
    }
    schedule
}

/// Point-to-point communication primitives a caller can drive; implemented
/// concretely by [`LocalTransport`] rather than exposed as a trait object,
/// since the send/receive callbacks are naturally generic over payload
/// shape and a `dyn Transport` would have to erase that.
pub struct LocalTransport {
    rank: usize,
    size: usize,
    senders: Vec<Sender<Vec<u8>>>,
    receiver: Receiver<Vec<u8>>,
    barrier: Arc<Barrier>,
    turn: Arc<(Mutex<usize>, Condvar)>,
    schedule: Arc<Vec<Vec<Option<usize>>>>,
}

impl LocalTransport {
    /// Builds one `LocalTransport` handle per rank, sharing a full mesh of
    /// channels, a reusable barrier, and a turn-taking mutex for the
    /// sequential primitive.
    pub fn new_ring(size: usize) -> Vec<LocalTransport> {
        let mut senders_per_rank: Vec<Sender<Vec<u8>>> = Vec::with_capacity(size);
        let mut receivers: Vec<Receiver<Vec<u8>>> = Vec::with_capacity(size);
        for _ in 0..size {
            let (tx, rx) = crossbeam_channel::unbounded();
            senders_per_rank.push(tx);
            receivers.push(rx);
        }
        let barrier = Arc::new(Barrier::new(size.max(1)));
        let turn = Arc::new((Mutex::new(0usize), Condvar::new()));
        let schedule = Arc::new(round_robin_schedule(size));

        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, receiver)| LocalTransport {
                rank,
                size,
                senders: senders_per_rank.clone(),
                receiver,
                barrier: barrier.clone(),
                turn: turn.clone(),
                schedule: schedule.clone(),
            })
            .collect()
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.size
    }

    fn send_to(&self, target: usize, payload: Vec<u8>) {
        let _ = self.senders[target].send(payload);
    }

    fn recv_from_peer(&self) -> Vec<u8> {
        self.receiver.recv().unwrap_or_default()
    }

    /// Runs one full round-robin cycle: for each round, pairs this rank
    /// with its partner (or skips on a bye). The lower-ranked peer sends
    /// first, the higher-ranked peer receives first, so the exchange never
    /// deadlocks on the unbounded channel even without a select loop.
    pub fn round_robin(&self, mut send: impl FnMut(usize) -> Vec<u8>, mut recv: impl FnMut(usize, &[u8])) {
        for round in &*self.schedule {
            if let Some(partner) = round[self.rank] {
                let payload = send(partner);
                if self.rank < partner {
                    self.send_to(partner, payload);
                    let received = self.recv_from_peer();
                    recv(partner, &received);
                } else {
                    let received = self.recv_from_peer();
                    recv(partner, &received);
                    self.send_to(partner, payload);
                }
            }
            self.barrier.wait();
        }
    }

    /// Rotates the sender role across every rank; all other ranks receive
    /// the same payload.
    pub fn broadcast_all(&self, mut make_payload: impl FnMut() -> Vec<u8>, mut recv: impl FnMut(usize, &[u8])) {
        for sender_rank in 0..self.size {
            if self.rank == sender_rank {
                let payload = make_payload();
                for target in 0..self.size {
                    if target != self.rank {
                        self.send_to(target, payload.clone());
                    }
                }
            } else {
                let received = self.recv_from_peer();
                recv(sender_rank, &received);
            }
            self.barrier.wait();
        }
    }

    /// Sends `payload` from `root` to every other rank, returning the
    /// value every rank ends up holding (the root's own payload passed
    /// straight through). Used for the action queue drain's global
    /// pending-count reduction (§4.9).
    pub fn broadcast_from(&self, root: usize, payload: Vec<u8>) -> Vec<u8> {
        let result = if self.rank == root {
            for target in 0..self.size {
                if target != self.rank {
                    self.send_to(target, payload.clone());
                }
            }
            payload
        } else {
            self.recv_from_peer()
        };
        self.barrier.wait();
        result
    }

    /// Guarantees `f` runs on exactly one rank at a time, in rank order.
    pub fn sequential(&self, mut f: impl FnMut()) {
        let (lock, cvar) = &*self.turn;
        {
            let mut turn = lock.lock().unwrap();
            while *turn != self.rank {
                turn = cvar.wait(turn).unwrap();
            }
        }
        f();
        {
            let mut turn = lock.lock().unwrap();
            *turn = (*turn + 1) % self.size.max(1);
            cvar.notify_all();
        }
        self.barrier.wait();
    }

    pub fn barrier(&self) {
        self.barrier.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn round_robin_schedule_visits_every_pair_once() {
        for p in 2..=6 {
            let schedule = round_robin_schedule(p);
            let mut seen = HashSet::new();
            for round in &schedule {
                let mut paired_this_round = HashSet::new();
                for (rank, partner) in round.iter().enumerate() {
                    if let Some(partner) = partner {
                        assert!(!paired_this_round.contains(&rank), "rank paired twice in one round");
                        paired_this_round.insert(rank);
                        let key = (rank.min(*partner), rank.max(*partner));
                        assert!(seen.insert(key), "pair {:?} repeated for p={}", key, p);
                    }
                }
            }
            let expected_pairs = p * (p - 1) / 2;
            assert_eq!(seen.len(), expected_pairs);
        }
    }

    #[test]
    fn barrier_synchronizes_two_ranks() {
        let transports = LocalTransport::new_ring(2);
        let log = Arc::new(StdMutex::new(Vec::new()));
        let handles: Vec<_> = transports
            .into_iter()
            .map(|t| {
                let log = log.clone();
                std::thread::spawn(move || {
                    log.lock().unwrap().push(format!("before-{}", t.rank()));
                    t.barrier();
                    log.lock().unwrap().push(format!("after-{}", t.rank()));
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let entries = log.lock().unwrap();
        assert_eq!(entries.len(), 4);
    }

    #[test]
    fn sequential_runs_in_rank_order() {
        let transports = LocalTransport::new_ring(3);
        let order = Arc::new(StdMutex::new(Vec::new()));
        let handles: Vec<_> = transports
            .into_iter()
            .map(|t| {
                let order = order.clone();
                std::thread::spawn(move || {
                    let rank = t.rank();
                    t.sequential(|| order.lock().unwrap().push(rank));
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }
}
