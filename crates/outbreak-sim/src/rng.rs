//! Deterministic per-thread RNG streams (§5's seeding resolution).
//!
//! Adapted from a seeded-wrapper pattern: a single struct owning the
//! generator plus the seed it was built from, with convenience sampling
//! methods, so callers never reach for `rand::thread_rng()` and
//! accidentally break reproducibility.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// `splitmix64`: a fast, well-distributed stream splitter used to derive
/// one seed per `(process, thread)` pair from a single master seed,
/// without correlating adjacent streams.
pub fn splitmix64(seed: u64, index: u64) -> u64 {
    let mut z = seed.wrapping_add(index.wrapping_mul(0x9E3779B97F4A7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Returns the global thread index used as the splitmix64 stream selector,
/// per §5: `rank * threads_per_process + local_thread_index`.
pub fn global_thread_index(rank: usize, threads_per_process: usize, local_thread_index: usize) -> u64 {
    (rank * threads_per_process + local_thread_index) as u64
}

#[derive(Debug)]
pub struct SimRng {
    rng: ChaCha8Rng,
    seed: u64,
}

impl Default for SimRng {
    fn default() -> Self {
        SimRng { rng: ChaCha8Rng::seed_from_u64(0), seed: 0 }
    }
}

impl SimRng {
    pub fn from_master_seed(master_seed: u64, rank: usize, threads_per_process: usize, local_thread_index: usize) -> Self {
        let index = global_thread_index(rank, threads_per_process, local_thread_index);
        let derived = splitmix64(master_seed, index);
        SimRng { rng: ChaCha8Rng::seed_from_u64(derived), seed: derived }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn uniform01(&mut self) -> f64 {
        self.rng.gen()
    }

    pub fn range(&mut self, min: u32, max: u32) -> u32 {
        if max <= min {
            min
        } else {
            self.rng.gen_range(min..=max)
        }
    }

    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        use rand::seq::SliceRandom;
        slice.shuffle(&mut self.rng);
    }

    pub fn inner(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }
}
