//! Policy hooks that plugins may override (§6 "Plugin hooks").
//!
//! Each hook is a narrow trait with a single method and a default struct
//! implementing the model's built-in formula. Hooks are stored as
//! `Arc<dyn Trait>` rather than compile-time generics because the engine
//! must be able to swap an individual health state's or progression's hook
//! at load time, per entity, based on which plugin (if any) claimed it.

use super::model::{HealthState, Progression, Transmission};
use crate::network::{Edge, Node};
use rand::RngCore;

/// Determines the propensity of a single candidate transmission across an
/// edge. The default is `duration * weight * targetSusceptibility *
/// sourceInfectivity * transmissibility`.
pub trait TransmissionPropensityHook: Send + Sync {
    fn propensity(&self, transmission: &Transmission, edge: &Edge, target: &Node, source_infectivity: f64) -> f64;
}

#[derive(Debug, Default)]
pub struct DefaultTransmissionPropensity;

impl TransmissionPropensityHook for DefaultTransmissionPropensity {
    fn propensity(&self, transmission: &Transmission, edge: &Edge, target: &Node, source_infectivity: f64) -> f64 {
        edge.duration * edge.weight * target.effective_susceptibility() * source_infectivity * transmission.transmissibility
    }
}

/// Selects the next progression out of a health state once it is entered.
/// Returns `None` if no progression fires (A0 == 0).
pub trait StateProgressionHook: Send + Sync {
    fn select(&self, state: &HealthState, rng: &mut dyn RngCore) -> Option<usize>;
}

#[derive(Debug, Default)]
pub struct DefaultStateProgression;

impl StateProgressionHook for DefaultStateProgression {
    fn select(&self, state: &HealthState, rng: &mut dyn RngCore) -> Option<usize> {
        if state.a0 <= 0.0 {
            return None;
        }
        let u = (rng.next_u64() as f64 / u64::MAX as f64) * state.a0;
        let mut acc = 0.0;
        for (i, p) in state.progressions.iter().enumerate() {
            acc += p.propensity;
            if u <= acc {
                return Some(i);
            }
        }
        state.progressions.len().checked_sub(1)
    }
}

/// Determines how many ticks a node dwells in its entry state before the
/// chosen progression fires. The default samples the progression's
/// configured distribution.
pub trait ProgressionDwellTimeHook: Send + Sync {
    fn dwell_time(&self, progression: &Progression, rng: &mut dyn RngCore) -> u32;
}

#[derive(Debug, Default)]
pub struct DefaultProgressionDwellTime;

impl ProgressionDwellTimeHook for DefaultProgressionDwellTime {
    fn dwell_time(&self, progression: &Progression, rng: &mut dyn RngCore) -> u32 {
        // RngCore doesn't implement the `Rng` sampling extension trait
        // directly as a trait object; re-derive a `Rng`-compatible wrapper.
        struct AsRng<'a>(&'a mut dyn RngCore);
        impl<'a> rand::RngCore for AsRng<'a> {
            fn next_u32(&mut self) -> u32 {
                self.0.next_u32()
            }
            fn next_u64(&mut self) -> u64 {
                self.0.next_u64()
            }
            fn fill_bytes(&mut self, dest: &mut [u8]) {
                self.0.fill_bytes(dest)
            }
            fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
                self.0.try_fill_bytes(dest)
            }
        }
        progression.dwell_time.sample(&mut AsRng(rng))
    }
}
