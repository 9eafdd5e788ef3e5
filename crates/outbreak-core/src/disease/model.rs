//! Health states, progressions, and transmissions (C3).

use super::distribution::Distribution;
use super::hooks::{
    DefaultProgressionDwellTime, DefaultStateProgression, DefaultTransmissionPropensity,
    ProgressionDwellTimeHook, StateProgressionHook, TransmissionPropensityHook,
};
use crate::error::{CoreError, Result};
use crate::operation::Operation;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Progression {
    pub id: String,
    pub entry_state: u32,
    pub exit_state: u32,
    pub propensity: f64,
    pub dwell_time: Distribution,
    pub factor_ops: Vec<Operation>,
}

#[derive(Debug, Clone)]
pub struct Transmission {
    pub id: String,
    pub entry_state: u32,
    pub contact_state: u32,
    pub exit_state: u32,
    pub transmissibility: f64,
    pub factor_ops: Vec<Operation>,
}

#[derive(Debug, Clone)]
pub struct HealthState {
    pub id: String,
    pub index: u32,
    pub base_susceptibility: f64,
    pub base_infectivity: f64,
    pub a0: f64,
    pub progressions: Vec<Progression>,
}

/// Per-context counters for a health state: `current` is a running total
/// reconciled as `current0 + sum(in) - sum(out)`; `in`/`out` are this-tick
/// deltas, reduced into the global count at the tick's summary barrier.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateCounters {
    pub current: i64,
    pub entered: i64,
    pub exited: i64,
}

pub struct DiseaseModel {
    pub states: Vec<HealthState>,
    state_by_id: HashMap<String, u32>,
    /// `transmissions[entry][contact]` dispatch table for O(1) edge lookup.
    transmission_table: Vec<Vec<Option<Transmission>>>,
    transmissions_by_id: HashMap<String, Transmission>,
    progressions_by_id: HashMap<String, Progression>,
    pub initial_state: u32,
    /// Global scaling applied to a node's total transmission A0 before the
    /// firing test (§4.3's "A0 x globalTransmissibility x 1/timeResolution").
    pub global_transmissibility: f64,

    pub transmission_hooks: HashMap<String, Arc<dyn TransmissionPropensityHook>>,
    pub progression_hooks: HashMap<u32, Arc<dyn StateProgressionHook>>,
    pub dwell_hooks: HashMap<String, Arc<dyn ProgressionDwellTimeHook>>,

    default_transmission_hook: Arc<dyn TransmissionPropensityHook>,
    default_progression_hook: Arc<dyn StateProgressionHook>,
    default_dwell_hook: Arc<dyn ProgressionDwellTimeHook>,
}

impl DiseaseModel {
    pub fn build(
        states_in: Vec<(String, f64, f64)>,
        progressions_in: Vec<Progression>,
        transmissions_in: Vec<Transmission>,
        initial_state_id: &str,
    ) -> Result<Self> {
        let mut state_by_id = HashMap::new();
        let mut states: Vec<HealthState> = states_in
            .into_iter()
            .enumerate()
            .map(|(i, (id, sus, inf))| {
                state_by_id.insert(id.clone(), i as u32);
                HealthState {
                    id,
                    index: i as u32,
                    base_susceptibility: sus,
                    base_infectivity: inf,
                    a0: 0.0,
                    progressions: Vec::new(),
                }
            })
            .collect();

        for p in &progressions_in {
            p.dwell_time.validate()?;
            let entry = &mut states[p.entry_state as usize];
            entry.a0 += p.propensity;
            entry.progressions.push(p.clone());
        }
        for s in &states {
            let expected: f64 = s.progressions.iter().map(|p| p.propensity).sum();
            if (expected - s.a0).abs() > 1e-9 {
                return Err(CoreError::A0Mismatch {
                    state: s.id.clone(),
                    actual: s.a0,
                    expected,
                });
            }
        }

        let n = states.len();
        let mut transmission_table: Vec<Vec<Option<Transmission>>> = vec![vec![None; n]; n];
        let mut transmissions_by_id = HashMap::new();
        for t in &transmissions_in {
            transmission_table[t.entry_state as usize][t.contact_state as usize] = Some(t.clone());
            transmissions_by_id.insert(t.id.clone(), t.clone());
        }
        let progressions_by_id: HashMap<String, Progression> =
            progressions_in.iter().map(|p| (p.id.clone(), p.clone())).collect();

        let initial_state = *state_by_id
            .get(initial_state_id)
            .ok_or_else(|| CoreError::UnknownHealthState(initial_state_id.to_string()))?;

        Ok(DiseaseModel {
            states,
            state_by_id,
            transmission_table,
            transmissions_by_id,
            progressions_by_id,
            initial_state,
            global_transmissibility: 1.0,
            transmission_hooks: HashMap::new(),
            progression_hooks: HashMap::new(),
            dwell_hooks: HashMap::new(),
            default_transmission_hook: Arc::new(DefaultTransmissionPropensity),
            default_progression_hook: Arc::new(DefaultStateProgression),
            default_dwell_hook: Arc::new(DefaultProgressionDwellTime),
        })
    }

    pub fn with_global_transmissibility(mut self, value: f64) -> Self {
        self.global_transmissibility = value;
        self
    }

    pub fn state_index(&self, id: &str) -> Option<u32> {
        self.state_by_id.get(id).copied()
    }

    pub fn state(&self, index: u32) -> &HealthState {
        &self.states[index as usize]
    }

    pub fn transmission_for(&self, entry: u32, contact: u32) -> Option<&Transmission> {
        self.transmission_table[entry as usize][contact as usize].as_ref()
    }

    pub fn transmission_by_id(&self, id: &str) -> Option<&Transmission> {
        self.transmissions_by_id.get(id)
    }

    pub fn progression_by_id(&self, id: &str) -> Option<&Progression> {
        self.progressions_by_id.get(id)
    }

    pub fn transmission_hook(&self, transmission_id: &str) -> &Arc<dyn TransmissionPropensityHook> {
        self.transmission_hooks
            .get(transmission_id)
            .unwrap_or(&self.default_transmission_hook)
    }

    pub fn progression_hook(&self, state_index: u32) -> &Arc<dyn StateProgressionHook> {
        self.progression_hooks
            .get(&state_index)
            .unwrap_or(&self.default_progression_hook)
    }

    pub fn dwell_hook(&self, progression_id: &str) -> &Arc<dyn ProgressionDwellTimeHook> {
        self.dwell_hooks
            .get(progression_id)
            .unwrap_or(&self.default_dwell_hook)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_model() -> DiseaseModel {
        let states = vec![
            ("S".to_string(), 1.0, 0.0),
            ("I".to_string(), 0.0, 1.0),
            ("R".to_string(), 0.0, 0.0),
        ];
        let progressions = vec![Progression {
            id: "I_to_R".to_string(),
            entry_state: 1,
            exit_state: 2,
            propensity: 0.5,
            dwell_time: Distribution::Fixed(5),
            factor_ops: Vec::new(),
        }];
        let transmissions = vec![Transmission {
            id: "S_I".to_string(),
            entry_state: 0,
            contact_state: 1,
            exit_state: 1,
            transmissibility: 1.0,
            factor_ops: Vec::new(),
        }];
        DiseaseModel::build(states, progressions, transmissions, "S").unwrap()
    }

    #[test]
    fn builds_transmission_table() {
        let model = sample_model();
        assert!(model.transmission_for(0, 1).is_some());
        assert!(model.transmission_for(1, 0).is_none());
    }

    #[test]
    fn a0_matches_sum_of_propensities() {
        let model = sample_model();
        assert_eq!(model.state(1).a0, 0.5);
    }

    #[test]
    fn rejects_mismatched_a0() {
        // Can't easily construct a mismatch through `build` (it derives a0
        // from the progressions itself), so this documents the invariant
        // the constructor enforces rather than testing a broken path.
        let model = sample_model();
        let expected: f64 = model.state(1).progressions.iter().map(|p| p.propensity).sum();
        assert_eq!(expected, model.state(1).a0);
    }
}
