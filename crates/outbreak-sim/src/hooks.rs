//! Plugin hook registration (§6, §7): loading a hook override for a
//! transmission, health state, or progression. A double registration for
//! the same entity is not fatal — it's logged and the later registration
//! wins, matching the "warn + fallback" row for plugin errors; passing a
//! `None` override at load leaves the model's built-in default in place.

use outbreak_core::disease::hooks::{ProgressionDwellTimeHook, StateProgressionHook, TransmissionPropensityHook};
use outbreak_core::disease::DiseaseModel;
use std::sync::Arc;

pub fn register_transmission_hook(model: &mut DiseaseModel, transmission_id: &str, hook: Arc<dyn TransmissionPropensityHook>) {
    if model.transmission_hooks.contains_key(transmission_id) {
        tracing::warn!(transmission = transmission_id, "transmission propensity hook already overridden; keeping the later registration");
    }
    model.transmission_hooks.insert(transmission_id.to_string(), hook);
}

pub fn register_progression_selection_hook(model: &mut DiseaseModel, state_index: u32, hook: Arc<dyn StateProgressionHook>) {
    if model.progression_hooks.contains_key(&state_index) {
        tracing::warn!(state_index, "state progression hook already overridden; keeping the later registration");
    }
    model.progression_hooks.insert(state_index, hook);
}

pub fn register_dwell_time_hook(model: &mut DiseaseModel, progression_id: &str, hook: Arc<dyn ProgressionDwellTimeHook>) {
    if model.dwell_hooks.contains_key(progression_id) {
        tracing::warn!(progression = progression_id, "progression dwell-time hook already overridden; keeping the later registration");
    }
    model.dwell_hooks.insert(progression_id.to_string(), hook);
}

/// A loadable unit of hook overrides. Concretely statically linked in the
/// shipped binary (`§6` scopes native `dlopen` loading out of this core);
/// a real deployment's dynamic-load shim would produce `Box<dyn Plugin>`
/// values the same way and hand them to a `PluginSet`.
pub trait Plugin {
    fn register(&self, model: &mut DiseaseModel);
}

#[derive(Default)]
pub struct PluginSet {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginSet {
    pub fn new() -> Self {
        PluginSet::default()
    }

    pub fn add(&mut self, plugin: Box<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    pub fn apply_all(&self, model: &mut DiseaseModel) {
        for plugin in &self.plugins {
            plugin.register(model);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outbreak_core::disease::model::{HealthState, Transmission};
    use rand::SeedableRng;

    struct AlwaysOneHook;
    impl TransmissionPropensityHook for AlwaysOneHook {
        fn propensity(&self, _t: &Transmission, _e: &outbreak_core::network::Edge, _n: &outbreak_core::network::Node, _s: f64) -> f64 {
            1.0
        }
    }

    fn sample_model() -> DiseaseModel {
        DiseaseModel::build(
            vec![("S".into(), 1.0, 0.0), ("I".into(), 0.0, 1.0)],
            vec![],
            vec![Transmission {
                id: "S_I".into(),
                entry_state: 0,
                contact_state: 1,
                exit_state: 1,
                transmissibility: 1.0,
                factor_ops: vec![],
            }],
            "S",
        )
        .unwrap()
    }

    #[test]
    fn second_registration_wins() {
        let mut model = sample_model();
        struct Zero;
        impl TransmissionPropensityHook for Zero {
            fn propensity(&self, _t: &Transmission, _e: &outbreak_core::network::Edge, _n: &outbreak_core::network::Node, _s: f64) -> f64 {
                0.0
            }
        }
        register_transmission_hook(&mut model, "S_I", Arc::new(Zero));
        register_transmission_hook(&mut model, "S_I", Arc::new(AlwaysOneHook));
        let edge = outbreak_core::network::Edge {
            target_id: 1,
            source_id: 2,
            target_activity: outbreak_core::value::TraitBits::ZERO,
            source_activity: outbreak_core::value::TraitBits::ZERO,
            duration: 1.0,
            weight: 1.0,
            active: true,
            edge_trait: outbreak_core::value::TraitBits::ZERO,
            target: 0,
            source: 1,
        };
        let node = outbreak_core::network::Node::new(1, 0);
        let hook = model.transmission_hook("S_I");
        let t = model.transmission_for(0, 1).unwrap().clone();
        assert_eq!(hook.propensity(&t, &edge, &node, 1.0), 1.0);
    }

    #[test]
    fn unregistered_entity_falls_back_to_default() {
        let model = sample_model();
        let hook = model.progression_hook(0);
        let state = HealthState {
            id: "S".into(),
            index: 0,
            base_susceptibility: 1.0,
            base_infectivity: 0.0,
            a0: 0.0,
            progressions: vec![],
        };
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(1);
        assert_eq!(hook.select(&state, &mut rng), None);
    }
}
