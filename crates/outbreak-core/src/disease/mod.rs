//! Disease model (C3): health states, progressions, transmissions, dwell
//! time distributions, and the plugin hooks that may override their
//! default formulas.

pub mod distribution;
pub mod hooks;
pub mod model;

pub use distribution::Distribution;
pub use model::{DiseaseModel, HealthState, Progression, StateCounters, Transmission};
