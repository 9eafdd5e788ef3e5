//! Engine crate (C2/C5/C9/C10): the tick loop, transmission kernel, action
//! queue, cross-process transport, and shared-memory counter store that
//! drive an [`outbreak_core`] data/disease model forward in time.

pub mod context;
pub mod counters;
pub mod error;
pub mod hooks;
pub mod output;
pub mod queue;
pub mod rng;
pub mod tick;
pub mod transport;
pub mod variables;

pub use error::{Result, SimError};
pub use tick::{Rank, RunConfig, Trigger};
