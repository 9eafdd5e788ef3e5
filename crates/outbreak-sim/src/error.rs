//! Error types for the engine crate.

use outbreak_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("transport round-robin schedule is invalid for {0} ranks")]
    InvalidTopology(usize),

    #[error("remote memory counter index {0} out of range")]
    CounterIndexOutOfRange(usize),

    #[error("I/O error writing simulation output: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("plugin hook {hook} already overridden for {entity}; keeping the later registration")]
    DoubleOverride { hook: String, entity: String },
}

pub type Result<T> = std::result::Result<T, SimError>;
