//! CLI error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("engine error: {0}")]
    Sim(#[from] outbreak_sim::SimError),

    #[error("core error: {0}")]
    Core(#[from] outbreak_core::CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error in {path}: {source}")]
    Json { path: String, source: serde_json::Error },

    #[error("config error: {0}")]
    Config(String),
}
