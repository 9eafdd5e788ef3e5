//! Error types for the simulation core.

use thiserror::Error;

/// Errors raised by the data model, disease model, dependency graph, and
/// wire codec. Anything that can be diagnosed before a tick runs lives here;
/// runtime recoverable errors (stale actions, plugin fallbacks) are logged
/// rather than returned, per the error-handling design.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown health state: {0}")]
    UnknownHealthState(String),

    #[error("unknown progression: {0}")]
    UnknownProgression(String),

    #[error("unknown transmission: {0}")]
    UnknownTransmission(String),

    #[error("health state {state} has A0 {actual} but registered progressions sum to {expected}")]
    A0Mismatch {
        state: String,
        actual: f64,
        expected: f64,
    },

    #[error("discrete distribution probabilities sum to {0}, expected 1.0")]
    DistributionNotNormalized(f64),

    #[error("property {0} is read-only")]
    ReadOnlyProperty(String),

    #[error("operator {op} is not valid on non-numeric target {target}")]
    NonNumericOperator { op: String, target: String },

    #[error("comparison operator {0} requires a value list on the right-hand side")]
    ComparisonRequiresList(String),

    #[error("comparison operator {0} forbids a value list on the right-hand side")]
    ComparisonForbidsList(String),

    #[error("dependency graph contains a cycle through computable {0}")]
    CyclicDependency(String),

    #[error("wire record truncated: expected {expected} bytes, got {actual}")]
    WireTruncated { expected: usize, actual: usize },

    #[error("unknown remote action record kind byte: {0}")]
    UnknownRemoteActionKind(u8),

    #[error("invalid value kind for property {0}")]
    ValueKindMismatch(String),

    #[error("node {0} not found")]
    NodeNotFound(u64),

    #[error("edge target {0} not found")]
    EdgeTargetNotFound(u64),

    /// Wraps an engine-crate error surfaced through the [`crate::operation::WriteTarget`]
    /// seam (e.g. a remote-counter failure), so `outbreak-core` doesn't need
    /// to depend on `outbreak-sim`'s error type to propagate it.
    #[error("{0}")]
    Engine(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
