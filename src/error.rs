use thiserror::Error;

/// Errors produced by the stepping core.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Rule string could not be parsed or describes an unsupported rule.
    #[error("invalid rule: {0}")]
    InvalidRule(String),

    /// A step was requested for fewer than one generation.
    #[error("invalid generation count {0}: at least one generation is required")]
    InvalidGenerations(u64),

    /// Batch size for accelerated stepping was zero.
    #[error("invalid generation batch size {0}: batch size must be at least 1")]
    InvalidBatchSize(u64),

    /// The step would carry the generation counter past `u64::MAX`.
    #[error("generation {generation} cannot be advanced by {requested} more")]
    GenerationOverflow { generation: u64, requested: u64 },

    /// The engine reported a generation count that cannot be reconciled
    /// with what was requested.
    #[error("engine advanced {reported} generations when {requested} were requested")]
    AdapterMismatch { requested: u64, reported: u64 },

    /// Internal invariant violation: a second step timer was about to start.
    #[error("step scheduler already owns an active timer")]
    SchedulerTimerConflict,

    /// The blocking task running the engine panicked or was cancelled.
    #[error("engine task failed: {0}")]
    EngineTask(String),
}

pub type Result<T> = std::result::Result<T, Error>;
