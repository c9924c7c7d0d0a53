use thiserror::Error;

/// Errors surfaced by the orchestration engine's public operations.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("invalid signal color: {0:?} (expected Red, Yellow or Green)")]
    InvalidSignal(String),

    #[error("invalid signal duration: {0} (must be >= 0)")]
    NegativeDuration(i64),

    #[error("invalid signal duration: {0} (must fit in 32 bits)")]
    DurationOutOfRange(i64),

    #[error("invalid traffic facts for {intersection}: {reason}")]
    InvalidTrafficFacts {
        intersection: String,
        reason: String,
    },

    #[error("unknown intersection: {0}")]
    UnknownIntersection(String),

    /// A programming error inside the engine. Logged loudly and never swallowed.
    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown configuration key: {0}")]
    UnknownKey(String),

    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("configuration is invalid: {}", .0.join("; "))]
    Invalid(Vec<String>),

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Transient failures reported by a traffic-fact producer.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("sensor for {0} unavailable")]
    SensorUnavailable(String),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
