use thiserror::Error;

pub type SimResult<T> = Result<T, VerifyError>;

/// Result of a single test: a summary message on success.
pub type TestResult = Result<String, VerifyError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum VerifyError {
    /// The handshake partner did not respond within the configured budget.
    /// The current transfer is abandoned, the run continues.
    #[error("{agent}: protocol timeout after {cycles} stalled cycles")]
    ProtocolTimeout { agent: String, cycles: usize },

    /// A bus handle or parameter was not injected before the run phase.
    #[error("configuration missing: {0}. Simulation aborted!")]
    ConfigurationMissing(String),

    #[error("{mismatches} packet mismatch(es) between reference and observed streams")]
    EquivalenceMismatch { mismatches: usize },

    #[error("no signal named '{0}'")]
    UnknownSignal(String),

    #[error("signal '{0}' declared twice")]
    DuplicateSignal(String),

    #[error("no object or callback with handle {0}")]
    UnknownHandle(usize),

    #[error("width mismatch on '{name}': expected {expected} bits, got {actual}")]
    WidthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("delta cycle limit exceeded at time {time}")]
    DeltaOverflow { time: u64 },

    #[error("invalid time unit '{0}'")]
    InvalidTimeUnit(String),

    #[error("can't convert {time} {unit} to sim steps without rounding")]
    TimeRounding { time: f64, unit: String },

    #[error("simulation ran out of events at time {time} before the test completed")]
    SimulationStalled { time: u64 },

    #[error("simulation time limit of {limit} steps exceeded")]
    SimulationTimeout { limit: u64 },

    #[error("test failed: {0}")]
    TestFailed(String),
}
