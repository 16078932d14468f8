use crate::CircuitState;
use std::fmt;
use std::time::Duration;

/// Point-in-time, read-only snapshot of a breaker.
///
/// Holds copies only; it never reflects later changes to the breaker.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BreakerView {
    pub name: String,
    pub threshold: u64,
    pub state: CircuitState,
    /// Live failure count at snapshot time. `None` unless the breaker was
    /// closed.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub failure_count: Option<u64>,
    pub half_open_timeout: Duration,
    pub failure_count_reset_timeout: Duration,
}

impl BreakerView {
    /// The state rendered the way diagnostics print it, e.g.
    /// `closed: {failureCount: 2, threshold: 5}`, `open` or `halfOpen`.
    pub fn state_description(&self) -> String {
        match (self.state, self.failure_count) {
            (CircuitState::Closed, Some(count)) => format!(
                "closed: {{failureCount: {count}, threshold: {}}}",
                self.threshold
            ),
            (state, _) => state.to_string(),
        }
    }
}

impl fmt::Display for BreakerView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] half_open_timeout={:?} failure_count_reset_timeout={:?}",
            self.name,
            self.state_description(),
            self.half_open_timeout,
            self.failure_count_reset_timeout
        )
    }
}
