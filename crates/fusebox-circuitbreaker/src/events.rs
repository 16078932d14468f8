use crate::CircuitState;
use fusebox_core::FuseEvent;
use std::time::Instant;

/// Events emitted by a circuit breaker.
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// The active state was replaced by one of a different kind.
    StateTransition {
        name: String,
        timestamp: Instant,
        from_state: CircuitState,
        to_state: CircuitState,
    },
    /// A call was let through to the guarded function.
    CallPermitted {
        name: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A call was refused because the circuit was open.
    CallRejected { name: String, timestamp: Instant },
    /// A success was recorded.
    SuccessRecorded {
        name: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A failure was recorded. `failure_count` is the count after recording,
    /// present only when the failure landed on a Closed state.
    FailureRecorded {
        name: String,
        timestamp: Instant,
        state: CircuitState,
        failure_count: Option<u64>,
    },
    /// The guarded function failed with an ignored error.
    FailureIgnored {
        name: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A failure notification arrived while the circuit was already open.
    Anomaly { name: String, timestamp: Instant },
}

/// Discriminant of a [`CircuitBreakerEvent`], used to subscribe to one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitBreakerEventKind {
    StateTransition,
    CallPermitted,
    CallRejected,
    SuccessRecorded,
    FailureRecorded,
    FailureIgnored,
    Anomaly,
}

impl CircuitBreakerEvent {
    /// Name of the breaker that emitted the event.
    pub fn breaker_name(&self) -> &str {
        match self {
            CircuitBreakerEvent::StateTransition { name, .. }
            | CircuitBreakerEvent::CallPermitted { name, .. }
            | CircuitBreakerEvent::CallRejected { name, .. }
            | CircuitBreakerEvent::SuccessRecorded { name, .. }
            | CircuitBreakerEvent::FailureRecorded { name, .. }
            | CircuitBreakerEvent::FailureIgnored { name, .. }
            | CircuitBreakerEvent::Anomaly { name, .. } => name,
        }
    }

    pub fn timestamp(&self) -> Instant {
        match self {
            CircuitBreakerEvent::StateTransition { timestamp, .. }
            | CircuitBreakerEvent::CallPermitted { timestamp, .. }
            | CircuitBreakerEvent::CallRejected { timestamp, .. }
            | CircuitBreakerEvent::SuccessRecorded { timestamp, .. }
            | CircuitBreakerEvent::FailureRecorded { timestamp, .. }
            | CircuitBreakerEvent::FailureIgnored { timestamp, .. }
            | CircuitBreakerEvent::Anomaly { timestamp, .. } => *timestamp,
        }
    }
}

impl FuseEvent for CircuitBreakerEvent {
    type Kind = CircuitBreakerEventKind;

    fn kind(&self) -> CircuitBreakerEventKind {
        match self {
            CircuitBreakerEvent::StateTransition { .. } => CircuitBreakerEventKind::StateTransition,
            CircuitBreakerEvent::CallPermitted { .. } => CircuitBreakerEventKind::CallPermitted,
            CircuitBreakerEvent::CallRejected { .. } => CircuitBreakerEventKind::CallRejected,
            CircuitBreakerEvent::SuccessRecorded { .. } => CircuitBreakerEventKind::SuccessRecorded,
            CircuitBreakerEvent::FailureRecorded { .. } => CircuitBreakerEventKind::FailureRecorded,
            CircuitBreakerEvent::FailureIgnored { .. } => CircuitBreakerEventKind::FailureIgnored,
            CircuitBreakerEvent::Anomaly { .. } => CircuitBreakerEventKind::Anomaly,
        }
    }
}
