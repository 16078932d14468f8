use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Errors returned by [`CircuitBreaker::call`](crate::CircuitBreaker::call)
/// and friends.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open; the guarded call was not attempted.
    #[error("circuit breaker is open; call not permitted")]
    OpenCircuit,

    /// The guarded call failed and the failure was counted.
    #[error("guarded call failed: {0}")]
    Inner(E),

    /// The guarded call failed with an error wrapped in [`IgnoreError`].
    /// The breaker treated the call as a success.
    #[error("guarded call failed (not counted): {0}")]
    Ignored(E),
}

impl<E> CircuitBreakerError<E> {
    /// Returns true if the breaker refused the call.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CircuitBreakerError::OpenCircuit)
    }

    /// Returns true if the call failed without counting against the breaker.
    pub fn is_ignored(&self) -> bool {
        matches!(self, CircuitBreakerError::Ignored(_))
    }

    /// Returns the guarded call's own error, counted or not.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Inner(e) | CircuitBreakerError::Ignored(e) => Some(e),
            CircuitBreakerError::OpenCircuit => None,
        }
    }
}

/// Marks an error that must not count against the breaker.
///
/// Return it from a guarded call when the operation failed for a reason that
/// says nothing about the dependency's health, such as a validation error or a
/// not-found lookup.
///
/// ```
/// use fusebox_circuitbreaker::{CallError, CircuitBreaker, IgnoreError};
/// use std::time::Duration;
///
/// let breaker = CircuitBreaker::new(1, Duration::from_secs(30), Duration::from_secs(60));
///
/// let result = breaker.call(|| -> Result<(), CallError<&str>> {
///     Err(IgnoreError::new("no such user"))?
/// });
///
/// assert!(result.unwrap_err().is_ignored());
/// assert!(!breaker.is_open());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IgnoreError<E>(E);

impl<E> IgnoreError<E> {
    pub fn new(error: E) -> Self {
        Self(error)
    }

    pub fn get_ref(&self) -> &E {
        &self.0
    }

    pub fn into_inner(self) -> E {
        self.0
    }
}

impl<E: fmt::Display> fmt::Display for IgnoreError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<E> StdError for IgnoreError<E>
where
    E: StdError + 'static,
{
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.0)
    }
}

/// Failure value of a guarded call.
///
/// Plain errors convert into [`CallError::Counted`] and [`IgnoreError`]s into
/// [`CallError::Ignored`], so `?` does the right thing in both cases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallError<E> {
    /// Counts against the breaker.
    Counted(E),
    /// Does not count against the breaker.
    Ignored(IgnoreError<E>),
}

impl<E> CallError<E> {
    pub fn is_ignored(&self) -> bool {
        matches!(self, CallError::Ignored(_))
    }

    pub fn into_inner(self) -> E {
        match self {
            CallError::Counted(e) => e,
            CallError::Ignored(e) => e.into_inner(),
        }
    }
}

impl<E> From<E> for CallError<E> {
    fn from(error: E) -> Self {
        CallError::Counted(error)
    }
}

impl<E> From<IgnoreError<E>> for CallError<E> {
    fn from(error: IgnoreError<E>) -> Self {
        CallError::Ignored(error)
    }
}

impl<E: fmt::Display> fmt::Display for CallError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallError::Counted(e) => e.fmt(f),
            CallError::Ignored(e) => write!(f, "{e} (ignored)"),
        }
    }
}
