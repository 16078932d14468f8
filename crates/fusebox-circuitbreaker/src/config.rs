use crate::events::{CircuitBreakerEvent, CircuitBreakerEventKind};
use crate::{CircuitBreaker, CircuitState, PartitionedCircuitBreaker};
use fusebox_core::{
    default_scheduler, EventListeners, FnListener, LogSink, Scheduler, SharedLogSink,
    SharedScheduler,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub(crate) const DEFAULT_THRESHOLD: u64 = 5;
pub(crate) const DEFAULT_HALF_OPEN_TIMEOUT: Duration = Duration::from_secs(30);
pub(crate) const DEFAULT_FAILURE_COUNT_RESET_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration shared by a breaker, or by every breaker of a partitioned
/// registry.
pub struct CircuitBreakerConfig {
    pub(crate) threshold: u64,
    pub(crate) half_open_timeout: Duration,
    pub(crate) failure_count_reset_timeout: Duration,
    pub(crate) name: String,
    pub(crate) logger: Option<SharedLogSink>,
    pub(crate) scheduler: SharedScheduler,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl CircuitBreakerConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    pub fn half_open_timeout(&self) -> Duration {
        self.half_open_timeout
    }

    pub fn failure_count_reset_timeout(&self) -> Duration {
        self.failure_count_reset_timeout
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for CircuitBreakerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreakerConfig")
            .field("threshold", &self.threshold)
            .field("half_open_timeout", &self.half_open_timeout)
            .field(
                "failure_count_reset_timeout",
                &self.failure_count_reset_timeout,
            )
            .field("name", &self.name)
            .field("logger", &self.logger.is_some())
            .field("event_listeners", &self.event_listeners.len())
            .finish_non_exhaustive()
    }
}

/// Builder for a [`CircuitBreaker`] or a [`PartitionedCircuitBreaker`].
pub struct CircuitBreakerConfigBuilder {
    threshold: u64,
    half_open_timeout: Duration,
    failure_count_reset_timeout: Duration,
    name: String,
    logger: Option<SharedLogSink>,
    scheduler: Option<SharedScheduler>,
    event_listeners: EventListeners<CircuitBreakerEvent>,
}

impl CircuitBreakerConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        #[cfg(feature = "metrics")]
        crate::describe_metrics();

        Self {
            threshold: DEFAULT_THRESHOLD,
            half_open_timeout: DEFAULT_HALF_OPEN_TIMEOUT,
            failure_count_reset_timeout: DEFAULT_FAILURE_COUNT_RESET_TIMEOUT,
            name: String::from("<unnamed>"),
            logger: None,
            scheduler: None,
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets how many counted failures trip a closed circuit.
    ///
    /// Must be at least 1. Default: 5
    pub fn threshold(mut self, threshold: u64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Sets how long the circuit stays open before letting a probe through.
    ///
    /// Default: 30 seconds
    pub fn half_open_timeout(mut self, timeout: Duration) -> Self {
        self.half_open_timeout = timeout;
        self
    }

    /// Sets how long each counted failure is remembered.
    ///
    /// Every failure recorded while closed is forgotten again once this much
    /// time has passed. Default: 60 seconds
    pub fn failure_count_reset_timeout(mut self, timeout: Duration) -> Self {
        self.failure_count_reset_timeout = timeout;
        self
    }

    /// Gives the breaker a human-readable name for diagnostics.
    ///
    /// For a partitioned registry this is the prefix of every partition's name.
    ///
    /// Default: `<unnamed>`
    pub fn name<N: Into<String>>(mut self, name: N) -> Self {
        self.name = name.into();
        self
    }

    /// Attaches a text sink that receives one line per state transition,
    /// probe recovery and protocol anomaly.
    ///
    /// ```rust
    /// use fusebox_circuitbreaker::CircuitBreaker;
    /// use fusebox_core::WriterSink;
    ///
    /// let breaker = CircuitBreaker::builder()
    ///     .name("billing")
    ///     .logger(WriterSink::new(std::io::stderr()))
    ///     .build();
    /// ```
    pub fn logger<S>(mut self, sink: S) -> Self
    where
        S: LogSink + 'static,
    {
        self.logger = Some(Arc::new(sink));
        self
    }

    /// Overrides the scheduler used for delayed transitions.
    ///
    /// Default: an [`AutoScheduler`](fusebox_core::AutoScheduler), which uses
    /// whichever tokio runtime is current when a timer is armed and a thread
    /// when none is.
    pub fn scheduler<S>(mut self, scheduler: S) -> Self
    where
        S: Scheduler + 'static,
    {
        self.scheduler = Some(Arc::new(scheduler));
        self
    }

    /// Registers a callback for state transitions, called with `(from, to)`.
    ///
    /// ```rust
    /// use fusebox_circuitbreaker::{CircuitBreaker, CircuitState};
    ///
    /// let breaker = CircuitBreaker::builder()
    ///     .on_state_transition(|from, to| {
    ///         if to == CircuitState::Open {
    ///             eprintln!("dependency degraded ({from} -> {to})");
    ///         }
    ///     })
    ///     .build();
    /// ```
    pub fn on_state_transition<F>(self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.subscribe(CircuitBreakerEventKind::StateTransition, move |event| {
            if let CircuitBreakerEvent::StateTransition {
                from_state,
                to_state,
                ..
            } = event
            {
                f(*from_state, *to_state);
            }
        })
    }

    /// Registers a callback for calls refused by an open circuit.
    pub fn on_call_rejected<F>(self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe(CircuitBreakerEventKind::CallRejected, move |_| f())
    }

    /// Registers a callback for recorded successes, called with the state the
    /// success was recorded in.
    pub fn on_success<F>(self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.subscribe(CircuitBreakerEventKind::SuccessRecorded, move |event| {
            if let CircuitBreakerEvent::SuccessRecorded { state, .. } = event {
                f(*state);
            }
        })
    }

    /// Registers a callback for recorded failures, called with the state the
    /// failure was recorded in.
    pub fn on_failure<F>(self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.subscribe(CircuitBreakerEventKind::FailureRecorded, move |event| {
            if let CircuitBreakerEvent::FailureRecorded { state, .. } = event {
                f(*state);
            }
        })
    }

    /// Registers a callback for guarded calls that failed with an
    /// [`IgnoreError`](crate::IgnoreError).
    pub fn on_ignored<F>(self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.subscribe(CircuitBreakerEventKind::FailureIgnored, move |event| {
            if let CircuitBreakerEvent::FailureIgnored { state, .. } = event {
                f(*state);
            }
        })
    }

    /// Registers a callback for failures reported while the circuit was open.
    pub fn on_anomaly<F>(self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscribe(CircuitBreakerEventKind::Anomaly, move |_| f())
    }

    /// Registers a callback that receives every event, including permitted
    /// calls. Breakers without such a listener never build per-call events.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&CircuitBreakerEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(f));
        self
    }

    fn subscribe<F>(mut self, kind: CircuitBreakerEventKind, f: F) -> Self
    where
        F: Fn(&CircuitBreakerEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add_for(kind, FnListener::new(f));
        self
    }

    /// Builds a single circuit breaker.
    ///
    /// # Panics
    ///
    /// Panics if the threshold is zero.
    pub fn build(self) -> CircuitBreaker {
        let config = Arc::new(self.into_config());
        let name = config.name.clone();
        CircuitBreaker::from_config(config, name)
    }

    /// Builds a partitioned registry whose breakers all share this
    /// configuration.
    ///
    /// # Panics
    ///
    /// Panics if the threshold is zero.
    pub fn build_partitioned(self) -> PartitionedCircuitBreaker {
        PartitionedCircuitBreaker::from_config(Arc::new(self.into_config()))
    }

    fn into_config(self) -> CircuitBreakerConfig {
        if self.threshold == 0 {
            panic!("circuit breaker threshold must be at least 1");
        }

        CircuitBreakerConfig {
            threshold: self.threshold,
            half_open_timeout: self.half_open_timeout,
            failure_count_reset_timeout: self.failure_count_reset_timeout,
            name: self.name,
            logger: self.logger,
            scheduler: self.scheduler.unwrap_or_else(default_scheduler),
            event_listeners: self.event_listeners,
        }
    }
}

impl Default for CircuitBreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
