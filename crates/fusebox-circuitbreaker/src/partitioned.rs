use crate::config::CircuitBreakerConfigBuilder;
use crate::{BreakerView, CallError, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};
use dashmap::DashMap;
#[cfg(feature = "metrics")]
use metrics::gauge;
use std::fmt::{self, Display};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// One independent circuit breaker per key.
///
/// Breakers are created on first use from a shared configuration and live as
/// long as the registry. However many callers race on a brand-new key, exactly
/// one breaker is created for it and all of them share it.
///
/// ```rust
/// use fusebox_circuitbreaker::{CallError, PartitionedCircuitBreaker};
/// use std::time::Duration;
///
/// let per_host = PartitionedCircuitBreaker::new(3, Duration::from_secs(10), Duration::from_secs(30));
///
/// let body = per_host.call("api.example.com", || -> Result<&str, CallError<std::io::Error>> {
///     Ok("pong")
/// });
///
/// assert_eq!(body.unwrap(), "pong");
/// assert_eq!(per_host.len(), 1);
/// ```
#[derive(Clone)]
pub struct PartitionedCircuitBreaker {
    config: Arc<CircuitBreakerConfig>,
    breakers: Arc<DashMap<String, CircuitBreaker>>,
}

impl PartitionedCircuitBreaker {
    /// Creates a registry whose breakers use the given settings.
    ///
    /// # Panics
    ///
    /// Panics if `threshold` is zero.
    pub fn new(
        threshold: u64,
        half_open_timeout: Duration,
        failure_count_reset_timeout: Duration,
    ) -> Self {
        Self::builder()
            .threshold(threshold)
            .half_open_timeout(half_open_timeout)
            .failure_count_reset_timeout(failure_count_reset_timeout)
            .build_partitioned()
    }

    /// Creates a new builder. Finish it with
    /// [`build_partitioned`](CircuitBreakerConfigBuilder::build_partitioned).
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    pub(crate) fn from_config(config: Arc<CircuitBreakerConfig>) -> Self {
        Self {
            config,
            breakers: Arc::new(DashMap::new()),
        }
    }

    /// Runs `f` through the breaker for `key`, creating it if needed.
    pub fn call<K, T, E, F>(&self, key: &K, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        K: Display + ?Sized,
        F: FnOnce() -> Result<T, CallError<E>>,
    {
        self.breaker(key).call(f)
    }

    /// Async counterpart of [`call`](Self::call).
    pub async fn call_async<K, T, E, F, Fut>(
        &self,
        key: &K,
        f: F,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        K: Display + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CallError<E>>>,
    {
        let breaker = self.breaker(key);
        breaker.call_async(f).await
    }

    /// Returns the breaker for `key`, creating it on first access.
    ///
    /// The returned handle shares state with the registry's copy.
    pub fn breaker<K>(&self, key: &K) -> CircuitBreaker
    where
        K: Display + ?Sized,
    {
        let key = key.to_string();
        if let Some(existing) = self.breakers.get(&key) {
            return existing.clone();
        }

        let name = format!("{}/{}", self.config.name, key);
        let mut created = false;
        let breaker = self
            .breakers
            .entry(key)
            .or_insert_with(|| {
                created = true;
                CircuitBreaker::from_config(Arc::clone(&self.config), name)
            })
            .clone();

        if created {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                registry = %self.config.name,
                breaker = %breaker.name(),
                "created partition breaker"
            );

            #[cfg(feature = "metrics")]
            gauge!("fusebox_partitions", "registry" => self.config.name.clone())
                .set(self.breakers.len() as f64);
        }

        breaker
    }

    /// Returns the breaker for `key` if one was already created.
    pub fn get<K>(&self, key: &K) -> Option<CircuitBreaker>
    where
        K: Display + ?Sized,
    {
        self.breakers
            .get(&key.to_string())
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    /// Keys with a breaker, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.breakers.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Snapshots of every partition, sorted by key.
    pub fn views(&self) -> Vec<(String, BreakerView)> {
        let mut views: Vec<_> = self
            .breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().view()))
            .collect();
        views.sort_by(|a, b| a.0.cmp(&b.0));
        views
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }
}

impl fmt::Debug for PartitionedCircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionedCircuitBreaker")
            .field("name", &self.config.name)
            .field("partitions", &self.breakers.len())
            .finish_non_exhaustive()
    }
}
