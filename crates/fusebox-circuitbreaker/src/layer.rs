use crate::{CallError, CircuitBreaker, CircuitBreakerError};
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// A Tower layer that routes every request through a [`CircuitBreaker`].
///
/// Every error returned by the inner service counts as a failure. Services
/// produced by one layer share its breaker, so all of them trip together.
///
/// ```rust
/// use fusebox_circuitbreaker::CircuitBreaker;
/// use std::time::Duration;
/// use tower::{service_fn, ServiceBuilder};
///
/// let breaker = CircuitBreaker::new(5, Duration::from_secs(30), Duration::from_secs(60));
///
/// let service = ServiceBuilder::new()
///     .layer(breaker.layer())
///     .service(service_fn(|req: String| async move { Ok::<_, std::io::Error>(req) }));
/// ```
#[derive(Clone, Debug)]
pub struct CircuitBreakerLayer {
    breaker: CircuitBreaker,
}

impl CircuitBreakerLayer {
    pub fn new(breaker: CircuitBreaker) -> Self {
        Self { breaker }
    }

    /// The breaker shared by every service this layer wraps.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

impl<S> Layer<S> for CircuitBreakerLayer {
    type Service = CircuitBreakerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CircuitBreakerService {
            inner,
            breaker: self.breaker.clone(),
        }
    }
}

/// Service produced by [`CircuitBreakerLayer`].
#[derive(Clone, Debug)]
pub struct CircuitBreakerService<S> {
    inner: S,
    breaker: CircuitBreaker,
}

impl<S> CircuitBreakerService<S> {
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

impl<S, Req> Service<Req> for CircuitBreakerService<S>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
    S::Future: Send + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = CircuitBreakerError<S::Error>;
    type Future = BoxFuture<'static, Result<S::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner
            .poll_ready(cx)
            .map_err(CircuitBreakerError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let breaker = self.breaker.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            breaker
                .call_async(move || async move {
                    inner.call(req).await.map_err(CallError::Counted)
                })
                .await
        })
    }
}
