//! One breaker per upstream host.
//!
//! A failing host trips its own breaker while traffic to healthy hosts keeps
//! flowing. Lookups that miss are wrapped in `IgnoreError` so they do not
//! count against the host.
//!
//! Run with:
//! ```sh
//! cargo run -p fusebox-circuitbreaker --example per_host --features tracing
//! ```

use fusebox_circuitbreaker::{
    CallError, CircuitBreakerError, IgnoreError, PartitionedCircuitBreaker,
};
use std::time::Duration;

#[derive(Debug)]
enum FetchError {
    ConnectionRefused,
    NotFound,
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::ConnectionRefused => write!(f, "connection refused"),
            FetchError::NotFound => write!(f, "not found"),
        }
    }
}

fn fetch(host: &str, path: &str) -> Result<String, CallError<FetchError>> {
    match (host, path) {
        ("cdn-2.example.com", _) => Err(FetchError::ConnectionRefused)?,
        (_, "/missing") => Err(IgnoreError::new(FetchError::NotFound))?,
        _ => Ok(format!("{host}{path}")),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .init();

    let hosts = PartitionedCircuitBreaker::builder()
        .name("cdn")
        .threshold(2)
        .half_open_timeout(Duration::from_secs(10))
        .on_state_transition(|from, to| println!("  [event] {from} -> {to}"))
        .build_partitioned();

    let requests = [
        ("cdn-1.example.com", "/a.js"),
        ("cdn-2.example.com", "/a.js"),
        ("cdn-1.example.com", "/missing"),
        ("cdn-2.example.com", "/b.js"),
        ("cdn-1.example.com", "/missing"),
        ("cdn-2.example.com", "/c.js"),
        ("cdn-1.example.com", "/c.js"),
    ];

    for (host, path) in requests {
        match hosts.call(host, || fetch(host, path)) {
            Ok(body) => println!("{host}{path}: ok ({body})"),
            Err(CircuitBreakerError::OpenCircuit) => println!("{host}{path}: circuit open"),
            Err(CircuitBreakerError::Ignored(err)) => {
                println!("{host}{path}: {err} (not counted)")
            }
            Err(CircuitBreakerError::Inner(err)) => println!("{host}{path}: {err}"),
        }
    }

    for (host, view) in hosts.views() {
        println!("{host}: {}", view.state_description());
    }
}
