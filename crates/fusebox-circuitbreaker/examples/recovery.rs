//! Trip, wait, probe and recover.
//!
//! Walks one breaker through its whole protocol against a dependency that is
//! down for a while and then comes back.
//!
//! Run with:
//! ```sh
//! cargo run -p fusebox-circuitbreaker --example recovery --features tracing
//! ```

use fusebox_circuitbreaker::{CallError, CircuitBreaker, CircuitBreakerError};
use fusebox_core::WriterSink;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Debug)]
struct Unavailable;

impl std::fmt::Display for Unavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "inventory service unavailable")
    }
}

impl std::error::Error for Unavailable {}

async fn check_stock(healthy: &AtomicBool, sku: &str) -> Result<u32, Unavailable> {
    tokio::time::sleep(Duration::from_millis(20)).await;
    if healthy.load(Ordering::SeqCst) {
        Ok(sku.len() as u32)
    } else {
        Err(Unavailable)
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .init();

    let breaker = CircuitBreaker::builder()
        .name("inventory")
        .threshold(3)
        .half_open_timeout(Duration::from_secs(1))
        .failure_count_reset_timeout(Duration::from_secs(5))
        .logger(WriterSink::new(std::io::stdout()))
        .on_state_transition(|from, to| println!("  [event] {from} -> {to}"))
        .build();

    let healthy = Arc::new(AtomicBool::new(false));

    println!("== dependency down ==");
    for attempt in 1..=5 {
        let result = breaker
            .call_async(|| async {
                Ok::<_, CallError<Unavailable>>(check_stock(&healthy, "sku-1").await?)
            })
            .await;
        match result {
            Ok(stock) => println!("attempt {attempt}: {stock} in stock"),
            Err(CircuitBreakerError::OpenCircuit) => println!("attempt {attempt}: rejected"),
            Err(err) => println!("attempt {attempt}: {err}"),
        }
    }
    println!("{}", breaker.view());

    println!("== dependency back, waiting for half-open ==");
    healthy.store(true, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(1100)).await;
    println!("{}", breaker.view());

    let probe = breaker
        .call_async(|| async {
            Ok::<_, CallError<Unavailable>>(check_stock(&healthy, "sku-1").await?)
        })
        .await;
    println!("probe: {probe:?}");
    println!("{}", breaker.view());
}
