use super::{fail, manual_breaker};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs `f` with a thread-local fmt subscriber and returns what it wrote.
fn traced(f: impl FnOnce()) -> String {
    let captured = Captured::default();
    let writer = captured.clone();
    let guard = tracing_subscriber::fmt()
        .with_max_level(LevelFilter::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish()
        .set_default();

    f();
    drop(guard);
    captured.text()
}

#[test]
fn transitions_are_traced_with_breaker_fields() {
    let out = traced(|| {
        let (breaker, clock) = manual_breaker(1);
        let _ = breaker.call(fail);
        clock.advance(Duration::from_secs(3));
    });

    assert!(out.contains("circuit breaker state transition"), "{out}");
    assert!(out.contains("breaker=manual"), "{out}");
    assert!(out.contains("from=closed to=open"), "{out}");
    assert!(out.contains("from=open to=halfOpen"), "{out}");
}

#[test]
fn failure_while_open_is_a_warning() {
    let out = traced(|| {
        let (breaker, _clock) = manual_breaker(1);
        breaker.force_open();
        breaker.record_failure();
    });

    assert!(
        out.lines()
            .any(|line| line.contains("WARN") && line.contains("failure recorded while circuit is open")),
        "{out}"
    );
}
