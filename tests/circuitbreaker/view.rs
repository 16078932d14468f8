use super::{fail, manual_breaker};
use fusebox_circuitbreaker::CircuitState;
use serde_json::json;

#[test]
fn closed_view_reports_live_count() {
    let (breaker, _clock) = manual_breaker(3);
    let _ = breaker.call(fail);

    let view = breaker.view();
    assert_eq!(view.state, CircuitState::Closed);
    assert_eq!(view.failure_count, Some(1));
    assert_eq!(view.state_description(), "closed: {failureCount: 1, threshold: 3}");
    assert_eq!(
        view.to_string(),
        "manual [closed: {failureCount: 1, threshold: 3}] half_open_timeout=3s failure_count_reset_timeout=1s"
    );
}

#[test]
fn view_serializes_for_telemetry() {
    let (breaker, _clock) = manual_breaker(1);
    let _ = breaker.call(fail);

    let value = serde_json::to_value(breaker.view()).unwrap();
    assert_eq!(
        value,
        json!({
            "name": "manual",
            "threshold": 1,
            "state": "open",
            "half_open_timeout": { "secs": 3, "nanos": 0 },
            "failure_count_reset_timeout": { "secs": 1, "nanos": 0 },
        })
    );
}

#[test]
fn closed_view_serializes_failure_count() {
    let (breaker, _clock) = manual_breaker(5);
    let _ = breaker.call(fail);
    let _ = breaker.call(fail);

    let value = serde_json::to_value(breaker.view()).unwrap();
    assert_eq!(value["state"], "closed");
    assert_eq!(value["failure_count"], 2);
}

#[test]
fn half_open_state_name_is_camel_case() {
    let (breaker, _clock) = manual_breaker(1);
    breaker.force_half_open();

    let value = serde_json::to_value(breaker.view()).unwrap();
    assert_eq!(value["state"], "halfOpen");
}
