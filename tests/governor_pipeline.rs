mod common;

use common::{get, quota_response, ScriptedApi, TOO_MANY};
use futures::FutureExt;
use ratewarden::{
    CancelSignal, Clock, GovernorConfig, GovernorError, LimitMode, ManualClock, PipelineHooks,
    RateGovernor, TokioSleeper,
};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio_util::sync::CancellationToken;
use tower::{ServiceBuilder, ServiceExt};

fn start() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1_700_000_000)
}

fn config(reserve: u32, max: u32, mode: LimitMode) -> GovernorConfig {
    GovernorConfig::new(reserve, max, mode).expect("valid config")
}

#[tokio::test]
async fn fail_fast_rejects_third_call_in_window() {
    let clock = ManualClock::new(start());
    let governor = RateGovernor::builder(config(100, 2, LimitMode::FailFast))
        .with_clock(clock.clone())
        .build();
    let date = clock.clone();
    // The first response's short window has already reset; the second's has not.
    let api = ScriptedApi::new(move |n| {
        let reset = if n == 0 { "0/3600/86400" } else { "200/3600/86400" };
        quota_response(200, "250/2900/29000", reset, date.now(), "{}")
    });
    let svc = ServiceBuilder::new().layer(governor.layer()).service(api.clone());

    svc.clone().oneshot(get("/en/products.json")).await.expect("first call");
    svc.clone().oneshot(get("/en/products.json")).await.expect("second call");
    let err = svc.clone().oneshot(get("/en/products.json")).await.unwrap_err();

    match err {
        GovernorError::LimitExceeded { remaining, requests_in_window, reset_in } => {
            assert_eq!(remaining, 250);
            assert_eq!(requests_in_window, 2);
            assert_eq!(reset_in, Duration::from_secs(200));
        }
        other => panic!("expected LimitExceeded, got {other:?}"),
    }
    assert_eq!(api.sent(), 2, "rejected call must not be sent");
}

#[tokio::test]
async fn fail_fast_rejects_until_short_window_resets() {
    let clock = ManualClock::new(start());
    let governor = RateGovernor::builder(config(0, 100, LimitMode::FailFast))
        .with_clock(clock.clone())
        .build();
    let date = clock.clone();
    let api = ScriptedApi::new(move |_| quota_response(200, "299/2999/29999", "200/3600/86400", date.now(), "{}"));
    let svc = ServiceBuilder::new().layer(governor.layer()).service(api.clone());

    svc.clone().oneshot(get("/")).await.expect("nothing observed yet");
    for _ in 0..2 {
        let err = svc.clone().oneshot(get("/")).await.unwrap_err();
        assert!(err.is_limit_exceeded());
    }
    assert_eq!(api.sent(), 1);

    clock.advance(Duration::from_secs(200));
    svc.clone().oneshot(get("/")).await.expect("window has reset");
    assert_eq!(api.sent(), 2);
}

#[tokio::test(start_paused = true)]
async fn force_mode_blocks_until_reset_plus_slack() {
    let clock = ManualClock::new(start());
    let governor = RateGovernor::builder(config(0, 1, LimitMode::Force))
        .with_clock(clock.clone())
        .with_sleeper(TokioSleeper)
        .build();
    let date = clock.clone();
    let api = ScriptedApi::new(move |_| quota_response(200, "299/2999/29999", "30/3600/86400", date.now(), "{}"));
    let svc = ServiceBuilder::new().layer(governor.layer()).service(api.clone());

    svc.clone().oneshot(get("/")).await.expect("first call");

    let started = tokio::time::Instant::now();
    let blocked = tokio::spawn(svc.clone().oneshot(get("/")));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!blocked.is_finished(), "second caller should still be waiting");
    assert_eq!(api.sent(), 1);

    blocked.await.expect("join").expect("second call");
    let elapsed = started.elapsed();
    assert!(
        elapsed >= Duration::from_secs(31) && elapsed < Duration::from_millis(31_050),
        "waited {elapsed:?}"
    );
    assert_eq!(api.sent(), 2);
}

#[tokio::test(start_paused = true)]
async fn blocked_caller_does_not_hold_up_others() {
    let clock = ManualClock::new(start());
    let governor = RateGovernor::builder(config(0, 1, LimitMode::Force))
        .with_clock(clock.clone())
        .with_sleeper(TokioSleeper)
        .build();
    let date = clock.clone();
    let api = ScriptedApi::new(move |_| quota_response(200, "299/2999/29999", "30/3600/86400", date.now(), "{}"));
    let svc = ServiceBuilder::new().layer(governor.layer()).service(api.clone());

    svc.clone().oneshot(get("/")).await.expect("first call");
    let started = tokio::time::Instant::now();
    let blocked = tokio::spawn(svc.clone().oneshot(get("/")));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!blocked.is_finished(), "budget spent, caller waits");

    // Another caller's response lands while the first one sleeps: its window has reset.
    let fresh = quota_response(200, "298/2998/29998", "0/3600/86400", clock.now(), "{}");
    governor.after_receive(fresh.status(), fresh.headers());
    assert_eq!(governor.snapshot().short().remaining, 298);

    // A check against the fresh state admits without waiting.
    governor
        .before_send(&CancelSignal::none())
        .now_or_never()
        .expect("admission did not wait")
        .expect("admitted");
    assert!(!blocked.is_finished(), "the earlier wait is not re-evaluated");

    blocked.await.expect("join").expect("blocked call");
    let elapsed = started.elapsed();
    assert!(
        elapsed >= Duration::from_secs(31) && elapsed < Duration::from_millis(31_050),
        "waited {elapsed:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn cancelled_wait_is_never_sent() {
    let clock = ManualClock::new(start());
    let governor = RateGovernor::builder(config(0, 1, LimitMode::Force))
        .with_clock(clock.clone())
        .build();
    let date = clock.clone();
    let api = ScriptedApi::new(move |_| quota_response(200, "299/2999/29999", "30/3600/86400", date.now(), "{}"));
    let svc = ServiceBuilder::new().layer(governor.layer()).service(api.clone());

    svc.clone().oneshot(get("/")).await.expect("first call");

    let token = CancellationToken::new();
    let mut request = get("/");
    request.extensions_mut().insert(CancelSignal::token(token.clone()));
    let pending = tokio::spawn(svc.clone().oneshot(request));
    tokio::time::sleep(Duration::from_secs(5)).await;
    token.cancel();

    let err = pending.await.expect("join").unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(api.sent(), 1);
}

#[tokio::test(start_paused = true)]
async fn deadline_aborts_wait() {
    let clock = ManualClock::new(start());
    let governor = RateGovernor::builder(config(0, 1, LimitMode::Force))
        .with_clock(clock.clone())
        .build();
    let date = clock.clone();
    let api = ScriptedApi::new(move |_| quota_response(200, "299/2999/29999", "30/3600/86400", date.now(), "{}"));
    let svc = ServiceBuilder::new().layer(governor.layer()).service(api.clone());

    svc.clone().oneshot(get("/")).await.expect("first call");

    let mut request = get("/");
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    request.extensions_mut().insert(CancelSignal::deadline(deadline));
    let err = svc.clone().oneshot(request).await.unwrap_err();

    assert!(matches!(err, GovernorError::Cancelled { reason: "deadline elapsed" }));
    assert_eq!(api.sent(), 1);
}

#[tokio::test]
async fn too_many_requests_maps_to_throttled() {
    let governor = RateGovernor::new(config(0, u32::MAX, LimitMode::FailFast));
    let api = ScriptedApi::new(|_| quota_response(429, "0/2700/29700", "120/3600/86400", SystemTime::now(), TOO_MANY));
    let svc = ServiceBuilder::new().layer(governor.layer()).service(api);

    let before = SystemTime::now();
    let err = svc.oneshot(get("/en/products.json")).await.unwrap_err();
    let retry_after = err.retry_after().expect("throttled carries retry_after");

    assert!(err.is_retryable());
    let expected = before + Duration::from_secs(120);
    let drift = retry_after
        .duration_since(expected)
        .unwrap_or_else(|e| e.duration());
    assert!(drift < Duration::from_secs(1), "retry_after off by {drift:?}");
    assert_eq!(governor.snapshot().short().remaining, 0);
    assert_eq!(governor.snapshot().requests_in_window, 0);
}

#[tokio::test]
async fn error_responses_still_refresh_quotas() {
    let clock = ManualClock::new(start());
    let governor = RateGovernor::builder(config(0, u32::MAX, LimitMode::FailFast))
        .with_clock(clock.clone())
        .build();
    let body = r#"{"code":404,"method":"GET","request":"/en/products/9.json","message":"Not found"}"#;
    let date = clock.clone();
    let api = ScriptedApi::new(move |_| quota_response(404, "10/2990/29990", "60/3600/86400", date.now(), body));
    let svc = ServiceBuilder::new().layer(governor.layer()).service(api);

    let err = svc.oneshot(get("/en/products/9.json")).await.unwrap_err();
    assert!(err.is_api());
    assert!(!err.is_retryable());

    let snapshot = governor.snapshot();
    assert_eq!(snapshot.short().remaining, 10);
    assert_eq!(snapshot.observed_at, Some(start()));
    assert_eq!(snapshot.requests_in_window, 0);
}

#[tokio::test]
async fn malformed_headers_never_fail_the_call() {
    let clock = ManualClock::new(start());
    let governor = RateGovernor::builder(config(0, u32::MAX, LimitMode::FailFast))
        .with_clock(clock.clone())
        .build();
    let date = clock.clone();
    let api = ScriptedApi::new(move |_| quota_response(200, "299/2999/29999", "soon", date.now(), "{}"));
    let svc = ServiceBuilder::new().layer(governor.layer()).service(api);

    let response = svc.oneshot(get("/")).await.expect("malformed headers are tolerated");
    assert_eq!(response.status(), http::StatusCode::OK);

    let snapshot = governor.snapshot();
    assert_eq!(snapshot.observed_at, Some(start()));
    assert_eq!(snapshot.short().limit, 0, "previous quotas kept");
    assert_eq!(snapshot.requests_in_window, 1);
}
