mod common;

use async_trait::async_trait;
use blindspot::error::{BlindError, TransportError};
use blindspot::{
    BlindSession, EngineConfig, HttpResponse, Injection, Marker, Oracle, Responder, TimingConfig,
};
use common::{Constant, Down};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Echo endpoint that records every payload it is sent.
#[derive(Default)]
struct Recorder {
    payloads: Mutex<Vec<String>>,
}

#[async_trait]
impl Responder for Recorder {
    async fn send(&self, payload: &str) -> Result<HttpResponse, TransportError> {
        self.payloads.lock().unwrap().push(payload.to_string());
        Ok(HttpResponse::new(200, "found 1 result"))
    }
}

#[tokio::test]
async fn test_injection_context_wraps_condition() {
    let recorder = Arc::new(Recorder::default());
    let session = BlindSession::new(EngineConfig::new("mysql"), recorder.clone())
        .unwrap()
        .with_injection(Injection::new("x' AND ", "-- -"));

    let oracle = session.content_oracle(Marker::parse("contains:found 1").unwrap());
    assert!(oracle.evaluate("1=1").await.unwrap());
    assert_eq!(
        recorder.payloads.lock().unwrap().as_slice(),
        ["x' AND 1=1-- -".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_timing_payload_and_answer() {
    let recorder = Arc::new(Recorder::default());
    let config = EngineConfig::new("postgres").with_timing(TimingConfig::new(3.0, 2.0));
    let session = BlindSession::new(config, recorder.clone())
        .unwrap()
        .with_injection(Injection::new("1;", "--"));

    // Instant responses are a clear "false".
    let oracle = session.timing_oracle().unwrap();
    assert!(!oracle.evaluate("1=1").await.unwrap());
    assert_eq!(
        recorder.payloads.lock().unwrap()[0],
        "1;CASE WHEN (1=1) THEN pg_sleep(3) ELSE pg_sleep(0) END--"
    );
}

#[tokio::test(start_paused = true)]
async fn test_ambiguous_latency_is_reported() {
    let slow = Arc::new(Constant::new(Duration::from_millis(2100)));
    let config = EngineConfig::new("mysql").with_timing(TimingConfig::new(3.0, 2.0));
    let session = BlindSession::new(config, slow.clone()).unwrap();

    let oracle = session.timing_oracle().unwrap();
    match oracle.evaluate("1=1").await {
        Err(BlindError::OracleAmbiguous {
            elapsed_ms,
            threshold_ms,
            margin_ms,
        }) => {
            assert!((2100..2110).contains(&elapsed_ms), "{}ms", elapsed_ms);
            assert_eq!(threshold_ms, 2000);
            assert_eq!(margin_ms, 250);
        }
        other => panic!("expected ambiguous read, got {:?}", other),
    }
    assert_eq!(slow.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_retry_budget_then_network_error() {
    let down = Arc::new(Down::default());
    let mut config = EngineConfig::new("mysql");
    config.retry_limit = 2;
    config.backoff_ms = 100;
    let session = BlindSession::new(config, down.clone()).unwrap();

    let start = Instant::now();
    let oracle = session.content_oracle(Marker::Status(200));
    match oracle.evaluate("1=1").await {
        Err(BlindError::Network { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("expected network error, got {:?}", other),
    }
    assert_eq!(down.calls.load(Ordering::SeqCst), 3);
    // 100ms + 200ms of backoff between the three attempts.
    let waited = start.elapsed();
    assert!(waited >= Duration::from_millis(300) && waited < Duration::from_millis(320));
}
