#![allow(dead_code)]

use async_trait::async_trait;
use blindspot::error::{Result, TransportError};
use blindspot::{HttpResponse, Oracle, Responder};
use regex::Regex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const TRUE_BODY: &str = "Welcome back";
pub const FALSE_BODY: &str = "Invalid credentials";

#[derive(Debug, Clone)]
pub enum Value {
    Text(String),
    Number(u64),
}

/// Answers extraction probes from an in-memory map of expression -> value.
///
/// Keys are the exact expressions the engine sends, so tests build them with
/// the same `Dialect` helpers. Unknown expressions behave like SQL NULL:
/// every comparison on them is false.
pub struct FakeDb {
    values: HashMap<String, Value>,
    length: Regex,
    padded_length: Regex,
    char_cmp: Regex,
    char_code: Regex,
    bit: Regex,
    at_least: Regex,
    calls: AtomicUsize,
}

impl FakeDb {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
            length: Regex::new(r"^LENGTH\(\((.*)\)\)<=(\d+)$").unwrap(),
            padded_length: Regex::new(r"^LEN\(\((.*)\)\+'x'\)-1<=(\d+)$").unwrap(),
            char_cmp: Regex::new(r"^ASCII\(SUBSTRING\(\((.*)\),(\d+),1\)\)(>|=)(\d+)$").unwrap(),
            char_code: Regex::new(r"^ASCII\(SUBSTRING\(\((.*)\),(\d+),1\)\)$").unwrap(),
            bit: Regex::new(r"^\(\((.*)\)&(\d+)\)>0$").unwrap(),
            at_least: Regex::new(r"^\((.*)\)>=(\d+)$").unwrap(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn text(mut self, expr: impl Into<String>, value: &str) -> Self {
        self.values.insert(expr.into(), Value::Text(value.to_string()));
        self
    }

    pub fn number(mut self, expr: impl Into<String>, value: u64) -> Self {
        self.values.insert(expr.into(), Value::Number(value));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Evaluates one boolean condition.
    pub fn answer(&self, condition: &str) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(caps) = self
            .length
            .captures(condition)
            .or_else(|| self.padded_length.captures(condition))
        {
            let n: usize = caps[2].parse().unwrap();
            return match self.values.get(&caps[1]) {
                Some(Value::Text(text)) => text.chars().count() <= n,
                Some(Value::Number(v)) => v.to_string().len() <= n,
                None => false,
            };
        }

        if let Some(caps) = self.char_cmp.captures(condition) {
            let pos: usize = caps[2].parse().unwrap();
            let value: u64 = caps[4].parse().unwrap();
            return match self.char_at(&caps[1], pos) {
                Some(code) if &caps[3] == ">" => code > value,
                Some(code) => code == value,
                None => false,
            };
        }

        if let Some(caps) = self.bit.captures(condition) {
            let mask: u64 = caps[2].parse().unwrap();
            return self.numeric(&caps[1]).is_some_and(|v| v & mask > 0);
        }

        if let Some(caps) = self.at_least.captures(condition) {
            let bound: u64 = caps[2].parse().unwrap();
            return self.numeric(&caps[1]).is_some_and(|v| v >= bound);
        }

        panic!("unexpected probe: {}", condition)
    }

    fn char_at(&self, expr: &str, pos: usize) -> Option<u64> {
        match self.values.get(expr)? {
            Value::Text(text) => text.as_bytes().get(pos.checked_sub(1)?).map(|b| u64::from(*b)),
            Value::Number(v) => v
                .to_string()
                .as_bytes()
                .get(pos.checked_sub(1)?)
                .map(|b| u64::from(*b)),
        }
    }

    fn numeric(&self, expr: &str) -> Option<u64> {
        if let Some(caps) = self.char_code.captures(expr) {
            return self.char_at(&caps[1], caps[2].parse().ok()?);
        }
        match self.values.get(expr)? {
            Value::Number(v) => Some(*v),
            Value::Text(text) => text.parse().ok(),
        }
    }
}

impl Default for FakeDb {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Oracle for FakeDb {
    async fn evaluate(&self, condition: &str) -> Result<bool> {
        Ok(self.answer(condition))
    }
}

/// Login page that greets the user when the injected condition holds.
pub struct ContentSite {
    pub db: Arc<FakeDb>,
}

#[async_trait]
impl Responder for ContentSite {
    async fn send(&self, payload: &str) -> std::result::Result<HttpResponse, TransportError> {
        let body = if self.db.answer(payload) { TRUE_BODY } else { FALSE_BODY };
        Ok(HttpResponse::new(200, body))
    }
}

/// Endpoint that always answers the same page but stalls on a MySQL
/// `IF((cond),SLEEP(n),0)` whose condition holds.
pub struct SleepySite {
    pub db: Arc<FakeDb>,
    wrapper: Regex,
}

impl SleepySite {
    pub fn new(db: Arc<FakeDb>) -> Self {
        Self {
            db,
            wrapper: Regex::new(r"^IF\(\((.*)\),SLEEP\(([\d.]+)\),0\)$").unwrap(),
        }
    }
}

#[async_trait]
impl Responder for SleepySite {
    async fn send(&self, payload: &str) -> std::result::Result<HttpResponse, TransportError> {
        let caps = self
            .wrapper
            .captures(payload)
            .unwrap_or_else(|| panic!("unexpected timing payload: {}", payload));
        if self.db.answer(&caps[1]) {
            let secs: f64 = caps[2].parse().unwrap();
            tokio::time::sleep(Duration::from_secs_f64(secs)).await;
        }
        Ok(HttpResponse::new(200, "ok"))
    }
}

/// Records payloads and answers every request with an empty page.
#[derive(Default)]
pub struct Spy {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Responder for Spy {
    async fn send(&self, _payload: &str) -> std::result::Result<HttpResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(HttpResponse::new(200, ""))
    }
}

/// Responder that always fails at the transport level.
#[derive(Default)]
pub struct Down {
    pub calls: AtomicUsize,
}

#[async_trait]
impl Responder for Down {
    async fn send(&self, _payload: &str) -> std::result::Result<HttpResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(TransportError::Other("connection refused".into()))
    }
}

/// Responder that takes a fixed time regardless of the payload.
pub struct Constant {
    pub latency: Duration,
    pub calls: AtomicUsize,
}

impl Constant {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Responder for Constant {
    async fn send(&self, _payload: &str) -> std::result::Result<HttpResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        Ok(HttpResponse::new(200, "ok"))
    }
}
