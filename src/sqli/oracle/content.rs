//! Content oracle: the answer is read off the response itself.

use super::{Injection, Oracle, RetryPolicy};
use crate::error::{BlindError, Result};
use crate::http::{HttpResponse, Responder};
use async_trait::async_trait;
use regex::Regex;

/// Decides whether a response means "true".
pub trait TruthTest: Send + Sync {
    fn is_true(&self, response: &HttpResponse) -> bool;
}

impl<F> TruthTest for F
where
    F: Fn(&HttpResponse) -> bool + Send + Sync,
{
    fn is_true(&self, response: &HttpResponse) -> bool {
        self(response)
    }
}

/// Built-in truth tests.
#[derive(Debug, Clone)]
pub enum Marker {
    /// Body contains the text.
    BodyContains(String),
    /// Body does not contain the text.
    BodyLacks(String),
    Status(u16),
    /// JSON body has `value` at the RFC 6901 `pointer`.
    JsonEquals {
        pointer: String,
        value: serde_json::Value,
    },
    Regex(Regex),
}

impl Marker {
    /// Parses `contains:TEXT`, `lacks:TEXT`, `status:CODE`, `regex:PATTERN`
    /// or `json:/pointer=VALUE`. Bare text means `contains:`.
    pub fn parse(spec: &str) -> Result<Self> {
        let Some((kind, arg)) = spec.split_once(':') else {
            return Ok(Marker::BodyContains(spec.to_string()));
        };
        match kind {
            "contains" => Ok(Marker::BodyContains(arg.to_string())),
            "lacks" => Ok(Marker::BodyLacks(arg.to_string())),
            "status" => arg
                .trim()
                .parse()
                .map(Marker::Status)
                .map_err(|_| BlindError::invalid_config(format!("bad status marker '{}'", arg))),
            "regex" => Regex::new(arg)
                .map(Marker::Regex)
                .map_err(|e| BlindError::invalid_config(format!("bad regex marker: {}", e))),
            "json" => {
                let (pointer, raw) = arg.split_once('=').ok_or_else(|| {
                    BlindError::invalid_config(format!("json marker needs /pointer=value, got '{}'", arg))
                })?;
                // Unquoted values are taken as strings.
                let value = serde_json::from_str(raw)
                    .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
                Ok(Marker::JsonEquals {
                    pointer: pointer.to_string(),
                    value,
                })
            }
            _ => Ok(Marker::BodyContains(spec.to_string())),
        }
    }
}

impl TruthTest for Marker {
    fn is_true(&self, response: &HttpResponse) -> bool {
        match self {
            Marker::BodyContains(text) => response.body_text().contains(text.as_str()),
            Marker::BodyLacks(text) => !response.body_text().contains(text.as_str()),
            Marker::Status(code) => response.status == *code,
            Marker::JsonEquals { pointer, value } => {
                serde_json::from_slice::<serde_json::Value>(&response.body)
                    .ok()
                    .and_then(|json| json.pointer(pointer).cloned())
                    .is_some_and(|found| &found == value)
            }
            Marker::Regex(re) => re.is_match(&response.body_text()),
        }
    }
}

/// Oracle that wraps the condition in the injection context and applies a
/// [`TruthTest`] to the response.
pub struct ContentOracle<R, T = Marker> {
    responder: R,
    injection: Injection,
    test: T,
    retry: RetryPolicy,
}

impl<R, T> ContentOracle<R, T>
where
    R: Responder,
    T: TruthTest,
{
    pub fn new(responder: R, injection: Injection, test: T) -> Self {
        Self {
            responder,
            injection,
            test,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl<R, T> Oracle for ContentOracle<R, T>
where
    R: Responder,
    T: TruthTest,
{
    async fn evaluate(&self, condition: &str) -> Result<bool> {
        let payload = self.injection.wrap(condition);
        let (response, _) = self.retry.send(&self.responder, &payload).await?;
        let answer = self.test.is_true(&response);
        tracing::trace!(condition, status = response.status, answer, "content probe");
        Ok(answer)
    }
}
