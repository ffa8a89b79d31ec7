//! Spray probe for token/credential endpoints.

use crate::error::TransportError;
use crate::http::responder::Responder;
use crate::spray::SprayCandidate;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;

/// Sends each candidate through a [`Responder`] (typically an
/// [`super::HttpResponder`] with a JSON injection point) and counts a
/// `200` response containing `marker` as a hit.
pub struct TokenProbe<R> {
    responder: R,
    marker: String,
    cookie: Option<String>,
}

impl<R: Responder + 'static> TokenProbe<R> {
    pub fn new(responder: R, marker: impl Into<String>) -> Self {
        Self {
            responder,
            marker: marker.into(),
            cookie: None,
        }
    }

    /// Name of the cookie whose value is reported with a hit.
    pub fn correlate_cookie(mut self, name: impl Into<String>) -> Self {
        self.cookie = Some(name.into());
        self
    }

    pub async fn check(
        &self,
        candidate: SprayCandidate,
    ) -> Result<Option<SprayCandidate>, TransportError> {
        let response = self.responder.send(&candidate.value).await?;
        if response.status != 200 || !response.body_text().contains(&self.marker) {
            return Ok(None);
        }

        let correlated = self
            .cookie
            .as_deref()
            .and_then(|name| response.cookie(name))
            .map(str::to_string);
        tracing::debug!(candidate = %candidate.value, ?correlated, "token accepted");
        Ok(Some(SprayCandidate {
            value: candidate.value,
            correlated,
        }))
    }

    /// Probe closure for [`crate::spray::SprayEngine::race`].
    pub fn into_probe(
        self,
    ) -> impl Fn(SprayCandidate) -> BoxFuture<'static, Result<Option<SprayCandidate>, TransportError>>
           + Send
           + Sync
           + 'static {
        let probe = Arc::new(self);
        move |candidate| {
            let probe = Arc::clone(&probe);
            async move { probe.check(candidate).await }.boxed()
        }
    }
}
