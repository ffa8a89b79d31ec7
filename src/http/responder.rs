//! Transport seam between the engine and a live target.
//!
//! The engine hands a finished payload string to a [`Responder`] and gets a
//! response back; it never builds sockets itself. [`HttpResponder`] is the
//! stock implementation that drops the payload into one slot of a request
//! template.

use crate::error::TransportError;
use crate::http::client::HttpClient;
use crate::http::request::HttpRequest;
use crate::http::response::HttpResponse;
use async_trait::async_trait;
use reqwest::Method;
use std::sync::Arc;
use url::Url;

/// Sends one injected payload and returns the raw response.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn send(&self, payload: &str) -> Result<HttpResponse, TransportError>;
}

#[async_trait]
impl<R: Responder + ?Sized> Responder for Arc<R> {
    async fn send(&self, payload: &str) -> Result<HttpResponse, TransportError> {
        (**self).send(payload).await
    }
}

#[async_trait]
impl<R: Responder + ?Sized> Responder for &R {
    async fn send(&self, payload: &str) -> Result<HttpResponse, TransportError> {
        (**self).send(payload).await
    }
}

/// Where the payload goes in the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectionPoint {
    Query(String),
    Header(String),
    Form(String),
    Json(String),
}

impl InjectionPoint {
    /// Parses `query:name`, `header:name`, `form:name` or `json:name`.
    /// A bare name means a query parameter.
    pub fn parse(spec: &str) -> Result<Self, TransportError> {
        let (kind, name) = match spec.split_once(':') {
            Some((kind, name)) => (kind.to_ascii_lowercase(), name.to_string()),
            None => ("query".to_string(), spec.to_string()),
        };
        if name.is_empty() {
            return Err(TransportError::InvalidRequest(format!(
                "empty parameter name in '{}'",
                spec
            )));
        }
        match kind.as_str() {
            "query" => Ok(Self::Query(name)),
            "header" => Ok(Self::Header(name)),
            "form" | "body" => Ok(Self::Form(name)),
            "json" => Ok(Self::Json(name)),
            other => Err(TransportError::InvalidRequest(format!(
                "unknown injection location '{}'",
                other
            ))),
        }
    }
}

/// Fixed parts of the request every probe shares.
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    pub method: Method,
    pub url: Url,
    pub point: InjectionPoint,
    /// Other body fields sent with form/JSON injections.
    pub extra_fields: Vec<(String, String)>,
}

impl RequestTemplate {
    pub fn new(method: Method, url: Url, point: InjectionPoint) -> Self {
        Self {
            method,
            url,
            point,
            extra_fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: &str, value: &str) -> Self {
        self.extra_fields.push((name.to_string(), value.to_string()));
        self
    }

    /// Materializes the request carrying `payload`.
    pub fn render(&self, payload: &str) -> Result<HttpRequest, TransportError> {
        let mut req = match &self.point {
            InjectionPoint::Query(name) => {
                let mut req = HttpRequest::new(self.method.clone(), self.url.clone());
                req.set_query_param(name, payload);
                req
            }
            InjectionPoint::Header(name) => {
                let mut req = HttpRequest::new(self.method.clone(), self.url.clone());
                if !req.set_header(name, payload) {
                    return Err(TransportError::InvalidRequest(format!(
                        "payload is not a valid value for header {}",
                        name
                    )));
                }
                req
            }
            InjectionPoint::Form(name) => {
                let mut fields = self.extra_fields.clone();
                fields.push((name.clone(), payload.to_string()));
                HttpRequest::form(self.url.clone(), &fields)
            }
            InjectionPoint::Json(name) => {
                let mut body = serde_json::Map::new();
                for (k, v) in &self.extra_fields {
                    body.insert(k.clone(), serde_json::Value::String(v.clone()));
                }
                body.insert(name.clone(), serde_json::Value::String(payload.to_string()));
                HttpRequest::json(self.url.clone(), &serde_json::Value::Object(body))
            }
        };
        if matches!(self.point, InjectionPoint::Form(_) | InjectionPoint::Json(_)) {
            req.method = self.method.clone();
        }
        Ok(req)
    }
}

/// [`Responder`] backed by the shared [`HttpClient`].
pub struct HttpResponder {
    client: Arc<HttpClient>,
    template: RequestTemplate,
}

impl HttpResponder {
    pub fn new(client: Arc<HttpClient>, template: RequestTemplate) -> Self {
        Self { client, template }
    }
}

#[async_trait]
impl Responder for HttpResponder {
    async fn send(&self, payload: &str) -> Result<HttpResponse, TransportError> {
        let req = self.template.render(payload)?;
        self.client.execute(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("http://target.local/api/check?u=maria").unwrap()
    }

    #[test]
    fn test_parse_injection_points() {
        assert_eq!(InjectionPoint::parse("u").unwrap(), InjectionPoint::Query("u".into()));
        assert_eq!(
            InjectionPoint::parse("header:User-Agent").unwrap(),
            InjectionPoint::Header("User-Agent".into())
        );
        assert_eq!(InjectionPoint::parse("JSON:token").unwrap(), InjectionPoint::Json("token".into()));
        assert!(InjectionPoint::parse("cookie:x").is_err());
        assert!(InjectionPoint::parse("form:").is_err());
    }

    #[test]
    fn test_render_query() {
        let template = RequestTemplate::new(Method::GET, url(), InjectionPoint::Query("u".into()));
        let req = template.render("maria' AND (1=1)-- -").unwrap();
        assert!(req.url.as_str().contains("u=maria%27+AND+%281%3D1%29--+-"));
    }

    #[test]
    fn test_render_header() {
        let template = RequestTemplate::new(Method::GET, url(), InjectionPoint::Header("User-Agent".into()));
        let req = template.render("'; IF(1=1) WAITFOR DELAY '00:00:03'--").unwrap();
        assert_eq!(
            req.headers.get("user-agent").unwrap(),
            "'; IF(1=1) WAITFOR DELAY '00:00:03'--"
        );
        assert!(template.render("bad\nvalue").is_err());
    }

    #[test]
    fn test_render_json_keeps_extra_fields() {
        let template = RequestTemplate::new(Method::POST, url(), InjectionPoint::Json("token".into()))
            .with_field("user", "maria");
        let req = template.render("abc").unwrap();
        let body: serde_json::Value = serde_json::from_slice(&req.body.unwrap()).unwrap();
        assert_eq!(body["token"], "abc");
        assert_eq!(body["user"], "maria");
        assert_eq!(req.method, Method::POST);
    }
}
