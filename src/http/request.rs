use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use url::Url;

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Set request body from string
    pub fn set_body(&mut self, body: String) {
        self.body = Some(body.into_bytes());
    }

    /// Set a header. Names or values that are not valid HTTP are skipped.
    pub fn set_header(&mut self, name: &str, value: &str) -> bool {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
                true
            }
            _ => false,
        }
    }

    /// Create a GET request
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Create a urlencoded form POST
    pub fn form(url: Url, fields: &[(String, String)]) -> Self {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        let mut req = Self::new(Method::POST, url);
        req.set_body(body);
        req.set_header("Content-Type", "application/x-www-form-urlencoded");
        req
    }

    /// Create a JSON POST
    pub fn json(url: Url, value: &serde_json::Value) -> Self {
        let mut req = Self::new(Method::POST, url);
        req.set_body(value.to_string());
        req.set_header("Content-Type", "application/json");
        req
    }

    /// Replaces (or appends) a query parameter, keeping the others in place.
    pub fn set_query_param(&mut self, name: &str, value: &str) {
        let mut pairs: Vec<(String, String)> = self
            .url
            .query_pairs()
            .map(|(k, v)| {
                if k == name {
                    (k.to_string(), value.to_string())
                } else {
                    (k.to_string(), v.to_string())
                }
            })
            .collect();

        if !pairs.iter().any(|(k, _)| k == name) {
            pairs.push((name.to_string(), value.to_string()));
        }

        self.url.query_pairs_mut().clear().extend_pairs(pairs);
    }
}
