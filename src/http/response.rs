use cookie::Cookie;
use std::collections::HashMap;
use std::time::Duration;

/// Response as seen by oracles and spray probes.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    /// Header names are lowercase; repeated headers keep the last value.
    pub headers: HashMap<String, String>,
    /// `(name, value)` pairs from every `Set-Cookie` header.
    pub cookies: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub body_len: usize,
    /// Round trip measured by the transport, from the moment the request
    /// left (after any rate-limit wait) until the body was read. `None` when
    /// the responder does not measure it.
    pub elapsed: Option<Duration>,
}

impl HttpResponse {
    /// Builds a response from a status and a body. Mostly for custom
    /// responders that do not go through [`super::client::HttpClient`].
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        let body = body.into();
        Self {
            status,
            body_len: body.len(),
            body,
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if name.eq_ignore_ascii_case("set-cookie") {
            if let Ok(cookie) = Cookie::parse(value) {
                self.cookies
                    .push((cookie.name().to_string(), cookie.value().to_string()));
            }
        }
        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = Some(elapsed);
        self
    }

    /// Get body as UTF-8 string (lossy conversion)
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Value of the last `Set-Cookie` with this name.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_lookup() {
        let resp = HttpResponse::new(200, "ok")
            .with_header("Set-Cookie", "session=abc123; Path=/; HttpOnly")
            .with_header("Set-Cookie", "theme=dark");
        assert_eq!(resp.cookie("session"), Some("abc123"));
        assert_eq!(resp.cookie("theme"), Some("dark"));
        assert_eq!(resp.cookie("missing"), None);
        assert_eq!(resp.header("set-cookie"), Some("theme=dark"));
        assert_eq!(resp.body_len, 2);
    }

    #[test]
    fn test_malformed_set_cookie_is_ignored() {
        let resp = HttpResponse::new(200, "")
            .with_header("Set-Cookie", "novalue")
            .with_header("Set-Cookie", "token=t0k3n; Secure; SameSite=Strict");
        assert_eq!(resp.cookies.len(), 1);
        assert_eq!(resp.cookie("token"), Some("t0k3n"));
    }
}
