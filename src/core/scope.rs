use crate::error::TransportError;
use url::Url;

/// Hosts the transport is allowed to talk to.
#[derive(Debug, Clone)]
pub struct Scope {
    allowed_hosts: Vec<String>,
}

impl Scope {
    /// Scope limited to the host of `target`.
    pub fn new(target: &Url) -> Result<Self, TransportError> {
        let host = target
            .host_str()
            .ok_or_else(|| TransportError::InvalidRequest(format!("no host in {}", target)))?;

        Ok(Self {
            allowed_hosts: vec![host.to_ascii_lowercase()],
        })
    }

    pub fn allow_host(mut self, host: &str) -> Self {
        self.allowed_hosts.push(host.to_ascii_lowercase());
        self
    }

    pub fn is_in_scope(&self, url: &Url) -> bool {
        match url.host_str() {
            Some(host) => self
                .allowed_hosts
                .iter()
                .any(|h| h.eq_ignore_ascii_case(host)),
            None => false,
        }
    }
}
