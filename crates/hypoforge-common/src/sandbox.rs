use reqwest::{Client, ClientBuilder};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;
use crate::error::HypoforgeError;

const USER_AGENT: &str = concat!("Hypoforge/", env!("CARGO_PKG_VERSION"), " (research)");

/// An HTTP client that only allows requests to approved domains.
/// Every request carries the timeout given at construction.
#[derive(Debug, Clone)]
pub struct SandboxClient {
    client: Client,
    allowlist: HashSet<String>,
}

impl SandboxClient {
    /// Creates a new SandboxClient allowing the preprint, bibliographic and
    /// publishing hosts. Model backends keep their own clients.
    pub fn new(timeout: Duration) -> Result<Self, HypoforgeError> {
        let mut allowlist = HashSet::new();
        let domains = vec![
            "api.biorxiv.org",         // bioRxiv / medRxiv
            "api.semanticscholar.org", // Semantic Scholar
            "seechat.ai",              // Hypothesis platform (incl. api.staging.)
            "127.0.0.1",               // local mirrors and test servers
        ];

        for d in domains {
            allowlist.insert(d.to_string());
        }

        let client = ClientBuilder::new()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| HypoforgeError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, allowlist })
    }

    /// Appends an exact hostname to the allowlist.
    pub fn allow_domain(&mut self, domain: &str) {
        self.allowlist.insert(domain.to_string());
    }

    /// Appends the host of `url` to the allowlist. Used for operator-configured endpoints.
    pub fn allow_url_host(&mut self, url: &str) -> Result<(), HypoforgeError> {
        let parsed = Url::parse(url)
            .map_err(|e| HypoforgeError::Config(format!("invalid URL {url}: {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| HypoforgeError::Config(format!("URL has no host: {url}")))?;
        self.allow_domain(host);
        Ok(())
    }

    /// Validates if a URL is permitted under the current sandbox policy.
    pub fn is_allowed(&self, url: &str) -> bool {
        if let Ok(parsed) = Url::parse(url) {
            if let Some(host) = parsed.host_str() {
                // Exact match or subdomain of an allowed domain
                for allowed in &self.allowlist {
                    if host == allowed || host.ends_with(&format!(".{}", allowed)) {
                        return true;
                    }
                }
            }
        }
        false
    }

    pub fn get(&self, url: &str) -> Result<reqwest::RequestBuilder, HypoforgeError> {
        self.check(url)?;
        Ok(self.client.get(url))
    }

    pub fn post(&self, url: &str) -> Result<reqwest::RequestBuilder, HypoforgeError> {
        self.check(url)?;
        Ok(self.client.post(url))
    }

    /// Sends a request and turns any non-2xx status into `HypoforgeError::Status`.
    pub async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, HypoforgeError> {
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(HypoforgeError::Status { status: status.as_u16(), body });
        }
        Ok(resp)
    }

    fn check(&self, url: &str) -> Result<(), HypoforgeError> {
        if !self.is_allowed(url) {
            return Err(HypoforgeError::SecurityError(format!(
                "Network capabilities capped: domain not in allowlist for URL {}",
                url
            )));
        }
        Ok(())
    }
}
