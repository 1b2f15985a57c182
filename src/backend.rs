//! Graph data source: the HTTP boundary the navigator fetches contexts from.

use anyhow::{Context, Result, bail};
use log::debug;
use uuid::Uuid;

use crate::graph::ContextPayload;

/// Provider of per-context graph data.
///
/// Implemented by [`HttpBackend`] in production and by in-memory fakes in
/// tests. Errors are terminal for the navigation that issued the fetch; the
/// caller leaves prior state untouched.
pub trait GraphSource {
    fn fetch(&self, file: Uuid, context: &str) -> Result<ContextPayload>;
}

/// Blocking HTTP client for the render backend.
pub struct HttpBackend {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl GraphSource for HttpBackend {
    fn fetch(&self, file: Uuid, context: &str) -> Result<ContextPayload> {
        let url = format!("{}/node_data", self.base_url);
        debug!("Fetching node data: {url} uuid={file} name={context}");

        let response = self
            .client
            .get(&url)
            .query(&[("uuid", file.to_string().as_str()), ("name", context)])
            .send()
            .with_context(|| format!("Failed to reach {url}"))?;

        let status = response.status();
        if !status.is_success() {
            bail!("Node data fetch for {context} failed: HTTP {status}");
        }

        let body = response.text().context("Failed to read node data body")?;
        serde_json::from_str(&body)
            .with_context(|| format!("Malformed node data payload for {context}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let backend = HttpBackend::new("http://localhost:5000/");
        assert_eq!(backend.base_url, "http://localhost:5000");
    }
}
