use super::HealthChecker;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::OnceLock;
use std::time::Duration;

/// Shared HTTP client for health probes.
///
/// Requests set their own timeout; the 30s client timeout is only a fallback.
static SHARED_HTTP_CLIENT: OnceLock<Client> = OnceLock::new();

fn get_shared_client() -> &'static Client {
    SHARED_HTTP_CLIENT.get_or_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .build()
            .expect("Failed to create shared HTTP client")
    })
}

/// Probes a runtime's HTTP endpoint; any 2xx answer counts as healthy.
pub struct HttpChecker {
    url: String,
    client: Client,
    timeout: Duration,
}

impl HttpChecker {
    /// Checker for an arbitrary http(s) URL.
    ///
    /// # Errors
    ///
    /// Returns error if URL is malformed or uses unsupported scheme.
    pub fn new(url: String, timeout: Duration) -> Result<Self> {
        Self::validate_url(&url)?;

        Ok(Self {
            url,
            client: get_shared_client().clone(),
            timeout,
        })
    }

    /// Checker for `http://127.0.0.1:<port><path>`.
    pub fn for_port(port: u16, path: &str, timeout: Duration) -> Result<Self> {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        Self::new(format!("http://127.0.0.1:{}{}", port, path), timeout)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn validate_url(url: &str) -> Result<()> {
        match url::Url::parse(url) {
            Ok(parsed) => {
                let scheme = parsed.scheme();
                if scheme != "http" && scheme != "https" {
                    return Err(Error::Config(format!(
                        "Invalid health URL '{}': scheme must be http or https, got '{}'",
                        url, scheme
                    )));
                }
                Ok(())
            }
            Err(e) => Err(Error::Config(format!(
                "Invalid health URL '{}': {}",
                url, e
            ))),
        }
    }
}

#[async_trait]
impl HealthChecker for HttpChecker {
    async fn check(&self) -> Result<bool> {
        match self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                tracing::debug!("Health probe {} failed: {}", self.url, e);
                Ok(false)
            }
        }
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}
