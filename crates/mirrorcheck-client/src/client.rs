//! Main mirror client implementation.

use crate::api::*;
use crate::config::{HttpTuning, Profile, RetryConfig};
use crate::retry::{HostTimeoutTracker, RetryPolicy};
use mirrorcheck_core::{CheckError, Result, TrustLevel};
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

/// Client for probing the source repository, mirrors and CDN nodes
///
/// Holds one HTTP client per trust level so hidden mirrors get their own
/// timeouts and connection pool.
#[derive(Clone)]
pub struct MirrorClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    normal: HttpClient,
    hidden: HttpClient,
    profile: Profile,
    retry: RetryPolicy,
}

impl MirrorClient {
    /// Create a production client with default settings
    pub fn new() -> Result<Self> {
        MirrorClientBuilder::new().build()
    }

    /// Create a builder for custom configuration
    #[must_use]
    pub fn builder() -> MirrorClientBuilder {
        MirrorClientBuilder::new()
    }

    /// Access change-index endpoints of a source repository
    #[must_use]
    pub fn changes<'a>(&'a self, source: &'a ChangeSource) -> ChangesApi<'a> {
        ChangesApi::new(self, source)
    }

    /// Access the target list endpoint
    #[must_use]
    pub fn mirrors(&self) -> MirrorsApi<'_> {
        MirrorsApi::new(self)
    }

    /// Access byte-range fingerprinting
    #[must_use]
    pub fn fingerprints(&self) -> FingerprintApi<'_> {
        FingerprintApi::new(self)
    }

    /// Profile the client was built for
    #[must_use]
    pub fn profile(&self) -> Profile {
        self.inner.profile
    }

    /// Retry policy shared by every check made through this client
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.inner.retry
    }

    /// HTTP client for targets of the given trust level
    pub(crate) fn http(&self, trust: TrustLevel) -> &HttpClient {
        match trust {
            TrustLevel::Normal => &self.inner.normal,
            TrustLevel::Hidden => &self.inner.hidden,
        }
    }

    /// GET a URL and decode the JSON body
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let body = self.get_text(url).await?;
        serde_json::from_str(&body).map_err(CheckError::Json)
    }

    /// GET a URL and return the body as text
    pub(crate) async fn get_text(&self, url: &str) -> Result<String> {
        debug!(url = %url, "GET request");

        let response = self
            .inner
            .normal
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let response = ensure_success(response)?;
        response.text().await.map_err(|e| transport_error(&e))
    }
}

/// Reject non-2xx responses with a status error
pub(crate) fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(CheckError::Status {
            code: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
        })
    }
}

/// Convert a transport error, keeping its full source chain in the message
///
/// Connect timeouts are reported against `host:port` so the retry policy can
/// count them per host.
pub(crate) fn transport_error(err: &reqwest::Error) -> CheckError {
    let message = error_chain(err);

    if err.is_connect() && err.is_timeout() {
        if let Some(host) = err.url().and_then(host_port) {
            return CheckError::ConnectTimeout { host };
        }
    }

    CheckError::Http(message)
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

fn host_port(url: &url::Url) -> Option<String> {
    let host = url.host_str()?;
    let port = url.port_or_known_default()?;
    Some(format!("{host}:{port}"))
}

/// Builder for configuring a [`MirrorClient`]
pub struct MirrorClientBuilder {
    profile: Profile,
    user_agent: String,
    max_retries: Option<u32>,
    retry_config: RetryConfig,
    accept_invalid_certs: bool,
    host_timeouts: Option<Arc<HostTimeoutTracker>>,
}

impl Default for MirrorClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MirrorClientBuilder {
    /// Create a new builder for the production profile
    #[must_use]
    pub fn new() -> Self {
        Self {
            profile: Profile::default(),
            user_agent: format!("mirrorcheck/{}", env!("CARGO_PKG_VERSION")),
            max_retries: None,
            retry_config: RetryConfig::default(),
            accept_invalid_certs: true,
            host_timeouts: None,
        }
    }

    /// Set the deployment profile
    #[must_use]
    pub const fn profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    /// Set the User-Agent header
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Override the profile's retry budget
    #[must_use]
    pub const fn max_retries(mut self, max: u32) -> Self {
        self.max_retries = Some(max);
        self
    }

    /// Set retry configuration (jitter bounds and host timeout cap)
    #[must_use]
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// Whether TLS certificates are verified
    #[must_use]
    pub const fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Share a host timeout tracker with other clients
    #[must_use]
    pub fn host_timeouts(mut self, tracker: Arc<HostTimeoutTracker>) -> Self {
        self.host_timeouts = Some(tracker);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<MirrorClient> {
        let normal = self.http_client(self.profile.tuning(TrustLevel::Normal))?;
        let hidden = self.http_client(self.profile.tuning(TrustLevel::Hidden))?;

        let retry_config = self
            .retry_config
            .max_retries(self.max_retries.unwrap_or_else(|| self.profile.default_max_retries()));
        let retry = match self.host_timeouts {
            Some(tracker) => RetryPolicy::with_tracker(retry_config, tracker),
            None => RetryPolicy::new(retry_config),
        };

        Ok(MirrorClient {
            inner: Arc::new(ClientInner {
                normal,
                hidden,
                profile: self.profile,
                retry,
            }),
        })
    }

    fn http_client(&self, tuning: HttpTuning) -> Result<HttpClient> {
        HttpClient::builder()
            .timeout(tuning.timeout)
            .connect_timeout(tuning.connect_timeout)
            .tcp_keepalive(tuning.keepalive)
            .pool_idle_timeout(tuning.idle_timeout)
            .user_agent(&self.user_agent)
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .gzip(true)
            .build()
            .map_err(|e| CheckError::Config(format!("failed to build HTTP client: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn builder_applies_profile_retry_budget() {
        let dev = MirrorClient::builder()
            .profile(Profile::Development)
            .build()
            .unwrap();
        assert_eq!(dev.retry_policy().config().max_retries, 2);

        let prod = MirrorClient::builder().max_retries(7).build().unwrap();
        assert_eq!(prod.retry_policy().config().max_retries, 7);
        assert_eq!(prod.profile(), Profile::Production);
    }

    #[test]
    fn shared_tracker_is_reused() {
        let tracker = Arc::new(HostTimeoutTracker::new(25));
        let client = MirrorClient::builder()
            .host_timeouts(Arc::clone(&tracker))
            .build()
            .unwrap();
        tracker.admit("h:80");
        assert_eq!(client.retry_policy().host_timeouts().count("h:80"), 1);
    }

    #[tokio::test]
    async fn non_success_status_becomes_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = MirrorClient::new().unwrap();
        let err = client
            .get_text(&format!("{}/gone", server.uri()))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "response status is 503 Service Unavailable");
    }

    #[tokio::test]
    async fn refused_connection_keeps_source_chain() {
        // Bind then drop to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = MirrorClient::new().unwrap();
        let err = client
            .get_text(&format!("http://{addr}/x"))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckError::Http(_)));
        assert!(err.to_string().to_lowercase().contains("connection refused"));
    }
}
