//! CDN edge-node discovery through a third-party distributed DNS probe.
//!
//! The service is driven in two steps: a form login that returns a short
//! lived session (`user`, `code`, `ut`), then a WebSocket on which one DNS
//! job is submitted and results stream back until `TaskEnd`. Every probe
//! node reports the address it resolved; the distinct first addresses are
//! the edge nodes to check.

use crate::client::{ensure_success, transport_error};
use crate::MirrorClient;
use futures_util::{SinkExt, Stream, StreamExt};
use mirrorcheck_core::{CheckError, Result, TrustLevel};
use reqwest::header::{REFERER, USER_AGENT};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::http::header::{
    HeaderValue, ORIGIN, USER_AGENT as WS_USER_AGENT,
};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Vantage-point service settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VantageConfig {
    /// CDN host that has fallback addresses
    pub default_host: String,
    /// Edge nodes used for `default_host` when discovery yields nothing
    pub fallback_ips: Vec<String>,
    /// Service site, also sent as `Origin`
    pub api_site: String,
    /// Login path under `api_site`
    pub api_path: String,
    /// Streaming endpoint
    pub socket_url: String,
    /// User-Agent sent to the service
    pub user_agent: String,
    /// Upper bound on one discovery session, in seconds
    pub session_timeout_secs: u64,
    /// Probe job parameters
    pub job: ProbeJob,
}

impl Default for VantageConfig {
    fn default() -> Self {
        Self {
            default_host: "cdn.packages.deepin.com".into(),
            fallback_ips: ["1.192.192.70", "221.130.199.56", "42.236.10.34", "36.110.211.9", "52.0.26.226"]
                .into_iter()
                .map(String::from)
                .collect(),
            api_site: "https://www.17ce.com".into(),
            api_path: "/site/checkuser".into(),
            socket_url: "wss://wsapi.17ce.com:8001/socket".into(),
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
                         Chrome/120.0 Safari/537.36"
                .into(),
            session_timeout_secs: 120,
            job: ProbeJob::default(),
        }
    }
}

/// Which probe nodes take part in a DNS job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeJob {
    /// Region codes
    pub areas: Vec<u32>,
    /// Carrier codes
    pub isps: Vec<u32>,
    /// Province codes
    pub pro_ids: Vec<u32>,
    /// Per-node timeout in seconds
    pub timeout_secs: u32,
}

impl Default for ProbeJob {
    fn default() -> Self {
        Self {
            areas: vec![0, 1, 2, 3],
            isps: vec![0, 1, 2, 6, 7, 8, 17, 18, 19, 3, 4],
            pro_ids: vec![
                12, 49, 79, 80, 180, 183, 184, 188, 189, 190, 192, 193, 194, 195, 196, 221, 227,
                235, 236, 238, 241, 243, 250, 346, 349, 350, 351, 353, 354, 355, 356, 357, 239,
                352, 3, 5, 8, 18, 27, 42, 43, 46, 47, 51, 56, 85,
            ],
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    rt: bool,
    #[serde(default)]
    data: LoginData,
}

#[derive(Debug, Default, Deserialize)]
struct LoginData {
    #[serde(default)]
    error: String,
    #[serde(default)]
    user: String,
    #[serde(default)]
    code: String,
    #[serde(default)]
    ut: i64,
}

/// Job submitted over the socket
#[derive(Debug, Serialize)]
struct SpeedRequest<'a> {
    txnid: u32,
    nodetype: u32,
    num: u32,
    #[serde(rename = "Url")]
    url: &'a str,
    #[serde(rename = "TestType")]
    test_type: &'static str,
    #[serde(rename = "Host")]
    host: &'a str,
    #[serde(rename = "TimeOut")]
    timeout: u32,
    #[serde(rename = "type")]
    kind: u32,
    isps: &'a [u32],
    pro_ids: &'a [u32],
    areas: &'a [u32],
}

impl<'a> SpeedRequest<'a> {
    fn dns(host: &'a str, job: &'a ProbeJob) -> Self {
        Self {
            txnid: 1,
            nodetype: 1,
            num: 1,
            url: "",
            test_type: "DNS",
            host,
            timeout: job.timeout_secs,
            kind: 1,
            isps: &job.isps,
            pro_ids: &job.pro_ids,
            areas: &job.areas,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SpeedResponse {
    #[serde(default)]
    error: String,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct NodeReport {
    #[serde(default, rename = "ErrMsg")]
    err_msg: String,
    #[serde(default, rename = "SrcIP")]
    src_ip: String,
}

/// First address of a `;`-separated resolver answer
fn first_address(answer: &str) -> Option<&str> {
    answer
        .split(';')
        .next()
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
}

/// Fold one streamed message into `nodes`; returns true at end of stream
fn absorb(message: &str, nodes: &mut Vec<String>) -> Result<bool> {
    let response: SpeedResponse = serde_json::from_str(message)?;
    match response.kind.as_str() {
        "TaskEnd" => return Ok(true),
        "TaskAccept" => debug!("probe job accepted"),
        "NewData" => match serde_json::from_value::<NodeReport>(response.data) {
            Ok(report) if !report.err_msg.is_empty() => {
                debug!(error = %report.err_msg, "probe node reported an error");
            }
            Ok(report) => {
                if let Some(ip) = first_address(&report.src_ip) {
                    if !nodes.iter().any(|n| n == ip) {
                        nodes.push(ip.to_string());
                    }
                }
            }
            Err(e) => warn!(error = %e, "unreadable probe node report"),
        },
        other if !response.error.is_empty() => {
            warn!(kind = other, error = %response.error, "probe service error");
        }
        other => debug!(kind = other, "ignoring probe message"),
    }
    Ok(false)
}

/// Next text payload from the socket, skipping control frames
async fn next_payload<S>(stream: &mut S) -> Result<String>
where
    S: Stream<Item = std::result::Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => return Ok(text.to_string()),
            Some(Ok(Message::Binary(bytes))) => {
                return String::from_utf8(bytes.to_vec())
                    .map_err(|e| CheckError::WebSocket(format!("non-UTF-8 payload: {e}")));
            }
            Some(Ok(Message::Close(_))) | None => {
                return Err(CheckError::WebSocket(
                    "socket closed before the job ended".into(),
                ))
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(CheckError::WebSocket(e.to_string())),
        }
    }
}

/// Discovered edge nodes per host, shared for the lifetime of a process
#[derive(Debug, Default)]
pub struct VantageCache {
    hosts: Mutex<HashMap<String, Vec<String>>>,
}

impl VantageCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached nodes for `host`
    #[must_use]
    pub fn get(&self, host: &str) -> Option<Vec<String>> {
        self.hosts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(host)
            .cloned()
    }

    /// Remember nodes for `host`
    pub fn insert(&self, host: &str, nodes: Vec<String>) {
        self.hosts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(host.to_string(), nodes);
    }
}

/// Resolves a CDN host to the edge nodes serving it
#[derive(Clone)]
pub struct VantagePointResolver {
    client: MirrorClient,
    config: Arc<VantageConfig>,
    cache: Arc<VantageCache>,
}

impl VantagePointResolver {
    /// Create a resolver with its own cache
    #[must_use]
    pub fn new(client: MirrorClient, config: VantageConfig) -> Self {
        Self::with_cache(client, config, Arc::new(VantageCache::new()))
    }

    /// Create a resolver sharing `cache`
    #[must_use]
    pub fn with_cache(client: MirrorClient, config: VantageConfig, cache: Arc<VantageCache>) -> Self {
        Self {
            client,
            config: Arc::new(config),
            cache,
        }
    }

    /// Distinct edge nodes for `host`
    ///
    /// Discoveries that find at least one node are cached; an empty answer
    /// is discovered again next time.
    pub async fn resolve(&self, host: &str) -> Result<Vec<String>> {
        if let Some(nodes) = self.cache.get(host) {
            debug!(host, nodes = nodes.len(), "vantage cache hit");
            return Ok(nodes);
        }

        let nodes = self.discover(host).await?;
        info!(host, nodes = nodes.len(), "discovered CDN edge nodes");
        if !nodes.is_empty() {
            self.cache.insert(host, nodes.clone());
        }
        Ok(nodes)
    }

    /// Like [`resolve`](Self::resolve), falling back to configured nodes
    ///
    /// Only the default CDN host has fallback nodes; other hosts resolve to
    /// an empty list on failure.
    pub async fn resolve_or_fallback(&self, host: &str) -> Vec<String> {
        match self.resolve(host).await {
            Ok(nodes) if !nodes.is_empty() => nodes,
            Ok(_) => {
                warn!(host, "discovery returned no edge nodes");
                self.fallback(host)
            }
            Err(e) => {
                warn!(host, error = %e, "edge node discovery failed");
                self.fallback(host)
            }
        }
    }

    /// Configured fallback nodes for `host`
    #[must_use]
    pub fn fallback(&self, host: &str) -> Vec<String> {
        if host == self.config.default_host {
            self.config.fallback_ips.clone()
        } else {
            Vec::new()
        }
    }

    /// Run one discovery session without touching the cache
    pub async fn discover(&self, host: &str) -> Result<Vec<String>> {
        let limit = Duration::from_secs(self.config.session_timeout_secs);
        tokio::time::timeout(limit, self.session(host))
            .await
            .map_err(|_| CheckError::Resolution(format!("discovery for {host} timed out")))?
    }

    async fn session(&self, host: &str) -> Result<Vec<String>> {
        let login = self.login(host).await?;
        debug!(user = %login.user, ut = login.ut, "vantage service session opened");

        let mut url = url::Url::parse(&self.config.socket_url)
            .map_err(|e| CheckError::InvalidUrl(format!("{}: {e}", self.config.socket_url)))?;
        url.query_pairs_mut()
            .append_pair("user", &login.user)
            .append_pair("code", &login.code)
            .append_pair("ut", &login.ut.to_string());

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| CheckError::WebSocket(e.to_string()))?;
        let headers = request.headers_mut();
        for (name, value) in [
            (WS_USER_AGENT, self.config.user_agent.as_str()),
            (ORIGIN, self.config.api_site.as_str()),
        ] {
            let value = HeaderValue::from_str(value)
                .map_err(|e| CheckError::Config(format!("invalid {name} header: {e}")))?;
            headers.insert(name, value);
        }

        let (socket, _) = connect_async(request)
            .await
            .map_err(|e| CheckError::WebSocket(e.to_string()))?;
        let (mut write, mut read) = socket.split();

        // The service greets before it accepts a job.
        next_payload(&mut read).await?;

        let job = serde_json::to_string(&SpeedRequest::dns(host, &self.config.job))?;
        write
            .send(Message::Text(job.into()))
            .await
            .map_err(|e| CheckError::WebSocket(e.to_string()))?;

        let mut nodes = Vec::new();
        loop {
            let payload = next_payload(&mut read).await?;
            if absorb(&payload, &mut nodes)? {
                break;
            }
        }

        let _ = write.send(Message::Close(None)).await;
        Ok(nodes)
    }

    async fn login(&self, host: &str) -> Result<LoginData> {
        let url = format!("{}{}", self.config.api_site, self.config.api_path);
        let response = self
            .client
            .http(TrustLevel::Normal)
            .post(&url)
            .header(REFERER, format!("{}/", self.config.api_site))
            .header(USER_AGENT, &self.config.user_agent)
            .form(&[("url", host), ("type", "dns"), ("isp", "0")])
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let body = ensure_success(response)?
            .text()
            .await
            .map_err(|e| transport_error(&e))?;
        let login: LoginResponse = serde_json::from_str(&body)?;

        if !login.data.error.is_empty() {
            return Err(CheckError::Resolution(format!(
                "vantage login rejected: {}",
                login.data.error
            )));
        }
        if !login.rt && login.data.user.is_empty() {
            return Err(CheckError::Resolution("vantage login returned no session".into()));
        }
        Ok(login.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_hdr_async;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LOGIN: &str = r#"{"rt":true,"data":{"error":"","user":"u1","code":"c0de","ut":1700000000}}"#;

    fn scripted_replies() -> Vec<String> {
        let report = |ip: &str, err: &str| {
            serde_json::json!({
                "rt": 1, "txnid": 1, "type": "NewData",
                "data": {"TaskId": "t", "NodeID": 1, "ErrMsg": err, "SrcIP": ip}
            })
            .to_string()
        };
        vec![
            r#"{"rt":1,"type":"TaskAccept","data":{}}"#.to_string(),
            report("10.0.0.1;10.0.0.9", ""),
            report("10.0.0.2", ""),
            report("10.0.0.1", ""),
            report("", ""),
            report("10.0.0.3", "resolve failed"),
            r#"{"rt":1,"type":"TaskEnd","data":{}}"#.to_string(),
        ]
    }

    /// One-shot socket server; returns its URL and the query it was opened with
    async fn socket_server() -> (String, tokio::task::JoinHandle<(String, String)>) {
        socket_server_with(scripted_replies(), 1).await
    }

    /// Socket server answering `sessions` discoveries with the same replies;
    /// returns the query and job of the last one
    async fn socket_server_with(
        replies: Vec<String>,
        sessions: usize,
    ) -> (String, tokio::task::JoinHandle<(String, String)>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/socket", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let mut last = (String::new(), String::new());
            for _ in 0..sessions {
                let (stream, _) = listener.accept().await.unwrap();
                let query = Arc::new(Mutex::new(String::new()));
                let seen = Arc::clone(&query);
                let callback = move |req: &Request,
                                     resp: Response|
                      -> std::result::Result<Response, ErrorResponse> {
                    *seen.lock().unwrap() = req.uri().query().unwrap_or_default().to_string();
                    Ok(resp)
                };
                let socket = accept_hdr_async(stream, callback).await.unwrap();
                let (mut write, mut read) = socket.split();

                write.send(Message::Text("welcome".to_string().into())).await.unwrap();
                let job = next_payload(&mut read).await.unwrap();
                for reply in &replies {
                    write.send(Message::Text(reply.clone().into())).await.unwrap();
                }
                // Wait for the client to hang up.
                let _ = read.next().await;
                let query = query.lock().unwrap().clone();
                last = (query, job);
            }
            last
        });
        (url, handle)
    }

    async fn login_server(expected_calls: u64) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/site/checkuser"))
            .and(body_string_contains("type=dns"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN))
            .expect(expected_calls)
            .mount(&server)
            .await;
        server
    }

    fn config(api_site: String, socket_url: String) -> VantageConfig {
        VantageConfig {
            api_site,
            socket_url,
            ..VantageConfig::default()
        }
    }

    #[test]
    fn first_address_of_answer() {
        assert_eq!(first_address("1.2.3.4;5.6.7.8"), Some("1.2.3.4"));
        assert_eq!(first_address(" 1.2.3.4 "), Some("1.2.3.4"));
        assert_eq!(first_address(""), None);
        assert_eq!(first_address(";1.2.3.4"), None);
    }

    #[test]
    fn job_carries_probe_selection() {
        let job = ProbeJob::default();
        let json = serde_json::to_value(SpeedRequest::dns("cdn.example.org", &job)).unwrap();
        assert_eq!(json["TestType"], "DNS");
        assert_eq!(json["Host"], "cdn.example.org");
        assert_eq!(json["TimeOut"], 10);
        assert_eq!(json["type"], 1);
        assert_eq!(json["areas"], serde_json::json!([0, 1, 2, 3]));
        assert_eq!(json["pro_ids"].as_array().unwrap().len(), 46);
    }

    #[tokio::test]
    async fn discovers_distinct_nodes_and_caches() {
        let login = login_server(1).await;
        let (socket_url, server) = socket_server().await;
        let resolver = VantagePointResolver::new(
            MirrorClient::new().unwrap(),
            config(login.uri(), socket_url),
        );

        let nodes = resolver.resolve("cdn.example.org").await.unwrap();
        assert_eq!(nodes, vec!["10.0.0.1", "10.0.0.2"]);

        let (query, job) = server.await.unwrap();
        assert!(query.contains("user=u1"));
        assert!(query.contains("code=c0de"));
        assert!(query.contains("ut=1700000000"));
        assert!(job.contains("\"Host\":\"cdn.example.org\""));

        // Served from cache: no second login, no socket.
        let again = resolver.resolve("cdn.example.org").await.unwrap();
        assert_eq!(again, nodes);
    }

    #[tokio::test]
    async fn empty_discovery_is_not_cached() {
        let replies = vec![
            r#"{"rt":1,"type":"TaskAccept","data":{}}"#.to_string(),
            r#"{"rt":1,"type":"TaskEnd","data":{}}"#.to_string(),
        ];
        let login = login_server(2).await;
        let (socket_url, server) = socket_server_with(replies, 2).await;
        let cache = Arc::new(VantageCache::new());
        let resolver = VantagePointResolver::with_cache(
            MirrorClient::new().unwrap(),
            config(login.uri(), socket_url),
            Arc::clone(&cache),
        );

        assert!(resolver.resolve("edge.example.org").await.unwrap().is_empty());
        assert!(cache.get("edge.example.org").is_none());

        // A second discovery runs instead of reusing the empty answer.
        assert!(resolver.resolve("edge.example.org").await.unwrap().is_empty());
        let (_, job) = server.await.unwrap();
        assert!(job.contains("\"Host\":\"edge.example.org\""));
    }

    #[tokio::test]
    async fn failed_discovery_falls_back_for_default_host_only() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"rt":false,"data":{"error":"too many requests"}}"#,
            ))
            .mount(&server)
            .await;
        let resolver = VantagePointResolver::new(
            MirrorClient::new().unwrap(),
            config(server.uri(), "ws://127.0.0.1:1/socket".into()),
        );

        let err = resolver.resolve("cdn.packages.deepin.com").await.unwrap_err();
        assert!(matches!(err, CheckError::Resolution(_)));

        let fallback = resolver.resolve_or_fallback("cdn.packages.deepin.com").await;
        assert_eq!(fallback.len(), 5);
        assert_eq!(fallback[0], "1.192.192.70");
        assert!(resolver.resolve_or_fallback("other.example.org").await.is_empty());
    }
}
