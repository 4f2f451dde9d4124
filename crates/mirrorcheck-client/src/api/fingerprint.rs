//! Byte-range fingerprinting.
//!
//! A fingerprint is taken with at most two range requests: the first chunk,
//! whose `Content-Range` reveals the total size, and then the tail chunk.
//! Both bodies feed one running SHA-256.

use crate::client::{ensure_success, transport_error};
use crate::MirrorClient;
use mirrorcheck_core::hash::{self, WindowDigest, CHUNK_SIZE};
use mirrorcheck_core::{CheckError, Fingerprint, Result, TrustLevel};
use reqwest::header::{CONTENT_RANGE, HOST, LAST_MODIFIED, RANGE};
use reqwest::StatusCode;
use std::ops::Range;
use tracing::debug;

/// Where a file is fetched from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    /// URL prefix the file path is appended to
    pub url_prefix: String,
    /// `Host` header override (CDN edge nodes)
    pub host_header: Option<String>,
    /// Selects the HTTP client and whether retries are allowed
    pub trust: TrustLevel,
}

impl ProbeTarget {
    /// Target a URL prefix with normal trust
    #[must_use]
    pub fn new(url_prefix: impl Into<String>) -> Self {
        Self {
            url_prefix: url_prefix.into(),
            host_header: None,
            trust: TrustLevel::Normal,
        }
    }

    /// Set the trust level
    #[must_use]
    pub const fn with_trust(mut self, trust: TrustLevel) -> Self {
        self.trust = trust;
        self
    }

    /// Target one CDN edge node by address (optionally `ip:port`), keeping the CDN host as `Host`
    ///
    /// `https://cdn.example.org/repo/` probed through `10.0.0.1` becomes
    /// `http://10.0.0.1/repo/` with `Host: cdn.example.org`.
    pub fn cdn_node(url_prefix: &str, node_ip: &str) -> Result<Self> {
        let parsed = url::Url::parse(url_prefix)
            .map_err(|e| CheckError::InvalidUrl(format!("{url_prefix}: {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| CheckError::InvalidUrl(format!("{url_prefix}: missing host")))?;

        let address = if node_ip.parse::<std::net::Ipv6Addr>().is_ok() {
            format!("[{node_ip}]")
        } else {
            node_ip.to_string()
        };

        Ok(Self {
            url_prefix: format!("http://{address}{}", parsed.path()),
            host_header: Some(host.to_string()),
            trust: TrustLevel::Normal,
        })
    }

    /// Full URL of `path` under this target
    #[must_use]
    pub fn file_url(&self, path: &str) -> String {
        let prefix = self.url_prefix.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{prefix}/{path}")
    }
}

/// Parsed `Content-Range: bytes <start>-<end>/<total>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    /// First byte served
    pub start: u64,
    /// Last byte served (inclusive)
    pub end: u64,
    /// Total size of the file
    pub total: u64,
}

impl ContentRange {
    /// Parse the header value; unknown totals (`*`) are rejected
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = || CheckError::protocol(format!("invalid Content-Range {value:?}"));

        let spec = value.trim().strip_prefix("bytes ").ok_or_else(invalid)?;
        let (range, total) = spec.split_once('/').ok_or_else(invalid)?;
        let (start, end) = range.split_once('-').ok_or_else(invalid)?;

        let parsed = Self {
            start: start.trim().parse().map_err(|_| invalid())?,
            end: end.trim().parse().map_err(|_| invalid())?,
            total: total.trim().parse().map_err(|_| invalid())?,
        };
        if parsed.start > parsed.end || parsed.end >= parsed.total {
            return Err(invalid());
        }
        Ok(parsed)
    }
}

/// Byte-range fingerprinting endpoints
pub struct FingerprintApi<'a> {
    client: &'a MirrorClient,
}

impl<'a> FingerprintApi<'a> {
    pub(crate) fn new(client: &'a MirrorClient) -> Self {
        Self { client }
    }

    /// Fingerprint `path` on `target`, retrying per the client policy
    ///
    /// Hidden targets are tried once.
    pub async fn fetch(&self, target: &ProbeTarget, path: &str) -> Result<Fingerprint> {
        let url = target.file_url(path);
        self.client
            .retry_policy()
            .run(&url, target.trust.allows_retry(), || self.fetch_once(target, path))
            .await
    }

    /// Fingerprint `path` on `target` with a single attempt
    pub async fn fetch_once(&self, target: &ProbeTarget, path: &str) -> Result<Fingerprint> {
        let url = target.file_url(path);

        let (first, total, last_modified) = self.first_window(target, &url).await?;
        let mut digest = WindowDigest::new();
        digest.update(&first);

        if let (_, Some(window)) = hash::windows(total) {
            let tail = self.range(target, &url, window.clone(), total).await?;
            let expected = window.end - window.start;
            if tail.len() as u64 != expected {
                return Err(CheckError::protocol(format!(
                    "{url}: tail window returned {} bytes, expected {expected}",
                    tail.len()
                )));
            }
            digest.update(&tail);
        }

        debug!(url = %url, total, covered = digest.covered(), "fingerprinted");

        Ok(Fingerprint {
            path: path.to_string(),
            byte_size: total,
            last_modified,
            source_url: url,
            digest: Some(digest.finish()),
        })
    }

    async fn first_window(
        &self,
        target: &ProbeTarget,
        url: &str,
    ) -> Result<(Vec<u8>, u64, Option<String>)> {
        let response = self.send(target, url, 0..CHUNK_SIZE).await?;

        let last_modified = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let range = match content_range(&response, url)? {
            Some(range) => range,
            // A server that ignores Range is only usable when the whole file fits the window.
            None if response.status() == StatusCode::OK => match response.content_length() {
                Some(total) if total > 0 && total <= CHUNK_SIZE => ContentRange {
                    start: 0,
                    end: total - 1,
                    total,
                },
                _ => {
                    return Err(CheckError::protocol(format!(
                        "{url}: server ignored the Range header"
                    )))
                }
            },
            None => {
                return Err(CheckError::protocol(format!(
                    "{url}: no Content-Range in response"
                )))
            }
        };
        if range.start != 0 {
            return Err(CheckError::protocol(format!(
                "{url}: first window starts at {}",
                range.start
            )));
        }

        let body = read_at_most(response, CHUNK_SIZE).await?;
        let read = body.len() as u64;
        if read != CHUNK_SIZE && read != range.end + 1 {
            return Err(CheckError::protocol(format!(
                "{url}: first window returned {read} bytes, range ends at {}",
                range.end
            )));
        }
        Ok((body, range.total, last_modified))
    }

    async fn range(
        &self,
        target: &ProbeTarget,
        url: &str,
        window: Range<u64>,
        total: u64,
    ) -> Result<Vec<u8>> {
        let limit = window.end - window.start;
        let response = self.send(target, url, window.clone()).await?;

        let expected = ContentRange {
            start: window.start,
            end: window.end - 1,
            total,
        };
        match content_range(&response, url)? {
            Some(range) if range == expected => {}
            Some(range) => {
                return Err(CheckError::protocol(format!(
                    "{url}: tail window answered bytes {}-{}/{}, expected {}-{}/{total}",
                    range.start, range.end, range.total, expected.start, expected.end
                )))
            }
            None => {
                return Err(CheckError::protocol(format!(
                    "{url}: no Content-Range for tail window"
                )))
            }
        }

        read_at_most(response, limit).await
    }

    async fn send(
        &self,
        target: &ProbeTarget,
        url: &str,
        window: Range<u64>,
    ) -> Result<reqwest::Response> {
        let last = window.end.saturating_sub(1);
        let mut request = self
            .client
            .http(target.trust)
            .get(url)
            .header(RANGE, format!("bytes={}-{last}", window.start));
        if let Some(host) = &target.host_header {
            request = request.header(HOST, host);
        }

        let response = request.send().await.map_err(|e| transport_error(&e))?;
        ensure_success(response)
    }
}

/// Parsed `Content-Range` header, if present
fn content_range(response: &reqwest::Response, url: &str) -> Result<Option<ContentRange>> {
    response
        .headers()
        .get(CONTENT_RANGE)
        .map(|value| {
            let value = value
                .to_str()
                .map_err(|_| CheckError::protocol(format!("{url}: unreadable Content-Range")))?;
            ContentRange::parse(value)
        })
        .transpose()
}

/// Read at most `limit` bytes of the body, leaving the rest unread
async fn read_at_most(mut response: reqwest::Response, limit: u64) -> Result<Vec<u8>> {
    let limit = usize::try_from(limit).unwrap_or(usize::MAX);
    let mut body = Vec::with_capacity(limit.min(CHUNK_SIZE as usize));

    while body.len() < limit {
        match response.chunk().await.map_err(|e| transport_error(&e))? {
            Some(chunk) => {
                let take = (limit - body.len()).min(chunk.len());
                body.extend_from_slice(&chunk[..take]);
            }
            None => break,
        }
    }
    Ok(body)
}
