//! Metric sinks for aggregated progress points.

use crate::config::InfluxConfig;
use async_trait::async_trait;
use mirrorcheck_core::{Aggregation, CheckError, Result};
use std::fmt::Write as _;
use std::time::Duration;
use tracing::{debug, info};

/// Destination for the points of one run
#[async_trait]
pub trait MetricsSink: Send + Sync {
    /// Write every point of `aggregation`
    async fn write(&self, aggregation: &Aggregation) -> Result<()>;
}

/// Sink that only logs points
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl MetricsSink for LogSink {
    async fn write(&self, aggregation: &Aggregation) -> Result<()> {
        for point in &aggregation.mirror_points {
            info!(name = %point.name, progress = point.progress, "mirror progress");
        }
        for point in &aggregation.cdn_points {
            info!(
                mirror = %point.mirror_id,
                node = %point.node_ip,
                progress = point.progress,
                "cdn node progress"
            );
        }
        Ok(())
    }
}

/// InfluxDB v1 writer
#[derive(Debug, Clone)]
pub struct InfluxSink {
    http: reqwest::Client,
    config: InfluxConfig,
}

impl InfluxSink {
    /// Create a sink for `config`
    pub fn new(config: InfluxConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CheckError::Metrics(e.to_string()))?;
        Ok(Self { http, config })
    }

    fn write_url(&self) -> String {
        format!("{}/write", self.config.addr.trim_end_matches('/'))
    }
}

#[async_trait]
impl MetricsSink for InfluxSink {
    async fn write(&self, aggregation: &Aggregation) -> Result<()> {
        let timestamp = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let body = line_protocol(aggregation, timestamp);
        if body.is_empty() {
            debug!("no points to write");
            return Ok(());
        }

        let mut request = self
            .http
            .post(self.write_url())
            .query(&[("db", self.config.db.as_str())])
            .body(body);
        if !self.config.username.is_empty() {
            request = request.basic_auth(&self.config.username, Some(&self.config.password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| CheckError::Metrics(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CheckError::Metrics(format!(
                "influx write returned {}: {}",
                status.as_u16(),
                text.trim()
            )));
        }

        info!(
            db = %self.config.db,
            mirrors = aggregation.mirror_points.len(),
            cdn_nodes = aggregation.cdn_points.len(),
            "wrote metrics"
        );
        Ok(())
    }
}

/// Render points in InfluxDB line protocol, all stamped with `timestamp` (ns)
#[must_use]
pub fn line_protocol(aggregation: &Aggregation, timestamp: i64) -> String {
    let mut out = String::new();
    for point in &aggregation.mirror_points {
        let _ = writeln!(
            out,
            "mirrors,name={} progress={},latency=0 {timestamp}",
            escape_tag(&point.name),
            point.progress
        );
    }
    for point in &aggregation.cdn_points {
        let _ = writeln!(
            out,
            "mirrors_cdn,mirror_id={},node_ip_addr={} progress={} {timestamp}",
            escape_tag(&point.mirror_id),
            escape_tag(&point.node_ip),
            point.progress
        );
    }
    out
}

fn escape_tag(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, ',' | '=' | ' ') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirrorcheck_core::{CdnPoint, MirrorPoint};
    use wiremock::matchers::{basic_auth, body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample() -> Aggregation {
        Aggregation {
            mirror_points: vec![MirrorPoint {
                name: "https://mirror.example.org/deepin/".into(),
                progress: 0.75,
            }],
            cdn_points: vec![CdnPoint {
                mirror_id: "default".into(),
                node_ip: "10.0.0.1".into(),
                progress: 1.0,
            }],
        }
    }

    fn config(addr: String, username: &str) -> InfluxConfig {
        InfluxConfig {
            addr,
            db: "mirrors".into(),
            username: username.into(),
            password: "secret".into(),
        }
    }

    #[test]
    fn renders_line_protocol() {
        let lines = line_protocol(&sample(), 1_700_000_000_000_000_000);
        assert_eq!(
            lines,
            "mirrors,name=https://mirror.example.org/deepin/ progress=0.75,latency=0 1700000000000000000\n\
             mirrors_cdn,mirror_id=default,node_ip_addr=10.0.0.1 progress=1 1700000000000000000\n"
        );
    }

    #[test]
    fn escapes_tag_values() {
        assert_eq!(escape_tag("a b,c=d"), "a\\ b\\,c\\=d");
        assert!(line_protocol(&Aggregation::default(), 0).is_empty());
    }

    #[tokio::test]
    async fn posts_points_with_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/write"))
            .and(query_param("db", "mirrors"))
            .and(basic_auth("writer", "secret"))
            .and(body_string_contains("mirrors_cdn,mirror_id=default"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let sink = InfluxSink::new(config(server.uri(), "writer")).unwrap();
        sink.write(&sample()).await.unwrap();
    }

    #[tokio::test]
    async fn rejected_write_is_a_metrics_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("authorization failed"))
            .mount(&server)
            .await;

        let sink = InfluxSink::new(config(server.uri(), "")).unwrap();
        let err = sink.write(&sample()).await.unwrap_err();
        assert!(matches!(err, CheckError::Metrics(ref msg) if msg.contains("401")));
    }

    #[tokio::test]
    async fn log_sink_accepts_anything() {
        LogSink.write(&sample()).await.unwrap();
    }
}
