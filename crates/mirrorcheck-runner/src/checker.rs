//! Top-level run: bootstrap, probe every target, publish results.

use crate::aggregate::aggregate;
use crate::config::CheckerConfig;
use crate::error::{RunError, RunResult};
use crate::metrics::{InfluxSink, LogSink, MetricsSink};
use crate::operation::{JsonLinesOperationLog, OperationLog, TracingOperationLog};
use crate::orchestrator::CheckOrchestrator;
use crate::report::write_report;
use crate::standard::{StandardCache, StandardSet};
use mirrorcheck_client::{MirrorClient, VantageCache, VantagePointResolver};
use mirrorcheck_core::sample::sample_change_set;
use mirrorcheck_core::{
    Aggregation, ChangeSet, Mirror, OperationKind, OperationRecord, OperationStatus, TargetResult,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Which mirrors a run covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Every mirror in the target list
    All,
    /// One mirror by id
    One(String),
}

impl Selection {
    fn operation(&self) -> OperationRecord {
        match self {
            Self::All => OperationRecord::new(OperationKind::SyncAll, "ALL"),
            Self::One(id) => OperationRecord::new(OperationKind::Sync, id.as_str()),
        }
    }
}

/// What a finished run produced
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Final operation record
    pub operation: OperationRecord,
    /// Paths sampled from the change set
    pub sampled_files: usize,
    /// Standard fingerprints compared against
    pub standards: usize,
    /// One result per mirror prefix or CDN node
    pub results: Vec<TargetResult>,
    /// Points handed to the metrics sink
    pub aggregation: Aggregation,
    /// Report files written
    pub reports: Vec<PathBuf>,
}

struct RunOutput {
    sampled_files: usize,
    standards: usize,
    results: Vec<TargetResult>,
    aggregation: Aggregation,
    reports: Vec<PathBuf>,
}

impl RunOutput {
    const fn idle(sampled_files: usize) -> Self {
        Self {
            sampled_files,
            standards: 0,
            results: Vec::new(),
            aggregation: Aggregation {
                mirror_points: Vec::new(),
                cdn_points: Vec::new(),
            },
            reports: Vec::new(),
        }
    }
}

/// Runs consistency checks as configured
pub struct MirrorChecker {
    config: CheckerConfig,
    client: MirrorClient,
    resolver: VantagePointResolver,
    metrics: Box<dyn MetricsSink>,
    operations: Vec<Box<dyn OperationLog>>,
}

impl MirrorChecker {
    /// Build a checker and its clients from `config`
    pub fn new(config: CheckerConfig) -> RunResult<Self> {
        config.validate()?;

        let mut builder = MirrorClient::builder()
            .profile(config.profile)
            .retry(config.retry_config())
            .accept_invalid_certs(!config.retry.verify_tls);
        if let Some(max) = config.retry.max_retries {
            builder = builder.max_retries(max);
        }
        let client = builder.build()?;
        let resolver = VantagePointResolver::new(client.clone(), config.vantage.clone());

        let metrics: Box<dyn MetricsSink> = match &config.metrics {
            Some(influx) => Box::new(InfluxSink::new(influx.clone())?),
            None => Box::new(LogSink),
        };

        let mut operations: Vec<Box<dyn OperationLog>> = vec![Box::new(TracingOperationLog)];
        if let Some(path) = &config.operation_log {
            operations.push(Box::new(JsonLinesOperationLog::new(path)));
        }

        Ok(Self {
            config,
            client,
            resolver,
            metrics,
            operations,
        })
    }

    /// Replace the metrics sink
    #[must_use]
    pub fn with_metrics(mut self, sink: Box<dyn MetricsSink>) -> Self {
        self.metrics = sink;
        self
    }

    /// Add an operation store
    #[must_use]
    pub fn with_operation_log(mut self, log: Box<dyn OperationLog>) -> Self {
        self.operations.push(log);
        self
    }

    /// Share a vantage cache, e.g. across runs of a long-lived process
    #[must_use]
    pub fn with_vantage_cache(mut self, cache: Arc<VantageCache>) -> Self {
        self.resolver =
            VantagePointResolver::with_cache(self.client.clone(), self.config.vantage.clone(), cache);
        self
    }

    /// The HTTP client used for every request
    #[must_use]
    pub const fn client(&self) -> &MirrorClient {
        &self.client
    }

    /// The configuration in use
    #[must_use]
    pub const fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// Run one check
    ///
    /// Status transitions go to every operation store; a bootstrap failure
    /// is recorded as `failure` and returned.
    pub async fn run(&self, selection: Selection) -> RunResult<RunSummary> {
        let operation = selection.operation();
        self.record(&operation).await;
        let running = operation.with_status(OperationStatus::Running, "");
        self.record(&running).await;

        match self.execute(&selection).await {
            Ok(output) => {
                let finished = running.with_status(OperationStatus::Finished, "");
                self.record(&finished).await;
                Ok(RunSummary {
                    operation: finished,
                    sampled_files: output.sampled_files,
                    standards: output.standards,
                    results: output.results,
                    aggregation: output.aggregation,
                    reports: output.reports,
                })
            }
            Err(e) => {
                error!(error = %e, "run aborted");
                self.record(&running.with_status(OperationStatus::Failure, e.to_string()))
                    .await;
                Err(e)
            }
        }
    }

    async fn execute(&self, selection: &Selection) -> RunResult<RunOutput> {
        let mirrors = self.select_mirrors(selection).await?;

        let changes = self
            .client
            .changes(&self.config.change_source())
            .recent(self.config.window())
            .await
            .map_err(RunError::ChangeIndex)?;

        let paths = sample_change_set(&changes, self.config.source.max_packages);
        if paths.is_empty() {
            info!("no changed files in the scan window, nothing to check");
            return Ok(RunOutput::idle(0));
        }
        info!(changed = changes.len(), sampled = paths.len(), "sampled changed files");

        let standards = self.standards(&changes, &paths).await;
        if standards.is_empty() {
            return Err(RunError::NoStandards { files: paths.len() });
        }
        let standard_count = standards.len();

        let orchestrator = CheckOrchestrator::new(
            self.client.clone(),
            self.resolver.clone(),
            self.config.pools,
        )
        .exclude_hidden(self.config.targets.exclude_hidden);
        let results = orchestrator.run_all(mirrors, Arc::new(standards)).await;

        let aggregation = aggregate(&results);
        if let Err(e) = self.metrics.write(&aggregation).await {
            warn!(error = %e, "failed to write metrics");
        }

        let reports = self.write_reports(&results).await;

        info!(
            targets = results.len(),
            complete = results.iter().filter(|r| r.is_complete()).count(),
            "run finished"
        );
        Ok(RunOutput {
            sampled_files: paths.len(),
            standards: standard_count,
            results,
            aggregation,
            reports,
        })
    }

    async fn select_mirrors(&self, selection: &Selection) -> RunResult<Vec<Mirror>> {
        let targets = &self.config.targets;
        let mirrors = self
            .client
            .mirrors()
            .list(&targets.url, &targets.cdn_mirrors)
            .await
            .map_err(RunError::TargetList)?;

        match selection {
            Selection::All => Ok(mirrors),
            Selection::One(id) => mirrors
                .into_iter()
                .find(|m| m.id == *id)
                .map(|m| vec![m])
                .ok_or_else(|| RunError::UnknownMirror(id.clone())),
        }
    }

    /// Cached standard for the newest manifest, or a fresh one
    async fn standards(&self, changes: &ChangeSet, paths: &[String]) -> StandardSet {
        let cache = self.config.standard_cache_dir.as_ref().map(StandardCache::new);
        let manifest = changes.newest_manifest.clone();

        if let (Some(cache), Some(name)) = (&cache, &manifest) {
            match cache.load(name).await {
                Ok(Some(set)) => {
                    info!(manifest = %name, fingerprints = set.len(), "reusing cached standard");
                    return set;
                }
                Ok(None) => {}
                Err(e) => warn!(manifest = %name, error = %e, "ignoring unreadable standard cache"),
            }
        }

        let set = StandardSet::compute(
            &self.client,
            &self.config.source.url,
            paths,
            manifest,
            self.config.pools.source,
        )
        .await;

        if let Some(cache) = &cache {
            if set.manifest.is_some() && !set.is_empty() {
                match cache.store(&set).await {
                    Ok(path) => info!(path = %path.display(), "cached standard"),
                    Err(e) => warn!(error = %e, "failed to cache standard"),
                }
            }
        }
        set
    }

    async fn write_reports(&self, results: &[TargetResult]) -> Vec<PathBuf> {
        let Some(dir) = &self.config.report_dir else {
            return Vec::new();
        };

        let mut written = Vec::with_capacity(results.len());
        for result in results {
            match write_report(dir, result).await {
                Ok(path) => written.push(path),
                Err(e) => warn!(mirror = %result.target_id, error = %e, "failed to write report"),
            }
        }
        written
    }

    async fn record(&self, operation: &OperationRecord) {
        for log in &self.operations {
            if let Err(e) = log.record(operation).await {
                warn!(index = %operation.index, error = %e, "failed to record operation");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mirrorcheck_core::Result;
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FILES: [&str; 3] = [
        "dists/stable/Release",
        "pool/main/a/alpha/alpha_1.0_amd64.deb",
        "pool/main/b/beta/beta_2.0_amd64.deb",
    ];

    #[derive(Default)]
    struct Captured {
        points: Mutex<Vec<Aggregation>>,
        operations: Mutex<Vec<OperationStatus>>,
    }

    struct CapturingSink(Arc<Captured>);

    #[async_trait]
    impl MetricsSink for CapturingSink {
        async fn write(&self, aggregation: &Aggregation) -> Result<()> {
            self.0.points.lock().unwrap().push(aggregation.clone());
            Ok(())
        }
    }

    struct CapturingLog(Arc<Captured>);

    #[async_trait]
    impl OperationLog for CapturingLog {
        async fn record(&self, operation: &OperationRecord) -> Result<()> {
            self.0.operations.lock().unwrap().push(operation.status);
            Ok(())
        }
    }

    async fn serve_files(server: &MockServer, stale: &[&str]) {
        for file in FILES {
            let mut body = format!("{file} payload").into_bytes();
            if stale.contains(&file) {
                body.extend_from_slice(b" (old)");
            }
            let len = body.len();
            Mock::given(method("GET"))
                .and(path(format!("/repo/{file}")))
                .respond_with(
                    ResponseTemplate::new(206)
                        .insert_header("content-range", format!("bytes 0-{}/{len}", len - 1))
                        .set_body_bytes(body),
                )
                .mount(server)
                .await;
        }
    }

    async fn source_server(mirror: &MockServer) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repo/changelist/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<a href="1700000000.json">1700000000.json</a><a href="current.json">current</a>"#,
            ))
            .mount(&server)
            .await;

        let added: Vec<serde_json::Value> = FILES
            .iter()
            .map(|f| serde_json::json!({"filepath": f, "filesize": "10"}))
            .collect();
        Mock::given(method("GET"))
            .and(path("/repo/changelist/1700000000.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "preview": "1699990000",
                "current": "1700000000",
                "size": 30,
                "added": added,
                "deleted": null,
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/mirrors"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": "",
                "mirrors": [
                    {"id": "lagging", "name": "Lagging", "weight": 1,
                     "urlHttp": format!("{}/repo/", mirror.address())},
                ]
            })))
            .mount(&server)
            .await;

        serve_files(&server, &[]).await;
        server
    }

    fn config(source: &MockServer, dir: &std::path::Path) -> CheckerConfig {
        let mut config = CheckerConfig::default();
        config.source.url = format!("{}/repo/", source.uri());
        config.source.window_days = 3650;
        config.targets.url = format!("{}/mirrors", source.uri());
        config.retry.max_retries = Some(0);
        config.report_dir = Some(dir.join("result"));
        config.operation_log = Some(dir.join("operations.jsonl"));
        config.standard_cache_dir = Some(dir.join("standards"));
        config
    }

    #[tokio::test]
    async fn full_run_produces_results_reports_and_cache() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = MockServer::start().await;
        serve_files(&mirror, &["pool/main/b/beta/beta_2.0_amd64.deb"]).await;
        let source = source_server(&mirror).await;

        let captured = Arc::new(Captured::default());
        let checker = MirrorChecker::new(config(&source, dir.path()))
            .unwrap()
            .with_metrics(Box::new(CapturingSink(Arc::clone(&captured))))
            .with_operation_log(Box::new(CapturingLog(Arc::clone(&captured))));

        let summary = checker.run(Selection::All).await.unwrap();
        assert_eq!(summary.operation.status, OperationStatus::Finished);
        assert_eq!(summary.sampled_files, 3);
        assert_eq!(summary.standards, 3);
        assert_eq!(summary.results.len(), 1);
        assert!((summary.results[0].completion_percent - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(summary.aggregation.mirror_points.len(), 1);
        assert_eq!(summary.reports, vec![dir.path().join("result/lagging.txt")]);

        assert_eq!(captured.points.lock().unwrap().len(), 1);
        assert_eq!(
            *captured.operations.lock().unwrap(),
            vec![OperationStatus::Waiting, OperationStatus::Running, OperationStatus::Finished]
        );
        assert!(dir.path().join("standards/standard-1700000000.json").exists());
        let ops = std::fs::read_to_string(dir.path().join("operations.jsonl")).unwrap();
        assert_eq!(ops.lines().count(), 3);
    }

    #[tokio::test]
    async fn unknown_mirror_fails_the_operation() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = MockServer::start().await;
        let source = source_server(&mirror).await;

        let captured = Arc::new(Captured::default());
        let checker = MirrorChecker::new(config(&source, dir.path()))
            .unwrap()
            .with_operation_log(Box::new(CapturingLog(Arc::clone(&captured))));

        let err = checker.run(Selection::One("nope".into())).await.unwrap_err();
        assert!(matches!(err, RunError::UnknownMirror(ref id) if id == "nope"));
        assert_eq!(
            captured.operations.lock().unwrap().last(),
            Some(&OperationStatus::Failure)
        );
    }

    #[tokio::test]
    async fn unreachable_target_list_is_a_bootstrap_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = MockServer::start().await;
        let checker = MirrorChecker::new(config(&source, dir.path())).unwrap();

        let err = checker.run(Selection::All).await.unwrap_err();
        assert!(matches!(err, RunError::TargetList(_)));
    }

    #[tokio::test]
    async fn missing_standards_abort_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let source = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mirrors"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"error": "", "mirrors": []})))
            .mount(&source)
            .await;
        Mock::given(method("GET"))
            .and(path("/repo/changelist/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"<a href="1700000000.json">x</a>"#))
            .mount(&source)
            .await;
        Mock::given(method("GET"))
            .and(path("/repo/changelist/1700000000.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "added": [{"filepath": "dists/stable/Release", "filesize": 1}]
            })))
            .mount(&source)
            .await;

        let checker = MirrorChecker::new(config(&source, dir.path())).unwrap();
        let err = checker.run(Selection::All).await.unwrap_err();
        assert!(matches!(err, RunError::NoStandards { files: 1 }));
    }
}
