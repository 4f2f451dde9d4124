//! Fan-out of file checks across mirrors, URL prefixes and CDN nodes.

use crate::config::PoolConfig;
use crate::pool::{Collector, WorkerPool};
use crate::standard::StandardSet;
use mirrorcheck_client::{MirrorClient, ProbeTarget, VantagePointResolver};
use mirrorcheck_core::{ComparisonRecord, Mirror, TargetResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Finished/total counter logged as mirrors complete
#[derive(Debug)]
pub struct RunProgress {
    total: usize,
    finished: AtomicUsize,
}

impl RunProgress {
    /// Track `total` mirrors
    #[must_use]
    pub const fn new(total: usize) -> Self {
        Self {
            total,
            finished: AtomicUsize::new(0),
        }
    }

    /// Mark one mirror done and return the new finished count
    pub fn finish_one(&self, mirror_id: &str) -> usize {
        let finished = self.finished.fetch_add(1, Ordering::SeqCst) + 1;
        info!(mirror = mirror_id, "[{finished}/{}] mirror checked", self.total);
        finished
    }

    /// Mirrors finished so far
    #[must_use]
    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    /// Mirrors in the run
    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }
}

/// Schedules fingerprint comparisons for a set of mirrors
#[derive(Clone)]
pub struct CheckOrchestrator {
    client: MirrorClient,
    resolver: VantagePointResolver,
    pools: PoolConfig,
    exclude_hidden: bool,
}

impl CheckOrchestrator {
    /// Create an orchestrator
    #[must_use]
    pub fn new(client: MirrorClient, resolver: VantagePointResolver, pools: PoolConfig) -> Self {
        Self {
            client,
            resolver,
            pools,
            exclude_hidden: false,
        }
    }

    /// Skip mirrors with a negative weight
    #[must_use]
    pub const fn exclude_hidden(mut self, exclude: bool) -> Self {
        self.exclude_hidden = exclude;
        self
    }

    /// Check every mirror against `standards`
    pub async fn run_all(&self, mirrors: Vec<Mirror>, standards: Arc<StandardSet>) -> Vec<TargetResult> {
        let mirrors: Vec<Mirror> = mirrors
            .into_iter()
            .filter(|m| !(self.exclude_hidden && m.weight < 0))
            .collect();

        let progress = Arc::new(RunProgress::new(mirrors.len()));
        let collector = Collector::new();
        let mut pool = WorkerPool::new(self.pools.mirrors);

        for mirror in mirrors {
            let this = self.clone();
            let standards = Arc::clone(&standards);
            let collector = collector.clone();
            let progress = Arc::clone(&progress);
            pool.spawn(async move {
                let results = this.check_mirror(&mirror, &standards).await;
                collector.extend(results);
                progress.finish_one(&mirror.id);
            });
        }
        pool.join().await;

        collector.take()
    }

    /// Check every URL prefix of one mirror
    pub async fn check_mirror(&self, mirror: &Mirror, standards: &Arc<StandardSet>) -> Vec<TargetResult> {
        let mut results = Vec::new();
        let prefixes = mirror.url_prefixes();
        if prefixes.is_empty() {
            warn!(mirror = %mirror.id, "mirror has no HTTP(S) prefix");
        }

        for prefix in prefixes {
            if mirror.cdn {
                results.extend(self.check_cdn(&mirror.id, &prefix, standards).await);
            } else {
                let target = ProbeTarget::new(prefix.clone()).with_trust(mirror.trust());
                results.push(self.check_target(&mirror.id, &prefix, target, None, standards).await);
            }
        }
        results
    }

    /// Check one prefix on every edge node of its CDN, worst node first
    pub async fn check_cdn(
        &self,
        mirror_id: &str,
        prefix: &str,
        standards: &Arc<StandardSet>,
    ) -> Vec<TargetResult> {
        let Some(host) = url::Url::parse(prefix).ok().and_then(|u| u.host_str().map(String::from)) else {
            warn!(mirror = mirror_id, prefix, "cannot extract CDN host");
            return Vec::new();
        };

        let nodes = self.resolver.resolve_or_fallback(&host).await;
        if nodes.is_empty() {
            warn!(mirror = mirror_id, host = %host, "no CDN edge nodes, skipping prefix");
            return Vec::new();
        }
        debug!(mirror = mirror_id, host = %host, nodes = nodes.len(), "checking CDN nodes");

        let mut pool = WorkerPool::new(nodes.len());
        for node in nodes {
            let target = match ProbeTarget::cdn_node(prefix, &node) {
                Ok(target) => target,
                Err(e) => {
                    warn!(mirror = mirror_id, node = %node, error = %e, "skipping CDN node");
                    continue;
                }
            };
            let this = self.clone();
            let mirror_id = mirror_id.to_string();
            let prefix = prefix.to_string();
            let standards = Arc::clone(standards);
            pool.spawn(async move {
                this.check_target(&mirror_id, &prefix, target, Some(node), &standards)
                    .await
            });
        }

        let mut results = pool.join().await;
        results.sort_by(|a, b| a.completion_percent.total_cmp(&b.completion_percent));
        results
    }

    /// Compare every standard file on one target
    pub async fn check_target(
        &self,
        target_id: &str,
        url_prefix: &str,
        target: ProbeTarget,
        cdn_node: Option<String>,
        standards: &Arc<StandardSet>,
    ) -> TargetResult {
        let target = Arc::new(target);
        let collector = Collector::new();
        let mut pool = WorkerPool::new(self.pools.files);

        for standard in standards.iter().cloned() {
            let client = self.client.clone();
            let target = Arc::clone(&target);
            let collector = collector.clone();
            pool.spawn(async move {
                let outcome = client.fingerprints().fetch(&target, &standard.path).await;
                collector.push(ComparisonRecord::compare(standard, outcome));
            });
        }
        pool.join().await;

        let mut records = collector.take();
        records.sort_by(|a, b| a.standard.path.cmp(&b.standard.path));
        let result = TargetResult::from_records(target_id, url_prefix, cdn_node, records);

        info!(
            mirror = target_id,
            prefix = url_prefix,
            node = result.cdn_node_address.as_deref().unwrap_or("-"),
            percent = format!("{:.3}", result.completion_percent),
            errors = result.error_count,
            "target checked"
        );
        result
    }
}
