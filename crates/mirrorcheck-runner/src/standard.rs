//! Standard fingerprints taken from the source repository.

use crate::pool::{Collector, WorkerPool};
use mirrorcheck_client::{MirrorClient, ProbeTarget};
use mirrorcheck_core::{CheckError, Fingerprint, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Reference fingerprints every target is compared against
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardSet {
    /// Newest change manifest the sample was drawn from
    #[serde(default)]
    pub manifest: Option<String>,

    /// Fingerprints sorted by path
    pub fingerprints: Vec<Fingerprint>,
}

impl StandardSet {
    /// Build a set from fingerprints, sorting them by path
    #[must_use]
    pub fn new(manifest: Option<String>, mut fingerprints: Vec<Fingerprint>) -> Self {
        fingerprints.sort_by(|a, b| a.path.cmp(&b.path));
        fingerprints.dedup_by(|a, b| a.path == b.path);
        Self {
            manifest,
            fingerprints,
        }
    }

    /// Fingerprint every path on the source
    ///
    /// Paths that cannot be fingerprinted are dropped with a warning.
    pub async fn compute(
        client: &MirrorClient,
        source_url: &str,
        paths: &[String],
        manifest: Option<String>,
        pool_size: usize,
    ) -> Self {
        let target = ProbeTarget::new(source_url);
        let collector = Collector::new();
        let mut pool = WorkerPool::new(pool_size);

        for path in paths {
            let client = client.clone();
            let target = target.clone();
            let path = path.clone();
            let collector = collector.clone();
            pool.spawn(async move {
                match client.fingerprints().fetch(&target, &path).await {
                    Ok(fp) => collector.push(fp),
                    Err(e) => warn!(path = %path, error = %e, "dropping file without a standard"),
                }
            });
        }
        pool.join().await;

        let set = Self::new(manifest, collector.take());
        info!(
            requested = paths.len(),
            fingerprinted = set.len(),
            "computed standard fingerprints"
        );
        set
    }

    /// Number of fingerprints
    #[must_use]
    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    /// Returns true if the set holds nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }

    /// Iterate fingerprints in path order
    pub fn iter(&self) -> impl Iterator<Item = &Fingerprint> {
        self.fingerprints.iter()
    }
}

/// On-disk cache of standard sets keyed by manifest name
#[derive(Debug, Clone)]
pub struct StandardCache {
    dir: PathBuf,
}

impl StandardCache {
    /// Cache rooted at `dir`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File holding the set for `manifest`
    #[must_use]
    pub fn path_for(&self, manifest: &str) -> PathBuf {
        let stem = manifest.strip_suffix(".json").unwrap_or(manifest);
        self.dir.join(format!("standard-{stem}.json"))
    }

    /// Load the set cached for `manifest`, if any
    pub async fn load(&self, manifest: &str) -> Result<Option<StandardSet>> {
        let path = self.path_for(manifest);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let set: StandardSet = serde_json::from_str(&content)?;
        if set.manifest.as_deref() != Some(manifest) {
            debug!(path = %path.display(), "cached standard belongs to another manifest");
            return Ok(None);
        }
        debug!(path = %path.display(), fingerprints = set.len(), "loaded cached standard");
        Ok(Some(set))
    }

    /// Store `set` under its manifest name
    pub async fn store(&self, set: &StandardSet) -> Result<PathBuf> {
        let manifest = set
            .manifest
            .as_deref()
            .ok_or_else(|| CheckError::Config("standard set has no manifest to key it by".into()))?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(manifest);
        tokio::fs::write(&path, serde_json::to_vec_pretty(set)?).await?;
        Ok(path)
    }

    /// Cache directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fp(path: &str) -> Fingerprint {
        Fingerprint {
            path: path.into(),
            byte_size: 3,
            last_modified: None,
            source_url: format!("https://source/{path}"),
            digest: Some(vec![1, 2, 3]),
        }
    }

    #[test]
    fn set_is_sorted_and_unique() {
        let set = StandardSet::new(None, vec![fp("b"), fp("a"), fp("b")]);
        let paths: Vec<&str> = set.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn compute_drops_failed_files() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repo/ok"))
            .respond_with(
                ResponseTemplate::new(206)
                    .insert_header("content-range", "bytes 0-2/3")
                    .set_body_bytes(b"abc".to_vec()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repo/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = MirrorClient::new().unwrap();
        let set = StandardSet::compute(
            &client,
            &format!("{}/repo/", server.uri()),
            &["ok".to_string(), "missing".to_string()],
            Some("1700000000.json".into()),
            3,
        )
        .await;

        assert_eq!(set.len(), 1);
        assert_eq!(set.fingerprints[0].path, "ok");
        assert_eq!(set.fingerprints[0].byte_size, 3);
    }

    #[tokio::test]
    async fn cache_roundtrip_is_keyed_by_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let cache = StandardCache::new(dir.path().join("standards"));
        let set = StandardSet::new(Some("1700000000.json".into()), vec![fp("a")]);

        assert!(cache.load("1700000000.json").await.unwrap().is_none());
        let written = cache.store(&set).await.unwrap();
        assert_eq!(written, dir.path().join("standards/standard-1700000000.json"));
        assert_eq!(cache.load("1700000000.json").await.unwrap(), Some(set));
        assert!(cache.load("1700000100.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unkeyed_set_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = StandardCache::new(dir.path());
        let err = cache.store(&StandardSet::new(None, vec![])).await.unwrap_err();
        assert!(matches!(err, CheckError::Config(_)));
    }
}
