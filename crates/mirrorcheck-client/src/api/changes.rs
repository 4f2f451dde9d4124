//! Change-index resolution.
//!
//! The source publishes an HTML index of change manifests named
//! `<unix-seconds>.json`. Manifests inside the scan window are replayed
//! oldest first into a [`ChangeSet`].

use crate::MirrorClient;
use chrono::Duration;
use mirrorcheck_core::{
    ChangeManifest, ChangeSet, CheckError, ManifestName, Result, CURRENT_MANIFEST,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Rules deciding which changed paths are probed and which are packages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeFilter {
    /// Substrings marking a path as never probed
    pub ignore_markers: Vec<String>,
    /// Directory holding package files
    pub pool_prefix: String,
    /// Suffix of probed package files
    pub package_suffix: String,
    /// Package suffixes that are skipped (architectures not served)
    pub excluded_package_suffixes: Vec<String>,
}

impl Default for ChangeFilter {
    fn default() -> Self {
        Self {
            ignore_markers: vec![
                "__GUARD__".into(),
                "/Sources.diff/".into(),
                "/Packages.diff/".into(),
            ],
            pool_prefix: "pool/".into(),
            package_suffix: ".deb".into(),
            excluded_package_suffixes: vec!["_i386.deb".into()],
        }
    }
}

impl ChangeFilter {
    /// Returns true if `path` is never probed
    #[must_use]
    pub fn is_ignored(&self, path: &str) -> bool {
        if self.ignore_markers.iter().any(|m| path.contains(m.as_str())) {
            return true;
        }
        if self.in_pool(path) {
            return !path.ends_with(&self.package_suffix)
                || self
                    .excluded_package_suffixes
                    .iter()
                    .any(|s| path.ends_with(s.as_str()));
        }
        false
    }

    /// Returns true if `path` is a package file
    #[must_use]
    pub fn is_package(&self, path: &str) -> bool {
        self.in_pool(path) && path.ends_with(&self.package_suffix)
    }

    fn in_pool(&self, path: &str) -> bool {
        path.trim_start_matches('/').starts_with(&self.pool_prefix)
    }
}

/// A source repository and where its change index lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSource {
    /// URL prefix of the repository
    pub url: String,
    /// Change index location relative to `url`
    #[serde(default = "default_changelist_path")]
    pub changelist_path: String,
    /// Path filter
    #[serde(default)]
    pub filter: ChangeFilter,
}

fn default_changelist_path() -> String {
    "changelist/".to_string()
}

impl ChangeSource {
    /// Source with the default index location and filter
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            changelist_path: default_changelist_path(),
            filter: ChangeFilter::default(),
        }
    }

    /// URL of the change index listing
    #[must_use]
    pub fn index_url(&self) -> String {
        let base = self.url.trim_end_matches('/');
        let path = self.changelist_path.trim_matches('/');
        format!("{base}/{path}/")
    }

    /// URL of one manifest
    #[must_use]
    pub fn manifest_url(&self, name: &str) -> String {
        format!("{}{name}", self.index_url())
    }
}

/// Extract manifest names from the index HTML, oldest first
///
/// Links are taken from `href` attributes; only `<unix-seconds>.json`
/// entries are kept and the `current.json` pointer is skipped.
pub fn parse_index(html: &str) -> Vec<ManifestName> {
    static HREF: OnceLock<Regex> = OnceLock::new();
    let href = HREF.get_or_init(|| {
        Regex::new(r#"(?i)href\s*=\s*["']?([^"'\s>]+)"#).expect("constant pattern")
    });

    href
        .captures_iter(html)
        .filter_map(|caps| {
            let link = caps[1].trim_end_matches('/');
            let file = link.rsplit('/').next().unwrap_or(link);
            ManifestName::parse(file)
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Manifests whose timestamp lies within `window` of the newest one
#[must_use]
pub fn select_recent(names: &[ManifestName], window: Duration) -> Vec<ManifestName> {
    let Some(newest) = names.iter().map(|n| n.published).max() else {
        return Vec::new();
    };
    let mut recent: Vec<ManifestName> = names
        .iter()
        .filter(|n| newest - n.published < window)
        .cloned()
        .collect();
    recent.sort();
    recent
}

/// Folds manifests, oldest first, into a [`ChangeSet`]
///
/// A later delete removes an earlier add; a later add restores a path.
#[derive(Debug)]
pub struct ChangeReplay<'f> {
    filter: &'f ChangeFilter,
    changes: ChangeSet,
}

impl<'f> ChangeReplay<'f> {
    /// Start an empty replay
    #[must_use]
    pub fn new(filter: &'f ChangeFilter) -> Self {
        Self {
            filter,
            changes: ChangeSet::default(),
        }
    }

    /// Apply one manifest
    pub fn apply(&mut self, name: &str, manifest: &ChangeManifest) {
        for file in &manifest.added {
            let path = file.path.trim_start_matches('/');
            if path.is_empty() || self.filter.is_ignored(path) {
                continue;
            }
            if self.filter.is_package(path) {
                self.changes.packages.insert(path.to_string());
            } else {
                self.changes.others.insert(path.to_string());
            }
        }
        for file in &manifest.deleted {
            let path = file.path.trim_start_matches('/');
            self.changes.packages.remove(path);
            self.changes.others.remove(path);
        }
        self.changes.newest_manifest = Some(name.to_string());
    }

    /// Finish the replay
    #[must_use]
    pub fn finish(self) -> ChangeSet {
        self.changes
    }
}

/// Change-index endpoints of one source
pub struct ChangesApi<'a> {
    client: &'a MirrorClient,
    source: &'a ChangeSource,
}

impl<'a> ChangesApi<'a> {
    pub(crate) fn new(client: &'a MirrorClient, source: &'a ChangeSource) -> Self {
        Self { client, source }
    }

    /// List manifests in the change index, oldest first
    pub async fn index(&self) -> Result<Vec<ManifestName>> {
        let url = self.source.index_url();
        let html = self.client.get_text(&url).await?;
        let names = parse_index(&html);
        debug!(url = %url, manifests = names.len(), "read change index");
        Ok(names)
    }

    /// Fetch one manifest by file name
    pub async fn manifest(&self, name: &str) -> Result<ChangeManifest> {
        self.client.get_json(&self.source.manifest_url(name)).await
    }

    /// Fetch the `current.json` pointer manifest
    pub async fn current(&self) -> Result<ChangeManifest> {
        self.manifest(CURRENT_MANIFEST).await
    }

    /// Replay every manifest within `window` of the newest one
    ///
    /// Manifests that fail to download or decode are skipped with a warning;
    /// an index with no usable manifests is an error.
    pub async fn recent(&self, window: Duration) -> Result<ChangeSet> {
        let names = self.index().await?;
        if names.is_empty() {
            return Err(CheckError::Resolution(format!(
                "no change manifests listed at {}",
                self.source.index_url()
            )));
        }

        let recent = select_recent(&names, window);
        let mut replay = ChangeReplay::new(&self.source.filter);
        let mut applied = 0usize;
        for name in &recent {
            match self.manifest(&name.name).await {
                Ok(manifest) => {
                    replay.apply(&name.name, &manifest);
                    applied += 1;
                }
                Err(e) => warn!(manifest = %name.name, error = %e, "skipping unreadable manifest"),
            }
        }

        if applied == 0 {
            return Err(CheckError::Resolution(
                "none of the recent change manifests could be read".into(),
            ));
        }

        let changes = replay.finish();
        info!(
            manifests = applied,
            packages = changes.packages.len(),
            others = changes.others.len(),
            "resolved recent changes"
        );
        Ok(changes)
    }
}
