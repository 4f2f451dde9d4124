use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

/// Suffix shared by every manifest file in the change index
pub const MANIFEST_SUFFIX: &str = ".json";

/// Name of the pointer manifest that always describes the newest change
pub const CURRENT_MANIFEST: &str = "current.json";

/// One published change event on the source repository
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeManifest {
    /// Timestamp of the previous change event
    #[serde(default, rename = "preview")]
    pub previous_timestamp: String,

    /// Timestamp of this change event
    #[serde(default, rename = "current")]
    pub current_timestamp: String,

    /// Total size of the change in bytes
    #[serde(default, rename = "size", deserialize_with = "deserialize_flexible_size")]
    pub total_size: u64,

    /// Files added or replaced
    #[serde(default, deserialize_with = "deserialize_null_as_empty")]
    pub added: Vec<FileRef>,

    /// Files removed
    #[serde(default, deserialize_with = "deserialize_null_as_empty")]
    pub deleted: Vec<FileRef>,
}

/// A file path together with the size the manifest declares for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    /// Path relative to the repository root
    #[serde(rename = "filepath")]
    pub path: String,

    /// Declared size in bytes (zero when the manifest omits it)
    #[serde(
        default,
        rename = "filesize",
        deserialize_with = "deserialize_flexible_size"
    )]
    pub declared_size: u64,
}

/// Manifest sizes show up both as JSON strings and as numbers.
fn deserialize_flexible_size<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Size {
        Number(u64),
        Text(String),
    }

    match Size::deserialize(deserializer)? {
        Size::Number(n) => Ok(n),
        Size::Text(s) if s.trim().is_empty() => Ok(0),
        Size::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn deserialize_null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<FileRef>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<FileRef>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A manifest name from the change index with its parsed timestamp
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ManifestName {
    /// When the change was published
    pub published: DateTime<Utc>,

    /// File name inside the change index (e.g. `1700000000.json`)
    pub name: String,
}

impl ManifestName {
    /// Parse an index entry of the form `<unix-seconds>.json`.
    ///
    /// Returns `None` for the `current.json` pointer and for anything that
    /// does not carry a timestamp.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        if name == CURRENT_MANIFEST {
            return None;
        }
        let stem = name.strip_suffix(MANIFEST_SUFFIX)?;
        let secs: i64 = stem.parse().ok()?;
        let published = Utc.timestamp_opt(secs, 0).single()?;
        Some(Self {
            published,
            name: name.to_string(),
        })
    }
}

/// Files that changed within the scan window, split by kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Package files (the bulk of every change)
    pub packages: BTreeSet<String>,

    /// Control and metadata files (indices, release files)
    pub others: BTreeSet<String>,

    /// Newest manifest that contributed to this set
    #[serde(default)]
    pub newest_manifest: Option<String>,
}

impl ChangeSet {
    /// Total number of changed files
    #[must_use]
    pub fn len(&self) -> usize {
        self.packages.len() + self.others.len()
    }

    /// Returns true if nothing changed in the window
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty() && self.others.is_empty()
    }
}
