use serde::{Deserialize, Serialize};

/// A mirror entry from the target list API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mirror {
    /// Stable mirror identifier
    pub id: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Publishing weight; negative weights mark hidden mirrors
    #[serde(default)]
    pub weight: i32,

    /// Host and path served over plain HTTP (no scheme)
    #[serde(default, rename = "urlHttp")]
    pub url_http: String,

    /// Host and path served over HTTPS (no scheme)
    #[serde(default, rename = "urlHttps")]
    pub url_https: String,

    /// Host and path served over FTP (not probed)
    #[serde(default, rename = "urlFtp")]
    pub url_ftp: String,

    /// Country code
    #[serde(default)]
    pub country: String,

    /// Whether the mirror is fronted by a CDN and must be probed per edge node
    #[serde(default)]
    pub cdn: bool,
}

impl Mirror {
    /// Trust level derived from the weight
    #[must_use]
    pub const fn trust(&self) -> TrustLevel {
        TrustLevel::from_weight(self.weight)
    }

    /// URL prefixes to probe, HTTPS first
    #[must_use]
    pub fn url_prefixes(&self) -> Vec<String> {
        let mut prefixes = Vec::with_capacity(2);
        if !self.url_https.is_empty() {
            prefixes.push(format!("https://{}", self.url_https));
        }
        if !self.url_http.is_empty() {
            prefixes.push(format!("http://{}", self.url_http));
        }
        prefixes
    }
}

/// Response body of the target list API
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MirrorList {
    /// Error reported by the API
    #[serde(default)]
    pub error: String,

    /// Mirrors to check
    #[serde(default)]
    pub mirrors: Vec<Mirror>,
}

/// How much a target is trusted, selecting HTTP tuning and retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustLevel {
    /// Published mirrors, the source and CDN nodes
    #[default]
    Normal,
    /// Hidden mirrors: shorter timeouts and no retries
    Hidden,
}

impl TrustLevel {
    /// Map a mirror weight to a trust level
    #[must_use]
    pub const fn from_weight(weight: i32) -> Self {
        if weight >= 0 {
            Self::Normal
        } else {
            Self::Hidden
        }
    }

    /// Whether transient failures against this target are retried
    #[must_use]
    pub const fn allows_retry(self) -> bool {
        matches!(self, Self::Normal)
    }
}

impl std::fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Hidden => write!(f, "hidden"),
        }
    }
}
