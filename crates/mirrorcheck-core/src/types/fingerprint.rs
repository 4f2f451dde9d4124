use serde::{Deserialize, Serialize};

/// Partial-content identity of one file as served by one endpoint
///
/// Two fingerprints are equal when path, size and digest agree; the URL and
/// `Last-Modified` marker are informational only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Path relative to the repository root
    pub path: String,

    /// Total file size reported by `Content-Range`
    pub byte_size: u64,

    /// `Last-Modified` header, verbatim
    #[serde(default)]
    pub last_modified: Option<String>,

    /// URL the fingerprint was taken from
    pub source_url: String,

    /// SHA-256 over the hashed windows
    #[serde(default, with = "hex_digest")]
    pub digest: Option<Vec<u8>>,
}

impl Fingerprint {
    /// Hex-encoded digest, or `-` when absent
    #[must_use]
    pub fn digest_hex(&self) -> String {
        self.digest
            .as_deref()
            .map_or_else(|| "-".to_string(), hex::encode)
    }
}

impl PartialEq for Fingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.byte_size == other.byte_size && self.digest == other.digest
    }
}

impl Eq for Fingerprint {}

mod hex_digest {
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(digest: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match digest {
            Some(bytes) => s.serialize_some(&hex::encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|s| hex::decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fingerprint(url: &str, digest: &[u8]) -> Fingerprint {
        Fingerprint {
            path: "pool/main/h/hello/hello_2.10_amd64.deb".into(),
            byte_size: 12_000,
            last_modified: Some("Tue, 14 Nov 2023 22:13:20 GMT".into()),
            source_url: url.into(),
            digest: Some(digest.to_vec()),
        }
    }

    #[test]
    fn equality_ignores_url_and_mtime() {
        let source = fingerprint("https://source.example.org/repo/p", &[1, 2, 3]);
        let mut mirror = fingerprint("http://mirror.example.net/repo/p", &[1, 2, 3]);
        mirror.last_modified = None;
        assert_eq!(source, source.clone());
        assert_eq!(source, mirror);
    }

    #[test]
    fn equality_depends_on_size_and_digest() {
        let source = fingerprint("u", &[1, 2, 3]);
        let mut other = source.clone();
        other.byte_size += 1;
        assert_ne!(source, other);

        let mut other = source.clone();
        other.digest = Some(vec![1, 2, 4]);
        assert_ne!(source, other);

        let mut other = source.clone();
        other.digest = None;
        assert_ne!(source, other);
    }

    #[test]
    fn digest_serializes_as_hex() {
        let fp = fingerprint("u", &[0xde, 0xad]);
        let json = serde_json::to_value(&fp).unwrap();
        assert_eq!(json["digest"], "dead");
        let back: Fingerprint = serde_json::from_value(json).unwrap();
        assert_eq!(back.digest, Some(vec![0xde, 0xad]));
        assert_eq!(back.digest_hex(), "dead");
    }
}
