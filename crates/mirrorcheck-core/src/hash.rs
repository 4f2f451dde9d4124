//! Bounded-window SHA-256 via `ring::digest`.
//!
//! A fingerprint never hashes more than two chunks of a file: the first
//! chunk and either the last chunk or, for files shorter than two chunks,
//! the bytes that follow the first chunk.

use ring::digest::{Context, SHA256};
use std::ops::Range;

/// Size of each hashed window in bytes.
pub const CHUNK_SIZE: u64 = 4 * 1024;

/// Byte windows hashed for a file of `total` bytes.
///
/// The second window is `None` when the first chunk already covers the file.
#[must_use]
pub fn windows(total: u64) -> (Range<u64>, Option<Range<u64>>) {
    let first = 0..total.min(CHUNK_SIZE);
    let second = second_window_start(total).map(|begin| begin..total);
    (first, second)
}

/// Start offset of the second window, if one is needed.
#[must_use]
pub const fn second_window_start(total: u64) -> Option<u64> {
    if total <= CHUNK_SIZE {
        None
    } else if total < CHUNK_SIZE * 2 {
        // The last chunk would overlap the first one.
        Some(CHUNK_SIZE)
    } else {
        Some(total - CHUNK_SIZE)
    }
}

/// Running digest fed one window at a time.
pub struct WindowDigest {
    context: Context,
    covered: u64,
}

impl Default for WindowDigest {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowDigest {
    /// Start an empty digest
    #[must_use]
    pub fn new() -> Self {
        Self {
            context: Context::new(&SHA256),
            covered: 0,
        }
    }

    /// Feed a window
    pub fn update(&mut self, bytes: &[u8]) {
        self.context.update(bytes);
        self.covered += bytes.len() as u64;
    }

    /// Number of bytes hashed so far
    #[must_use]
    pub const fn covered(&self) -> u64 {
        self.covered
    }

    /// Finalize into raw digest bytes
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.context.finish().as_ref().to_vec()
    }
}

/// Digest a whole in-memory file exactly the way a remote fingerprint would.
#[must_use]
pub fn digest_content(content: &[u8]) -> Vec<u8> {
    let total = content.len() as u64;
    let (first, second) = windows(total);
    let mut digest = WindowDigest::new();
    digest.update(&content[to_usize(&first)]);
    if let Some(second) = second {
        digest.update(&content[to_usize(&second)]);
    }
    digest.finish()
}

#[allow(clippy::cast_possible_truncation)]
const fn to_usize(range: &Range<u64>) -> Range<usize> {
    range.start as usize..range.end as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_file_is_one_window() {
        for total in [0, 1, 100, CHUNK_SIZE] {
            let (first, second) = windows(total);
            assert_eq!(first, 0..total);
            assert!(second.is_none());
        }
    }

    #[test]
    fn medium_file_windows_do_not_overlap() {
        for total in [CHUNK_SIZE + 1, 6000, CHUNK_SIZE * 2 - 1] {
            let (first, second) = windows(total);
            assert_eq!(first, 0..CHUNK_SIZE);
            assert_eq!(second, Some(CHUNK_SIZE..total));
        }
    }

    #[test]
    fn large_file_windows_are_head_and_tail() {
        for total in [CHUNK_SIZE * 2, 12_000, 10 * 1024 * 1024] {
            let (first, second) = windows(total);
            assert_eq!(first, 0..CHUNK_SIZE);
            assert_eq!(second, Some(total - CHUNK_SIZE..total));
        }
    }

    #[test]
    fn digest_ignores_uncovered_middle() {
        let original: Vec<u8> = (0..12_000u32).map(|i| (i % 251) as u8).collect();
        let mut middle = original.clone();
        middle[6000] ^= 0xff;
        assert_eq!(digest_content(&original), digest_content(&middle));

        let mut tail = original.clone();
        tail[11_000] ^= 0xff;
        assert_ne!(digest_content(&original), digest_content(&tail));

        let mut head = original.clone();
        head[10] ^= 0xff;
        assert_ne!(digest_content(&original), digest_content(&head));
    }

    #[test]
    fn known_sha256_for_small_content() {
        assert_eq!(
            hex::encode(digest_content(b"hello world")),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn covered_counts_fed_bytes() {
        let mut digest = WindowDigest::new();
        digest.update(&[0u8; 4096]);
        digest.update(&[1u8; 100]);
        assert_eq!(digest.covered(), 4196);
    }
}
