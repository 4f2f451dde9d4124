//! Probe-set selection.
//!
//! Every non-package path is probed. Packages are thinned with an
//! independent coin flip per path so the expected count lands near the cap
//! in a single pass; the exact count is not guaranteed.

use rand::Rng;
use std::collections::BTreeSet;

use crate::ChangeSet;

/// Default cap on sampled package paths.
pub const DEFAULT_MAX_PACKAGES: usize = 300;

/// Select the probe set from package and other paths.
///
/// The returned paths are sorted and unique.
pub fn sample_paths<R: Rng + ?Sized>(
    packages: &BTreeSet<String>,
    others: &BTreeSet<String>,
    max_packages: usize,
    rng: &mut R,
) -> Vec<String> {
    let mut selected: BTreeSet<&String> = others.iter().collect();

    if packages.len() <= max_packages {
        selected.extend(packages.iter());
    } else {
        let rate = max_packages as f64 / packages.len() as f64;
        selected.extend(packages.iter().filter(|_| rng.gen::<f64>() < rate));
    }

    selected.into_iter().cloned().collect()
}

/// Sample a [`ChangeSet`] with the thread-local RNG.
pub fn sample_change_set(changes: &ChangeSet, max_packages: usize) -> Vec<String> {
    sample_paths(
        &changes.packages,
        &changes.others,
        max_packages,
        &mut rand::thread_rng(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn packages(n: usize) -> BTreeSet<String> {
        (0..n).map(|i| format!("pool/main/p/pkg{i}_1.0_amd64.deb")).collect()
    }

    fn others() -> BTreeSet<String> {
        ["dists/stable/Release", "dists/stable/main/binary-amd64/Packages.gz"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    #[test]
    fn small_package_set_returned_whole() {
        let mut rng = StdRng::seed_from_u64(7);
        let pkgs = packages(50);
        let result = sample_paths(&pkgs, &others(), 300, &mut rng);
        assert_eq!(result.len(), 52);
        assert!(pkgs.iter().all(|p| result.contains(p)));
    }

    #[test]
    fn others_always_included() {
        let mut rng = StdRng::seed_from_u64(7);
        let result = sample_paths(&packages(10_000), &others(), 0, &mut rng);
        assert_eq!(result, others().into_iter().collect::<Vec<_>>());
    }

    #[test]
    fn large_package_set_averages_near_cap() {
        let mut rng = StdRng::seed_from_u64(42);
        let pkgs = packages(3_000);
        let empty = BTreeSet::new();
        let trials: u32 = 200;
        let total: usize = (0..trials)
            .map(|_| sample_paths(&pkgs, &empty, 300, &mut rng).len())
            .sum();
        let mean = total as f64 / f64::from(trials);
        // Binomial(3000, 0.1): sd ~16.4 per trial, ~1.2 for the mean.
        assert!((mean - 300.0).abs() < 10.0, "mean was {mean}");
    }

    #[test]
    fn output_is_sorted_and_unique() {
        let mut rng = StdRng::seed_from_u64(1);
        let result = sample_paths(&packages(1_000), &others(), 100, &mut rng);
        let mut sorted = result.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(result, sorted);
    }

    #[test]
    fn sampling_change_set() {
        let changes = ChangeSet {
            packages: packages(3),
            others: others(),
            newest_manifest: None,
        };
        assert_eq!(sample_change_set(&changes, DEFAULT_MAX_PACKAGES).len(), 5);
    }
}
