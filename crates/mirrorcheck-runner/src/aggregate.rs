//! Reduce target results to metric points.

use mirrorcheck_core::{Aggregation, CdnPoint, MirrorPoint, TargetResult};
use std::collections::HashSet;

/// Turn target results into mirror and CDN points
///
/// Progress is the completion percentage as a fraction. A CDN mirror gets a
/// single mirror point, taken from the first of its node results (the worst
/// node when results come from the orchestrator), plus one point per node.
#[must_use]
pub fn aggregate(results: &[TargetResult]) -> Aggregation {
    let mut aggregation = Aggregation::default();
    let mut cdn_seen = HashSet::new();

    for result in results {
        let progress = result.completion_percent / 100.0;
        match &result.cdn_node_address {
            Some(node) => {
                if cdn_seen.insert(result.target_id.as_str()) {
                    aggregation.mirror_points.push(MirrorPoint {
                        name: result.url_prefix.clone(),
                        progress,
                    });
                }
                aggregation.cdn_points.push(CdnPoint {
                    mirror_id: result.target_id.clone(),
                    node_ip: node.clone(),
                    progress,
                });
            }
            None if !result.url_prefix.is_empty() => {
                aggregation.mirror_points.push(MirrorPoint {
                    name: result.url_prefix.clone(),
                    progress,
                });
            }
            None => {}
        }
    }

    aggregation
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, prefix: &str, node: Option<&str>, percent: f64) -> TargetResult {
        TargetResult {
            target_id: id.into(),
            url_prefix: prefix.into(),
            cdn_node_address: node.map(String::from),
            records: Vec::new(),
            completion_percent: percent,
            error_count: 0,
        }
    }

    #[test]
    fn plain_mirrors_get_one_point_each() {
        let aggregation = aggregate(&[
            result("a", "https://a.example/repo/", None, 100.0),
            result("a", "http://a.example/repo/", None, 50.0),
            result("b", "", None, 10.0),
        ]);
        assert_eq!(aggregation.mirror_points.len(), 2);
        assert!((aggregation.mirror_points[1].progress - 0.5).abs() < f64::EPSILON);
        assert!(aggregation.cdn_points.is_empty());
    }

    #[test]
    fn cdn_nodes_share_one_mirror_point() {
        let results: Vec<TargetResult> = (0..5)
            .map(|i| {
                result(
                    "default",
                    "https://cdn.example.org/repo/",
                    Some(&format!("10.0.0.{i}")),
                    f64::from(i) * 25.0,
                )
            })
            .collect();

        let aggregation = aggregate(&results);
        assert_eq!(aggregation.mirror_points.len(), 1);
        assert!(aggregation.mirror_points[0].progress.abs() < f64::EPSILON);
        assert_eq!(aggregation.cdn_points.len(), 5);
        assert_eq!(aggregation.cdn_points[4].node_ip, "10.0.0.4");
        assert!((aggregation.cdn_points[4].progress - 1.0).abs() < f64::EPSILON);
    }
}
