//! The six parking metrics and their weighted combination.
//!
//! | metric | meaning                                                        |
//! |--------|----------------------------------------------------------------|
//! | NE     | navigation error: target existed, chosen slot was occupied     |
//! | SR     | success rate: chosen slot is an acceptable target              |
//! | DWSR   | distance-weighted success: successes weighted by `1/distance`  |
//! | APE    | absolute parking-slot error: nearest target gap, normalised    |
//! | MR     | miss rate: share of targets passed before the chosen slot      |
//! | PSMD   | matching rate: share of the first target's tags reproduced     |
//!
//! Every function is a deterministic pass over the experiments in order.

use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use super::types::{Experiment, MAX_DISTANCE};
use crate::config::ScoreWeights;

/// Fraction of experiments with at least one target whose chosen slot is
/// occupied.
///
/// `experiments` must be non-empty; an empty slice yields NaN.
pub fn navigation_error_rate(experiments: &[Experiment]) -> f64 {
    debug_assert!(!experiments.is_empty(), "navigation error over no experiments");
    let errors = experiments
        .iter()
        .filter(|e| !e.target_features.is_empty())
        .filter(|e| e.result_features.tag("Occupied").is_some_and(|v| v != 0))
        .count();
    errors as f64 / experiments.len() as f64
}

/// Fraction of experiments whose decision is an acceptable target.
///
/// `experiments` must be non-empty; an empty slice yields NaN.
pub fn success_rate(experiments: &[Experiment]) -> f64 {
    debug_assert!(!experiments.is_empty(), "success rate over no experiments");
    let successes = experiments.iter().filter(|e| e.is_success()).count();
    successes as f64 / experiments.len() as f64
}

/// Sum of `1 / distance` over successful experiments, divided by the number
/// of experiments.
pub fn weighted_success_rate(experiments: &[Experiment]) -> f64 {
    if experiments.is_empty() {
        return 0.0;
    }
    let weighted: f64 = experiments
        .iter()
        .filter(|e| e.is_success())
        .filter_map(|e| e.result_features.distance)
        .filter(|&d| d > 0)
        .map(|d| 1.0 / f64::from(d))
        .sum();
    weighted / experiments.len() as f64
}

/// Normalised gap between two route distances.
fn gap(a: f64, b: f64) -> f64 {
    ((a - b) / f64::from(MAX_DISTANCE)).abs()
}

fn nearest_gap(from: f64, targets: &[u32]) -> f64 {
    targets
        .iter()
        .map(|&t| OrderedFloat(gap(from, f64::from(t))))
        .min()
        .map_or(0.0, |g| g.0)
}

/// Per-experiment term of [`absolute_slot_error`].
fn slot_error(experiment: &Experiment) -> f64 {
    let targets = experiment.target_distances();
    let max = f64::from(MAX_DISTANCE);
    match (experiment.result_features.distance, targets.is_empty()) {
        (Some(result), false) => nearest_gap(f64::from(result), &targets),
        // No decision distance: measure targets against the far end.
        (None, false) => nearest_gap(max, &targets),
        // No targets: the nearer of the two route ends.
        (Some(result), true) => {
            let result = f64::from(result);
            gap(result, max).min(gap(result, 0.0))
        }
        (None, true) => 0.0,
    }
}

/// Mean over experiments of the normalised gap between the chosen slot and
/// the nearest acceptable target.
pub fn absolute_slot_error(experiments: &[Experiment]) -> f64 {
    if experiments.is_empty() {
        return 0.0;
    }
    let total: f64 = experiments.iter().map(slot_error).sum();
    total / experiments.len() as f64
}

/// Mean over experiments of the share of targets lying strictly before the
/// chosen slot. Experiments lacking either side contribute 0.
pub fn miss_rate(experiments: &[Experiment]) -> f64 {
    if experiments.is_empty() {
        return 0.0;
    }
    let total: f64 = experiments
        .iter()
        .map(|e| {
            let targets = e.target_distances();
            match e.result_features.distance {
                Some(result) if !targets.is_empty() => {
                    let passed = targets.iter().filter(|&&t| t < result).count();
                    passed as f64 / targets.len() as f64
                }
                _ => 0.0,
            }
        })
        .sum();
    total / experiments.len() as f64
}

/// Mean, over experiments with targets and a decision, of the share of the
/// first target's tags the chosen slot reproduces exactly.
pub fn matching_rate(experiments: &[Experiment]) -> f64 {
    let mut total = 0.0;
    let mut counted = 0usize;
    for e in experiments {
        let Some(first) = e.target_features.first() else {
            continue;
        };
        if e.result_id.is_none() {
            continue;
        }
        counted += 1;

        let Some(target_tags) = first.tags.as_ref().filter(|t| !t.is_empty()) else {
            continue;
        };
        let matched = target_tags
            .iter()
            .filter(|(key, value)| e.result_features.tag(key) == Some(**value))
            .count();
        total += matched as f64 / target_tags.len() as f64;
    }
    if counted == 0 {
        0.0
    } else {
        total / counted as f64
    }
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// All six metrics for one batch of experiments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    pub navigation_error: f64,
    pub success_rate: f64,
    pub weighted_success_rate: f64,
    pub absolute_slot_error: f64,
    pub miss_rate: f64,
    pub matching_rate: f64,
}

impl MetricSet {
    /// `experiments` must be non-empty (see [`navigation_error_rate`]).
    pub fn compute(experiments: &[Experiment]) -> Self {
        Self {
            navigation_error: navigation_error_rate(experiments),
            success_rate: success_rate(experiments),
            weighted_success_rate: weighted_success_rate(experiments),
            absolute_slot_error: absolute_slot_error(experiments),
            miss_rate: miss_rate(experiments),
            matching_rate: matching_rate(experiments),
        }
    }

    /// Linear combination of the metrics.
    pub fn combined(&self, weights: &ScoreWeights) -> f64 {
        weights.navigation_error * self.navigation_error
            + weights.success_rate * self.success_rate
            + weights.weighted_success_rate * self.weighted_success_rate
            + weights.absolute_slot_error * self.absolute_slot_error
            + weights.miss_rate * self.miss_rate
            + weights.matching_rate * self.matching_rate
    }
}

/// A scored batch, as written by `avp score --output`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreReport {
    pub generated_at: DateTime<Utc>,
    pub experiments: usize,
    pub metrics: MetricSet,
    pub weights: ScoreWeights,
    pub score: f64,
}

impl ScoreReport {
    pub fn new(experiments: &[Experiment], weights: ScoreWeights) -> Self {
        let metrics = MetricSet::compute(experiments);
        Self {
            generated_at: Utc::now(),
            experiments: experiments.len(),
            metrics,
            weights,
            score: metrics.combined(&weights),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ParkingId, SlotTags};
    use crate::metrics::types::SlotFeatures;

    fn tags(pairs: &[(&str, i64)]) -> SlotTags {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn features(distance: u32, pairs: &[(&str, i64)]) -> SlotFeatures {
        SlotFeatures {
            distance: Some(distance),
            tags: Some(tags(pairs)),
        }
    }

    fn experiment(result: Option<(i64, SlotFeatures)>, targets: &[(i64, SlotFeatures)]) -> Experiment {
        let (result_id, result_features) = match result {
            Some((id, f)) => (Some(ParkingId::from(id)), f),
            None => (None, SlotFeatures::unchosen()),
        };
        Experiment {
            result_id,
            target_id: targets.iter().map(|(id, _)| ParkingId::from(*id)).collect(),
            target_features: targets.iter().map(|(_, f)| f.clone()).collect(),
            result_features,
        }
    }

    #[test]
    fn success_rate_counts_hits() {
        let hit = experiment(Some((1, features(3, &[]))), &[(1, features(3, &[]))]);
        let miss = experiment(Some((2, features(4, &[]))), &[(1, features(3, &[]))]);
        let none = experiment(None, &[(1, features(3, &[]))]);
        let exps = vec![hit.clone(), miss, hit, none];
        assert_eq!(success_rate(&exps), 0.5);
    }

    #[test]
    fn navigation_error_needs_target_and_occupied_choice() {
        let occupied = features(5, &[("Occupied", 1)]);
        let exps = vec![
            experiment(Some((1, occupied.clone())), &[(2, features(6, &[]))]),
            // No targets: not a navigation error.
            experiment(Some((1, occupied)), &[]),
            experiment(Some((3, features(5, &[("Occupied", 0)]))), &[(2, features(6, &[]))]),
            // No decision: tags unknown, not counted.
            experiment(None, &[(2, features(6, &[]))]),
        ];
        assert_eq!(navigation_error_rate(&exps), 0.25);
    }

    #[test]
    fn weighted_success_favours_near_slots() {
        let exps = vec![
            experiment(Some((1, features(2, &[]))), &[(1, features(2, &[]))]),
            experiment(Some((5, features(10, &[]))), &[(5, features(10, &[]))]),
            experiment(Some((6, features(4, &[]))), &[(7, features(10, &[]))]),
            experiment(None, &[]),
        ];
        let expected = (1.0 / 2.0 + 1.0 / 10.0) / 4.0;
        assert!((weighted_success_rate(&exps) - expected).abs() < 1e-12);
        assert_eq!(weighted_success_rate(&[]), 0.0);
    }

    #[test]
    fn slot_error_uses_nearest_target() {
        let exps = vec![experiment(
            Some((9, features(15, &[]))),
            &[(1, features(10, &[])), (2, features(20, &[]))],
        )];
        assert!((absolute_slot_error(&exps) - 5.0 / 87.0).abs() < 1e-12);
    }

    #[test]
    fn slot_error_special_cases() {
        // Unresolved decision: targets against the far end.
        let mut unresolved = experiment(Some((9, features(0, &[]))), &[(1, features(80, &[]))]);
        unresolved.result_features = SlotFeatures::unresolved();
        assert!((slot_error(&unresolved) - 7.0 / 87.0).abs() < 1e-12);

        // No targets: nearer route end.
        let no_targets = experiment(Some((9, features(30, &[]))), &[]);
        assert!((slot_error(&no_targets) - 30.0 / 87.0).abs() < 1e-12);
        let no_targets_far = experiment(Some((9, features(80, &[]))), &[]);
        assert!((slot_error(&no_targets_far) - 7.0 / 87.0).abs() < 1e-12);

        // Neither side.
        let mut nothing = experiment(None, &[]);
        nothing.result_features = SlotFeatures::unresolved();
        assert_eq!(slot_error(&nothing), 0.0);

        // No decision uses the sentinel distance 87.
        let skipped = experiment(None, &[(1, features(85, &[]))]);
        assert!((slot_error(&skipped) - 2.0 / 87.0).abs() < 1e-12);

        assert_eq!(absolute_slot_error(&[]), 0.0);
    }

    #[test]
    fn miss_rate_counts_passed_targets() {
        let exps = vec![
            experiment(
                Some((9, features(15, &[]))),
                &[(1, features(10, &[])), (2, features(20, &[])), (3, features(5, &[]))],
            ),
            // No targets: contributes 0 but still counts.
            experiment(Some((9, features(15, &[]))), &[]),
        ];
        assert!((miss_rate(&exps) - (2.0 / 3.0) / 2.0).abs() < 1e-12);
        assert_eq!(miss_rate(&[]), 0.0);
    }

    #[test]
    fn matching_rate_compares_first_target_tags() {
        let exps = vec![experiment(
            Some((4, features(9, &[("A", 1), ("B", 3)]))),
            &[(1, features(7, &[("A", 1), ("B", 2)]))],
        )];
        assert_eq!(matching_rate(&exps), 0.5);
    }

    #[test]
    fn matching_rate_skips_experiments_without_decision_or_targets() {
        let exps = vec![
            experiment(
                Some((4, features(9, &[("A", 1), ("B", 2)]))),
                &[(1, features(7, &[("A", 1), ("B", 2)]))],
            ),
            experiment(None, &[(1, features(7, &[("A", 1)]))]),
            experiment(Some((4, features(9, &[("A", 1)]))), &[]),
        ];
        assert_eq!(matching_rate(&exps), 1.0);
        assert_eq!(matching_rate(&[]), 0.0);
    }

    #[test]
    fn combined_score_uses_fixed_weights() {
        let metrics = MetricSet {
            navigation_error: 0.1,
            success_rate: 0.5,
            weighted_success_rate: 0.05,
            absolute_slot_error: 0.2,
            miss_rate: 0.3,
            matching_rate: 0.75,
        };
        let expected = -10.0 * 0.1 + 50.0 * 0.5 + 100.0 * 0.05 - 10.0 * 0.2 - 5.0 * 0.3 + 40.0 * 0.75;
        assert!((metrics.combined(&ScoreWeights::default()) - expected).abs() < 1e-9);
    }

    #[test]
    fn report_is_reproducible() {
        let exps = vec![
            experiment(Some((1, features(3, &[("A", 1)]))), &[(1, features(3, &[("A", 1)]))]),
            experiment(None, &[(2, features(40, &[("A", 0)]))]),
        ];
        let a = ScoreReport::new(&exps, ScoreWeights::default());
        let b = ScoreReport::new(&exps, ScoreWeights::default());
        assert_eq!(a.metrics, b.metrics);
        assert_eq!(a.score.to_bits(), b.score.to_bits());
        assert_eq!(a.experiments, 2);
    }
}
