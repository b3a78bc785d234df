//! Offline scoring of evaluated decisions.
//!
//! - [`types`] -- [`Experiment`], [`SlotFeatures`] and the [`DecisionRecord`]
//!   results-file format.
//! - [`catalog`] -- [`ScenarioCatalog`], which turns decisions into
//!   experiments from the stored scenario files.
//! - [`scores`] -- the six metrics, [`MetricSet`] and [`ScoreReport`].

pub mod catalog;
pub mod scores;
pub mod types;

use anyhow::{bail, Result};

pub use catalog::ScenarioCatalog;
pub use scores::{MetricSet, ScoreReport};
pub use types::{
    load_decisions, save_decisions, save_decisions_archive, DecisionRecord, Experiment, SlotFeatures,
    ARCHIVE_ENTRY, MAX_DISTANCE,
};

use crate::config::ScoreWeights;

/// Rebuild experiments for `decisions` and score them.
pub fn score_decisions(
    catalog: &mut ScenarioCatalog,
    decisions: &[DecisionRecord],
    weights: ScoreWeights,
) -> Result<ScoreReport> {
    if decisions.is_empty() {
        bail!("no decisions to score");
    }
    let experiments = catalog.build_experiments(decisions)?;
    let report = ScoreReport::new(&experiments, weights);
    tracing::info!(
        experiments = report.experiments,
        success_rate = report.metrics.success_rate,
        score = report.score,
        "Scored decisions"
    );
    Ok(report)
}
