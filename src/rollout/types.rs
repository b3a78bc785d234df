//! Records of driven episodes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::ParkingId;

/// A single transition within an episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Zero-based index of this step within the episode.
    pub step_index: usize,
    /// Waypoint (1-based) the agent stood at when acting.
    pub position: u32,
    pub action: u8,
    pub reward: f64,
}

/// One complete episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rollout {
    /// Unique identifier (UUID v4).
    pub id: String,
    pub scan: String,
    /// Index of the target in the environment's instruction list.
    pub instruction_index: usize,
    pub instruction: String,
    /// Encoded instruction the agent observed.
    pub instruction_tokens: Vec<u32>,
    pub steps: Vec<Step>,
    pub total_reward: f64,
    /// The slot that decided the episode, if one was selected.
    pub chosen_slot: Option<ParkingId>,
    /// The agent selected exactly the target slot.
    pub success: bool,
}

/// Accumulates rollouts for summary statistics.
#[derive(Debug, Clone, Default)]
pub struct RolloutBuffer {
    rollouts: Vec<Rollout>,
}

impl RolloutBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rollouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rollouts.is_empty()
    }

    pub fn push(&mut self, rollout: Rollout) {
        self.rollouts.push(rollout);
    }

    pub fn extend(&mut self, iter: impl IntoIterator<Item = Rollout>) {
        self.rollouts.extend(iter);
    }

    pub fn as_slice(&self) -> &[Rollout] {
        &self.rollouts
    }

    pub fn success_rate(&self) -> f64 {
        if self.rollouts.is_empty() {
            return 0.0;
        }
        let successes = self.rollouts.iter().filter(|r| r.success).count();
        successes as f64 / self.rollouts.len() as f64
    }

    pub fn mean_reward(&self) -> f64 {
        if self.rollouts.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.rollouts.iter().map(|r| r.total_reward).sum();
        sum / self.rollouts.len() as f64
    }

    pub fn mean_length(&self) -> f64 {
        if self.rollouts.is_empty() {
            return 0.0;
        }
        let steps: usize = self.rollouts.iter().map(|r| r.steps.len()).sum();
        steps as f64 / self.rollouts.len() as f64
    }

    /// Episode counts keyed by terminal reward, formatted for logging.
    pub fn outcome_histogram(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for r in &self.rollouts {
            let last = r.steps.last().map_or(0.0, |s| s.reward);
            *counts.entry(format!("{last:.1}")).or_insert(0) += 1;
        }
        counts
    }
}
