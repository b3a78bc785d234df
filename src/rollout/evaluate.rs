//! Evaluation and demonstration collection over every instruction.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::collector::EpisodeCollector;
use super::types::{Rollout, RolloutBuffer};
use crate::agent::Policy;
use crate::env::traits::image_key;
use crate::env::{ImageStore, ParkingEnv, TextEncoder};
use crate::metrics::DecisionRecord;

/// Runs one episode per instruction and records the agent's decisions.
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    collector: EpisodeCollector,
}

/// Decisions plus the rollouts that produced them.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub decisions: Vec<DecisionRecord>,
    pub rollouts: RolloutBuffer,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drive `agent` through every instruction in order.
    ///
    /// Instruction ids in the resulting records count within each scenario,
    /// matching the order of that scenario's `Traj.json`.
    pub fn evaluate<S, T, P>(&self, env: &mut ParkingEnv<S, T>, agent: &mut P) -> Result<Evaluation>
    where
        S: ImageStore,
        T: TextEncoder,
        P: Policy,
    {
        let scenario_offsets = scenario_local_ids(env);
        let mut decisions = Vec::with_capacity(env.instruction_count());
        let mut rollouts = RolloutBuffer::new();

        for (index, &instruction_id) in scenario_offsets.iter().enumerate() {
            let rollout = self
                .collector
                .run_episode(env, agent, Some(index))
                .with_context(|| format!("evaluation episode for instruction {index} failed"))?;
            tracing::debug!(
                index,
                scan = %rollout.scan,
                decision = ?rollout.chosen_slot,
                reward = rollout.total_reward,
                "Evaluated instruction"
            );
            decisions.push(DecisionRecord {
                scenario_id: rollout.scan.clone(),
                instruction_id,
                decision: rollout.chosen_slot.clone(),
            });
            rollouts.push(rollout);
        }

        tracing::info!(
            episodes = rollouts.len(),
            success_rate = rollouts.success_rate(),
            mean_reward = rollouts.mean_reward(),
            "Evaluation finished"
        );
        Ok(Evaluation {
            decisions,
            rollouts,
        })
    }
}

/// Position of each instruction within its own scenario.
fn scenario_local_ids<S, T>(env: &ParkingEnv<S, T>) -> Vec<usize>
where
    S: ImageStore,
    T: TextEncoder,
{
    let mut seen = std::collections::HashMap::<&str, usize>::new();
    env.trajectories()
        .iter()
        .map(|t| {
            let next = seen.entry(t.scan.as_str()).or_insert(0);
            let id = *next;
            *next += 1;
            id
        })
        .collect()
}

/// One supervised example: the frame key the agent saw, the encoded
/// instruction and the action it took there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Demonstration {
    pub image: String,
    pub instruction: Vec<u32>,
    pub action: u8,
}

/// Flatten rollouts into demonstrations. The first step of every episode is
/// skipped.
pub fn demonstrations(rollouts: &[Rollout]) -> Vec<Demonstration> {
    rollouts
        .iter()
        .flat_map(|r| {
            r.steps.iter().skip(1).map(move |step| Demonstration {
                image: image_key(&r.scan, step.position),
                instruction: r.instruction_tokens.clone(),
                action: step.action,
            })
        })
        .collect()
}

/// Run `episodes` episodes with `agent` and flatten them into demonstrations.
pub fn collect_demonstrations<S, T, P>(
    env: &mut ParkingEnv<S, T>,
    agent: &mut P,
    episodes: usize,
) -> Result<Vec<Demonstration>>
where
    S: ImageStore,
    T: TextEncoder,
    P: Policy,
{
    let rollouts = EpisodeCollector::new().collect_episodes(env, agent, episodes)?;
    let demos = demonstrations(&rollouts);
    tracing::info!(episodes, demonstrations = demos.len(), "Collected demonstrations");
    Ok(demos)
}

/// Write `value` as pretty JSON, creating parent directories.
pub fn save_json<V: Serialize + ?Sized>(path: &Path, value: &V) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
