//! Episode collection: driving an agent through the parking environment.
//!
//! The [`EpisodeCollector`] runs episodes by repeatedly:
//!   1. presenting the observation, position and perfect trajectory to the
//!      agent,
//!   2. stepping the environment with the agent's action,
//!   3. recording the `(position, action, reward)` transition,
//!
//! until the environment reports the episode done.

use anyhow::{Context, Result};
use uuid::Uuid;

use super::types::{Rollout, Step};
use crate::agent::{Policy, PolicyInput};
use crate::env::reward::EXACT_MATCH_REWARD;
use crate::env::{Environment, ImageStore, ParkingEnv, TextEncoder, MAX_PATH_LEN};

/// Drives agents through a [`ParkingEnv`] and records the episodes.
#[derive(Debug, Clone, Default)]
pub struct EpisodeCollector;

impl EpisodeCollector {
    pub fn new() -> Self {
        Self
    }

    /// Run `num_episodes` episodes, letting the environment's selection
    /// policy pick each target.
    pub fn collect_episodes<S, T, P>(
        &self,
        env: &mut ParkingEnv<S, T>,
        agent: &mut P,
        num_episodes: usize,
    ) -> Result<Vec<Rollout>>
    where
        S: ImageStore,
        T: TextEncoder,
        P: Policy,
    {
        let mut rollouts = Vec::with_capacity(num_episodes);
        for episode in 0..num_episodes {
            let rollout = self.run_episode(env, agent, None)?;
            tracing::info!(
                episode,
                scan = %rollout.scan,
                steps = rollout.steps.len(),
                reward = rollout.total_reward,
                success = rollout.success,
                "collected episode"
            );
            rollouts.push(rollout);
        }
        Ok(rollouts)
    }

    /// Run one episode, targeting `instruction_index` when given.
    pub fn run_episode<S, T, P>(
        &self,
        env: &mut ParkingEnv<S, T>,
        agent: &mut P,
        instruction_index: Option<usize>,
    ) -> Result<Rollout>
    where
        S: ImageStore,
        T: TextEncoder,
        P: Policy,
    {
        let mut observation = env.reset(instruction_index).context("reset failed")?;
        let perfect = env
            .perfect_trajectory()
            .cloned()
            .context("environment has no episode after reset")?;

        let mut steps = Vec::new();
        let mut total_reward = 0.0;

        for step_index in 0..MAX_PATH_LEN as usize {
            let position = env.position().unwrap_or(1);
            let action = agent.act(&PolicyInput {
                observation: &observation,
                perfect: &perfect,
                position,
            })?;
            let outcome = env
                .step(action)
                .with_context(|| format!("step {step_index} (action {action}) failed"))?;

            total_reward += outcome.reward;
            steps.push(Step {
                step_index,
                position,
                action,
                reward: outcome.reward,
            });

            if outcome.done {
                break;
            }
            observation = outcome.observation;
        }

        let last_reward = steps.last().map_or(0.0, |s| s.reward);
        let target_index = env.target_index().unwrap_or_default();
        let target = &env.trajectories()[target_index];

        Ok(Rollout {
            id: Uuid::new_v4().to_string(),
            scan: target.scan.clone(),
            instruction_index: target_index,
            instruction: target.instruction.clone(),
            instruction_tokens: observation.instruction.clone(),
            steps,
            total_reward,
            chosen_slot: env.chosen_slot().map(|s| s.parking_id.clone()),
            success: env.is_done() && last_reward == EXACT_MATCH_REWARD,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::agent::RuleBasedAgent;
    use crate::config::{AgentMode, EnvSettings, InstructionSelection};
    use crate::data::{ParkingId, ParkingSlot, SlotTags, Trajectory};
    use crate::env::traits::image_key;
    use crate::env::{Frame, HashingTokenizer, InMemoryImageStore};
    use crate::error::EnvError;

    pub(crate) const SCAN: &str = "20240521_01";

    /// Two targeted instructions and one path-only instruction over three
    /// slots, all images present.
    pub(crate) fn fixture_env() -> ParkingEnv<InMemoryImageStore, HashingTokenizer> {
        let slot = |id: i64, path_id: u32, loc_id: u32| {
            let mut s: ParkingSlot = serde_json::from_value(serde_json::json!({
                "ParkingID": id, "PathID": path_id, "LocID": loc_id
            }))
            .unwrap();
            s.scan = SCAN.to_string();
            s
        };
        let targeted = |id: i64, path_id: u32, loc_id: u32| {
            let tags: SlotTags = [("Disabled".to_string(), 0), ("Charging".to_string(), 0)]
                .into_iter()
                .collect();
            Trajectory {
                path_id: Some(path_id),
                loc_id: Some(loc_id),
                parking_id: Some(ParkingId::from(id)),
                tags: Some(tags),
                ..Trajectory::path_only(SCAN, "Park in a regular slot.")
            }
        };

        let mut images = InMemoryImageStore::new();
        for step in 1..=MAX_PATH_LEN {
            images.insert(image_key(SCAN, step), Frame::blank(2, 2, 3));
        }
        let settings = EnvSettings {
            selection: InstructionSelection::RoundRobin,
            ..EnvSettings::default()
        };
        ParkingEnv::new(
            settings,
            vec![slot(1, 2, 3), slot(2, 6, 1), slot(3, 6, 2)],
            vec![
                targeted(1, 2, 3),
                targeted(3, 6, 2),
                Trajectory::path_only(SCAN, "Drive through."),
            ],
            images,
            HashingTokenizer::default(),
        )
    }

    #[test]
    fn optimal_agent_reaches_every_target() {
        let mut env = fixture_env();
        let mut agent = RuleBasedAgent::new(AgentMode::Optimal, Some(0));
        let rollouts = EpisodeCollector::new()
            .collect_episodes(&mut env, &mut agent, 3)
            .unwrap();

        assert_eq!(rollouts.len(), 3);
        assert!(rollouts[0].success);
        assert_eq!(rollouts[0].steps.len(), 2);
        assert_eq!(rollouts[0].chosen_slot, Some(ParkingId::from(1)));
        assert!(rollouts[1].success);
        assert_eq!(rollouts[1].steps.len(), 6);
        assert_eq!(rollouts[1].instruction_tokens.len(), 64);

        // Path-only: advances to the end and overruns.
        let last = &rollouts[2];
        assert!(!last.success);
        assert_eq!(last.steps.len(), 29);
        assert_eq!(last.total_reward, -1.0);
        assert_eq!(last.chosen_slot, None);
    }

    #[test]
    fn agent_errors_propagate() {
        struct Broken;
        impl Policy for Broken {
            fn act(&mut self, input: &PolicyInput<'_>) -> Result<u8, EnvError> {
                input.perfect.optimal_action(0)
            }
        }

        let mut env = fixture_env();
        let err = EpisodeCollector::new()
            .run_episode(&mut env, &mut Broken, Some(0))
            .unwrap_err();
        assert!(err.to_string().contains("between 1 and 29"));
    }
}
