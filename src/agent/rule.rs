//! Scripted agents that drive the parking environment.
//!
//! - [`RuleBasedAgent`] follows the perfect trajectory, deviating to a uniform
//!   random action at the rate its [`AgentMode`] prescribes.
//! - [`RandomAgent`] mostly advances and occasionally picks a random action.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::AgentMode;
use crate::env::{Observation, PerfectTrajectory, ACTION_COUNT};
use crate::error::EnvError;

/// Everything a policy may look at when choosing an action.
#[derive(Debug, Clone, Copy)]
pub struct PolicyInput<'a> {
    pub observation: &'a Observation,
    pub perfect: &'a PerfectTrajectory,
    /// Current 1-based waypoint.
    pub position: u32,
}

/// The interface episode drivers need from an agent.
pub trait Policy {
    /// Choose an action in `0..ACTION_COUNT`.
    fn act(&mut self, input: &PolicyInput<'_>) -> Result<u8, EnvError>;
}

fn seeded(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

#[derive(Debug, Clone)]
pub struct RuleBasedAgent {
    mode: AgentMode,
    rng: StdRng,
}

impl RuleBasedAgent {
    pub fn new(mode: AgentMode, seed: Option<u64>) -> Self {
        Self {
            mode,
            rng: seeded(seed),
        }
    }

    pub fn mode(&self) -> AgentMode {
        self.mode
    }
}

impl Policy for RuleBasedAgent {
    fn act(&mut self, input: &PolicyInput<'_>) -> Result<u8, EnvError> {
        let random_action = self.rng.gen_range(0..ACTION_COUNT);
        if self.mode == AgentMode::Random {
            return Ok(random_action);
        }

        // Looked up even when the random action wins, so a bad position is
        // always reported.
        let optimal = input.perfect.optimal_action(input.position)?;
        let rate = self.mode.random_rate();
        if rate > 0.0 && self.rng.gen_bool(rate) {
            Ok(random_action)
        } else {
            Ok(optimal)
        }
    }
}

/// Advances by default; takes a uniformly random action 10% of the time.
#[derive(Debug, Clone)]
pub struct RandomAgent {
    rng: StdRng,
}

impl RandomAgent {
    const EXPLORE_RATE: f64 = 0.1;

    pub fn new(seed: Option<u64>) -> Self {
        Self { rng: seeded(seed) }
    }
}

impl Policy for RandomAgent {
    fn act(&mut self, _input: &PolicyInput<'_>) -> Result<u8, EnvError> {
        if self.rng.gen_bool(Self::EXPLORE_RATE) {
            Ok(self.rng.gen_range(0..ACTION_COUNT))
        } else {
            Ok(0)
        }
    }
}
