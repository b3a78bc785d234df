//! The parking episode state machine.
//!
//! An episode walks the waypoints of one scenario. At every step the agent
//! either advances to the next waypoint (action 0) or commits to the slot at
//! location `action` of the current waypoint, which ends the episode:
//!
//! ```text
//!   reset ──> Ready (position 1) ──0──> Advancing ──0──> ... ──0 at 29──> Terminated (-1)
//!                  │                        │
//!                  └──────── 1..=6 ─────────┴──────────> Terminated (slot reward)
//! ```

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::perfect::{PerfectTrajectory, MAX_PATH_LEN};
use super::reward::{deciding_slot, selection_reward};
use super::traits::{
    image_key, Environment, Frame, ImageStore, Observation, StepOutcome, TextEncoder, ACTION_COUNT,
};
use crate::config::{EnvSettings, InstructionSelection};
use crate::data::{ParkingSlot, Trajectory};
use crate::error::EnvError;

const OVERRUN_REWARD: f64 = -1.0;

/// Coarse phase of the current episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodePhase {
    /// No episode has been started.
    Unstarted,
    /// Freshly reset, standing at the first waypoint.
    Ready,
    /// Past the first waypoint, no decision yet.
    Advancing,
    Terminated,
}

#[derive(Debug, Clone)]
struct Episode {
    target: usize,
    position: u32,
    tokens: Vec<u32>,
    perfect: PerfectTrajectory,
    chosen: Vec<ParkingSlot>,
    observation: Observation,
    done: bool,
}

/// Slot indices by scenario, then by `(PathID, LocID)`.
type SlotIndex = HashMap<String, HashMap<(u32, u32), Vec<usize>>>;

/// The parking environment: one state machine for both training and
/// evaluation, differing only in [`InstructionSelection`].
pub struct ParkingEnv<S, T> {
    settings: EnvSettings,
    images: S,
    encoder: T,
    slots: Vec<ParkingSlot>,
    slot_index: SlotIndex,
    trajectories: Vec<Trajectory>,
    rng: StdRng,
    /// Next instruction for round-robin selection.
    next_instruction: usize,
    episode: Option<Episode>,
}

impl<S: ImageStore, T: TextEncoder> ParkingEnv<S, T> {
    /// Build an environment over preloaded records.
    ///
    /// `slots` should already be sorted by `ParkingID`. Addresses shared by
    /// more than one slot are reported; the reward for such an address is
    /// decided by [`deciding_slot`].
    pub fn new(
        settings: EnvSettings,
        slots: Vec<ParkingSlot>,
        trajectories: Vec<Trajectory>,
        images: S,
        encoder: T,
    ) -> Self {
        let mut slot_index: SlotIndex = HashMap::new();
        for (i, slot) in slots.iter().enumerate() {
            slot_index
                .entry(slot.scan.clone())
                .or_default()
                .entry((slot.path_id, slot.loc_id))
                .or_default()
                .push(i);
        }
        for (scan, cells) in &slot_index {
            for ((path_id, loc_id), members) in cells {
                if members.len() > 1 {
                    tracing::warn!(
                        scan = %scan,
                        path_id,
                        loc_id,
                        slots = members.len(),
                        "Several slots share one address; the greatest ParkingID decides"
                    );
                }
            }
        }

        let rng = match settings.selection {
            InstructionSelection::Random { seed: Some(seed) } => StdRng::seed_from_u64(seed),
            _ => StdRng::from_entropy(),
        };

        tracing::debug!(
            slots = slots.len(),
            instructions = trajectories.len(),
            selection = ?settings.selection,
            "Parking env created"
        );

        Self {
            settings,
            images,
            encoder,
            slots,
            slot_index,
            trajectories,
            rng,
            next_instruction: 0,
            episode: None,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn instruction_count(&self) -> usize {
        self.trajectories.len()
    }

    pub fn trajectories(&self) -> &[Trajectory] {
        &self.trajectories
    }

    pub fn slots(&self) -> &[ParkingSlot] {
        &self.slots
    }

    /// Current 1-based waypoint, if an episode has been started.
    pub fn position(&self) -> Option<u32> {
        self.episode.as_ref().map(|e| e.position)
    }

    pub fn perfect_trajectory(&self) -> Option<&PerfectTrajectory> {
        self.episode.as_ref().map(|e| &e.perfect)
    }

    pub fn target_instruction(&self) -> Option<&Trajectory> {
        self.episode.as_ref().map(|e| &self.trajectories[e.target])
    }

    /// Index of the current target in [`trajectories`](Self::trajectories).
    pub fn target_index(&self) -> Option<usize> {
        self.episode.as_ref().map(|e| e.target)
    }

    /// Scenario of the current target instruction.
    pub fn scan(&self) -> Option<&str> {
        self.target_instruction().map(|t| t.scan.as_str())
    }

    /// Slots found at the address of the last selection (empty after an
    /// overrun or before any selection).
    pub fn chosen_slots(&self) -> &[ParkingSlot] {
        self.episode.as_ref().map_or(&[], |e| e.chosen.as_slice())
    }

    /// The slot that decided the last selection's reward.
    pub fn chosen_slot(&self) -> Option<&ParkingSlot> {
        deciding_slot(self.chosen_slots())
    }

    pub fn phase(&self) -> EpisodePhase {
        match &self.episode {
            None => EpisodePhase::Unstarted,
            Some(e) if e.done => EpisodePhase::Terminated,
            Some(e) if e.position == 1 => EpisodePhase::Ready,
            Some(_) => EpisodePhase::Advancing,
        }
    }

    /// Slots of `scan` at `(path_id, loc_id)`, in `ParkingID` order.
    pub fn slots_at(&self, scan: &str, loc_id: u32, path_id: u32) -> Vec<ParkingSlot> {
        lookup(&self.slot_index, &self.slots, scan, loc_id, path_id)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn select_instruction(&mut self) -> Result<usize, EnvError> {
        let len = self.trajectories.len();
        match self.settings.selection {
            InstructionSelection::Fixed { index } if index >= len => {
                Err(EnvError::InstructionIndex { index, len })
            }
            InstructionSelection::Fixed { index } => Ok(index),
            InstructionSelection::Random { .. } => Ok(self.rng.gen_range(0..len)),
            InstructionSelection::RoundRobin => {
                let index = self.next_instruction % len;
                self.next_instruction = (index + 1) % len;
                Ok(index)
            }
        }
    }
}

fn lookup(
    index: &SlotIndex,
    slots: &[ParkingSlot],
    scan: &str,
    loc_id: u32,
    path_id: u32,
) -> Vec<ParkingSlot> {
    index
        .get(scan)
        .and_then(|cells| cells.get(&(path_id, loc_id)))
        .map(|members| members.iter().map(|&i| slots[i].clone()).collect())
        .unwrap_or_default()
}

fn observe<S: ImageStore>(
    images: &S,
    scan: &str,
    position: u32,
    tokens: &[u32],
) -> Result<Observation, EnvError> {
    let key = image_key(scan, position);
    let image = images
        .observation(&key)
        .ok_or(EnvError::MissingImage(key))?;
    Ok(Observation {
        image,
        instruction: tokens.to_vec(),
    })
}

impl<S: ImageStore, T: TextEncoder> Environment for ParkingEnv<S, T> {
    fn reset(&mut self, instruction_index: Option<usize>) -> Result<Observation, EnvError> {
        let len = self.trajectories.len();
        if len == 0 {
            return Err(EnvError::NoInstructions);
        }
        let target = match instruction_index {
            Some(index) if index >= len => return Err(EnvError::InstructionIndex { index, len }),
            Some(index) => index,
            None => self.select_instruction()?,
        };

        let trajectory = &self.trajectories[target];
        let tokens = self
            .encoder
            .encode(&trajectory.instruction, self.settings.max_instruction_length);
        let perfect = PerfectTrajectory::build(trajectory)?;
        let observation = observe(&self.images, &trajectory.scan, 1, &tokens)?;

        tracing::debug!(
            target,
            scan = %trajectory.scan,
            instruction = %trajectory.instruction,
            "Parking env reset"
        );

        self.episode = Some(Episode {
            target,
            position: 1,
            tokens,
            perfect,
            chosen: Vec::new(),
            observation: observation.clone(),
            done: false,
        });
        Ok(observation)
    }

    fn step(&mut self, action: u8) -> Result<StepOutcome, EnvError> {
        if action >= ACTION_COUNT {
            return Err(EnvError::InvalidAction(action));
        }
        let Self {
            episode,
            trajectories,
            slots,
            slot_index,
            images,
            ..
        } = self;
        let episode = episode.as_mut().ok_or(EnvError::NotReset)?;
        if episode.done {
            return Err(EnvError::EpisodeFinished);
        }
        let target = &trajectories[episode.target];

        // Nothing is written to the episode until the next observation loads.
        // Positions past the route are absorbing.
        let (position, chosen, done, reward) = if episode.position > MAX_PATH_LEN {
            (episode.position, Vec::new(), true, OVERRUN_REWARD)
        } else if action == 0 && episode.position < MAX_PATH_LEN {
            (episode.position + 1, Vec::new(), false, 0.0)
        } else if action == 0 {
            (episode.position, Vec::new(), true, OVERRUN_REWARD)
        } else {
            let chosen = lookup(
                &*slot_index,
                slots.as_slice(),
                &target.scan,
                u32::from(action),
                episode.position,
            );
            let reward = if target.targets_slot() {
                selection_reward(&chosen, target)
            } else {
                0.0
            };
            (episode.position, chosen, true, reward)
        };

        let observation = if position <= MAX_PATH_LEN {
            Some(observe(&*images, &target.scan, position, &episode.tokens)?)
        } else {
            None
        };

        episode.position = position;
        episode.chosen = chosen;
        episode.done = done;
        if let Some(observation) = observation {
            episode.observation = observation;
        }

        if episode.done {
            tracing::debug!(
                position = episode.position,
                action,
                reward,
                candidates = episode.chosen.len(),
                "Parking episode terminated"
            );
        }

        Ok(StepOutcome {
            observation: episode.observation.clone(),
            reward,
            done: episode.done,
            info: serde_json::json!({}),
        })
    }

    fn render(&self) -> Result<(Frame, String), EnvError> {
        let episode = self.episode.as_ref().ok_or(EnvError::NotReset)?;
        let target = &self.trajectories[episode.target];
        let key = image_key(&target.scan, episode.position.min(MAX_PATH_LEN));
        let frame = self
            .images
            .render(&key)
            .ok_or(EnvError::MissingImage(key))?;
        Ok((frame.to_rgb(), target.instruction.clone()))
    }

    fn is_done(&self) -> bool {
        self.episode.as_ref().is_some_and(|e| e.done)
    }
}
