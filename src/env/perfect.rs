//! The ideal action sequence for an instruction.

use serde::{Deserialize, Serialize};

use super::traits::ACTION_COUNT;
use crate::data::Trajectory;
use crate::error::EnvError;

/// Number of waypoint steps along every route.
pub const MAX_PATH_LEN: u32 = 29;

/// The action an ideal agent takes at each step: advance (0) everywhere
/// except the target's path step, where it selects the target's location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerfectTrajectory(Vec<u8>);

impl PerfectTrajectory {
    /// Build the perfect trajectory for `trajectory`.
    ///
    /// Path-only instructions have no designated terminal step and yield all
    /// zeros.
    pub fn build(trajectory: &Trajectory) -> Result<Self, EnvError> {
        let mut actions = vec![0u8; MAX_PATH_LEN as usize];
        if let Some(path_id) = trajectory.path_id {
            if path_id == 0 || path_id > MAX_PATH_LEN {
                return Err(EnvError::PathOutOfRange {
                    path_id,
                    max: MAX_PATH_LEN,
                });
            }
            let max = ACTION_COUNT - 1;
            let action = trajectory
                .loc_id
                .and_then(|loc_id| u8::try_from(loc_id).ok())
                .filter(|loc| (1..=max).contains(loc))
                .ok_or(EnvError::LocationOutOfRange {
                    path_id,
                    loc_id: trajectory.loc_id,
                    max,
                })?;
            actions[(path_id - 1) as usize] = action;
        }
        Ok(Self(actions))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// The ideal action at 1-based `position`.
    pub fn optimal_action(&self, position: u32) -> Result<u8, EnvError> {
        let index = (position as usize).checked_sub(1);
        index
            .and_then(|i| self.0.get(i).copied())
            .ok_or(EnvError::InvalidPosition {
                position,
                len: self.0.len(),
            })
    }
}
