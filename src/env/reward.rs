//! Reward shaping for slot-selection actions.
//!
//! Selecting a slot ends the episode. The reward ladder, checked in order:
//!
//! | condition                                   | reward            |
//! |---------------------------------------------|-------------------|
//! | no slot at the selected address             | -1                |
//! | slot is the target (`ParkingID` equal)      | 10                |
//! | slot is occupied                            | -0.5              |
//! | `Disabled` differs from the requirement     | -0.2              |
//! | `Charging` differs from the requirement     | -0.2              |
//! | otherwise                                   | 5 + 0.2 per tag matched |

use crate::data::{ParkingSlot, SlotAttribute, Trajectory};

pub const EMPTY_ADDRESS_REWARD: f64 = -1.0;
pub const EXACT_MATCH_REWARD: f64 = 10.0;
pub const OCCUPIED_REWARD: f64 = -0.5;
pub const WRONG_KIND_REWARD: f64 = -0.2;
pub const ACCEPTABLE_BASE_REWARD: f64 = 5.0;
pub const TAG_MATCH_BONUS: f64 = 0.2;

/// The candidate that decides the reward when several slots share an
/// address: the one with the greatest `ParkingID` (the last one on equal IDs).
pub fn deciding_slot(candidates: &[ParkingSlot]) -> Option<&ParkingSlot> {
    candidates.iter().max_by(|a, b| a.parking_id.cmp(&b.parking_id))
}

/// Reward for selecting the address whose slots are `candidates`, relative to
/// the target instruction.
pub fn selection_reward(candidates: &[ParkingSlot], target: &Trajectory) -> f64 {
    match deciding_slot(candidates) {
        Some(slot) => slot_reward(slot, target),
        None => EMPTY_ADDRESS_REWARD,
    }
}

/// Reward for one concrete slot. A requirement the instruction does not
/// state cannot be violated.
pub fn slot_reward(slot: &ParkingSlot, target: &Trajectory) -> f64 {
    if target.parking_id.as_ref() == Some(&slot.parking_id) {
        return EXACT_MATCH_REWARD;
    }
    if slot.is_occupied() {
        return OCCUPIED_REWARD;
    }
    let violates = |attr: SlotAttribute| {
        target
            .required(attr)
            .is_some_and(|required| required != slot.attribute(attr))
    };
    if violates(SlotAttribute::Disabled) || violates(SlotAttribute::Charging) {
        return WRONG_KIND_REWARD;
    }

    let mut reward = ACCEPTABLE_BASE_REWARD;
    if let Some(tags) = &target.tags {
        for (key, value) in tags {
            if slot.attribute_by_key(key) == Some(*value) {
                reward += TAG_MATCH_BONUS;
            }
        }
    }
    reward
}
