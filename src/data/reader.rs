//! Loading scenario records from disk.
//!
//! A scenario directory (e.g. `data/20240518_01`) holds the waypoint images
//! and three JSON files:
//! - `parking_slots.json` -- every slot visible along the route.
//! - `Traj.json` -- the instructions used to drive episodes.
//! - `Traj_withinfo.json` -- instructions with the tags used for scoring.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use super::types::{InstructionInfo, ParkingSlot, Trajectory};

pub const PARKING_SLOTS_FILE: &str = "parking_slots.json";
pub const TRAJECTORIES_FILE: &str = "Traj.json";
pub const INSTRUCTION_INFO_FILE: &str = "Traj_withinfo.json";

/// Reads slot and instruction records from a set of scenario directories.
#[derive(Debug, Clone)]
pub struct DataReader {
    scenario_dirs: Vec<PathBuf>,
}

impl DataReader {
    pub fn new(scenario_dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            scenario_dirs: scenario_dirs.into_iter().collect(),
        }
    }

    pub fn scenario_dirs(&self) -> &[PathBuf] {
        &self.scenario_dirs
    }

    /// Every slot across all scenarios, sorted by `ParkingID`.
    ///
    /// The sort is stable, so slots with equal IDs from different scenarios
    /// keep their directory order.
    pub fn load_parking_slots(&self) -> Result<Vec<ParkingSlot>> {
        let mut slots = Vec::new();
        for dir in &self.scenario_dirs {
            slots.extend(load_scenario_slots(dir)?);
        }
        slots.sort_by(|a, b| a.parking_id.cmp(&b.parking_id));
        tracing::info!(slots = slots.len(), "Loaded parking slots");
        Ok(slots)
    }

    /// Every instruction across all scenarios, in directory then file order.
    pub fn load_trajectories(&self) -> Result<Vec<Trajectory>> {
        let mut trajectories = Vec::new();
        for dir in &self.scenario_dirs {
            let batch: Vec<Trajectory> = load_json(&dir.join(TRAJECTORIES_FILE))?;
            trajectories.extend(batch);
        }
        tracing::info!(instructions = trajectories.len(), "Loaded trajectories");
        Ok(trajectories)
    }
}

/// The scenario id of a directory: its final path component.
pub fn scenario_name(dir: &Path) -> String {
    dir.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Slots of a single scenario in file order, tagged with the scenario id.
pub fn load_scenario_slots(dir: &Path) -> Result<Vec<ParkingSlot>> {
    let scan = scenario_name(dir);
    let mut slots: Vec<ParkingSlot> = load_json(&dir.join(PARKING_SLOTS_FILE))?;
    for slot in &mut slots {
        slot.scan = scan.clone();
    }
    Ok(slots)
}

pub fn load_instruction_info(dir: &Path) -> Result<Vec<InstructionInfo>> {
    load_json(&dir.join(INSTRUCTION_INFO_FILE))
}

pub(crate) fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}
