//! Rebuilding experiments from stored scenario files.
//!
//! The scorer never trusts the evaluator's view of the world: for every
//! [`DecisionRecord`] it re-reads the scenario's slot and instruction files
//! under `{root}/{scenario}/`, works out which slots satisfy the instruction's
//! tags, and computes features for both the targets and the decision.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;

use super::types::{DecisionRecord, Experiment, SlotFeatures};
use crate::data::reader::{load_instruction_info, load_json, load_scenario_slots, TRAJECTORIES_FILE};
use crate::data::{InstructionInfo, ParkingId, ParkingSlot, Trajectory};

/// The records of one scenario.
#[derive(Debug, Clone)]
struct ScenarioRecords {
    slots: Vec<ParkingSlot>,
    trajectories: Vec<Trajectory>,
    instruction_info: Vec<InstructionInfo>,
}

impl ScenarioRecords {
    fn load(dir: &Path) -> Result<Self> {
        Ok(Self {
            slots: load_scenario_slots(dir)?,
            trajectories: load_json(&dir.join(TRAJECTORIES_FILE))?,
            instruction_info: load_instruction_info(dir)?,
        })
    }

    fn slot(&self, id: &ParkingId) -> Option<&ParkingSlot> {
        self.slots.iter().find(|s| &s.parking_id == id)
    }
}

/// Lazily loaded, cached scenario records keyed by scenario id.
#[derive(Debug, Clone)]
pub struct ScenarioCatalog {
    root: PathBuf,
    scenarios: HashMap<String, ScenarioRecords>,
}

impl ScenarioCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            scenarios: HashMap::new(),
        }
    }

    fn scenario(&mut self, scenario_id: &str) -> Result<&ScenarioRecords> {
        if !self.scenarios.contains_key(scenario_id) {
            let records = ScenarioRecords::load(&self.root.join(scenario_id))?;
            tracing::debug!(
                scenario = scenario_id,
                slots = records.slots.len(),
                instructions = records.trajectories.len(),
                "Loaded scenario records"
            );
            self.scenarios.insert(scenario_id.to_string(), records);
        }
        Ok(&self.scenarios[scenario_id])
    }

    /// Every slot satisfying all tags of the instruction at `instruction_id`.
    ///
    /// The tags come from the `Traj_withinfo.json` entry with the same
    /// instruction text. An out-of-range instruction id, an instruction with
    /// no info entry, or an empty tag set yields no targets.
    pub fn target_ids(&mut self, scenario_id: &str, instruction_id: usize) -> Result<Vec<ParkingId>> {
        let records = self.scenario(scenario_id)?;
        let Some(trajectory) = records.trajectories.get(instruction_id) else {
            tracing::warn!(
                scenario = scenario_id,
                instruction_id,
                instructions = records.trajectories.len(),
                "Instruction id out of range; no targets"
            );
            return Ok(Vec::new());
        };

        let tags = records
            .instruction_info
            .iter()
            .find(|info| info.instruction == trajectory.instruction)
            .and_then(|info| info.tags.as_ref())
            .filter(|tags| !tags.is_empty());

        Ok(match tags {
            Some(tags) => records
                .slots
                .iter()
                .filter(|slot| slot.meets_criteria(tags))
                .map(|slot| slot.parking_id.clone())
                .collect(),
            None => Vec::new(),
        })
    }

    /// Features of `parking_id` in `scenario_id`; the "no decision" sentinel
    /// when `parking_id` is `None`.
    pub fn slot_features(
        &mut self,
        scenario_id: &str,
        parking_id: Option<&ParkingId>,
    ) -> Result<SlotFeatures> {
        let Some(id) = parking_id else {
            return Ok(SlotFeatures::unchosen());
        };
        let records = self.scenario(scenario_id)?;
        Ok(match records.slot(id) {
            Some(slot) => SlotFeatures::of_slot(slot),
            None => {
                tracing::warn!(scenario = scenario_id, parking_id = %id, "Unknown parking id");
                SlotFeatures::unresolved()
            }
        })
    }

    pub fn build_experiment(&mut self, decision: &DecisionRecord) -> Result<Experiment> {
        let scenario = decision.scenario_id.as_str();
        let target_id = self.target_ids(scenario, decision.instruction_id)?;
        let result_features = self.slot_features(scenario, decision.decision.as_ref())?;
        let target_features = target_id
            .iter()
            .map(|id| self.slot_features(scenario, Some(id)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Experiment {
            result_id: decision.decision.clone(),
            target_id,
            target_features,
            result_features,
        })
    }

    pub fn build_experiments(&mut self, decisions: &[DecisionRecord]) -> Result<Vec<Experiment>> {
        decisions.iter().map(|d| self.build_experiment(d)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::reader::{INSTRUCTION_INFO_FILE, PARKING_SLOTS_FILE};

    const SCAN: &str = "20240518_01";

    fn write_fixture(root: &Path) {
        let dir = root.join(SCAN);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(PARKING_SLOTS_FILE),
            r#"[
                {"ParkingID": 1, "PathID": 2, "LocID": 1, "Occupied": 0, "Charging": 1, "Sunlight": 1},
                {"ParkingID": 2, "PathID": 5, "LocID": 6, "Occupied": 1, "Charging": 1},
                {"ParkingID": 3, "PathID": 9, "LocID": 2, "Occupied": 0, "Charging": 0}
            ]"#,
        )
        .unwrap();
        std::fs::write(
            dir.join(TRAJECTORIES_FILE),
            r#"[
                {"scan": "20240518_01", "instruction": "Find a charging spot."},
                {"scan": "20240518_01", "instruction": "Just drive."}
            ]"#,
        )
        .unwrap();
        std::fs::write(
            dir.join(INSTRUCTION_INFO_FILE),
            r#"[
                {"instruction": "Find a charging spot.", "tags": {"Charging": 1}},
                {"instruction": "Just drive.", "tags": {}}
            ]"#,
        )
        .unwrap();
    }

    #[test]
    fn targets_are_slots_meeting_instruction_tags() {
        let tmp = tempfile::tempdir().unwrap();
        write_fixture(tmp.path());
        let mut catalog = ScenarioCatalog::new(tmp.path());

        assert_eq!(
            catalog.target_ids(SCAN, 0).unwrap(),
            vec![ParkingId::from(1), ParkingId::from(2)]
        );
        assert!(catalog.target_ids(SCAN, 1).unwrap().is_empty());
        assert!(catalog.target_ids(SCAN, 99).unwrap().is_empty());
    }

    #[test]
    fn experiment_features_follow_slot_records() {
        let tmp = tempfile::tempdir().unwrap();
        write_fixture(tmp.path());
        let mut catalog = ScenarioCatalog::new(tmp.path());

        let exp = catalog
            .build_experiment(&DecisionRecord {
                scenario_id: SCAN.into(),
                instruction_id: 0,
                decision: Some(ParkingId::from(2)),
            })
            .unwrap();
        assert!(exp.is_success());
        assert_eq!(exp.result_features.distance, Some(15));
        assert_eq!(exp.result_features.tag("Occupied"), Some(1));
        assert_eq!(exp.target_distances(), vec![4, 15]);

        let none = catalog
            .build_experiment(&DecisionRecord {
                scenario_id: SCAN.into(),
                instruction_id: 0,
                decision: None,
            })
            .unwrap();
        assert_eq!(none.result_features, SlotFeatures::unchosen());

        let unknown = catalog.slot_features(SCAN, Some(&ParkingId::from(42))).unwrap();
        assert_eq!(unknown, SlotFeatures::unresolved());
    }

    #[test]
    fn missing_scenario_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let mut catalog = ScenarioCatalog::new(tmp.path());
        assert!(catalog.target_ids("nope", 0).is_err());
    }
}
