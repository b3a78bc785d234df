//! Experiment records consumed by the scorer, and the decision records the
//! evaluator writes.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::data::{ParkingId, ParkingSlot, SlotTags};

/// Distance of the far end of the route; also the distance assigned when no
/// slot was chosen.
pub const MAX_DISTANCE: u32 = 87;

// ---------------------------------------------------------------------------
// Features
// ---------------------------------------------------------------------------

/// What the scorer knows about one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotFeatures {
    /// Route distance, or `None` when the slot id could not be resolved.
    pub distance: Option<u32>,
    /// All ten attributes, or `None` when no slot was chosen or resolved.
    pub tags: Option<SlotTags>,
}

impl SlotFeatures {
    pub fn of_slot(slot: &ParkingSlot) -> Self {
        Self {
            distance: Some(slot.route_distance()),
            tags: Some(slot.tags()),
        }
    }

    /// Features of "no decision": the far end of the route, no tags.
    pub fn unchosen() -> Self {
        Self {
            distance: Some(MAX_DISTANCE),
            tags: None,
        }
    }

    /// Features of a slot id missing from the scenario's records.
    pub fn unresolved() -> Self {
        Self {
            distance: None,
            tags: None,
        }
    }

    pub fn tag(&self, key: &str) -> Option<i64> {
        self.tags.as_ref()?.get(key).copied()
    }
}

// ---------------------------------------------------------------------------
// Experiment
// ---------------------------------------------------------------------------

/// One scored episode: the decision and every acceptable target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub result_id: Option<ParkingId>,
    pub target_id: Vec<ParkingId>,
    pub target_features: Vec<SlotFeatures>,
    pub result_features: SlotFeatures,
}

impl Experiment {
    /// The decision is one of the acceptable targets.
    pub fn is_success(&self) -> bool {
        self.result_id
            .as_ref()
            .is_some_and(|id| self.target_id.contains(id))
    }

    pub fn target_distances(&self) -> Vec<u32> {
        self.target_features
            .iter()
            .filter_map(|f| f.distance)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Decision records
// ---------------------------------------------------------------------------

/// One evaluated instruction as written to the results file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    #[serde(rename = "TestScenarioID")]
    pub scenario_id: String,
    /// Index of the instruction in the scenario's `Traj.json`.
    #[serde(rename = "TestInstructionID")]
    pub instruction_id: usize,
    /// The chosen slot; absent when the agent never chose one.
    #[serde(
        rename = "VLPDecisionPositionID",
        default,
        deserialize_with = "deserialize_decision"
    )]
    pub decision: Option<ParkingId>,
}

/// Accepts an id, `null`, `""` or `[]` (older results files) for "no decision".
fn deserialize_decision<'de, D>(deserializer: D) -> Result<Option<ParkingId>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Id(ParkingId),
        Other(serde::de::IgnoredAny),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Id(ParkingId::Text(text))) if text.is_empty() => None,
        Some(Raw::Id(id)) => Some(id),
        Some(Raw::Other(_)) | None => None,
    })
}

/// Name of the results file inside a decision archive.
pub const ARCHIVE_ENTRY: &str = "test_results.json";

/// Write decision records as a pretty-printed JSON array.
pub fn save_decisions(path: &Path, decisions: &[DecisionRecord]) -> Result<()> {
    create_parent(path)?;
    let json = serde_json::to_string_pretty(decisions).context("Failed to serialize decisions")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write decisions to {}", path.display()))?;
    tracing::info!(path = %path.display(), count = decisions.len(), "Saved decisions");
    Ok(())
}

/// Write decision records into a deflated zip holding a single
/// [`ARCHIVE_ENTRY`].
pub fn save_decisions_archive(path: &Path, decisions: &[DecisionRecord]) -> Result<()> {
    create_parent(path)?;
    let json = serde_json::to_string_pretty(decisions).context("Failed to serialize decisions")?;
    let file = File::create(path)
        .with_context(|| format!("Failed to create archive {}", path.display()))?;

    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(ARCHIVE_ENTRY, options)?;
    zip.write_all(json.as_bytes())?;
    zip.finish()
        .with_context(|| format!("Failed to finish archive {}", path.display()))?;

    tracing::info!(path = %path.display(), count = decisions.len(), "Saved decision archive");
    Ok(())
}

/// Read decision records from a JSON file, or from the [`ARCHIVE_ENTRY`] of
/// a `.zip` archive.
pub fn load_decisions(path: &Path) -> Result<Vec<DecisionRecord>> {
    let text = if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("zip")) {
        read_archive_entry(path)?
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read decisions from {}", path.display()))?
    };
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse decisions from {}", path.display()))
}

fn read_archive_entry(path: &Path) -> Result<String> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open archive {}", path.display()))?;
    let mut archive = ZipArchive::new(file)
        .with_context(|| format!("Failed to read archive {}", path.display()))?;
    let mut entry = archive
        .by_name(ARCHIVE_ENTRY)
        .with_context(|| format!("{} has no {ARCHIVE_ENTRY}", path.display()))?;
    let mut text = String::new();
    entry.read_to_string(&mut text)?;
    Ok(text)
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_decision_forms_all_mean_none() {
        let json = r#"[
            {"TestScenarioID": "s", "TestInstructionID": 0, "VLPDecisionPositionID": []},
            {"TestScenarioID": "s", "TestInstructionID": 1, "VLPDecisionPositionID": null},
            {"TestScenarioID": "s", "TestInstructionID": 2, "VLPDecisionPositionID": ""},
            {"TestScenarioID": "s", "TestInstructionID": 3},
            {"TestScenarioID": "s", "TestInstructionID": 4, "VLPDecisionPositionID": 12},
            {"TestScenarioID": "s", "TestInstructionID": 5, "VLPDecisionPositionID": "P7"},
            {"TestScenarioID": "s", "TestInstructionID": 6, "VLPDecisionPositionID": {"id": 3}}
        ]"#;
        let records: Vec<DecisionRecord> = serde_json::from_str(json).unwrap();
        let decisions: Vec<_> = records.iter().map(|r| r.decision.clone()).collect();
        assert_eq!(
            decisions,
            vec![
                None,
                None,
                None,
                None,
                Some(ParkingId::from(12)),
                Some(ParkingId::from("P7")),
                None,
            ]
        );
    }

    #[test]
    fn decisions_survive_a_save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("result").join("test_results.json");
        let decisions = vec![
            DecisionRecord {
                scenario_id: "20240518_01".into(),
                instruction_id: 0,
                decision: Some(ParkingId::from(4)),
            },
            DecisionRecord {
                scenario_id: "20240518_01".into(),
                instruction_id: 1,
                decision: None,
            },
        ];
        save_decisions(&path, &decisions).unwrap();
        assert_eq!(load_decisions(&path).unwrap(), decisions);
    }

    #[test]
    fn decisions_survive_a_zip_archive() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("result").join("test_results.zip");
        let decisions = vec![
            DecisionRecord {
                scenario_id: "20240521_01".into(),
                instruction_id: 2,
                decision: Some(ParkingId::from("P3")),
            },
            DecisionRecord {
                scenario_id: "20240521_01".into(),
                instruction_id: 3,
                decision: None,
            },
        ];
        save_decisions_archive(&path, &decisions).unwrap();

        let mut archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(archive.len(), 1);
        let entry = archive.by_name(ARCHIVE_ENTRY).unwrap();
        assert_eq!(entry.compression(), CompressionMethod::Deflated);
        drop(entry);

        assert_eq!(load_decisions(&path).unwrap(), decisions);
    }

    #[test]
    fn archive_without_results_entry_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("other.zip");
        let mut zip = ZipWriter::new(File::create(&path).unwrap());
        zip.start_file("notes.txt", FileOptions::default()).unwrap();
        zip.write_all(b"nothing here").unwrap();
        zip.finish().unwrap();

        let err = load_decisions(&path).unwrap_err();
        assert!(format!("{err:#}").contains(ARCHIVE_ENTRY), "{err:#}");
    }

    #[test]
    fn success_requires_a_decision_among_targets() {
        let mut exp = Experiment {
            result_id: Some(ParkingId::from(3)),
            target_id: vec![ParkingId::from(1), ParkingId::from(3)],
            target_features: Vec::new(),
            result_features: SlotFeatures::unresolved(),
        };
        assert!(exp.is_success());
        exp.result_id = None;
        assert!(!exp.is_success());
    }
}
