use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Complete configuration for environments, agents and scoring.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AvpConfig {
    pub env: EnvSettings,
    pub data: DataConfig,
    pub agent: AgentConfig,
    pub scoring: ScoreWeights,
}

impl AvpConfig {
    /// Read a JSON configuration file. Sections and fields left out of the
    /// file take their default values.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }
}

/// Parking environment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvSettings {
    /// Height of observation frames in pixels (default: 128).
    pub image_height: u32,
    /// Width of observation frames in pixels (default: 400).
    pub image_width: u32,
    /// Length every encoded instruction is padded or truncated to (default: 64).
    pub max_instruction_length: usize,
    /// How `reset` picks the target instruction when no index is given.
    pub selection: InstructionSelection,
}

impl Default for EnvSettings {
    fn default() -> Self {
        Self {
            image_height: 128,
            image_width: 400,
            max_instruction_length: 64,
            selection: InstructionSelection::RoundRobin,
        }
    }
}

/// Target-instruction selection policy applied on `reset(None)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum InstructionSelection {
    /// Always the instruction at `index`.
    Fixed { index: usize },
    /// Uniformly random; seeded when `seed` is set.
    Random {
        #[serde(default)]
        seed: Option<u64>,
    },
    /// Cycle through all instructions in load order.
    RoundRobin,
}

/// Where scenario data lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Scenario directories loaded into the environment.
    pub scenario_dirs: Vec<PathBuf>,
    /// Root holding one directory per scenario id, read by the scorer.
    pub scoring_root: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            scenario_dirs: vec![
                PathBuf::from("./data/20240518_01"),
                PathBuf::from("./data/20240521_01"),
            ],
            scoring_root: PathBuf::from("./data/Vision"),
        }
    }
}

/// Rule-based agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub mode: AgentMode,
    /// RNG seed for the agent's random actions (default: entropy).
    pub seed: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            mode: AgentMode::Random,
            seed: None,
        }
    }
}

/// How often a rule-based agent deviates from the perfect trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum AgentMode {
    /// Always the perfect action.
    Optimal,
    /// 10% random, 90% perfect.
    Good,
    /// 50% random, 50% perfect.
    Normal,
    /// Always random.
    Random,
}

impl AgentMode {
    /// Probability of taking a uniformly random action on a step.
    pub fn random_rate(&self) -> f64 {
        match self {
            Self::Optimal => 0.0,
            Self::Good => 0.1,
            Self::Normal => 0.5,
            Self::Random => 1.0,
        }
    }
}

/// Linear weights combining the six metrics into a single score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub navigation_error: f64,
    pub success_rate: f64,
    pub weighted_success_rate: f64,
    pub absolute_slot_error: f64,
    pub miss_rate: f64,
    pub matching_rate: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            navigation_error: -10.0,
            success_rate: 50.0,
            weighted_success_rate: 100.0,
            absolute_slot_error: -10.0,
            miss_rate: -5.0,
            matching_rate: 40.0,
        }
    }
}
