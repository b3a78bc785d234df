//! Error type shared by the environment, agents and record loaders.

use thiserror::Error;

/// Failures raised by the parking environment and its collaborators.
#[derive(Debug, Error)]
pub enum EnvError {
    /// An optimal-action lookup was asked for a step outside the trajectory.
    #[error("invalid current_position: {position}. It must be between 1 and {len}")]
    InvalidPosition { position: u32, len: usize },

    /// A trajectory record names a path step the perfect trajectory cannot hold.
    #[error("path_id {path_id} is outside the valid range 1..={max}")]
    PathOutOfRange { path_id: u32, max: u32 },

    /// A trajectory record with a path step has a missing or unusable location.
    #[error("loc_id {loc_id:?} at path_id {path_id} is outside the valid range 1..={max}")]
    LocationOutOfRange {
        path_id: u32,
        loc_id: Option<u32>,
        max: u8,
    },

    /// The image store has no frame for the requested `(scenario, step)` key.
    #[error("no image loaded for key `{0}`")]
    MissingImage(String),

    #[error("action {0} is outside the action space 0..=6")]
    InvalidAction(u8),

    #[error("instruction index {index} is out of range ({len} instructions loaded)")]
    InstructionIndex { index: usize, len: usize },

    #[error("no instructions loaded")]
    NoInstructions,

    #[error("environment must be reset before stepping")]
    NotReset,

    #[error("cannot step in a terminated episode")]
    EpisodeFinished,
}
