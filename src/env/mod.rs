//! The parking environment and its collaborators.
//!
//! - [`parking`] -- [`ParkingEnv`], the reset/step state machine.
//! - [`reward`] -- the slot-selection reward ladder.
//! - [`perfect`] -- the ideal action sequence for an instruction.
//! - [`images`] / [`tokenizer`] -- concrete image store and text encoder.
//!
//! [`load_env`] assembles a [`ParkingEnv`] from the scenario directories named
//! in the configuration.

pub mod images;
pub mod parking;
pub mod perfect;
pub mod reward;
pub mod tokenizer;
pub mod traits;

use anyhow::Result;

pub use images::InMemoryImageStore;
pub use parking::{EpisodePhase, ParkingEnv};
pub use perfect::{PerfectTrajectory, MAX_PATH_LEN};
pub use tokenizer::HashingTokenizer;
pub use traits::{Environment, Frame, ImageStore, Observation, StepOutcome, TextEncoder, ACTION_COUNT};

use crate::config::AvpConfig;
use crate::data::DataReader;

/// The environment type the CLI runs: images decoded from disk, hashed
/// instruction tokens.
pub type DiskParkingEnv = ParkingEnv<InMemoryImageStore, HashingTokenizer>;

/// Load slots, instructions and waypoint images for every configured
/// scenario and build the environment.
pub fn load_env(config: &AvpConfig) -> Result<DiskParkingEnv> {
    let reader = DataReader::new(config.data.scenario_dirs.iter().cloned());
    let slots = reader.load_parking_slots()?;
    let trajectories = reader.load_trajectories()?;
    let images = images::load_scenario_images(
        reader.scenario_dirs(),
        config.env.image_height,
        config.env.image_width,
    )?;

    tracing::info!(
        scenarios = reader.scenario_dirs().len(),
        slots = slots.len(),
        instructions = trajectories.len(),
        "Parking environment loaded"
    );

    Ok(ParkingEnv::new(
        config.env.clone(),
        slots,
        trajectories,
        images,
        HashingTokenizer::default(),
    ))
}
