//! Scenario records and the readers that load them.
//!
//! - [`types`] -- [`ParkingSlot`], [`Trajectory`], [`InstructionInfo`] and the
//!   closed [`SlotAttribute`] set used for tag matching.
//! - [`reader`] -- [`DataReader`], which merges records across scenario
//!   directories.

pub mod reader;
pub mod types;

pub use reader::DataReader;
pub use types::{InstructionInfo, ParkingId, ParkingSlot, SlotAttribute, SlotTags, Trajectory};
