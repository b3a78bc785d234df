//! Driving agents through the environment.
//!
//! - [`collector`] -- [`EpisodeCollector`] runs episodes and records them.
//! - [`evaluate`] -- [`Evaluator`] produces one [`DecisionRecord`] per
//!   instruction; demonstration collection for imitation learning.
//!
//! [`DecisionRecord`]: crate::metrics::DecisionRecord

pub mod collector;
pub mod evaluate;
pub mod types;

pub use collector::EpisodeCollector;
pub use evaluate::{collect_demonstrations, demonstrations, save_json, Demonstration, Evaluation, Evaluator};
pub use types::{Rollout, RolloutBuffer, Step};
