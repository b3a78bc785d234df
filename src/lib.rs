//! AVP: an autonomous valet parking environment for instruction-following
//! agents.
//!
//! An agent advances along a fixed route of waypoint images and must stop at
//! the parking slot a natural-language instruction describes. The crate
//! provides the episode state machine and its reward ladder, scripted agents,
//! rollout drivers, and an offline scorer that turns recorded decisions into
//! navigation and slot-matching metrics.

pub mod agent;
pub mod config;
pub mod data;
pub mod env;
pub mod error;
pub mod metrics;
pub mod rollout;
