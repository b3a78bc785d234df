//! Agents that choose parking actions.

pub mod rule;

pub use rule::{Policy, PolicyInput, RandomAgent, RuleBasedAgent};
