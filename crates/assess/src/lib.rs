#![doc = include_str!("../README.md")]

pub mod orchestrator;
pub mod plugin;
pub mod runner;

pub use orchestrator::{AssessOrchestrator, config_hash};
pub use plugin::{
    AssessContext, AssessOutcome, AssessmentPlugin, BoxFuture, PluginDescriptor, PluginRegistry,
};
pub use runner::PluginRunner;
