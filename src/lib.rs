//! Signal orchestration for a network of road intersections.
//!
//! Each cycle the [`TrafficLightController`] scores every intersection
//! ([`PriorityScorer`]), damps repeat winners ([`FairnessRegulator`]), picks
//! who gets Green ([`SignalDecisionEngine`]) and routes each decision through
//! that intersection's [`SignalStateMachine`], which enforces the Yellow
//! caution phase between Red and Green.

pub mod config;
pub mod control_system;
pub mod error;
pub mod flow_analyzer;
pub mod global_variables;
pub mod models;
pub mod shared_data;
pub mod simulation_engine;

pub use config::{OrchestratorConfig, PriorityWeights, ValidationReport};
pub use control_system::{
    OverrideKind, SignalDecisionEngine, SignalStateMachine, SignalStatus, TrafficLightController,
    TransitionRecord,
};
pub use error::{ConfigError, FeedError, OrchestratorError, Result};
pub use flow_analyzer::{FairnessRegulator, PriorityScorer};
pub use models::{
    Density, DensityThresholds, Incident, IntersectionId, IntersectionSnapshot, IntersectionState,
    LightState, SignalCommand, SignalResponse, TrafficFacts, TrafficUpdate,
};
pub use shared_data::{Clock, Decision, ManualClock, SignalReport, Statistics, SystemClock};
