// control_system/mod.rs
pub mod decision_engine;
pub mod signal_state_machine;
pub mod traffic_light_controller;

pub use decision_engine::{PhaseTiming, SignalDecisionEngine};
pub use signal_state_machine::{SignalStateMachine, SignalStatus, TransitionRecord};
pub use traffic_light_controller::{OverrideKind, TrafficLightController};
