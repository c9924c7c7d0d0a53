// models/mod.rs
pub mod intersection;
pub mod signal;

pub use intersection::{
    Density, DensityThresholds, Incident, IntersectionId, IntersectionSnapshot,
    IntersectionState, TrafficFacts, TrafficUpdate,
};
pub use signal::{LightState, SignalCommand, SignalResponse};
