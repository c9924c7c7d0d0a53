// flow_analyzer/mod.rs
pub mod fairness;
pub mod priority_scorer;

pub use fairness::FairnessRegulator;
pub use priority_scorer::PriorityScorer;
