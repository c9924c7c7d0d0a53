// simulation_engine/mod.rs
pub mod intersections;
pub mod simulation;
pub mod traffic_feed;

pub use intersections::create_intersections;
pub use simulation::{feed_round, run_simulation};
pub use traffic_feed::SyntheticTrafficFeed;
