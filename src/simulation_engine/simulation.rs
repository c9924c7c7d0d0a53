// simulation.rs
use crate::control_system::traffic_light_controller::TrafficLightController;
use crate::simulation_engine::traffic_feed::SyntheticTrafficFeed;

use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Feeds one round of synthetic readings into the controller. A failed
/// reading leaves that intersection's previous facts in place.
pub fn feed_round(controller: &TrafficLightController, feed: &mut SyntheticTrafficFeed) {
    let interval_secs = controller.config().feed_interval_secs as f64;
    for id in controller.roster() {
        let signal = match controller.signal_status(id.as_str()) {
            Ok(status) => status.signal,
            Err(e) => {
                log::error!("[Feed] {}", e);
                controller.record_error();
                continue;
            }
        };
        match feed.sample(id, signal, interval_secs) {
            Ok(update) => {
                if let Err(e) = controller.update_traffic(id.as_str(), &update) {
                    log::warn!("[Feed] Rejected update for {}: {}", id, e);
                    controller.record_error();
                }
            }
            Err(e) => {
                log::warn!("[Feed] {}; keeping previous facts", e);
                controller.record_error();
            }
        }
    }
}

/// Runs the synthetic feed every `feed_interval_secs` until `shutdown` flips to true.
pub async fn run_simulation(
    controller: Arc<TrafficLightController>,
    mut feed: SyntheticTrafficFeed,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(Duration::from_secs(
        controller.config().feed_interval_secs.max(1),
    ));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => feed_round(&controller, &mut feed),
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    log::info!("[Feed] Traffic feed stopped");
}
