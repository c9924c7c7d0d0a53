// orchestrator_main.rs
//
// Usage: orchestrator_main [intersections] [config.json] [key=value ...]
use signal_orchestrator::shared_data::current_timestamp;
use signal_orchestrator::simulation_engine::{run_simulation, SyntheticTrafficFeed};
use signal_orchestrator::{OrchestratorConfig, SystemClock, TrafficLightController};
use std::sync::Arc;
use tokio::sync::watch;

const DEFAULT_INTERSECTIONS: usize = 3;

#[tokio::main]
async fn main() {
    let mut count = DEFAULT_INTERSECTIONS;
    let mut config_path = None;
    let mut overrides = Vec::new();
    for arg in std::env::args().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            overrides.push((key.to_string(), value.to_string()));
        } else if let Ok(n) = arg.parse::<usize>() {
            count = n;
        } else {
            config_path = Some(arg);
        }
    }

    let mut config = match config_path {
        Some(path) => match OrchestratorConfig::from_json_file(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Config error: {}", e);
                std::process::exit(1);
            }
        },
        None => OrchestratorConfig::default(),
    };
    let results = config.apply_updates(overrides.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    for (key, result) in results {
        if let Err(e) = result {
            eprintln!("Ignoring setting {}: {}", key, e);
        }
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.log_level.as_str()))
        .init();

    if count == 0 {
        log::warn!("[Orchestrator] At least one intersection is required, using {}", DEFAULT_INTERSECTIONS);
        count = DEFAULT_INTERSECTIONS;
    }

    let controller = match TrafficLightController::with_intersections(config, count, Arc::new(SystemClock)) {
        Ok(controller) => Arc::new(controller),
        Err(e) => {
            eprintln!("Controller error: {}", e);
            std::process::exit(1);
        }
    };
    log::info!("[Orchestrator] Starting signal orchestration for {} intersections...", count);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let feed = SyntheticTrafficFeed::new(current_timestamp().to_bits());
    let feed_task = tokio::spawn(run_simulation(controller.clone(), feed, shutdown_rx.clone()));
    let loop_task = tokio::spawn(TrafficLightController::run_update_loop(
        controller.clone(),
        shutdown_rx,
    ));

    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("[Orchestrator] Failed to listen for Ctrl-C: {}", e);
    }
    log::info!("[Orchestrator] Stopping signal orchestration...");
    let _ = shutdown_tx.send(true);
    let (feed_result, loop_result) = tokio::join!(feed_task, loop_task);
    if let Err(e) = feed_result.and(loop_result) {
        log::error!("[Orchestrator] Background task failed: {}", e);
    }

    // Safe state before exit.
    for report in controller.reset_all_to_red() {
        log::info!("[Orchestrator] {}: Emergency stop - {} light", report.intersection_id, report.signal);
    }

    match serde_json::to_string_pretty(&controller.statistics()) {
        Ok(json) => log::info!("[Orchestrator] Final statistics:\n{}", json),
        Err(e) => log::error!("[Orchestrator] Could not serialize statistics: {}", e),
    }
    log::info!("[Orchestrator] System stopped safely");
}
