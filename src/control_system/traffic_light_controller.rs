use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::config::{OrchestratorConfig, PriorityWeights};
use crate::control_system::decision_engine::SignalDecisionEngine;
use crate::control_system::signal_state_machine::{SignalStateMachine, SignalStatus};
use crate::error::{ConfigError, OrchestratorError, Result};
use crate::global_variables::{
    EMERGENCY_GREEN_DURATION, INCIDENT_RED_DURATION, OTHER_OVERRIDE_RED_DURATION,
    OVERRIDE_EMERGENCY_VEHICLE, OVERRIDE_INCIDENT, RESET_SIGNAL_DURATION, RESET_SIGNAL_REASON,
};
use crate::models::{
    IntersectionId, IntersectionSnapshot, IntersectionState, LightState, SignalCommand,
    SignalResponse, TrafficFacts, TrafficUpdate,
};
use crate::shared_data::{
    Clock, IntersectionDetail, SignalDistribution, SignalReport, Statistics,
};
use crate::simulation_engine::intersections::create_intersections;

/// Kind of administrative preemption requested by an external control surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverrideKind {
    EmergencyVehicle,
    Incident,
    Other(String),
}

impl From<&str> for OverrideKind {
    fn from(kind: &str) -> Self {
        match kind {
            OVERRIDE_EMERGENCY_VEHICLE => OverrideKind::EmergencyVehicle,
            OVERRIDE_INCIDENT => OverrideKind::Incident,
            other => OverrideKind::Other(other.to_string()),
        }
    }
}

impl OverrideKind {
    fn command(&self) -> SignalCommand {
        match self {
            OverrideKind::EmergencyVehicle => SignalCommand::with_duration(
                LightState::Green,
                EMERGENCY_GREEN_DURATION,
                "Emergency Vehicle Priority",
            ),
            OverrideKind::Incident => SignalCommand::with_duration(
                LightState::Red,
                INCIDENT_RED_DURATION,
                "Traffic Incident - Intersection Blocked",
            ),
            OverrideKind::Other(kind) => SignalCommand::with_duration(
                LightState::Red,
                OTHER_OVERRIDE_RED_DURATION,
                format!("Emergency Override: {}", kind),
            ),
        }
    }
}

/// An intersection's facts and its signal head, always mutated together.
struct IntersectionCell {
    state: IntersectionState,
    machine: SignalStateMachine,
    last_priority_score: f64,
}

impl IntersectionCell {
    /// Mirrors what the signal head shows into the intersection record.
    fn sync_state(&mut self, now: f64) {
        let status = self.machine.status(now);
        if status.signal != self.state.current_signal {
            log::info!(
                "[Orchestrator] Signal Change: {}: {} for {}s ({})",
                self.state.name,
                status.signal,
                status.duration,
                status.reason
            );
            self.state
                .record_signal(status.signal, status.duration, &status.reason, status.last_change);
        } else {
            self.state.signal_duration = status.duration;
            self.state.last_signal_change = status.last_change;
        }
    }

    fn report(&self, response: SignalResponse) -> SignalReport {
        SignalReport::new(self.state.id.clone(), response, self.last_priority_score)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The orchestration engine: owns every intersection, its signal state
/// machine and the decision engine. Construct one per deployment and share
/// it as `Arc<TrafficLightController>`.
///
/// Each intersection sits behind its own mutex, so fact updates, decisions
/// and forced overrides for one intersection are serialized while different
/// intersections proceed independently.
pub struct TrafficLightController {
    config: OrchestratorConfig,
    clock: Arc<dyn Clock>,
    roster: Vec<IntersectionId>,
    cells: HashMap<IntersectionId, Mutex<IntersectionCell>>,
    engine: Mutex<SignalDecisionEngine>,
    optimization_count: AtomicU64,
    error_count: AtomicU64,
    started_at: f64,
}

impl TrafficLightController {
    pub fn new(
        config: OrchestratorConfig,
        intersections: Vec<IntersectionState>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.ensure_valid()?;
        if intersections.len() > config.max_intersections {
            return Err(ConfigError::InvalidValue {
                key: "max_intersections".to_string(),
                value: config.max_intersections.to_string(),
                reason: format!("{} intersections requested", intersections.len()),
            }
            .into());
        }

        let now = clock.now();
        let mut roster = Vec::with_capacity(intersections.len());
        let mut cells = HashMap::with_capacity(intersections.len());
        for mut state in intersections {
            let id = state.id.clone();
            if cells.contains_key(&id) {
                return Err(ConfigError::InvalidValue {
                    key: "intersections".to_string(),
                    value: id.to_string(),
                    reason: "duplicate intersection id".to_string(),
                }
                .into());
            }
            let machine = SignalStateMachine::new(config.yellow_time, now);
            let initial = machine.status(now);
            state.current_signal = initial.signal;
            state.signal_duration = initial.duration;
            state.last_signal_change = initial.last_change;
            log::info!("[Orchestrator] Initialized {} (ID: {})", state.name, id);

            roster.push(id.clone());
            cells.insert(
                id,
                Mutex::new(IntersectionCell {
                    state,
                    machine,
                    last_priority_score: 0.0,
                }),
            );
        }

        let engine = Mutex::new(SignalDecisionEngine::new(&config));
        Ok(Self {
            config,
            clock,
            roster,
            cells,
            engine,
            optimization_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            started_at: now,
        })
    }

    /// Builds a controller over `count` generated intersections.
    pub fn with_intersections(
        config: OrchestratorConfig,
        count: usize,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let intersections = create_intersections(count, clock.now());
        Self::new(config, intersections, clock)
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Intersection ids in input order; ties in scheduling go to the earlier id.
    pub fn roster(&self) -> &[IntersectionId] {
        &self.roster
    }

    fn cell(&self, id: &str) -> Result<&Mutex<IntersectionCell>> {
        self.cells
            .get(id)
            .ok_or_else(|| OrchestratorError::UnknownIntersection(id.to_string()))
    }

    /// Fact-update entry point for producers.
    pub fn update_traffic(&self, id: &str, update: &TrafficUpdate) -> Result<()> {
        let now = self.clock.now();
        let mut cell = lock(self.cell(id)?);
        cell.state
            .apply_update(update, self.config.density_thresholds(), now)
    }

    /// Runs one optimization cycle: snapshot, score, decide, then push each
    /// decision through that intersection's state machine.
    pub fn run_cycle(&self) -> Result<Vec<SignalReport>> {
        let now = self.clock.now();

        let batch = self.snapshot_facts();
        let decisions = lock(&self.engine).decide(&self.roster, &batch, now);

        let mut reports = Vec::with_capacity(decisions.len());
        let mut violation = None;
        for decision in decisions {
            let Some(cell) = self.cells.get(&decision.intersection_id) else {
                let err = OrchestratorError::InvariantViolation(format!(
                    "decision for untracked intersection {}",
                    decision.intersection_id
                ));
                log::error!("[Orchestrator] {}", err);
                self.error_count.fetch_add(1, Ordering::Relaxed);
                violation = Some(err);
                continue;
            };

            let mut cell = lock(cell);
            let command =
                SignalCommand::with_duration(decision.signal, decision.duration, decision.reason);
            let response = cell.machine.request_signal(command, now);
            cell.last_priority_score = decision.priority_score;
            cell.sync_state(now);
            if let Some(stale) = cell.machine.reap_expired_transition(now) {
                log::info!(
                    "[Orchestrator] Cleaning up expired transition for {} ({} -> {})",
                    decision.intersection_id,
                    stale.from,
                    stale.to
                );
            }
            reports.push(cell.report(response));
        }

        self.optimization_count.fetch_add(1, Ordering::Relaxed);
        match violation {
            Some(err) => Err(err),
            None => Ok(reports),
        }
    }

    /// Clones every intersection's facts while holding all intersection locks,
    /// so the whole cycle is scored against one point in time. Locks are taken
    /// in roster order.
    fn snapshot_facts(&self) -> HashMap<IntersectionId, TrafficFacts> {
        let guards: Vec<_> = self
            .roster
            .iter()
            .filter_map(|id| self.cells.get(id).map(|cell| (id, lock(cell))))
            .collect();
        guards
            .iter()
            .map(|(id, cell)| ((*id).clone(), cell.state.facts.clone()))
            .collect()
    }

    /// Sets a signal immediately, bypassing the caution phase.
    pub fn force_signal(
        &self,
        id: &str,
        signal: LightState,
        duration_secs: i64,
        reason: &str,
    ) -> Result<SignalReport> {
        let command = SignalCommand::new(signal, duration_secs, reason)?;
        self.force_command(id, command)
    }

    fn force_command(&self, id: &str, command: SignalCommand) -> Result<SignalReport> {
        let now = self.clock.now();
        let mut cell = lock(self.cell(id)?);
        log::warn!(
            "[Orchestrator] Emergency signal change: {} -> {} ({}s) - {}",
            id,
            command.signal,
            command.duration,
            command.reason
        );
        let response = cell.machine.force_signal(command, now);
        cell.sync_state(now);
        Ok(cell.report(response))
    }

    /// "Emergency Vehicle" forces Green/90s, "Incident" Red/120s, anything else Red/60s.
    pub fn emergency_override(&self, id: &str, kind: &str) -> Result<SignalReport> {
        self.force_command(id, OverrideKind::from(kind).command())
    }

    /// Forces an intersection back to the safe default, Red for 30s.
    pub fn reset_signal(&self, id: &str) -> Result<SignalReport> {
        self.force_command(
            id,
            SignalCommand::with_duration(LightState::Red, RESET_SIGNAL_DURATION, RESET_SIGNAL_REASON),
        )
    }

    /// Forces every intersection to Red. Callers run this before shutting down.
    pub fn reset_all_to_red(&self) -> Vec<SignalReport> {
        self.roster
            .iter()
            .filter_map(|id| match self.reset_signal(id.as_str()) {
                Ok(report) => Some(report),
                Err(e) => {
                    log::error!("[Orchestrator] Failed to reset {}: {}", id, e);
                    None
                }
            })
            .collect()
    }

    /// Replaces the scoring weights. Returns a warning if they no longer sum to 1.0.
    pub fn adjust_weights(&self, weights: PriorityWeights) -> Result<Option<String>> {
        for (key, value) in [
            ("wait_time_weight", weights.wait_time_weight),
            ("vehicle_count_weight", weights.vehicle_count_weight),
            ("emergency_weight", weights.emergency_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                    reason: "weights must be non-negative numbers".to_string(),
                }
                .into());
            }
        }
        Ok(lock(&self.engine).set_weights(weights))
    }

    pub fn weights(&self) -> PriorityWeights {
        lock(&self.engine).weights()
    }

    pub fn set_max_consecutive_green(&self, max_consecutive_green: u32) -> Result<()> {
        if max_consecutive_green < 1 {
            return Err(ConfigError::InvalidValue {
                key: "max_consecutive_green".to_string(),
                value: max_consecutive_green.to_string(),
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        lock(&self.engine)
            .fairness_mut()
            .set_max_consecutive_green(max_consecutive_green);
        Ok(())
    }

    pub fn reset_fairness(&self) {
        lock(&self.engine).fairness_mut().reset();
    }

    /// Counts a failure reported by a collaborator (e.g. a traffic feed).
    pub fn record_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    /// The signal each intersection currently shows, in roster order.
    pub fn signal_states(&self) -> Vec<SignalReport> {
        self.roster
            .iter()
            .filter_map(|id| self.cells.get(id))
            .map(|cell| {
                let cell = lock(cell);
                cell.report(cell.machine.current())
            })
            .collect()
    }

    pub fn signal_status(&self, id: &str) -> Result<SignalStatus> {
        let now = self.clock.now();
        Ok(lock(self.cell(id)?).machine.status(now))
    }

    pub fn intersection_snapshot(&self, id: &str) -> Result<IntersectionSnapshot> {
        let now = self.clock.now();
        Ok(lock(self.cell(id)?).state.snapshot(now))
    }

    pub fn statistics(&self) -> Statistics {
        let now = self.clock.now();
        let mut distribution = SignalDistribution::default();
        let mut details = BTreeMap::new();
        let mut active_transitions = 0;

        for id in &self.roster {
            let Some(cell) = self.cells.get(id) else {
                continue;
            };
            let cell = lock(cell);
            let status = cell.machine.status(now);
            distribution.count(status.signal);
            if status.in_transition {
                active_transitions += 1;
            }
            details.insert(
                id.clone(),
                IntersectionDetail {
                    current_signal: status.signal,
                    duration: status.duration,
                    remaining: status.remaining,
                    in_transition: status.in_transition,
                    reason: status.reason,
                },
            );
        }

        let (green_cycles, last_decisions) = {
            let engine = lock(&self.engine);
            (engine.fairness().stats(now), engine.last_decisions().to_vec())
        };

        Statistics {
            total_intersections: self.roster.len(),
            active_transitions,
            signal_distribution: distribution,
            intersection_details: details,
            green_cycles,
            optimization_count: self.optimization_count.load(Ordering::Relaxed),
            error_count: self.error_count.load(Ordering::Relaxed),
            uptime_secs: now - self.started_at,
            last_decisions,
        }
    }

    // Runs a dedicated update loop that periodically runs a decision cycle.
    // This function is intended to be spawned as an async task; it returns
    // once `shutdown` flips to true or its sender is dropped. Forcing the
    // intersections to Red afterwards is the caller's job.
    pub async fn run_update_loop(controller: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(Duration::from_secs(
            controller.config.optimization_interval_secs,
        ));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        log::info!(
            "[Orchestrator] Optimizing {} intersections every {}s",
            controller.roster.len(),
            controller.config.optimization_interval_secs
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match controller.run_cycle() {
                        Ok(reports) => {
                            for report in reports {
                                log::debug!(
                                    "[Orchestrator] {}: {} for {}s ({})",
                                    report.intersection_id,
                                    report.signal,
                                    report.duration,
                                    report.reason
                                );
                            }
                        }
                        Err(e) => log::error!("[Orchestrator] Error in optimization cycle: {}", e),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        log::info!("[Orchestrator] Optimization loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Density, Incident};
    use crate::shared_data::ManualClock;

    fn controller(count: usize) -> (Arc<ManualClock>, TrafficLightController) {
        let clock = Arc::new(ManualClock::new(1_000.0));
        let controller =
            TrafficLightController::with_intersections(OrchestratorConfig::default(), count, clock.clone())
                .unwrap();
        (clock, controller)
    }

    #[test]
    fn rejects_invalid_config() {
        let mut config = OrchestratorConfig::default();
        config.yellow_time = 0;
        let clock = Arc::new(ManualClock::new(0.0));
        let err = TrafficLightController::with_intersections(config, 2, clock).err();
        assert!(matches!(err, Some(OrchestratorError::Config(ConfigError::Invalid(_)))));
    }

    #[test]
    fn rejects_too_many_intersections() {
        let clock = Arc::new(ManualClock::new(0.0));
        let err = TrafficLightController::with_intersections(OrchestratorConfig::default(), 21, clock).err();
        assert!(matches!(err, Some(OrchestratorError::Config(ConfigError::InvalidValue { .. }))));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let clock = Arc::new(ManualClock::new(0.0));
        let a = IntersectionState::new(IntersectionId::from("a"), "A", (0.0, 0.0), 0.0);
        let err = TrafficLightController::new(OrchestratorConfig::default(), vec![a.clone(), a], clock).err();
        assert!(matches!(err, Some(OrchestratorError::Config(_))));
    }

    #[test]
    fn unknown_intersection_is_an_error() {
        let (_, controller) = controller(1);
        let err = controller
            .update_traffic("nowhere", &TrafficUpdate::vehicles(3))
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::UnknownIntersection(_)));
        assert!(controller.reset_signal("nowhere").is_err());
    }

    #[test]
    fn cycle_starts_caution_then_commits_green() {
        let (clock, controller) = controller(1);
        let mut update = TrafficUpdate::vehicles(20);
        update.density = Some(Density::High);
        controller.update_traffic("intersection_1", &update).unwrap();

        let first = controller.run_cycle().unwrap();
        assert_eq!(first[0].signal, LightState::Yellow);
        assert!(first[0].transitioning);

        clock.advance(5.0);
        let second = controller.run_cycle().unwrap();
        assert_eq!(second[0].signal, LightState::Green);
        assert_eq!(second[0].duration, 60);
        assert!(!second[0].transitioning);

        let snapshot = controller.intersection_snapshot("intersection_1").unwrap();
        assert_eq!(snapshot.current_signal, LightState::Green);
    }

    #[test]
    fn green_commit_resets_accumulated_wait() {
        let (clock, controller) = controller(1);
        let mut update = TrafficUpdate::vehicles(10);
        update.additional_wait_secs = 45.0;
        controller.update_traffic("intersection_1", &update).unwrap();

        controller.run_cycle().unwrap();
        assert_eq!(
            controller.intersection_snapshot("intersection_1").unwrap().accumulated_wait_time,
            45.0
        );
        clock.advance(5.0);
        controller.run_cycle().unwrap();
        assert_eq!(
            controller.intersection_snapshot("intersection_1").unwrap().accumulated_wait_time,
            0.0
        );
    }

    #[test]
    fn emergency_override_preempts_in_flight_transition() {
        let (_, controller) = controller(1);
        controller.run_cycle().unwrap();
        assert_eq!(controller.statistics().active_transitions, 1);

        let report = controller
            .emergency_override("intersection_1", "Emergency Vehicle")
            .unwrap();
        assert_eq!(report.signal, LightState::Green);
        assert_eq!(report.duration, 90);
        assert_eq!(report.reason, "Emergency Vehicle Priority");
        assert!(!report.transitioning);
        assert_eq!(controller.statistics().active_transitions, 0);
    }

    #[test]
    fn override_kinds_map_to_fixed_commands() {
        let (_, controller) = controller(1);
        let incident = controller.emergency_override("intersection_1", "Incident").unwrap();
        assert_eq!((incident.signal, incident.duration), (LightState::Red, 120));

        let other = controller.emergency_override("intersection_1", "Flood").unwrap();
        assert_eq!((other.signal, other.duration), (LightState::Red, 60));
        assert_eq!(other.reason, "Emergency Override: Flood");

        let reset = controller.reset_signal("intersection_1").unwrap();
        assert_eq!((reset.signal, reset.duration), (LightState::Red, 30));
        assert_eq!(reset.reason, "System Reset");
    }

    #[test]
    fn rejected_force_keeps_previous_state() {
        let (_, controller) = controller(1);
        let err = controller
            .force_signal("intersection_1", LightState::Green, -10, "bad")
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::NegativeDuration(-10)));
        let status = controller.signal_status("intersection_1").unwrap();
        assert_eq!(status.signal, LightState::Red);
        assert_eq!(status.reason, "Initialization");
    }

    #[test]
    fn incident_fact_forces_red_decision() {
        let (clock, controller) = controller(2);
        let mut update = TrafficUpdate::vehicles(60);
        update.incident = Some(Incident { severity: Some(3) });
        controller.update_traffic("intersection_1", &update).unwrap();
        controller.force_signal("intersection_1", LightState::Green, 30, "setup").unwrap();

        controller.run_cycle().unwrap();
        clock.advance(3.0);
        let reports = controller.run_cycle().unwrap();
        assert_eq!(reports[0].signal, LightState::Red);
        assert_eq!(reports[0].duration, 120);
        assert_eq!(reports[0].reason, "Traffic incident");
    }

    #[test]
    fn adjust_weights_validates_and_warns() {
        let (_, controller) = controller(1);
        assert!(controller
            .adjust_weights(PriorityWeights {
                wait_time_weight: -0.1,
                ..PriorityWeights::default()
            })
            .is_err());
        let warning = controller
            .adjust_weights(PriorityWeights {
                wait_time_weight: 0.9,
                ..PriorityWeights::default()
            })
            .unwrap();
        assert!(warning.is_some());
        assert_eq!(controller.weights().wait_time_weight, 0.9);
    }

    #[test]
    fn statistics_cover_all_intersections() {
        let (clock, controller) = controller(3);
        controller.run_cycle().unwrap();
        clock.advance(5.0);
        controller.run_cycle().unwrap();

        let stats = controller.statistics();
        assert_eq!(stats.total_intersections, 3);
        assert_eq!(stats.optimization_count, 2);
        assert_eq!(
            stats.signal_distribution.red + stats.signal_distribution.yellow + stats.signal_distribution.green,
            3
        );
        assert_eq!(stats.intersection_details.len(), 3);
        assert_eq!(stats.last_decisions.len(), 3);
        assert_eq!(stats.green_cycles[&IntersectionId::from("intersection_1")].total_green_cycles, 2);
        assert_eq!(stats.uptime_secs, 5.0);
    }

    #[test]
    fn reset_all_to_red_forces_every_intersection() {
        let (_, controller) = controller(3);
        controller.emergency_override("intersection_2", "Emergency Vehicle").unwrap();
        let reports = controller.reset_all_to_red();
        assert_eq!(reports.len(), 3);
        assert!(controller
            .signal_states()
            .iter()
            .all(|r| r.signal == LightState::Red && !r.transitioning));
    }

    #[tokio::test(start_paused = true)]
    async fn update_loop_stops_on_shutdown() {
        let (_, controller) = controller(2);
        let controller = Arc::new(controller);
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(TrafficLightController::run_update_loop(controller.clone(), rx));

        tokio::time::sleep(Duration::from_secs(11)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        // Ticks at 0s, 5s and 10s.
        assert_eq!(controller.statistics().optimization_count, 3);
    }
}
