use std::collections::HashMap;

use crate::config::{OrchestratorConfig, PriorityWeights};
use crate::flow_analyzer::{FairnessRegulator, PriorityScorer};
use crate::global_variables::{
    EMERGENCY_DECISION_REASON, EMERGENCY_GREEN_DURATION, INCIDENT_DECISION_REASON,
    INCIDENT_RED_DURATION, MAX_RED_DURATION,
};
use crate::models::{Density, IntersectionId, LightState, TrafficFacts};
use crate::shared_data::Decision;

/// Phase-length limits applied to scheduled (non-override) decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTiming {
    pub min_green_time: u32,
    pub max_green_time: u32,
    pub min_red_time: u32,
}

impl From<&OrchestratorConfig> for PhaseTiming {
    fn from(config: &OrchestratorConfig) -> Self {
        Self {
            min_green_time: config.min_green_time,
            max_green_time: config.max_green_time,
            min_red_time: config.min_red_time,
        }
    }
}

/// Picks, once per cycle, the single intersection that gets Green and how long
/// every intersection holds its signal. Apart from the fairness history it
/// keeps nothing between calls.
#[derive(Debug, Clone)]
pub struct SignalDecisionEngine {
    scorer: PriorityScorer,
    fairness: FairnessRegulator,
    timing: PhaseTiming,
    last_decisions: Vec<Decision>,
}

impl SignalDecisionEngine {
    pub fn new(config: &OrchestratorConfig) -> Self {
        Self {
            scorer: PriorityScorer::new(config.weights),
            fairness: FairnessRegulator::new(
                config.fairness_window_secs as f64,
                config.max_consecutive_green,
            ),
            timing: PhaseTiming::from(config),
            last_decisions: Vec::new(),
        }
    }

    /// Produces exactly one decision per id in `roster`, in roster order.
    ///
    /// Ids missing from `batch` are decided on [`TrafficFacts::fallback`].
    /// Ties on the adjusted score go to the first intersection in the roster.
    pub fn decide(
        &mut self,
        roster: &[IntersectionId],
        batch: &HashMap<IntersectionId, TrafficFacts>,
        now: f64,
    ) -> Vec<Decision> {
        let fallback = TrafficFacts::fallback();
        let scored: Vec<(&IntersectionId, &TrafficFacts, f64)> = roster
            .iter()
            .map(|id| {
                let facts = batch.get(id).unwrap_or_else(|| {
                    log::warn!("[DecisionEngine] No traffic facts for {}, using fallback", id);
                    &fallback
                });
                let raw = self.scorer.score(facts);
                let adjusted = self.fairness.damp(id, raw, now);
                if adjusted < raw {
                    log::debug!(
                        "[Fairness] {} damped from {:.2} to {:.2}",
                        id,
                        raw,
                        adjusted
                    );
                }
                (id, facts, adjusted)
            })
            .collect();

        let mut winner: Option<usize> = None;
        for (index, (_, _, score)) in scored.iter().enumerate() {
            if winner.map_or(true, |w| *score > scored[w].2) {
                winner = Some(index);
            }
        }

        let decisions: Vec<Decision> = scored
            .iter()
            .enumerate()
            .map(|(index, &(id, facts, score))| {
                let (mut signal, mut duration, mut reason) = if Some(index) == winner {
                    (
                        LightState::Green,
                        self.green_duration(facts),
                        format!("Priority intersection (score: {:.1})", score),
                    )
                } else {
                    (
                        LightState::Red,
                        self.red_duration(facts),
                        format!("Lower priority (score: {:.1})", score),
                    )
                };

                if facts.emergency {
                    signal = LightState::Green;
                    duration = EMERGENCY_GREEN_DURATION;
                    reason = EMERGENCY_DECISION_REASON.to_string();
                }
                // Checked last so an incident wins over an emergency on the same intersection.
                if facts.incident_present {
                    signal = LightState::Red;
                    duration = INCIDENT_RED_DURATION;
                    reason = INCIDENT_DECISION_REASON.to_string();
                }

                Decision {
                    intersection_id: id.clone(),
                    signal,
                    duration,
                    reason,
                    priority_score: score,
                }
            })
            .collect();

        for decision in decisions.iter().filter(|d| d.signal == LightState::Green) {
            self.fairness.record_green(&decision.intersection_id, now);
        }

        self.last_decisions = decisions.clone();
        decisions
    }

    /// Base by density plus a queue bonus, clamped into the green limits.
    pub fn green_duration(&self, facts: &TrafficFacts) -> u32 {
        let base = match facts.density {
            Density::High => 60,
            Density::Medium => 40,
            Density::Low => 25,
        };
        let bonus = if facts.vehicle_count > 50 {
            20
        } else if facts.vehicle_count > 30 {
            10
        } else {
            0
        };
        (base + bonus)
            .min(self.timing.max_green_time)
            .max(self.timing.min_green_time)
    }

    pub fn red_duration(&self, facts: &TrafficFacts) -> u32 {
        if facts.vehicle_count == 0 {
            self.timing.min_red_time
        } else {
            self.timing
                .min_red_time
                .saturating_add(facts.vehicle_count.saturating_mul(2))
                .min(MAX_RED_DURATION)
        }
    }

    pub fn last_decisions(&self) -> &[Decision] {
        &self.last_decisions
    }

    pub fn weights(&self) -> PriorityWeights {
        self.scorer.weights()
    }

    pub fn set_weights(&mut self, weights: PriorityWeights) -> Option<String> {
        self.scorer.set_weights(weights)
    }

    pub fn fairness(&self) -> &FairnessRegulator {
        &self.fairness
    }

    pub fn fairness_mut(&mut self) -> &mut FairnessRegulator {
        &mut self.fairness
    }

    pub fn scorer(&self) -> &PriorityScorer {
        &self.scorer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts(vehicle_count: u32, density: Density, wait: f64) -> TrafficFacts {
        TrafficFacts {
            vehicle_count,
            density,
            accumulated_wait_time: wait,
            ..TrafficFacts::fallback()
        }
    }

    fn batch(entries: &[(&str, TrafficFacts)]) -> (Vec<IntersectionId>, HashMap<IntersectionId, TrafficFacts>) {
        let roster = entries.iter().map(|(id, _)| IntersectionId::from(*id)).collect();
        let map = entries
            .iter()
            .map(|(id, f)| (IntersectionId::from(*id), f.clone()))
            .collect();
        (roster, map)
    }

    fn engine() -> SignalDecisionEngine {
        SignalDecisionEngine::new(&OrchestratorConfig::default())
    }

    #[test]
    fn empty_roster_yields_no_decisions() {
        let mut engine = engine();
        assert!(engine.decide(&[], &HashMap::new(), 0.0).is_empty());
    }

    #[test]
    fn highest_score_wins_green() {
        let mut engine = engine();
        let (roster, map) = batch(&[
            ("a", facts(5, Density::Low, 0.0)),
            ("b", facts(40, Density::High, 30.0)),
        ]);
        let decisions = engine.decide(&roster, &map, 0.0);
        assert_eq!(decisions[0].signal, LightState::Red);
        assert_eq!(decisions[1].signal, LightState::Green);
        // High base 60 + 10 for more than 30 vehicles
        assert_eq!(decisions[1].duration, 70);
        assert!(decisions[1].reason.starts_with("Priority intersection"));
        // 5 + 2*5
        assert_eq!(decisions[0].duration, 15);
    }

    #[test]
    fn ties_go_to_first_in_roster() {
        let mut engine = engine();
        let (roster, map) = batch(&[
            ("a", facts(10, Density::Low, 0.0)),
            ("b", facts(10, Density::Low, 0.0)),
        ]);
        let decisions = engine.decide(&roster, &map, 0.0);
        assert_eq!(decisions[0].signal, LightState::Green);
        assert_eq!(decisions[1].signal, LightState::Red);
    }

    #[test]
    fn green_duration_is_clamped() {
        let mut config = OrchestratorConfig::default();
        config.max_green_time = 50;
        config.min_green_time = 30;
        let engine = SignalDecisionEngine::new(&config);
        assert_eq!(engine.green_duration(&facts(60, Density::High, 0.0)), 50);
        assert_eq!(engine.green_duration(&facts(0, Density::Low, 0.0)), 30);
    }

    #[test]
    fn red_duration_grows_with_queue_up_to_cap() {
        let engine = engine();
        assert_eq!(engine.red_duration(&facts(0, Density::Low, 0.0)), 5);
        assert_eq!(engine.red_duration(&facts(1, Density::Low, 0.0)), 7);
        assert_eq!(engine.red_duration(&facts(20, Density::Medium, 0.0)), 45);
        assert_eq!(engine.red_duration(&facts(u32::MAX, Density::High, 0.0)), 45);
    }

    #[test]
    fn emergency_overrides_computed_winner() {
        let mut engine = engine();
        let mut b = facts(5, Density::Low, 10.0);
        b.emergency = true;
        let (roster, map) = batch(&[("a", facts(50, Density::High, 60.0)), ("b", b)]);
        let decisions = engine.decide(&roster, &map, 0.0);
        assert_eq!(decisions[1].signal, LightState::Green);
        assert_eq!(decisions[1].duration, 90);
        assert_eq!(decisions[1].reason, "Emergency vehicle priority");
    }

    #[test]
    fn incident_beats_emergency_on_same_intersection() {
        let mut engine = engine();
        let mut a = facts(50, Density::High, 60.0);
        a.emergency = true;
        a.incident_present = true;
        let (roster, map) = batch(&[("a", a)]);
        let decisions = engine.decide(&roster, &map, 0.0);
        assert_eq!(decisions[0].signal, LightState::Red);
        assert_eq!(decisions[0].duration, 120);
        assert_eq!(decisions[0].reason, "Traffic incident");
        assert_eq!(engine.fairness().recent_green_count(&IntersectionId::from("a"), 0.0), 0);
    }

    #[test]
    fn missing_facts_fall_back_to_idle_intersection() {
        let mut engine = engine();
        let roster = vec![IntersectionId::from("a"), IntersectionId::from("ghost")];
        let mut map = HashMap::new();
        map.insert(IntersectionId::from("a"), facts(20, Density::Medium, 0.0));
        let decisions = engine.decide(&roster, &map, 0.0);
        assert_eq!(decisions.len(), 2);
        assert_eq!(decisions[1].intersection_id, IntersectionId::from("ghost"));
        assert_eq!(decisions[1].signal, LightState::Red);
        assert_eq!(decisions[1].duration, 5);
    }

    #[test]
    fn every_green_is_recorded_for_fairness() {
        let mut engine = engine();
        let mut b = facts(0, Density::Low, 0.0);
        b.emergency = true;
        let (roster, map) = batch(&[("a", facts(40, Density::High, 0.0)), ("b", b)]);
        engine.decide(&roster, &map, 0.0);
        let fairness = engine.fairness();
        // "b" wins on score and is also the emergency; "a" gets Red.
        assert_eq!(fairness.recent_green_count(&IntersectionId::from("b"), 0.0), 1);
        assert_eq!(fairness.recent_green_count(&IntersectionId::from("a"), 0.0), 0);
    }

    #[test]
    fn repeated_winner_is_damped() {
        let mut engine = engine();
        let (roster, map) = batch(&[
            ("a", facts(40, Density::High, 30.0)),
            ("b", facts(20, Density::Medium, 30.0)),
        ]);
        let raw = engine.scorer().score(&map[&roster[0]]);
        for cycle in 0..3 {
            let decisions = engine.decide(&roster, &map, cycle as f64 * 5.0);
            assert_eq!(decisions[0].signal, LightState::Green);
        }
        let decisions = engine.decide(&roster, &map, 15.0);
        assert!(decisions[0].priority_score < raw);
        assert_eq!(decisions[1].signal, LightState::Green);
    }
}
