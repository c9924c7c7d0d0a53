use crate::config::PriorityWeights;
use crate::global_variables::{
    EMERGENCY_BASE_SCORE, HIGH_DENSITY_BONUS, MEDIUM_DENSITY_BONUS, SCORE_TERM_CAP,
    VEHICLE_SCORE_DIVISOR, WAIT_SCORE_DIVISOR,
};
use crate::models::{Density, TrafficFacts};

/// Turns one intersection's traffic facts into a non-negative urgency score.
#[derive(Debug, Clone)]
pub struct PriorityScorer {
    weights: PriorityWeights,
}

impl PriorityScorer {
    pub fn new(weights: PriorityWeights) -> Self {
        if let Some(warning) = weights.sum_warning() {
            log::warn!("[PriorityScorer] {}", warning);
        }
        Self { weights }
    }

    pub fn weights(&self) -> PriorityWeights {
        self.weights
    }

    /// Replaces the weights. Returns the drift warning, if any; the weights are applied regardless.
    pub fn set_weights(&mut self, weights: PriorityWeights) -> Option<String> {
        let warning = weights.sum_warning();
        if let Some(ref w) = warning {
            log::warn!("[PriorityScorer] {}", w);
        }
        log::info!(
            "[PriorityScorer] Weights updated: wait={} vehicle={} emergency={}",
            weights.wait_time_weight,
            weights.vehicle_count_weight,
            weights.emergency_weight
        );
        self.weights = weights;
        warning
    }

    pub fn score(&self, facts: &TrafficFacts) -> f64 {
        let mut score = 0.0;

        if facts.emergency {
            score += EMERGENCY_BASE_SCORE * self.weights.emergency_weight;
        }

        let vehicle_term = (facts.vehicle_count as f64 / VEHICLE_SCORE_DIVISOR).min(SCORE_TERM_CAP);
        score += vehicle_term * self.weights.vehicle_count_weight;

        let wait = facts.accumulated_wait_time.max(0.0);
        let wait_term = (wait / WAIT_SCORE_DIVISOR).min(SCORE_TERM_CAP);
        score += wait_term * self.weights.wait_time_weight;

        // Flat, unweighted.
        score += match facts.density {
            Density::High => HIGH_DENSITY_BONUS,
            Density::Medium => MEDIUM_DENSITY_BONUS,
            Density::Low => 0.0,
        };

        score.max(0.0)
    }
}

impl Default for PriorityScorer {
    fn default() -> Self {
        Self::new(PriorityWeights::default())
    }
}
