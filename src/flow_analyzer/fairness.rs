use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::global_variables::{NEAR_SATURATED_DAMPING, SATURATED_DAMPING};
use crate::models::IntersectionId;
use crate::shared_data::GreenCycleStats;

/// Tracks recent Green grants per intersection and damps the scores of
/// intersections that keep winning, so the others are not starved.
#[derive(Debug, Clone)]
pub struct FairnessRegulator {
    window_secs: f64,
    max_consecutive_green: u32,
    // Grant timestamps, oldest first.
    history: HashMap<IntersectionId, VecDeque<f64>>,
}

impl FairnessRegulator {
    pub fn new(window_secs: f64, max_consecutive_green: u32) -> Self {
        Self {
            window_secs,
            max_consecutive_green,
            history: HashMap::new(),
        }
    }

    pub fn max_consecutive_green(&self) -> u32 {
        self.max_consecutive_green
    }

    pub fn set_max_consecutive_green(&mut self, max_consecutive_green: u32) {
        self.max_consecutive_green = max_consecutive_green.max(1);
    }

    /// Number of grants inside the trailing window, scanning from the newest
    /// grant and stopping at the first one older than the cutoff.
    pub fn recent_green_count(&self, id: &IntersectionId, now: f64) -> usize {
        let cutoff = now - self.window_secs;
        self.history
            .get(id)
            .map(|grants| grants.iter().rev().take_while(|&&t| t >= cutoff).count())
            .unwrap_or(0)
    }

    /// Applies the damping rule to a raw score: x0.3 at `max_consecutive_green`
    /// recent grants, x0.7 at one below it.
    pub fn damp(&self, id: &IntersectionId, score: f64, now: f64) -> f64 {
        let recent = self.recent_green_count(id, now);
        let max = self.max_consecutive_green as usize;
        if recent >= max {
            score * SATURATED_DAMPING
        } else if recent + 1 == max {
            score * NEAR_SATURATED_DAMPING
        } else {
            score
        }
    }

    /// Records a Green grant and drops grants that fell out of the window.
    pub fn record_green(&mut self, id: &IntersectionId, now: f64) {
        let cutoff = now - self.window_secs;
        let grants = self.history.entry(id.clone()).or_default();
        grants.push_back(now);
        while grants.front().is_some_and(|&t| t < cutoff) {
            grants.pop_front();
        }
    }

    pub fn reset(&mut self) {
        self.history.clear();
        log::info!("[Fairness] Fairness tracking reset");
    }

    pub fn stats(&self, now: f64) -> BTreeMap<IntersectionId, GreenCycleStats> {
        self.history
            .iter()
            .map(|(id, grants)| {
                (
                    id.clone(),
                    GreenCycleStats {
                        total_green_cycles: grants.len(),
                        recent_green_cycles: self.recent_green_count(id, now),
                        last_green_cycle: grants.back().copied(),
                    },
                )
            })
            .collect()
    }
}
