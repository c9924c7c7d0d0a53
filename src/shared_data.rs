// src/shared_data.rs

use crate::models::{IntersectionId, LightState, SignalResponse};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch, with sub-second precision.
pub fn current_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Source of "now" for every time-dependent part of the engine.
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        current_timestamp()
    }
}

/// A clock that only moves when told to. Used by tests and benchmarks.
#[derive(Debug)]
pub struct ManualClock {
    bits: AtomicU64,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            bits: AtomicU64::new(start.to_bits()),
        }
    }

    pub fn set(&self, now: f64) {
        self.bits.store(now.to_bits(), Ordering::SeqCst);
    }

    pub fn advance(&self, secs: f64) {
        self.set(self.now() + secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }
}

/// One scheduling outcome for one intersection, produced per optimization cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub intersection_id: IntersectionId,
    pub signal: LightState,
    pub duration: u32,
    pub reason: String,
    pub priority_score: f64,
}

/// The externally observable signal state of an intersection after a
/// decision or override has been applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalReport {
    pub intersection_id: IntersectionId,
    pub signal: LightState,
    pub duration: u32,
    pub reason: String,
    pub transitioning: bool,
    pub priority_score: f64,
}

impl SignalReport {
    pub fn new(intersection_id: IntersectionId, response: SignalResponse, priority_score: f64) -> Self {
        Self {
            intersection_id,
            signal: response.signal,
            duration: response.duration,
            reason: response.reason,
            transitioning: response.transitioning,
            priority_score,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalDistribution {
    pub red: usize,
    pub yellow: usize,
    pub green: usize,
}

impl SignalDistribution {
    pub fn count(&mut self, signal: LightState) {
        match signal {
            LightState::Red => self.red += 1,
            LightState::Yellow => self.yellow += 1,
            LightState::Green => self.green += 1,
        }
    }
}

/// Green-grant history of one intersection as seen by the fairness regulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GreenCycleStats {
    pub total_green_cycles: usize,
    pub recent_green_cycles: usize,
    pub last_green_cycle: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntersectionDetail {
    pub current_signal: LightState,
    pub duration: u32,
    pub remaining: f64,
    pub in_transition: bool,
    pub reason: String,
}

/// Aggregate view returned by `TrafficLightController::statistics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_intersections: usize,
    pub active_transitions: usize,
    pub signal_distribution: SignalDistribution,
    pub intersection_details: BTreeMap<IntersectionId, IntersectionDetail>,
    pub green_cycles: BTreeMap<IntersectionId, GreenCycleStats>,
    pub optimization_count: u64,
    pub error_count: u64,
    pub uptime_secs: f64,
    pub last_decisions: Vec<Decision>,
}
