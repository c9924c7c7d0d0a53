use std::borrow::Borrow;
use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};
use crate::global_variables::{
    INITIAL_SIGNAL_DURATION, SIGNAL_HISTORY_CAPACITY, VEHICLE_HISTORY_CAPACITY,
    WAIT_HISTORY_CAPACITY,
};
use crate::models::signal::LightState;

/// A unique identifier for a managed intersection (e.g. "intersection_1").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntersectionId(pub String);

impl IntersectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IntersectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IntersectionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl Borrow<str> for IntersectionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Coarse traffic-load classification derived from the vehicle count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Density {
    Low,
    Medium,
    High,
}

/// The two ordered vehicle-count thresholds used to classify density.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DensityThresholds {
    pub medium: u32,
    pub high: u32,
}

impl Default for DensityThresholds {
    fn default() -> Self {
        Self { medium: 15, high: 30 }
    }
}

impl Density {
    /// High iff `count >= high`, Medium iff `medium <= count < high`, else Low.
    pub fn classify(count: u32, thresholds: DensityThresholds) -> Self {
        if count >= thresholds.high {
            Density::High
        } else if count >= thresholds.medium {
            Density::Medium
        } else {
            Density::Low
        }
    }
}

/// The live traffic facts the scheduler consumes for one intersection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficFacts {
    pub vehicle_count: u32,
    pub density: Density,
    /// Seconds of accumulated waiting; only a Green grant brings it back down.
    pub accumulated_wait_time: f64,
    pub emergency: bool,
    pub incident_present: bool,
    pub incident_severity: Option<u8>,
}

impl TrafficFacts {
    /// Facts assumed for an intersection that is missing from an input batch.
    pub fn fallback() -> Self {
        Self {
            vehicle_count: 0,
            density: Density::Low,
            accumulated_wait_time: 0.0,
            emergency: false,
            incident_present: false,
            incident_severity: None,
        }
    }
}

impl Default for TrafficFacts {
    fn default() -> Self {
        Self::fallback()
    }
}

/// A reported traffic incident, optionally graded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    pub severity: Option<u8>,
}

/// One batch of facts submitted by a producer (vision, manual entry) for an intersection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficUpdate {
    pub vehicle_count: u32,
    /// Trusted as-is when present; otherwise classified from `vehicle_count`.
    pub density: Option<Density>,
    pub additional_wait_secs: f64,
    pub emergency: bool,
    pub incident: Option<Incident>,
}

impl TrafficUpdate {
    pub fn vehicles(vehicle_count: u32) -> Self {
        Self {
            vehicle_count,
            density: None,
            additional_wait_secs: 0.0,
            emergency: false,
            incident: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountSample {
    pub count: u32,
    pub timestamp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalChange {
    pub from: LightState,
    pub to: LightState,
    pub duration: u32,
    pub reason: String,
    pub timestamp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitSample {
    pub wait_time: f64,
    pub timestamp: f64,
}

/// Appends to a ring buffer, dropping the oldest entry once `capacity` is reached.
fn push_bounded<T>(buffer: &mut VecDeque<T>, item: T, capacity: usize) {
    if buffer.len() == capacity {
        buffer.pop_front();
    }
    buffer.push_back(item);
}

/// Represents one managed intersection: identity, live traffic facts and signal facts.
#[derive(Debug, Clone)]
pub struct IntersectionState {
    /// Unique identifier for the intersection.
    pub id: IntersectionId,
    /// Display name.
    pub name: String,
    /// Fixed (latitude, longitude).
    pub position: (f64, f64),
    /// Latest facts submitted by producers.
    pub facts: TrafficFacts,
    /// Mean of the retained wait samples.
    pub average_wait_time: f64,
    /// The signal currently shown.
    pub current_signal: LightState,
    /// Seconds assigned to the current phase.
    pub signal_duration: u32,
    /// Timestamp of the last observed signal change.
    pub last_signal_change: f64,
    vehicle_count_history: VecDeque<CountSample>,
    signal_change_history: VecDeque<SignalChange>,
    wait_time_history: VecDeque<WaitSample>,
}

impl IntersectionState {
    pub fn new(id: IntersectionId, name: impl Into<String>, position: (f64, f64), now: f64) -> Self {
        Self {
            id,
            name: name.into(),
            position,
            facts: TrafficFacts::fallback(),
            average_wait_time: 0.0,
            current_signal: LightState::Red,
            signal_duration: INITIAL_SIGNAL_DURATION,
            last_signal_change: now,
            vehicle_count_history: VecDeque::with_capacity(VEHICLE_HISTORY_CAPACITY),
            signal_change_history: VecDeque::with_capacity(SIGNAL_HISTORY_CAPACITY),
            wait_time_history: VecDeque::with_capacity(WAIT_HISTORY_CAPACITY),
        }
    }

    /// Validates and applies a producer update. Nothing is mutated if validation fails.
    pub fn apply_update(
        &mut self,
        update: &TrafficUpdate,
        thresholds: DensityThresholds,
        now: f64,
    ) -> Result<()> {
        if !update.additional_wait_secs.is_finite() || update.additional_wait_secs < 0.0 {
            return Err(OrchestratorError::InvalidTrafficFacts {
                intersection: self.id.to_string(),
                reason: format!(
                    "wait increment must be a non-negative number, got {}",
                    update.additional_wait_secs
                ),
            });
        }

        self.update_vehicle_count(update.vehicle_count, update.density, thresholds, now);
        if update.additional_wait_secs > 0.0 {
            self.record_wait(update.additional_wait_secs, now);
        }
        self.facts.emergency = update.emergency;
        self.facts.incident_present = update.incident.is_some();
        self.facts.incident_severity = update.incident.and_then(|i| i.severity);
        Ok(())
    }

    /// Updates the vehicle count and density. A supplied density is trusted as-is.
    pub fn update_vehicle_count(
        &mut self,
        count: u32,
        density: Option<Density>,
        thresholds: DensityThresholds,
        now: f64,
    ) {
        self.facts.vehicle_count = count;
        self.facts.density = density.unwrap_or_else(|| Density::classify(count, thresholds));
        push_bounded(
            &mut self.vehicle_count_history,
            CountSample {
                count,
                timestamp: now,
            },
            VEHICLE_HISTORY_CAPACITY,
        );
    }

    pub fn record_wait(&mut self, additional_wait: f64, now: f64) {
        self.facts.accumulated_wait_time += additional_wait;
        push_bounded(
            &mut self.wait_time_history,
            WaitSample {
                wait_time: additional_wait,
                timestamp: now,
            },
            WAIT_HISTORY_CAPACITY,
        );
        let total: f64 = self.wait_time_history.iter().map(|w| w.wait_time).sum();
        self.average_wait_time = total / self.wait_time_history.len() as f64;
    }

    /// Mirrors the signal shown by the state machine. A change into Green clears
    /// the accumulated wait.
    pub fn record_signal(&mut self, signal: LightState, duration: u32, reason: &str, now: f64) {
        let previous = self.current_signal;
        self.current_signal = signal;
        self.signal_duration = duration;
        self.last_signal_change = now;

        if signal == LightState::Green && previous != LightState::Green {
            self.facts.accumulated_wait_time = 0.0;
        }

        push_bounded(
            &mut self.signal_change_history,
            SignalChange {
                from: previous,
                to: signal,
                duration,
                reason: reason.to_string(),
                timestamp: now,
            },
            SIGNAL_HISTORY_CAPACITY,
        );
    }

    pub fn time_remaining(&self, now: f64) -> f64 {
        (self.signal_duration as f64 - (now - self.last_signal_change)).max(0.0)
    }

    pub fn should_change_signal(&self, now: f64) -> bool {
        self.time_remaining(now) <= 0.0
    }

    pub fn vehicle_count_history(&self) -> &VecDeque<CountSample> {
        &self.vehicle_count_history
    }

    pub fn signal_change_history(&self) -> &VecDeque<SignalChange> {
        &self.signal_change_history
    }

    pub fn wait_time_history(&self) -> &VecDeque<WaitSample> {
        &self.wait_time_history
    }

    pub fn snapshot(&self, now: f64) -> IntersectionSnapshot {
        IntersectionSnapshot {
            intersection_id: self.id.clone(),
            name: self.name.clone(),
            position: self.position,
            current_signal: self.current_signal,
            signal_duration: self.signal_duration,
            time_remaining: self.time_remaining(now),
            vehicle_count: self.facts.vehicle_count,
            traffic_density: self.facts.density,
            emergency_detected: self.facts.emergency,
            incident_present: self.facts.incident_present,
            accumulated_wait_time: self.facts.accumulated_wait_time,
            average_wait_time: self.average_wait_time,
        }
    }
}

/// Read-only view of an intersection for external control surfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntersectionSnapshot {
    pub intersection_id: IntersectionId,
    pub name: String,
    pub position: (f64, f64),
    pub current_signal: LightState,
    pub signal_duration: u32,
    pub time_remaining: f64,
    pub vehicle_count: u32,
    pub traffic_density: Density,
    pub emergency_detected: bool,
    pub incident_present: bool,
    pub accumulated_wait_time: f64,
    pub average_wait_time: f64,
}
