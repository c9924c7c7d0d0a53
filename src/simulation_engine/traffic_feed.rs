use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::error::FeedError;
use crate::models::{Incident, IntersectionId, LightState, TrafficUpdate};

/// Stand-in for the video analysis service: produces plausible traffic facts
/// per intersection, including rare emergencies, incidents and sensor dropouts.
#[derive(Debug, Clone)]
pub struct SyntheticTrafficFeed {
    rng: SmallRng,
    max_vehicles: u32,
    failure_rate: f64,
    emergency_rate: f64,
    incident_rate: f64,
}

impl SyntheticTrafficFeed {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            max_vehicles: 60,
            failure_rate: 0.02,
            emergency_rate: 0.01,
            incident_rate: 0.005,
        }
    }

    /// Overrides the event probabilities. Values are clamped into [0, 1].
    pub fn with_rates(mut self, failure_rate: f64, emergency_rate: f64, incident_rate: f64) -> Self {
        self.failure_rate = failure_rate.clamp(0.0, 1.0);
        self.emergency_rate = emergency_rate.clamp(0.0, 1.0);
        self.incident_rate = incident_rate.clamp(0.0, 1.0);
        self
    }

    /// One reading for `id`. Waiting accrues only while vehicles queue at a
    /// signal that is not Green.
    pub fn sample(
        &mut self,
        id: &IntersectionId,
        current_signal: LightState,
        interval_secs: f64,
    ) -> Result<TrafficUpdate, FeedError> {
        if self.rng.random_bool(self.failure_rate) {
            return Err(FeedError::SensorUnavailable(id.to_string()));
        }

        let vehicle_count = self.rng.random_range(0..=self.max_vehicles);
        let additional_wait_secs = if vehicle_count > 0 && current_signal != LightState::Green {
            interval_secs
        } else {
            0.0
        };
        let incident = if self.rng.random_bool(self.incident_rate) {
            Some(Incident {
                severity: Some(self.rng.random_range(1..=3)),
            })
        } else {
            None
        };

        Ok(TrafficUpdate {
            vehicle_count,
            density: None,
            additional_wait_secs,
            emergency: self.rng.random_bool(self.emergency_rate),
            incident,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_gives_same_readings() {
        let id = IntersectionId::from("intersection_1");
        let mut a = SyntheticTrafficFeed::new(7);
        let mut b = SyntheticTrafficFeed::new(7);
        for _ in 0..20 {
            let left = a.sample(&id, LightState::Red, 2.0).ok();
            let right = b.sample(&id, LightState::Red, 2.0).ok();
            assert_eq!(left, right);
        }
    }

    #[test]
    fn certain_failure_always_errors() {
        let id = IntersectionId::from("intersection_1");
        let mut feed = SyntheticTrafficFeed::new(1).with_rates(1.0, 0.0, 0.0);
        assert!(matches!(
            feed.sample(&id, LightState::Red, 2.0),
            Err(FeedError::SensorUnavailable(_))
        ));
    }

    #[test]
    fn no_wait_accrues_on_green() {
        let id = IntersectionId::from("intersection_1");
        let mut feed = SyntheticTrafficFeed::new(3).with_rates(0.0, 0.0, 0.0);
        for _ in 0..20 {
            let update = feed.sample(&id, LightState::Green, 2.0).unwrap();
            assert_eq!(update.additional_wait_secs, 0.0);
            assert!(update.vehicle_count <= 60);
            assert!(!update.emergency);
            assert!(update.incident.is_none());
        }
    }
}
