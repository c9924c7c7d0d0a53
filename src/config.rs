use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::global_variables::WEIGHT_SUM_TOLERANCE;
use crate::models::DensityThresholds;

/// Weights of the three scored terms. They should sum to 1.0; drift is reported
/// as a warning but never corrected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PriorityWeights {
    pub wait_time_weight: f64,
    pub vehicle_count_weight: f64,
    pub emergency_weight: f64,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            wait_time_weight: 0.4,
            vehicle_count_weight: 0.3,
            emergency_weight: 0.3,
        }
    }
}

impl PriorityWeights {
    pub fn sum(&self) -> f64 {
        self.wait_time_weight + self.vehicle_count_weight + self.emergency_weight
    }

    /// Returns a warning when the weights no longer sum to 1.0.
    pub fn sum_warning(&self) -> Option<String> {
        let total = self.sum();
        if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            Some(format!("Optimization weights sum to {:.2}, should be 1.0", total))
        } else {
            None
        }
    }

    fn errors(&self) -> Vec<String> {
        [
            ("wait_time_weight", self.wait_time_weight),
            ("vehicle_count_weight", self.vehicle_count_weight),
            ("emergency_weight", self.emergency_weight),
        ]
        .iter()
        .filter(|(_, w)| !w.is_finite() || *w < 0.0)
        .map(|(name, w)| format!("{} must be a non-negative number, got {}", name, w))
        .collect()
    }
}

/// Recognized options for one run of the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrchestratorConfig {
    pub min_green_time: u32,
    pub max_green_time: u32,
    pub yellow_time: u32,
    pub min_red_time: u32,
    pub optimization_interval_secs: u64,
    /// Cadence of the traffic-fact producer driving the binary.
    pub feed_interval_secs: u64,
    pub traffic_density_medium_threshold: u32,
    pub traffic_density_high_threshold: u32,
    pub fairness_window_secs: u64,
    pub max_consecutive_green: u32,
    pub weights: PriorityWeights,
    pub max_intersections: usize,
    /// Default log filter, overridable with RUST_LOG.
    pub log_level: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            min_green_time: 15,
            max_green_time: 90,
            yellow_time: 3,
            min_red_time: 5,
            optimization_interval_secs: 5,
            feed_interval_secs: 2,
            traffic_density_medium_threshold: 15,
            traffic_density_high_threshold: 30,
            fairness_window_secs: 300,
            max_consecutive_green: 3,
            weights: PriorityWeights::default(),
            max_intersections: 20,
            log_level: "info".to_string(),
        }
    }
}

/// Outcome of [`OrchestratorConfig::validate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

fn parse_field<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

impl OrchestratorConfig {
    /// Loads a JSON configuration file. Missing keys take their defaults,
    /// unknown keys are rejected, and an invalid result is refused.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        let config = Self::from_json_str(&contents)?;
        log::info!("[Config] Configuration loaded from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.ensure_valid()?;
        Ok(config)
    }

    pub fn density_thresholds(&self) -> DensityThresholds {
        DensityThresholds {
            medium: self.traffic_density_medium_threshold,
            high: self.traffic_density_high_threshold,
        }
    }

    /// Updates one field from its textual value. On error the field is unchanged.
    pub fn apply_update(&mut self, key: &str, raw: &str) -> Result<(), ConfigError> {
        match key {
            "min_green_time" => self.min_green_time = parse_field(key, raw)?,
            "max_green_time" => self.max_green_time = parse_field(key, raw)?,
            "yellow_time" => self.yellow_time = parse_field(key, raw)?,
            "min_red_time" => self.min_red_time = parse_field(key, raw)?,
            "optimization_interval_secs" => self.optimization_interval_secs = parse_field(key, raw)?,
            "feed_interval_secs" => self.feed_interval_secs = parse_field(key, raw)?,
            "traffic_density_medium_threshold" => {
                self.traffic_density_medium_threshold = parse_field(key, raw)?
            }
            "traffic_density_high_threshold" => {
                self.traffic_density_high_threshold = parse_field(key, raw)?
            }
            "fairness_window_secs" => self.fairness_window_secs = parse_field(key, raw)?,
            "max_consecutive_green" => self.max_consecutive_green = parse_field(key, raw)?,
            "wait_time_weight" => self.weights.wait_time_weight = parse_field(key, raw)?,
            "vehicle_count_weight" => self.weights.vehicle_count_weight = parse_field(key, raw)?,
            "emergency_weight" => self.weights.emergency_weight = parse_field(key, raw)?,
            "max_intersections" => self.max_intersections = parse_field(key, raw)?,
            "log_level" => self.log_level = raw.trim().to_string(),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    /// Applies several `key=value` updates, reporting an outcome per field.
    pub fn apply_updates<'a, I>(&mut self, updates: I) -> Vec<(String, Result<(), ConfigError>)>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        updates
            .into_iter()
            .map(|(key, raw)| (key.to_string(), self.apply_update(key, raw)))
            .collect()
    }

    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        if self.min_green_time >= self.max_green_time {
            report
                .errors
                .push("min_green_time must be less than max_green_time".to_string());
        }
        if self.traffic_density_medium_threshold >= self.traffic_density_high_threshold {
            report
                .errors
                .push("medium_threshold must be less than high_threshold".to_string());
        }
        if self.max_consecutive_green < 1 {
            report
                .errors
                .push("max_consecutive_green must be at least 1".to_string());
        }
        if self.yellow_time == 0 {
            report.errors.push("yellow_time must be at least 1".to_string());
        }
        if self.optimization_interval_secs == 0 {
            report
                .errors
                .push("optimization_interval_secs must be at least 1".to_string());
        }
        if self.max_intersections < 1 {
            report
                .errors
                .push("max_intersections must be at least 1".to_string());
        }
        report.errors.extend(self.weights.errors());
        report.warnings.extend(self.weights.sum_warning());

        report
    }

    /// Logs warnings and turns validation errors into a [`ConfigError::Invalid`].
    pub fn ensure_valid(&self) -> Result<(), ConfigError> {
        let report = self.validate();
        for warning in &report.warnings {
            log::warn!("[Config] {}", warning);
        }
        if report.is_valid() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(report.errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let report = OrchestratorConfig::default().validate();
        assert!(report.is_valid());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn rejects_unknown_key_without_touching_config() {
        let mut config = OrchestratorConfig::default();
        let err = config.apply_update("turbo_mode", "on").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey(ref k) if k == "turbo_mode"));
        assert_eq!(config, OrchestratorConfig::default());
    }

    #[test]
    fn reports_each_field_separately() {
        let mut config = OrchestratorConfig::default();
        let results = config.apply_updates([
            ("min_green_time", "20"),
            ("max_green_time", "lots"),
            ("bogus", "1"),
        ]);
        assert_eq!(results.len(), 3);
        assert!(results[0].1.is_ok());
        assert!(matches!(results[1].1, Err(ConfigError::InvalidValue { .. })));
        assert!(matches!(results[2].1, Err(ConfigError::UnknownKey(_))));
        assert_eq!(config.min_green_time, 20);
        assert_eq!(config.max_green_time, 90);
    }

    #[test]
    fn negative_value_for_unsigned_field_is_invalid() {
        let mut config = OrchestratorConfig::default();
        assert!(config.apply_update("yellow_time", "-3").is_err());
        assert_eq!(config.yellow_time, 3);
    }

    #[test]
    fn inverted_green_bounds_are_errors() {
        let mut config = OrchestratorConfig::default();
        config.min_green_time = 100;
        let report = config.validate();
        assert!(!report.is_valid());
        assert!(report.errors[0].contains("min_green_time"));
    }

    #[test]
    fn weight_drift_is_only_a_warning() {
        let mut config = OrchestratorConfig::default();
        config.weights.emergency_weight = 0.6;
        let report = config.validate();
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("1.30"));
    }

    #[test]
    fn json_uses_defaults_for_missing_keys() {
        let config =
            OrchestratorConfig::from_json_str(r#"{ "min_green_time": 20, "weights": { "wait_time_weight": 0.5, "vehicle_count_weight": 0.2 } }"#)
                .unwrap();
        assert_eq!(config.min_green_time, 20);
        assert_eq!(config.max_green_time, 90);
        assert_eq!(config.weights.wait_time_weight, 0.5);
        assert_eq!(config.weights.emergency_weight, 0.3);
    }

    #[test]
    fn json_rejects_unknown_keys() {
        let err = OrchestratorConfig::from_json_str(r#"{ "web_port": 5000 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn json_rejects_invalid_combination() {
        let err = OrchestratorConfig::from_json_str(
            r#"{ "traffic_density_medium_threshold": 40, "traffic_density_high_threshold": 30 }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
