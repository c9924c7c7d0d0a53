// Fixed timings and limits that are not part of the runtime configuration.

// Initial and reset phase
pub const INITIAL_SIGNAL_DURATION: u32 = 30;
pub const INITIAL_SIGNAL_REASON: &str = "Initialization";
pub const RESET_SIGNAL_DURATION: u32 = 30;
pub const RESET_SIGNAL_REASON: &str = "System Reset";

// Decision overrides
pub const EMERGENCY_GREEN_DURATION: u32 = 90;
pub const INCIDENT_RED_DURATION: u32 = 120;
pub const OTHER_OVERRIDE_RED_DURATION: u32 = 60;
pub const EMERGENCY_DECISION_REASON: &str = "Emergency vehicle priority";
pub const INCIDENT_DECISION_REASON: &str = "Traffic incident";

// Administrative override labels
pub const OVERRIDE_EMERGENCY_VEHICLE: &str = "Emergency Vehicle";
pub const OVERRIDE_INCIDENT: &str = "Incident";

// Red duration never exceeds this, however many vehicles are queued.
pub const MAX_RED_DURATION: u32 = 45;

// Priority scoring
pub const EMERGENCY_BASE_SCORE: f64 = 100.0;
pub const SCORE_TERM_CAP: f64 = 10.0;
pub const VEHICLE_SCORE_DIVISOR: f64 = 10.0;
pub const WAIT_SCORE_DIVISOR: f64 = 30.0;
pub const HIGH_DENSITY_BONUS: f64 = 5.0;
pub const MEDIUM_DENSITY_BONUS: f64 = 2.0;

// Fairness damping
pub const SATURATED_DAMPING: f64 = 0.3;
pub const NEAR_SATURATED_DAMPING: f64 = 0.7;

// History retention per intersection
pub const VEHICLE_HISTORY_CAPACITY: usize = 60;
pub const SIGNAL_HISTORY_CAPACITY: usize = 100;
pub const WAIT_HISTORY_CAPACITY: usize = 100;

// Tolerance before the weight triple is reported as drifting from 1.0
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;
