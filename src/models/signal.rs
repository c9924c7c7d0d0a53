use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};

/// The three aspects a signal head can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LightState {
    Green,
    Yellow,
    Red,
}

impl LightState {
    pub const ALL: [LightState; 3] = [LightState::Red, LightState::Yellow, LightState::Green];

    pub fn as_str(&self) -> &'static str {
        match self {
            LightState::Green => "Green",
            LightState::Yellow => "Yellow",
            LightState::Red => "Red",
        }
    }
}

impl fmt::Display for LightState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LightState {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "green" => Ok(LightState::Green),
            "yellow" => Ok(LightState::Yellow),
            "red" => Ok(LightState::Red),
            _ => Err(OrchestratorError::InvalidSignal(s.to_string())),
        }
    }
}

/// A validated request to show `signal` for `duration` seconds.
///
/// Construction is the validation boundary: once a command exists it is
/// safe to hand to a [`SignalStateMachine`](crate::control_system::SignalStateMachine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalCommand {
    pub signal: LightState,
    pub duration: u32,
    pub reason: String,
}

impl SignalCommand {
    /// Builds a command from caller-supplied values, rejecting negative or oversized durations.
    pub fn new(signal: LightState, duration_secs: i64, reason: impl Into<String>) -> Result<Self> {
        if duration_secs < 0 {
            return Err(OrchestratorError::NegativeDuration(duration_secs));
        }
        let duration = u32::try_from(duration_secs)
            .map_err(|_| OrchestratorError::DurationOutOfRange(duration_secs))?;
        Ok(Self::with_duration(signal, duration, reason))
    }

    /// Builds a command from raw text, as received from an external control surface.
    pub fn parse(signal: &str, duration_secs: i64, reason: impl Into<String>) -> Result<Self> {
        let signal = signal.parse::<LightState>()?;
        Self::new(signal, duration_secs, reason)
    }

    pub fn with_duration(signal: LightState, duration: u32, reason: impl Into<String>) -> Self {
        Self {
            signal,
            duration,
            reason: reason.into(),
        }
    }
}

/// What a signal head shows after a command has been applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalResponse {
    pub signal: LightState,
    pub duration: u32,
    pub reason: String,
    pub transitioning: bool,
}
