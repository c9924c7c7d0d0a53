use serde::{Deserialize, Serialize};

use crate::global_variables::{INITIAL_SIGNAL_DURATION, INITIAL_SIGNAL_REASON};
use crate::models::{LightState, SignalCommand, SignalResponse};

/// Bookkeeping for a change that is waiting out its caution phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: LightState,
    pub to: LightState,
    pub target_duration: u32,
    pub target_reason: String,
    pub start_time: f64,
}

/// The committed phase a signal head is showing.
#[derive(Debug, Clone, PartialEq)]
struct SignalPhase {
    signal: LightState,
    duration: u32,
    reason: String,
    last_change: f64,
}

/// Point-in-time view of a state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalStatus {
    pub signal: LightState,
    pub duration: u32,
    pub remaining: f64,
    pub reason: String,
    pub last_change: f64,
    pub in_transition: bool,
}

/// Safety gate for one intersection's signal head.
///
/// Every change between Red and Green passes through Yellow for exactly
/// `yellow_time` seconds. Requests that arrive during the caution phase do
/// not restart or redirect it. Only [`force_signal`](Self::force_signal)
/// skips the caution phase.
#[derive(Debug, Clone)]
pub struct SignalStateMachine {
    yellow_time: u32,
    phase: SignalPhase,
    transition: Option<TransitionRecord>,
}

impl SignalStateMachine {
    /// Starts on Red for 30 seconds, reason "Initialization".
    pub fn new(yellow_time: u32, now: f64) -> Self {
        Self {
            yellow_time,
            phase: SignalPhase {
                signal: LightState::Red,
                duration: INITIAL_SIGNAL_DURATION,
                reason: INITIAL_SIGNAL_REASON.to_string(),
                last_change: now,
            },
            transition: None,
        }
    }

    pub fn yellow_time(&self) -> u32 {
        self.yellow_time
    }

    pub fn signal(&self) -> LightState {
        self.phase.signal
    }

    pub fn transition(&self) -> Option<&TransitionRecord> {
        self.transition.as_ref()
    }

    pub fn is_transitioning(&self) -> bool {
        self.transition.is_some()
    }

    /// Asks for `command.signal`. The answer is what the head actually shows.
    pub fn request_signal(&mut self, command: SignalCommand, now: f64) -> SignalResponse {
        if let Some(transition) = &self.transition {
            let elapsed = now - transition.start_time;
            let yellow = self.yellow_time as f64;
            if elapsed >= yellow {
                return self.complete_transition(now);
            }
            return SignalResponse {
                signal: LightState::Yellow,
                duration: (yellow - elapsed).ceil() as u32,
                reason: format!("Transition to {}", transition.to),
                transitioning: true,
            };
        }

        if command.signal == self.phase.signal {
            self.phase.duration = command.duration;
            self.phase.reason = command.reason;
            self.phase.last_change = now;
            return self.current();
        }

        self.start_transition(command, now)
    }

    /// Sets the signal immediately, discarding any in-flight transition.
    /// Reserved for emergency/incident preemption and resets.
    pub fn force_signal(&mut self, command: SignalCommand, now: f64) -> SignalResponse {
        if let Some(dropped) = self.transition.take() {
            log::debug!(
                "[SignalMachine] Forced change supersedes transition {} -> {}",
                dropped.from,
                dropped.to
            );
        }
        self.commit(command, now);
        self.current()
    }

    /// Discards a transition nobody has polled for twice the caution time.
    /// The signal on display is left as it is.
    pub fn reap_expired_transition(&mut self, now: f64) -> Option<TransitionRecord> {
        let expired = self
            .transition
            .as_ref()
            .is_some_and(|t| now - t.start_time >= 2.0 * self.yellow_time as f64);
        if expired {
            self.transition.take()
        } else {
            None
        }
    }

    /// The committed phase as last reported.
    pub fn current(&self) -> SignalResponse {
        SignalResponse {
            signal: self.phase.signal,
            duration: self.phase.duration,
            reason: self.phase.reason.clone(),
            transitioning: self.transition.is_some(),
        }
    }

    pub fn status(&self, now: f64) -> SignalStatus {
        let elapsed = now - self.phase.last_change;
        SignalStatus {
            signal: self.phase.signal,
            duration: self.phase.duration,
            remaining: (self.phase.duration as f64 - elapsed).max(0.0),
            reason: self.phase.reason.clone(),
            last_change: self.phase.last_change,
            in_transition: self.transition.is_some(),
        }
    }

    /// True once the assigned duration of the current phase has run out.
    pub fn should_change(&self, now: f64) -> bool {
        now - self.phase.last_change >= self.phase.duration as f64
    }

    fn start_transition(&mut self, command: SignalCommand, now: f64) -> SignalResponse {
        let reason = format!("Transition to {}", command.signal);
        self.transition = Some(TransitionRecord {
            from: self.phase.signal,
            to: command.signal,
            target_duration: command.duration,
            target_reason: command.reason,
            start_time: now,
        });
        self.phase = SignalPhase {
            signal: LightState::Yellow,
            duration: self.yellow_time,
            reason: reason.clone(),
            last_change: now,
        };
        SignalResponse {
            signal: LightState::Yellow,
            duration: self.yellow_time,
            reason,
            transitioning: true,
        }
    }

    fn complete_transition(&mut self, now: f64) -> SignalResponse {
        if let Some(transition) = self.transition.take() {
            self.commit(
                SignalCommand::with_duration(
                    transition.to,
                    transition.target_duration,
                    transition.target_reason,
                ),
                now,
            );
        }
        self.current()
    }

    fn commit(&mut self, command: SignalCommand, now: f64) {
        self.phase = SignalPhase {
            signal: command.signal,
            duration: command.duration,
            reason: command.reason,
            last_change: now,
        };
    }
}
