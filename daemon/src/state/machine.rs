//! Trigger state machine
//!
//! Turns the raw key event stream into activate/hide decisions for the
//! hold, double-tap and custom-hotkey gestures. Performs no I/O; timers
//! go through a `TimerScheduler` and come back via `on_timer_fired`.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::policy::{self, ActivationDecision};
use super::timer::{TimerHandle, TimerPurpose, TimerScheduler, TimerToken};
use crate::hotkey::KeyEvent;
use crate::preferences::{Preferences, Trigger};

/// Gesture progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// No gesture in progress
    Idle,
    /// Designated modifier held alone, hold timer armed
    HoldPending,
    /// Hold elapsed and the overlay was requested; modifier still down
    HoldTriggered,
    /// First press of a double tap is down
    FirstTapDown,
    /// First tap released, window timer armed for the second press
    AwaitingSecondTap,
}

impl Default for State {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Idle => write!(f, "Idle"),
            State::HoldPending => write!(f, "HoldPending"),
            State::HoldTriggered => write!(f, "HoldTriggered"),
            State::FirstTapDown => write!(f, "FirstTapDown"),
            State::AwaitingSecondTap => write!(f, "AwaitingSecondTap"),
        }
    }
}

/// Sole owner of gesture state; every mutation goes through `on_event`,
/// `on_timer_fired` or `on_preferences_changed`
pub struct TriggerStateMachine<S: TimerScheduler> {
    state: State,
    preferences: Preferences,
    timer: Option<TimerHandle>,
    generation: u64,
    scheduler: S,
    double_tap_window: Duration,
    state_entered_at: Option<Instant>,
}

impl<S: TimerScheduler> TriggerStateMachine<S> {
    pub fn new(preferences: Preferences, scheduler: S, double_tap_window: Duration) -> Self {
        Self {
            state: State::Idle,
            preferences,
            timer: None,
            generation: 0,
            scheduler,
            double_tap_window,
            state_entered_at: None,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    /// Token of the currently armed timer, if any
    pub fn armed_timer(&self) -> Option<TimerToken> {
        self.timer.as_ref().map(TimerHandle::token)
    }

    /// Handle one key event
    pub fn on_event(&mut self, event: &KeyEvent) -> ActivationDecision {
        match self.preferences.trigger {
            // The policy checks bindings before escape, so an escape-based
            // binding still activates
            Trigger::CustomHotkey => {
                if event.is_modifier_change {
                    ActivationDecision::Ignore
                } else {
                    policy::evaluate(event, &self.preferences)
                }
            }
            // Escape never touches gesture state
            _ if policy::is_escape_to_hide(event, &self.preferences) => ActivationDecision::Hide,
            Trigger::HoldModifier => self.on_hold_event(event),
            Trigger::DoubleTapModifier => self.on_double_tap_event(event),
        }
    }

    /// Handle a timer elapsing; stale tokens are discarded
    pub fn on_timer_fired(&mut self, token: TimerToken) -> ActivationDecision {
        if self.armed_timer() != Some(token) {
            debug!(?token, "discarding stale timer fire");
            return ActivationDecision::Ignore;
        }
        self.timer = None;

        match (token.purpose, self.state) {
            (TimerPurpose::Hold, State::HoldPending) => {
                self.transition_to(State::HoldTriggered);
                ActivationDecision::Activate
            }
            (TimerPurpose::DoubleTapWindow, State::AwaitingSecondTap) => {
                debug!("double-tap window elapsed");
                self.transition_to(State::Idle);
                ActivationDecision::Ignore
            }
            _ => ActivationDecision::Ignore,
        }
    }

    /// Replace the cached preferences; a trigger change resets the gesture
    /// before any further event is processed
    pub fn on_preferences_changed(&mut self, preferences: Preferences) {
        let mode_changed = preferences.trigger != self.preferences.trigger
            || preferences.trigger_modifier != self.preferences.trigger_modifier;

        if mode_changed {
            info!(
                from = %self.preferences.trigger,
                to = %preferences.trigger,
                modifier = %preferences.trigger_modifier,
                "trigger mode changed, resetting gesture"
            );
            self.reset();
        }

        self.preferences = preferences;
    }

    fn on_hold_event(&mut self, event: &KeyEvent) -> ActivationDecision {
        let modifier = self.preferences.trigger_modifier;

        // Designated modifier released
        if !event.modifiers.contains(modifier) {
            self.reset();
            return ActivationDecision::Ignore;
        }

        if event.is_modifier_change {
            if event.modifiers.is_only(modifier) {
                if self.state == State::Idle {
                    self.arm(TimerPurpose::Hold, self.preferences.hold_duration());
                    self.transition_to(State::HoldPending);
                }
            } else if self.state == State::HoldPending {
                debug!(modifiers = ?event.modifiers, "other modifiers joined, hold aborted");
                self.reset();
            }
            return ActivationDecision::Ignore;
        }

        // A key pressed during the hold is a regular shortcut; once triggered
        // the overlay stays up while the user keeps typing
        if event.is_key_down && self.state == State::HoldPending {
            debug!(key_code = event.key_code, "key pressed before hold elapsed");
            self.reset();
        }

        ActivationDecision::Ignore
    }

    fn on_double_tap_event(&mut self, event: &KeyEvent) -> ActivationDecision {
        let modifier = self.preferences.trigger_modifier;

        if !event.is_modifier_change {
            if event.is_key_down && self.state != State::Idle {
                debug!(key_code = event.key_code, "key pressed between taps");
                self.reset();
            }
            return ActivationDecision::Ignore;
        }

        if event.modifiers.is_only(modifier) {
            match self.state {
                State::Idle => self.transition_to(State::FirstTapDown),
                State::AwaitingSecondTap => {
                    self.cancel_timer();
                    self.transition_to(State::Idle);
                    return ActivationDecision::Activate;
                }
                _ => {}
            }
        } else if event.modifiers.is_empty() {
            if self.state == State::FirstTapDown {
                self.arm(TimerPurpose::DoubleTapWindow, self.double_tap_window);
                self.transition_to(State::AwaitingSecondTap);
            }
        } else if self.state != State::Idle {
            debug!(modifiers = ?event.modifiers, "other modifiers joined, taps reset");
            self.reset();
        }

        ActivationDecision::Ignore
    }

    fn arm(&mut self, purpose: TimerPurpose, after: Duration) {
        self.cancel_timer();
        self.generation += 1;
        let token = TimerToken {
            generation: self.generation,
            purpose,
        };
        debug!(?token, after_ms = after.as_millis() as u64, "timer armed");
        self.timer = Some(self.scheduler.schedule(token, after));
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            debug!(token = ?timer.token(), "timer cancelled");
            timer.cancel();
        }
    }

    fn reset(&mut self) {
        self.cancel_timer();
        if self.state != State::Idle {
            self.transition_to(State::Idle);
        }
    }

    fn transition_to(&mut self, new_state: State) {
        let old_state = self.state;
        let duration_ms = self
            .state_entered_at
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);

        debug!(
            from = %old_state,
            to = %new_state,
            duration_ms = duration_ms,
            "gesture transition"
        );

        self.state = new_state;
        self.state_entered_at = if new_state != State::Idle {
            Some(Instant::now())
        } else {
            None
        };
    }
}
