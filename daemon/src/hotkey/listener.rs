//! Global key event source using macOS CGEventTap
//!
//! Monitors system-wide key-down, key-up and modifier-change events and
//! forwards them, normalized, to a single subscriber.
//! Runs on a dedicated thread with its own CFRunLoop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
#[cfg(target_os = "macos")]
use std::thread;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
#[cfg(target_os = "macos")]
use tracing::{debug, error, info, warn};

use super::keys::KeyEvent;

/// Events sent from the listener to the orchestrator
#[derive(Debug, Clone)]
pub enum HotkeyEvent {
    /// A key or modifier event was observed
    Key(KeyEvent),
    /// Event tap was disabled by macOS and has been re-enabled; events may
    /// have been missed in between
    TapDisabled,
}

const TAP_RETRY_INITIAL: Duration = Duration::from_secs(1);
const TAP_RETRY_MAX: Duration = Duration::from_secs(30);

/// Global listener that taps the session's keyboard stream
pub struct HotkeyListener {
    event_tx: mpsc::Sender<HotkeyEvent>,
    running: Arc<AtomicBool>,
    /// Whether the event tap is installed and delivering
    tap_active: Arc<watch::Sender<bool>>,
}

impl HotkeyListener {
    /// Create a new hotkey listener
    pub fn new(event_tx: mpsc::Sender<HotkeyEvent>) -> Self {
        let (tap_active, _) = watch::channel(false);
        Self {
            event_tx,
            running: Arc::new(AtomicBool::new(false)),
            tap_active: Arc::new(tap_active),
        }
    }

    /// Start the listener
    ///
    /// This spawns a dedicated thread that runs a CFRunLoop to receive
    /// CGEventTap callbacks. Tap creation fails until the process is
    /// trusted for Accessibility, so the thread keeps retrying with backoff.
    /// The listener runs until `stop()` is called or the program exits.
    #[cfg(target_os = "macos")]
    pub fn start(&self) -> Result<(), HotkeyError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(HotkeyError::AlreadyRunning);
        }

        let event_tx = self.event_tx.clone();
        let running = Arc::clone(&self.running);
        let tap_active = Arc::clone(&self.tap_active);

        thread::Builder::new()
            .name("hotkey-listener".to_string())
            .spawn(move || {
                info!("hotkey listener thread started");

                let mut attempt = 0u32;
                while running.load(Ordering::SeqCst) {
                    match run_event_loop(&event_tx, &running, &tap_active) {
                        Ok(()) => break,
                        Err(HotkeyError::EventTapCreation) => {
                            let delay = retry_delay(attempt);
                            if attempt == 0 {
                                warn!("event tap unavailable, retrying until Accessibility permission is granted");
                            }
                            debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying event tap creation");
                            attempt = attempt.saturating_add(1);
                            sleep_while_running(&running, delay);
                        }
                        Err(e) => {
                            error!(?e, "hotkey listener error");
                            break;
                        }
                    }
                }

                tap_active.send_replace(false);
                running.store(false, Ordering::SeqCst);
                info!("hotkey listener thread stopped");
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                HotkeyError::ThreadSpawn(e.to_string())
            })?;

        Ok(())
    }

    #[cfg(not(target_os = "macos"))]
    pub fn start(&self) -> Result<(), HotkeyError> {
        let _ = &self.event_tx;
        Err(HotkeyError::Unsupported)
    }

    /// Stop the listener; the run loop exits on its next poll
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if the listener is currently running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Observe whether the event tap is installed
    pub fn subscribe_tap_active(&self) -> watch::Receiver<bool> {
        self.tap_active.subscribe()
    }
}

/// Backoff between event tap creation attempts
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn retry_delay(attempt: u32) -> Duration {
    TAP_RETRY_INITIAL
        .saturating_mul(1u32 << attempt.min(5))
        .min(TAP_RETRY_MAX)
}

#[cfg(target_os = "macos")]
fn sleep_while_running(running: &AtomicBool, total: Duration) {
    let step = Duration::from_millis(100);
    let mut slept = Duration::ZERO;
    while slept < total && running.load(Ordering::SeqCst) {
        thread::sleep(step);
        slept += step;
    }
}

/// Errors that can occur in the hotkey listener
#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    #[error("hotkey listener is already running")]
    AlreadyRunning,

    #[error("failed to create event tap - check Accessibility permissions")]
    EventTapCreation,

    #[error("failed to create run loop source for event tap")]
    RunLoopSource,

    #[error("failed to spawn listener thread: {0}")]
    ThreadSpawn(String),

    #[error("global key events are only available on macOS")]
    Unsupported,
}

#[cfg(target_os = "macos")]
enum TapMessage {
    Key(KeyEvent),
    Disabled,
}

#[cfg(target_os = "macos")]
fn to_key_event(event_type: core_graphics::event::CGEventType, event: &core_graphics::event::CGEvent) -> Option<KeyEvent> {
    use core_graphics::event::{CGEventType, EventField};

    use super::keys::ModifierState;

    let key_code = event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) as u16;
    let modifiers = ModifierState::from_flags(event.get_flags());

    match event_type {
        CGEventType::KeyDown => Some(KeyEvent::key_down(key_code, modifiers)),
        CGEventType::KeyUp => Some(KeyEvent::key_up(key_code, modifiers)),
        CGEventType::FlagsChanged => Some(KeyEvent::modifiers_changed(key_code, modifiers)),
        _ => None,
    }
}

/// Run the CFRunLoop with the event tap
#[cfg(target_os = "macos")]
fn run_event_loop(
    event_tx: &mpsc::Sender<HotkeyEvent>,
    running: &AtomicBool,
    tap_active: &watch::Sender<bool>,
) -> Result<(), HotkeyError> {
    use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
    use core_graphics::event::{
        CGEvent, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement,
        CGEventType,
    };

    let (callback_tx, callback_rx) = std::sync::mpsc::channel::<TapMessage>();

    // CGEventTap callback - must be fast and non-blocking
    let callback = move |_proxy: core_graphics::event::CGEventTapProxy,
                         event_type: CGEventType,
                         event: &CGEvent|
                         -> Option<CGEvent> {
        match event_type {
            CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput => {
                let _ = callback_tx.send(TapMessage::Disabled);
            }
            _ => {
                if let Some(key_event) = to_key_event(event_type, event) {
                    let _ = callback_tx.send(TapMessage::Key(key_event));
                }
            }
        }
        Some(event.clone())
    };

    let tap = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::KeyDown, CGEventType::KeyUp, CGEventType::FlagsChanged],
        callback,
    )
    .map_err(|_| {
        error!("failed to create event tap - is Accessibility permission granted?");
        HotkeyError::EventTapCreation
    })?;

    tap.enable();

    let run_loop_source = tap
        .mach_port
        .create_runloop_source(0)
        .map_err(|_| HotkeyError::RunLoopSource)?;
    let run_loop = CFRunLoop::get_current();

    unsafe {
        run_loop.add_source(&run_loop_source, kCFRunLoopCommonModes);
    }

    info!("event tap created and enabled");
    tap_active.send_replace(true);

    while running.load(Ordering::SeqCst) {
        // Run the loop for a short interval, then drain the callback queue
        unsafe {
            CFRunLoop::run_in_mode(
                kCFRunLoopDefaultMode,
                std::time::Duration::from_millis(100),
                true,
            );
        }

        while let Ok(message) = callback_rx.try_recv() {
            let outgoing = match message {
                TapMessage::Key(key_event) => {
                    debug!(?key_event, "key event");
                    HotkeyEvent::Key(key_event)
                }
                TapMessage::Disabled => {
                    warn!("event tap disabled by the system, re-enabling");
                    tap.enable();
                    HotkeyEvent::TapDisabled
                }
            };

            // We're not in an async context, so block until the channel has room
            if event_tx.blocking_send(outgoing).is_err() {
                warn!("failed to send key event - channel closed?");
                running.store(false, Ordering::SeqCst);
                break;
            }
        }
    }

    tap_active.send_replace(false);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_creation() {
        let (tx, _rx) = mpsc::channel(32);
        let listener = HotkeyListener::new(tx);
        assert!(!listener.is_running());
    }

    #[test]
    fn test_stop_clears_running_flag() {
        let (tx, _rx) = mpsc::channel(32);
        let listener = HotkeyListener::new(tx);
        listener.running.store(true, Ordering::SeqCst);
        listener.stop();
        assert!(!listener.is_running());
    }

    #[test]
    fn test_tap_retry_backs_off_to_a_cap() {
        assert_eq!(retry_delay(0), Duration::from_secs(1));
        assert_eq!(retry_delay(1), Duration::from_secs(2));
        assert_eq!(retry_delay(3), Duration::from_secs(8));
        assert_eq!(retry_delay(5), Duration::from_secs(30));
        assert_eq!(retry_delay(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_tap_starts_inactive() {
        let (tx, _rx) = mpsc::channel(32);
        let listener = HotkeyListener::new(tx);
        assert!(!*listener.subscribe_tap_active().borrow());
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn test_start_is_unsupported_off_macos() {
        let (tx, _rx) = mpsc::channel(32);
        let listener = HotkeyListener::new(tx);
        assert!(matches!(listener.start(), Err(HotkeyError::Unsupported)));
    }
}
