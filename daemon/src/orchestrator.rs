//! Serialized core
//!
//! One task owns the trigger state machine, the in-flight show and the
//! overlay visibility. Key events, timer fires, preference changes, IPC
//! commands and finished extractions all arrive as messages and are
//! handled one at a time. Only catalog extraction runs elsewhere.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::catalog::{AppContext, ShortcutCatalog};
use crate::events::OverlayEvent;
use crate::hotkey::HotkeyEvent;
use crate::pipeline::{
    PendingShow, PermissionState, Ports, Preflight, ResultRouter, ShowOverlay, ShowResult,
};
use crate::preferences::Preferences;
use crate::state::{ActivationDecision, TimerToken, TokioTimerScheduler, TriggerStateMachine};

/// Requests from the IPC server
#[derive(Debug)]
pub enum Command {
    /// Show the overlay; the outcome is sent on `reply` if given
    Show {
        reply: Option<oneshot::Sender<ShowResult>>,
    },
    Hide,
}

pub struct Orchestrator {
    core: Core,
    timer_rx: mpsc::UnboundedReceiver<TimerToken>,
    completed_rx: mpsc::UnboundedReceiver<(PendingShow, ShortcutCatalog)>,
    poll_interval: Duration,
}

struct InFlight {
    waiters: Vec<oneshot::Sender<ShowResult>>,
    started_at: Instant,
}

struct Core {
    machine: TriggerStateMachine<TokioTimerScheduler>,
    pipeline: ShowOverlay,
    router: ResultRouter,
    event_tx: broadcast::Sender<OverlayEvent>,
    completed_tx: mpsc::UnboundedSender<(PendingShow, ShortcutCatalog)>,
    in_flight: Option<InFlight>,
    visible_app: Option<AppContext>,
    awaiting_permission: bool,
}

impl Orchestrator {
    pub fn new(
        preferences: Preferences,
        ports: Ports,
        event_tx: broadcast::Sender<OverlayEvent>,
        double_tap_window: Duration,
        poll_interval: Duration,
    ) -> Self {
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let (completed_tx, completed_rx) = mpsc::unbounded_channel();

        let machine = TriggerStateMachine::new(
            preferences,
            TokioTimerScheduler::new(timer_tx),
            double_tap_window,
        );

        Self {
            core: Core {
                machine,
                pipeline: ShowOverlay::new(ports),
                router: ResultRouter::new(),
                event_tx,
                completed_tx,
                in_flight: None,
                visible_app: None,
                awaiting_permission: false,
            },
            timer_rx,
            completed_rx,
            poll_interval,
        }
    }

    /// Process messages until the key event channel closes
    pub async fn run(
        self,
        mut hotkey_rx: mpsc::Receiver<HotkeyEvent>,
        mut command_rx: mpsc::Receiver<Command>,
        mut prefs_rx: watch::Receiver<Preferences>,
    ) {
        let Self {
            mut core,
            mut timer_rx,
            mut completed_rx,
            poll_interval,
        } = self;

        let mut poll = tokio::time::interval(poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut commands_open = true;
        let mut prefs_open = true;

        info!(trigger = %core.machine.preferences().trigger, "orchestrator started");

        loop {
            tokio::select! {
                // Preference changes first, so a mode switch resets the
                // gesture before the next key event is seen
                biased;

                changed = prefs_rx.changed(), if prefs_open => match changed {
                    Ok(()) => {
                        let preferences = prefs_rx.borrow_and_update().clone();
                        core.machine.on_preferences_changed(preferences);
                    }
                    Err(_) => prefs_open = false,
                },

                event = hotkey_rx.recv() => match event {
                    Some(HotkeyEvent::Key(event)) => {
                        let decision = core.machine.on_event(&event);
                        core.apply(decision);
                    }
                    Some(HotkeyEvent::TapDisabled) => {
                        warn!("key events may have been missed while the tap was disabled");
                    }
                    None => {
                        info!("key event channel closed");
                        break;
                    }
                },

                Some(token) = timer_rx.recv() => {
                    let decision = core.machine.on_timer_fired(token);
                    core.apply(decision);
                }

                Some((pending, catalog)) = completed_rx.recv() => {
                    core.finish_show(pending, catalog);
                }

                command = command_rx.recv(), if commands_open => match command {
                    Some(Command::Show { reply }) => core.start_show(reply),
                    Some(Command::Hide) => core.hide(),
                    None => commands_open = false,
                },

                _ = poll.tick() => core.poll(),
            }
        }

        info!("orchestrator stopped");
    }
}

impl Core {
    fn apply(&mut self, decision: ActivationDecision) {
        match decision {
            ActivationDecision::Activate => {
                info!("overlay activation requested");
                self.start_show(None);
            }
            ActivationDecision::Hide => self.hide(),
            ActivationDecision::Ignore => {}
        }
    }

    fn start_show(&mut self, reply: Option<oneshot::Sender<ShowResult>>) {
        if let Some(in_flight) = self.in_flight.as_mut() {
            debug!("show already in flight");
            in_flight.waiters.extend(reply);
            return;
        }

        let started_at = Instant::now();
        match self.pipeline.preflight() {
            Preflight::Done(result) => {
                self.finish(result, started_at, reply.into_iter().collect());
            }
            Preflight::Ready(pending) => {
                self.in_flight = Some(InFlight {
                    waiters: reply.into_iter().collect(),
                    started_at,
                });

                let shortcuts = Arc::clone(&self.pipeline.ports().shortcuts);
                let completed_tx = self.completed_tx.clone();
                tokio::spawn(async move {
                    let catalog = ShowOverlay::load_catalog(shortcuts, pending.app.clone()).await;
                    let _ = completed_tx.send((pending, catalog));
                });
            }
        }
    }

    fn finish_show(&mut self, pending: PendingShow, catalog: ShortcutCatalog) {
        let app = pending.app.clone();
        let result = self.pipeline.present(pending, catalog);
        self.visible_app = Some(app);

        let (waiters, started_at) = match self.in_flight.take() {
            Some(in_flight) => (in_flight.waiters, in_flight.started_at),
            None => (Vec::new(), Instant::now()),
        };
        self.finish(result, started_at, waiters);
    }

    fn finish(
        &mut self,
        result: ShowResult,
        started_at: Instant,
        waiters: Vec<oneshot::Sender<ShowResult>>,
    ) {
        let _ = self.event_tx.send(OverlayEvent::ShowFinished {
            result,
            duration_ms: started_at.elapsed().as_millis() as u64,
        });

        // Any attempt past the permission gate settles a pending retry
        if result != ShowResult::NeedsPermission && self.awaiting_permission {
            debug!(%result, "permission follow-up no longer needed");
            self.awaiting_permission = false;
        }

        let route = self.router.route(result);
        if let Some(hint) = route.hint {
            let _ = self.event_tx.send(OverlayEvent::Hint(hint));
        }
        if route.request_permission && !self.awaiting_permission {
            info!("prompting for accessibility permission");
            self.pipeline.ports().permissions.request_access();
            self.awaiting_permission = true;
        }

        for waiter in waiters {
            let _ = waiter.send(result);
        }
    }

    fn hide(&mut self) {
        debug!(visible = self.visible_app.is_some(), "hiding overlay");
        self.pipeline.ports().presenter.hide();
        self.visible_app = None;
    }

    fn poll(&mut self) {
        if self.awaiting_permission
            && self.pipeline.ports().permissions.state() == PermissionState::Granted
        {
            info!("accessibility permission granted, retrying show");
            self.awaiting_permission = false;
            self.start_show(None);
            return;
        }

        if !self.machine.preferences().auto_hide_on_app_switch {
            return;
        }
        let Some(visible) = self.visible_app.as_ref().map(|app| app.bundle_id.clone()) else {
            return;
        };

        let current = self.pipeline.ports().apps.current_app();
        if let Some(current) = current {
            if current.bundle_id != visible {
                info!(
                    from = %visible,
                    to = %current.bundle_id,
                    "focused app changed, hiding overlay"
                );
                self.hide();
            }
        }
    }
}
