//! Connectivity and periodic refresh controller
//!
//! A background task that reacts to connectivity transitions and drives the
//! periodic refresh. On start it runs one replay and refresh when online.
//! Events arrive on an mpsc channel; the health probe in
//! this module is one producer, platform network callbacks can be another.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::engine::SyncEngine;
use crate::gateway::RemoteGateway;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    Online,
    Offline,
}

impl ConnectivityEvent {
    pub fn from_reachable(reachable: bool) -> Self {
        if reachable {
            ConnectivityEvent::Online
        } else {
            ConnectivityEvent::Offline
        }
    }
}

/// Apply one connectivity event to the engine
pub async fn apply_event(engine: &SyncEngine, event: ConnectivityEvent) {
    match event {
        ConnectivityEvent::Online => {
            if let Some(report) = engine.go_online().await {
                info!(
                    replayed = report.cleared(),
                    retained = report.retained,
                    dead_lettered = report.dead_lettered,
                    "Back online"
                );
            }
        }
        ConnectivityEvent::Offline => {
            engine.go_offline();
        }
    }
}

/// Handle to a running controller task
pub struct ControllerHandle {
    events: mpsc::Sender<ConnectivityEvent>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ControllerHandle {
    /// Sender for connectivity events
    pub fn events(&self) -> mpsc::Sender<ConnectivityEvent> {
        self.events.clone()
    }

    /// Queue a connectivity event. Returns `false` once the task has stopped.
    pub async fn notify(&self, event: ConnectivityEvent) -> bool {
        self.events.send(event).await.is_ok()
    }

    /// Stop the task and wait for it to finish its current step
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = self.task.await;
    }
}

pub struct ConnectivityController {
    engine: Arc<SyncEngine>,
    poll_interval: Duration,
}

impl ConnectivityController {
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        let poll_interval = engine.config().poll_interval();
        Self {
            engine,
            poll_interval,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Spawn the controller loop on the current runtime
    pub fn spawn(self) -> ControllerHandle {
        let (events_tx, events_rx) = mpsc::channel(32);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(self.run(events_rx, shutdown_rx));

        ControllerHandle {
            events: events_tx,
            shutdown: Some(shutdown_tx),
            task,
        }
    }

    async fn run(
        self,
        mut events: mpsc::Receiver<ConnectivityEvent>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        self.engine.wait_hydrated().await;
        info!(poll_secs = self.poll_interval.as_secs(), "Connectivity controller started");

        // Drain whatever an earlier session left queued and load server
        // data, without waiting for a transition that may never come.
        if self.engine.is_online() {
            let report = self.engine.sync_now().await;
            info!(
                replayed = report.cleared(),
                retained = report.retained,
                refreshed = report.reconciled.is_some(),
                "Initial sync finished"
            );
        }

        let mut timer = tokio::time::interval(self.poll_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        timer.tick().await;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    break;
                }
                Some(event) = events.recv() => {
                    debug!(?event, "Connectivity event");
                    apply_event(&self.engine, event).await;
                }
                _ = timer.tick() => {
                    if let Some(outcome) = self.engine.poll().await {
                        debug!(?outcome, "Periodic refresh");
                    }
                }
            }
        }

        info!("Connectivity controller stopped");
    }
}

/// Turns health probe results into transition events
#[derive(Debug, Clone)]
pub struct ProbeState {
    last: Option<bool>,
}

impl ProbeState {
    /// `assumed` is the connectivity the engine already believes in;
    /// a matching first probe emits nothing.
    pub fn new(assumed: Option<bool>) -> Self {
        Self { last: assumed }
    }

    pub fn observe(&mut self, reachable: bool) -> Option<ConnectivityEvent> {
        if self.last == Some(reachable) {
            return None;
        }
        self.last = Some(reachable);
        Some(ConnectivityEvent::from_reachable(reachable))
    }
}

/// Poll the API health endpoint and forward transitions to `events`.
/// Ends when the receiving side is dropped.
pub fn spawn_health_probe(
    gateway: Arc<dyn RemoteGateway>,
    events: mpsc::Sender<ConnectivityEvent>,
    interval: Duration,
    assumed_online: bool,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut state = ProbeState::new(Some(assumed_online));
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            timer.tick().await;
            let reachable = gateway.health().await.is_ok();
            if let Some(event) = state.observe(reachable) {
                info!(?event, "Health probe detected a transition");
                if events.send(event).await.is_err() {
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_emits_only_transitions() {
        let mut state = ProbeState::new(Some(true));
        assert_eq!(state.observe(true), None);
        assert_eq!(state.observe(false), Some(ConnectivityEvent::Offline));
        assert_eq!(state.observe(false), None);
        assert_eq!(state.observe(true), Some(ConnectivityEvent::Online));
    }

    #[test]
    fn test_probe_without_assumption_reports_first_result() {
        let mut state = ProbeState::new(None);
        assert_eq!(state.observe(false), Some(ConnectivityEvent::Offline));
    }
}
