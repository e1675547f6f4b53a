//! The per-device polling task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::domain::ports::{DeviceRepository, DeviceStatusSource, MachineSnapshot};
use crate::domain::{Device, Error, MachineState, StatusEvent, StatusEvents, TraceId};

use super::completion::{CompletionHandler, CompletionReport};
use super::tracker::{DeviceRuntimeView, DeviceTracker, TrackerEvent};

/// Operator command delivered to a device task.
pub(super) enum MonitorCommand {
    Retry(oneshot::Sender<Result<(), Error>>),
    Abandon(oneshot::Sender<Result<(), Error>>),
}

/// Collaborators shared by every device task.
pub(super) struct TaskContext {
    pub(super) source: Arc<dyn DeviceStatusSource>,
    pub(super) devices: Arc<dyn DeviceRepository>,
    pub(super) completion: Arc<CompletionHandler>,
    pub(super) events: StatusEvents,
    pub(super) poll_interval: Duration,
    pub(super) status_timeout: Duration,
}

pub(super) struct DeviceTask {
    device: Device,
    tracker: DeviceTracker,
    reachable: bool,
    context: Arc<TaskContext>,
    view: watch::Sender<DeviceRuntimeView>,
    in_flight: Option<JoinHandle<CompletionReport>>,
}

/// Initial view for a device before its first poll.
pub(super) fn initial_view(device: &Device) -> DeviceRuntimeView {
    DeviceRuntimeView {
        device_id: device.id().clone(),
        phase: super::MonitorPhase::IdleOrOffline,
        state: device.last_state(),
        job_label: None,
        retained_after_failure: false,
    }
}

async fn wait_in_flight(
    slot: &mut Option<JoinHandle<CompletionReport>>,
) -> Option<Result<CompletionReport, JoinError>> {
    match slot.as_mut() {
        Some(handle) => Some(handle.await),
        None => None,
    }
}

impl DeviceTask {
    pub(super) fn new(
        device: Device,
        context: Arc<TaskContext>,
        view: watch::Sender<DeviceRuntimeView>,
    ) -> Self {
        Self {
            device,
            tracker: DeviceTracker::new(),
            reachable: true,
            context,
            view,
            in_flight: None,
        }
    }

    /// Poll until `shutdown` flips, then wait for any in-flight completion.
    pub(super) async fn run(
        mut self,
        mut shutdown: watch::Receiver<bool>,
        mut commands: mpsc::Receiver<MonitorCommand>,
    ) {
        let mut ticker = tokio::time::interval(self.context.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(device_id = %self.device.id(), "device monitor started");

        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                Some(result) = wait_in_flight(&mut self.in_flight), if self.in_flight.is_some() => {
                    self.in_flight = None;
                    self.finish_completion(result);
                }
                Some(command) = commands.recv() => self.handle_command(command),
                _ = ticker.tick() => self.poll().await,
            }
        }

        if let Some(handle) = self.in_flight.take() {
            info!(device_id = %self.device.id(), "waiting for in-flight completion");
            let result = handle.await;
            self.finish_completion(result);
        }
        info!(device_id = %self.device.id(), "device monitor stopped");
    }

    async fn poll(&mut self) {
        let device_id = self.device.id().clone();
        let polled = tokio::time::timeout(
            self.context.status_timeout,
            self.context.source.machine_state(&self.device),
        )
        .await;
        let snapshot = match polled {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(err)) => return self.mark_unreachable(&err.to_string()).await,
            Err(_) => return self.mark_unreachable("status request timed out").await,
        };
        debug!(%device_id, state = %snapshot.state, file = snapshot.active_file.as_deref(), "polled");

        let previous = self.tracker.last_state();
        let was_reachable = std::mem::replace(&mut self.reachable, true);
        self.apply_observation(&snapshot);
        if previous != Some(snapshot.state) || !was_reachable {
            self.record_state(snapshot.state).await;
        }
        self.publish_view();
    }

    fn apply_observation(&mut self, snapshot: &MachineSnapshot) {
        let starting = snapshot.state == MachineState::Printing
            && self.tracker.last_state() != Some(MachineState::Printing);
        if starting && self.tracker.retained_after_failure() {
            warn!(
                device_id = %self.device.id(),
                retained = self.tracker.job_label(),
                file = snapshot.active_file.as_deref(),
                "new print started while a failed completion is retained"
            );
        }
        let device_id = self.device.id().clone();
        match self.tracker.observe(snapshot) {
            TrackerEvent::Unchanged => {}
            TrackerEvent::LabelCaptured(label) => {
                info!(%device_id, job_label = %label, "print started");
            }
            TrackerEvent::Abandoned { job_label } => {
                info!(
                    %device_id,
                    job_label = job_label.as_deref(),
                    state = %snapshot.state,
                    "print ended without completing; no usage applied"
                );
            }
            TrackerEvent::Completed { job_label } => {
                info!(%device_id, job_label = job_label.as_deref(), "print completed");
                self.spawn_completion(job_label);
            }
        }
    }

    fn spawn_completion(&mut self, job_label: Option<String>) {
        let handler = Arc::clone(&self.context.completion);
        let device = self.device.clone();
        let applied = self.tracker.applied().clone();
        let trace_id = TraceId::generate();
        debug!(device_id = %device.id(), %trace_id, "spawning completion");
        self.in_flight = Some(tokio::spawn(TraceId::scope(trace_id, async move {
            handler.handle(&device, job_label, applied).await
        })));
    }

    fn finish_completion(&mut self, result: Result<CompletionReport, JoinError>) {
        let report = match result {
            Ok(report) => report,
            Err(err) => {
                error!(device_id = %self.device.id(), %err, "completion task aborted");
                CompletionReport::default()
            }
        };
        self.tracker
            .finish_completion(report.succeeded, report.applied);
        self.publish_view();
    }

    fn handle_command(&mut self, command: MonitorCommand) {
        let device_id = self.device.id().clone();
        let (reply, outcome) = match command {
            MonitorCommand::Retry(reply) => {
                let outcome = match self.tracker.retry() {
                    Ok(label) => {
                        info!(%device_id, job_label = %label, "operator retry");
                        self.spawn_completion(Some(label));
                        Ok(())
                    }
                    Err(err) => Err(Error::conflict(err.to_string())),
                };
                (reply, outcome)
            }
            MonitorCommand::Abandon(reply) => {
                let outcome = match self.tracker.abandon() {
                    Ok(label) => {
                        info!(%device_id, job_label = %label, "operator abandoned retained print");
                        Ok(())
                    }
                    Err(err) => Err(Error::conflict(err.to_string())),
                };
                (reply, outcome)
            }
        };
        if reply.send(outcome).is_err() {
            debug!(%device_id, "command caller went away before the reply");
        }
        self.publish_view();
    }

    async fn mark_unreachable(&mut self, message: &str) {
        warn!(device_id = %self.device.id(), error = message, "status poll failed");
        if std::mem::replace(&mut self.reachable, false) {
            self.record_state(MachineState::Offline).await;
            self.publish_view();
        }
    }

    async fn record_state(&self, state: MachineState) {
        if let Err(err) = self
            .context
            .devices
            .record_machine_state(self.device.id(), state)
            .await
        {
            warn!(device_id = %self.device.id(), %err, "failed to persist machine state");
        }
    }

    fn current_view(&self) -> DeviceRuntimeView {
        let state = if self.reachable {
            self.tracker
                .last_state()
                .unwrap_or_else(|| self.device.last_state())
        } else {
            MachineState::Offline
        };
        DeviceRuntimeView {
            device_id: self.device.id().clone(),
            phase: self.tracker.phase(),
            state,
            job_label: self.tracker.job_label().map(str::to_owned),
            retained_after_failure: self.tracker.retained_after_failure(),
        }
    }

    fn publish_view(&self) {
        let next = self.current_view();
        let changed = self.view.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next.clone();
                true
            }
        });
        if changed {
            self.context.events.publish(StatusEvent::DeviceRuntime(next));
        }
    }
}
