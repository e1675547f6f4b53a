//! Device monitoring.
//!
//! [`DeviceMonitor`] supervises one polling task per configured device. Each
//! task owns its [`DeviceTracker`] exclusively; the supervisor only sees a
//! `watch` projection of it and talks to the task through commands. Devices
//! without an address are registered as placeholders and never polled.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use mockable::Clock;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::ports::{DeviceRepository, DeviceStatusSource, MonitorControl};
use crate::domain::{Device, DeviceId, Error, StatusEvent, StatusEvents, UsageReconciler};

mod completion;
mod runtime;
mod task;
mod tracker;

use completion::CompletionHandler;
pub use runtime::{
    AttemptJitter, BackoffJitter, DownloadPolicy, DownloadRuntime, DownloadSleeper, TokioSleeper,
};
use task::{DeviceTask, MonitorCommand, TaskContext, initial_view};
pub use tracker::{
    DeviceRuntimeView, DeviceTracker, MonitorPhase, TrackerCommandError, TrackerEvent,
};

const COMMAND_BUFFER: usize = 8;

/// Polling and download settings shared by every device task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Shared poll tick.
    pub poll_interval: Duration,
    /// Timeout for one status request.
    pub status_timeout: Duration,
    /// Print file download bounds.
    pub download: DownloadPolicy,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            status_timeout: Duration::from_secs(5),
            download: DownloadPolicy::default(),
        }
    }
}

/// Port bundle required by the monitor.
pub struct DeviceMonitorPorts {
    /// Printer API adapter.
    pub source: Arc<dyn DeviceStatusSource>,
    /// Device persistence, used to record the last machine state.
    pub devices: Arc<dyn DeviceRepository>,
    /// Usage reconciler invoked after downloads.
    pub reconciler: Arc<UsageReconciler>,
}

struct RunningTask {
    shutdown: watch::Sender<bool>,
    commands: mpsc::Sender<MonitorCommand>,
    view: watch::Receiver<DeviceRuntimeView>,
    join: JoinHandle<()>,
}

enum Supervised {
    Placeholder(DeviceRuntimeView),
    Running(RunningTask),
}

impl Supervised {
    fn view(&self) -> DeviceRuntimeView {
        match self {
            Self::Placeholder(view) => view.clone(),
            Self::Running(task) => task.view.borrow().clone(),
        }
    }

    /// Ask the task to stop without waiting for it.
    fn signal_stop(self) -> Option<JoinHandle<()>> {
        match self {
            Self::Placeholder(_) => None,
            Self::Running(task) => {
                if task.shutdown.send(true).is_err() {
                    debug!("device task already exited");
                }
                Some(task.join)
            }
        }
    }
}

/// Supervisor for per-device monitor tasks.
pub struct DeviceMonitor {
    context: Arc<TaskContext>,
    tasks: Mutex<HashMap<DeviceId, Supervised>>,
}

impl DeviceMonitor {
    /// Build a monitor using the Tokio sleeper and default jitter.
    pub fn new(
        ports: DeviceMonitorPorts,
        events: StatusEvents,
        clock: Arc<dyn Clock>,
        settings: MonitorSettings,
    ) -> Self {
        Self::with_runtime(ports, events, clock, DownloadRuntime::default(), settings)
    }

    /// Build a monitor with injected retry helpers.
    pub fn with_runtime(
        ports: DeviceMonitorPorts,
        events: StatusEvents,
        clock: Arc<dyn Clock>,
        runtime: DownloadRuntime,
        settings: MonitorSettings,
    ) -> Self {
        let DeviceMonitorPorts {
            source,
            devices,
            reconciler,
        } = ports;
        let completion = Arc::new(CompletionHandler {
            source: Arc::clone(&source),
            reconciler,
            policy: settings.download,
            runtime,
            clock,
        });
        Self {
            context: Arc::new(TaskContext {
                source,
                devices,
                completion,
                events,
                poll_interval: settings.poll_interval,
                status_timeout: settings.status_timeout,
            }),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Start monitoring every device in `devices`.
    pub async fn start_all(&self, devices: Vec<Device>) -> Result<(), Error> {
        for device in devices {
            self.start(device).await?;
        }
        Ok(())
    }

    /// Stop every task and wait for in-flight completions to finish.
    pub async fn shutdown(&self) {
        let drained: Vec<(DeviceId, Supervised)> = match self.lock_tasks() {
            Ok(mut tasks) => tasks.drain().collect(),
            Err(err) => {
                warn!(%err, "monitor table unavailable during shutdown");
                return;
            }
        };
        let joins: Vec<(DeviceId, JoinHandle<()>)> = drained
            .into_iter()
            .filter_map(|(id, entry)| entry.signal_stop().map(|join| (id, join)))
            .collect();
        for (device_id, join) in joins {
            if let Err(err) = join.await {
                warn!(%device_id, %err, "device monitor ended abnormally");
            }
        }
        info!("device monitors stopped");
    }

    fn lock_tasks(&self) -> Result<MutexGuard<'_, HashMap<DeviceId, Supervised>>, Error> {
        self.tasks
            .lock()
            .map_err(|_| Error::internal("monitor table poisoned"))
    }

    fn spawn(&self, device: Device) -> Supervised {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let (view_tx, view_rx) = watch::channel(initial_view(&device));
        let task = DeviceTask::new(device, Arc::clone(&self.context), view_tx);
        let join = tokio::spawn(task.run(shutdown_rx, commands_rx));
        Supervised::Running(RunningTask {
            shutdown: shutdown_tx,
            commands: commands_tx,
            view: view_rx,
            join,
        })
    }

    async fn send_command(
        &self,
        device_id: &DeviceId,
        command: impl FnOnce(oneshot::Sender<Result<(), Error>>) -> MonitorCommand,
    ) -> Result<(), Error> {
        let sender = {
            let tasks = self.lock_tasks()?;
            match tasks.get(device_id) {
                None => return Err(Error::not_found(format!("device {device_id} not found"))),
                Some(Supervised::Placeholder(_)) => {
                    return Err(Error::conflict(format!(
                        "device {device_id} has no address and is not monitored"
                    )));
                }
                Some(Supervised::Running(task)) => task.commands.clone(),
            }
        };
        let unavailable = || Error::service_unavailable(format!("monitor for {device_id} stopped"));
        let (reply_tx, reply_rx) = oneshot::channel();
        sender
            .send(command(reply_tx))
            .await
            .map_err(|_| unavailable())?;
        reply_rx.await.map_err(|_| unavailable())?
    }
}

#[async_trait]
impl MonitorControl for DeviceMonitor {
    async fn start(&self, device: Device) -> Result<(), Error> {
        let device_id = device.id().clone();
        let entry = if device.is_configured() {
            self.spawn(device)
        } else {
            let view = initial_view(&device);
            self.context
                .events
                .publish(StatusEvent::DeviceRuntime(view.clone()));
            Supervised::Placeholder(view)
        };
        let previous = self.lock_tasks()?.insert(device_id.clone(), entry);
        if let Some(previous) = previous {
            previous.signal_stop();
            info!(%device_id, "device monitor restarted");
        }
        Ok(())
    }

    async fn stop(&self, device_id: &DeviceId) -> Result<(), Error> {
        let removed = self.lock_tasks()?.remove(device_id);
        if let Some(entry) = removed {
            entry.signal_stop();
        }
        Ok(())
    }

    async fn retry(&self, device_id: &DeviceId) -> Result<(), Error> {
        self.send_command(device_id, MonitorCommand::Retry).await
    }

    async fn abandon(&self, device_id: &DeviceId) -> Result<(), Error> {
        self.send_command(device_id, MonitorCommand::Abandon).await
    }

    async fn snapshot(&self) -> Vec<DeviceRuntimeView> {
        let mut views: Vec<DeviceRuntimeView> = match self.lock_tasks() {
            Ok(tasks) => tasks.values().map(Supervised::view).collect(),
            Err(err) => {
                warn!(%err, "monitor table unavailable");
                Vec::new()
            }
        };
        views.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        views
    }
}
