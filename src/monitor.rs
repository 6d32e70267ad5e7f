//! Periodic sampling loop and edge-triggered throttle state.

use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::MonitorConfig;
use crate::error::{MonitorError, Result};
use crate::history::{MetricAverages, RollingHistory};
use crate::models::{DeviceId, GpuSnapshot, Metric};
use crate::provider::DeviceInfoProvider;
use crate::registry::DeviceRegistry;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MonitorEvent {
    Throttle,
    Release,
}

impl fmt::Display for MonitorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Throttle => f.write_str("throttle"),
            Self::Release => f.write_str("release"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MonitorPhase {
    #[default]
    Idle,
    Sampling,
    Normal,
    Throttling,
}

impl fmt::Display for MonitorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Sampling => "sampling",
            Self::Normal => "normal",
            Self::Throttling => "throttling",
        };
        f.write_str(s)
    }
}

/// Metrics whose rolling average is above the configured threshold.
pub fn tripped_metrics(averages: &MetricAverages, config: &MonitorConfig) -> Vec<Metric> {
    Metric::ALL
        .into_iter()
        .filter(|&metric| {
            averages
                .get(metric)
                .is_some_and(|avg| avg > config.threshold(metric))
        })
        .collect()
}

#[derive(Clone, Debug)]
pub struct DeviceView {
    pub id: DeviceId,
    pub name: String,
    pub latest: Option<GpuSnapshot>,
    pub history: RollingHistory,
    pub averages: MetricAverages,
    pub tripped: Vec<Metric>,
}

/// Point-in-time copy of the monitor state for inspectors.
#[derive(Clone, Debug)]
pub struct MonitorView {
    pub devices: Vec<DeviceView>,
    pub throttling: bool,
    pub phase: MonitorPhase,
    pub config: Option<MonitorConfig>,
    pub cycles: u64,
}

#[derive(Debug, Default)]
struct MonitorState {
    registry: DeviceRegistry,
    throttling: bool,
    phase: MonitorPhase,
    config: Option<MonitorConfig>,
    cycles: u64,
}

impl MonitorState {
    /// Folds one snapshot into the histories and returns the resulting transition.
    ///
    /// Only devices present in `gpus` take part in the throttle decision. A
    /// registered device missing from the snapshot keeps its stored averages, so
    /// an inspector may see it tripped while `throttling` is false.
    fn apply_snapshot(
        &mut self,
        gpus: &[GpuSnapshot],
        config: &MonitorConfig,
    ) -> Result<Option<MonitorEvent>> {
        // Validate every device before touching any history
        let ids = gpus.iter().map(GpuSnapshot::device_id).collect::<Vec<_>>();
        if let Some(unknown) = ids.iter().find(|id| !self.registry.contains(id)) {
            return Err(MonitorError::UnknownDevice(unknown.clone()));
        }

        let mut should_throttle = false;
        for (id, gpu) in ids.iter().zip(gpus) {
            let entry = self.registry.get_mut(id)?;
            entry.history.record(gpu, config.graph_length);
            entry.latest = Some(gpu.clone());

            let averages = entry.history.averages();
            let tripped = tripped_metrics(&averages, config);
            debug!(
                device = %id,
                utilization = ?averages.utilization,
                temperature = ?averages.temperature,
                memory = ?averages.memory_used_percent,
                ?tripped,
                "device averages"
            );
            should_throttle |= !tripped.is_empty();
        }

        if ids.len() < self.registry.len() {
            for (id, _) in self.registry.iter().filter(|(id, _)| !ids.contains(id)) {
                debug!(device = %id, "device missing from snapshot");
            }
        }

        let event = match (self.throttling, should_throttle) {
            (false, true) => Some(MonitorEvent::Throttle),
            (true, false) => Some(MonitorEvent::Release),
            _ => None,
        };
        self.throttling = should_throttle;
        Ok(event)
    }

    fn steady_phase(&self) -> MonitorPhase {
        if self.throttling {
            MonitorPhase::Throttling
        } else {
            MonitorPhase::Normal
        }
    }
}

/// Clears the running flag when the loop exits, including by panic.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Handle to a running monitor loop.
pub struct MonitorHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Stops scheduling further cycles. A cycle already running completes.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Waits for the loop to exit.
    pub async fn stopped(self) {
        if let Err(e) = self.task.await {
            error!("GPU monitor task failed: {}", e);
        }
    }
}

/// Samples all registered GPUs on a fixed interval and publishes
/// [`MonitorEvent`]s when the combined throttle state flips.
pub struct GpuMonitor {
    provider: Arc<dyn DeviceInfoProvider>,
    state: Mutex<MonitorState>,
    subscribers: StdMutex<Vec<mpsc::UnboundedSender<MonitorEvent>>>,
    running: AtomicBool,
}

impl GpuMonitor {
    pub fn new(provider: Arc<dyn DeviceInfoProvider>) -> Arc<Self> {
        Arc::new(Self {
            provider,
            state: Default::default(),
            subscribers: Default::default(),
            running: AtomicBool::new(false),
        })
    }

    /// Enumerates the GPUs once and closes the device set.
    pub async fn setup(&self) -> Result<()> {
        let gpus = self.provider.fetch().await.map_err(MonitorError::Setup)?;
        if gpus.is_empty() {
            return Err(MonitorError::NoDevices);
        }

        let mut state = self.state.lock().await;
        if state.registry.is_closed() {
            return Err(MonitorError::RegistrationClosed(gpus[0].device_id()));
        }

        let mut registry = DeviceRegistry::new();
        for gpu in &gpus {
            let id = registry.register(gpu)?;
            info!(device = %id, name = %gpu.name, "added GPU");
        }
        registry.close();
        state.registry = registry;
        Ok(())
    }

    /// Validates `config` and spawns the check loop.
    pub async fn start(self: &Arc<Self>, config: MonitorConfig) -> Result<MonitorHandle> {
        config.validate()?;
        {
            let mut state = self.state.lock().await;
            if !state.registry.is_closed() {
                return Err(MonitorError::NotSetUp);
            }
            if self.running.swap(true, Ordering::SeqCst) {
                return Err(MonitorError::AlreadyRunning);
            }
            state.config = Some(config.clone());
            state.phase = state.steady_phase();
        }

        info!(
            graph_length = config.graph_length,
            check_interval = config.check_interval,
            gpu_use_avg = config.gpu_use_avg,
            gpu_temp_avg = config.gpu_temp_avg,
            mem_use_avg = config.mem_use_avg,
            "starting GPU monitoring"
        );

        let cancel = CancellationToken::new();
        let task = tokio::spawn(Arc::clone(self).run(config, cancel.clone()));
        Ok(MonitorHandle { cancel, task })
    }

    /// New subscriber for throttle/release events.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<MonitorEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers.lock().expect("poisoned").push(sender);
        receiver
    }

    pub async fn is_throttling(&self) -> bool {
        self.state.lock().await.throttling
    }

    pub async fn phase(&self) -> MonitorPhase {
        self.state.lock().await.phase
    }

    pub async fn view(&self) -> MonitorView {
        let state = self.state.lock().await;
        let devices = state
            .registry
            .iter()
            .map(|(id, entry)| {
                let averages = entry.history.averages();
                let tripped = state
                    .config
                    .as_ref()
                    .map(|config| tripped_metrics(&averages, config))
                    .unwrap_or_default();
                DeviceView {
                    id: id.clone(),
                    name: entry.name.clone(),
                    latest: entry.latest.clone(),
                    history: entry.history.clone(),
                    averages,
                    tripped,
                }
            })
            .collect();

        MonitorView {
            devices,
            throttling: state.throttling,
            phase: state.phase,
            config: state.config.clone(),
            cycles: state.cycles,
        }
    }

    async fn run(self: Arc<Self>, config: MonitorConfig, cancel: CancellationToken) {
        let _running = RunningGuard(&self.running);
        let period = config.check_interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    // Not raced against cancellation: an in-flight cycle always completes
                    if let Err(e) = self.run_cycle(&config).await {
                        warn!("skipping check cycle: {}", e);
                    }
                }
            }
        }

        self.state.lock().await.phase = MonitorPhase::Idle;
        info!("GPU monitoring stopped");
    }

    async fn run_cycle(&self, config: &MonitorConfig) -> Result<Option<MonitorEvent>> {
        let previous = mem::replace(&mut self.state.lock().await.phase, MonitorPhase::Sampling);

        let gpus = match self.provider.fetch().await {
            Ok(gpus) => gpus,
            Err(e) => {
                self.state.lock().await.phase = previous;
                return Err(MonitorError::SnapshotFetch(e));
            }
        };

        let mut state = self.state.lock().await;
        match state.apply_snapshot(&gpus, config) {
            Ok(event) => {
                state.phase = state.steady_phase();
                state.cycles += 1;
                if let Some(event) = event {
                    info!(%event, "throttle state changed");
                    self.publish(event);
                }
                Ok(event)
            }
            Err(e) => {
                state.phase = previous;
                Err(e)
            }
        }
    }

    fn publish(&self, event: MonitorEvent) {
        self.subscribers
            .lock()
            .expect("poisoned")
            .retain(|sender| sender.send(event).is_ok());
    }
}
