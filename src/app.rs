use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::UnboundedReceiver;

use gpu_throttle::{GpuMonitor, MonitorEvent, MonitorView};

const EVENT_LOG_LEN: usize = 8;

/// Dashboard state
pub struct App {
    monitor: Arc<GpuMonitor>,
    events: UnboundedReceiver<MonitorEvent>,
    pub view: MonitorView,
    pub event_log: VecDeque<(DateTime<Utc>, MonitorEvent)>,
    pub started_at: DateTime<Utc>,
    pub frame_count: u64,
}

impl App {
    pub async fn new(monitor: Arc<GpuMonitor>) -> Self {
        let events = monitor.subscribe();
        let view = monitor.view().await;
        App {
            monitor,
            events,
            view,
            event_log: VecDeque::with_capacity(EVENT_LOG_LEN),
            started_at: Utc::now(),
            frame_count: 0,
        }
    }

    /// Pull the latest monitor state and any pending transitions
    pub async fn refresh(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.record_event(Utc::now(), event);
        }
        self.view = self.monitor.view().await;
    }

    fn record_event(&mut self, at: DateTime<Utc>, event: MonitorEvent) {
        self.event_log.push_front((at, event));
        self.event_log.truncate(EVENT_LOG_LEN);
    }

    /// Increment frame counter
    pub fn tick(&mut self) {
        self.frame_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use gpu_throttle::models::GpuSnapshot;
    use gpu_throttle::{DeviceInfoProvider, ProviderError};

    use super::*;

    struct FixedProvider;

    #[async_trait]
    impl DeviceInfoProvider for FixedProvider {
        async fn fetch(&self) -> Result<Vec<GpuSnapshot>, ProviderError> {
            Ok(vec![GpuSnapshot {
                sub_device_id: "0x0".into(),
                pci_bus: "0x01".into(),
                name: "GPU".into(),
                utilization_gpu: 10.0,
                temperature_gpu: 30.0,
                memory_used: 1.0,
                memory_total: 10.0,
                power_draw: None,
            }])
        }
    }

    #[tokio::test]
    async fn event_log_keeps_newest_first() {
        let monitor = GpuMonitor::new(Arc::new(FixedProvider));
        monitor.setup().await.unwrap();
        let mut app = App::new(monitor).await;
        assert_eq!(app.view.devices.len(), 1);

        let start = Utc::now();
        for i in 0..(EVENT_LOG_LEN + 2) {
            let event = if i % 2 == 0 {
                MonitorEvent::Throttle
            } else {
                MonitorEvent::Release
            };
            app.record_event(start + chrono::TimeDelta::seconds(i as i64), event);
        }

        assert_eq!(app.event_log.len(), EVENT_LOG_LEN);
        assert_eq!(app.event_log[0].1, MonitorEvent::Release);
        assert_eq!(
            app.event_log[0].0,
            start + chrono::TimeDelta::seconds((EVENT_LOG_LEN + 1) as i64)
        );
    }
}
