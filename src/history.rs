//! Bounded, most-recent-first sample windows used for moving averages.

use std::collections::VecDeque;

use crate::models::{GpuSnapshot, Metric};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RollingWindow {
    values: VecDeque<f64>,
}

impl RollingWindow {
    /// Pushes `value` to the front and drops the oldest values past `capacity`.
    pub fn push_capped(&mut self, value: f64, capacity: usize) {
        self.values.push_front(value);
        while self.values.len() > capacity {
            self.values.pop_back();
        }
    }

    /// Arithmetic mean over the values currently held.
    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
    }

    /// Values, most recent first.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MetricAverages {
    pub utilization: Option<f64>,
    pub temperature: Option<f64>,
    pub memory_used_percent: Option<f64>,
}

impl MetricAverages {
    pub fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Utilization => self.utilization,
            Metric::Temperature => self.temperature,
            Metric::MemoryUsed => self.memory_used_percent,
        }
    }
}

/// Per-device history of the three tracked metrics.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RollingHistory {
    pub utilization: RollingWindow,
    pub temperature: RollingWindow,
    pub memory_used_percent: RollingWindow,
}

impl RollingHistory {
    /// Records one snapshot. Memory is skipped when the device reports no total.
    pub fn record(&mut self, gpu: &GpuSnapshot, capacity: usize) {
        self.utilization.push_capped(gpu.utilization_gpu, capacity);
        self.temperature.push_capped(gpu.temperature_gpu, capacity);
        if let Some(percent) = gpu.memory_used_percent() {
            self.memory_used_percent.push_capped(percent, capacity);
        }
    }

    pub fn averages(&self) -> MetricAverages {
        MetricAverages {
            utilization: self.utilization.mean(),
            temperature: self.temperature.mean(),
            memory_used_percent: self.memory_used_percent.mean(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::snapshot;

    #[test]
    fn window_never_exceeds_capacity() {
        let mut window = RollingWindow::default();
        for i in 0..20 {
            window.push_capped(i as f64, 5);
            assert!(window.len() <= 5);
        }
        assert_eq!(window.len(), 5);
        assert_eq!(
            window.iter().collect::<Vec<_>>(),
            vec![19.0, 18.0, 17.0, 16.0, 15.0]
        );
    }

    #[test]
    fn partial_window_mean_divides_by_len() {
        let mut window = RollingWindow::default();
        assert_eq!(window.mean(), None);

        window.push_capped(10.0, 10);
        window.push_capped(20.0, 10);
        assert_eq!(window.mean(), Some(15.0));
    }

    #[test]
    fn oldest_value_is_evicted() {
        let mut window = RollingWindow::default();
        for v in [10.0, 10.0, 10.0, 100.0] {
            window.push_capped(v, 3);
        }
        assert_eq!(window.iter().next(), Some(100.0));
        assert_eq!(window.mean(), Some(40.0));
    }

    #[test]
    fn capacity_of_one_keeps_latest_only() {
        let mut window = RollingWindow::default();
        window.push_capped(1.0, 1);
        window.push_capped(2.0, 1);
        assert_eq!(window.iter().collect::<Vec<_>>(), vec![2.0]);
    }

    #[test]
    fn record_skips_memory_without_total() {
        let mut history = RollingHistory::default();
        history.record(&snapshot("0x0", "0x01", 50.0, 60.0, 25.0), 4);

        let mut no_total = snapshot("0x0", "0x01", 70.0, 62.0, 25.0);
        no_total.memory_total = 0.0;
        history.record(&no_total, 4);

        assert_eq!(history.utilization.len(), 2);
        assert_eq!(history.temperature.len(), 2);
        assert_eq!(history.memory_used_percent.len(), 1);

        let averages = history.averages();
        assert_eq!(averages.utilization, Some(60.0));
        assert_eq!(averages.temperature, Some(61.0));
        assert_eq!(averages.memory_used_percent, Some(25.0));
    }
}
