use std::fmt;

use serde::{Deserialize, Serialize};

/// One telemetry reading for a single GPU, as returned by a device provider.
#[derive(Clone, Debug, PartialEq)]
pub struct GpuSnapshot {
    pub sub_device_id: String,
    pub pci_bus: String,
    pub name: String,
    pub utilization_gpu: f64,
    pub temperature_gpu: f64,
    pub memory_used: f64,
    pub memory_total: f64,
    pub power_draw: Option<f64>,
}

impl GpuSnapshot {
    pub fn device_id(&self) -> DeviceId {
        DeviceId::from_parts(&self.sub_device_id, &self.pci_bus)
    }

    /// Memory in use as a percentage of total, `None` when the device reports no total.
    pub fn memory_used_percent(&self) -> Option<f64> {
        if self.memory_total == 0.0 {
            return None;
        }
        Some(self.memory_used / self.memory_total * 100.0)
    }
}

/// Stable key for a physical GPU, built from its sub-device index and PCI bus.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn from_parts(sub_device_id: &str, pci_bus: &str) -> Self {
        Self(format!("SUB_{sub_device_id}-PCI_{pci_bus}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Metric {
    Utilization,
    Temperature,
    MemoryUsed,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Utilization, Metric::Temperature, Metric::MemoryUsed];
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Utilization => "utilization",
            Self::Temperature => "temperature",
            Self::MemoryUsed => "memory",
        };
        f.pad(s)
    }
}

#[cfg(test)]
pub(crate) fn snapshot(sub: &str, bus: &str, util: f64, temp: f64, mem_used: f64) -> GpuSnapshot {
    GpuSnapshot {
        sub_device_id: sub.to_string(),
        pci_bus: bus.to_string(),
        name: format!("Test GPU {bus}"),
        utilization_gpu: util,
        temperature_gpu: temp,
        memory_used: mem_used,
        memory_total: 100.0,
        power_draw: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_id_ignores_volatile_fields() {
        let a = snapshot("0x1234", "0x01", 10.0, 40.0, 5.0);
        let b = snapshot("0x1234", "0x01", 99.0, 80.0, 90.0);
        assert_eq!(a.device_id(), b.device_id());
        assert_eq!(a.device_id().as_str(), "SUB_0x1234-PCI_0x01");
    }

    #[test]
    fn memory_percent_is_none_without_total() {
        let mut gpu = snapshot("0x0", "0x02", 0.0, 0.0, 512.0);
        gpu.memory_total = 0.0;
        assert_eq!(gpu.memory_used_percent(), None);

        gpu.memory_total = 2048.0;
        assert_eq!(gpu.memory_used_percent(), Some(25.0));
    }
}
