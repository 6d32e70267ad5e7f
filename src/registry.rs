//! Fixed set of monitored GPUs and their rolling histories.

use std::collections::BTreeMap;

use crate::error::{MonitorError, Result};
use crate::history::RollingHistory;
use crate::models::{DeviceId, GpuSnapshot};

#[derive(Clone, Debug)]
pub struct DeviceEntry {
    pub name: String,
    pub history: RollingHistory,
    pub latest: Option<GpuSnapshot>,
}

/// Devices keyed by [`DeviceId`]. Registration is closed once setup finishes.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: BTreeMap<DeviceId, DeviceEntry>,
    closed: bool,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device with an empty history.
    pub fn register(&mut self, gpu: &GpuSnapshot) -> Result<DeviceId> {
        let id = gpu.device_id();
        if self.closed {
            return Err(MonitorError::RegistrationClosed(id));
        }
        if self.devices.contains_key(&id) {
            return Err(MonitorError::DuplicateDevice(id));
        }

        self.devices.insert(
            id.clone(),
            DeviceEntry {
                name: gpu.name.clone(),
                history: RollingHistory::default(),
                latest: None,
            },
        );
        Ok(id)
    }

    /// Seal the device set; later registrations fail.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn get(&self, id: &DeviceId) -> Result<&DeviceEntry> {
        self.devices
            .get(id)
            .ok_or_else(|| MonitorError::UnknownDevice(id.clone()))
    }

    pub fn get_mut(&mut self, id: &DeviceId) -> Result<&mut DeviceEntry> {
        self.devices
            .get_mut(id)
            .ok_or_else(|| MonitorError::UnknownDevice(id.clone()))
    }

    pub fn contains(&self, id: &DeviceId) -> bool {
        self.devices.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DeviceId, &DeviceEntry)> {
        self.devices.iter()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
