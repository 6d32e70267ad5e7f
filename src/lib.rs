//! Rolling-average GPU telemetry monitor that raises throttle/release
//! signals when utilization, temperature or memory use stay too high.

pub mod config;
pub mod error;
pub mod history;
pub mod models;
pub mod monitor;
pub mod nvidia;
pub mod provider;
pub mod registry;

pub use config::MonitorConfig;
pub use error::{ConfigError, MonitorError, ProviderError};
pub use monitor::{GpuMonitor, MonitorEvent, MonitorHandle, MonitorPhase, MonitorView};
pub use nvidia::NvidiaSmi;
pub use provider::DeviceInfoProvider;
