use async_trait::async_trait;

use crate::error::ProviderError;
use crate::models::GpuSnapshot;

/// Source of GPU telemetry. One call returns a snapshot for every device.
#[async_trait]
pub trait DeviceInfoProvider: Send + Sync {
    async fn fetch(&self) -> Result<Vec<GpuSnapshot>, ProviderError>;
}
