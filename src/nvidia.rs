use async_trait::async_trait;
use tokio::process::Command;

use crate::error::ProviderError;
use crate::models::GpuSnapshot;
use crate::provider::DeviceInfoProvider;

const QUERY_FIELDS: &str = "pci.sub_device_id,pci.bus,name,utilization.gpu,temperature.gpu,memory.used,memory.total,power.draw";

/// Queries GPU telemetry through the `nvidia-smi` binary.
#[derive(Clone, Debug)]
pub struct NvidiaSmi {
    program: String,
}

impl NvidiaSmi {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for NvidiaSmi {
    fn default() -> Self {
        Self::new("nvidia-smi")
    }
}

#[async_trait]
impl DeviceInfoProvider for NvidiaSmi {
    async fn fetch(&self) -> Result<Vec<GpuSnapshot>, ProviderError> {
        let output = Command::new(&self.program)
            .arg(format!("--query-gpu={QUERY_FIELDS}"))
            .arg("--format=csv,noheader,nounits")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ProviderError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ProviderError::CommandFailed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_query_output(&String::from_utf8(output.stdout)?)
    }
}

/// Parses `--format=csv,noheader,nounits` output, one GPU per line.
pub fn parse_query_output(output: &str) -> Result<Vec<GpuSnapshot>, ProviderError> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_line)
        .collect()
}

fn parse_line(line: &str) -> Result<GpuSnapshot, ProviderError> {
    let parts: Vec<&str> = line.split(',').map(|s| s.trim()).collect();
    if parts.len() < 8 {
        return Err(ProviderError::Parse {
            line: line.to_string(),
            reason: format!("expected 8 fields, got {}", parts.len()),
        });
    }

    let number = |idx: usize, field: &str| -> Result<f64, ProviderError> {
        parts[idx].parse::<f64>().map_err(|_| ProviderError::Parse {
            line: line.to_string(),
            reason: format!("{field} is not a number: {:?}", parts[idx]),
        })
    };

    Ok(GpuSnapshot {
        sub_device_id: parts[0].to_string(),
        pci_bus: parts[1].to_string(),
        name: parts[2].to_string(),
        utilization_gpu: number(3, "utilization.gpu")?,
        temperature_gpu: number(4, "temperature.gpu")?,
        memory_used: number(5, "memory.used")?,
        memory_total: number(6, "memory.total")?,
        // Reported as "[N/A]" on boards without power telemetry
        power_draw: parts[7].parse().ok(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multiple_gpus() {
        let output = "\
0x147E10DE, 0x01, NVIDIA GeForce RTX 3080, 37, 61, 5120, 10240, 220.50
0x147E10DE, 0x02, NVIDIA GeForce RTX 3080, 0, 34, 0, 10240, [N/A]
";
        let gpus = parse_query_output(output).unwrap();
        assert_eq!(gpus.len(), 2);

        assert_eq!(gpus[0].device_id().as_str(), "SUB_0x147E10DE-PCI_0x01");
        assert_eq!(gpus[0].name, "NVIDIA GeForce RTX 3080");
        assert_eq!(gpus[0].utilization_gpu, 37.0);
        assert_eq!(gpus[0].temperature_gpu, 61.0);
        assert_eq!(gpus[0].memory_used_percent(), Some(50.0));
        assert_eq!(gpus[0].power_draw, Some(220.5));

        assert_eq!(gpus[1].pci_bus, "0x02");
        assert_eq!(gpus[1].power_draw, None);
    }

    #[test]
    fn empty_output_yields_no_gpus() {
        assert!(parse_query_output("\n").unwrap().is_empty());
    }

    #[test]
    fn rejects_short_lines() {
        let err = parse_query_output("0x0, 0x01, GPU, 10").unwrap_err();
        assert!(matches!(err, ProviderError::Parse { .. }));
    }

    #[test]
    fn rejects_unavailable_core_metric() {
        let err = parse_query_output("0x0, 0x01, GPU, [N/A], 40, 1, 2, 3").unwrap_err();
        match err {
            ProviderError::Parse { reason, .. } => assert!(reason.contains("utilization.gpu")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let smi = NvidiaSmi::new("/nonexistent/nvidia-smi");
        assert!(matches!(
            smi.fetch().await,
            Err(ProviderError::Spawn { .. })
        ));
    }
}
