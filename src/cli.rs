use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use gpu_throttle::MonitorConfig;

#[derive(Parser, Debug)]
#[command(about = "Watch GPU load averages and signal throttle/release", version)]
pub struct Cli {
    #[command(flatten)]
    pub monitor: MonitorArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Log throttle/release transitions (default)
    Watch,
    /// Show a live dashboard of rolling averages
    Tui,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// TOML file with monitor settings
    #[arg(long, env = "GPU_THROTTLE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Seconds between check cycles
    #[arg(long, env = "GPU_THROTTLE_CHECK_INTERVAL")]
    pub check_interval: Option<f64>,

    /// Samples kept per metric
    #[arg(long, env = "GPU_THROTTLE_GRAPH_LENGTH")]
    pub graph_length: Option<usize>,

    /// Average GPU utilization threshold, percent
    #[arg(long, env = "GPU_THROTTLE_GPU_USE_AVG")]
    pub gpu_use_avg: Option<f64>,

    /// Average GPU temperature threshold, °C
    #[arg(long, env = "GPU_THROTTLE_GPU_TEMP_AVG")]
    pub gpu_temp_avg: Option<f64>,

    /// Average memory used threshold, percent
    #[arg(long, env = "GPU_THROTTLE_MEM_USE_AVG")]
    pub mem_use_avg: Option<f64>,

    /// Path to the nvidia-smi binary
    #[arg(long, env = "GPU_THROTTLE_NVIDIA_SMI", default_value = "nvidia-smi")]
    pub nvidia_smi: String,

    /// Directory for the dashboard log file
    #[arg(long, env = "GPU_THROTTLE_LOG_DIR", default_value = "logs")]
    pub log_dir: PathBuf,
}

impl MonitorArgs {
    /// Config file (or defaults) with command line overrides applied.
    pub fn resolve(&self) -> anyhow::Result<MonitorConfig> {
        let mut config = match &self.config {
            Some(path) => MonitorConfig::from_file(path)?,
            None => MonitorConfig::default(),
        };

        if let Some(v) = self.check_interval {
            config.check_interval = v;
        }
        if let Some(v) = self.graph_length {
            config.graph_length = v;
        }
        if let Some(v) = self.gpu_use_avg {
            config.gpu_use_avg = v;
        }
        if let Some(v) = self.gpu_temp_avg {
            config.gpu_temp_avg = v;
        }
        if let Some(v) = self.mem_use_avg {
            config.mem_use_avg = v;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_without_arguments() {
        let cli = Cli::try_parse_from(["gpu-throttle"]).unwrap();
        assert_eq!(cli.command, None);
        assert_eq!(cli.monitor.resolve().unwrap(), MonitorConfig::default());
    }

    #[test]
    fn flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "graph_length = 20\nmem_use_avg = 50").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cli = Cli::try_parse_from([
            "gpu-throttle",
            "--config",
            &path,
            "--mem-use-avg",
            "75",
            "--check-interval",
            "0.5",
            "tui",
        ])
        .unwrap();

        assert_eq!(cli.command, Some(Commands::Tui));
        let config = cli.monitor.resolve().unwrap();
        assert_eq!(config.graph_length, 20);
        assert_eq!(config.mem_use_avg, 75.0);
        assert_eq!(config.check_interval, 0.5);
        assert_eq!(config.gpu_use_avg, 40.0);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let cli = Cli::try_parse_from(["gpu-throttle", "--config", "/nonexistent/gpu.toml"])
            .unwrap();
        assert!(cli.monitor.resolve().is_err());
    }
}
