mod app;
mod cli;
mod logging;
mod theme;
mod ui;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::info;

use gpu_throttle::{GpuMonitor, MonitorConfig, MonitorEvent, MonitorHandle, NvidiaSmi};

use crate::app::App;
use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Watch);

    let _log_guard = match command {
        Commands::Watch => {
            logging::init_stderr();
            None
        }
        Commands::Tui => Some(logging::init_file(&cli.monitor.log_dir, "gpu-throttle.log")),
    };

    let config = cli.monitor.resolve()?;
    let monitor = GpuMonitor::new(Arc::new(NvidiaSmi::new(cli.monitor.nvidia_smi.clone())));
    monitor.setup().await.context("GPU setup failed")?;

    match command {
        Commands::Watch => watch(monitor, config).await,
        Commands::Tui => dashboard(monitor, config).await,
    }
}

/// Headless mode: log every transition until Ctrl-C
async fn watch(monitor: Arc<GpuMonitor>, config: MonitorConfig) -> anyhow::Result<()> {
    let mut events = monitor.subscribe();
    let handle = monitor.start(config).await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Some(event) = events.recv() => match event {
                MonitorEvent::Throttle => info!(at = %Utc::now().to_rfc3339(), "Started throttling"),
                MonitorEvent::Release => info!(at = %Utc::now().to_rfc3339(), "Stopped throttling"),
            },
        }
    }

    shutdown(handle).await;
    Ok(())
}

async fn dashboard(monitor: Arc<GpuMonitor>, config: MonitorConfig) -> anyhow::Result<()> {
    let mut app = App::new(monitor.clone()).await;
    let handle = monitor.start(config).await?;

    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
    crossterm::terminal::enable_raw_mode()?;
    crossterm::execute!(
        io::stdout(),
        crossterm::terminal::EnterAlternateScreen,
        crossterm::event::EnableMouseCapture
    )?;

    let result = run_dashboard(&mut terminal, &mut app).await;

    crossterm::execute!(
        io::stdout(),
        crossterm::terminal::LeaveAlternateScreen,
        crossterm::event::DisableMouseCapture
    )?;
    crossterm::terminal::disable_raw_mode()?;

    shutdown(handle).await;
    result
}

async fn run_dashboard(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> anyhow::Result<()> {
    loop {
        app.refresh().await;
        terminal.draw(|f| ui::render(f, app))?;
        app.tick();

        if crossterm::event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                            return Ok(())
                        }
                        _ => {}
                    }
                }
            }
        }
    }
}

async fn shutdown(handle: MonitorHandle) {
    handle.stop();
    handle.stopped().await;
}
