use chrono::Utc;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Gauge, Paragraph, Sparkline},
    Frame,
};

use gpu_throttle::history::RollingWindow;
use gpu_throttle::models::Metric;
use gpu_throttle::monitor::DeviceView;
use gpu_throttle::{MonitorConfig, MonitorEvent, MonitorPhase};

use crate::app::App;
use crate::theme::*;

/// Renders the dashboard: header, one panel per GPU, transition log
pub fn render(frame: &mut Frame, app: &App) {
    // Main container with dark background
    let main_block = Block::default().style(Style::default().bg(DARK_BG));
    frame.render_widget(main_block, frame.area());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(5),                                 // Header
            Constraint::Min(0),                                    // GPU panels
            Constraint::Length(app.event_log.len().max(1) as u16 + 2), // Transitions
        ])
        .split(frame.area());

    render_header(frame, chunks[0], app);

    let devices = &app.view.devices;
    let config = app.view.config.clone().unwrap_or_default();
    let gpu_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            devices
                .iter()
                .map(|_| Constraint::Ratio(1, devices.len() as u32))
                .collect::<Vec<_>>(),
        )
        .split(chunks[1]);

    for (idx, device) in devices.iter().enumerate() {
        render_gpu(frame, device, &config, gpu_chunks[idx]);
    }

    render_events(frame, chunks[2], app);
}

fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let now = Utc::now();
    let uptime = now - app.started_at;

    let glitch_char = if app.frame_count % 10 < 2 { "█" } else { " " };

    let (state_label, state_color) = match app.view.phase {
        MonitorPhase::Throttling => ("THROTTLING", NEON_RED),
        MonitorPhase::Normal => ("NORMAL", NEON_GREEN),
        MonitorPhase::Sampling if app.view.throttling => ("THROTTLING", NEON_RED),
        MonitorPhase::Sampling => ("SAMPLING", NEON_CYAN),
        MonitorPhase::Idle => ("IDLE", Color::DarkGray),
    };

    let header_text = vec![
        Line::from(vec![Span::styled(
            "╔══════════════════════════════════════════════════════════════════════╗",
            Style::default().fg(NEON_GREEN),
        )]),
        Line::from(vec![
            Span::styled("║  ", Style::default().fg(NEON_GREEN)),
            Span::styled(glitch_char, Style::default().fg(NEON_MAGENTA)),
            Span::styled(
                " GPU THROTTLE ",
                Style::default().fg(NEON_GREEN).add_modifier(Modifier::BOLD),
            ),
            Span::styled("│ ", Style::default().fg(NEON_GREEN)),
            Span::styled(
                format!("{}", now.format("%H:%M:%S")),
                Style::default().fg(NEON_YELLOW),
            ),
            Span::styled(" │ ", Style::default().fg(NEON_GREEN)),
            Span::styled(
                format!(
                    "UPTIME: {:02}:{:02}:{:02}",
                    uptime.num_hours(),
                    uptime.num_minutes() % 60,
                    uptime.num_seconds() % 60
                ),
                Style::default().fg(NEON_CYAN),
            ),
            Span::styled(" │ ", Style::default().fg(NEON_GREEN)),
            Span::styled(
                format!("GPUs: {}", app.view.devices.len()),
                Style::default().fg(NEON_MAGENTA),
            ),
            Span::styled(" │ ", Style::default().fg(NEON_GREEN)),
            Span::styled(
                state_label,
                Style::default().fg(state_color).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!(" #{}", app.view.cycles),
                Style::default().fg(Color::DarkGray),
            ),
        ]),
        Line::from(vec![Span::styled(
            "╚══════════════════════════════════════════════════════════════════════╝",
            Style::default().fg(NEON_GREEN),
        )]),
    ];

    let header = Paragraph::new(header_text)
        .style(Style::default().bg(DARK_BG))
        .alignment(Alignment::Left);
    frame.render_widget(header, area);
}

fn render_gpu(frame: &mut Frame, device: &DeviceView, config: &MonitorConfig, area: Rect) {
    let status_color = if device.tripped.is_empty() {
        NEON_GREEN
    } else {
        NEON_RED
    };

    // GPU block
    let gpu_block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(MATRIX_GREEN))
        .title(vec![
            Span::styled(" ◆ ", Style::default().fg(status_color)),
            Span::styled(
                format!("{} ", device.id),
                Style::default().fg(NEON_GREEN).add_modifier(Modifier::BOLD),
            ),
            Span::styled("│ ", Style::default().fg(MATRIX_GREEN)),
            Span::styled(device.name.as_str(), Style::default().fg(CYBER_BLUE)),
            Span::styled(" ", Style::default()),
        ])
        .style(Style::default().bg(DARK_BG));

    frame.render_widget(gpu_block, area);

    let inner = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(1), // Latest sample
            Constraint::Length(1), // Utilization average
            Constraint::Length(1), // Temperature average
            Constraint::Length(1), // Memory average
            Constraint::Min(3),    // Sparklines
        ])
        .split(area);

    let Some(latest) = &device.latest else {
        let waiting = Paragraph::new(Line::from(Span::styled(
            "  waiting for first check cycle...",
            Style::default().fg(Color::DarkGray),
        )))
        .style(Style::default().bg(DARK_BG));
        frame.render_widget(waiting, inner[0]);
        return;
    };

    let power = latest
        .power_draw
        .map(|w| format!("{w:6.1}W"))
        .unwrap_or_else(|| "   N/A".to_string());

    // Stats line
    let stats_line = Line::from(vec![
        Span::styled("  ┌─ ", Style::default().fg(MATRIX_GREEN)),
        Span::styled("UTIL: ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            format!("{:5.1}%", latest.utilization_gpu),
            Style::default().fg(NEON_GREEN).add_modifier(Modifier::BOLD),
        ),
        Span::styled(" │ ", Style::default().fg(MATRIX_GREEN)),
        Span::styled("TEMP: ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            format!("{:3.0}°C", latest.temperature_gpu),
            Style::default().fg(NEON_CYAN).add_modifier(Modifier::BOLD),
        ),
        Span::styled(" │ ", Style::default().fg(MATRIX_GREEN)),
        Span::styled("PWR: ", Style::default().fg(Color::DarkGray)),
        Span::styled(power, Style::default().fg(NEON_YELLOW)),
        Span::styled(" │ ", Style::default().fg(MATRIX_GREEN)),
        Span::styled("MEM: ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            format!("{:.0}/{:.0}MB", latest.memory_used, latest.memory_total),
            Style::default().fg(NEON_MAGENTA),
        ),
        Span::styled(" ─┐", Style::default().fg(MATRIX_GREEN)),
    ]);
    let stats = Paragraph::new(stats_line).style(Style::default().bg(DARK_BG));
    frame.render_widget(stats, inner[0]);

    for (row, metric) in Metric::ALL.into_iter().enumerate() {
        render_average(frame, device, config, metric, inner[row + 1]);
    }

    // Sparklines row
    let spark_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
        ])
        .split(inner[4]);

    let sparklines = [
        (&device.history.utilization, " ◇ UTIL% ", NEON_GREEN, MATRIX_GREEN),
        (&device.history.temperature, " ◇ TEMP°C ", NEON_RED, NEON_RED),
        (
            &device.history.memory_used_percent,
            " ◇ MEM% ",
            NEON_MAGENTA,
            NEON_MAGENTA,
        ),
    ];
    for (idx, (window, title, title_color, bar_color)) in sparklines.into_iter().enumerate() {
        let data = sparkline_data(window);
        let sparkline = Sparkline::default()
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .border_style(Style::default().fg(Color::Rgb(40, 80, 40)))
                    .title(Span::styled(title, Style::default().fg(title_color)))
                    .style(Style::default().bg(DARK_BG)),
            )
            .data(&data)
            .style(Style::default().fg(bar_color))
            .max(100);
        frame.render_widget(sparkline, spark_chunks[idx]);
    }
}

/// One gauge line: rolling average against its threshold
fn render_average(
    frame: &mut Frame,
    device: &DeviceView,
    config: &MonitorConfig,
    metric: Metric,
    area: Rect,
) {
    let threshold = config.threshold(metric);
    let unit = match metric {
        Metric::Temperature => "°C",
        _ => "%",
    };

    let (percent, label, color) = match device.averages.get(metric) {
        Some(avg) => (
            avg.clamp(0.0, 100.0) as u16,
            format!("▓ {metric:<11} avg {avg:5.1}{unit} / {threshold:.0}{unit}"),
            level_color(avg, threshold),
        ),
        None => (
            0,
            format!("▓ {metric:<11} avg   n/a / {threshold:.0}{unit}"),
            Color::DarkGray,
        ),
    };

    let label_style = if device.tripped.contains(&metric) {
        Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::White)
    };

    let gauge = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::NONE)
                .style(Style::default().bg(DARK_BG)),
        )
        .gauge_style(Style::default().fg(color).bg(GAUGE_BG))
        .percent(percent)
        .label(Span::styled(label, label_style));
    frame.render_widget(gauge, area);
}

fn render_events(frame: &mut Frame, area: Rect, app: &App) {
    let lines = if app.event_log.is_empty() {
        vec![Line::from(Span::styled(
            "  no transitions yet",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        app.event_log
            .iter()
            .map(|(at, event)| {
                let (text, color) = match event {
                    MonitorEvent::Throttle => ("Started throttling", NEON_RED),
                    MonitorEvent::Release => ("Stopped throttling", NEON_GREEN),
                };
                Line::from(vec![
                    Span::styled(
                        format!("  {} ", at.format("%Y-%m-%d %H:%M:%S")),
                        Style::default().fg(NEON_YELLOW),
                    ),
                    Span::styled(text, Style::default().fg(color)),
                ])
            })
            .collect()
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(MATRIX_GREEN))
        .title(Span::styled(" ◇ TRANSITIONS ", Style::default().fg(NEON_CYAN)))
        .style(Style::default().bg(DARK_BG));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Oldest-to-newest bar heights for a most-recent-first window
fn sparkline_data(window: &RollingWindow) -> Vec<u64> {
    let mut data: Vec<u64> = window
        .iter()
        .map(|v| v.clamp(0.0, 100.0).round() as u64)
        .collect();
    data.reverse();
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparkline_runs_oldest_to_newest() {
        let mut window = RollingWindow::default();
        for v in [10.0, 20.0, 130.0] {
            window.push_capped(v, 5);
        }
        assert_eq!(sparkline_data(&window), vec![10, 20, 100]);
    }
}
