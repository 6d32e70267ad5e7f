use ratatui::style::Color;

// Muted terminal palette
pub const NEON_GREEN: Color = Color::Rgb(0, 160, 50);
pub const NEON_CYAN: Color = Color::Rgb(0, 150, 160);
pub const NEON_MAGENTA: Color = Color::Rgb(160, 60, 160);
pub const NEON_YELLOW: Color = Color::Rgb(180, 160, 60);
pub const NEON_RED: Color = Color::Rgb(180, 60, 60);
pub const DARK_BG: Color = Color::Rgb(15, 15, 25);
pub const GAUGE_BG: Color = Color::Rgb(20, 20, 30);
pub const MATRIX_GREEN: Color = Color::Rgb(30, 130, 30);
pub const CYBER_BLUE: Color = Color::Rgb(60, 130, 180);

/// Gauge color for an average measured against its threshold
pub fn level_color(value: f64, threshold: f64) -> Color {
    if value > threshold {
        NEON_RED
    } else if value > threshold * 0.8 {
        NEON_YELLOW
    } else {
        NEON_GREEN
    }
}
