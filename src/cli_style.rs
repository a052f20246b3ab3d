/*!
 * campus-media CLI style system
 *
 * Themed text, status icons, capacity tables and byte-size formatting for
 * terminal output.
 */

use comfy_table::{presets, Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use console::{style, StyledObject};

use crate::router::StoreStatus;

// ============================================================================
// THEME COLORS
// ============================================================================

/// Brand colors for consistent styling
pub struct Theme;

impl Theme {
    /// Primary accent color (cyan/blue)
    pub fn primary<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).cyan()
    }

    /// Success color (green)
    pub fn success<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).green()
    }

    /// Warning color (yellow)
    pub fn warning<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).yellow()
    }

    /// Error color (red)
    pub fn error<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).red()
    }

    /// Muted/secondary text (dim)
    pub fn muted<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).dim()
    }

    /// Header style (bold cyan)
    pub fn header<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).cyan().bold()
    }
}

// ============================================================================
// ICONS
// ============================================================================

/// Unicode icons for visual feedback
pub struct Icons;

impl Icons {
    pub const SUCCESS: &'static str = "✓";
    pub const ERROR: &'static str = "✗";
    pub const WARNING: &'static str = "⚠";
    pub const INFO: &'static str = "ℹ";
    pub const ARROW_RIGHT: &'static str = "→";
}

// ============================================================================
// TABLES
// ============================================================================

/// Create a styled data table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn header_cell(text: &str) -> Cell {
    Cell::new(text).fg(Color::Cyan).add_attribute(Attribute::Bold)
}

/// Capacity of every registered store
pub fn capacity_table(statuses: &[StoreStatus], capacity_limit: u64) -> Table {
    let mut table = create_table();
    table.set_header(vec![
        header_cell("Store"),
        header_cell("Used"),
        header_cell("Allocated"),
        header_cell("Free"),
        header_cell("In flight"),
        header_cell("Usage"),
        header_cell("Probe"),
    ]);

    for status in statuses {
        match (&status.snapshot, status.free_bytes, status.utilization) {
            (Some(snapshot), Some(free), Some(utilization)) => {
                let usage_color = if utilization >= 0.95 {
                    Color::Red
                } else if utilization >= 0.80 {
                    Color::Yellow
                } else {
                    Color::Green
                };
                table.add_row(vec![
                    Cell::new(&status.name),
                    Cell::new(format_bytes(snapshot.logical_used_bytes))
                        .set_alignment(CellAlignment::Right),
                    Cell::new(format!(
                        "{} / {}",
                        format_bytes(snapshot.allocated_bytes),
                        format_bytes(capacity_limit)
                    ))
                    .set_alignment(CellAlignment::Right),
                    Cell::new(format_bytes(free)).set_alignment(CellAlignment::Right),
                    Cell::new(format_bytes(status.reserved_bytes))
                        .set_alignment(CellAlignment::Right),
                    Cell::new(format!("{:.1}%", utilization * 100.0)).fg(usage_color),
                    Cell::new(format!("{:?}", snapshot.source).to_lowercase()),
                ]);
            }
            _ => {
                table.add_row(vec![
                    Cell::new(&status.name),
                    Cell::new("-"),
                    Cell::new("-"),
                    Cell::new("-"),
                    Cell::new(format_bytes(status.reserved_bytes))
                        .set_alignment(CellAlignment::Right),
                    Cell::new("unavailable").fg(Color::Red),
                    Cell::new(status.error.as_deref().unwrap_or("")).fg(Color::DarkGrey),
                ]);
            }
        }
    }

    table
}

/// Configured stores and whether each is connected
pub fn stores_table(rows: &[(String, String, bool)]) -> Table {
    let mut table = create_table();
    table.set_header(vec![
        header_cell("Store"),
        header_cell("Endpoint"),
        header_cell("Status"),
    ]);

    for (name, endpoint, connected) in rows {
        let status = if *connected {
            Cell::new(format!("{} connected", Icons::SUCCESS)).fg(Color::Green)
        } else {
            Cell::new(format!("{} unreachable", Icons::ERROR)).fg(Color::Red)
        };
        table.add_row(vec![Cell::new(name), Cell::new(endpoint), status]);
    }

    table
}

// ============================================================================
// SIZES
// ============================================================================

/// Format bytes into human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let base = 1024.0_f64;
    let exp = (bytes_f.ln() / base.ln()).floor() as usize;
    let exp = exp.min(UNITS.len() - 1);

    let value = bytes_f / base.powi(exp as i32);

    if exp == 0 {
        format!("{} {}", bytes, UNITS[exp])
    } else {
        format!("{:.2} {}", value, UNITS[exp])
    }
}

/// Parse a byte size such as `52428800`, `50MB`, `50 MiB` or `1.5G`.
///
/// Units are binary (1 KB = 1024 B), matching [`format_bytes`].
pub fn parse_size(input: &str) -> Result<u64, String> {
    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    if number.is_empty() {
        return Err(format!("'{}' does not start with a number", input));
    }

    let multiplier: u64 = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" | "kib" => 1024,
        "m" | "mb" | "mib" => 1024 * 1024,
        "g" | "gb" | "gib" => 1024 * 1024 * 1024,
        "t" | "tb" | "tib" => 1024 * 1024 * 1024 * 1024,
        other => return Err(format!("unknown size unit '{}'", other)),
    };

    if let Ok(whole) = number.parse::<u64>() {
        return whole
            .checked_mul(multiplier)
            .ok_or_else(|| format!("'{}' is too large", input));
    }

    let value: f64 = number
        .parse()
        .map_err(|_| format!("'{}' is not a valid size", input))?;
    let bytes = value * multiplier as f64;
    if !bytes.is_finite() || bytes > u64::MAX as f64 {
        return Err(format!("'{}' is too large", input));
    }
    Ok(bytes.round() as u64)
}

// ============================================================================
// MESSAGES
// ============================================================================

/// Print a section header
pub fn section_header(title: &str) {
    let line_len = 50 - title.len().min(40);
    println!(
        "\n{} {}",
        Theme::header(title),
        Theme::muted("─".repeat(line_len))
    );
}

/// Print a styled error message with optional suggestion
pub fn print_error(message: &str, suggestion: Option<&str>) {
    eprintln!(
        "\n{} {}",
        Theme::error(format!("{} Error:", Icons::ERROR)),
        message
    );

    if let Some(hint) = suggestion {
        eprintln!(
            "  {} {}",
            Theme::muted(Icons::ARROW_RIGHT),
            Theme::muted(hint)
        );
    }
}

/// Print a warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", Theme::warning(Icons::WARNING), message);
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", Theme::success(Icons::SUCCESS), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", Theme::primary(Icons::INFO), message);
}
