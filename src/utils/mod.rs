pub mod logging;
pub mod setting;

/// Renders a byte count in megabytes with two decimals, e.g. `1.50 MB`.
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}
