//! Small helpers for styled terminal output.

use console::style;

/// `1 package` / `3 packages`.
pub fn format_count(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

/// The `==>` section marker used for top-level status lines.
pub fn arrow() -> String {
    style("==>").cyan().bold().to_string()
}
